//! Light intensity from hourly solar radiation.
//!
//! The daily score is the sum of the positive readings multiplied by their
//! count, so several sunny hours outweigh a single radiation spike.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::readings::{BeforeAfter, HourlyRadiationReading};
use crate::errors::ClimateError;

/// Daily light score for every date with at least one positive reading.
pub fn daily_light_scores(radiation: &[HourlyRadiationReading]) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for reading in radiation.iter().filter(|r| r.radiation > 0.0) {
        let (sum, count) = sums.entry(reading.timestamp.date()).or_default();
        *sum += reading.radiation;
        *count += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum * f64::from(count)))
        .collect()
}

/// Mean daily light score before and after flowering.
///
/// Fails with `InsufficientData` when a bucket has no day with light.
pub fn light_intensity(
    radiation: &[HourlyRadiationReading],
    flowering: NaiveDate,
) -> Result<BeforeAfter<f64>, ClimateError> {
    let mut buckets = BeforeAfter::<(f64, u32)>::default();
    for (day, score) in daily_light_scores(radiation) {
        let (sum, count) = buckets.bucket_mut(day, flowering);
        *sum += score;
        *count += 1;
    }

    let mean = |(sum, count): (f64, u32), bucket: &'static str| {
        if count == 0 {
            Err(ClimateError::InsufficientData {
                metric: "light intensity",
                bucket,
            })
        } else {
            Ok(sum / f64::from(count))
        }
    };

    Ok(BeforeAfter {
        before: mean(buckets.before, "before flowering")?,
        after: mean(buckets.after, "after flowering")?,
    })
}
