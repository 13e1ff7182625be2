//! Cold and heat stress sums from hourly temperatures.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::readings::{BeforeAfter, HourlyClimateReading};

/// Summed threshold excursions (°C) before and after flowering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TemperatureStress {
    pub cold: BeforeAfter<f64>,
    pub heat: BeforeAfter<f64>,
}

impl TemperatureStress {
    /// (cold before, cold after, heat before, heat after)
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (
            self.cold.before,
            self.cold.after,
            self.heat.before,
            self.heat.after,
        )
    }
}

/// Daily (min, max) temperature over all hours with a temperature value.
/// Days without any temperature are absent.
pub fn daily_min_max(climate: &[HourlyClimateReading]) -> BTreeMap<NaiveDate, (f64, f64)> {
    let mut extremes: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for reading in climate {
        if let Some(t) = reading.temperature_c {
            extremes
                .entry(reading.date())
                .and_modify(|(lo, hi)| {
                    *lo = lo.min(t);
                    *hi = hi.max(t);
                })
                .or_insert((t, t));
        }
    }
    extremes
}

/// Sum how far each day's minimum falls below `tlb` (cold) and its maximum
/// rises above `tub` (heat). A day may count towards both.
pub fn temperature_stress(
    climate: &[HourlyClimateReading],
    flowering: NaiveDate,
    tlb: f64,
    tub: f64,
) -> TemperatureStress {
    let mut stress = TemperatureStress::default();
    for (day, (t_min, t_max)) in daily_min_max(climate) {
        if t_min < tlb {
            *stress.cold.bucket_mut(day, flowering) += (tlb - t_min).abs();
        }
        if t_max > tub {
            *stress.heat.bucket_mut(day, flowering) += (t_max - tub).abs();
        }
    }
    stress
}
