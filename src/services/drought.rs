//! Drought stress day counting on top of the soil water balance.

use chrono::NaiveDate;
use serde::Serialize;

use super::readings::BeforeAfter;
use super::soil_water::{SoilWaterState, Treatment};

/// Drought stress days before/after flowering.
///
/// Trials without (usable) irrigation only report the control series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "shape")]
pub enum DroughtStress {
    Combined {
        days: BeforeAfter<u32>,
    },
    PerTreatment {
        control: BeforeAfter<u32>,
        stress: BeforeAfter<u32>,
    },
}

/// Count days whose level is strictly below `threshold`.
pub fn count_stress_days(
    levels: impl IntoIterator<Item = (NaiveDate, f64)>,
    flowering: NaiveDate,
    threshold: f64,
) -> BeforeAfter<u32> {
    let mut counts = BeforeAfter::default();
    for (day, level) in levels {
        if level < threshold {
            *counts.bucket_mut(day, flowering) += 1;
        }
    }
    counts
}

/// Drought stress days for a simulated trial. With `per_treatment` both
/// series are counted, otherwise only control.
pub fn drought_stress(
    soil_water: &SoilWaterState,
    flowering: NaiveDate,
    threshold: f64,
    per_treatment: bool,
) -> DroughtStress {
    let control = count_stress_days(soil_water.series(Treatment::Control), flowering, threshold);
    if per_treatment {
        DroughtStress::PerTreatment {
            control,
            stress: count_stress_days(soil_water.series(Treatment::Stress), flowering, threshold),
        }
    } else {
        DroughtStress::Combined { days: control }
    }
}
