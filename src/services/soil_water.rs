//! Daily soil water balance per treatment.
//!
//! The window is walked in date order. During the fill phase (first
//! `FILL_PHASE_DAYS` dates) precipitation and irrigation accumulate up to
//! the soil volume; afterwards each day is the previous day's level minus
//! evaporation plus gains, clamped to [0, soil volume].

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use super::evaporation::DailyEvaporation;
use super::overrides::SoilWaterPolicy;
use super::readings::{DailyIrrigation, DailyPrecipitation};
use crate::errors::ClimateError;

/// Number of leading window dates in the fill phase.
pub const FILL_PHASE_DAYS: usize = 14;

/// Legacy treatment IDs of the control branch.
const CONTROL_TREATMENT_IDS: [i64; 2] = [169, 171];
/// Legacy treatment ID of the stress branch.
const STRESS_TREATMENT_ID: i64 = 170;

/// Experimental branch of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Treatment {
    Control,
    Stress,
}

impl Treatment {
    pub const ALL: [Treatment; 2] = [Treatment::Control, Treatment::Stress];

    /// Map a raw irrigation treatment ID to its branch.
    pub fn from_id(treatment_id: i64) -> Result<Self, ClimateError> {
        if CONTROL_TREATMENT_IDS.contains(&treatment_id) {
            Ok(Treatment::Control)
        } else if treatment_id == STRESS_TREATMENT_ID {
            Ok(Treatment::Stress)
        } else {
            Err(ClimateError::InvalidTreatment(treatment_id))
        }
    }
}

/// Consecutive, ascending calendar dates of a trial (planting + 14 days up
/// to termination, inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialWindow {
    dates: Vec<NaiveDate>,
}

impl TrialWindow {
    /// All dates from `start` to `end`, inclusive. Empty if `end < start`.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: start.iter_days().take_while(|d| *d <= end).collect(),
        }
    }

    /// Validate an arbitrary date sequence as a window.
    pub fn from_dates(dates: Vec<NaiveDate>) -> Result<Self, ClimateError> {
        for pair in dates.windows(2) {
            let expected = pair[0] + Duration::days(1);
            if pair[1] != expected {
                return Err(ClimateError::NonConsecutiveWindow {
                    expected,
                    found: pair[1],
                });
            }
        }
        Ok(Self { dates })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Soil water per date for the treatments present on that date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailySoilWater {
    pub control: Option<f64>,
    pub stress: Option<f64>,
}

impl DailySoilWater {
    fn get(&self, treatment: Treatment) -> Option<f64> {
        match treatment {
            Treatment::Control => self.control,
            Treatment::Stress => self.stress,
        }
    }

    fn set(&mut self, treatment: Treatment, level: f64) {
        match treatment {
            Treatment::Control => self.control = Some(level),
            Treatment::Stress => self.stress = Some(level),
        }
    }
}

/// Simulated soil water levels, keyed by date.
///
/// A treatment without a recorded value on a date (an irrigation day that
/// only listed the other branch) reads as 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SoilWaterState {
    days: BTreeMap<NaiveDate, DailySoilWater>,
}

impl SoilWaterState {
    /// Level on `date` for `treatment`, 0.0 if unrecorded.
    pub fn level(&self, date: NaiveDate, treatment: Treatment) -> f64 {
        self.get(date, treatment).unwrap_or(0.0)
    }

    pub fn get(&self, date: NaiveDate, treatment: Treatment) -> Option<f64> {
        self.days.get(&date).and_then(|day| day.get(treatment))
    }

    /// Level of the calendar day before `date`.
    fn previous_level(&self, date: NaiveDate, treatment: Treatment) -> f64 {
        date.pred_opt()
            .map(|yesterday| self.level(yesterday, treatment))
            .unwrap_or(0.0)
    }

    /// Every simulated date with the level of `treatment` on it.
    pub fn series(&self, treatment: Treatment) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.days
            .iter()
            .map(move |(date, day)| (*date, day.get(treatment).unwrap_or(0.0)))
    }

    fn record(&mut self, date: NaiveDate, treatment: Treatment, level: f64) {
        self.days.entry(date).or_default().set(treatment, level);
    }
}

/// Soil parameters of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoilProfile {
    pub soil_volume: f64,
    /// Not part of the balance; carried for reporting.
    pub available_moisture_capacity: f64,
}

impl SoilProfile {
    /// Both values must be finite and the soil volume must not be negative;
    /// a NaN volume would disable the upper clamp of the balance.
    pub fn new(soil_volume: f64, available_moisture_capacity: f64) -> Result<Self, ClimateError> {
        if !soil_volume.is_finite() || soil_volume < 0.0 {
            return Err(ClimateError::InvalidSoilProfile(format!(
                "soil volume must be a finite, non-negative number, got {}",
                soil_volume
            )));
        }
        if !available_moisture_capacity.is_finite() {
            return Err(ClimateError::InvalidSoilProfile(format!(
                "available moisture capacity must be a finite number, got {}",
                available_moisture_capacity
            )));
        }
        Ok(Self {
            soil_volume,
            available_moisture_capacity,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fill,
    Steady,
}

/// Water entering the soil of `treatment` on one day.
fn water_gain(
    policy: SoilWaterPolicy,
    phase: Phase,
    treatment: Treatment,
    precipitation: f64,
    irrigation: f64,
) -> f64 {
    match (policy, phase, treatment) {
        (SoilWaterPolicy::RainShelter, Phase::Fill, Treatment::Stress) => irrigation,
        _ => precipitation + irrigation,
    }
}

/// Run the balance over the whole window for both treatments.
///
/// Days with irrigation amounts update only the treatments named in those
/// rows; days without (or with amount-less rows only) apply the
/// precipitation-only gain to both treatments.
pub fn simulate_soil_water(
    window: &TrialWindow,
    precipitation: &DailyPrecipitation,
    evaporation: &DailyEvaporation,
    irrigation: &DailyIrrigation,
    soil: SoilProfile,
    policy: SoilWaterPolicy,
) -> Result<SoilWaterState, ClimateError> {
    let mut state = SoilWaterState::default();

    for (index, &day) in window.dates().iter().enumerate() {
        let phase = if index < FILL_PHASE_DAYS {
            Phase::Fill
        } else {
            Phase::Steady
        };
        let rain = precipitation.get(&day).copied().unwrap_or(0.0);
        let loss = match phase {
            Phase::Fill => 0.0,
            Phase::Steady => evaporation.get(&day).copied().unwrap_or(0.0),
        };

        let applied: Vec<(i64, f64)> = irrigation
            .get(&day)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.amount.map(|amount| (entry.treatment_id, amount)))
            .collect();
        let gains: Vec<(Treatment, f64)> = if applied.is_empty() {
            Treatment::ALL.iter().map(|&t| (t, 0.0)).collect()
        } else {
            applied
                .into_iter()
                .map(|(treatment_id, amount)| Treatment::from_id(treatment_id).map(|t| (t, amount)))
                .collect::<Result<_, _>>()?
        };

        for (treatment, irrigation_amount) in gains {
            // The shelter went up by hand at the end of the fill phase
            let source = if policy == SoilWaterPolicy::RainShelter && index == FILL_PHASE_DAYS {
                Treatment::Control
            } else {
                treatment
            };
            let yesterday = state.previous_level(day, source);
            let gain = water_gain(policy, phase, treatment, rain, irrigation_amount);
            let level = (yesterday - loss + gain).min(soil.soil_volume).max(0.0);
            state.record(day, treatment, level);
        }
    }

    Ok(state)
}
