//! Per-trial exceptions to the standard soil-water and irrigation handling.
//!
//! These are site anomalies recorded in the field, not modelling choices:
//! - Cultures 56875 and 62327 sit under a fixed rain-exclusion shelter.
//!   The stress plots receive no precipitation while the soil fills up, and
//!   the shelter was installed by hand at the end of the fill phase, so the
//!   first steady-state day of both treatments starts from the control level.
//! - Cultures 47109 and 56879 have irrigation rows, but the rows do not
//!   distinguish control from stress. Drought counting treats them as
//!   unirrigated.
//!
//! The list is empirical and may be incomplete; extend the table rather than
//! adding conditionals to the balance code.

/// How the soil water balance treats precipitation for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoilWaterPolicy {
    #[default]
    Standard,
    /// Stress plots are covered by a fixed rain shelter.
    RainShelter,
}

/// How drought counting interprets the irrigation feed of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrrigationPolicy {
    #[default]
    PerTreatment,
    /// Irrigation rows exist but do not separate the treatments.
    Undistinguished,
}

/// The combined override policy for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrialOverride {
    pub soil_water: SoilWaterPolicy,
    pub irrigation: IrrigationPolicy,
}

/// Lookup table from culture ID to override policy.
#[derive(Debug, Clone)]
pub struct TrialOverrides {
    entries: Vec<(i64, TrialOverride)>,
}

const RAIN_SHELTER_CULTURES: [i64; 2] = [56875, 62327];
const UNDISTINGUISHED_IRRIGATION_CULTURES: [i64; 2] = [47109, 56879];

impl TrialOverrides {
    /// An empty table: every trial uses the standard rules.
    pub fn none() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Set (or replace) the policy for one culture.
    pub fn with(mut self, culture_id: i64, policy: TrialOverride) -> Self {
        self.entries.retain(|(id, _)| *id != culture_id);
        self.entries.push((culture_id, policy));
        self
    }

    pub fn lookup(&self, culture_id: i64) -> TrialOverride {
        self.entries
            .iter()
            .find(|(id, _)| *id == culture_id)
            .map(|(_, policy)| *policy)
            .unwrap_or_default()
    }
}

impl Default for TrialOverrides {
    /// The known site anomalies.
    fn default() -> Self {
        let shelter = TrialOverride {
            soil_water: SoilWaterPolicy::RainShelter,
            ..TrialOverride::default()
        };
        let undistinguished = TrialOverride {
            irrigation: IrrigationPolicy::Undistinguished,
            ..TrialOverride::default()
        };

        let table = RAIN_SHELTER_CULTURES
            .iter()
            .fold(Self::none(), |table, &id| table.with(id, shelter));
        UNDISTINGUISHED_IRRIGATION_CULTURES
            .iter()
            .fold(table, |table, &id| table.with(id, undistinguished))
    }
}
