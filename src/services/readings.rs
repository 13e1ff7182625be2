//! Raw per-trial readings as handed over by the data source, plus the
//! before/after-flowering split shared by every aggregator.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One hourly row from the weather station tables.
///
/// Any field may be missing during a sensor outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyClimateReading {
    pub timestamp: NaiveDateTime,
    pub temperature_c: Option<f64>,
    pub windspeed_ms: Option<f64>,
    /// Relative humidity in percent (0-100).
    pub relative_humidity_pct: Option<f64>,
}

impl HourlyClimateReading {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// One hourly solar radiation value. Values ≤ 0 mean "no light".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRadiationReading {
    pub timestamp: NaiveDateTime,
    pub radiation: f64,
}

/// A single irrigation row: amount and the raw treatment ID it was applied to.
///
/// A row without an amount still marks the trial as irrigated but adds no
/// water to the balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationEntry {
    pub amount: Option<f64>,
    pub treatment_id: i64,
}

/// Daily precipitation in mm.
pub type DailyPrecipitation = BTreeMap<NaiveDate, f64>;

/// Irrigation rows grouped by day, in feed order. A day has zero, one or two
/// entries (control and stress may be irrigated differently).
pub type DailyIrrigation = BTreeMap<NaiveDate, Vec<IrrigationEntry>>;

/// A metric split at the flowering date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BeforeAfter<T> {
    pub before: T,
    pub after: T,
}

impl<T> BeforeAfter<T> {
    /// Mutable access to the bucket `day` falls into: before when
    /// `day < flowering`, after otherwise.
    pub fn bucket_mut(&mut self, day: NaiveDate, flowering: NaiveDate) -> &mut T {
        if day < flowering {
            &mut self.before
        } else {
            &mut self.after
        }
    }
}
