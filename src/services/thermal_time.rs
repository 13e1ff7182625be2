//! Thermal time (heat sum) and weekly midday vapour pressure deficit.
//!
//! Weeks are numbered the way `%W` numbers them: a week starts on Monday and
//! the days before the first Monday of a year fall into week 0.

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::evaporation::vapour_pressure_deficit;
use super::readings::HourlyClimateReading;
use super::temperature::daily_min_max;
use crate::db::source::TrialDataSource;
use crate::errors::ClimateError;

/// Base temperature (°C) below which no thermal time accrues.
pub const THERMAL_BASE_TEMPERATURE: f64 = 6.0;

/// Daily maxima are capped at this temperature (°C).
pub const THERMAL_MAX_TEMPERATURE: f64 = 30.0;

/// Weekday whose cumulative heat sum represents the week. Friday closes the
/// weekly measuring interval of many DWD stations.
pub const DEFAULT_SAMPLE_WEEKDAY: Weekday = Weekday::Fri;

/// Midday window (hour, minute, second) for the VPD, both ends inclusive.
const MIDDAY_START: (u32, u32, u32) = (10, 0, 0);
const MIDDAY_END: (u32, u32, u32) = (14, 0, 0);

/// A `%Y-%W` calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CalendarWeek {
    pub year: i32,
    pub week: u32,
}

impl CalendarWeek {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            week: (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7,
        }
    }
}

impl fmt::Display for CalendarWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.week)
    }
}

/// One row of the weekly climate summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeeklyClimate {
    pub week: CalendarWeek,
    /// Mean of the daily median midday VPD (kPa).
    pub midday_vpd: f64,
    /// Cumulative heat sum (°C·d) on the sample weekday.
    pub heat_sum: f64,
}

/// Thermal time of one day: `max((t_min + min(t_max, 30)) / 2 - base, 0)`.
pub fn daily_heat_sum(t_min: f64, t_max: f64, base: f64) -> f64 {
    let t_mean = (t_min + t_max.min(THERMAL_MAX_TEMPERATURE)) / 2.0;
    (t_mean - base).max(0.0)
}

/// Running heat sum over days in date order.
pub fn cumulative_heat_sum(
    extremes: &BTreeMap<NaiveDate, (f64, f64)>,
    base: f64,
) -> BTreeMap<NaiveDate, f64> {
    extremes
        .iter()
        .scan(0.0, |total, (day, &(t_min, t_max))| {
            *total += daily_heat_sum(t_min, t_max, base);
            Some((*day, *total))
        })
        .collect()
}

/// Cumulative heat sum sampled on `weekday` of every week.
pub fn weekly_heat_sum(
    cumulative: &BTreeMap<NaiveDate, f64>,
    weekday: Weekday,
) -> BTreeMap<CalendarWeek, f64> {
    cumulative
        .iter()
        .filter(|(day, _)| day.weekday() == weekday)
        .map(|(day, total)| (CalendarWeek::of(*day), *total))
        .collect()
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Weekly mean of the daily median VPD between 10:00 and 14:00. Hours
/// without both temperature and humidity are skipped.
pub fn weekly_midday_vpd(climate: &[HourlyClimateReading]) -> BTreeMap<CalendarWeek, f64> {
    let mut daily: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for reading in climate {
        let time = reading.timestamp.time();
        let hms = (time.hour(), time.minute(), time.second());
        if hms < MIDDAY_START || hms > MIDDAY_END {
            continue;
        }
        if let (Some(t), Some(rh)) = (reading.temperature_c, reading.relative_humidity_pct) {
            daily
                .entry(reading.date())
                .or_default()
                .push(vapour_pressure_deficit(t, rh / 100.0));
        }
    }

    let mut weekly: BTreeMap<CalendarWeek, Vec<f64>> = BTreeMap::new();
    for (day, mut values) in daily {
        weekly
            .entry(CalendarWeek::of(day))
            .or_default()
            .push(median(&mut values));
    }

    weekly
        .into_iter()
        .map(|(week, medians)| (week, medians.iter().sum::<f64>() / medians.len() as f64))
        .collect()
}

/// Weeks that have both a midday VPD and a sampled heat sum, in week order.
pub fn weekly_climate(climate: &[HourlyClimateReading], sample_day: Weekday) -> Vec<WeeklyClimate> {
    let heat = weekly_heat_sum(
        &cumulative_heat_sum(&daily_min_max(climate), THERMAL_BASE_TEMPERATURE),
        sample_day,
    );
    weekly_midday_vpd(climate)
        .into_iter()
        .filter_map(|(week, midday_vpd)| {
            heat.get(&week).map(|&heat_sum| WeeklyClimate {
                week,
                midday_vpd,
                heat_sum,
            })
        })
        .collect()
}

/// Fetch a trial's hourly climate and summarise it per week.
pub async fn weekly_climate_for_trial<S: TrialDataSource>(
    source: &S,
    culture_id: i64,
    sample_day: Weekday,
) -> Result<Vec<WeeklyClimate>, ClimateError> {
    let climate = source.hourly_climate(culture_id).await?;
    let weeks = weekly_climate(&climate, sample_day);
    tracing::debug!(
        culture_id,
        hours = climate.len(),
        weeks = weeks.len(),
        "Weekly climate computed"
    );
    if weeks.is_empty() {
        return Err(ClimateError::InsufficientData {
            metric: "weekly climate",
            bucket: "whole trial",
        });
    }
    Ok(weeks)
}
