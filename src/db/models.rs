use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// First and last date of a trial window (planting + 14 days, termination).
#[derive(Debug, Clone, FromRow)]
pub struct TrialDatesRow {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Daily precipitation at the trial's location.
#[derive(Debug, Clone, FromRow)]
pub struct PrecipitationRow {
    pub day: NaiveDate,
    pub amount: Option<Decimal>,
}

/// One irrigation event. A day may have one row per treatment.
#[derive(Debug, Clone, FromRow)]
pub struct IrrigationRow {
    pub day: NaiveDate,
    pub amount: Option<Decimal>,
    /// 169/171 = control, 170 = stress
    pub treatment_id: i64,
}

/// Hourly station values. Temperature and humidity come from left joins and
/// are NULL whenever the station has no valid value for the hour.
#[derive(Debug, Clone, FromRow)]
pub struct ClimateRow {
    pub measured_at: NaiveDateTime,
    pub temperature: Option<Decimal>,
    pub windspeed: Option<Decimal>,
    pub rel_humidity: Option<Decimal>,
}

/// Hourly synthetic solar radiation for the trial's location.
#[derive(Debug, Clone, FromRow)]
pub struct RadiationRow {
    pub measured_at: NaiveDateTime,
    pub amount: Option<Decimal>,
}
