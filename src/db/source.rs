//! Data access for the stress engine.
//!
//! [`TrialDataSource`] is the handle the orchestrator receives; the MySQL
//! implementation runs the trial queries, [`TrialSnapshot`] serves frozen
//! in-memory data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::models::{ClimateRow, IrrigationRow, PrecipitationRow, RadiationRow, TrialDatesRow};
use super::queries;
use crate::errors::ClimateError;
use crate::helpers::{dec_to_f64, opt_dec_to_f64};
use crate::services::climate::fetch_trial_data;
use crate::services::readings::{
    DailyIrrigation, DailyPrecipitation, HourlyClimateReading, HourlyRadiationReading,
    IrrigationEntry,
};
use crate::services::soil_water::TrialWindow;

/// Raw per-trial feeds, keyed by culture ID.
#[allow(async_fn_in_trait)]
pub trait TrialDataSource {
    async fn trial_window(&self, culture_id: i64) -> Result<TrialWindow, ClimateError>;
    async fn precipitation(&self, culture_id: i64) -> Result<DailyPrecipitation, ClimateError>;
    async fn irrigation(&self, culture_id: i64) -> Result<DailyIrrigation, ClimateError>;
    async fn hourly_climate(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyClimateReading>, ClimateError>;
    async fn hourly_radiation(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyRadiationReading>, ClimateError>;
}

/// Build the trial window from the culture's start/end dates.
pub(crate) fn window_from_dates(
    culture_id: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<TrialWindow, ClimateError> {
    let invalid = |message: &str| ClimateError::InvalidTrialDates {
        culture_id,
        message: message.to_string(),
    };
    let start = start.ok_or_else(|| invalid("planting date is missing"))?;
    let end = end.ok_or_else(|| invalid("termination date is missing"))?;
    if end < start {
        return Err(ClimateError::InvalidTrialDates {
            culture_id,
            message: format!("termination {} precedes window start {}", end, start),
        });
    }
    Ok(TrialWindow::between(start, end))
}

fn precipitation_from_rows(rows: Vec<PrecipitationRow>) -> DailyPrecipitation {
    rows.into_iter()
        .filter_map(|row| row.amount.map(|amount| (row.day, dec_to_f64(amount))))
        .collect()
}

fn irrigation_from_rows(rows: Vec<IrrigationRow>) -> DailyIrrigation {
    let mut irrigation = DailyIrrigation::new();
    for row in rows {
        irrigation.entry(row.day).or_default().push(IrrigationEntry {
            amount: row.amount.map(dec_to_f64),
            treatment_id: row.treatment_id,
        });
    }
    irrigation
}

fn climate_from_rows(rows: Vec<ClimateRow>) -> Vec<HourlyClimateReading> {
    rows.into_iter()
        .map(|row| HourlyClimateReading {
            timestamp: row.measured_at,
            temperature_c: opt_dec_to_f64(row.temperature),
            windspeed_ms: opt_dec_to_f64(row.windspeed),
            relative_humidity_pct: opt_dec_to_f64(row.rel_humidity),
        })
        .collect()
}

fn radiation_from_rows(rows: Vec<RadiationRow>) -> Vec<HourlyRadiationReading> {
    rows.into_iter()
        .map(|row| HourlyRadiationReading {
            timestamp: row.measured_at,
            radiation: row.amount.map(dec_to_f64).unwrap_or(0.0),
        })
        .collect()
}

/// Trial feeds from the MySQL trial database.
#[derive(Debug, Clone)]
pub struct MySqlTrialSource {
    pool: MySqlPool,
}

impl MySqlTrialSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl TrialDataSource for MySqlTrialSource {
    async fn trial_window(&self, culture_id: i64) -> Result<TrialWindow, ClimateError> {
        let TrialDatesRow {
            start_date,
            end_date,
        } = queries::get_trial_dates(&self.pool, culture_id)
            .await?
            .ok_or(ClimateError::TrialNotFound(culture_id))?;
        window_from_dates(culture_id, start_date, end_date)
    }

    async fn precipitation(&self, culture_id: i64) -> Result<DailyPrecipitation, ClimateError> {
        let rows = queries::get_precipitation(&self.pool, culture_id).await?;
        tracing::debug!(culture_id, rows = rows.len(), "Fetched precipitation");
        Ok(precipitation_from_rows(rows))
    }

    async fn irrigation(&self, culture_id: i64) -> Result<DailyIrrigation, ClimateError> {
        let rows = queries::get_irrigation(&self.pool, culture_id).await?;
        tracing::debug!(culture_id, rows = rows.len(), "Fetched irrigation");
        Ok(irrigation_from_rows(rows))
    }

    async fn hourly_climate(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyClimateReading>, ClimateError> {
        let rows = queries::get_hourly_climate(&self.pool, culture_id).await?;
        tracing::debug!(culture_id, rows = rows.len(), "Fetched hourly climate");
        Ok(climate_from_rows(rows))
    }

    async fn hourly_radiation(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyRadiationReading>, ClimateError> {
        let rows = queries::get_hourly_radiation(&self.pool, culture_id).await?;
        tracing::debug!(culture_id, rows = rows.len(), "Fetched hourly radiation");
        Ok(radiation_from_rows(rows))
    }
}

/// A frozen, in-memory copy of one trial's feeds.
///
/// Snapshots can be captured from any source and saved as JSON, so a trial
/// can be re-analysed without database access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialSnapshot {
    pub culture_id: i64,
    /// Window dates; must be consecutive.
    pub window: Vec<NaiveDate>,
    pub precipitation: DailyPrecipitation,
    pub irrigation: DailyIrrigation,
    pub climate: Vec<HourlyClimateReading>,
    pub radiation: Vec<HourlyRadiationReading>,
}

impl TrialSnapshot {
    /// Fetch every feed of a trial from `source`.
    pub async fn capture<S: TrialDataSource>(
        source: &S,
        culture_id: i64,
    ) -> Result<Self, ClimateError> {
        let data = fetch_trial_data(source, culture_id).await?;
        Ok(Self {
            culture_id,
            window: data.window.dates().to_vec(),
            precipitation: data.precipitation,
            irrigation: data.irrigation,
            climate: data.climate,
            radiation: data.radiation,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ClimateError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClimateError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn check(&self, culture_id: i64) -> Result<(), ClimateError> {
        if culture_id == self.culture_id {
            Ok(())
        } else {
            Err(ClimateError::TrialNotFound(culture_id))
        }
    }
}

impl TrialDataSource for TrialSnapshot {
    async fn trial_window(&self, culture_id: i64) -> Result<TrialWindow, ClimateError> {
        self.check(culture_id)?;
        TrialWindow::from_dates(self.window.clone())
    }

    async fn precipitation(&self, culture_id: i64) -> Result<DailyPrecipitation, ClimateError> {
        self.check(culture_id)?;
        Ok(self.precipitation.clone())
    }

    async fn irrigation(&self, culture_id: i64) -> Result<DailyIrrigation, ClimateError> {
        self.check(culture_id)?;
        Ok(self.irrigation.clone())
    }

    async fn hourly_climate(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyClimateReading>, ClimateError> {
        self.check(culture_id)?;
        Ok(self.climate.clone())
    }

    async fn hourly_radiation(
        &self,
        culture_id: i64,
    ) -> Result<Vec<HourlyRadiationReading>, ClimateError> {
        self.check(culture_id)?;
        Ok(self.radiation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn test_window_from_dates() {
        let window = window_from_dates(1, Some(date("2012-05-01")), Some(date("2012-05-03"))).unwrap();
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_missing_dates() {
        let err = window_from_dates(7, None, Some(date("2012-05-03"))).unwrap_err();
        assert!(matches!(err, ClimateError::InvalidTrialDates { culture_id: 7, .. }));
        assert!(window_from_dates(7, Some(date("2012-05-03")), None).is_err());
    }

    #[test]
    fn test_window_inverted_dates() {
        let err = window_from_dates(7, Some(date("2012-06-01")), Some(date("2012-05-01")))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_trial_dates");
    }

    #[test]
    fn test_irrigation_rows_grouped_by_day() {
        let rows = vec![
            IrrigationRow {
                day: date("2012-06-01"),
                amount: Some(dec("10.5")),
                treatment_id: 169,
            },
            IrrigationRow {
                day: date("2012-06-01"),
                amount: Some(dec("2")),
                treatment_id: 170,
            },
            IrrigationRow {
                day: date("2012-06-02"),
                amount: None,
                treatment_id: 170,
            },
        ];
        let irrigation = irrigation_from_rows(rows);
        assert_eq!(irrigation.len(), 2);
        assert_eq!(
            irrigation[&date("2012-06-01")],
            vec![
                IrrigationEntry {
                    amount: Some(10.5),
                    treatment_id: 169
                },
                IrrigationEntry {
                    amount: Some(2.0),
                    treatment_id: 170
                },
            ]
        );
        // Kept so the trial still counts as irrigated
        assert_eq!(
            irrigation[&date("2012-06-02")],
            vec![IrrigationEntry {
                amount: None,
                treatment_id: 170
            }]
        );
    }

    #[test]
    fn test_precipitation_skips_null() {
        let rows = vec![
            PrecipitationRow {
                day: date("2012-06-01"),
                amount: Some(dec("1.2")),
            },
            PrecipitationRow {
                day: date("2012-06-02"),
                amount: None,
            },
        ];
        let precipitation = precipitation_from_rows(rows);
        assert_eq!(precipitation.len(), 1);
        assert_eq!(precipitation[&date("2012-06-01")], 1.2);
    }

    #[test]
    fn test_climate_keeps_missing_values() {
        let rows = vec![ClimateRow {
            measured_at: NaiveDateTime::parse_from_str("2012-06-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            temperature: None,
            windspeed: Some(dec("3.1")),
            rel_humidity: Some(dec("0")),
        }];
        let climate = climate_from_rows(rows);
        assert_eq!(climate[0].temperature_c, None);
        assert_eq!(climate[0].windspeed_ms, Some(3.1));
        assert_eq!(climate[0].relative_humidity_pct, Some(0.0));
    }

    #[test]
    fn test_radiation_null_is_dark() {
        let rows = vec![RadiationRow {
            measured_at: NaiveDateTime::parse_from_str("2012-06-01 22:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            amount: None,
        }];
        assert_eq!(radiation_from_rows(rows)[0].radiation, 0.0);
    }

    fn snapshot() -> TrialSnapshot {
        TrialSnapshot {
            culture_id: 1,
            window: vec![date("2012-06-01"), date("2012-06-02")],
            precipitation: [(date("2012-06-01"), 3.5)].into_iter().collect(),
            irrigation: [(
                date("2012-06-02"),
                vec![IrrigationEntry {
                    amount: Some(4.0),
                    treatment_id: 170,
                }],
            )]
            .into_iter()
            .collect(),
            climate: vec![HourlyClimateReading {
                timestamp: NaiveDateTime::parse_from_str(
                    "2012-06-01 10:00:00",
                    "%Y-%m-%d %H:%M:%S",
                )
                .unwrap(),
                temperature_c: Some(14.5),
                windspeed_ms: None,
                relative_humidity_pct: Some(81.0),
            }],
            radiation: Vec::new(),
        }
    }

    #[test]
    fn test_snapshot_rejects_non_consecutive_window() {
        let mut gappy = snapshot();
        gappy.window.push(date("2012-06-04"));
        let err = tokio_test::block_on(gappy.trial_window(1)).unwrap_err();
        assert!(matches!(err, ClimateError::NonConsecutiveWindow { .. }));
    }

    #[test]
    fn test_snapshot_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("culture-1.json");
        let original = snapshot();
        original.save(&path).unwrap();

        let loaded = TrialSnapshot::load(&path).unwrap();
        assert_eq!(loaded.window, original.window);
        assert_eq!(loaded.precipitation, original.precipitation);
        assert_eq!(loaded.irrigation, original.irrigation);
        assert_eq!(loaded.climate, original.climate);
    }

    #[test]
    fn test_capture_copies_all_feeds() {
        let original = snapshot();
        let captured = tokio_test::block_on(TrialSnapshot::capture(&original, 1)).unwrap();
        assert_eq!(captured.window, original.window);
        assert_eq!(captured.irrigation, original.irrigation);
        assert_eq!(captured.climate.len(), 1);
    }

    #[test]
    fn test_snapshot_rejects_other_culture() {
        let snapshot = TrialSnapshot {
            culture_id: 1,
            ..TrialSnapshot::default()
        };
        let err = tokio_test::block_on(snapshot.precipitation(2)).unwrap_err();
        assert!(matches!(err, ClimateError::TrialNotFound(2)));
    }
}
