//! Stress indicator resolution for a single trial.
//!
//! Fetches the raw feeds through a [`TrialDataSource`], then runs
//! evaporation → soil water → drought counting, plus the temperature and
//! light aggregators on the same readings, and assembles a [`StressReport`].

use chrono::NaiveDate;
use serde::Serialize;

use super::drought::{drought_stress, DroughtStress};
use super::evaporation::daily_evaporation;
use super::light::light_intensity;
use super::overrides::{IrrigationPolicy, TrialOverrides};
use super::readings::{
    BeforeAfter, DailyIrrigation, DailyPrecipitation, HourlyClimateReading,
    HourlyRadiationReading,
};
use super::soil_water::{simulate_soil_water, SoilProfile, TrialWindow};
use super::temperature::{temperature_stress, TemperatureStress};
use crate::db::source::TrialDataSource;
use crate::errors::ClimateError;

/// Default cold stress lower bound (°C).
const DEFAULT_TLB: f64 = 8.0;
/// Default heat stress upper bound (°C).
const DEFAULT_TUB: f64 = 30.0;
/// Default soil water level below which a day is drought-stressed.
const DEFAULT_DROUGHT_THRESHOLD: f64 = 10.0;

/// Thresholds shared by all trials of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StressThresholds {
    pub tlb: f64,
    pub tub: f64,
    pub drought_threshold: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            tlb: DEFAULT_TLB,
            tub: DEFAULT_TUB,
            drought_threshold: DEFAULT_DROUGHT_THRESHOLD,
        }
    }
}

/// Per-trial parameters (one line of a batch parameter file).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialParams {
    pub culture_id: i64,
    pub flowering_date: NaiveDate,
    pub soil: SoilProfile,
}

/// Everything the engine needs about one trial, already in memory.
#[derive(Debug, Clone)]
pub struct TrialData {
    pub window: TrialWindow,
    pub precipitation: DailyPrecipitation,
    pub irrigation: DailyIrrigation,
    pub climate: Vec<HourlyClimateReading>,
    pub radiation: Vec<HourlyRadiationReading>,
}

/// Run-wide settings: thresholds and the trial override table.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSettings {
    pub thresholds: StressThresholds,
    pub overrides: TrialOverrides,
}

/// Stress indicators of one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    pub culture_id: i64,
    /// True iff the irrigation feed had at least one row.
    pub has_irrigation: bool,
    pub temperature_stress: TemperatureStress,
    pub drought_stress: DroughtStress,
    pub light_intensity: BeforeAfter<f64>,
}

/// Load all feeds of a trial from the data source.
pub async fn fetch_trial_data<S: TrialDataSource>(
    source: &S,
    culture_id: i64,
) -> Result<TrialData, ClimateError> {
    let (window, precipitation, irrigation, climate, radiation) = futures::try_join!(
        source.trial_window(culture_id),
        source.precipitation(culture_id),
        source.irrigation(culture_id),
        source.hourly_climate(culture_id),
        source.hourly_radiation(culture_id),
    )?;
    Ok(TrialData {
        window,
        precipitation,
        irrigation,
        climate,
        radiation,
    })
}

/// Compute the report from materialised trial data. Pure and deterministic.
pub fn compute_report(
    params: &TrialParams,
    data: &TrialData,
    settings: &AnalysisSettings,
) -> Result<StressReport, ClimateError> {
    let flowering = params.flowering_date;
    let thresholds = settings.thresholds;
    let policy = settings.overrides.lookup(params.culture_id);

    let temperature =
        temperature_stress(&data.climate, flowering, thresholds.tlb, thresholds.tub);

    if data.window.is_empty() {
        return Err(ClimateError::InsufficientData {
            metric: "soil water",
            bucket: "whole trial",
        });
    }

    let evaporation = daily_evaporation(&data.climate);
    if evaporation.is_empty() {
        return Err(ClimateError::InsufficientData {
            metric: "evaporation",
            bucket: "whole trial",
        });
    }

    let soil_water = simulate_soil_water(
        &data.window,
        &data.precipitation,
        &evaporation,
        &data.irrigation,
        params.soil,
        policy.soil_water,
    )?;

    let has_irrigation = !data.irrigation.is_empty();
    let per_treatment = has_irrigation && policy.irrigation == IrrigationPolicy::PerTreatment;
    let drought = drought_stress(
        &soil_water,
        flowering,
        thresholds.drought_threshold,
        per_treatment,
    );

    let light = light_intensity(&data.radiation, flowering)?;

    Ok(StressReport {
        culture_id: params.culture_id,
        has_irrigation,
        temperature_stress: temperature,
        drought_stress: drought,
        light_intensity: light,
    })
}

/// Fetch and analyse one trial.
pub async fn analyze_trial<S: TrialDataSource>(
    source: &S,
    params: &TrialParams,
    settings: &AnalysisSettings,
) -> Result<StressReport, ClimateError> {
    tracing::debug!(
        culture_id = params.culture_id,
        flowering_date = %params.flowering_date,
        soil_volume = params.soil.soil_volume,
        available_moisture_capacity = params.soil.available_moisture_capacity,
        "Analysing trial"
    );

    let data = fetch_trial_data(source, params.culture_id).await?;
    let report = compute_report(params, &data, settings)?;

    tracing::debug!(
        culture_id = params.culture_id,
        window_days = data.window.len(),
        has_irrigation = report.has_irrigation,
        "Trial analysed"
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::source::TrialSnapshot;
    use crate::services::readings::IrrigationEntry;
    use chrono::{Duration, NaiveDateTime};

    pub(crate) fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 6, 1).unwrap() + Duration::days(n)
    }

    fn hour(n: i64, h: u32) -> NaiveDateTime {
        day(n).and_hms_opt(h, 0, 0).unwrap()
    }

    /// 20 consecutive days, flowering on day 10, no irrigation.
    pub(crate) fn snapshot(culture_id: i64) -> TrialSnapshot {
        let mut climate = Vec::new();
        let mut radiation = Vec::new();
        for n in 0..20 {
            for (h, t) in [(4, 5.0 + n as f64 * 0.2), (14, 26.0 + n as f64 * 0.4)] {
                climate.push(HourlyClimateReading {
                    timestamp: hour(n, h),
                    temperature_c: Some(t),
                    windspeed_ms: Some(2.5),
                    relative_humidity_pct: Some(65.0),
                });
            }
            radiation.push(HourlyRadiationReading {
                timestamp: hour(n, 12),
                radiation: 300.0 + n as f64,
            });
            radiation.push(HourlyRadiationReading {
                timestamp: hour(n, 0),
                radiation: 0.0,
            });
        }
        TrialSnapshot {
            culture_id,
            window: (0..20).map(day).collect(),
            precipitation: (0..20).map(|n| (day(n), if n < 5 { 4.0 } else { 0.5 })).collect(),
            irrigation: DailyIrrigation::new(),
            climate,
            radiation,
        }
    }

    pub(crate) fn params(culture_id: i64) -> TrialParams {
        TrialParams {
            culture_id,
            flowering_date: day(10),
            soil: SoilProfile {
                soil_volume: 42.0,
                available_moisture_capacity: 0.14,
            },
        }
    }

    #[test]
    fn test_unirrigated_trial_reports_single_drought_tuple() {
        let source = snapshot(56878);
        let report = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap();

        assert!(!report.has_irrigation);
        assert!(matches!(report.drought_stress, DroughtStress::Combined { .. }));
        assert!(report.temperature_stress.cold.before > 0.0);
        assert!(report.light_intensity.before > 0.0);
        assert!(report.light_intensity.after > report.light_intensity.before);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let source = snapshot(56878);
        let settings = AnalysisSettings::default();
        let first = tokio_test::block_on(analyze_trial(&source, &params(56878), &settings)).unwrap();
        let second = tokio_test::block_on(analyze_trial(&source, &params(56878), &settings)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_irrigated_trial_reports_both_treatments() {
        let mut source = snapshot(56878);
        source.irrigation.insert(
            day(15),
            vec![
                IrrigationEntry {
                    amount: Some(15.0),
                    treatment_id: 169,
                },
                IrrigationEntry {
                    amount: Some(1.0),
                    treatment_id: 170,
                },
            ],
        );
        let report = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap();

        assert!(report.has_irrigation);
        match report.drought_stress {
            DroughtStress::PerTreatment { control, stress } => {
                assert!(stress.after >= control.after);
            }
            other => panic!("expected per-treatment drought stress, got {other:?}"),
        }
    }

    #[test]
    fn test_undistinguished_irrigation_counts_as_unirrigated() {
        let mut source = snapshot(47109);
        source.irrigation.insert(
            day(15),
            vec![IrrigationEntry {
                amount: Some(15.0),
                treatment_id: 171,
            }],
        );
        let report = tokio_test::block_on(analyze_trial(
            &source,
            &params(47109),
            &AnalysisSettings::default(),
        ))
        .unwrap();

        assert!(report.has_irrigation);
        assert!(matches!(report.drought_stress, DroughtStress::Combined { .. }));
    }

    #[test]
    fn test_invalid_treatment_fails_trial() {
        let mut source = snapshot(56878);
        source.irrigation.insert(
            day(3),
            vec![IrrigationEntry {
                amount: Some(15.0),
                treatment_id: 99,
            }],
        );
        let err = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap_err();
        assert!(matches!(err, ClimateError::InvalidTreatment(99)));
    }

    #[test]
    fn test_missing_evaporation_fails_trial() {
        let mut source = snapshot(56878);
        for reading in &mut source.climate {
            reading.windspeed_ms = None;
        }
        let err = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ClimateError::InsufficientData {
                metric: "evaporation",
                ..
            }
        ));
    }

    #[test]
    fn test_irrigation_rows_without_amount_still_flag_irrigation() {
        let mut source = snapshot(56878);
        source.irrigation.insert(
            day(15),
            vec![IrrigationEntry {
                amount: None,
                treatment_id: 169,
            }],
        );
        let report = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap();

        assert!(report.has_irrigation);
        match report.drought_stress {
            DroughtStress::PerTreatment { control, stress } => assert_eq!(control, stress),
            other => panic!("expected per-treatment drought stress, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_window_fails_trial() {
        let mut source = snapshot(56878);
        source.window.clear();
        let err = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ClimateError::InsufficientData {
                metric: "soil water",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_light_before_flowering_fails_trial() {
        let mut source = snapshot(56878);
        source.radiation.retain(|r| r.timestamp.date() >= day(10));
        let err = tokio_test::block_on(analyze_trial(
            &source,
            &params(56878),
            &AnalysisSettings::default(),
        ))
        .unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn test_custom_thresholds_change_result() {
        let source = snapshot(56878);
        let strict = AnalysisSettings {
            thresholds: StressThresholds {
                tlb: 0.0,
                tub: 100.0,
                drought_threshold: 0.0,
            },
            overrides: TrialOverrides::default(),
        };
        let report = tokio_test::block_on(analyze_trial(&source, &params(56878), &strict)).unwrap();
        assert_eq!(report.temperature_stress, TemperatureStress::default());
        assert_eq!(
            report.drought_stress,
            DroughtStress::Combined {
                days: BeforeAfter::default()
            }
        );
    }
}
