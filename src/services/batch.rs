//! Batch analysis of a tab-separated parameter file.
//!
//! Each line holds `culture_id`, flowering date, soil volume and field
//! capacity. Lines are analysed concurrently with a bounded number of trials
//! in flight; results come back in input order. A failing line is logged and
//! skipped, it never aborts the batch.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::climate::{analyze_trial, AnalysisSettings, StressReport, TrialParams};
use super::soil_water::SoilProfile;
use crate::db::source::TrialDataSource;
use crate::errors::ClimateError;
use crate::helpers::parse_iso_date;

/// Number of columns in a parameter line.
const PARAMETER_COLUMNS: usize = 4;

/// One parsed line of the parameter file.
#[derive(Debug)]
pub struct ParameterLine {
    /// 1-based line number in the input file.
    pub line: usize,
    /// The line as read, fields re-joined with tabs.
    pub row: String,
    pub params: Result<TrialParams, ClimateError>,
}

/// A line that produced no report. The full context is logged when the
/// failure happens.
#[derive(Debug)]
pub struct TrialFailure {
    pub line: usize,
    pub error: ClimateError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Reports of the successful lines, in input order.
    pub reports: Vec<StressReport>,
    pub failures: Vec<TrialFailure>,
}

impl BatchOutcome {
    /// True when there was at least one line and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        self.reports.is_empty() && !self.failures.is_empty()
    }

    /// Number of failed lines per error kind.
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.error.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Input line numbers that produced no report, in input order.
    pub fn failed_lines(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.line).collect()
    }
}

/// Open and parse a parameter file. Only failing to open the file is an
/// error; malformed lines are returned as failed [`ParameterLine`]s.
pub fn read_parameter_file(path: &Path) -> Result<Vec<ParameterLine>, ClimateError> {
    let file = File::open(path)?;
    Ok(read_parameter_lines(file))
}

/// Parse tab-separated parameter lines. Blank lines are skipped.
pub fn read_parameter_lines<R: Read>(input: R) -> Vec<ParameterLine> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(input);

    reader
        .records()
        .enumerate()
        .map(|(index, record)| match record {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 1);
                ParameterLine {
                    line,
                    row: record.iter().collect::<Vec<_>>().join("\t"),
                    params: parse_parameter_record(line, &record),
                }
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 1);
                ParameterLine {
                    line,
                    row: String::new(),
                    params: Err(ClimateError::input_shape(line, e.to_string())),
                }
            }
        })
        .collect()
}

fn parse_parameter_record(
    line: usize,
    record: &csv::StringRecord,
) -> Result<TrialParams, ClimateError> {
    if record.len() != PARAMETER_COLUMNS {
        return Err(ClimateError::input_shape(
            line,
            format!(
                "expected {} columns, found {}",
                PARAMETER_COLUMNS,
                record.len()
            ),
        ));
    }

    let culture_id = record[0].parse::<i64>().map_err(|_| {
        ClimateError::input_shape(line, format!("culture id '{}' is not an integer", &record[0]))
    })?;
    let flowering_date = parse_iso_date(&record[1], line)?;
    let soil_volume = parse_number(line, "soil volume", &record[2])?;
    let available_moisture_capacity = parse_number(line, "field capacity", &record[3])?;
    let soil = SoilProfile::new(soil_volume, available_moisture_capacity)
        .map_err(|e| ClimateError::input_shape(line, e.to_string()))?;

    Ok(TrialParams {
        culture_id,
        flowering_date,
        soil,
    })
}

fn parse_number(line: usize, column: &str, raw: &str) -> Result<f64, ClimateError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ClimateError::input_shape(line, format!("{} '{}' is not a number", column, raw))
        })
}

/// Analyse every line, at most `max_concurrent` trials at a time.
pub async fn run_batch<S: TrialDataSource>(
    source: &S,
    lines: Vec<ParameterLine>,
    settings: &AnalysisSettings,
    max_concurrent: usize,
) -> BatchOutcome {
    let results: Vec<_> = stream::iter(lines)
        .map(|entry| async move {
            let ParameterLine { line, row, params } = entry;
            match params {
                Ok(params) => {
                    let result = analyze_trial(source, &params, settings).await;
                    (line, row, Some(params.culture_id), result)
                }
                Err(error) => (line, row, None, Err(error)),
            }
        })
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for (line, row, culture_id, result) in results {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(error) => {
                tracing::error!(
                    line,
                    culture_id = ?culture_id,
                    kind = error.kind(),
                    row = %row,
                    "Trial failed: {}",
                    error
                );
                outcome.failures.push(TrialFailure { line, error });
            }
        }
    }

    tracing::info!(
        succeeded = outcome.reports.len(),
        failed = outcome.failures.len(),
        "Batch finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::source::TrialSnapshot;
    use crate::services::climate::tests::snapshot;
    use crate::services::readings::{
        DailyIrrigation, DailyPrecipitation, HourlyClimateReading, HourlyRadiationReading,
    };
    use crate::services::soil_water::TrialWindow;
    use std::collections::HashMap;
    use std::io::Write;

    /// Serves several cultures from in-memory snapshots.
    struct Snapshots(HashMap<i64, TrialSnapshot>);

    impl Snapshots {
        fn of(ids: &[i64]) -> Self {
            Snapshots(ids.iter().map(|&id| (id, snapshot(id))).collect())
        }

        fn get(&self, culture_id: i64) -> Result<&TrialSnapshot, ClimateError> {
            self.0
                .get(&culture_id)
                .ok_or(ClimateError::TrialNotFound(culture_id))
        }
    }

    impl TrialDataSource for Snapshots {
        async fn trial_window(&self, culture_id: i64) -> Result<TrialWindow, ClimateError> {
            self.get(culture_id)?.trial_window(culture_id).await
        }

        async fn precipitation(&self, culture_id: i64) -> Result<DailyPrecipitation, ClimateError> {
            self.get(culture_id)?.precipitation(culture_id).await
        }

        async fn irrigation(&self, culture_id: i64) -> Result<DailyIrrigation, ClimateError> {
            self.get(culture_id)?.irrigation(culture_id).await
        }

        async fn hourly_climate(
            &self,
            culture_id: i64,
        ) -> Result<Vec<HourlyClimateReading>, ClimateError> {
            self.get(culture_id)?.hourly_climate(culture_id).await
        }

        async fn hourly_radiation(
            &self,
            culture_id: i64,
        ) -> Result<Vec<HourlyRadiationReading>, ClimateError> {
            self.get(culture_id)?.hourly_radiation(culture_id).await
        }
    }

    #[test]
    fn test_parse_valid_lines() {
        let input = "56878\t2012-06-11\t42\t0.14\n56879\t2012-06-12\t40.5\t0.12\n";
        let lines = read_parameter_lines(input.as_bytes());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].line, 2);
        assert_eq!(lines[1].row, "56879\t2012-06-12\t40.5\t0.12");

        let params = lines[0].params.as_ref().unwrap();
        assert_eq!(params.culture_id, 56878);
        assert_eq!(params.soil.soil_volume, 42.0);
        assert_eq!(params.soil.available_moisture_capacity, 0.14);
    }

    #[test]
    fn test_wrong_column_count_is_input_shape() {
        let lines = read_parameter_lines("56878\t2012-06-11\t42\n".as_bytes());
        assert!(matches!(
            lines[0].params,
            Err(ClimateError::InputShape { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_fields_are_input_shape() {
        let input = "abc\t2012-06-11\t42\t0.14\n\
                     56878\t11.06.2012\t42\t0.14\n\
                     56878\t2012-06-11\tdeep\t0.14\n\
                     56878\t2012-06-11\t-1\t0.14\n\
                     56878\t2012-06-11\tNaN\t0.14\n";
        let lines = read_parameter_lines(input.as_bytes());
        assert_eq!(lines.len(), 5);
        for (expected_line, entry) in (1..).zip(&lines) {
            match &entry.params {
                Err(ClimateError::InputShape { line, .. }) => assert_eq!(*line, expected_line),
                other => panic!("expected InputShape, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_read_parameter_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_parameter_file(&dir.path().join("absent.tsv")).unwrap_err();
        assert!(matches!(err, ClimateError::Io(_)));
    }

    #[test]
    fn test_read_parameter_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "56878\t2012-06-11\t42\t0.14").unwrap();
        let lines = read_parameter_file(file.path()).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].params.is_ok());
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let source = Snapshots::of(&[3, 1, 2]);
        let input = "3\t2012-06-11\t42\t0.14\n\
                     1\t2012-06-11\t42\t0.14\n\
                     2\t2012-06-11\t42\t0.14\n";
        let outcome = tokio_test::block_on(run_batch(
            &source,
            read_parameter_lines(input.as_bytes()),
            &AnalysisSettings::default(),
            2,
        ));

        let ids: Vec<i64> = outcome.reports.iter().map(|r| r.culture_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(outcome.failures.is_empty());
        assert!(!outcome.all_failed());
    }

    #[test]
    fn test_batch_skips_failing_lines() {
        let source = Snapshots::of(&[1, 2]);
        let input = "1\t2012-06-11\t42\t0.14\n\
                     7\t2012-06-11\t42\t0.14\n\
                     2\t2012-06-11\n\
                     2\t2012-06-11\t42\t0.14\n";
        let outcome = tokio_test::block_on(run_batch(
            &source,
            read_parameter_lines(input.as_bytes()),
            &AnalysisSettings::default(),
            4,
        ));

        let ids: Vec<i64> = outcome.reports.iter().map(|r| r.culture_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(outcome.failures.len(), 2);

        assert_eq!(outcome.failed_lines(), vec![2, 3]);
        assert!(matches!(
            outcome.failures[0].error,
            ClimateError::TrialNotFound(7)
        ));
        assert_eq!(outcome.failures[1].error.kind(), "input_shape");

        let by_kind = outcome.failures_by_kind();
        assert_eq!(by_kind.get("trial_not_found"), Some(&1));
        assert_eq!(by_kind.get("input_shape"), Some(&1));
        assert_eq!(by_kind.len(), 2);
    }

    #[test]
    fn test_all_failed() {
        let source = Snapshots::of(&[]);
        let outcome = tokio_test::block_on(run_batch(
            &source,
            read_parameter_lines("9\t2012-06-11\t42\t0.14\n".as_bytes()),
            &AnalysisSettings::default(),
            1,
        ));
        assert!(outcome.all_failed());

        let empty = tokio_test::block_on(run_batch(
            &source,
            Vec::new(),
            &AnalysisSettings::default(),
            1,
        ));
        assert!(!empty.all_failed());
    }
}
