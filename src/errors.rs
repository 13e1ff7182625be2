use chrono::NaiveDate;

/// Errors raised while computing stress indicators for a single trial.
///
/// Every variant is fatal for the trial (or metric) it was raised for; the
/// batch driver records it and moves on to the next trial.
#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    #[error("Malformed input on line {line}: {message}")]
    InputShape { line: usize, message: String },

    #[error("Unexpected treatment ID: {0}")]
    InvalidTreatment(i64),

    #[error("Trial window is not consecutive: expected {expected}, found {found}")]
    NonConsecutiveWindow {
        expected: NaiveDate,
        found: NaiveDate,
    },

    #[error("No qualifying days for {metric} ({bucket})")]
    InsufficientData {
        metric: &'static str,
        bucket: &'static str,
    },

    #[error("Invalid soil profile: {0}")]
    InvalidSoilProfile(String),

    #[error("Culture {0} not found")]
    TrialNotFound(i64),

    #[error("Culture {culture_id} has invalid trial dates: {message}")]
    InvalidTrialDates { culture_id: i64, message: String },

    #[error("Missing configuration: {0} must be set")]
    MissingConfig(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClimateError {
    /// Short, stable name of the error kind for batch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClimateError::InputShape { .. } => "input_shape",
            ClimateError::InvalidTreatment(_) => "invalid_treatment",
            ClimateError::NonConsecutiveWindow { .. } => "non_consecutive_window",
            ClimateError::InsufficientData { .. } => "insufficient_data",
            ClimateError::InvalidSoilProfile(_) => "invalid_soil_profile",
            ClimateError::TrialNotFound(_) => "trial_not_found",
            ClimateError::InvalidTrialDates { .. } => "invalid_trial_dates",
            ClimateError::MissingConfig(_) => "missing_config",
            ClimateError::Database(_) => "database",
            ClimateError::Io(_) => "io",
            ClimateError::Csv(_) => "tsv",
            ClimateError::Json(_) => "json",
        }
    }

    pub(crate) fn input_shape(line: usize, message: impl Into<String>) -> Self {
        ClimateError::InputShape {
            line,
            message: message.into(),
        }
    }
}
