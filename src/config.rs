use crate::errors::ClimateError;
use crate::services::climate::StressThresholds;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// MySQL URL of the trial database. Only needed for commands that query it.
    pub database_url: Option<String>,
    /// Maximum number of connections in the database pool.
    pub db_max_connections: u32,
    /// Number of trials a batch run processes concurrently.
    pub max_concurrent_trials: usize,
    pub thresholds: StressThresholds,
}

impl AppConfig {
    pub fn database_url(&self) -> Result<&str, ClimateError> {
        self.database_url
            .as_deref()
            .ok_or(ClimateError::MissingConfig("DATABASE_URL"))
    }

    pub fn from_env() -> Self {
        let defaults = StressThresholds::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: std::env::var("CLIMAX_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("CLIMAX_DB_MAX_CONNECTIONS must be a valid u32"),
            max_concurrent_trials: std::env::var("CLIMAX_MAX_CONCURRENT_TRIALS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .expect("CLIMAX_MAX_CONCURRENT_TRIALS must be a valid usize"),
            thresholds: StressThresholds {
                tlb: env_f64("CLIMAX_TLB", defaults.tlb),
                tub: env_f64("CLIMAX_TUB", defaults.tub),
                drought_threshold: env_f64("CLIMAX_DROUGHT_THRESHOLD", defaults.drought_threshold),
            },
        }
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid number, got '{}'", name, raw)),
        Err(_) => default,
    }
}
