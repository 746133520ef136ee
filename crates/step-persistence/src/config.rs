//! Store configuration read from the environment (and `.env` via dotenvy).
use step::{IsolationLevel, StepError};

/// Connection and provider settings consumed by `DieselStepStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
  pub database_url: String,
  /// Namespace of the outcome ledger rows written by this process.
  pub namespace: String,
  pub pool_size: u32,
  /// Isolation used by `run_step_default`.
  pub default_isolation: IsolationLevel,
  /// SQLite only: how long a writer waits for the database lock.
  pub busy_timeout_ms: u32,
}

pub const DEFAULT_NAMESPACE: &str = "bank";
pub const DEFAULT_SQLITE_URL: &str = "bank.db";

impl StoreConfig {
  pub fn new(database_url: impl Into<String>) -> Self {
    StoreConfig { database_url: database_url.into(),
                  namespace: DEFAULT_NAMESPACE.to_string(),
                  pool_size: 4,
                  default_isolation: IsolationLevel::ReadCommitted,
                  busy_timeout_ms: 5000 }
  }

  /// Read `STEP_*` variables (plus the `DB_*`/`PG*` fallbacks used for
  /// Postgres) from the process environment.
  pub fn from_env() -> Result<Self, StepError> {
    dotenvy::dotenv().ok();
    Self::from_vars(|k| std::env::var(k).ok())
  }

  /// Same as `from_env` but with an explicit variable lookup, so tests do
  /// not have to mutate the process environment.
  pub fn from_vars<F>(var: F) -> Result<Self, StepError>
    where F: Fn(&str) -> Option<String>
  {
    let url = var("STEP_DB_URL").or_else(|| var("DATABASE_URL"));
    let database_url = if cfg!(feature = "pg") {
      let url = url.or_else(|| var("DB_URL")).unwrap_or_else(|| {
                                                let host = var("DB_HOST").unwrap_or_else(|| "localhost:5432".into());
                                                let name = var("DB_NAME").unwrap_or_else(|| "bank".into());
                                                let user = var("PGUSER").unwrap_or_else(|| "postgres".into());
                                                let password = var("PGPASSWORD").unwrap_or_else(|| "postgres".into());
                                                format!("postgres://{}:{}@{}/{}", user, password, host, name)
                                              });
      let l = url.to_lowercase();
      if !(l.starts_with("postgres://") || l.starts_with("postgresql://") || url.contains('@')) {
        return Err(StepError::Config("STEP_DB_URL / DATABASE_URL does not look like Postgres URL".into()));
      }
      url
    } else {
      let url = url.unwrap_or_else(|| DEFAULT_SQLITE_URL.into());
      if url.to_lowercase().starts_with("postgres") {
        return Err(StepError::Config("step-persistence was compiled without 'pg' feature; enable the 'pg' \
                                       feature to use Postgres"
                                                               .into()));
      }
      url
    };

    let mut config = StoreConfig::new(database_url);
    if let Some(ns) = var("STEP_NAMESPACE") {
      step::validate_namespace(&ns)?;
      config.namespace = ns;
    }
    if let Some(size) = var("STEP_POOL_SIZE") {
      config.pool_size = parse_positive("STEP_POOL_SIZE", &size)?;
    }
    if let Some(iso) = var("STEP_ISOLATION") {
      config.default_isolation = iso.parse()?;
    }
    if let Some(ms) = var("STEP_BUSY_TIMEOUT_MS") {
      config.busy_timeout_ms = parse_positive("STEP_BUSY_TIMEOUT_MS", &ms)?;
    }
    Ok(config)
  }
}

fn parse_positive(name: &str, value: &str) -> Result<u32, StepError> {
  match value.trim().parse::<u32>() {
    Ok(n) if n > 0 => Ok(n),
    _ => Err(StepError::Config(format!("{} must be a positive integer, got '{}'", name, value))),
  }
}
