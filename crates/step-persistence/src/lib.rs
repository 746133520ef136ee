//! Persistencia Diesel para el ledger de pasos y el dominio bancario.
//! `DieselStepStore` implementa `TransactionalStore`, `OutcomeLedger` y
//! `BankRepository` sobre un único pool r2d2. SQLite es el backend por
//! defecto; la feature `pg` cambia a Postgres.

mod bank_persistence;
pub mod config;
pub mod schema;
mod store;

pub use config::StoreConfig;
pub use store::{DbConn, DieselStepStore, MIGRATIONS};

use step::{StepError, StepProvider};
use std::sync::Arc;

/// Construye el store a partir del entorno y prepara el ledger del
/// namespace configurado.
pub fn new_from_env() -> Result<DieselStepStore, StepError> {
  let config = StoreConfig::from_env()?;
  let namespace = config.namespace.clone();
  let store = DieselStepStore::new(config)?;
  step::OutcomeLedger::ensure_schema(&store, &namespace)?;
  Ok(store)
}

/// Proveedor de pasos listo para usar con el namespace y el aislamiento
/// configurados en el entorno.
pub fn provider_from_env() -> Result<StepProvider<DieselStepStore>, StepError> {
  let store = new_from_env()?;
  Ok(provider_for(Arc::new(store)))
}

pub fn provider_for(store: Arc<DieselStepStore>) -> StepProvider<DieselStepStore> {
  let namespace = store.config().namespace.clone();
  let isolation = store.config().default_isolation;
  StepProvider::new(store).with_namespace(namespace).with_default_isolation(isolation)
}

// Test helper: store sobre un archivo SQLite explícito, sin leer el entorno.
#[cfg(not(feature = "pg"))]
pub fn new_sqlite_for_test(database_url: &str) -> Result<DieselStepStore, StepError> {
  let store = DieselStepStore::new(StoreConfig::new(database_url))?;
  step::OutcomeLedger::ensure_schema(&store, config::DEFAULT_NAMESPACE)?;
  Ok(store)
}
