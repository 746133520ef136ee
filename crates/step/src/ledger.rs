// Archivo: ledger.rs
// Propósito: definir el ejecutor transaccional (`TransactionalStore`) y el
// contrato del ledger de resultados (`OutcomeLedger`). Las implementaciones
// concretas viven en `step-persistence` (Diesel) y en `stubs` (memoria).
use crate::errors::{Result, StepError};
use crate::outcome::{StepKey, StepOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Nivel de aislamiento con el que se abre la transacción de un paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for IsolationLevel {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(StepError::Config(format!("nivel de aislamiento desconocido: {}", other))),
        }
    }
}

/// Ejecutor transaccional sobre el almacén de respaldo.
///
/// `Conn` es el handle que recibe la función del paso; todo lo que se
/// escriba a través de él forma parte de la misma transacción.
pub trait TransactionalStore: Send + Sync {
    type Conn;

    /// Ejecuta `f` dentro de una transacción atómica. `Ok` confirma,
    /// `Err` revierte todo lo escrito por `f`.
    fn in_transaction<T, E, F>(&self, isolation: IsolationLevel, f: F) -> std::result::Result<T, E>
        where F: FnOnce(&mut Self::Conn) -> std::result::Result<T, E>,
              E: From<StepError>;
}

/// Ledger persistente de resultados de pasos, indexado por
/// `(namespace, workflow_id, step_index)`.
pub trait OutcomeLedger: TransactionalStore {
    /// Crea la tabla del ledger si no existe. Idempotente.
    fn ensure_schema(&self, namespace: &str) -> Result<()>;

    /// Lee el resultado registrado para la clave, fuera de cualquier
    /// transacción de paso.
    fn get_outcome(&self, key: &StepKey) -> Result<Option<StepOutcome>>;

    /// Inserta la fila dentro de la transacción de `conn`. Devuelve `false`
    /// (no un error) si ya existía una fila con la misma clave.
    fn insert_if_absent(&self, conn: &mut Self::Conn, outcome: &StepOutcome) -> Result<bool>;
}

/// Valida un namespace del ledger como se sanea un nombre de esquema SQL.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(StepError::Config("namespace vacio".into()));
    }
    if !namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StepError::Config(format!("namespace invalido: {}", namespace)));
    }
    Ok(())
}
