// Archivo: errors.rs
// Propósito: definir los errores del proveedor de pasos, el fallo
// serializable que se guarda en el ledger (`StepFailure`) y el contrato
// `RecordableError` que permite reconstruir errores de dominio al repetir
// un paso.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fallo registrado de un paso tal como se persiste en la columna `error`.
///
/// `kind` es el discriminante estable (por ejemplo
/// `InsufficientFundsOrNotFound`), `message` el texto visible para el caller
/// y `payload` datos opcionales del error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl StepFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(),
               message: message.into(),
               payload: None }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errores del proveedor de pasos y del ledger.
///
/// - `Storage`: fallo de conectividad o de la base de datos (no se registra,
///   el orquestador decide si reintenta).
/// - `Config`: configuración inválida (namespace, aislamiento, pool).
/// - `Serialization`: el valor o el error del paso no se pudo (de)serializar.
/// - `Conflict`: se perdió la carrera por la clave del paso y el resultado
///   del ganador no es visible.
/// - `Failed`: fallo registrado devuelto tal cual cuando el paso usa
///   `StepError` como tipo de error.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Error de almacenamiento: {0}")]
    Storage(String),
    #[error("Error de configuracion: {0}")]
    Config(String),
    #[error("Error de serializacion: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conflicto: {0}")]
    Conflict(String),
    #[error("{0}")]
    Failed(StepFailure),
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, StepError>;

/// Errores que un paso puede devolver y que el proveedor sabe persistir.
///
/// `to_failure` devuelve `None` para errores transitorios (persistencia,
/// serializacion): esos no se registran y el paso se puede reintentar.
/// `from_failure` reconstruye el error a partir de la fila del ledger.
pub trait RecordableError: From<StepError> {
    fn to_failure(&self) -> Option<StepFailure>;

    /// Fallo a registrar cuando el paso se cierra sea cual sea el error
    /// (`StepProvider::run_terminal_step`), incluidos los transitorios.
    fn to_terminal_failure(&self) -> StepFailure;

    fn from_failure(failure: StepFailure) -> Self;
}

impl RecordableError for StepError {
    fn to_failure(&self) -> Option<StepFailure> {
        match self {
            StepError::Failed(f) => Some(f.clone()),
            _ => None,
        }
    }

    fn to_terminal_failure(&self) -> StepFailure {
        match self {
            StepError::Failed(f) => f.clone(),
            StepError::Storage(m) => StepFailure::new("Storage", m.as_str()),
            StepError::Config(m) => StepFailure::new("Config", m.as_str()),
            StepError::Conflict(m) => StepFailure::new("Conflict", m.as_str()),
            StepError::Serialization(e) => StepFailure::new("Serialization", e.to_string()),
        }
    }

    fn from_failure(failure: StepFailure) -> Self {
        StepError::Failed(failure)
    }
}
