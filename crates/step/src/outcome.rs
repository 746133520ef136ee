// Archivo: outcome.rs
// Propósito: tipos persistidos por el ledger (`StepKey`, `StepOutcome`) y
// la vista tipada `Outcome<T>` que se reconstruye al repetir un paso.
use crate::errors::{Result, StepFailure};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clave primaria de una fila del ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepKey {
    pub namespace: String,
    pub workflow_id: String,
    pub step_index: i32,
}

impl StepKey {
    pub fn new(namespace: impl Into<String>, workflow_id: impl Into<String>, step_index: i32) -> Self {
        Self { namespace: namespace.into(),
               workflow_id: workflow_id.into(),
               step_index }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.namespace, self.workflow_id, self.step_index)
    }
}

/// Fila inmutable del ledger: resultado terminal de un paso.
///
/// Como mucho uno de `output`/`error` está presente; ninguno de los dos
/// significa éxito sin valor (`()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub key: StepKey,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Resultado decodificado de una fila del ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(StepFailure),
}

impl StepOutcome {
    /// Construye la fila de éxito serializando `value` a JSON. `null` se
    /// guarda como ausencia de salida.
    pub fn success<T: Serialize>(key: StepKey, value: &T) -> Result<Self> {
        let json = serde_json::to_string(value)?;
        let output = if json == "null" { None } else { Some(json) };
        Ok(Self { key, output, error: None })
    }

    /// Construye la fila de fallo serializando el `StepFailure`.
    pub fn failure(key: StepKey, failure: &StepFailure) -> Result<Self> {
        Ok(Self { key,
                  output: None,
                  error: Some(serde_json::to_string(failure)?) })
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Reconstruye el resultado tipado guardado en la fila.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Outcome<T>> {
        if let Some(err) = &self.error {
            let failure: StepFailure = serde_json::from_str(err)?;
            return Ok(Outcome::Failure(failure));
        }
        let value = serde_json::from_str(self.output.as_deref().unwrap_or("null"))?;
        Ok(Outcome::Success(value))
    }
}
