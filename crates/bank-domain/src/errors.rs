// error.rs
use step::{RecordableError, StepError, StepFailure};
use thiserror::Error;

/// Errores del dominio bancario.
///
/// Las variantes de negocio se registran en el ledger y se repiten tal cual;
/// `Persistence` y `Serialization` son transitorias y no se registran.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BankError {
  #[error("Insufficient funds or sender account not found")]
  InsufficientFundsOrNotFound,
  #[error("Receiver account not found")]
  RecipientNotFound,
  #[error("Transfer amount must be positive")]
  InvalidAmount,
  #[error("Error de validación: {0}")]
  Validation(String),
  /// Fallo registrado con un `kind` que esta versión no conoce.
  #[error("{message}")]
  Recorded { kind: String, message: String },
  #[error("Error de persistencia: {0}")]
  Persistence(String),
  #[error("Error de serialización: {0}")]
  Serialization(String),
}

impl BankError {
  /// Discriminante estable que se guarda en el ledger.
  pub fn kind(&self) -> &str {
    match self {
      BankError::InsufficientFundsOrNotFound => "InsufficientFundsOrNotFound",
      BankError::RecipientNotFound => "RecipientNotFound",
      BankError::InvalidAmount => "InvalidAmount",
      BankError::Validation(_) => "Validation",
      BankError::Recorded { kind, .. } => kind,
      BankError::Persistence(_) => "Persistence",
      BankError::Serialization(_) => "Serialization",
    }
  }

  pub fn is_business(&self) -> bool {
    !matches!(self, BankError::Persistence(_) | BankError::Serialization(_))
  }
}

impl From<StepError> for BankError {
  fn from(e: StepError) -> Self {
    match e {
      StepError::Storage(m) | StepError::Conflict(m) | StepError::Config(m) => Self::Persistence(m),
      StepError::Serialization(e) => Self::Serialization(e.to_string()),
      StepError::Failed(f) => Self::from_failure(f),
    }
  }
}

impl From<serde_json::Error> for BankError {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

impl RecordableError for BankError {
  fn to_failure(&self) -> Option<StepFailure> {
    if !self.is_business() {
      return None;
    }
    let failure = StepFailure::new(self.kind(), self.to_string());
    Some(match self {
           BankError::Validation(detail) => failure.with_payload(serde_json::json!(detail)),
           _ => failure,
         })
  }

  fn to_terminal_failure(&self) -> StepFailure {
    match self {
      BankError::Persistence(detail) | BankError::Serialization(detail) => {
        StepFailure::new(self.kind(), self.to_string()).with_payload(serde_json::json!(detail))
      }
      _ => self.to_failure().unwrap_or_else(|| StepFailure::new(self.kind(), self.to_string())),
    }
  }

  fn from_failure(failure: StepFailure) -> Self {
    match failure.kind.as_str() {
      "InsufficientFundsOrNotFound" => Self::InsufficientFundsOrNotFound,
      "RecipientNotFound" => Self::RecipientNotFound,
      "InvalidAmount" => Self::InvalidAmount,
      "Validation" => Self::Validation(detail(failure)),
      "Persistence" => Self::Persistence(detail(failure)),
      "Serialization" => Self::Serialization(detail(failure)),
      _ => Self::Recorded { kind: failure.kind,
                            message: failure.message },
    }
  }
}

/// Detalle guardado en `payload`; si falta, el mensaje completo.
fn detail(failure: StepFailure) -> String {
  failure.payload
         .as_ref()
         .and_then(|p| p.as_str())
         .map(str::to_string)
         .unwrap_or(failure.message)
}
