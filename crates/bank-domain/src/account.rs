use crate::{BankError, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cuenta bancaria. El saldo nunca es negativo en estado confirmado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub id: i64,
  pub name: String,
  pub balance: Money,
}

/// Resultado final de una transferencia, tal como queda en la bitácora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
  Success,
  Failed,
}

impl TransferStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      TransferStatus::Success => "SUCCESS",
      TransferStatus::Failed => "FAILED",
    }
  }
}

impl fmt::Display for TransferStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for TransferStatus {
  type Err = BankError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "SUCCESS" => Ok(TransferStatus::Success),
      "FAILED" => Ok(TransferStatus::Failed),
      other => Err(BankError::Validation(format!("estado de transferencia desconocido: {}", other))),
    }
  }
}

/// Entrada de la bitácora de transferencias (append-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLogEntry {
  pub id: i64,
  pub from_account: i64,
  pub to_account: i64,
  pub amount: Money,
  pub status: TransferStatus,
  pub error_message: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Datos para insertar una entrada nueva; el id lo asigna el repositorio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransferLogEntry {
  pub from_account: i64,
  pub to_account: i64,
  pub amount: Money,
  pub status: TransferStatus,
  pub error_message: Option<String>,
}

impl NewTransferLogEntry {
  /// Construye la entrada a partir del resultado del paso de transferencia.
  pub fn from_result(from_account: i64, to_account: i64, amount: Money, result: &Result<(), BankError>) -> Self {
    let (status, error_message) = match result {
      Ok(()) => (TransferStatus::Success, None),
      Err(e) => (TransferStatus::Failed, Some(e.to_string())),
    };
    Self { from_account,
           to_account,
           amount,
           status,
           error_message }
  }
}
