use crate::{Account, BankError, Money, NewTransferLogEntry, TransferLogEntry};
use chrono::Utc;
use std::collections::BTreeMap;
use step::stubs::{InMemoryStore, MemoryTx};
use step::TransactionalStore;

/// Operaciones de persistencia del dominio bancario.
///
/// Todas reciben el handle de la transacción del paso (`Self::Conn`) para
/// que sus escrituras se confirmen o reviertan junto con el registro del
/// ledger.
pub trait BankRepository: TransactionalStore {
  /// Lista todas las cuentas ordenadas por id.
  fn list_accounts(&self, conn: &mut Self::Conn) -> Result<Vec<Account>, BankError>;

  /// Resta `amount` del saldo sólo si el saldo actual es >= `amount`.
  /// Devuelve el número de filas afectadas (0 si no hay fondos o no existe).
  fn debit(&self, conn: &mut Self::Conn, account_id: i64, amount: Money) -> Result<usize, BankError>;

  /// Suma `amount` al saldo. Devuelve el número de filas afectadas.
  fn credit(&self, conn: &mut Self::Conn, account_id: i64, amount: Money) -> Result<usize, BankError>;

  /// Agrega una entrada a la bitácora de transferencias.
  fn append_transfer_log(&self, conn: &mut Self::Conn, entry: &NewTransferLogEntry) -> Result<(), BankError>;

  /// Lee la bitácora completa ordenada por id.
  fn list_transfer_log(&self, conn: &mut Self::Conn) -> Result<Vec<TransferLogEntry>, BankError>;
}

/// Estado bancario para `InMemoryStore` (tests y desarrollo).
#[derive(Debug, Clone, Default)]
pub struct BankState {
  pub accounts: BTreeMap<i64, Account>,
  pub transfer_log: Vec<TransferLogEntry>,
}

impl BankState {
  /// Crea el estado con las cuentas dadas (ids consecutivos desde 1).
  pub fn with_accounts(accounts: &[(&str, Money)]) -> Self {
    let accounts = accounts.iter()
                           .enumerate()
                           .map(|(i, (name, balance))| {
                             let id = i as i64 + 1;
                             (id, Account { id, name: name.to_string(), balance: *balance })
                           })
                           .collect();
    Self { accounts, transfer_log: Vec::new() }
  }
}

impl BankRepository for InMemoryStore<BankState> {
  fn list_accounts(&self, conn: &mut MemoryTx<BankState>) -> Result<Vec<Account>, BankError> {
    Ok(conn.state.accounts.values().cloned().collect())
  }

  fn debit(&self, conn: &mut MemoryTx<BankState>, account_id: i64, amount: Money) -> Result<usize, BankError> {
    match conn.state.accounts.get_mut(&account_id) {
      Some(acc) if acc.balance >= amount => {
        acc.balance = acc.balance
                         .checked_sub(amount)
                         .ok_or_else(|| BankError::Validation("desbordamiento de saldo".into()))?;
        Ok(1)
      }
      _ => Ok(0),
    }
  }

  fn credit(&self, conn: &mut MemoryTx<BankState>, account_id: i64, amount: Money) -> Result<usize, BankError> {
    match conn.state.accounts.get_mut(&account_id) {
      Some(acc) => {
        acc.balance = acc.balance
                         .checked_add(amount)
                         .ok_or_else(|| BankError::Validation("desbordamiento de saldo".into()))?;
        Ok(1)
      }
      None => Ok(0),
    }
  }

  fn append_transfer_log(&self, conn: &mut MemoryTx<BankState>, entry: &NewTransferLogEntry) -> Result<(), BankError> {
    let log = &mut conn.state.transfer_log;
    let id = log.last().map(|e| e.id + 1).unwrap_or(1);
    log.push(TransferLogEntry { id,
                                from_account: entry.from_account,
                                to_account: entry.to_account,
                                amount: entry.amount,
                                status: entry.status,
                                error_message: entry.error_message.clone(),
                                created_at: Utc::now() });
    Ok(())
  }

  fn list_transfer_log(&self, conn: &mut MemoryTx<BankState>) -> Result<Vec<TransferLogEntry>, BankError> {
    Ok(conn.state.transfer_log.clone())
  }
}
