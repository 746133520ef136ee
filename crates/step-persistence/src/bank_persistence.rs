// bank_persistence.rs
// Repositorio bancario sobre Diesel. Todas las operaciones reciben la
// conexión de la transacción del paso; sólo el sembrado y las consultas de
// soporte abren su propia conexión del pool.
use crate::schema::{accounts, transfer_log};
use crate::store::{map_db_err, DbConn, DieselStepStore};
use bank_domain::{Account, BankError, BankRepository, Money, NewTransferLogEntry, TransferLogEntry, DEMO_ACCOUNTS};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use log::info;

#[derive(Debug, Queryable)]
struct AccountRow {
  id: i64,
  name: String,
  balance: i64,
}

impl From<AccountRow> for Account {
  fn from(r: AccountRow) -> Self {
    Account { id: r.id,
              name: r.name,
              balance: Money::from_cents(r.balance) }
  }
}

#[derive(Debug, Queryable)]
struct TransferLogRow {
  id: i64,
  from_account: i64,
  to_account: i64,
  amount: i64,
  status: String,
  error_message: Option<String>,
  created_at: NaiveDateTime,
}

impl TryFrom<TransferLogRow> for TransferLogEntry {
  type Error = BankError;

  fn try_from(r: TransferLogRow) -> Result<Self, BankError> {
    Ok(TransferLogEntry { id: r.id,
                          from_account: r.from_account,
                          to_account: r.to_account,
                          amount: Money::from_cents(r.amount),
                          status: r.status.parse()?,
                          error_message: r.error_message,
                          created_at: r.created_at.and_utc() })
  }
}

fn db_err(e: diesel::result::Error) -> BankError {
  BankError::from(map_db_err(e))
}

impl BankRepository for DieselStepStore {
  fn list_accounts(&self, conn: &mut DbConn) -> Result<Vec<Account>, BankError> {
    let rows = accounts::table.order(accounts::id.asc()).load::<AccountRow>(conn).map_err(db_err)?;
    Ok(rows.into_iter().map(Account::from).collect())
  }

  fn debit(&self, conn: &mut DbConn, account_id: i64, amount: Money) -> Result<usize, BankError> {
    let cents = amount.cents();
    diesel::update(accounts::table.filter(accounts::id.eq(account_id)).filter(accounts::balance.ge(cents)))
      .set(accounts::balance.eq(accounts::balance - cents))
      .execute(conn)
      .map_err(db_err)
  }

  fn credit(&self, conn: &mut DbConn, account_id: i64, amount: Money) -> Result<usize, BankError> {
    let cents = amount.cents();
    diesel::update(accounts::table.filter(accounts::id.eq(account_id)))
      .set(accounts::balance.eq(accounts::balance + cents))
      .execute(conn)
      .map_err(db_err)
  }

  fn append_transfer_log(&self, conn: &mut DbConn, entry: &NewTransferLogEntry) -> Result<(), BankError> {
    diesel::insert_into(transfer_log::table).values((transfer_log::from_account.eq(entry.from_account),
                                                     transfer_log::to_account.eq(entry.to_account),
                                                     transfer_log::amount.eq(entry.amount.cents()),
                                                     transfer_log::status.eq(entry.status.as_str()),
                                                     transfer_log::error_message.eq(entry.error_message.as_deref())))
                                            .execute(conn)
                                            .map_err(db_err)?;
    Ok(())
  }

  fn list_transfer_log(&self, conn: &mut DbConn) -> Result<Vec<TransferLogEntry>, BankError> {
    let rows = transfer_log::table.order(transfer_log::id.asc()).load::<TransferLogRow>(conn).map_err(db_err)?;
    rows.into_iter().map(TransferLogEntry::try_from).collect()
  }
}

impl DieselStepStore {
  /// Inserta las cuentas que no existan todavía (por nombre). Devuelve
  /// cuántas se crearon.
  pub fn seed_accounts(&self, seed: &[(&str, Money)]) -> Result<usize, BankError> {
    let mut conn = self.conn()?;
    let mut created = 0;
    for (name, balance) in seed {
      if balance.cents() < 0 {
        return Err(BankError::Validation(format!("saldo inicial negativo para {}", name)));
      }
      created += diesel::insert_into(accounts::table).values((accounts::name.eq(*name), accounts::balance.eq(balance.cents())))
                                                     .on_conflict(accounts::name)
                                                     .do_nothing()
                                                     .execute(&mut conn)
                                                     .map_err(db_err)?;
    }
    if created > 0 {
      info!("{} cuenta(s) de demostración creadas", created);
    }
    Ok(created)
  }

  pub fn seed_demo_accounts(&self) -> Result<usize, BankError> {
    self.seed_accounts(&DEMO_ACCOUNTS)
  }

  pub fn find_account(&self, name: &str) -> Result<Option<Account>, BankError> {
    let mut conn = self.conn()?;
    let row = accounts::table.filter(accounts::name.eq(name))
                             .first::<AccountRow>(&mut conn)
                             .optional()
                             .map_err(db_err)?;
    Ok(row.map(Account::from))
  }
}
