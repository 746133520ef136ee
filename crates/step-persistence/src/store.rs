use crate::config::StoreConfig;
use crate::schema::outcomes;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use std::sync::Arc;
use step::{validate_namespace, IsolationLevel, OutcomeLedger, StepError, StepKey, StepOutcome, TransactionalStore};

#[cfg(feature = "pg")]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/postgres");
#[cfg(not(feature = "pg"))]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/sqlite");

/// Connection type handed to step functions: the transaction handle.
#[cfg(feature = "pg")]
pub type DbConn = diesel::pg::PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = diesel::sqlite::SqliteConnection;

type DbPool = Pool<ConnectionManager<DbConn>>;

const CREATE_OUTCOMES_SQL: &str = "CREATE TABLE IF NOT EXISTS outcomes (
    namespace TEXT NOT NULL,
    workflow_id TEXT NOT NULL,
    step_index INTEGER NOT NULL,
    output TEXT,
    error TEXT,
    PRIMARY KEY (namespace, workflow_id, step_index)
)";

/// Diesel-backed store: transactional executor, outcome ledger and (see
/// `bank_persistence`) bank repository over one r2d2 pool.
pub struct DieselStepStore {
  pool: Arc<DbPool>,
  config: StoreConfig,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = outcomes)]
struct OutcomeRow {
  pub namespace: String,
  pub workflow_id: String,
  pub step_index: i32,
  pub output: Option<String>,
  pub error: Option<String>,
}

impl From<&StepOutcome> for OutcomeRow {
  fn from(o: &StepOutcome) -> Self {
    OutcomeRow { namespace: o.key.namespace.clone(),
                 workflow_id: o.key.workflow_id.clone(),
                 step_index: o.key.step_index,
                 output: o.output.clone(),
                 error: o.error.clone() }
  }
}

impl From<OutcomeRow> for StepOutcome {
  fn from(r: OutcomeRow) -> Self {
    StepOutcome { key: StepKey::new(r.namespace, r.workflow_id, r.step_index),
                  output: r.output,
                  error: r.error }
  }
}

/// Why a Diesel transaction was rolled back: the database itself or the
/// closure running inside it.
enum TxAbort<E> {
  Db(DieselError),
  App(E),
}

impl<E> From<DieselError> for TxAbort<E> {
  fn from(e: DieselError) -> Self {
    TxAbort::Db(e)
  }
}

pub(crate) fn map_db_err(e: DieselError) -> StepError {
  StepError::Storage(format!("db: {}", e))
}

/// Applies SQLite pragmas on every pooled connection (busy_timeout is per
/// connection).
#[cfg(not(feature = "pg"))]
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
  busy_timeout_ms: u32,
}

#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<DbConn, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut DbConn) -> Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute(&format!("PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;",
                                self.busy_timeout_ms))
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

impl DieselStepStore {
  /// Builds the pool and applies the embedded migrations for the bank
  /// tables. The outcome ledger table is created by `ensure_schema`.
  pub fn new(config: StoreConfig) -> Result<Self, StepError> {
    let manager = ConnectionManager::<DbConn>::new(config.database_url.as_str());
    let builder = Pool::builder().max_size(config.pool_size);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas { busy_timeout_ms: config.busy_timeout_ms }));
    let pool = builder.build(manager)
                      .map_err(|e| StepError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let store = DieselStepStore { pool: Arc::new(pool), config };
    store.run_migrations()?;
    Ok(store)
  }

  pub fn config(&self) -> &StoreConfig {
    &self.config
  }

  pub(crate) fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, StepError> {
    self.pool.get().map_err(|e| StepError::Storage(format!("pool: {}", e)))
  }

  pub fn run_migrations(&self) -> Result<(), StepError> {
    let mut c = self.conn()?;
    let applied = c.run_pending_migrations(MIGRATIONS)
                   .map_err(|e| StepError::Storage(format!("migrations: {}", e)))?;
    if !applied.is_empty() {
      info!("applied {} migration(s) on {}", applied.len(), self.config.database_url);
    }
    Ok(())
  }

  /// Every ledger row, ordered by workflow and step (debug / tests).
  pub fn dump_outcomes_for_debug(&self) -> Result<Vec<StepOutcome>, StepError> {
    let mut conn = self.conn()?;
    let rows = outcomes::table.order((outcomes::namespace.asc(), outcomes::workflow_id.asc(), outcomes::step_index.asc()))
                              .load::<OutcomeRow>(&mut conn)
                              .map_err(map_db_err)?;
    Ok(rows.into_iter().map(StepOutcome::from).collect())
  }
}

#[cfg(feature = "pg")]
fn begin<T, E, F>(conn: &mut DbConn, isolation: IsolationLevel, f: F) -> Result<T, E>
  where F: FnOnce(&mut DbConn) -> Result<T, E>,
        E: From<DieselError>
{
  let builder = conn.build_transaction();
  match isolation {
    // Postgres runs READ UNCOMMITTED as READ COMMITTED anyway.
    IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => builder.read_committed().run(f),
    IsolationLevel::RepeatableRead => builder.repeatable_read().run(f),
    IsolationLevel::Serializable => builder.serializable().run(f),
  }
}

// SQLite transactions are always serializable; BEGIN IMMEDIATE takes the
// write lock up front so concurrent writers queue on busy_timeout instead of
// failing on lock upgrade.
#[cfg(not(feature = "pg"))]
fn begin<T, E, F>(conn: &mut DbConn, isolation: IsolationLevel, f: F) -> Result<T, E>
  where F: FnOnce(&mut DbConn) -> Result<T, E>,
        E: From<DieselError>
{
  debug!("sqlite transaction requested at {}, using BEGIN IMMEDIATE", isolation);
  conn.immediate_transaction(f)
}

impl TransactionalStore for DieselStepStore {
  type Conn = DbConn;

  fn in_transaction<T, E, F>(&self, isolation: IsolationLevel, f: F) -> Result<T, E>
    where F: FnOnce(&mut DbConn) -> Result<T, E>,
          E: From<StepError>
  {
    let mut conn = self.conn().map_err(E::from)?;
    begin(&mut conn, isolation, |c| f(c).map_err(TxAbort::App)).map_err(|e| match e {
                                                                  TxAbort::App(e) => e,
                                                                  TxAbort::Db(e) => E::from(map_db_err(e)),
                                                                })
  }
}

impl OutcomeLedger for DieselStepStore {
  fn ensure_schema(&self, namespace: &str) -> Result<(), StepError> {
    validate_namespace(namespace)?;
    let mut conn = self.conn()?;
    diesel::sql_query(CREATE_OUTCOMES_SQL).execute(&mut conn).map_err(map_db_err)?;
    debug!("outcome ledger ready for namespace '{}'", namespace);
    Ok(())
  }

  fn get_outcome(&self, key: &StepKey) -> Result<Option<StepOutcome>, StepError> {
    let mut conn = self.conn()?;
    let row = outcomes::table.filter(outcomes::namespace.eq(&key.namespace))
                             .filter(outcomes::workflow_id.eq(&key.workflow_id))
                             .filter(outcomes::step_index.eq(key.step_index))
                             .first::<OutcomeRow>(&mut conn)
                             .optional()
                             .map_err(map_db_err)?;
    Ok(row.map(StepOutcome::from))
  }

  fn insert_if_absent(&self, conn: &mut DbConn, outcome: &StepOutcome) -> Result<bool, StepError> {
    let row = OutcomeRow::from(outcome);
    match diesel::insert_into(outcomes::table).values(&row).on_conflict_do_nothing().execute(conn) {
      Ok(n) => Ok(n == 1),
      Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
      Err(e) => Err(map_db_err(e)),
    }
  }
}
