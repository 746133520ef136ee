use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use step::stubs::{InMemoryStore, MemoryTx};
use step::{IsolationLevel, OutcomeLedger, StepError, StepFailure, StepKey, StepOutcome, StepProvider, TransactionalStore,
           WorkflowHandle};

/// Ledger que siempre pierde la carrera: `insert_if_absent` devuelve
/// `false` y, tras la primera consulta, `get_outcome` devuelve lo que haya
/// registrado el "otro" intento (o nada, si no es visible).
struct LosingLedger {
  inner: InMemoryStore<i64>,
  winner: Option<StepOutcome>,
  lookups: AtomicUsize,
}

impl LosingLedger {
  fn new(winner: Option<StepOutcome>) -> Arc<Self> {
    Arc::new(LosingLedger { inner: InMemoryStore::new(),
                            winner,
                            lookups: AtomicUsize::new(0) })
  }
}

impl TransactionalStore for LosingLedger {
  type Conn = MemoryTx<i64>;

  fn in_transaction<T, E, F>(&self, isolation: IsolationLevel, f: F) -> Result<T, E>
    where F: FnOnce(&mut Self::Conn) -> Result<T, E>,
          E: From<StepError>
  {
    self.inner.in_transaction(isolation, f)
  }
}

impl OutcomeLedger for LosingLedger {
  fn ensure_schema(&self, namespace: &str) -> step::Result<()> {
    self.inner.ensure_schema(namespace)
  }

  fn get_outcome(&self, _key: &StepKey) -> step::Result<Option<StepOutcome>> {
    if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
      return Ok(None);
    }
    Ok(self.winner.clone())
  }

  fn insert_if_absent(&self, _conn: &mut Self::Conn, _outcome: &StepOutcome) -> step::Result<bool> {
    Ok(false)
  }
}

fn key() -> StepKey {
  StepKey::new("tests", "wf-race", 0)
}

fn increment(tx: &mut MemoryTx<i64>) -> Result<i64, StepError> {
  tx.state += 1;
  Ok(tx.state)
}

fn reject(tx: &mut MemoryTx<i64>) -> Result<i64, StepError> {
  tx.state += 1;
  Err(StepError::Failed(StepFailure::new("Local", "fallo local")))
}

#[test]
fn lost_success_returns_the_winners_value() {
  let store = LosingLedger::new(Some(StepOutcome::success(key(), &7i64).unwrap()));
  let provider = StepProvider::new(store.clone()).with_namespace("tests");

  let v = provider.run_step_default(&WorkflowHandle::new("wf-race"), "incr", increment).unwrap();

  assert_eq!(v, 7);
  assert_eq!(store.inner.snapshot().unwrap(), 0);
}

#[test]
fn lost_failure_record_returns_the_winners_failure() {
  let winner = StepOutcome::failure(key(), &StepFailure::new("Winner", "fallo del ganador")).unwrap();
  let store = LosingLedger::new(Some(winner));
  let provider = StepProvider::new(store.clone()).with_namespace("tests");

  match provider.run_step_default(&WorkflowHandle::new("wf-race"), "reject", reject) {
    Err(StepError::Failed(f)) => {
      assert_eq!(f.kind, "Winner");
      assert_eq!(f.message, "fallo del ganador");
    }
    other => panic!("expected the winner's failure, got {:?}", other),
  }
  assert_eq!(store.inner.snapshot().unwrap(), 0);
}

#[test]
fn invisible_winner_is_a_conflict() {
  let store = LosingLedger::new(None);
  let provider = StepProvider::new(store.clone()).with_namespace("tests");
  let res = provider.run_step_default(&WorkflowHandle::new("wf-race"), "incr", increment);
  assert!(matches!(res, Err(StepError::Conflict(_))), "got {:?}", res);

  let store = LosingLedger::new(None);
  let provider = StepProvider::new(store.clone()).with_namespace("tests");
  let res = provider.run_step_default(&WorkflowHandle::new("wf-race"), "reject", reject);
  assert!(matches!(res, Err(StepError::Conflict(_))), "got {:?}", res);
  assert_eq!(store.inner.snapshot().unwrap(), 0);
}
