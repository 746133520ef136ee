use bank_domain::{Account, BankError, BankRepository, BankState, Money, NewTransferLogEntry, TransferLogEntry,
                  TransferStatus};
use bank_workflow::{Bank, BankImpl, DurableBank};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use step::stubs::{InMemoryStore, MemoryTx};
use step::{IsolationLevel, OutcomeLedger, StepError, StepKey, StepOutcome, StepProvider, StepState, TransactionalStore};

/// Store en memoria cuyo débito o cuyas escrituras del ledger pueden fallar
/// como lo haría una base de datos caída.
struct FailingStore {
  inner: InMemoryStore<BankState>,
  fail_debit: AtomicBool,
  fail_ledger: AtomicBool,
}

impl FailingStore {
  fn new() -> Self {
    FailingStore { inner: InMemoryStore::with_state(BankState::with_accounts(&[("Alice", Money::from_units(1000)),
                                                                                ("Bob", Money::from_units(500))])),
                   fail_debit: AtomicBool::new(true),
                   fail_ledger: AtomicBool::new(false) }
  }

  fn heal(&self) {
    self.fail_debit.store(false, Ordering::SeqCst);
    self.fail_ledger.store(false, Ordering::SeqCst);
  }

  fn balances(&self) -> Vec<Money> {
    self.inner.snapshot().unwrap().accounts.values().map(|a| a.balance).collect()
  }

  fn log(&self) -> Vec<TransferLogEntry> {
    self.inner.snapshot().unwrap().transfer_log
  }
}

impl TransactionalStore for FailingStore {
  type Conn = MemoryTx<BankState>;

  fn in_transaction<T, E, F>(&self, isolation: IsolationLevel, f: F) -> Result<T, E>
    where F: FnOnce(&mut Self::Conn) -> Result<T, E>,
          E: From<StepError>
  {
    self.inner.in_transaction(isolation, f)
  }
}

impl OutcomeLedger for FailingStore {
  fn ensure_schema(&self, namespace: &str) -> step::Result<()> {
    self.inner.ensure_schema(namespace)
  }

  fn get_outcome(&self, key: &StepKey) -> step::Result<Option<StepOutcome>> {
    self.inner.get_outcome(key)
  }

  fn insert_if_absent(&self, conn: &mut Self::Conn, outcome: &StepOutcome) -> step::Result<bool> {
    if self.fail_ledger.load(Ordering::SeqCst) {
      return Err(StepError::Storage("ledger no disponible".into()));
    }
    self.inner.insert_if_absent(conn, outcome)
  }
}

impl BankRepository for FailingStore {
  fn list_accounts(&self, conn: &mut Self::Conn) -> Result<Vec<Account>, BankError> {
    self.inner.list_accounts(conn)
  }

  fn debit(&self, conn: &mut Self::Conn, account_id: i64, amount: Money) -> Result<usize, BankError> {
    if self.fail_debit.load(Ordering::SeqCst) {
      return Err(BankError::Persistence("connection reset".into()));
    }
    self.inner.debit(conn, account_id, amount)
  }

  fn credit(&self, conn: &mut Self::Conn, account_id: i64, amount: Money) -> Result<usize, BankError> {
    self.inner.credit(conn, account_id, amount)
  }

  fn append_transfer_log(&self, conn: &mut Self::Conn, entry: &NewTransferLogEntry) -> Result<(), BankError> {
    self.inner.append_transfer_log(conn, entry)
  }

  fn list_transfer_log(&self, conn: &mut Self::Conn) -> Result<Vec<TransferLogEntry>, BankError> {
    self.inner.list_transfer_log(conn)
  }
}

fn durable(store: &Arc<FailingStore>) -> DurableBank<FailingStore> {
  let provider = StepProvider::new(store.clone()).with_namespace("bank");
  provider.ensure_schema().expect("ensure schema");
  DurableBank::register(BankImpl::with_provider(provider))
}

#[test]
fn storage_failure_without_workflow_is_still_logged() {
  let store = Arc::new(FailingStore::new());
  let bank = BankImpl::new(store.clone());

  let res = bank.transfer(1, 2, Money::from_units(100));

  assert_eq!(res, Err(BankError::Persistence("connection reset".into())));
  let log = store.log();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].status, TransferStatus::Failed);
  assert_eq!(log[0].error_message.as_deref(), Some("Error de persistencia: connection reset"));
  assert_eq!(store.balances(), vec![Money::from_units(1000), Money::from_units(500)]);
}

#[test]
fn logged_storage_failure_is_not_retried_by_a_replay() {
  let store = Arc::new(FailingStore::new());
  let bank = durable(&store);

  let first = bank.transfer_as("wf-reset", 1, 2, Money::from_units(100));
  store.heal();
  let second = bank.transfer_as("wf-reset", 1, 2, Money::from_units(100));

  assert_eq!(first, Err(BankError::Persistence("connection reset".into())));
  assert_eq!(second, first);
  assert_eq!(bank.inner().provider().step_state("wf-reset", 0).unwrap(), StepState::CommittedFailure);
  let log = store.log();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].status, TransferStatus::Failed);
  assert_eq!(store.balances(), vec![Money::from_units(1000), Money::from_units(500)]);
}

#[test]
fn unrecorded_failure_is_retried_and_logged_once() {
  let store = Arc::new(FailingStore::new());
  store.fail_ledger.store(true, Ordering::SeqCst);
  let bank = durable(&store);

  assert!(bank.transfer_as("wf-down", 1, 2, Money::from_units(100)).is_err());
  assert_eq!(bank.inner().provider().step_state("wf-down", 0).unwrap(), StepState::NotStarted);
  assert!(store.log().is_empty());

  store.heal();
  bank.transfer_as("wf-down", 1, 2, Money::from_units(100)).expect("retry succeeds");
  bank.transfer_as("wf-down", 1, 2, Money::from_units(100)).expect("replay");

  let log = store.log();
  assert_eq!(log.len(), 1);
  assert_eq!(log[0].status, TransferStatus::Success);
  assert_eq!(store.balances(), vec![Money::from_units(900), Money::from_units(600)]);
}
