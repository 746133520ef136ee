use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use step::stubs::InMemoryStore;
use step::{IsolationLevel, Standalone, StepError, StepFailure, StepProvider, StepState, WorkflowHandle};

fn provider() -> StepProvider<InMemoryStore<i64>> {
  let provider = StepProvider::new(Arc::new(InMemoryStore::new())).with_namespace("tests");
  provider.ensure_schema().expect("ensure schema");
  provider
}

#[test]
fn passthrough_runs_every_time_without_ledger() {
  let provider = provider();
  for _ in 0..2 {
    let v: i64 = provider.run_step_default(&Standalone, "incr", |tx| -> Result<i64, StepError> {
                           tx.state += 10;
                           Ok(tx.state)
                         })
                         .unwrap();
    assert!(v > 0);
  }
  assert_eq!(provider.store().snapshot().unwrap(), 20);
  assert!(provider.store().dump_outcomes_for_debug().unwrap().is_empty());
}

#[test]
fn committed_success_is_replayed_without_running_again() {
  let provider = provider();
  let calls = AtomicUsize::new(0);
  let run = |wf: &WorkflowHandle| -> Result<i64, StepError> {
    provider.run_step(wf, IsolationLevel::ReadCommitted, "debit", |tx| {
              calls.fetch_add(1, Ordering::SeqCst);
              tx.state -= 100;
              Ok(tx.state)
            })
  };

  let first = run(&WorkflowHandle::new("wf-1")).unwrap();
  // misma identidad, nueva invocacion (p.ej. tras un crash)
  let second = run(&WorkflowHandle::new("wf-1")).unwrap();

  assert_eq!(first, -100);
  assert_eq!(second, first);
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(provider.store().snapshot().unwrap(), -100);
  assert_eq!(provider.step_state("wf-1", 0).unwrap(), StepState::CommittedSuccess);
}

#[test]
fn committed_failure_is_replayed_and_writes_are_rolled_back() {
  let provider = provider();
  let calls = AtomicUsize::new(0);
  let run = || -> Result<i64, StepError> {
    provider.run_step_default(&WorkflowHandle::new("wf-fail"), "boom", |tx| {
              calls.fetch_add(1, Ordering::SeqCst);
              tx.state += 1;
              Err(StepError::Failed(StepFailure::new("Boom", "el paso fallo")))
            })
  };

  match run() {
    Err(StepError::Failed(f)) => assert_eq!(f.kind, "Boom"),
    other => panic!("expected recorded failure, got {:?}", other),
  }
  match run() {
    Err(StepError::Failed(f)) => assert_eq!(f.message, "el paso fallo"),
    other => panic!("expected replayed failure, got {:?}", other),
  }
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(provider.store().snapshot().unwrap(), 0);
  assert_eq!(provider.step_state("wf-fail", 0).unwrap(), StepState::CommittedFailure);
}

#[test]
fn transient_errors_are_not_recorded_and_can_be_retried() {
  let provider = provider();
  let attempt = AtomicUsize::new(0);
  let run = || -> Result<i64, StepError> {
    provider.run_step_default(&WorkflowHandle::new("wf-retry"), "flaky", |tx| {
              if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StepError::Storage("conexion perdida".into()));
              }
              tx.state += 5;
              Ok(tx.state)
            })
  };

  assert!(matches!(run(), Err(StepError::Storage(_))));
  assert_eq!(provider.step_state("wf-retry", 0).unwrap(), StepState::NotStarted);
  assert_eq!(run().unwrap(), 5);
  assert_eq!(run().unwrap(), 5);
  assert_eq!(attempt.load(Ordering::SeqCst), 2);
}

#[test]
fn step_indices_follow_call_order_and_void_steps_store_nothing() {
  let provider = provider();
  let wf = WorkflowHandle::new("wf-seq");
  provider.run_step_default(&wf, "first", |tx| -> Result<(), StepError> {
            tx.state += 1;
            Ok(())
          })
          .unwrap();
  let label: String = provider.run_step_default(&wf, "second", |_| -> Result<String, StepError> { Ok("ok".into()) })
                              .unwrap();
  assert_eq!(label, "ok");
  assert_eq!(wf.current_step_index(), 2);

  let rows = provider.store().dump_outcomes_for_debug().unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].key.step_index, 0);
  assert!(rows[0].output.is_none() && rows[0].error.is_none());
  assert_eq!(rows[1].output.as_deref(), Some("\"ok\""));
}

#[test]
fn concurrent_attempts_of_the_same_step_apply_once() {
  let provider = provider();
  let results: Vec<i64> = (0..16).into_par_iter()
                                 .map(|_| {
                                   provider.run_step_default(&WorkflowHandle::new("wf-race"), "incr", |tx| {
                                             tx.state += 1;
                                             Ok::<i64, StepError>(tx.state)
                                           })
                                           .unwrap()
                                 })
                                 .collect();
  assert!(results.iter().all(|v| *v == 1));
  assert_eq!(provider.store().snapshot().unwrap(), 1);
  assert_eq!(provider.store().dump_outcomes_for_debug().unwrap().len(), 1);
}

#[test]
fn namespaces_keep_separate_ledgers() {
  let store = Arc::new(InMemoryStore::<i64>::new());
  let a = StepProvider::new(store.clone()).with_namespace("a");
  let b = StepProvider::new(store.clone()).with_namespace("b");
  for p in [&a, &b] {
    p.ensure_schema().unwrap();
    p.ensure_schema().unwrap();
    p.run_step_default(&WorkflowHandle::new("same-id"), "incr", |tx| -> Result<i64, StepError> {
       tx.state += 1;
       Ok(tx.state)
     })
     .unwrap();
  }
  assert_eq!(store.snapshot().unwrap(), 2);
  assert!(store.has_namespace("a").unwrap() && store.has_namespace("b").unwrap());
  assert!(StepProvider::new(store).with_namespace("bad-name;").ensure_schema().is_err());
}

#[test]
fn terminal_steps_record_transient_errors_too() {
  let provider = provider();
  let calls = AtomicUsize::new(0);
  let run = || -> Result<i64, StepError> {
    provider.run_terminal_step(&WorkflowHandle::new("wf-terminal"), IsolationLevel::ReadCommitted, "close", |tx| -> Result<i64, StepError> {
              calls.fetch_add(1, Ordering::SeqCst);
              tx.state += 1;
              Err(StepError::Storage("conexion perdida".into()))
            })
  };

  assert!(matches!(run(), Err(StepError::Storage(_))));
  match run() {
    Err(StepError::Failed(f)) => {
      assert_eq!(f.kind, "Storage");
      assert_eq!(f.message, "conexion perdida");
    }
    other => panic!("expected replayed storage failure, got {:?}", other),
  }
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(provider.store().snapshot().unwrap(), 0);
  assert_eq!(provider.step_state("wf-terminal", 0).unwrap(), StepState::CommittedFailure);
}
