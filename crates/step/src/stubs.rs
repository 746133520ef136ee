// Archivo: stubs.rs
// Propósito: almacén transaccional en memoria para pruebas y wiring rápido.
//
// `InMemoryStore<St>` guarda un estado de dominio arbitrario `St` junto con
// las filas del ledger. Cada transacción trabaja sobre una copia y la
// publica al confirmar; el mutex se mantiene durante toda la transacción, por
// lo que las transacciones quedan serializadas. No es durable.
use crate::errors::{Result, StepError};
use crate::ledger::{validate_namespace, IsolationLevel, OutcomeLedger, TransactionalStore};
use crate::outcome::{StepKey, StepOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Handle de transacción en memoria que recibe la función del paso.
#[derive(Debug)]
pub struct MemoryTx<St> {
    /// Copia de trabajo del estado de dominio.
    pub state: St,
    outcomes: BTreeMap<StepKey, StepOutcome>,
    isolation: IsolationLevel,
}

impl<St> MemoryTx<St> {
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }
}

#[derive(Debug, Default)]
struct Committed<St> {
    state: St,
    outcomes: BTreeMap<StepKey, StepOutcome>,
    namespaces: BTreeSet<String>,
}

pub struct InMemoryStore<St = ()> {
    committed: Mutex<Committed<St>>,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl<St: Default> InMemoryStore<St> {
    pub fn new() -> Self {
        Self::with_state(St::default())
    }
}

impl<St: Default> Default for InMemoryStore<St> {
    fn default() -> Self {
        Self::new()
    }
}

impl<St> InMemoryStore<St> {
    /// Crea el almacén con un estado de dominio inicial ya "sembrado".
    pub fn with_state(state: St) -> Self {
        Self { committed: Mutex::new(Committed { state,
                                                 outcomes: BTreeMap::new(),
                                                 namespaces: BTreeSet::new() }),
               commits: AtomicU64::new(0),
               rollbacks: AtomicU64::new(0) }
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `StepError::Storage`.
    fn lock(&self) -> Result<MutexGuard<'_, Committed<St>>> {
        self.committed
            .lock()
            .map_err(|e| StepError::Storage(format!("mutex poisoned: {:?}", e)))
    }

    /// Número de transacciones confirmadas.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Número de transacciones revertidas.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Devuelve todas las filas del ledger (para inspección en pruebas).
    pub fn dump_outcomes_for_debug(&self) -> Result<Vec<StepOutcome>> {
        Ok(self.lock()?.outcomes.values().cloned().collect())
    }

    pub fn has_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.lock()?.namespaces.contains(namespace))
    }
}

impl<St: Clone> InMemoryStore<St> {
    /// Copia del estado de dominio confirmado.
    pub fn snapshot(&self) -> Result<St> {
        Ok(self.lock()?.state.clone())
    }
}

impl<St> TransactionalStore for InMemoryStore<St> where St: Clone + Send
{
    type Conn = MemoryTx<St>;

    fn in_transaction<T, E, F>(&self, isolation: IsolationLevel, f: F) -> std::result::Result<T, E>
        where F: FnOnce(&mut Self::Conn) -> std::result::Result<T, E>,
              E: From<StepError>
    {
        let mut committed = self.lock().map_err(E::from)?;
        let mut tx = MemoryTx { state: committed.state.clone(),
                                outcomes: committed.outcomes.clone(),
                                isolation };
        match f(&mut tx) {
            Ok(value) => {
                committed.state = tx.state;
                committed.outcomes = tx.outcomes;
                self.commits.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            Err(e) => {
                self.rollbacks.fetch_add(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl<St> OutcomeLedger for InMemoryStore<St> where St: Clone + Send
{
    fn ensure_schema(&self, namespace: &str) -> Result<()> {
        validate_namespace(namespace)?;
        self.lock()?.namespaces.insert(namespace.to_string());
        Ok(())
    }

    fn get_outcome(&self, key: &StepKey) -> Result<Option<StepOutcome>> {
        Ok(self.lock()?.outcomes.get(key).cloned())
    }

    fn insert_if_absent(&self, conn: &mut MemoryTx<St>, outcome: &StepOutcome) -> Result<bool> {
        if conn.outcomes.contains_key(&outcome.key) {
            return Ok(false);
        }
        conn.outcomes.insert(outcome.key.clone(), outcome.clone());
        Ok(true)
    }
}
