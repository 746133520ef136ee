// Archivo: provider.rs
// Propósito: implementar `StepProvider`, el núcleo de idempotencia. Cada
// paso de un workflow se resuelve contra el ledger: si ya tiene resultado
// se repite sin ejecutar la función; si no, se ejecuta en una transacción
// y su resultado se registra en esa misma transacción.
use crate::context::WorkflowContext;
use crate::errors::{RecordableError, StepError};
use crate::ledger::{IsolationLevel, OutcomeLedger};
use crate::outcome::{Outcome, StepKey, StepOutcome};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Namespace usado cuando el caller no configura uno.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Estado observable de un paso en el ledger. `RUNNING` no existe aquí:
/// sólo dura lo que dura la transacción del intento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    CommittedSuccess,
    CommittedFailure,
}

/// Qué errores del paso se registran en el ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    /// Sólo los que `RecordableError::to_failure` acepta.
    RecordableOnly,
    /// Todos.
    Terminal,
}

/// Motivo por el que la transacción de un intento terminó en rollback.
enum Attempt<E> {
    /// La función del paso devolvió error.
    Failed(E),
    /// Fallo del almacén o de serialización del valor devuelto.
    Store(StepError),
    /// Otro intento concurrente registró la clave primero.
    Lost,
}

impl<E> From<StepError> for Attempt<E> {
    fn from(e: StepError) -> Self {
        Attempt::Store(e)
    }
}

/// Proveedor de pasos transaccionales e idempotentes.
///
/// Responsabilidades:
/// - Fuera de un workflow: ejecutar la función en una transacción (passthrough).
/// - Dentro de un workflow: consultar el ledger y repetir el resultado
///   registrado, o ejecutar la función y registrar su resultado de forma
///   atómica junto con sus escrituras.
/// - Resolver carreras entre reintentos concurrentes a través de la clave
///   primaria del ledger.
pub struct StepProvider<S> {
    store: Arc<S>,
    namespace: String,
    default_isolation: IsolationLevel,
}

impl<S> Clone for StepProvider<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(),
               namespace: self.namespace.clone(),
               default_isolation: self.default_isolation }
    }
}

impl<S> StepProvider<S> where S: OutcomeLedger
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store,
               namespace: DEFAULT_NAMESPACE.to_string(),
               default_isolation: IsolationLevel::default() }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_default_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.default_isolation = isolation;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_isolation(&self) -> IsolationLevel {
        self.default_isolation
    }

    /// Crea la tabla del ledger para el namespace de este proveedor.
    pub fn ensure_schema(&self) -> crate::Result<()> {
        self.store.ensure_schema(&self.namespace)
    }

    /// Consulta el estado registrado de un paso concreto.
    pub fn step_state(&self, workflow_id: &str, step_index: i32) -> crate::Result<StepState> {
        let key = StepKey::new(&self.namespace, workflow_id, step_index);
        Ok(match self.store.get_outcome(&key)? {
               None => StepState::NotStarted,
               Some(row) if row.is_failure() => StepState::CommittedFailure,
               Some(_) => StepState::CommittedSuccess,
           })
    }

    /// `run_step` con el nivel de aislamiento por defecto del proveedor.
    pub fn run_step_default<T, E, F>(&self, ctx: &dyn WorkflowContext, name: &str, f: F) -> Result<T, E>
        where T: Serialize + DeserializeOwned,
              E: RecordableError,
              F: FnOnce(&mut S::Conn) -> Result<T, E>
    {
        self.run_step(ctx, self.default_isolation, name, f)
    }

    /// Ejecuta `f` como un paso durable.
    ///
    /// Dentro de un workflow el efecto de `f` se aplica como mucho una vez
    /// por `(workflow_id, step_index)`: un resultado registrado (éxito o
    /// fallo) se devuelve sin volver a invocar `f`.
    pub fn run_step<T, E, F>(&self, ctx: &dyn WorkflowContext, isolation: IsolationLevel, name: &str, f: F)
                             -> Result<T, E>
        where T: Serialize + DeserializeOwned,
              E: RecordableError,
              F: FnOnce(&mut S::Conn) -> Result<T, E>
    {
        self.execute(ctx, isolation, name, FailurePolicy::RecordableOnly, f)
    }

    /// Como `run_step`, pero cualquier error de `f` (también los
    /// transitorios) cierra el paso: se registra vía
    /// `RecordableError::to_terminal_failure` y los reintentos lo repiten.
    pub fn run_terminal_step<T, E, F>(&self, ctx: &dyn WorkflowContext, isolation: IsolationLevel, name: &str, f: F)
                                      -> Result<T, E>
        where T: Serialize + DeserializeOwned,
              E: RecordableError,
              F: FnOnce(&mut S::Conn) -> Result<T, E>
    {
        self.execute(ctx, isolation, name, FailurePolicy::Terminal, f)
    }

    fn execute<T, E, F>(&self, ctx: &dyn WorkflowContext, isolation: IsolationLevel, name: &str, policy: FailurePolicy,
                        f: F)
                        -> Result<T, E>
        where T: Serialize + DeserializeOwned,
              E: RecordableError,
              F: FnOnce(&mut S::Conn) -> Result<T, E>
    {
        let workflow_id = match ctx.workflow_id() {
            Some(id) => id.to_string(),
            None => return self.store.in_transaction(isolation, f),
        };
        let key = StepKey::new(&self.namespace, workflow_id, ctx.next_step_id());

        if let Some(recorded) = self.store.get_outcome(&key).map_err(E::from)? {
            debug!("paso '{}' ({}) ya registrado; se repite el resultado", name, key);
            return replay(&recorded);
        }

        let attempt = self.store.in_transaction(isolation, |conn: &mut S::Conn| -> Result<T, Attempt<E>> {
                                    let value = f(conn).map_err(Attempt::Failed)?;
                                    let row = StepOutcome::success(key.clone(), &value)?;
                                    if !self.store.insert_if_absent(conn, &row)? {
                                        return Err(Attempt::Lost);
                                    }
                                    Ok(value)
                                });

        match attempt {
            Ok(value) => {
                debug!("paso '{}' ({}) confirmado", name, key);
                Ok(value)
            }
            Err(Attempt::Lost) => {
                warn!("paso '{}' ({}) registrado por un intento concurrente; se descarta el resultado local", name, key);
                self.recorded_by_winner(&key)
            }
            Err(Attempt::Store(e)) => Err(E::from(e)),
            Err(Attempt::Failed(err)) => self.record_failure(&key, name, policy, err),
        }
    }

    /// Registra el fallo en una transacción propia (las escrituras del paso
    /// ya se revirtieron) y lo vuelve a lanzar.
    fn record_failure<T, E>(&self, key: &StepKey, name: &str, policy: FailurePolicy, err: E) -> Result<T, E>
        where T: DeserializeOwned,
              E: RecordableError
    {
        let failure = match policy {
            FailurePolicy::Terminal => err.to_terminal_failure(),
            FailurePolicy::RecordableOnly => match err.to_failure() {
                Some(f) => f,
                None => return Err(err),
            },
        };
        let row = StepOutcome::failure(key.clone(), &failure).map_err(E::from)?;
        let inserted =
            self.store
                .in_transaction(IsolationLevel::ReadCommitted, |conn| self.store.insert_if_absent(conn, &row));
        match inserted {
            Ok(true) => {
                info!("paso '{}' ({}) fallo registrado: {}", name, key, failure);
                Err(err)
            }
            Ok(false) => {
                warn!("paso '{}' ({}) registrado por un intento concurrente; se descarta el fallo local", name, key);
                self.recorded_by_winner(key)
            }
            Err(e) => {
                error!("no se pudo registrar el fallo del paso '{}' ({}): {}", name, key, e);
                Err(err)
            }
        }
    }

    fn recorded_by_winner<T, E>(&self, key: &StepKey) -> Result<T, E>
        where T: DeserializeOwned,
              E: RecordableError
    {
        match self.store.get_outcome(key).map_err(E::from)? {
            Some(row) => replay(&row),
            None => Err(E::from(StepError::Conflict(format!("el paso {} fue registrado por otro intento pero no es \
                                                             visible",
                                                            key)))),
        }
    }
}

fn replay<T, E>(row: &StepOutcome) -> Result<T, E>
    where T: DeserializeOwned,
          E: RecordableError
{
    match row.decode::<T>().map_err(E::from)? {
        Outcome::Success(value) => Ok(value),
        Outcome::Failure(failure) => Err(E::from_failure(failure)),
    }
}
