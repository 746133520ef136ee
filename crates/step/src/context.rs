// Archivo: context.rs
// Propósito: contexto explícito de workflow que el orquestador entrega a
// cada llamada de `run_step` (identidad + contador de pasos).
use std::sync::atomic::{AtomicI32, Ordering};
use uuid::Uuid;

/// Contrato mínimo que el orquestador expone al proveedor de pasos.
///
/// `next_step_id` se invoca exactamente una vez por `run_step` y debe ser
/// monótono, empezando en 0 para cada invocación del workflow.
pub trait WorkflowContext: Send + Sync {
    /// Identidad del workflow actual, `None` fuera de un workflow.
    fn workflow_id(&self) -> Option<&str>;

    /// Reserva el siguiente índice de paso.
    fn next_step_id(&self) -> i32;

    /// Índice que recibirá el próximo paso, sin reservarlo.
    fn peek_step_id(&self) -> i32;

    fn in_workflow(&self) -> bool {
        self.workflow_id().is_some()
    }
}

/// Ejecución fuera de un workflow (modo passthrough).
#[derive(Debug, Clone, Copy, Default)]
pub struct Standalone;

impl WorkflowContext for Standalone {
    fn workflow_id(&self) -> Option<&str> {
        None
    }

    fn next_step_id(&self) -> i32 {
        0
    }

    fn peek_step_id(&self) -> i32 {
        0
    }
}

/// Una invocación concreta de un workflow: identidad durable y contador
/// de pasos local a esta invocación.
///
/// Re-ejecutar un workflow (recuperación tras un crash o reintento) es crear
/// un nuevo `WorkflowHandle` con la misma identidad: el contador vuelve a 0
/// y cada paso se resuelve contra el ledger.
#[derive(Debug)]
pub struct WorkflowHandle {
    workflow_id: String,
    next_step: AtomicI32,
}

impl WorkflowHandle {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self { workflow_id: workflow_id.into(),
               next_step: AtomicI32::new(0) }
    }

    /// Crea un workflow con una identidad nueva (UUID v4).
    pub fn start() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.workflow_id
    }

    /// Índice que recibirá el próximo paso.
    pub fn current_step_index(&self) -> i32 {
        self.next_step.load(Ordering::SeqCst)
    }
}

impl WorkflowContext for WorkflowHandle {
    fn workflow_id(&self) -> Option<&str> {
        Some(&self.workflow_id)
    }

    fn next_step_id(&self) -> i32 {
        self.next_step.fetch_add(1, Ordering::SeqCst)
    }

    fn peek_step_id(&self) -> i32 {
        self.current_step_index()
    }
}
