//! Crate `step`: pasos transaccionales durables e idempotentes
//!
//! Este crate define el contexto explícito de workflow (`WorkflowContext`),
//! el ledger de resultados (`OutcomeLedger`), el ejecutor transaccional
//! (`TransactionalStore`) y el proveedor de pasos (`StepProvider`) que los
//! combina. También expone un almacén en memoria (`InMemoryStore`) útil
//! para pruebas.
//!
//! Diseño resumido:
//! - Cada paso de un workflow se identifica por `(namespace, workflow_id,
//!   step_index)`.
//! - Al ejecutarse, el resultado del paso se inserta en el ledger dentro de
//!   la misma transacción que sus escrituras: o se aplican ambos o ninguno.
//! - Un paso ya registrado se repite desde el ledger sin volver a ejecutarse.
//! - La clave primaria del ledger decide qué intento concurrente gana.
//!
//! Ejemplo rápido:
//! ```rust
//! use step::{StepError, StepProvider, WorkflowHandle};
//! use step::stubs::InMemoryStore;
//! use std::sync::Arc;
//! let provider = StepProvider::new(Arc::new(InMemoryStore::<u32>::new()));
//! let wf = WorkflowHandle::new("wf-1");
//! let v: u32 = provider.run_step_default(&wf, "incr", |tx| -> Result<u32, StepError> {
//!     tx.state += 1;
//!     Ok(tx.state)
//! }).unwrap();
//! assert_eq!(v, 1);
//! ```
pub mod context;
pub mod errors;
pub mod ledger;
pub mod outcome;
pub mod provider;
pub mod stubs;

pub use context::*;
pub use errors::*;
pub use ledger::*;
pub use outcome::*;
pub use provider::*;
