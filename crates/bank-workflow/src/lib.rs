//! Workflow de transferencia de fondos construido sobre `step`.
//!
//! `BankImpl` es la implementación plana; `DurableBank::register` la
//! envuelve para que cada transferencia corra como workflow durable.
mod bank;
mod durable;

pub use bank::{Bank, BankImpl};
pub use durable::DurableBank;
