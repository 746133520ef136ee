mod account;
mod bank_repository;
mod errors;
mod money;

pub use account::{Account, NewTransferLogEntry, TransferLogEntry, TransferStatus};
pub use bank_repository::{BankRepository, BankState};
pub use errors::BankError;
pub use money::Money;

/// Cuentas de demostración: (nombre, saldo inicial).
pub const DEMO_ACCOUNTS: [(&str, Money); 6] = [("Alice", Money::from_units(1000)),
                                              ("Bob", Money::from_units(500)),
                                              ("Charlie", Money::from_units(750)),
                                              ("Diana", Money::from_units(1250)),
                                              ("Eve", Money::from_units(300)),
                                              ("Frank", Money::from_units(2000))];
