use crate::bank::{Bank, BankImpl};
use bank_domain::{Account, BankError, BankRepository, Money, TransferLogEntry};
use log::debug;
use step::{OutcomeLedger, Standalone, WorkflowHandle};

/// Envoltorio durable de `BankImpl`.
///
/// Cada `transfer` establece una identidad de workflow antes de delegar,
/// de modo que sus pasos quedan registrados en el ledger. Las consultas
/// delegan sin workflow.
pub struct DurableBank<S> {
    inner: BankImpl<S>,
}

impl<S> DurableBank<S> where S: BankRepository + OutcomeLedger
{
    /// Registra la implementación plana como workflow durable.
    pub fn register(inner: BankImpl<S>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &BankImpl<S> {
        &self.inner
    }

    /// Ejecuta (o re-ejecuta) la transferencia bajo una identidad dada. Si
    /// la identidad ya se ejecutó, los pasos registrados se repiten desde el
    /// ledger y los que falten se ejecutan.
    pub fn transfer_as(&self, workflow_id: &str, from: i64, to: i64, amount: Money) -> Result<(), BankError> {
        let wf = WorkflowHandle::new(workflow_id);
        debug!("workflow {}: transferencia {} -> {} de {}", wf.id(), from, to, amount);
        self.inner.transfer_in(&wf, from, to, amount)
    }

    pub fn transfer_log(&self) -> Result<Vec<TransferLogEntry>, BankError> {
        self.inner.transfer_log_in(&Standalone)
    }
}

impl<S> Bank for DurableBank<S> where S: BankRepository + OutcomeLedger
{
    fn get_all_accounts(&self) -> Result<Vec<Account>, BankError> {
        self.inner.accounts_in(&Standalone)
    }

    fn transfer(&self, from: i64, to: i64, amount: Money) -> Result<(), BankError> {
        let wf = WorkflowHandle::start();
        debug!("workflow {}: transferencia {} -> {} de {}", wf.id(), from, to, amount);
        self.inner.transfer_in(&wf, from, to, amount)
    }
}
