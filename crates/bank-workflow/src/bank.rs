use bank_domain::{Account, BankError, BankRepository, Money, NewTransferLogEntry, TransferLogEntry};
use log::{error, info, warn};
use std::sync::Arc;
use step::{OutcomeLedger, Standalone, StepProvider, StepState, WorkflowContext};

/// Capacidad bancaria expuesta a la capa exterior (CLI, HTTP).
pub trait Bank: Send + Sync {
    fn get_all_accounts(&self) -> Result<Vec<Account>, BankError>;

    /// Transfiere `amount` de la cuenta `from` a la cuenta `to`.
    fn transfer(&self, from: i64, to: i64, amount: Money) -> Result<(), BankError>;
}

/// Implementación plana del banco. Cada operación recibe el contexto de
/// workflow de forma explícita y ejecuta sus pasos a través del
/// `StepProvider`; sin workflow (`Standalone`) los pasos son passthrough.
pub struct BankImpl<S> {
    provider: StepProvider<S>,
}

impl<S> BankImpl<S> where S: BankRepository + OutcomeLedger
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_provider(StepProvider::new(store))
    }

    pub fn with_provider(provider: StepProvider<S>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &StepProvider<S> {
        &self.provider
    }

    pub fn accounts_in(&self, ctx: &dyn WorkflowContext) -> Result<Vec<Account>, BankError> {
        let store = self.provider.store();
        self.provider.run_step_default(ctx, "getAllAccounts", |conn| store.list_accounts(conn))
    }

    pub fn transfer_log_in(&self, ctx: &dyn WorkflowContext) -> Result<Vec<TransferLogEntry>, BankError> {
        let store = self.provider.store();
        self.provider.run_step_default(ctx, "getTransferLog", |conn| store.list_transfer_log(conn))
    }

    /// Paso `transferFunds`: débito condicional y crédito en una única
    /// transacción. Si el crédito no encuentra la cuenta destino, el error
    /// revierte también el débito. Cualquier fallo cierra el paso, también
    /// los de persistencia, para que la bitácora no contradiga una
    /// re-ejecución posterior.
    pub fn transfer_funds(&self, ctx: &dyn WorkflowContext, from: i64, to: i64, amount: Money) -> Result<(), BankError> {
        let store = self.provider.store();
        let isolation = self.provider.default_isolation();
        self.provider.run_terminal_step(ctx, isolation, "transferFunds", |conn: &mut S::Conn| -> Result<(), BankError> {
                         if !amount.is_positive() {
                             return Err(BankError::InvalidAmount);
                         }
                         if store.debit(conn, from, amount)? == 0 {
                             return Err(BankError::InsufficientFundsOrNotFound);
                         }
                         if store.credit(conn, to, amount)? == 0 {
                             return Err(BankError::RecipientNotFound);
                         }
                         Ok(())
                     })
    }

    /// Paso `logTransfer`: agrega la entrada de bitácora. Al pasar por el
    /// proveedor, una re-ejecución del workflow no duplica la fila.
    pub fn log_transfer(&self, ctx: &dyn WorkflowContext, entry: &NewTransferLogEntry) -> Result<(), BankError> {
        let store = self.provider.store();
        self.provider.run_step_default(ctx, "logTransfer", |conn| store.append_transfer_log(conn, entry))
    }

    /// Workflow de transferencia: `transferFunds` y después, siempre,
    /// `logTransfer` con el resultado.
    ///
    /// Dentro de un workflow la bitácora sólo se escribe si el resultado del
    /// paso de fondos quedó registrado: si ni siquiera se pudo registrar el
    /// fallo, una re-ejecución lo reintentará y escribirá la bitácora una vez.
    pub fn transfer_in(&self, ctx: &dyn WorkflowContext, from: i64, to: i64, amount: Money) -> Result<(), BankError> {
        let funds_step = ctx.peek_step_id();
        let result = self.transfer_funds(ctx, from, to, amount);
        if let (Err(e), Some(workflow_id)) = (&result, ctx.workflow_id()) {
            if !e.is_business() && !self.funds_step_closed(workflow_id, funds_step) {
                warn!("workflow {}: fallo de fondos sin registrar, se omite la bitácora: {}", workflow_id, e);
                return result;
            }
        }

        let entry = NewTransferLogEntry::from_result(from, to, amount, &result);
        let logged = self.log_transfer(ctx, &entry);
        match (result, logged) {
            (Ok(()), Ok(())) => {
                info!("transferencia {} -> {} de {} completada", from, to, amount);
                Ok(())
            }
            (Ok(()), Err(log_err)) => Err(log_err),
            (Err(e), Ok(())) => {
                info!("transferencia {} -> {} de {} rechazada: {}", from, to, amount, e);
                Err(e)
            }
            (Err(e), Err(log_err)) => {
                error!("no se pudo registrar la transferencia fallida {} -> {}: {}", from, to, log_err);
                Err(e)
            }
        }
    }

    fn funds_step_closed(&self, workflow_id: &str, step_index: i32) -> bool {
        match self.provider.step_state(workflow_id, step_index) {
            Ok(state) => state != StepState::NotStarted,
            Err(e) => {
                error!("workflow {}: no se pudo consultar el paso {}: {}", workflow_id, step_index, e);
                false
            }
        }
    }
}

impl<S> Bank for BankImpl<S> where S: BankRepository + OutcomeLedger
{
    fn get_all_accounts(&self) -> Result<Vec<Account>, BankError> {
        self.accounts_in(&Standalone)
    }

    fn transfer(&self, from: i64, to: i64, amount: Money) -> Result<(), BankError> {
        self.transfer_in(&Standalone, from, to, amount)
    }
}
