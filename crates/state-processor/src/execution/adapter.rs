use tracing::trace;

use crate::{
    constants::LOG_TARGET, BlockContext, ExecutionResult, GasPool, Message, TransactionError,
    TxContext, Vm,
};

/// Drives a [`Vm`] for one block.
///
/// The adapter owns the block context for the whole block and rebinds only the transaction
/// context between transactions with [`ExecutionAdapter::reset`]. Around every execution it
/// reserves the message gas limit from the block [`GasPool`] and returns the unused gas
/// afterwards.
#[derive(Debug)]
pub struct ExecutionAdapter<V> {
    vm: V,
    block: BlockContext,
    tx: TxContext,
}

impl<V> ExecutionAdapter<V> {
    /// Creates an adapter for the block described by `block`.
    pub fn new(vm: V, block: BlockContext) -> Self {
        Self { vm, block, tx: TxContext::default() }
    }

    /// Rebinds the adapter to a new transaction.
    pub fn reset(&mut self, tx: TxContext) {
        self.tx = tx;
    }

    /// The block context.
    pub const fn block_context(&self) -> &BlockContext {
        &self.block
    }

    /// The transaction context of the current transaction.
    pub const fn tx_context(&self) -> &TxContext {
        &self.tx
    }

    /// The underlying VM.
    pub const fn vm(&self) -> &V {
        &self.vm
    }

    /// The underlying VM.
    pub fn vm_mut(&mut self) -> &mut V {
        &mut self.vm
    }

    /// Consumes the adapter, returning the VM.
    pub fn into_vm(self) -> V {
        self.vm
    }

    /// Executes `message` in the current contexts.
    ///
    /// Returns an error if the gas pool cannot cover the message gas limit or if the VM refuses
    /// to execute the message. A reverted execution is returned as a failed
    /// [`ExecutionResult`], not as an error.
    pub fn run<S: ?Sized>(
        &mut self,
        state: &mut S,
        message: &Message,
        gas_pool: &mut GasPool,
    ) -> Result<ExecutionResult, TransactionError>
    where
        V: Vm<S>,
    {
        gas_pool.sub_gas(message.gas_limit)?;

        let result =
            self.vm.transact(&self.block, &self.tx, state, message).map_err(TransactionError::vm)?;

        let unused = message.gas_limit.checked_sub(result.gas_used).ok_or(
            TransactionError::GasUsedAboveLimit {
                gas_used: result.gas_used,
                gas_limit: message.gas_limit,
            },
        )?;
        gas_pool.add_gas(unused)?;

        trace!(
            target: LOG_TARGET,
            from = %message.from,
            gas_used = result.gas_used,
            failed = result.failed(),
            "Executed message"
        );
        Ok(result)
    }
}
