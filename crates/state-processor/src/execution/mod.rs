//! The boundary to the external VM.
//!
//! The state processor never interprets bytecode. It builds a [`BlockContext`] once per block
//! and a [`TxContext`] once per transaction, and drives a [`Vm`] through the
//! [`ExecutionAdapter`], which also settles gas with the block [`GasPool`](crate::GasPool).

mod adapter;
mod context;

pub use adapter::*;
pub use context::*;

use alloy_primitives::Bytes;

use crate::{BoxError, GasPoolError, Message};

/// How a transaction execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Execution completed successfully.
    Success,
    /// Execution was reverted by the contract.
    Revert,
    /// Execution halted on an exceptional condition such as running out of gas.
    Halt {
        /// Human readable halt reason reported by the VM.
        reason: String,
    },
}

/// Outcome of executing one message.
///
/// A reverted or halted execution is a normal outcome: it is billed and receives a failed
/// receipt. Logs are not carried here; they are read back from the state store's
/// per-transaction log buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Gas used by the execution, refunds already applied.
    pub gas_used: u64,
    /// How the execution ended.
    pub status: ExecutionStatus,
    /// Return data or revert payload.
    pub output: Bytes,
}

impl ExecutionResult {
    /// A successful execution.
    pub const fn success(gas_used: u64) -> Self {
        Self { gas_used, status: ExecutionStatus::Success, output: Bytes::new() }
    }

    /// A reverted execution.
    pub const fn revert(gas_used: u64, output: Bytes) -> Self {
        Self { gas_used, status: ExecutionStatus::Revert, output }
    }

    /// Returns `true` if the execution reverted or halted.
    pub const fn failed(&self) -> bool {
        !matches!(self.status, ExecutionStatus::Success)
    }
}

/// The external VM executing a single message against the state store `S`.
///
/// Logs emitted during execution are written to the state store's log buffer as a side effect.
pub trait Vm<S: ?Sized> {
    /// Setup error: the message could not be executed at all (bad nonce, insufficient funds for
    /// gas, ...). Such an error invalidates the enclosing block.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes `message` in the given block and transaction contexts.
    fn transact(
        &mut self,
        block: &BlockContext,
        tx: &TxContext,
        state: &mut S,
        message: &Message,
    ) -> Result<ExecutionResult, Self::Error>;
}

/// Creates a [`Vm`] for one block.
pub trait VmFactory<S: ?Sized> {
    /// The VM type.
    type Vm: Vm<S>;
    /// Per-run VM configuration (tracing hooks, debug flags, ...).
    type Config: Clone + core::fmt::Debug + Default;

    /// Creates a VM bound to the given block.
    fn create_vm(&self, block: &BlockContext, config: Self::Config) -> Self::Vm;
}

/// Error applying a single transaction. Every variant invalidates the enclosing block.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The block gas pool cannot cover the transaction gas limit.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),
    /// The VM reported more gas used than the message allowed.
    #[error("gas used exceeds gas limit: gas_used={gas_used} > gas_limit={gas_limit}")]
    GasUsedAboveLimit {
        /// Gas used reported by the VM.
        gas_used: u64,
        /// Gas limit of the message.
        gas_limit: u64,
    },
    /// The VM refused to execute the message.
    #[error("vm setup error: {0}")]
    Vm(#[source] BoxError),
}

impl TransactionError {
    /// Wraps a VM setup error.
    pub fn vm<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Vm(Box::new(err))
    }

    /// Returns `true` if the block gas pool could not cover the transaction.
    pub const fn is_gas_limit_exceeded(&self) -> bool {
        matches!(self, Self::GasPool(GasPoolError::GasLimitExceeded { .. }))
    }
}
