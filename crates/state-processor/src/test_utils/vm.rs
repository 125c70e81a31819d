use alloy_primitives::{map::HashMap, Address, Bytes, Log, LogData, U256};

use crate::{
    BlockContext, ExecutionResult, ExecutionStatus, Message, StateStore, TxContext, Vm, VmFactory,
};

use super::MemoryState;

/// Error returned by a [`ScriptedVm`] refusing to execute a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ScriptedVmError(pub String);

/// The scripted outcome of messages sent to one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxScript {
    gas_used: u64,
    status: ExecutionStatus,
    output: Bytes,
    logs: Vec<LogData>,
    reject: Option<String>,
}

impl Default for TxScript {
    fn default() -> Self {
        Self::success(ScriptedVm::DEFAULT_GAS_USED)
    }
}

impl TxScript {
    /// A successful execution using `gas_used`.
    pub const fn success(gas_used: u64) -> Self {
        Self {
            gas_used,
            status: ExecutionStatus::Success,
            output: Bytes::new(),
            logs: Vec::new(),
            reject: None,
        }
    }

    /// A reverted execution using `gas_used`.
    pub fn revert(gas_used: u64, output: impl Into<Bytes>) -> Self {
        Self { status: ExecutionStatus::Revert, output: output.into(), ..Self::success(gas_used) }
    }

    /// A halted execution consuming `gas_used`.
    pub fn halt(gas_used: u64, reason: impl Into<String>) -> Self {
        Self { status: ExecutionStatus::Halt { reason: reason.into() }, ..Self::success(gas_used) }
    }

    /// A message the VM refuses to execute.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self { reject: Some(reason.into()), ..Self::success(0) }
    }

    /// Emits a log from the executed address. Logs of failed executions are discarded.
    pub fn with_log(mut self, data: LogData) -> Self {
        self.logs.push(data);
        self
    }
}

/// A [`Vm`] replaying scripted outcomes, keyed by the executed address: the recipient of a call
/// or the address of a created contract.
///
/// Gas is charged to the sender at the message gas price and paid to the block coinbase. A
/// successful creation installs the init code as contract code.
#[derive(Debug, Default, Clone)]
pub struct ScriptedVm {
    scripts: HashMap<Address, TxScript>,
    executed: Vec<Message>,
}

impl ScriptedVm {
    /// Gas used by messages sent to an address without a script.
    pub const DEFAULT_GAS_USED: u64 = 21_000;

    /// Scripts the outcome of messages executing `address`.
    pub fn with_script(mut self, address: Address, script: TxScript) -> Self {
        self.scripts.insert(address, script);
        self
    }

    /// Number of executed messages.
    pub fn executed(&self) -> usize {
        self.executed.len()
    }

    /// The executed messages, in order.
    pub fn messages(&self) -> &[Message] {
        &self.executed
    }
}

impl Vm<MemoryState> for ScriptedVm {
    type Error = ScriptedVmError;

    fn transact(
        &mut self,
        block: &BlockContext,
        tx: &TxContext,
        state: &mut MemoryState,
        message: &Message,
    ) -> Result<ExecutionResult, Self::Error> {
        let target = message.to.unwrap_or_else(|| message.from.create(message.nonce));
        let script = self.scripts.get(&target).cloned().unwrap_or_default();
        if let Some(reason) = script.reject {
            return Err(ScriptedVmError(reason));
        }
        self.executed.push(message.clone());

        let fee = U256::from(script.gas_used) * U256::from(tx.gas_price);
        state.sub_balance(message.from, fee);
        state.add_balance(block.coinbase, fee);

        if script.status == ExecutionStatus::Success {
            for data in script.logs {
                state.emit(Log { address: target, data });
            }
            if message.is_create() {
                state.set_code(target, message.input.clone());
            }
        }

        Ok(ExecutionResult {
            gas_used: script.gas_used,
            status: script.status,
            output: script.output,
        })
    }
}

/// Creates [`ScriptedVm`]s sharing one set of scripts.
#[derive(Debug, Default, Clone)]
pub struct ScriptedVmFactory {
    vm: ScriptedVm,
}

impl ScriptedVmFactory {
    /// Scripts the outcome of messages executing `address`.
    pub fn with_script(mut self, address: Address, script: TxScript) -> Self {
        self.vm = self.vm.with_script(address, script);
        self
    }
}

impl VmFactory<MemoryState> for ScriptedVmFactory {
    type Vm = ScriptedVm;
    type Config = ();

    fn create_vm(&self, _block: &BlockContext, _config: ()) -> ScriptedVm {
        self.vm.clone()
    }
}
