use alloy_primitives::{BlockHash, BlockNumber};

use crate::{
    ChainConfig, ExecutionAdapter, GasPool, Message, Receipt, ReceiptProcessor, SignedTransaction,
    StateStore, TransactionError, TxContext, Vm,
};

/// Applies one transaction end to end: VM execution, state finalization, gas bookkeeping and
/// receipt assembly.
///
/// `used_gas` is the running gas total of the block and becomes the receipt's cumulative gas.
/// Every `receipt_processors` entry runs on the finished receipt, in order. Any error
/// invalidates the enclosing block; reverted executions produce a failed receipt instead.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_transaction<T, S, V>(
    message: &Message,
    config: &ChainConfig,
    gas_pool: &mut GasPool,
    state: &mut S,
    block_number: BlockNumber,
    block_hash: BlockHash,
    tx: &T,
    used_gas: &mut u64,
    adapter: &mut ExecutionAdapter<V>,
    receipt_processors: &mut [&mut dyn ReceiptProcessor],
) -> Result<Receipt, TransactionError>
where
    T: SignedTransaction,
    S: StateStore + ?Sized,
    V: Vm<S>,
{
    adapter.reset(TxContext::from_message(message));
    let result = adapter.run(state, message, gas_pool)?;

    // Byzantium replaced the intermediate state root in receipts with a status flag.
    let post_state = if config.is_byzantium(block_number) {
        state.finalise(true);
        None
    } else {
        Some(state.intermediate_root(config.is_eip158(block_number)))
    };
    *used_gas += result.gas_used;

    let tx_hash = tx.tx_hash();
    let mut receipt = Receipt {
        tx_type: tx.ty(),
        post_state,
        status: (!result.failed()).into(),
        cumulative_gas_used: *used_gas,
        gas_used: result.gas_used,
        tx_hash,
        ..Default::default()
    };
    if message.is_create() {
        receipt.contract_address = Some(adapter.tx_context().origin.create(tx.nonce()));
    }

    receipt.logs = state.logs(tx_hash, block_number, block_hash);
    receipt.block_hash = block_hash;
    receipt.block_number = block_number;
    receipt.transaction_index = state.tx_index() as u64;

    for processor in receipt_processors.iter_mut() {
        processor.apply(&receipt);
    }
    Ok(receipt)
}
