//! Tests for whole-block processing.

use alloy_consensus::Header;
use alloy_eips::eip4895::Withdrawal;
use alloy_hardforks::{EthereumHardfork, ForkCondition};
use alloy_primitives::{address, bytes, logs_bloom, Address, Bloom, LogData, Sealed, B256, U256};
use state_processor::{
    test_utils::{
        MemoryChain, MemoryState, ScriptedVmFactory, TestEngine, TestTransaction, TxScript,
    },
    Block, BlockExecutionError, ChainConfig, ChainHardforks, DaoForkConfig, ReceiptStatus,
    SignedTransaction, StateProcessor, StateStore, SystemContractUpgrade, TransactionError,
};

const SENDER: Address = address!("0x2000000000000000000000000000000000000002");
const ALICE: Address = address!("0x1000000000000000000000000000000000000001");
const BOB: Address = address!("0x1000000000000000000000000000000000000002");
const CAROL: Address = address!("0x1000000000000000000000000000000000000003");
const COINBASE: Address = address!("0x00000000000000000000000000000000000c0ffe");

type Processor = StateProcessor<MemoryChain, TestEngine, ScriptedVmFactory>;

fn config() -> ChainConfig {
    ChainConfig::new(1, ChainHardforks::all_active())
}

fn setup(
    config: ChainConfig,
    engine: TestEngine,
    vm: ScriptedVmFactory,
) -> (Processor, Sealed<Header>) {
    let mut chain = MemoryChain::new(config);
    let parent = chain.insert(Header {
        number: 9,
        timestamp: 1_000,
        gas_limit: 30_000_000,
        ..Default::default()
    });
    (StateProcessor::new(chain, engine, vm), parent)
}

fn child(
    parent: &Sealed<Header>,
    gas_limit: u64,
    txs: Vec<TestTransaction>,
) -> Block<TestTransaction> {
    Block::new(
        Header {
            parent_hash: parent.seal(),
            number: parent.number + 1,
            timestamp: parent.timestamp + 12,
            gas_limit,
            beneficiary: COINBASE,
            ..Default::default()
        },
        txs,
    )
}

fn topic_log(byte: u8) -> LogData {
    LogData::new_unchecked(vec![B256::repeat_byte(byte)], bytes!("0x01"))
}

#[test]
fn test_gas_used_is_sum_of_receipts() {
    let vm = ScriptedVmFactory::default()
        .with_script(ALICE, TxScript::success(30_000).with_log(topic_log(1)))
        .with_script(
            CAROL,
            TxScript::success(50_000).with_log(topic_log(3)).with_log(topic_log(4)),
        );
    let (processor, parent) = setup(config(), TestEngine::default(), vm);
    let txs = vec![
        TestTransaction::call(SENDER, 0, ALICE),
        TestTransaction::call(SENDER, 1, BOB),
        TestTransaction::call(SENDER, 2, CAROL),
    ];
    let block = child(&parent, 30_000_000, txs.clone());
    let mut state = MemoryState::default();

    let output = processor.process(&block, &mut state, ()).unwrap();

    assert_eq!(output.gas_used, 101_000);
    assert_eq!(output.receipts.len(), 3);
    let gas: Vec<_> = output.receipts.iter().map(|r| r.gas_used).collect();
    assert_eq!(gas, [30_000, 21_000, 50_000]);
    let cumulative: Vec<_> = output.receipts.iter().map(|r| r.cumulative_gas_used).collect();
    assert_eq!(cumulative, [30_000, 51_000, 101_000]);

    for (index, (receipt, tx)) in output.receipts.iter().zip(&txs).enumerate() {
        assert_eq!(receipt.tx_hash, tx.tx_hash());
        assert_eq!(receipt.transaction_index, index as u64);
        assert_eq!(receipt.block_hash, block.hash());
        assert_eq!(receipt.block_number, 10);
        assert_eq!(receipt.status, ReceiptStatus::Successful);
        assert_eq!(receipt.post_state, None);
    }
    assert!(state.is_full_processed());
    assert_eq!(state.finalise_calls(), 3);
    assert_eq!(state.root_calls(), 0);
}

#[test]
fn test_logs_follow_receipt_order() {
    let vm = ScriptedVmFactory::default()
        .with_script(
            ALICE,
            TxScript::success(21_000).with_log(topic_log(1)).with_log(topic_log(2)),
        )
        .with_script(CAROL, TxScript::success(21_000).with_log(topic_log(3)));
    let (processor, parent) = setup(config(), TestEngine::default(), vm);
    let block = child(
        &parent,
        30_000_000,
        vec![
            TestTransaction::call(SENDER, 0, ALICE),
            TestTransaction::call(SENDER, 1, BOB),
            TestTransaction::call(SENDER, 2, CAROL),
        ],
    );

    let output = processor.process(&block, &mut MemoryState::default(), ()).unwrap();

    let topics: Vec<_> = output.logs.iter().map(|log| log.topics()[0]).collect();
    assert_eq!(topics, [B256::repeat_byte(1), B256::repeat_byte(2), B256::repeat_byte(3)]);
    assert_eq!(output.receipts[0].logs.len(), 2);
    assert!(output.receipts[1].logs.is_empty());
    assert!(output.logs.iter().all(|log| log.address != BOB));
}

#[test]
fn test_receipt_blooms_are_filled() {
    let vm = ScriptedVmFactory::default()
        .with_script(ALICE, TxScript::success(21_000).with_log(topic_log(1)));
    let (processor, parent) = setup(config(), TestEngine::default(), vm);
    let txs = (0..200u64)
        .map(|nonce| TestTransaction::call(SENDER, nonce, if nonce % 2 == 0 { ALICE } else { BOB }))
        .collect();
    let block = child(&parent, 30_000_000, txs);

    let output = processor.process(&block, &mut MemoryState::default(), ()).unwrap();

    for receipt in &output.receipts {
        assert_eq!(receipt.logs_bloom, logs_bloom(&receipt.logs));
    }
    assert_eq!(output.receipts[1].logs_bloom, Bloom::ZERO);
    assert_ne!(output.receipts[0].logs_bloom, Bloom::ZERO);
}

#[test]
fn test_reverted_tx_gets_failed_receipt() {
    let vm = ScriptedVmFactory::default()
        .with_script(ALICE, TxScript::revert(40_000, bytes!("0xdead")).with_log(topic_log(1)))
        .with_script(BOB, TxScript::halt(100_000, "out of gas"));
    let (processor, parent) = setup(config(), TestEngine::default(), vm);
    let block = child(
        &parent,
        30_000_000,
        vec![
            TestTransaction::call(SENDER, 0, ALICE),
            TestTransaction::call(SENDER, 1, BOB),
            TestTransaction::call(SENDER, 2, CAROL),
        ],
    );

    let output = processor.process(&block, &mut MemoryState::default(), ()).unwrap();

    let statuses: Vec<_> = output.receipts.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [ReceiptStatus::Failed, ReceiptStatus::Failed, ReceiptStatus::Successful]
    );
    assert!(output.receipts[0].logs.is_empty());
    assert_eq!(output.gas_used, 161_000);
}

#[test]
fn test_gas_limit_exceeded_aborts_block() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(
        &parent,
        50_000,
        vec![
            TestTransaction::call(SENDER, 0, ALICE).with_gas_limit(30_000),
            TestTransaction::call(SENDER, 1, BOB).with_gas_limit(30_000),
        ],
    );

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();

    assert!(err.is_gas_limit_exceeded());
    assert_eq!(err.tx_index(), Some(1));
    assert_eq!(err.tx_hash(), Some(block.transactions[1].tx_hash()));
    assert!(err.to_string().starts_with("could not apply tx 1 ["));
    assert!(processor.engine().finalized().is_empty());
}

#[test]
fn test_block_gas_limit_fits_exactly() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(
        &parent,
        51_000,
        vec![
            TestTransaction::call(SENDER, 0, ALICE).with_gas_limit(30_000),
            TestTransaction::call(SENDER, 1, BOB).with_gas_limit(30_000),
        ],
    );

    let output = processor.process(&block, &mut MemoryState::default(), ()).unwrap();
    assert_eq!(output.gas_used, 42_000);
}

#[test]
fn test_empty_block() {
    let engine = TestEngine::default().with_block_reward(U256::from(2));
    let (processor, parent) = setup(config(), engine, ScriptedVmFactory::default());
    let block = child(&parent, 30_000_000, vec![]);
    let mut state = MemoryState::default();

    let output = processor.process(&block, &mut state, ()).unwrap();

    assert!(output.receipts.is_empty());
    assert!(output.logs.is_empty());
    assert_eq!(output.gas_used, 0);
    assert_eq!(state.balance(COINBASE), U256::from(2));

    let records = processor.engine().finalized();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].block_hash, block.hash());
    assert_eq!(records[0].receipts, 0);
    assert_eq!(records[0].withdrawals, None);
}

#[test]
fn test_missing_parent() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let mut header = child(&parent, 30_000_000, vec![]).header.into_inner();
    header.parent_hash = B256::repeat_byte(0xab);
    let block = Block::<TestTransaction>::new(header, vec![]);

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();
    assert!(matches!(
        err,
        BlockExecutionError::MissingParent { parent_hash } if parent_hash == B256::repeat_byte(0xab)
    ));
}

#[test]
fn test_withdrawals_before_shanghai() {
    let hardforks = ChainHardforks::all_active().without_fork(EthereumHardfork::Shanghai);
    let config = ChainConfig::new(1, hardforks);
    let (processor, parent) = setup(config, TestEngine::default(), ScriptedVmFactory::default());
    let block = child(&parent, 30_000_000, vec![]).with_withdrawals(vec![Withdrawal::default()]);

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();
    assert!(matches!(err, BlockExecutionError::WithdrawalsBeforeShanghai));
    assert_eq!(err.to_string(), "withdrawals before shanghai");
    assert!(processor.engine().finalized().is_empty());
}

#[test]
fn test_withdrawals_after_shanghai() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(&parent, 30_000_000, vec![])
        .with_withdrawals(vec![Withdrawal::default(), Withdrawal::default()]);

    processor.process(&block, &mut MemoryState::default(), ()).unwrap();
    assert_eq!(processor.engine().finalized()[0].withdrawals, Some(2));
}

#[test]
fn test_contract_creation_address() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(
        &parent,
        30_000_000,
        vec![
            TestTransaction::call(SENDER, 4, ALICE),
            TestTransaction::create(SENDER, 5).with_input(bytes!("0x6080")),
        ],
    );
    let mut state = MemoryState::default();

    let output = processor.process(&block, &mut state, ()).unwrap();

    assert_eq!(output.receipts[0].contract_address, None);
    let created = SENDER.create(5);
    assert_eq!(output.receipts[1].contract_address, Some(created));
    assert_eq!(state.code(created), Some(&bytes!("0x6080")));
}

#[test]
fn test_invalid_transaction_aborts_block() {
    let (processor, parent) = setup(config(), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(
        &parent,
        30_000_000,
        vec![
            TestTransaction::call(SENDER, 0, ALICE),
            TestTransaction::call(SENDER, 1, BOB).with_invalid_signature(),
        ],
    );

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();
    assert!(matches!(err, BlockExecutionError::InvalidTransaction { index: 1, .. }));
}

#[test]
fn test_vm_setup_error_aborts_block() {
    let vm = ScriptedVmFactory::default().with_script(BOB, TxScript::reject("nonce too low"));
    let (processor, parent) = setup(config(), TestEngine::default(), vm);
    let block = child(
        &parent,
        30_000_000,
        vec![TestTransaction::call(SENDER, 0, ALICE), TestTransaction::call(SENDER, 1, BOB)],
    );

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();
    assert!(matches!(
        err,
        BlockExecutionError::ApplyTransaction { index: 1, source: TransactionError::Vm(_), .. }
    ));
    assert!(!err.is_gas_limit_exceeded());
}

#[test]
fn test_pre_byzantium_receipts_carry_state_root() {
    let hardforks = ChainHardforks::all_active()
        .with_fork(EthereumHardfork::Byzantium, ForkCondition::Block(11));
    let (processor, parent) =
        setup(ChainConfig::new(1, hardforks), TestEngine::default(), ScriptedVmFactory::default());
    let block = child(
        &parent,
        30_000_000,
        vec![TestTransaction::call(SENDER, 0, ALICE), TestTransaction::call(SENDER, 1, BOB)],
    );
    let mut state = MemoryState::default().with_balance(SENDER, U256::from(1_000_000));

    let output = processor.process(&block, &mut state, ()).unwrap();

    let roots: Vec<_> = output.receipts.iter().map(|r| r.post_state).collect();
    assert!(roots.iter().all(Option::is_some));
    assert_ne!(roots[0], roots[1]);
    assert_eq!(roots[1], Some(state.root()));
    assert_eq!(state.root_calls(), 2);
    assert!(output.receipts.iter().all(|r| r.status == ReceiptStatus::Successful));
}

#[test]
fn test_fees_and_block_reward() {
    let engine = TestEngine::default().with_block_reward(U256::from(1_000));
    let (processor, parent) = setup(config(), engine, ScriptedVmFactory::default());
    let block = child(
        &parent,
        30_000_000,
        vec![TestTransaction::call(SENDER, 0, ALICE).with_gas_price(2)],
    );
    let mut state = MemoryState::default().with_balance(SENDER, U256::from(100_000));

    processor.process(&block, &mut state, ()).unwrap();

    assert_eq!(state.balance(SENDER), U256::from(58_000));
    assert_eq!(state.balance(COINBASE), U256::from(43_000));
}

#[test]
fn test_dao_fork_block_drains_accounts() {
    let dao = DaoForkConfig { drain_list: vec![ALICE, BOB], refund_contract: CAROL };
    let config = config().with_dao_fork(10, dao);
    let (processor, parent) = setup(config, TestEngine::default(), ScriptedVmFactory::default());
    let mut state = MemoryState::default()
        .with_balance(ALICE, U256::from(3))
        .with_balance(BOB, U256::from(4));

    processor.process(&child(&parent, 30_000_000, vec![]), &mut state, ()).unwrap();

    assert_eq!(state.balance(ALICE), U256::ZERO);
    assert_eq!(state.balance(BOB), U256::ZERO);
    assert_eq!(state.balance(CAROL), U256::from(7));
}

#[test]
fn test_dao_fork_skipped_without_support() {
    let dao = DaoForkConfig { drain_list: vec![ALICE], refund_contract: CAROL };
    let mut config = config().with_dao_fork(10, dao);
    config.dao_fork_support = false;
    let (processor, parent) = setup(config, TestEngine::default(), ScriptedVmFactory::default());
    let mut state = MemoryState::default().with_balance(ALICE, U256::from(3));

    processor.process(&child(&parent, 30_000_000, vec![]), &mut state, ()).unwrap();
    assert_eq!(state.balance(ALICE), U256::from(3));
}

#[test]
fn test_system_contract_upgrade_at_transition() {
    let contract = address!("0x0000000000000000000000000000000000001000");
    let config = config().with_system_contract_upgrade(SystemContractUpgrade {
        name: "kepler".to_string(),
        activation: ForkCondition::Timestamp(1_010),
        contracts: vec![(contract, bytes!("0x6080"))],
    });
    let (processor, parent) = setup(config, TestEngine::default(), ScriptedVmFactory::default());
    let mut state = MemoryState::default();

    processor.process(&child(&parent, 30_000_000, vec![]), &mut state, ()).unwrap();
    assert_eq!(state.code(contract), Some(&bytes!("0x6080")));
}

#[test]
fn test_finalize_error_carries_logs() {
    let vm = ScriptedVmFactory::default()
        .with_script(ALICE, TxScript::success(30_000).with_log(topic_log(1)));
    let engine = TestEngine::default().with_finalize_error("bad validator set");
    let (processor, parent) = setup(config(), engine, vm);
    let block = child(
        &parent,
        30_000_000,
        vec![TestTransaction::call(SENDER, 0, ALICE), TestTransaction::call(SENDER, 1, BOB)],
    );

    let err = processor.process(&block, &mut MemoryState::default(), ()).unwrap_err();

    match err {
        BlockExecutionError::Finalize { source, logs, used_gas } => {
            assert_eq!(source.to_string(), "bad validator set");
            assert_eq!(logs.len(), 1);
            assert_eq!(used_gas, 51_000);
        }
        err => panic!("unexpected error: {err}"),
    }
}
