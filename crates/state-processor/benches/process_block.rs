//! Benchmarks for whole-block processing.
//!
//! Compares the monolithic `process` call with the stepwise `prepare`/`process_tx`/`commit`
//! drive, over blocks of increasing size where half of the transactions emit logs.
#![allow(missing_docs)]

use alloy_consensus::Header;
use alloy_primitives::{address, bytes, Address, LogData, Sealed, B256};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use state_processor::{
    test_utils::{
        MemoryChain, MemoryState, ScriptedVmFactory, TestEngine, TestTransaction, TxScript,
    },
    Block, ChainConfig, ChainHardforks, StateProcessor,
};

const SENDER: Address = address!("0x0000000000000000000000000000000000100000");
const TOKEN: Address = address!("0x0000000000000000000000000000000000100001");
const WALLET: Address = address!("0x0000000000000000000000000000000000100002");

type Processor = StateProcessor<MemoryChain, TestEngine, ScriptedVmFactory>;

fn setup(tx_count: u64) -> (Processor, Block<TestTransaction>) {
    let transfer = LogData::new_unchecked(vec![B256::repeat_byte(0xdd); 3], bytes!("0x01"));
    let vm = ScriptedVmFactory::default()
        .with_script(TOKEN, TxScript::success(51_000).with_log(transfer));

    let mut chain = MemoryChain::new(ChainConfig::new(1, ChainHardforks::all_active()));
    let parent: Sealed<Header> = chain.insert(Header::default());
    let txs = (0..tx_count)
        .map(|nonce| {
            TestTransaction::call(SENDER, nonce, if nonce % 2 == 0 { TOKEN } else { WALLET })
        })
        .collect();
    let block = Block::new(
        Header {
            parent_hash: parent.seal(),
            number: 1,
            gas_limit: tx_count * TestTransaction::DEFAULT_GAS_LIMIT,
            ..Default::default()
        },
        txs,
    );
    (StateProcessor::new(chain, TestEngine::default(), vm), block)
}

fn bench_process_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_block");
    for tx_count in [16, 256, 2048] {
        let (processor, block) = setup(tx_count);

        group.bench_with_input(BenchmarkId::new("monolithic", tx_count), &block, |b, block| {
            b.iter(|| {
                let mut state = MemoryState::default();
                black_box(processor.process(black_box(block), &mut state, ()).unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("stepwise", tx_count), &block, |b, block| {
            b.iter(|| {
                let mut state = MemoryState::default();
                let mut run = processor.prepare(black_box(block), &mut state, ()).unwrap();
                for index in 0..block.transactions.len() {
                    black_box(processor.process_tx(&mut run, &mut state, index).unwrap());
                }
                black_box(processor.commit(run, &mut state).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_process_block);
criterion_main!(benches);
