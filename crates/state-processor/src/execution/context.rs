use alloy_consensus::Header;
use alloy_primitives::{Address, BlockNumber, B256, U256};

use crate::{ChainConfig, Message};

/// Protocol rules active for one block, resolved once from the chain configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForkRules {
    /// EIP-155 replay protection and EIP-158 empty-account deletion.
    pub is_eip158: bool,
    /// Byzantium.
    pub is_byzantium: bool,
    /// Berlin.
    pub is_berlin: bool,
    /// London.
    pub is_london: bool,
    /// Shanghai.
    pub is_shanghai: bool,
    /// Cancun.
    pub is_cancun: bool,
    /// Prague.
    pub is_prague: bool,
}

impl ForkRules {
    /// Resolves the rules active at the given block number and timestamp.
    pub fn new(config: &ChainConfig, number: BlockNumber, timestamp: u64) -> Self {
        Self {
            is_eip158: config.is_eip158(number),
            is_byzantium: config.is_byzantium(number),
            is_berlin: config.is_berlin(number),
            is_london: config.is_london(number),
            is_shanghai: config.is_shanghai(number, timestamp),
            is_cancun: config.is_cancun(number, timestamp),
            is_prague: config.is_prague(number, timestamp),
        }
    }
}

/// Block-scoped execution context, built once per block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContext {
    /// Recipient of the block's fees, the header beneficiary unless overridden.
    pub coinbase: Address,
    /// Block number.
    pub number: BlockNumber,
    /// Block timestamp.
    pub timestamp: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Block base fee, `None` before London.
    pub base_fee: Option<u64>,
    /// Block difficulty.
    pub difficulty: U256,
    /// `PREVRANDAO` value, only set once the difficulty is zero (post-merge).
    pub prev_randao: Option<B256>,
    /// Excess blob gas, `None` before Cancun.
    pub excess_blob_gas: Option<u64>,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Protocol rules active for the block.
    pub rules: ForkRules,
}

impl BlockContext {
    /// Builds the context of `header`. `author` overrides the header beneficiary as fee
    /// recipient, which block producers use while sealing.
    pub fn new(header: &Header, config: &ChainConfig, author: Option<Address>) -> Self {
        Self {
            coinbase: author.unwrap_or(header.beneficiary),
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: header.gas_limit,
            base_fee: header.base_fee_per_gas,
            difficulty: header.difficulty,
            prev_randao: header.difficulty.is_zero().then_some(header.mix_hash),
            excess_blob_gas: header.excess_blob_gas,
            parent_hash: header.parent_hash,
            rules: ForkRules::new(config, header.number, header.timestamp),
        }
    }
}

/// Transaction-scoped execution context, built once per transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxContext {
    /// The transaction sender (`ORIGIN`).
    pub origin: Address,
    /// The effective gas price (`GASPRICE`).
    pub gas_price: u128,
    /// The versioned blob hashes (`BLOBHASH`).
    pub blob_hashes: Vec<B256>,
    /// The max fee per blob gas.
    pub blob_fee_cap: Option<u128>,
}

impl TxContext {
    /// Builds the context of `message`.
    pub fn from_message(message: &Message) -> Self {
        Self {
            origin: message.from,
            gas_price: message.gas_price,
            blob_hashes: message.blob_hashes.clone(),
            blob_fee_cap: message.blob_gas_fee_cap,
        }
    }
}
