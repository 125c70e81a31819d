//! Constants used by the block state processor.

/// The `tracing` target used by every log line emitted from this crate.
pub const LOG_TARGET: &str = "state_processor";

/// Number of receipts one bloom worker is expected to absorb before another worker is spawned.
pub const RECEIPTS_PER_BLOOM_WORKER: usize = 64;

/// Upper bound on the number of bloom workers spawned for a single block.
pub const MAX_BLOOM_WORKERS: usize = 8;

/// Initial capacity reserved for system transactions. Proof-of-staked-authority chains usually
/// carry two of them per block: one for the validator set contract and one for the system
/// reward contract.
pub const SYSTEM_TX_CAPACITY: usize = 2;

/// EIP-2718 transaction type identifiers.
pub mod tx_type {
    /// Legacy (untyped) transaction.
    pub const LEGACY: u8 = 0x00;
    /// EIP-2930 access-list transaction.
    pub const EIP2930: u8 = 0x01;
    /// EIP-1559 dynamic-fee transaction.
    pub const EIP1559: u8 = 0x02;
    /// EIP-4844 blob transaction.
    pub const EIP4844: u8 = 0x03;
    /// EIP-7702 set-code transaction.
    pub const EIP7702: u8 = 0x04;
}
