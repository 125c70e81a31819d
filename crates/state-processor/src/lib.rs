//! Deterministic block state-transition engine.
//!
//! Given a block of ordered transactions and a mutable state store, the [`StateProcessor`]
//! applies every transaction through an external VM, enforces the block gas limit through a
//! [`GasPool`], assembles receipts, and hands the block to a pluggable consensus engine for
//! finalization.
//!
//! Block processing is exposed in two shapes that share one algorithm:
//!
//! - [`StateProcessor::process`] runs a whole block in one call.
//! - [`StateProcessor::prepare`], [`StateProcessor::process_tx`] and [`StateProcessor::commit`]
//!   drive the same algorithm one transaction at a time through an [`ExecutionRun`] session.
//!
//! Receipt bloom filters are computed off the critical path by the
//! [`AsyncReceiptBloomGenerator`].
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod bloom;
pub use bloom::*;

mod consensus;
pub use consensus::*;

mod execution;
pub use execution::*;

mod gas_pool;
pub use gas_pool::*;

mod hardfork;
pub use hardfork::*;

mod processor;
pub use processor::*;

mod state;
pub use state::*;

mod transaction;
pub use transaction::*;

mod types;
pub use types::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Only used by benches and integration tests.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use serde_json as _;
