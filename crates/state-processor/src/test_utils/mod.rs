//! Test utilities for the state processor: in-memory collaborators and a transaction builder.

mod chain;
mod engine;
mod state;
mod transaction;
mod vm;

pub use chain::*;
pub use engine::*;
pub use state::*;
pub use transaction::*;
pub use vm::*;
