use alloy_consensus::Header;
use alloy_primitives::{map::HashMap, BlockHash, Sealed};

use crate::{ChainConfig, ChainReader};

/// An in-memory [`ChainReader`] for testing purposes.
#[derive(Debug, Clone)]
pub struct MemoryChain {
    config: ChainConfig,
    headers: HashMap<BlockHash, Header>,
}

impl MemoryChain {
    /// Creates a chain with no known header.
    pub fn new(config: ChainConfig) -> Self {
        Self { config, headers: HashMap::default() }
    }

    /// Adds a header to the chain.
    pub fn with_header(mut self, header: Header) -> Self {
        self.insert(header);
        self
    }

    /// Adds a header to the chain and returns it sealed.
    pub fn insert(&mut self, header: Header) -> Sealed<Header> {
        let hash = header.hash_slow();
        self.headers.insert(hash, header.clone());
        Sealed::new_unchecked(header, hash)
    }

    /// Mutable access to the chain configuration.
    pub fn config_mut(&mut self) -> &mut ChainConfig {
        &mut self.config
    }
}

impl ChainReader for MemoryChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn header_by_hash(&self, hash: BlockHash) -> Option<Header> {
        self.headers.get(&hash).cloned()
    }
}
