use alloy_primitives::{keccak256, Address, Bytes, ChainId, TxHash, B256, U256};

use crate::{constants::tx_type, RecoveryError, SignedTransaction};

/// A transaction builder for testing purposes.
///
/// The sender is known upfront instead of being recovered from a signature. The hash is derived
/// from every field, so two transactions differing in any field have different hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTransaction {
    ty: u8,
    sender: Address,
    nonce: u64,
    gas_limit: u64,
    to: Option<Address>,
    value: U256,
    input: Bytes,
    chain_id: Option<ChainId>,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: Option<u128>,
    blob_versioned_hashes: Vec<B256>,
    max_fee_per_blob_gas: Option<u128>,
    valid_signature: bool,
}

impl TestTransaction {
    /// Default gas limit of built transactions.
    pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

    /// A legacy call from `sender` to `to`.
    pub fn call(sender: Address, nonce: u64, to: Address) -> Self {
        Self {
            ty: tx_type::LEGACY,
            sender,
            nonce,
            gas_limit: Self::DEFAULT_GAS_LIMIT,
            to: Some(to),
            value: U256::ZERO,
            input: Bytes::new(),
            chain_id: None,
            max_fee_per_gas: 1,
            max_priority_fee_per_gas: None,
            blob_versioned_hashes: Vec::new(),
            max_fee_per_blob_gas: None,
            valid_signature: true,
        }
    }

    /// A legacy contract creation from `sender`.
    pub fn create(sender: Address, nonce: u64) -> Self {
        Self { to: None, ..Self::call(sender, nonce, Address::ZERO) }
    }

    /// Sets the gas limit.
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the gas price.
    pub const fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.max_fee_per_gas = gas_price;
        self
    }

    /// Turns the transaction into an EIP-1559 transaction.
    pub const fn with_dynamic_fee(mut self, max_fee_per_gas: u128, tip: u128) -> Self {
        self.ty = tx_type::EIP1559;
        self.max_fee_per_gas = max_fee_per_gas;
        self.max_priority_fee_per_gas = Some(tip);
        self
    }

    /// Turns the transaction into an EIP-4844 transaction carrying `hashes`.
    pub fn with_blobs(mut self, hashes: Vec<B256>, max_fee_per_blob_gas: u128) -> Self {
        self.ty = tx_type::EIP4844;
        self.max_priority_fee_per_gas = Some(self.max_priority_fee_per_gas.unwrap_or_default());
        self.blob_versioned_hashes = hashes;
        self.max_fee_per_blob_gas = Some(max_fee_per_blob_gas);
        self
    }

    /// Overrides the envelope type.
    pub const fn with_type(mut self, ty: u8) -> Self {
        self.ty = ty;
        self
    }

    /// Sets the EIP-155 chain id.
    pub const fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Sets the transferred value.
    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the call data.
    pub fn with_input(mut self, input: impl Into<Bytes>) -> Self {
        self.input = input.into();
        self
    }

    /// Makes sender recovery fail.
    pub const fn with_invalid_signature(mut self) -> Self {
        self.valid_signature = false;
        self
    }

    /// The sender of the transaction.
    pub const fn sender(&self) -> Address {
        self.sender
    }
}

impl SignedTransaction for TestTransaction {
    fn ty(&self) -> u8 {
        self.ty
    }

    fn tx_hash(&self) -> TxHash {
        let mut buf = Vec::with_capacity(256);
        buf.push(self.ty);
        buf.extend_from_slice(self.sender.as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(self.to.as_ref().map_or(&[][..], |to| to.as_slice()));
        buf.extend_from_slice(&self.value.to_be_bytes::<32>());
        buf.extend_from_slice(&self.input);
        buf.extend_from_slice(&self.chain_id.unwrap_or_default().to_be_bytes());
        buf.extend_from_slice(&self.max_fee_per_gas.to_be_bytes());
        buf.extend_from_slice(&self.max_priority_fee_per_gas.unwrap_or_default().to_be_bytes());
        for hash in &self.blob_versioned_hashes {
            buf.extend_from_slice(hash.as_slice());
        }
        buf.push(self.valid_signature as u8);
        keccak256(buf)
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn to(&self) -> Option<Address> {
        self.to
    }

    fn value(&self) -> U256 {
        self.value
    }

    fn input(&self) -> &Bytes {
        &self.input
    }

    fn chain_id(&self) -> Option<ChainId> {
        self.chain_id
    }

    fn max_fee_per_gas(&self) -> u128 {
        self.max_fee_per_gas
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        self.max_priority_fee_per_gas
    }

    fn blob_versioned_hashes(&self) -> Option<&[B256]> {
        (self.ty == tx_type::EIP4844).then_some(self.blob_versioned_hashes.as_slice())
    }

    fn max_fee_per_blob_gas(&self) -> Option<u128> {
        self.max_fee_per_blob_gas
    }

    fn recover_signer(&self) -> Result<Address, RecoveryError> {
        if self.valid_signature {
            Ok(self.sender)
        } else {
            Err(RecoveryError("invalid signature".to_string()))
        }
    }
}
