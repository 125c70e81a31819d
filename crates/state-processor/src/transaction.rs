//! Transactions as seen by the state processor, and their conversion into execution-ready
//! [`Message`]s.

use alloy_consensus::{transaction::Recovered, TxEnvelope};
use alloy_eips::Typed2718;
use alloy_primitives::{Address, BlockNumber, Bytes, ChainId, TxHash, B256, U256};
use auto_impl::auto_impl;

use crate::{constants::tx_type, ChainConfig};

/// Error returned when a transaction signer cannot be recovered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to recover transaction signer: {0}")]
pub struct RecoveryError(pub String);

/// Error returned when a transaction cannot be turned into a [`Message`]. Any of these
/// invalidates the enclosing block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransactionError {
    /// The transaction envelope type is not enabled by the active protocol version.
    #[error("transaction type {ty:#04x} not supported")]
    TxTypeNotSupported {
        /// The EIP-2718 type of the transaction.
        ty: u8,
    },
    /// The transaction is replay protected for another chain.
    #[error("invalid chain id: expected={expected}, got={got}")]
    InvalidChainId {
        /// The chain id of the processing chain.
        expected: ChainId,
        /// The chain id of the transaction.
        got: ChainId,
    },
    /// The transaction is replay protected before EIP-155 is active.
    #[error("replay protected transaction before EIP-155")]
    ReplayProtectionNotActive,
    /// The transaction signer could not be recovered.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    /// The max fee per gas is lower than the block base fee.
    #[error("max fee per gas less than block base fee: max_fee_per_gas={max_fee_per_gas} < base_fee={base_fee}")]
    FeeCapTooLow {
        /// The max fee per gas of the transaction.
        max_fee_per_gas: u128,
        /// The base fee of the block.
        base_fee: u64,
    },
    /// The max priority fee per gas is higher than the max fee per gas.
    #[error("max priority fee per gas higher than max fee per gas: tip={tip} > max_fee_per_gas={max_fee_per_gas}")]
    TipAboveFeeCap {
        /// The max priority fee per gas of the transaction.
        tip: u128,
        /// The max fee per gas of the transaction.
        max_fee_per_gas: u128,
    },
}

/// A signed transaction included in a block.
///
/// Wire decoding happens outside of this crate; the processor only needs read access to the
/// fields that drive execution plus the ability to recover the sender.
#[auto_impl(&, Box, Arc)]
pub trait SignedTransaction: core::fmt::Debug {
    /// The EIP-2718 type of the transaction.
    fn ty(&self) -> u8;

    /// The transaction hash.
    fn tx_hash(&self) -> TxHash;

    /// The sender nonce.
    fn nonce(&self) -> u64;

    /// The gas limit of the transaction.
    fn gas_limit(&self) -> u64;

    /// The recipient, `None` for contract creation.
    fn to(&self) -> Option<Address>;

    /// The transferred value.
    fn value(&self) -> U256;

    /// The call data or init code.
    fn input(&self) -> &Bytes;

    /// The EIP-155 chain id, `None` for unprotected legacy transactions.
    fn chain_id(&self) -> Option<ChainId>;

    /// The max fee per gas. For legacy transactions this is the gas price.
    fn max_fee_per_gas(&self) -> u128;

    /// The max priority fee per gas, `None` for transactions without dynamic fees.
    fn max_priority_fee_per_gas(&self) -> Option<u128>;

    /// The versioned hashes of the blobs carried by an EIP-4844 transaction.
    fn blob_versioned_hashes(&self) -> Option<&[B256]> {
        None
    }

    /// The max fee per blob gas of an EIP-4844 transaction.
    fn max_fee_per_blob_gas(&self) -> Option<u128> {
        None
    }

    /// Recovers the transaction sender from its signature.
    fn recover_signer(&self) -> Result<Address, RecoveryError>;

    /// Returns `true` if the transaction creates a contract.
    fn is_create(&self) -> bool {
        self.to().is_none()
    }

    /// The price paid per unit of gas given the block `base_fee`.
    fn effective_gas_price(&self, base_fee: Option<u64>) -> u128 {
        let max_fee = self.max_fee_per_gas();
        match (self.max_priority_fee_per_gas(), base_fee) {
            (Some(tip), Some(base_fee)) => max_fee.min(tip.saturating_add(base_fee as u128)),
            _ => max_fee,
        }
    }
}

impl SignedTransaction for Recovered<TxEnvelope> {
    fn ty(&self) -> u8 {
        Typed2718::ty(self.inner())
    }

    fn tx_hash(&self) -> TxHash {
        *self.inner().tx_hash()
    }

    fn nonce(&self) -> u64 {
        alloy_consensus::Transaction::nonce(self.inner())
    }

    fn gas_limit(&self) -> u64 {
        alloy_consensus::Transaction::gas_limit(self.inner())
    }

    fn to(&self) -> Option<Address> {
        alloy_consensus::Transaction::to(self.inner())
    }

    fn value(&self) -> U256 {
        alloy_consensus::Transaction::value(self.inner())
    }

    fn input(&self) -> &Bytes {
        alloy_consensus::Transaction::input(self.inner())
    }

    fn chain_id(&self) -> Option<ChainId> {
        alloy_consensus::Transaction::chain_id(self.inner())
    }

    fn max_fee_per_gas(&self) -> u128 {
        alloy_consensus::Transaction::max_fee_per_gas(self.inner())
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        alloy_consensus::Transaction::max_priority_fee_per_gas(self.inner())
    }

    fn blob_versioned_hashes(&self) -> Option<&[B256]> {
        alloy_consensus::Transaction::blob_versioned_hashes(self.inner())
    }

    fn max_fee_per_blob_gas(&self) -> Option<u128> {
        alloy_consensus::Transaction::max_fee_per_blob_gas(self.inner())
    }

    fn recover_signer(&self) -> Result<Address, RecoveryError> {
        // The envelope was recovered when it entered the node.
        Ok(self.signer())
    }
}

/// Validates and recovers transaction senders according to the protocol version active at one
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    chain_id: ChainId,
    eip155: bool,
    berlin: bool,
    london: bool,
    cancun: bool,
    prague: bool,
}

impl Signer {
    /// Creates the signer for the block at `number` and `timestamp`.
    pub fn new(config: &ChainConfig, number: BlockNumber, timestamp: u64) -> Self {
        Self {
            chain_id: config.chain_id,
            eip155: config.is_eip155(number),
            berlin: config.is_berlin(number),
            london: config.is_london(number),
            cancun: config.is_cancun(number, timestamp),
            prague: config.is_prague(number, timestamp),
        }
    }

    /// The chain id the signer accepts.
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Returns `true` if transactions of type `ty` are accepted.
    pub const fn supports_tx_type(&self, ty: u8) -> bool {
        match ty {
            tx_type::LEGACY => true,
            tx_type::EIP2930 => self.berlin,
            tx_type::EIP1559 => self.london,
            tx_type::EIP4844 => self.cancun,
            tx_type::EIP7702 => self.prague,
            _ => false,
        }
    }

    /// Validates the envelope of `tx` and recovers its sender.
    pub fn sender<T: SignedTransaction + ?Sized>(
        &self,
        tx: &T,
    ) -> Result<Address, InvalidTransactionError> {
        let ty = tx.ty();
        if !self.supports_tx_type(ty) {
            return Err(InvalidTransactionError::TxTypeNotSupported { ty });
        }
        if let Some(got) = tx.chain_id() {
            if !self.eip155 {
                return Err(InvalidTransactionError::ReplayProtectionNotActive);
            }
            if got != self.chain_id {
                return Err(InvalidTransactionError::InvalidChainId {
                    expected: self.chain_id,
                    got,
                });
            }
        }
        Ok(tx.recover_signer()?)
    }
}

/// A transaction decoded into execution-ready form: sender resolved and gas price settled
/// against the block base fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The EIP-2718 type of the originating transaction.
    pub tx_type: u8,
    /// The recovered sender.
    pub from: Address,
    /// The recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// The sender nonce.
    pub nonce: u64,
    /// The transferred value.
    pub value: U256,
    /// The gas limit.
    pub gas_limit: u64,
    /// The effective gas price.
    pub gas_price: u128,
    /// The max fee per gas.
    pub gas_fee_cap: u128,
    /// The max priority fee per gas.
    pub gas_tip_cap: u128,
    /// The call data or init code.
    pub input: Bytes,
    /// The versioned blob hashes.
    pub blob_hashes: Vec<B256>,
    /// The max fee per blob gas.
    pub blob_gas_fee_cap: Option<u128>,
}

impl Message {
    /// Converts `tx` into a message, recovering the sender with `signer` and resolving the
    /// effective gas price against `base_fee`.
    pub fn from_transaction<T: SignedTransaction + ?Sized>(
        tx: &T,
        signer: &Signer,
        base_fee: Option<u64>,
    ) -> Result<Self, InvalidTransactionError> {
        let gas_fee_cap = tx.max_fee_per_gas();
        let gas_tip_cap = tx.max_priority_fee_per_gas().unwrap_or(gas_fee_cap);
        if gas_tip_cap > gas_fee_cap {
            return Err(InvalidTransactionError::TipAboveFeeCap {
                tip: gas_tip_cap,
                max_fee_per_gas: gas_fee_cap,
            });
        }
        if let Some(base_fee) = base_fee {
            if gas_fee_cap < base_fee as u128 {
                return Err(InvalidTransactionError::FeeCapTooLow {
                    max_fee_per_gas: gas_fee_cap,
                    base_fee,
                });
            }
        }

        Ok(Self {
            tx_type: tx.ty(),
            from: signer.sender(tx)?,
            to: tx.to(),
            nonce: tx.nonce(),
            value: tx.value(),
            gas_limit: tx.gas_limit(),
            gas_price: tx.effective_gas_price(base_fee),
            gas_fee_cap,
            gas_tip_cap,
            input: tx.input().clone(),
            blob_hashes: tx.blob_versioned_hashes().map(<[B256]>::to_vec).unwrap_or_default(),
            blob_gas_fee_cap: tx.max_fee_per_blob_gas(),
        })
    }

    /// Returns `true` if the message creates a contract.
    pub const fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

#[cfg(test)]
mod tests {
    use alloy_hardforks::{EthereumHardfork, ForkCondition};
    use alloy_primitives::address;

    use super::*;
    use crate::{test_utils::TestTransaction, ChainHardforks};

    const SENDER: Address = address!("0x2000000000000000000000000000000000000002");

    fn config() -> ChainConfig {
        ChainConfig::new(1, ChainHardforks::all_active())
    }

    #[test]
    fn test_effective_gas_price() {
        let legacy = TestTransaction::call(SENDER, 0, Address::ZERO).with_gas_price(50);
        assert_eq!(legacy.effective_gas_price(Some(10)), 50);

        let dynamic = TestTransaction::call(SENDER, 0, Address::ZERO).with_dynamic_fee(100, 7);
        assert_eq!(dynamic.effective_gas_price(Some(10)), 17);
        assert_eq!(dynamic.effective_gas_price(Some(95)), 100);
        assert_eq!(dynamic.effective_gas_price(None), 100);
    }

    #[test]
    fn test_message_resolves_sender_and_price() {
        let signer = Signer::new(&config(), 1, 1);
        let tx = TestTransaction::create(SENDER, 3).with_dynamic_fee(100, 7).with_chain_id(1);
        let msg = Message::from_transaction(&tx, &signer, Some(10)).unwrap();
        assert_eq!(msg.from, SENDER);
        assert_eq!(msg.gas_price, 17);
        assert_eq!(msg.nonce, 3);
        assert!(msg.is_create());
    }

    #[test]
    fn test_fee_cap_below_base_fee_rejected() {
        let signer = Signer::new(&config(), 1, 1);
        let tx = TestTransaction::call(SENDER, 0, Address::ZERO).with_gas_price(5);
        assert_eq!(
            Message::from_transaction(&tx, &signer, Some(6)),
            Err(InvalidTransactionError::FeeCapTooLow { max_fee_per_gas: 5, base_fee: 6 })
        );
    }

    #[test]
    fn test_signer_gates_typed_transactions() {
        let hardforks = ChainHardforks::all_active()
            .with_fork(EthereumHardfork::London, ForkCondition::Block(10))
            .with_fork(EthereumHardfork::Cancun, ForkCondition::Timestamp(1_000));
        let config = ChainConfig::new(1, hardforks);
        let tx = TestTransaction::call(SENDER, 0, Address::ZERO).with_dynamic_fee(10, 1);

        let before = Signer::new(&config, 9, 0);
        assert_eq!(
            before.sender(&tx),
            Err(InvalidTransactionError::TxTypeNotSupported { ty: tx_type::EIP1559 })
        );
        assert_eq!(Signer::new(&config, 10, 0).sender(&tx), Ok(SENDER));
        assert!(!Signer::new(&config, 10, 999).supports_tx_type(tx_type::EIP4844));
        assert!(Signer::new(&config, 10, 1_000).supports_tx_type(tx_type::EIP4844));
    }

    #[test]
    fn test_signer_rejects_foreign_chain_id() {
        let signer = Signer::new(&config(), 1, 1);
        let tx = TestTransaction::call(SENDER, 0, Address::ZERO).with_chain_id(56);
        assert_eq!(
            signer.sender(&tx),
            Err(InvalidTransactionError::InvalidChainId { expected: 1, got: 56 })
        );
    }

    #[test]
    fn test_unrecoverable_signature() {
        let signer = Signer::new(&config(), 1, 1);
        let tx = TestTransaction::call(SENDER, 0, Address::ZERO).with_invalid_signature();
        assert!(matches!(signer.sender(&tx), Err(InvalidTransactionError::Recovery(_))));
    }
}
