//! Protocol-version gates and the one-time state mutations tied to them.

use alloy_hardforks::{EthereumHardfork, ForkCondition};
use alloy_primitives::{map::HashMap, Address, BlockNumber, BlockTimestamp, Bytes, ChainId, U256};
use tracing::debug;

use crate::{constants::LOG_TARGET, StateStore};

/// Activation conditions of the Ethereum hardforks known to a chain.
///
/// Hardforks missing from the map are never active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainHardforks {
    forks: HashMap<EthereumHardfork, ForkCondition>,
}

impl ChainHardforks {
    /// Creates an empty configuration where no hardfork is active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration where every hardfork up to and including Prague is active from
    /// genesis. The DAO fork is left out since it is a one-time state mutation rather than a
    /// rule change.
    pub fn all_active() -> Self {
        Self {
            forks: HashMap::from_iter([
                (EthereumHardfork::Frontier, ForkCondition::Block(0)),
                (EthereumHardfork::Homestead, ForkCondition::Block(0)),
                (EthereumHardfork::Tangerine, ForkCondition::Block(0)),
                (EthereumHardfork::SpuriousDragon, ForkCondition::Block(0)),
                (EthereumHardfork::Byzantium, ForkCondition::Block(0)),
                (EthereumHardfork::Constantinople, ForkCondition::Block(0)),
                (EthereumHardfork::Petersburg, ForkCondition::Block(0)),
                (EthereumHardfork::Istanbul, ForkCondition::Block(0)),
                (EthereumHardfork::Berlin, ForkCondition::Block(0)),
                (EthereumHardfork::London, ForkCondition::Block(0)),
                (
                    EthereumHardfork::Paris,
                    ForkCondition::TTD {
                        activation_block_number: 0,
                        fork_block: None,
                        total_difficulty: U256::ZERO,
                    },
                ),
                (EthereumHardfork::Shanghai, ForkCondition::Timestamp(0)),
                (EthereumHardfork::Cancun, ForkCondition::Timestamp(0)),
                (EthereumHardfork::Prague, ForkCondition::Timestamp(0)),
            ]),
        }
    }

    /// Sets the activation condition of `fork`, overwriting any previous one.
    pub fn with_fork(mut self, fork: EthereumHardfork, condition: ForkCondition) -> Self {
        self.insert(fork, condition);
        self
    }

    /// Sets the activation condition of `fork`, overwriting any previous one.
    pub fn insert(&mut self, fork: EthereumHardfork, condition: ForkCondition) {
        self.forks.insert(fork, condition);
    }

    /// Removes `fork`, making it never active.
    pub fn without_fork(mut self, fork: EthereumHardfork) -> Self {
        self.forks.remove(&fork);
        self
    }

    /// Retrieves the [`ForkCondition`] of `fork`, [`ForkCondition::Never`] if absent.
    pub fn fork(&self, fork: EthereumHardfork) -> ForkCondition {
        self.forks.get(&fork).copied().unwrap_or(ForkCondition::Never)
    }

    /// Returns `true` if `fork` is active at the given block number and timestamp, whichever
    /// one its activation is keyed by.
    pub fn is_active_at(
        &self,
        fork: EthereumHardfork,
        number: BlockNumber,
        timestamp: BlockTimestamp,
    ) -> bool {
        let condition = self.fork(fork);
        condition.active_at_block(number) || condition.active_at_timestamp(timestamp)
    }
}

/// Parameters of the DAO hardfork balance migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaoForkConfig {
    /// Accounts whose whole balance is drained at the fork block.
    pub drain_list: Vec<Address>,
    /// Account receiving the drained balances.
    pub refund_contract: Address,
}

/// Code replacements for built-in system contracts, installed at the block where `activation`
/// transitions from inactive to active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemContractUpgrade {
    /// Human readable name of the upgrade, used for logging.
    pub name: String,
    /// The activation condition of the upgrade.
    pub activation: ForkCondition,
    /// The contracts to upgrade, with their new code.
    pub contracts: Vec<(Address, Bytes)>,
}

impl SystemContractUpgrade {
    /// Returns `true` if this block is the first one where the upgrade is active.
    ///
    /// Block-keyed upgrades transition at their activation block. Timestamp-keyed upgrades
    /// transition at the first block whose timestamp is past the activation while its parent's
    /// is not.
    pub fn transitions_at(
        &self,
        number: BlockNumber,
        parent_timestamp: BlockTimestamp,
        timestamp: BlockTimestamp,
    ) -> bool {
        match self.activation {
            ForkCondition::Block(block) => block == number,
            ForkCondition::Timestamp(_) => {
                self.activation.active_at_timestamp(timestamp) &&
                    !self.activation.active_at_timestamp(parent_timestamp)
            }
            _ => false,
        }
    }
}

/// Chain configuration consumed by the state processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// The chain id accepted by the transaction signer.
    pub chain_id: ChainId,
    /// Activation conditions of the Ethereum hardforks.
    pub hardforks: ChainHardforks,
    /// Whether this chain follows the DAO hardfork balance migration.
    pub dao_fork_support: bool,
    /// Parameters of the DAO balance migration.
    pub dao: DaoForkConfig,
    /// Built-in system-contract upgrades.
    pub system_contract_upgrades: Vec<SystemContractUpgrade>,
}

impl ChainConfig {
    /// Creates a configuration without DAO fork support or system-contract upgrades.
    pub fn new(chain_id: ChainId, hardforks: ChainHardforks) -> Self {
        Self {
            chain_id,
            hardforks,
            dao_fork_support: false,
            dao: DaoForkConfig::default(),
            system_contract_upgrades: Vec::new(),
        }
    }

    /// Enables the DAO hardfork balance migration at block `number`.
    pub fn with_dao_fork(mut self, number: BlockNumber, dao: DaoForkConfig) -> Self {
        self.hardforks.insert(EthereumHardfork::Dao, ForkCondition::Block(number));
        self.dao_fork_support = true;
        self.dao = dao;
        self
    }

    /// Registers a built-in system-contract upgrade.
    pub fn with_system_contract_upgrade(mut self, upgrade: SystemContractUpgrade) -> Self {
        self.system_contract_upgrades.push(upgrade);
        self
    }

    /// The block at which the DAO hardfork migrates balances, if scheduled.
    pub fn dao_fork_block(&self) -> Option<BlockNumber> {
        match self.hardforks.fork(EthereumHardfork::Dao) {
            ForkCondition::Block(number) => Some(number),
            _ => None,
        }
    }

    /// Returns `true` if the DAO balance migration runs at block `number`.
    pub fn is_dao_fork_block(&self, number: BlockNumber) -> bool {
        self.dao_fork_support && self.dao_fork_block() == Some(number)
    }

    /// Returns `true` if EIP-155 replay protection is active.
    pub fn is_eip155(&self, number: BlockNumber) -> bool {
        self.hardforks.fork(EthereumHardfork::SpuriousDragon).active_at_block(number)
    }

    /// Returns `true` if EIP-158 empty-account deletion is active.
    pub fn is_eip158(&self, number: BlockNumber) -> bool {
        self.hardforks.fork(EthereumHardfork::SpuriousDragon).active_at_block(number)
    }

    /// Returns `true` if Byzantium is active.
    pub fn is_byzantium(&self, number: BlockNumber) -> bool {
        self.hardforks.fork(EthereumHardfork::Byzantium).active_at_block(number)
    }

    /// Returns `true` if Berlin is active.
    pub fn is_berlin(&self, number: BlockNumber) -> bool {
        self.hardforks.fork(EthereumHardfork::Berlin).active_at_block(number)
    }

    /// Returns `true` if London is active.
    pub fn is_london(&self, number: BlockNumber) -> bool {
        self.hardforks.fork(EthereumHardfork::London).active_at_block(number)
    }

    /// Returns `true` if Shanghai is active.
    pub fn is_shanghai(&self, number: BlockNumber, timestamp: BlockTimestamp) -> bool {
        self.hardforks.is_active_at(EthereumHardfork::Shanghai, number, timestamp)
    }

    /// Returns `true` if Cancun is active.
    pub fn is_cancun(&self, number: BlockNumber, timestamp: BlockTimestamp) -> bool {
        self.hardforks.is_active_at(EthereumHardfork::Cancun, number, timestamp)
    }

    /// Returns `true` if Prague is active.
    pub fn is_prague(&self, number: BlockNumber, timestamp: BlockTimestamp) -> bool {
        self.hardforks.is_active_at(EthereumHardfork::Prague, number, timestamp)
    }
}

/// Moves the balance of every account in the DAO drain list to the refund contract.
pub fn apply_dao_hard_fork<S: StateStore + ?Sized>(state: &mut S, dao: &DaoForkConfig) {
    for address in &dao.drain_list {
        let balance = state.balance(*address);
        state.add_balance(dao.refund_contract, balance);
        state.set_balance(*address, U256::ZERO);
    }
}

/// Installs the code of every system-contract upgrade transitioning at this block.
pub fn upgrade_system_contracts<S: StateStore + ?Sized>(
    config: &ChainConfig,
    number: BlockNumber,
    parent_timestamp: BlockTimestamp,
    timestamp: BlockTimestamp,
    state: &mut S,
) {
    for upgrade in &config.system_contract_upgrades {
        if !upgrade.transitions_at(number, parent_timestamp, timestamp) {
            continue;
        }
        debug!(target: LOG_TARGET, name = %upgrade.name, number, "Upgrading system contracts");
        for (address, code) in &upgrade.contracts {
            state.set_code(*address, code.clone());
        }
    }
}
