use core::fmt;

/// Error returned by [`GasPool`] operations. A failed operation leaves the pool untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GasPoolError {
    /// The pool does not hold enough gas for the requested amount.
    #[error("gas limit reached: available={available} < requested={requested}")]
    GasLimitExceeded {
        /// Gas remaining in the pool.
        available: u64,
        /// Gas requested from the pool.
        requested: u64,
    },
    /// Returning gas to the pool would overflow its counter.
    #[error("gas pool overflow: available={available} + returned={returned}")]
    Overflow {
        /// Gas remaining in the pool.
        available: u64,
        /// Gas returned to the pool.
        returned: u64,
    },
}

/// The remaining gas budget of a block.
///
/// A pool is created once per block with the block gas limit and is owned by exactly one
/// in-flight processing run. Each ordinary transaction reserves its gas limit before execution
/// and returns whatever it did not use afterwards, so the pool enforces the block gas limit
/// incrementally instead of after the fact.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPool(u64);

impl GasPool {
    /// Creates a pool holding `gas`.
    pub const fn new(gas: u64) -> Self {
        Self(gas)
    }

    /// Makes `amount` additional gas available.
    pub fn add_gas(&mut self, amount: u64) -> Result<&mut Self, GasPoolError> {
        self.0 = self
            .0
            .checked_add(amount)
            .ok_or(GasPoolError::Overflow { available: self.0, returned: amount })?;
        Ok(self)
    }

    /// Deducts `amount` from the pool.
    pub fn sub_gas(&mut self, amount: u64) -> Result<&mut Self, GasPoolError> {
        self.0 = self
            .0
            .checked_sub(amount)
            .ok_or(GasPoolError::GasLimitExceeded { available: self.0, requested: amount })?;
        Ok(self)
    }

    /// Returns the gas left in the pool.
    pub const fn gas(&self) -> u64 {
        self.0
    }

    /// Overwrites the amount of gas in the pool.
    pub fn set_gas(&mut self, gas: u64) {
        self.0 = gas;
    }
}

impl fmt::Debug for GasPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GasPool").field(&self.0).finish()
    }
}

impl fmt::Display for GasPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
