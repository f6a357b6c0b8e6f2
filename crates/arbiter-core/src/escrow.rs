// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The staking escrow holding the workers' stake.

use crate::{Address, StakeAmount};

/// Error returned by the staking escrow.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// The escrow rejected the operation.
    #[error("the escrow rejected the operation: {0}")]
    Reverted(String),
    /// The escrow could not be reached.
    #[error("the escrow is unavailable: {0}")]
    Unavailable(String),
}

/// The interface of the external staking escrow consumed by the adjudicator.
///
/// Both operations are all-or-nothing: an error means that no stake was changed.
#[cfg_attr(test, mockall::automock)]
pub trait StakingEscrow: std::fmt::Debug + Send + Sync {
    /// Returns the stake currently locked by `staker`.
    fn locked_stake(&self, staker: &Address) -> Result<StakeAmount, EscrowError>;

    /// Deducts `penalty` from the stake of `staker`.
    fn slash(&self, staker: &Address, penalty: StakeAmount) -> Result<(), EscrowError>;
}
