// Copyright 2024 Msig Labs Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]
//! Multisig approval orchestration.
//!
//! The heart of the approver: given a multisig account, a pending call
//! hash and (for the final approval) the full encoded call, this crate
//! looks up the pending approval state on chain, picks between
//! `approve_as_multi` (non-final) and `as_multi` (final, executing),
//! submits the extrinsic and drives its lifecycle to a terminal state.
//!
//! Chain access goes through the [`chain::MultisigChain`] trait so that
//! the orchestration logic is testable without a node; the production
//! implementation backed by `subxt` lives in [`subxt_chain`].

/// The approval orchestrator and its side-effect hooks.
pub mod approve;
/// The chain access trait and transaction lifecycle types.
pub mod chain;
/// `subxt`-backed implementation of the chain access trait.
pub mod subxt_chain;

use parity_scale_codec::{Decode, Encode};
use subxt::utils::AccountId32;

use msig_approver_utils::{Error, Result};

/// The blake2-256 hash identifying a pending multisig call.
pub type CallHash = [u8; 32];

/// A point on chain where a multisig operation was first opened,
/// identifying the block and the extrinsic index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Timepoint {
    /// The block number of the first approval.
    pub height: u32,
    /// The extrinsic index within that block.
    pub index: u32,
}

impl std::fmt::Display for Timepoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.height, self.index)
    }
}

/// A pending multisig call as stored on chain, keyed by the multisig
/// account and the call hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// The hash of the call awaiting approvals.
    pub call_hash: CallHash,
    /// When the operation was opened.
    pub when: Timepoint,
    /// The signatories that have already approved.
    pub approvals: Vec<AccountId32>,
}

/// A multisig account: its derived address, the full signatory set and
/// the approval threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigAccount {
    address: AccountId32,
    signatories: Vec<AccountId32>,
    threshold: u16,
}

impl MultisigAccount {
    /// Creates a multisig account, validating that the threshold is at
    /// least 2 and not larger than the signatory set.
    pub fn new(
        address: AccountId32,
        signatories: Vec<AccountId32>,
        threshold: u16,
    ) -> Result<Self> {
        if threshold < 2 || threshold as usize > signatories.len() {
            return Err(Error::InvalidThreshold {
                threshold,
                signatories: signatories.len(),
            });
        }
        Ok(Self {
            address,
            signatories,
            threshold,
        })
    }

    /// The multisig's derived on-chain address.
    pub fn address(&self) -> &AccountId32 {
        &self.address
    }

    /// The full signatory set, in the order it was provided.
    pub fn signatories(&self) -> &[AccountId32] {
        &self.signatories
    }

    /// The number of approvals required to execute a call.
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// The signatory set excluding the given approver, sorted by public
    /// key bytes as the multisig pallet requires.
    pub fn other_signatories(
        &self,
        approving: &AccountId32,
    ) -> Vec<AccountId32> {
        let mut others: Vec<AccountId32> = self
            .signatories
            .iter()
            .filter(|s| *s != approving)
            .cloned()
            .collect();
        others.sort_by(|a, b| a.0.cmp(&b.0));
        others
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountId32 {
        AccountId32::from([byte; 32])
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let signatories = vec![account(1), account(2), account(3)];
        assert!(MultisigAccount::new(account(9), signatories.clone(), 1)
            .is_err());
        assert!(MultisigAccount::new(account(9), signatories.clone(), 4)
            .is_err());
        assert!(MultisigAccount::new(account(9), signatories, 3).is_ok());
    }

    #[test]
    fn other_signatories_excludes_the_approver_and_sorts() {
        // deliberately unsorted signatory set
        let signatories = vec![account(7), account(2), account(5)];
        let multisig =
            MultisigAccount::new(account(9), signatories, 2).unwrap();
        let others = multisig.other_signatories(&account(5));
        assert_eq!(others, vec![account(2), account(7)]);
    }
}
