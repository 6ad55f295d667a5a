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

use futures::stream::BoxStream;
use parity_scale_codec::{Decode, Encode};
use subxt::utils::{AccountId32, H256};

use msig_approver_utils::{DispatchModuleError, Result};

use crate::{CallHash, PendingCall, Timepoint};

/// A two-dimensional extrinsic weight limit, encoded compact on the wire
/// like the runtime's `Weight` type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct CallWeight {
    /// Computation time budget, in picoseconds of reference hardware.
    #[codec(compact)]
    pub ref_time: u64,
    /// Proof size budget, in bytes.
    #[codec(compact)]
    pub proof_size: u64,
}

impl CallWeight {
    /// The zero weight, used as a placeholder on the non-executing path
    /// where the runtime will not dispatch the inner call.
    pub const fn zero() -> Self {
        Self {
            ref_time: 0,
            proof_size: 0,
        }
    }
}

/// The result of an executed dispatch, once the transaction is in a
/// finalized block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The call dispatched successfully.
    Success,
    /// The call dispatched but failed inside a pallet.
    Failed(DispatchModuleError),
}

/// A finalized transaction together with its dispatch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTx {
    /// The extrinsic hash.
    pub tx_hash: H256,
    /// The hash of the finalized block containing the extrinsic.
    pub block_hash: H256,
    /// Whether the dispatch succeeded.
    pub outcome: DispatchOutcome,
}

/// One step in the life of a submitted extrinsic, from pool validation
/// to a terminal state.
///
/// `Finalized` and `Invalid` are terminal; producers close the stream
/// after emitting one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxLifecycle {
    /// Validated and waiting in the transaction pool.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a (not yet finalized) block.
    InBlock {
        /// The hash of the including block.
        block_hash: H256,
        /// The extrinsic hash.
        tx_hash: H256,
    },
    /// Included in a finalized block; carries the dispatch outcome.
    Finalized(FinalizedTx),
    /// Rejected by the node as invalid or dropped from the pool.
    Invalid {
        /// What the node reported.
        reason: String,
    },
}

/// A stream of lifecycle events for one submitted extrinsic. The stream
/// ends after a terminal event; an end without one means the status
/// subscription was lost.
pub type TxLifecycleStream = BoxStream<'static, Result<TxLifecycle>>;

/// Chain access needed by the approval orchestrator.
///
/// The production implementation talks to a live node over `subxt`; tests
/// substitute a mock to script pending state and lifecycle events.
#[async_trait::async_trait]
pub trait MultisigChain: Send + Sync {
    /// Estimates the dispatch weight of the given encoded call via the
    /// transaction payment runtime API.
    async fn estimate_call_weight(
        &self,
        call_data: &[u8],
    ) -> Result<CallWeight>;

    /// Fetches the pending multisig operation for the given account and
    /// call hash, if one is open.
    async fn pending_call(
        &self,
        multisig: &AccountId32,
        call_hash: &CallHash,
    ) -> Result<Option<PendingCall>>;

    /// Signs and submits `Multisig.approve_as_multi` (a non-final
    /// approval, identified by call hash only) and returns the lifecycle
    /// stream of the submitted extrinsic.
    async fn submit_approve_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId32],
        maybe_timepoint: Option<Timepoint>,
        call_hash: CallHash,
        max_weight: CallWeight,
    ) -> Result<TxLifecycleStream>;

    /// Signs and submits `Multisig.as_multi` (the final approval,
    /// carrying the full encoded call so the runtime can execute it) and
    /// returns the lifecycle stream of the submitted extrinsic.
    async fn submit_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId32],
        maybe_timepoint: Option<Timepoint>,
        call_data: &[u8],
        max_weight: CallWeight,
    ) -> Result<TxLifecycleStream>;
}
