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

use futures::StreamExt;
use subxt::utils::{AccountId32, H256};

use msig_approver_utils::{probe, Error, Result};

use crate::chain::{
    CallWeight, DispatchOutcome, MultisigChain, TxLifecycle,
};
use crate::{CallHash, MultisigAccount};

/// One approval to perform: who approves, which pending call, and the
/// optional extras (full call bytes for the final approval, a note to
/// attach once executed).
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// The signatory submitting this approval.
    pub approving: AccountId32,
    /// The hash of the pending call.
    pub call_hash: CallHash,
    /// The full SCALE-encoded call. Required on the final (executing)
    /// approval, optional before that.
    pub call_data: Option<Vec<u8>>,
    /// A free-text note to persist against the transaction once executed.
    pub note: Option<String>,
}

/// Why an approval resolved without submitting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// No pending operation exists on chain for this multisig and hash.
    NoPendingCall,
    /// The provided call bytes do not hash to the requested call hash.
    CallHashMismatch,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPendingCall => {
                write!(f, "no pending call found on chain")
            }
            Self::CallHashMismatch => {
                write!(f, "call data does not match the call hash")
            }
        }
    }
}

/// How an approval resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// A non-final approval was recorded on chain.
    Approved {
        /// The hash of the finalized approval extrinsic.
        tx_hash: H256,
    },
    /// This was the final approval; the inner call executed.
    Executed {
        /// The hash of the finalized executing extrinsic.
        tx_hash: H256,
    },
    /// Nothing was submitted.
    NoOp(NoOpReason),
}

/// Off-chain follow-ups after an executed approval. Implementations talk
/// to the backend, the indexing service and the notification endpoint;
/// failures here are logged but never fail the approval itself.
#[async_trait::async_trait]
pub trait SideEffects: Send + Sync {
    /// Re-resolves the multisig's pure proxy from the indexing service
    /// after a proxy-related call executed.
    async fn refresh_proxy(
        &self,
        multisig: &AccountId32,
    ) -> Result<Option<AccountId32>>;

    /// Persists a note against the executed transaction.
    async fn update_note(
        &self,
        call_hash: &CallHash,
        multisig: &AccountId32,
        note: &str,
    ) -> Result<()>;

    /// Notifies the given signatories that the transaction executed.
    async fn notify_signatories(
        &self,
        signatories: &[AccountId32],
        message: &str,
        link: &str,
    ) -> Result<()>;
}

/// Approves a pending transfer (or any non-proxy call) from the multisig.
///
/// Submits `approve_as_multi` while earlier approvals are still missing
/// and `as_multi` when this is the final one, then drives the extrinsic
/// to a terminal state. Transfers always carry their full call bytes, so
/// a request without them is rejected up front.
pub async fn approve_transfer<C, E>(
    chain: &C,
    effects: &E,
    multisig: &MultisigAccount,
    request: &ApprovalRequest,
) -> Result<ApprovalOutcome>
where
    C: MultisigChain,
    E: SideEffects,
{
    if request.call_data.is_none() {
        return Err(Error::MissingCallData);
    }
    submit_approval(chain, effects, multisig, request, false).await
}

/// Approves a pending proxy-related call (e.g. creating the multisig's
/// pure proxy, or swapping signatories through it). Identical to
/// [`approve_transfer`] except that an executed call additionally
/// re-resolves the multisig's proxy address.
pub async fn approve_proxy<C, E>(
    chain: &C,
    effects: &E,
    multisig: &MultisigAccount,
    request: &ApprovalRequest,
) -> Result<ApprovalOutcome>
where
    C: MultisigChain,
    E: SideEffects,
{
    submit_approval(chain, effects, multisig, request, true).await
}

async fn submit_approval<C, E>(
    chain: &C,
    effects: &E,
    multisig: &MultisigAccount,
    request: &ApprovalRequest,
    reconcile_proxy: bool,
) -> Result<ApprovalOutcome>
where
    C: MultisigChain,
    E: SideEffects,
{
    if let Some(call_data) = request.call_data.as_deref() {
        let computed = sp_core::hashing::blake2_256(call_data);
        if computed != request.call_hash {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::WARN,
                kind = %probe::Kind::Approval,
                noop = %NoOpReason::CallHashMismatch,
                call_hash = %hex::encode(request.call_hash),
            );
            return Ok(ApprovalOutcome::NoOp(NoOpReason::CallHashMismatch));
        }
    }

    let maybe_pending = chain
        .pending_call(multisig.address(), &request.call_hash)
        .await?;
    let Some(pending) = maybe_pending else {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::WARN,
            kind = %probe::Kind::Approval,
            noop = %NoOpReason::NoPendingCall,
            multisig = %multisig.address(),
            call_hash = %hex::encode(request.call_hash),
        );
        return Ok(ApprovalOutcome::NoOp(NoOpReason::NoPendingCall));
    };
    tracing::debug!("Time point is: {}", pending.when);

    let other_signatories = multisig.other_signatories(&request.approving);
    // this signer completes the threshold when all others already signed.
    let executing =
        pending.approvals.len() as u16 >= multisig.threshold() - 1;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Approval,
        multisig = %multisig.address(),
        call_hash = %hex::encode(request.call_hash),
        approvals = pending.approvals.len(),
        threshold = multisig.threshold(),
        executing,
    );

    let mut lifecycle = if executing {
        let call_data = request
            .call_data
            .as_deref()
            .ok_or(Error::MissingCallData)?;
        let max_weight = chain.estimate_call_weight(call_data).await?;
        chain
            .submit_as_multi(
                multisig.threshold(),
                &other_signatories,
                Some(pending.when),
                call_data,
                max_weight,
            )
            .await?
    } else {
        chain
            .submit_approve_as_multi(
                multisig.threshold(),
                &other_signatories,
                Some(pending.when),
                request.call_hash,
                CallWeight::zero(),
            )
            .await?
    };

    while let Some(event) = lifecycle.next().await {
        match event? {
            TxLifecycle::Ready => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::TRACE,
                    kind = %probe::Kind::TxStatus,
                    status = "ready",
                );
            }
            TxLifecycle::Broadcast => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::TRACE,
                    kind = %probe::Kind::TxStatus,
                    status = "broadcast",
                );
            }
            TxLifecycle::InBlock {
                block_hash,
                tx_hash,
            } => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::TxStatus,
                    status = "in_block",
                    block_hash = %block_hash,
                    tx_hash = %tx_hash,
                );
            }
            TxLifecycle::Invalid { reason } => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::ERROR,
                    kind = %probe::Kind::TxStatus,
                    status = "invalid",
                    reason = %reason,
                );
                return Err(Error::TransactionInvalid { reason });
            }
            TxLifecycle::Finalized(finalized) => {
                match finalized.outcome {
                    DispatchOutcome::Failed(module_err) => {
                        tracing::event!(
                            target: probe::TARGET,
                            tracing::Level::ERROR,
                            kind = %probe::Kind::TxStatus,
                            status = "failed",
                            error = %module_err,
                        );
                        return Err(Error::Dispatch(module_err));
                    }
                    DispatchOutcome::Success => {}
                }
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::INFO,
                    kind = %probe::Kind::TxStatus,
                    status = "finalized",
                    block_hash = %finalized.block_hash,
                    tx_hash = %finalized.tx_hash,
                    executing,
                );
                if !executing {
                    return Ok(ApprovalOutcome::Approved {
                        tx_hash: finalized.tx_hash,
                    });
                }
                run_side_effects(
                    effects,
                    multisig,
                    request,
                    &other_signatories,
                    reconcile_proxy,
                )
                .await;
                return Ok(ApprovalOutcome::Executed {
                    tx_hash: finalized.tx_hash,
                });
            }
        }
    }
    Err(Error::StatusStreamEnded)
}

/// Runs the off-chain follow-ups of an executed call. Best-effort only:
/// failures are logged and swallowed, the on-chain state is final.
async fn run_side_effects<E: SideEffects>(
    effects: &E,
    multisig: &MultisigAccount,
    request: &ApprovalRequest,
    other_signatories: &[AccountId32],
    reconcile_proxy: bool,
) {
    if reconcile_proxy {
        match effects.refresh_proxy(multisig.address()).await {
            Ok(Some(proxy)) => {
                tracing::debug!("multisig proxy resolved to {proxy}");
            }
            Ok(None) => {
                tracing::debug!("no proxy recorded for this multisig yet");
            }
            Err(e) => {
                tracing::warn!("failed to refresh the multisig proxy: {e}");
            }
        }
    }
    if let Some(ref note) = request.note {
        if let Err(e) = effects
            .update_note(&request.call_hash, multisig.address(), note)
            .await
        {
            tracing::warn!("failed to persist the transaction note: {e}");
        }
    }
    let link = format!(
        "/transactions?tab=History#0x{}",
        hex::encode(request.call_hash)
    );
    if let Err(e) = effects
        .notify_signatories(
            other_signatories,
            "Transaction Executed!",
            &link,
        )
        .await
    {
        tracing::warn!("failed to notify the other signatories: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;

    use msig_approver_utils::DispatchModuleError;

    use super::*;
    use crate::chain::{FinalizedTx, TxLifecycleStream};
    use crate::{PendingCall, Timepoint};

    fn account(byte: u8) -> AccountId32 {
        AccountId32::from([byte; 32])
    }

    fn multisig(threshold: u16) -> MultisigAccount {
        MultisigAccount::new(
            account(0xF0),
            vec![account(3), account(1), account(2)],
            threshold,
        )
        .unwrap()
    }

    fn pending(approved: &[AccountId32]) -> PendingCall {
        PendingCall {
            call_hash: [0u8; 32],
            when: Timepoint {
                height: 100,
                index: 2,
            },
            approvals: approved.to_vec(),
        }
    }

    fn request(call_data: Option<Vec<u8>>) -> ApprovalRequest {
        let call_hash = match call_data {
            Some(ref data) => sp_core::hashing::blake2_256(data),
            None => [0xABu8; 32],
        };
        ApprovalRequest {
            approving: account(1),
            call_hash,
            call_data,
            note: Some("weekly payout".to_string()),
        }
    }

    fn finalized_success() -> TxLifecycle {
        TxLifecycle::Finalized(FinalizedTx {
            tx_hash: H256::repeat_byte(0x11),
            block_hash: H256::repeat_byte(0x22),
            outcome: DispatchOutcome::Success,
        })
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Submission {
        Approve {
            threshold: u16,
            others: Vec<AccountId32>,
            timepoint: Option<Timepoint>,
            call_hash: CallHash,
            max_weight: CallWeight,
        },
        Execute {
            threshold: u16,
            others: Vec<AccountId32>,
            timepoint: Option<Timepoint>,
            call: Vec<u8>,
            max_weight: CallWeight,
        },
    }

    struct MockChain {
        weight: CallWeight,
        pending: Option<PendingCall>,
        script: Vec<TxLifecycle>,
        submissions: Mutex<Vec<Submission>>,
    }

    impl MockChain {
        fn new(
            pending: Option<PendingCall>,
            script: Vec<TxLifecycle>,
        ) -> Self {
            Self {
                weight: CallWeight {
                    ref_time: 1_000_000,
                    proof_size: 512,
                },
                pending,
                script,
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> Vec<Submission> {
            self.submissions.lock().unwrap().clone()
        }

        fn scripted_stream(&self) -> TxLifecycleStream {
            stream::iter(self.script.clone().into_iter().map(Ok)).boxed()
        }
    }

    #[async_trait::async_trait]
    impl MultisigChain for MockChain {
        async fn estimate_call_weight(
            &self,
            _call_data: &[u8],
        ) -> Result<CallWeight> {
            Ok(self.weight)
        }

        async fn pending_call(
            &self,
            _multisig: &AccountId32,
            _call_hash: &CallHash,
        ) -> Result<Option<PendingCall>> {
            Ok(self.pending.clone())
        }

        async fn submit_approve_as_multi(
            &self,
            threshold: u16,
            other_signatories: &[AccountId32],
            maybe_timepoint: Option<Timepoint>,
            call_hash: CallHash,
            max_weight: CallWeight,
        ) -> Result<TxLifecycleStream> {
            self.submissions.lock().unwrap().push(Submission::Approve {
                threshold,
                others: other_signatories.to_vec(),
                timepoint: maybe_timepoint,
                call_hash,
                max_weight,
            });
            Ok(self.scripted_stream())
        }

        async fn submit_as_multi(
            &self,
            threshold: u16,
            other_signatories: &[AccountId32],
            maybe_timepoint: Option<Timepoint>,
            call: &[u8],
            max_weight: CallWeight,
        ) -> Result<TxLifecycleStream> {
            self.submissions.lock().unwrap().push(Submission::Execute {
                threshold,
                others: other_signatories.to_vec(),
                timepoint: maybe_timepoint,
                call: call.to_vec(),
                max_weight,
            });
            Ok(self.scripted_stream())
        }
    }

    #[derive(Default)]
    struct RecordingEffects {
        refreshes: Mutex<usize>,
        notes: Mutex<Vec<(CallHash, String)>>,
        notifications: Mutex<Vec<(Vec<AccountId32>, String)>>,
    }

    #[async_trait::async_trait]
    impl SideEffects for RecordingEffects {
        async fn refresh_proxy(
            &self,
            _multisig: &AccountId32,
        ) -> Result<Option<AccountId32>> {
            *self.refreshes.lock().unwrap() += 1;
            Ok(Some(account(0xAA)))
        }

        async fn update_note(
            &self,
            call_hash: &CallHash,
            _multisig: &AccountId32,
            note: &str,
        ) -> Result<()> {
            self.notes
                .lock()
                .unwrap()
                .push((*call_hash, note.to_string()));
            Ok(())
        }

        async fn notify_signatories(
            &self,
            signatories: &[AccountId32],
            message: &str,
            _link: &str,
        ) -> Result<()> {
            self.notifications
                .lock()
                .unwrap()
                .push((signatories.to_vec(), message.to_string()));
            Ok(())
        }
    }

    /// Every side-effect hook fails; approvals must not care.
    struct FailingEffects;

    #[async_trait::async_trait]
    impl SideEffects for FailingEffects {
        async fn refresh_proxy(
            &self,
            _multisig: &AccountId32,
        ) -> Result<Option<AccountId32>> {
            Err(Error::Generic("indexer is down"))
        }

        async fn update_note(
            &self,
            _call_hash: &CallHash,
            _multisig: &AccountId32,
            _note: &str,
        ) -> Result<()> {
            Err(Error::Generic("backend is down"))
        }

        async fn notify_signatories(
            &self,
            _signatories: &[AccountId32],
            _message: &str,
            _link: &str,
        ) -> Result<()> {
            Err(Error::Generic("notifier is down"))
        }
    }

    #[tokio::test]
    async fn no_pending_call_resolves_as_a_noop() {
        let chain = MockChain::new(None, vec![]);
        let effects = RecordingEffects::default();
        let outcome = approve_transfer(
            &chain,
            &effects,
            &multisig(2),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            ApprovalOutcome::NoOp(NoOpReason::NoPendingCall)
        );
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn mismatched_call_data_resolves_as_a_noop() {
        let chain =
            MockChain::new(Some(pending(&[])), vec![finalized_success()]);
        let effects = RecordingEffects::default();
        let mut req = request(Some(vec![1, 2, 3]));
        // call bytes no longer hash to the requested call hash
        req.call_data = Some(vec![9, 9, 9]);
        let outcome =
            approve_transfer(&chain, &effects, &multisig(2), &req)
                .await
                .unwrap();
        assert_eq!(
            outcome,
            ApprovalOutcome::NoOp(NoOpReason::CallHashMismatch)
        );
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn early_approval_submits_the_hash_with_zero_weight() {
        let chain = MockChain::new(
            Some(pending(&[account(3)])),
            vec![
                TxLifecycle::Ready,
                TxLifecycle::Broadcast,
                finalized_success(),
            ],
        );
        let effects = RecordingEffects::default();
        let req = request(Some(vec![1, 2, 3]));
        // threshold 3, one approval so far: ours is not the final one
        let outcome =
            approve_transfer(&chain, &effects, &multisig(3), &req)
                .await
                .unwrap();
        assert_eq!(
            outcome,
            ApprovalOutcome::Approved {
                tx_hash: H256::repeat_byte(0x11)
            }
        );
        assert_eq!(
            chain.submissions(),
            vec![Submission::Approve {
                threshold: 3,
                others: vec![account(2), account(3)],
                timepoint: Some(Timepoint {
                    height: 100,
                    index: 2
                }),
                call_hash: req.call_hash,
                max_weight: CallWeight::zero(),
            }]
        );
        // non-final approvals trigger no off-chain follow-ups
        assert!(effects.notifications.lock().unwrap().is_empty());
        assert!(effects.notes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn final_approval_submits_the_full_call_and_runs_follow_ups() {
        let chain = MockChain::new(
            Some(pending(&[account(2)])),
            vec![finalized_success()],
        );
        let effects = RecordingEffects::default();
        let req = request(Some(vec![1, 2, 3]));
        let outcome =
            approve_transfer(&chain, &effects, &multisig(2), &req)
                .await
                .unwrap();
        assert_eq!(
            outcome,
            ApprovalOutcome::Executed {
                tx_hash: H256::repeat_byte(0x11)
            }
        );
        assert_eq!(
            chain.submissions(),
            vec![Submission::Execute {
                threshold: 2,
                others: vec![account(2), account(3)],
                timepoint: Some(Timepoint {
                    height: 100,
                    index: 2
                }),
                call: vec![1, 2, 3],
                max_weight: CallWeight {
                    ref_time: 1_000_000,
                    proof_size: 512,
                },
            }]
        );
        let notes = effects.notes.lock().unwrap();
        assert_eq!(
            *notes,
            vec![(req.call_hash, "weekly payout".to_string())]
        );
        let notifications = effects.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        // exactly the other signatories, sorted, and never the approver
        assert_eq!(
            notifications[0].0,
            vec![account(2), account(3)]
        );
        // transfers never touch the proxy
        assert_eq!(*effects.refreshes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn first_of_two_approvals_takes_the_approve_path() {
        // threshold 2, nobody approved yet: ours is not the final one
        let chain = MockChain::new(
            Some(pending(&[])),
            vec![finalized_success()],
        );
        let effects = RecordingEffects::default();
        let outcome = approve_transfer(
            &chain,
            &effects,
            &multisig(2),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Approved { .. }));
        assert!(matches!(
            chain.submissions()[..],
            [Submission::Approve { .. }]
        ));
    }

    #[tokio::test]
    async fn final_approval_without_call_data_is_an_error() {
        let chain = MockChain::new(
            Some(pending(&[account(2)])),
            vec![finalized_success()],
        );
        let effects = RecordingEffects::default();
        // the proxy variant tolerates a missing call until it turns out
        // to be the executing approval
        let err =
            approve_proxy(&chain, &effects, &multisig(2), &request(None))
                .await
                .unwrap_err();
        assert!(matches!(err, Error::MissingCallData));
        assert!(chain.submissions().is_empty());

        let err =
            approve_transfer(&chain, &effects, &multisig(2), &request(None))
                .await
                .unwrap_err();
        assert!(matches!(err, Error::MissingCallData));
    }

    #[tokio::test]
    async fn proxy_approval_reconciles_the_proxy_after_execution() {
        let chain = MockChain::new(
            Some(pending(&[account(2)])),
            vec![finalized_success()],
        );
        let effects = RecordingEffects::default();
        let outcome = approve_proxy(
            &chain,
            &effects,
            &multisig(2),
            &request(Some(vec![4, 5, 6])),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Executed { .. }));
        assert_eq!(*effects.refreshes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn dispatch_failure_surfaces_section_and_method() {
        let failed = TxLifecycle::Finalized(FinalizedTx {
            tx_hash: H256::repeat_byte(0x11),
            block_hash: H256::repeat_byte(0x22),
            outcome: DispatchOutcome::Failed(DispatchModuleError {
                section: "Balances".to_string(),
                method: "InsufficientBalance".to_string(),
                docs: "Balance too low to send value.".to_string(),
            }),
        });
        let chain =
            MockChain::new(Some(pending(&[account(2)])), vec![failed]);
        let effects = RecordingEffects::default();
        let err = approve_transfer(
            &chain,
            &effects,
            &multisig(2),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Balances.InsufficientBalance"));
        // nothing executed, so no follow-ups either
        assert!(effects.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_status_is_an_error() {
        let chain = MockChain::new(
            Some(pending(&[])),
            vec![
                TxLifecycle::Ready,
                TxLifecycle::Invalid {
                    reason: "dropped from the transaction pool".to_string(),
                },
            ],
        );
        let effects = RecordingEffects::default();
        let err = approve_transfer(
            &chain,
            &effects,
            &multisig(3),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::TransactionInvalid { .. }));
    }

    #[tokio::test]
    async fn stream_ending_before_a_terminal_state_is_an_error() {
        let chain = MockChain::new(
            Some(pending(&[])),
            vec![TxLifecycle::Ready, TxLifecycle::Broadcast],
        );
        let effects = RecordingEffects::default();
        let err = approve_transfer(
            &chain,
            &effects,
            &multisig(3),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::StatusStreamEnded));
    }

    #[tokio::test]
    async fn side_effect_failures_do_not_fail_the_approval() {
        let chain = MockChain::new(
            Some(pending(&[account(2)])),
            vec![finalized_success()],
        );
        let outcome = approve_proxy(
            &chain,
            &FailingEffects,
            &multisig(2),
            &request(Some(vec![1, 2, 3])),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Executed { .. }));
    }
}
