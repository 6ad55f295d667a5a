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
use parity_scale_codec::{Decode, Encode};
use sp_core::sr25519::Pair as Sr25519Pair;
use subxt::dynamic::Value;
use subxt::error::DispatchError;
use subxt::tx::{PairSigner, TxPayload, TxStatus};
use subxt::utils::AccountId32;
use subxt::{OnlineClient, PolkadotConfig};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use msig_approver_utils::{probe, DispatchModuleError, Error, Result};

use crate::chain::{
    CallWeight, DispatchOutcome, FinalizedTx, MultisigChain, TxLifecycle,
    TxLifecycleStream,
};
use crate::{CallHash, PendingCall, Timepoint};

const MULTISIG_PALLET: &str = "Multisig";

/// Chain access over a live `subxt` connection, signing with a single
/// sr25519 key.
pub struct SubxtMultisigChain {
    client: OnlineClient<PolkadotConfig>,
    signer: PairSigner<PolkadotConfig, Sr25519Pair>,
}

/// A transaction payload whose call data is already fully SCALE-encoded,
/// pallet and call indices included. Lets us build multisig extrinsics
/// against whatever runtime the node reports, without generated metadata.
struct RawTxPayload {
    pallet_name: &'static str,
    call_name: &'static str,
    call_data: Vec<u8>,
}

impl TxPayload for RawTxPayload {
    fn encode_call_data_to(
        &self,
        _metadata: &subxt::Metadata,
        out: &mut Vec<u8>,
    ) -> std::result::Result<(), subxt::Error> {
        out.extend_from_slice(&self.call_data);
        Ok(())
    }
}

impl std::fmt::Display for RawTxPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}(0x{})",
            self.pallet_name,
            self.call_name,
            hex::encode(&self.call_data),
        )
    }
}

/// The multisig pallet's storage value for an open operation; decoded
/// manually from the raw storage bytes.
#[derive(Decode)]
struct StoredMultisig {
    when: Timepoint,
    #[allow(dead_code)]
    deposit: u128,
    #[allow(dead_code)]
    depositor: AccountId32,
    approvals: Vec<AccountId32>,
}

/// The reply of `TransactionPaymentCallApi_query_call_info`, of which we
/// only keep the weight.
#[derive(Decode)]
struct CallInfo {
    weight: CallWeight,
    #[allow(dead_code)]
    class: u8,
    #[allow(dead_code)]
    partial_fee: u128,
}

impl SubxtMultisigChain {
    /// Wraps an online client and a signing key pair.
    pub fn new(client: OnlineClient<PolkadotConfig>, pair: Sr25519Pair) -> Self {
        Self {
            client,
            signer: PairSigner::new(pair),
        }
    }

    /// The account id of the signing key.
    pub fn signer_account(&self) -> AccountId32 {
        self.signer.account_id().clone()
    }

    /// Resolves the runtime's (pallet, call) indices for a call by name,
    /// from the metadata the node reported at connection time.
    fn call_index(
        &self,
        pallet_name: &str,
        call_name: &str,
    ) -> Result<(u8, u8)> {
        let metadata = self.client.metadata();
        let pallet = metadata
            .pallet_by_name(pallet_name)
            .ok_or(Error::Generic("pallet not found in runtime metadata"))?;
        let variant = pallet
            .call_variant_by_name(call_name)
            .ok_or(Error::Generic("call not found in pallet"))?;
        Ok((pallet.index(), variant.index))
    }

    /// Signs and submits the payload, then spawns a task feeding status
    /// updates into the returned lifecycle stream.
    async fn submit_and_watch(
        &self,
        payload: RawTxPayload,
    ) -> Result<TxLifecycleStream> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::TxStatus,
            call = %payload,
            signer = %self.signer.account_id(),
        );
        let mut progress = self
            .client
            .tx()
            .sign_and_submit_then_watch_default(&payload, &self.signer)
            .await?;
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(event) = progress.next_item().await {
                let status = match event {
                    Ok(status) => status,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                match status {
                    TxStatus::Ready => {
                        let _ = tx.send(Ok(TxLifecycle::Ready)).await;
                    }
                    TxStatus::Broadcast(_) => {
                        let _ = tx.send(Ok(TxLifecycle::Broadcast)).await;
                    }
                    TxStatus::InBlock(in_block) => {
                        let _ = tx
                            .send(Ok(TxLifecycle::InBlock {
                                block_hash: in_block.block_hash(),
                                tx_hash: in_block.extrinsic_hash(),
                            }))
                            .await;
                    }
                    TxStatus::Finalized(in_block) => {
                        let outcome = match in_block.wait_for_success().await
                        {
                            Ok(_events) => DispatchOutcome::Success,
                            Err(subxt::Error::Runtime(
                                DispatchError::Module(module_err),
                            )) => {
                                let details = match module_err.details() {
                                    Ok(details) => details,
                                    Err(e) => {
                                        let _ = tx
                                            .send(Err(
                                                subxt::Error::from(e).into(),
                                            ))
                                            .await;
                                        return;
                                    }
                                };
                                DispatchOutcome::Failed(DispatchModuleError {
                                    section: details.pallet.name().to_string(),
                                    method: details.variant.name.clone(),
                                    docs: details.variant.docs.join(" "),
                                })
                            }
                            Err(e) => {
                                let _ = tx.send(Err(e.into())).await;
                                return;
                            }
                        };
                        let _ = tx
                            .send(Ok(TxLifecycle::Finalized(FinalizedTx {
                                tx_hash: in_block.extrinsic_hash(),
                                block_hash: in_block.block_hash(),
                                outcome,
                            })))
                            .await;
                        return;
                    }
                    TxStatus::Invalid => {
                        let _ = tx
                            .send(Ok(TxLifecycle::Invalid {
                                reason: "rejected as invalid".to_string(),
                            }))
                            .await;
                        return;
                    }
                    TxStatus::Dropped => {
                        let _ = tx
                            .send(Ok(TxLifecycle::Invalid {
                                reason: "dropped from the transaction pool"
                                    .to_string(),
                            }))
                            .await;
                        return;
                    }
                    TxStatus::Usurped(_) => {
                        let _ = tx
                            .send(Ok(TxLifecycle::Invalid {
                                reason: "usurped by a competing transaction"
                                    .to_string(),
                            }))
                            .await;
                        return;
                    }
                    TxStatus::FinalityTimeout(_) => {
                        let _ = tx
                            .send(Ok(TxLifecycle::Invalid {
                                reason: "finality timeout".to_string(),
                            }))
                            .await;
                        return;
                    }
                    // Future / Retracted are transient, keep waiting.
                    _ => {}
                }
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[async_trait::async_trait]
impl MultisigChain for SubxtMultisigChain {
    async fn estimate_call_weight(
        &self,
        call_data: &[u8],
    ) -> Result<CallWeight> {
        // the runtime API takes the encoded call followed by its length.
        let mut args = call_data.to_vec();
        (call_data.len() as u32).encode_to(&mut args);
        let bytes = self
            .client
            .rpc()
            .state_call_raw(
                "TransactionPaymentCallApi_query_call_info",
                Some(&args),
                None,
            )
            .await?;
        let info = CallInfo::decode(&mut &bytes.0[..])?;
        Ok(info.weight)
    }

    async fn pending_call(
        &self,
        multisig: &AccountId32,
        call_hash: &CallHash,
    ) -> Result<Option<PendingCall>> {
        let address = subxt::dynamic::storage(
            MULTISIG_PALLET,
            "Multisigs",
            vec![
                Value::from_bytes(multisig.0),
                Value::from_bytes(call_hash),
            ],
        );
        let maybe_entry = self
            .client
            .storage()
            .at_latest()
            .await?
            .fetch(&address)
            .await?;
        let Some(entry) = maybe_entry else {
            return Ok(None);
        };
        let raw = entry.into_encoded();
        let stored = StoredMultisig::decode(&mut &raw[..])?;
        Ok(Some(PendingCall {
            call_hash: *call_hash,
            when: stored.when,
            approvals: stored.approvals,
        }))
    }

    async fn submit_approve_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId32],
        maybe_timepoint: Option<Timepoint>,
        call_hash: CallHash,
        max_weight: CallWeight,
    ) -> Result<TxLifecycleStream> {
        let (pallet_index, call_index) =
            self.call_index(MULTISIG_PALLET, "approve_as_multi")?;
        let mut call_data = vec![pallet_index, call_index];
        threshold.encode_to(&mut call_data);
        other_signatories.encode_to(&mut call_data);
        maybe_timepoint.encode_to(&mut call_data);
        call_hash.encode_to(&mut call_data);
        max_weight.encode_to(&mut call_data);
        self.submit_and_watch(RawTxPayload {
            pallet_name: MULTISIG_PALLET,
            call_name: "approve_as_multi",
            call_data,
        })
        .await
    }

    async fn submit_as_multi(
        &self,
        threshold: u16,
        other_signatories: &[AccountId32],
        maybe_timepoint: Option<Timepoint>,
        call: &[u8],
        max_weight: CallWeight,
    ) -> Result<TxLifecycleStream> {
        let (pallet_index, call_index) =
            self.call_index(MULTISIG_PALLET, "as_multi")?;
        let mut call_data = vec![pallet_index, call_index];
        threshold.encode_to(&mut call_data);
        other_signatories.encode_to(&mut call_data);
        maybe_timepoint.encode_to(&mut call_data);
        // the inner call is itself an encoded `RuntimeCall`, appended as-is.
        call_data.extend_from_slice(call);
        max_weight.encode_to(&mut call_data);
        self.submit_and_watch(RawTxPayload {
            pallet_name: MULTISIG_PALLET,
            call_name: "as_multi",
            call_data,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_encodes_compact() {
        let weight = CallWeight {
            ref_time: 1,
            proof_size: 0,
        };
        // two single-byte compact integers
        assert_eq!(weight.encode(), vec![4, 0]);
    }

    #[test]
    fn stored_multisig_round_trips() {
        let when = Timepoint {
            height: 42,
            index: 3,
        };
        let depositor = AccountId32::from([7u8; 32]);
        let approvals = vec![depositor.clone()];
        let mut raw = Vec::new();
        when.encode_to(&mut raw);
        1_000_000_000_000u128.encode_to(&mut raw);
        depositor.encode_to(&mut raw);
        approvals.encode_to(&mut raw);

        let stored = StoredMultisig::decode(&mut &raw[..]).unwrap();
        assert_eq!(stored.when, when);
        assert_eq!(stored.approvals, approvals);
    }
}
