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
//! # Approver Context Module
//!
//! A module for managing the context of the approver.

use sp_core::sr25519::Pair as Sr25519Pair;
use subxt::OnlineClient;
use tokio::sync::broadcast;

use msig_approver_config::ApproverConfig;
use msig_approver_utils::balance::BalanceFormatter;

/// ApproverContext contains the approver's configuration and shutdown signal.
#[derive(Clone)]
pub struct ApproverContext {
    /// The configuration of the approver.
    pub config: ApproverConfig,
    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the caller. When a task
    /// is spawned, it is passed a broadcast receiver handle. When a graceful
    /// shutdown is initiated, a `()` value is sent via the
    /// broadcast::Sender. Each active task receives it, reaches a safe
    /// terminal state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Shared HTTP client for the backend and indexing services.
    http_client: reqwest::Client,
}

impl ApproverContext {
    /// Creates a new ApproverContext.
    pub fn new(config: ApproverConfig) -> Self {
        let (notify_shutdown, _) = broadcast::channel(2);
        Self {
            config,
            notify_shutdown,
            http_client: reqwest::Client::new(),
        }
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Sets up and returns a Substrate client for the approver.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The chain ID of the target node.
    pub async fn substrate_provider<C: subxt::Config>(
        &self,
        chain_id: u32,
    ) -> msig_approver_utils::Result<OnlineClient<C>> {
        let node_config = self.config.chain(chain_id).ok_or_else(|| {
            msig_approver_utils::Error::NodeNotFound {
                chain_id: chain_id.to_string(),
            }
        })?;
        tracing::debug!(
            "Connecting to chain {} at {}",
            node_config.name,
            node_config.ws_endpoint,
        );
        let client = OnlineClient::<C>::from_url(
            node_config.ws_endpoint.to_string(),
        )
        .await?;
        Ok(client)
    }

    /// Sets up and returns a Substrate wallet for the approver.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The chain ID of the target node.
    pub async fn substrate_wallet(
        &self,
        chain_id: u32,
    ) -> msig_approver_utils::Result<Sr25519Pair> {
        let node_config =
            self.config.chain(chain_id).cloned().ok_or_else(|| {
                msig_approver_utils::Error::NodeNotFound {
                    chain_id: chain_id.to_string(),
                }
            })?;
        tracing::debug!("Loading signing key for chain {}", node_config.name);
        let suri_key = node_config
            .suri
            .ok_or(msig_approver_utils::Error::MissingSecrets)?;
        Ok(suri_key.into())
    }

    /// Returns a balance formatter configured with the chain properties
    /// (token decimals and unit) of the given chain.
    pub fn balance_formatter(
        &self,
        chain_id: u32,
    ) -> msig_approver_utils::Result<BalanceFormatter> {
        let node_config = self.config.chain(chain_id).ok_or_else(|| {
            msig_approver_utils::Error::NodeNotFound {
                chain_id: chain_id.to_string(),
            }
        })?;
        Ok(BalanceFormatter::new(
            node_config.token_decimals,
            node_config.token_symbol.clone(),
        ))
    }
}

/// Listens for the shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the task
/// should shutdown.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
