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

#![deny(unsafe_code)]
#![warn(missing_docs)]
//! # Msig Approver
//!
//! A CLI for approving pending Substrate multisig calls: it looks up the
//! pending operation on chain, submits `approve_as_multi` or (on the
//! final approval) `as_multi`, follows the extrinsic to finality and
//! then runs the off-chain follow-ups (transaction note, notification
//! fan-out, proxy reconciliation).

use std::path::PathBuf;

use anyhow::Context as _;
use structopt::StructOpt;
use subxt::utils::AccountId32;
use subxt::PolkadotConfig;

use msig_approval::approve::{
    approve_proxy, approve_transfer, ApprovalOutcome, ApprovalRequest,
    SideEffects,
};
use msig_approval::subxt_chain::SubxtMultisigChain;
use msig_approval::{CallHash, MultisigAccount};
use msig_approver_clients::backend::{BackendClient, CreateMultisigRequest};
use msig_approver_clients::explorer::ExplorerClient;
use msig_approver_clients::notifier::{Notification, NotifierClient};
use msig_approver_clients::Credentials;
use msig_approver_context::ApproverContext;
use msig_approver_utils::clickable_link::ClickableLink;
use msig_approver_utils::{probe, Result as ApproverResult};

/// Multisig approval tool for Substrate chains.
#[derive(Debug, StructOpt)]
#[structopt(name = "Msig Approver")]
struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    verbose: i32,
    /// Directory that contains configuration files.
    #[structopt(short = "c", long = "config-dir", parse(from_os_str))]
    config_dir: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Approves a pending multisig call (a transfer or any other
    /// non-proxy call).
    ApproveTransfer(ApproveOpts),
    /// Approves a pending proxy-related multisig call and reconciles the
    /// multisig's pure proxy once it executes.
    ApproveProxy(ApproveOpts),
    /// Registers a new multisig with the off-chain backend.
    CreateMultisig(CreateOpts),
}

#[derive(Debug, StructOpt)]
struct ApproveOpts {
    /// The chain id of the target network, as configured.
    #[structopt(long)]
    chain: u32,
    /// The multisig address (ss58).
    #[structopt(long)]
    multisig: AccountId32,
    /// All signatories of the multisig, the approver included (ss58).
    #[structopt(long, required = true)]
    signatories: Vec<AccountId32>,
    /// Number of approvals required to execute a call.
    #[structopt(long)]
    threshold: u16,
    /// The blake2-256 hash of the pending call (hex, 0x-prefixed or not).
    #[structopt(long, parse(try_from_str = parse_call_hash))]
    call_hash: CallHash,
    /// The full SCALE-encoded call (hex). Required on the final approval.
    #[structopt(long, parse(try_from_str = parse_hex_bytes))]
    call_data: Option<HexBytes>,
    /// A free-text note to store against the transaction once executed.
    #[structopt(long)]
    note: Option<String>,
    /// An optional amount being moved by the call, in base units, only
    /// used for display.
    #[structopt(long)]
    amount: Option<u128>,
    #[structopt(flatten)]
    creds: CredentialOpts,
}

#[derive(Debug, StructOpt)]
struct CreateOpts {
    /// All signatory addresses of the new multisig (ss58).
    #[structopt(long, required = true)]
    signatories: Vec<AccountId32>,
    /// Number of approvals required to execute a call.
    #[structopt(long)]
    threshold: u16,
    /// Display name of the new multisig.
    #[structopt(long)]
    name: String,
    #[structopt(flatten)]
    creds: CredentialOpts,
}

/// Alias so structopt treats the field as one optional value instead of
/// special-casing `Option<Vec<_>>` as a list of `u8`s.
type HexBytes = Vec<u8>;

/// Backend credentials, passed explicitly on the command line. The
/// backend identifies callers by address and a signature over their
/// login token; nothing is read from ambient process state.
#[derive(Debug, StructOpt)]
struct CredentialOpts {
    /// The caller's address (ss58), identifying them to the backend.
    #[structopt(long)]
    address: Option<String>,
    /// A signature over the caller's login token.
    #[structopt(long)]
    signature: Option<String>,
}

impl CredentialOpts {
    fn into_credentials(self) -> Option<Credentials> {
        match (self.address, self.signature) {
            (Some(address), Some(signature)) => {
                Some(Credentials::new(address, signature))
            }
            _ => None,
        }
    }
}

fn parse_call_hash(s: &str) -> anyhow::Result<CallHash> {
    let bytes = parse_hex_bytes(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected a 32 byte call hash"))
}

fn parse_hex_bytes(s: &str) -> anyhow::Result<Vec<u8>> {
    Ok(hex::decode(s.trim_start_matches("0x"))?)
}

#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    // load the dotenv file before anything else, but ignore a missing one.
    let _ = dotenv::dotenv();
    msig_approver_config::cli::setup_logger(args.verbose, "msig_approver")?;
    let config =
        msig_approver_config::cli::load_config(args.config_dir.as_ref())?;
    let ctx = ApproverContext::new(config);
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true,
    );

    let shutdown_handle = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, shutting down..");
            shutdown_handle.shutdown();
        }
    });

    let mut shutdown = ctx.shutdown_signal();
    tokio::select! {
        result = run(&ctx, args.cmd) => result,
        _ = shutdown.recv() => {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Lifecycle,
                shutdown = true,
            );
            Ok(())
        }
    }
}

async fn run(ctx: &ApproverContext, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::ApproveTransfer(opts) => approve(ctx, opts, false).await,
        Command::ApproveProxy(opts) => approve(ctx, opts, true).await,
        Command::CreateMultisig(opts) => create_multisig(ctx, opts).await,
    }
}

async fn approve(
    ctx: &ApproverContext,
    opts: ApproveOpts,
    proxy: bool,
) -> anyhow::Result<()> {
    let client = ctx
        .substrate_provider::<PolkadotConfig>(opts.chain)
        .await
        .context("failed to connect to the configured node")?;
    let pair = ctx.substrate_wallet(opts.chain).await?;
    let chain = SubxtMultisigChain::new(client, pair);
    let approving = chain.signer_account();
    let effects = ClientEffects::new(ctx, opts.chain, opts.creds)?;

    let multisig = MultisigAccount::new(
        opts.multisig,
        opts.signatories,
        opts.threshold,
    )?;
    if let Some(amount) = opts.amount {
        let formatter = ctx.balance_formatter(opts.chain)?;
        tracing::info!(
            "Approving a call moving {} from {}",
            formatter.format(amount),
            multisig.address(),
        );
    }
    let request = ApprovalRequest {
        approving,
        call_hash: opts.call_hash,
        call_data: opts.call_data,
        note: opts.note,
    };
    let outcome = if proxy {
        approve_proxy(&chain, &effects, &multisig, &request).await?
    } else {
        approve_transfer(&chain, &effects, &multisig, &request).await?
    };
    report(ctx, opts.chain, outcome);
    Ok(())
}

fn report(ctx: &ApproverContext, chain_id: u32, outcome: ApprovalOutcome) {
    let explorer = ctx
        .config
        .chain(chain_id)
        .and_then(|c| c.explorer.clone());
    match outcome {
        ApprovalOutcome::Approved { tx_hash }
        | ApprovalOutcome::Executed { tx_hash } => {
            let executed =
                matches!(outcome, ApprovalOutcome::Executed { .. });
            if executed {
                tracing::info!("Final approval submitted, call executed");
            } else {
                tracing::info!("Approval recorded, waiting on the others");
            }
            match explorer {
                Some(base) => {
                    let url = format!("{base}extrinsic/{tx_hash:?}");
                    let text = format!("{tx_hash:?}");
                    tracing::info!(
                        "Transaction: {}",
                        ClickableLink::new(&text, &url),
                    );
                }
                None => {
                    tracing::info!("Transaction: {tx_hash:?}");
                }
            }
        }
        ApprovalOutcome::NoOp(reason) => {
            tracing::warn!("Nothing submitted: {reason}");
        }
    }
}

async fn create_multisig(
    ctx: &ApproverContext,
    opts: CreateOpts,
) -> anyhow::Result<()> {
    let backend = ctx
        .config
        .backend
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no backend configured"))?;
    let creds = opts
        .creds
        .into_credentials()
        .ok_or_else(|| anyhow::anyhow!("backend credentials required"))?;
    let client = BackendClient::new(
        backend.url.clone(),
        ctx.http_client().clone(),
    );
    // registers the multisig and puts every signatory into the caller's
    // address book.
    let record = client
        .register_multisig(
            &creds,
            &CreateMultisigRequest {
                signatories: opts
                    .signatories
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                threshold: opts.threshold,
                multisig_name: opts.name,
            },
        )
        .await?;
    tracing::info!(
        "Created multisig {} ({} of {})",
        record.address,
        record.threshold,
        record.signatories.len(),
    );
    Ok(())
}

/// Production side effects, wired to whatever off-chain services are
/// configured. Anything unconfigured degrades to a logged no-op.
struct ClientEffects {
    backend: Option<BackendClient>,
    notifier: Option<NotifierClient>,
    explorer: Option<ExplorerClient>,
    creds: Option<Credentials>,
    network: String,
}

impl ClientEffects {
    fn new(
        ctx: &ApproverContext,
        chain_id: u32,
        creds: CredentialOpts,
    ) -> anyhow::Result<Self> {
        let chain = ctx
            .config
            .chain(chain_id)
            .ok_or_else(|| anyhow::anyhow!("chain {chain_id} not configured"))?;
        let backend = ctx.config.backend.as_ref().map(|b| {
            BackendClient::new(b.url.clone(), ctx.http_client().clone())
        });
        // the notification endpoint lives under the same base URL as the
        // backend API.
        let notifier = ctx.config.backend.as_ref().map(|b| {
            NotifierClient::new(b.url.clone(), ctx.http_client().clone())
        });
        let explorer = chain.explorer_api.as_ref().map(|e| {
            ExplorerClient::new(
                e.url.clone(),
                e.api_key.clone(),
                ctx.http_client().clone(),
            )
        });
        Ok(Self {
            backend,
            notifier,
            explorer,
            creds: creds.into_credentials(),
            network: chain.name.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SideEffects for ClientEffects {
    async fn refresh_proxy(
        &self,
        multisig: &AccountId32,
    ) -> ApproverResult<Option<AccountId32>> {
        let Some(ref explorer) = self.explorer else {
            tracing::debug!("no indexing service configured, skipping");
            return Ok(None);
        };
        let created = explorer.proxy_created(multisig).await?;
        Ok(created.map(|c| c.proxy))
    }

    async fn update_note(
        &self,
        call_hash: &CallHash,
        multisig: &AccountId32,
        note: &str,
    ) -> ApproverResult<()> {
        let (Some(backend), Some(creds)) =
            (self.backend.as_ref(), self.creds.as_ref())
        else {
            tracing::debug!("no backend or credentials, skipping note");
            return Ok(());
        };
        backend
            .update_transaction_note(
                creds,
                &format!("0x{}", hex::encode(call_hash)),
                &multisig.to_string(),
                note,
            )
            .await?;
        Ok(())
    }

    async fn notify_signatories(
        &self,
        signatories: &[AccountId32],
        message: &str,
        link: &str,
    ) -> ApproverResult<()> {
        let (Some(notifier), Some(creds)) =
            (self.notifier.as_ref(), self.creds.as_ref())
        else {
            tracing::debug!("no backend or credentials, skipping fan-out");
            return Ok(());
        };
        notifier
            .send(
                creds,
                &Notification {
                    addresses: signatories
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    message: message.to_string(),
                    link: link.to_string(),
                    kind: "sent".to_string(),
                    network: self.network.clone(),
                },
            )
            .await
    }
}
