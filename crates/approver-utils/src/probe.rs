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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "msig_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the Lifecycle of the approver changes, like starting or shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Multisig approval orchestration state on a specific chain/node.
    #[display(fmt = "approval")]
    Approval,
    /// Extrinsic submission lifecycle updates on a specific chain/node.
    #[display(fmt = "tx_status")]
    TxStatus,
    /// Backend API calls (address book, transaction notes).
    #[display(fmt = "backend")]
    Backend,
    /// Indexing service (explorer) queries.
    #[display(fmt = "explorer")]
    Explorer,
    /// Out-of-band notification fan-out to signatories.
    #[display(fmt = "notification")]
    Notification,
}
