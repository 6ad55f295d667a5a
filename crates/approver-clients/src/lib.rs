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
//! HTTP clients for the approver's off-chain collaborators.
//!
//! None of these services are implemented here; this crate only speaks
//! their wire formats: the backend API (`{ data, error }` JSON envelope
//! with address + signature headers), the Subscan-style indexing service,
//! and the notification fan-out endpoint.

/// Backend API client (multisig registration, address book, transaction notes).
pub mod backend;
/// Indexing/explorer service client.
pub mod explorer;
/// Notification fan-out client.
pub mod notifier;

use serde::Serialize;

/// Credentials identifying the caller against the backend API.
///
/// These are threaded explicitly through every call that needs them,
/// never read from ambient process state.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// The caller's on-chain address (ss58).
    pub address: String,
    /// A signature over the caller's login token, proving address ownership.
    pub signature: String,
}

impl Credentials {
    /// Creates new credentials from an address and a signature.
    pub fn new(
        address: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            signature: signature.into(),
        }
    }
}
