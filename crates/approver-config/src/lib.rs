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

//! # Approver Configuration Module
//!
//! A module for configuring the msig approver.
//!
//! Possible configuration include:
//! * `substrate`: Substrate based networks and their chain properties,
//!   endpoints and signing identities.
//! * `backend`: the off-chain backend API used for transaction notes,
//!   address book entries and notification fan-out.

/// CLI helpers (logger setup and config loading from default dirs).
pub mod cli;
/// Substrate chain configuration.
pub mod substrate;
/// Utils for processing configuration.
pub mod utils;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use substrate::SubstrateConfig;

/// The whole approver configuration, parsed from the config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApproverConfig {
    /// Substrate based networks, keyed by chain id after post-loading.
    #[serde(default)]
    pub substrate: HashMap<String, SubstrateConfig>,
    /// The off-chain backend API, if any.
    #[serde(default)]
    pub backend: Option<BackendApiConfig>,
}

impl ApproverConfig {
    /// Returns the configuration of the Substrate chain with the given id.
    pub fn chain(&self, chain_id: u32) -> Option<&SubstrateConfig> {
        self.substrate.get(&chain_id.to_string())
    }
}

/// BackendApiConfig is the configuration of the off-chain backend API that
/// stores multisigs, address books and transaction notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackendApiConfig {
    /// Base URL of the backend API.
    pub url: url::Url,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_and_postloads_a_config_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut f =
            std::fs::File::create(dir.path().join("local.toml")).unwrap();
        write!(
            f,
            r#"
[substrate.local]
name = "local"
enabled = true
http-endpoint = "http://localhost:9933"
ws-endpoint = "ws://localhost:9944"
chain-id = 42
token-symbol = "UNIT"
token-decimals = 12

[substrate.disabled-chain]
name = "disabled-chain"
enabled = false
http-endpoint = "http://localhost:9933"
ws-endpoint = "ws://localhost:9944"
chain-id = 43
token-symbol = "UNIT"
token-decimals = 12

[backend]
url = "https://backend.example.com/"
"#
        )
        .unwrap();
        drop(f);

        let config = utils::load(dir.path()).expect("load config");
        // enabled chains are re-keyed by chain id, disabled ones dropped.
        assert!(config.chain(42).is_some());
        assert!(config.chain(43).is_none());
        let chain = config.chain(42).unwrap();
        assert_eq!(chain.token_symbol, "UNIT");
        assert_eq!(chain.token_decimals, 12);
        assert!(config.backend.is_some());
    }
}
