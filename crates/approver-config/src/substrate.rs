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

use serde::{Deserialize, Serialize};

use msig_approver_types::{rpc_url::RpcUrl, suri::Suri};

/// SubstrateConfig is the approver configuration for one Substrate based
/// network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubstrateConfig {
    /// String that groups configuration for this chain on a human-readable name.
    pub name: String,
    /// Boolean indicating this Substrate network is enabled or not.
    #[serde(default)]
    pub enabled: bool,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// Websocket Endpoint for long living connections
    #[serde(skip_serializing)]
    pub ws_endpoint: RpcUrl,
    /// Block Explorer for this Substrate node.
    ///
    /// Optional, and only used for printing a clickable links
    /// for transactions and accounts.
    #[serde(skip_serializing)]
    pub explorer: Option<url::Url>,
    /// The indexing service API of the explorer (Subscan-style), used to
    /// look up historical events such as pure-proxy creation.
    #[serde(skip_serializing, default)]
    pub explorer_api: Option<ExplorerApiConfig>,
    /// Chain specific id.
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// Interprets the string in order to generate a key Pair used to sign
    /// approval extrinsics on this chain.
    ///
    /// - If `s` begins with a `$` character it is interpreted as an environment variable.
    /// - Otherwise it is parsed as a SURI (seed, dev account or mnemonic with
    ///   optional derivation junctions and password).
    #[serde(skip_serializing)]
    pub suri: Option<Suri>,
    /// Token unit symbol of this chain, used for balance display.
    pub token_symbol: String,
    /// Token decimals of this chain, used for balance display.
    pub token_decimals: u32,
}

/// Configuration of the indexing service API of a block explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExplorerApiConfig {
    /// Base URL of the indexing service API.
    pub url: url::Url,
    /// API key sent with every request, if the service requires one.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
}
