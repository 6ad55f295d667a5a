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

/// Token amount display formatting.
pub mod balance;
pub mod clickable_link;
/// A module used for debugging the approver lifecycle, submissions, or other approver state.
pub mod probe;

/// A structured on-chain dispatch failure, decoded from the module error
/// metadata of the chain the extrinsic was submitted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchModuleError {
    /// The pallet (section) that raised the error.
    pub section: String,
    /// The error variant (method) inside that pallet.
    pub method: String,
    /// Human-readable documentation attached to the error variant.
    pub docs: String,
}

impl std::fmt::Display for DispatchModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.section, self.method, self.docs)
    }
}

/// An enum of all possible errors that could be encountered during the
/// execution of the msig approver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Basic error for the substrate runtime.
    #[error(transparent)]
    Subxt(#[from] subxt::Error),
    /// Runtime metadata error.
    #[error(transparent)]
    Metadata(#[from] subxt::error::MetadataError),
    /// SCALE Codec error.
    #[error(transparent)]
    ScaleCodec(#[from] parity_scale_codec::Error),
    /// Reqwest error.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Substrate node not found.
    #[error("Node Not Found: {}", chain_id)]
    NodeNotFound {
        /// The chain id of the node.
        chain_id: String,
    },
    /// Missing required private key or SURI in the config.
    #[error("Missing required private key or SURI in the config")]
    MissingSecrets,
    /// Backend API returned a non-empty error field.
    #[error("Backend API error: {}", message)]
    BackendApi {
        /// The error string reported by the backend.
        message: String,
    },
    /// The indexing service returned an unusable response.
    #[error("Explorer API error: {}", message)]
    ExplorerApi {
        /// What was wrong with the response.
        message: String,
    },
    /// The executing approval requires the full encoded call bytes.
    #[error("The final (executing) approval requires the full call data")]
    MissingCallData,
    /// The chain reported the submitted extrinsic as invalid.
    #[error("Transaction invalid: {}", reason)]
    TransactionInvalid {
        /// The reason reported by the node, if any.
        reason: String,
    },
    /// The status subscription ended before reaching a terminal state.
    #[error("Transaction status stream ended before a terminal state")]
    StatusStreamEnded,
    /// The call dispatched on-chain but failed inside a pallet.
    #[error("Dispatch failed: {}", _0)]
    Dispatch(DispatchModuleError),
    /// The multisig threshold is out of range for its signatory set.
    #[error(
        "Invalid threshold {} for {} signatories",
        threshold,
        signatories
    )]
    InvalidThreshold {
        /// The requested approval threshold.
        threshold: u16,
        /// How many signatories the multisig has.
        signatories: usize,
    },
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

/// A type alias for the result for the approver, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
