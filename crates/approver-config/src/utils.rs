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

use config::{Config, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ApproverConfig;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> msig_approver_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(msig_approver_utils::Error::from))
        .collect()
}

/// Try to parse the [`ApproverConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> msig_approver_utils::Result<ApproverConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        // get file extension
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of MSIG).
    let builder = builder
        .add_source(config::Environment::with_prefix("MSIG").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        ApproverConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files.
///
/// Returns `Ok(ApproverConfig)` on success, or the underlying error on failure.
///
/// # Arguments
///
/// * `path` - The path to the configuration directory
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> msig_approver_utils::Result<ApproverConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: ApproverConfig,
) -> msig_approver_utils::Result<ApproverConfig> {
    tracing::trace!("Checking configuration sanity ...");

    // 1. drain everything, and take enabled chains.
    let old_substrate = config
        .substrate
        .drain()
        .filter(|(_, chain)| chain.enabled)
        .collect::<HashMap<_, _>>();
    // 2. insert them again, keyed by chain id.
    for (_, v) in old_substrate {
        config.substrate.insert(v.chain_id.to_string(), v);
    }

    for chain in config.substrate.values() {
        if chain.suri.is_none() {
            tracing::warn!(
                "!!WARNING!!: No suri configured for chain ({}), \
                approvals on it will fail at submission time",
                chain.name
            );
        }
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}
