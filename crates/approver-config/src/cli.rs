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

use crate::ApproverConfig;
use anyhow::Context;
use directories_next::ProjectDirs;
use std::path::Path;

/// Package identifier, where the default configuration is defined.
/// If the user does not start the approver with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["tools", "msig", "msig-approver"];

/// Loads the configuration from the given directory.
///
/// Returns `Ok(ApproverConfig)` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `config_dir` - An optional path to the directory that contains the configuration.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<ApproverConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for the msig approver");
    let dirs = ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")?;
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => dirs.config_dir().to_path_buf(),
    };
    // return an error if the path is not a directory.
    if !path.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let v = crate::utils::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

/// Sets up the logger for the approver, based on the verbosity level passed in.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
/// * `filter` - The name of the crate to filter the logs by.
pub fn setup_logger(verbosity: i32, filter: &str) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let directive_1 = format!("{filter}={log_level}")
        .parse()
        .expect("valid log level");
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(directive_1);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter)
        .pretty();
    logger.init();
    Ok(())
}
