// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{config as cfg, otp, session};
use crate::core::errors::FirewallError;

/// Rule set compiled into the binary, used when no rule file is supplied
/// or auto-detected.
pub const DEFAULT_RULES: &str = include_str!("../config/default_rules.yaml");

#[derive(Debug, Clone)]
pub struct Config {
    pub rules_path: Option<PathBuf>,
    pub server_name: Option<String>,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
    pub otp_ttl: Duration,
    pub otp_max_attempts: u32,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, FirewallError> {
        Ok(Self {
            rules_path: env::var(cfg::ENV_RULES_PATH).ok().map(PathBuf::from),
            server_name: None,
            log_level: env::var(cfg::ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string()),
            log_format: env::var(cfg::ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string()),
            otp_ttl: Duration::from_secs(parse_env_u64(
                cfg::ENV_OTP_TTL_SECS,
                otp::DEFAULT_TTL_SECS,
            )?),
            otp_max_attempts: parse_env_u64(
                cfg::ENV_OTP_MAX_ATTEMPTS,
                u64::from(otp::DEFAULT_MAX_ATTEMPTS),
            )? as u32,
            shutdown_grace: Duration::from_secs(parse_env_u64(
                cfg::ENV_SHUTDOWN_GRACE_SECS,
                session::DEFAULT_SHUTDOWN_GRACE_SECS,
            )?),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules_path: None,
            server_name: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            otp_ttl: Duration::from_secs(otp::DEFAULT_TTL_SECS),
            otp_max_attempts: otp::DEFAULT_MAX_ATTEMPTS,
            shutdown_grace: Duration::from_secs(session::DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, FirewallError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse::<u64>().map_err(|_| {
            FirewallError::ConfigurationError(format!(
                "{} must be a non-negative integer, got '{}'",
                name, raw
            ))
        }),
    }
}

/// Resolve the rule file to load.
///
/// Resolution order: explicit path, then an auto-detected file in the
/// current working directory. `None` means the bundled [`DEFAULT_RULES`]
/// apply.
pub fn resolve_rules_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let cwd_rules = PathBuf::from(cfg::RULES_FILE_NAME);
    if cwd_rules.is_file() {
        return Some(cwd_rules);
    }
    None
}

/// Write a starter rule file to `dir` for the operator to customize.
/// Refuses to overwrite an existing file.
pub fn generate_rules_file(dir: &Path) -> Result<PathBuf, FirewallError> {
    let target = dir.join(cfg::RULES_FILE_NAME);
    if target.exists() {
        return Err(FirewallError::ConfigurationError(format!(
            "{} already exists. Remove it first.",
            target.display()
        )));
    }
    std::fs::write(&target, DEFAULT_RULES)?;
    Ok(target)
}
