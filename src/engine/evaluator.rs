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

//! Rule-based policy evaluation.
//!
//! Classifies a tool name as allowed or blocked using prefix allow-lists
//! and keyword block-lists merged from a global section and an optional
//! per-server override.

use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::core::errors::FirewallError;
use crate::core::models::{Decision, RuleFile, RuleSet};

/// Immutable classifier built once at startup.
///
/// Evaluation order:
///   1. Tool name starts with any allow prefix -> ALLOW.
///   2. Tool name contains any block keyword -> BLOCK.
///   3. Fallback to `default_action`.
///
/// All matching is case-insensitive.
pub struct PolicyEngine {
    allow_prefixes: Vec<String>,
    block_keywords: Vec<String>,
    default_action: Decision,
}

impl PolicyEngine {
    /// Load and parse a rule file from disk.
    pub fn load(path: &Path, server_name: Option<&str>) -> Result<Self, FirewallError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FirewallError::ConfigurationError(format!(
                "Rule file not found or unreadable: {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content, server_name)
    }

    /// Parse a rule file from a YAML string (YAML is a strict superset of
    /// JSON, so JSON rule files parse unchanged).
    pub fn from_yaml(content: &str, server_name: Option<&str>) -> Result<Self, FirewallError> {
        let rules: RuleFile = serde_yaml_ng::from_str(content).map_err(|e| {
            FirewallError::ConfigurationError(format!("Invalid rule file: {}", e))
        })?;
        Self::from_rules(rules, server_name)
    }

    /// Build the engine from an already-parsed rule structure.
    pub fn from_rules(rules: RuleFile, server_name: Option<&str>) -> Result<Self, FirewallError> {
        let (allow_prefixes, block_keywords, default_action) =
            Self::merge_rules(&rules, server_name)?;

        info!(
            server = server_name.unwrap_or("global-only"),
            prefixes = allow_prefixes.len(),
            keywords = block_keywords.len(),
            default = %default_action,
            "Policy engine initialized"
        );

        Ok(Self {
            allow_prefixes,
            block_keywords,
            default_action,
        })
    }

    /// Decide whether a tool call is allowed or must pause for approval.
    pub fn evaluate(&self, tool_name: &str) -> Decision {
        if tool_name.is_empty() {
            warn!("Empty tool name received - blocking by default");
            return Decision::Block;
        }

        let normalized = tool_name.to_lowercase();

        // 1. Allow-list check (prefix match)
        for prefix in &self.allow_prefixes {
            if normalized.starts_with(prefix.as_str()) {
                debug!(tool = tool_name, prefix = %prefix, "ALLOW (prefix match)");
                return Decision::Allow;
            }
        }

        // 2. Block-list check (substring match)
        for keyword in &self.block_keywords {
            if normalized.contains(keyword.as_str()) {
                debug!(tool = tool_name, keyword = %keyword, "BLOCK (keyword match)");
                return Decision::Block;
            }
        }

        // 3. Fallback
        debug!(tool = tool_name, default = %self.default_action, "Default action applied");
        self.default_action
    }

    /// Merge global rules with the optional per-server override.
    ///
    /// Override lists are appended to (not replacing) the global lists,
    /// then lowercased and deduplicated preserving first-seen order.
    fn merge_rules(
        rules: &RuleFile,
        server_name: Option<&str>,
    ) -> Result<(Vec<String>, Vec<String>, Decision), FirewallError> {
        let mut allow_prefixes = rules.global.allow_prefixes.clone();
        let mut block_keywords = rules.global.block_keywords.clone();
        let mut default_action = rules
            .global
            .default_action
            .clone()
            .unwrap_or_else(|| "block".to_string());

        if let Some(name) = server_name {
            match rules.servers.get(name) {
                Some(server_cfg) => {
                    allow_prefixes.extend(server_cfg.allow_prefixes.iter().cloned());
                    block_keywords.extend(server_cfg.block_keywords.iter().cloned());
                    if let Some(ref action) = server_cfg.default_action {
                        default_action = action.clone();
                    }
                    info!(server = name, "Merged server-specific rules");
                }
                None => {
                    warn!(
                        server = name,
                        "Server not found in rule file - using global rules only"
                    );
                }
            }
        }

        Ok((
            normalize(&allow_prefixes),
            normalize(&block_keywords),
            Decision::from_str(&default_action)?,
        ))
    }
}

/// Lowercase and deduplicate, keeping first-seen order.
fn normalize(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let lowered = v.to_lowercase();
        if !out.contains(&lowered) {
            out.push(lowered);
        }
    }
    out
}
