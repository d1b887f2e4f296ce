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

//! Domain models for the lilith-gate middleware.
//!
//! Pure data structures representing rule files, policy decisions, and
//! JSON-RPC envelopes. Free of I/O side effects.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::FirewallError;

/// Result of evaluating a tool name against the gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
}

impl FromStr for Decision {
    type Err = FirewallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Decision::Allow),
            "block" => Ok(Decision::Block),
            other => Err(FirewallError::ConfigurationError(format!(
                "Invalid default_action '{}'. Must be one of: allow, block",
                other
            ))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Block => write!(f, "block"),
        }
    }
}

/// One prefix/keyword rule section, either the global one or a per-server
/// override. Override lists EXTEND the global lists; an override
/// `default_action` replaces the global one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub allow_prefixes: Vec<String>,
    #[serde(default)]
    pub block_keywords: Vec<String>,
    #[serde(default)]
    pub default_action: Option<String>,
}

/// Parsed rule file: a required global section plus optional per-server
/// overrides keyed by target identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub global: RuleSet,
    #[serde(default)]
    pub servers: HashMap<String, RuleSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
