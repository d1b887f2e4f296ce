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

// Domain error types - anything recoverable becomes a protocol-level
// response instead; these variants cover the genuinely fatal or
// caller-reportable conditions.

use thiserror::Error;

/// Main error type for the gate.
#[derive(Error, Debug)]
pub enum FirewallError {
    /// Bad or missing rule file, invalid default_action, malformed YAML.
    /// Fatal at startup.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Invalid caller-supplied value (e.g. empty tool name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No collision-free code could be generated within the attempt budget.
    /// The pending set has grown pathologically large; do not retry.
    #[error("Code space exhausted after {attempts} attempts; too many pending approvals")]
    CodeSpaceExhausted { attempts: u32 },

    /// Target process management error.
    #[error("Process error: {0}")]
    ProcessError(String),

    /// I/O Error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
