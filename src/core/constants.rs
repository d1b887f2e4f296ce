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

//! lilith-gate constants - Single source of truth for all configuration values.
//!
//! This module centralizes magic numbers, method names, and environment
//! variable names to ensure consistency and maintainability.

/// MCP Protocol Methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// The virtual confirmation tool injected into the target's tool list.
pub mod firewall {
    /// Reserved tool name. Must never collide with a real downstream tool.
    pub const CONFIRM_TOOL_NAME: &str = "firewall_confirm";
    /// Argument key carrying the one-time code.
    pub const CONFIRM_CODE_ARG: &str = "otp";
    /// Machine-checkable status marker in the soft-rejection payload.
    pub const STATUS_PAUSED: &str = "PAUSED_FOR_APPROVAL";
}

/// One-time approval code parameters
pub mod otp {
    /// Width of a generated code, in decimal digits.
    pub const CODE_LENGTH: usize = 4;
    /// Exclusive upper bound of the code space (10^CODE_LENGTH).
    pub const CODE_SPACE: u32 = 10_000;
    /// Seconds a pending action stays redeemable.
    pub const DEFAULT_TTL_SECS: u64 = 300;
    /// Wrong guesses tolerated before pending entries are locked out.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
    /// Collision-retry budget when generating a fresh code.
    pub const MAX_GENERATION_ATTEMPTS: u32 = 100;
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_LOG_LEVEL: &str = "LILITH_GATE_LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LILITH_GATE_LOG_FORMAT";
    pub const ENV_OTP_TTL_SECS: &str = "LILITH_GATE_OTP_TTL_SECS";
    pub const ENV_OTP_MAX_ATTEMPTS: &str = "LILITH_GATE_OTP_MAX_ATTEMPTS";
    pub const ENV_SHUTDOWN_GRACE_SECS: &str = "LILITH_GATE_SHUTDOWN_GRACE_SECS";
    pub const ENV_RULES_PATH: &str = "LILITH_GATE_RULES_PATH";

    /// Rule file auto-detected in the current working directory.
    pub const RULES_FILE_NAME: &str = "lilith-gate.yaml";
}

/// Proxy session parameters
pub mod session {
    /// Capacity of the per-direction event channels.
    pub const EVENT_BUFFER: usize = 32;
    /// Seconds to wait for the target to exit after SIGTERM.
    pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
    /// Seconds between periodic expiry sweeps of the pending store.
    pub const SWEEP_INTERVAL_SECS: u64 = 60;
}

/// Transport Limits (DoS Protection)
pub mod limits {
    /// Maximum allowed JSON-RPC message size (10 MB)
    pub const MAX_MESSAGE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
}
