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

//! lilith-gate: an OTP approval gate for MCP.
//!
//! This library provides the core logic for the lilith-gate middleware,
//! a transparent stdio proxy that intercepts Model Context Protocol (MCP)
//! tool calls and holds high-risk ones until a human supplies a one-time
//! approval code.

pub mod config;
pub mod core;
pub mod engine;
pub mod mcp;
pub mod state;
