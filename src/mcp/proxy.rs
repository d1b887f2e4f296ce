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

//! The interposing gate proxy (Actor Model).
//!
//! Architecture:
//! - `agent reader`: reads client JSON-RPC lines from our stdin.
//! - `target reader`: reads tool JSON-RPC lines from the child's stdout.
//! - `stderr drain`: relays the child's stderr into our diagnostics.
//! - `FirewallProxy` (main loop): central actor that
//!   - routes messages between agent and target,
//!   - enforces the approval policy on `tools/call`,
//!   - correlates `tools/list` responses for augmentation,
//!   - answers the virtual `firewall_confirm` tool locally.
//!
//! The main loop is the only writer to either outbound stream, so line
//! framing is never interleaved and per-direction ordering holds by
//! construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::constants::{firewall, methods, session};
use crate::core::models::{Decision, JsonRpcResponse};
use crate::engine::PolicyEngine;
use crate::mcp::pipeline::{self, AgentEvent, TargetEvent};
use crate::mcp::process::ProcessSupervisor;
use crate::state::PendingActionStore;

pub struct FirewallProxy {
    target_cmd: String,
    target_args: Vec<String>,
    policy: PolicyEngine,
    store: PendingActionStore,
    config: Arc<Config>,
    session_id: String,

    // Actor state
    supervisor: Option<ProcessSupervisor>,
    target_stdin: Option<ChildStdin>,
    /// Map in-flight request id -> originating method, so responses can be
    /// recognized (only tools/list lookups are acted upon).
    pending_requests: HashMap<String, String>,
}

impl FirewallProxy {
    pub fn new(
        target_cmd: String,
        target_args: Vec<String>,
        policy: PolicyEngine,
        store: PendingActionStore,
        config: Arc<Config>,
    ) -> Self {
        Self {
            target_cmd,
            target_args,
            policy,
            store,
            config,
            session_id: Uuid::new_v4().to_string(),
            supervisor: None,
            target_stdin: None,
            pending_requests: HashMap::new(),
        }
    }

    /// Spawn the target and pump messages until either side goes away.
    ///
    /// Returns (or re-raises) only after the target process has been fully
    /// reaped, so no exit path leaves an orphaned subprocess.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "lilith-gate session {} wrapping: {} {:?}",
            self.session_id, self.target_cmd, self.target_args
        );

        let mut supervisor = ProcessSupervisor::spawn(&self.target_cmd, &self.target_args)
            .context("Failed to spawn target")?;
        self.target_stdin = supervisor.child.stdin.take();

        let (tx_agent, mut rx_agent) = mpsc::channel(session::EVENT_BUFFER);
        let (tx_target, mut rx_target) = mpsc::channel(session::EVENT_BUFFER);

        if let Some(stdout) = supervisor.child.stdout.take() {
            pipeline::spawn_target_reader(stdout, tx_target.clone());
        }
        if let Some(stderr) = supervisor.child.stderr.take() {
            pipeline::spawn_target_stderr_drain(stderr, tx_target.clone());
        }
        drop(tx_target);
        pipeline::spawn_agent_reader(tokio::io::stdin(), tx_agent);

        self.supervisor = Some(supervisor);

        let result = self.pump_loop(&mut rx_agent, &mut rx_target).await;

        if let Some(mut supervisor) = self.supervisor.take() {
            supervisor.shutdown(self.config.shutdown_grace).await;
        }
        result
    }

    async fn pump_loop(
        &mut self,
        rx_agent: &mut mpsc::Receiver<AgentEvent>,
        rx_target: &mut mpsc::Receiver<TargetEvent>,
    ) -> Result<()> {
        let mut agent_writer = tokio::io::stdout();
        let mut sweep =
            tokio::time::interval(Duration::from_secs(session::SWEEP_INTERVAL_SECS));
        sweep.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                // --- Agent (client) events ---
                event = rx_agent.recv() => match event {
                    Some(AgentEvent::Message(msg)) => {
                        self.handle_agent_message(msg, &mut agent_writer).await?;
                    }
                    Some(AgentEvent::Raw(line)) => {
                        warn!("Non-JSON line from agent: {:.200} - forwarding as-is", line);
                        self.send_line_to_target(&line).await?;
                    }
                    Some(AgentEvent::Disconnect) | None => {
                        info!("Agent stdin closed - shutting down");
                        break;
                    }
                },

                // --- Target (tool) events ---
                event = rx_target.recv() => match event {
                    Some(TargetEvent::Message(msg)) => {
                        self.handle_target_message(msg, &mut agent_writer).await?;
                    }
                    Some(TargetEvent::Raw(line)) => {
                        send_line_to_agent(&mut agent_writer, &line).await?;
                    }
                    Some(TargetEvent::Log(msg)) => {
                        debug!("[target stderr] {}", msg);
                    }
                    Some(TargetEvent::Disconnect) | None => {
                        // The agent is still attached; losing the target is a
                        // session failure, not a clean end.
                        anyhow::bail!("Target stream closed unexpectedly");
                    }
                },

                // --- Maintenance ---
                _ = sweep.tick() => {
                    let removed = self.store.cleanup_expired();
                    if removed > 0 {
                        debug!(removed, "Periodic sweep removed expired approvals");
                    }
                }

                // --- Signals ---
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down.");
                    break;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Agent -> Target direction
    // ------------------------------------------------------------------

    async fn handle_agent_message(
        &mut self,
        msg: Value,
        writer: &mut tokio::io::Stdout,
    ) -> Result<()> {
        let method = msg.get("method").and_then(Value::as_str).map(String::from);
        let request_id = msg.get("id").cloned().filter(|v| !v.is_null());

        match method.as_deref() {
            // Track tools/list requests so the response can be augmented
            Some(methods::TOOLS_LIST) => {
                if let Some(key) = request_id.as_ref().and_then(id_key) {
                    self.pending_requests.insert(key, methods::TOOLS_LIST.to_string());
                }
                self.send_to_target(&msg).await
            }
            Some(methods::TOOLS_CALL) => self.handle_tool_call(msg, writer).await,
            // Everything else passes through transparently
            _ => {
                if let (Some(m), Some(key)) =
                    (method.as_deref(), request_id.as_ref().and_then(id_key))
                {
                    self.pending_requests.insert(key, m.to_string());
                }
                self.send_to_target(&msg).await
            }
        }
    }

    /// Apply policy to a `tools/call` request.
    async fn handle_tool_call(
        &mut self,
        msg: Value,
        writer: &mut tokio::io::Stdout,
    ) -> Result<()> {
        let request_id = msg.get("id").cloned().unwrap_or(Value::Null);
        let params = msg.get("params");
        let tool_name = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let arguments = params
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or_else(|| json!({}));

        // The virtual confirmation tool is handled entirely locally
        if tool_name == firewall::CONFIRM_TOOL_NAME {
            return self
                .handle_firewall_confirm(request_id, &arguments, writer)
                .await;
        }

        match self.policy.evaluate(&tool_name) {
            Decision::Allow => {
                info!(tool = %tool_name, "ALLOW");
                self.send_to_target(&msg).await
            }
            Decision::Block => {
                warn!(tool = %tool_name, "BLOCK - pausing for approval");
                let response = match self.store.create(&tool_name, arguments.clone()) {
                    Ok(code) => build_soft_rejection(request_id, &tool_name, &arguments, &code),
                    Err(e) => {
                        error!("Failed to issue approval code: {}", e);
                        build_error_result(
                            request_id,
                            &format!(
                                "Could not issue an approval code: {}. Do not retry automatically.",
                                e
                            ),
                        )
                    }
                };
                send_response(writer, response).await
            }
        }
    }

    /// Process a `firewall_confirm` call.
    ///
    /// A valid code replays the original blocked call against the target
    /// under the confirmation request's id; the real result then flows back
    /// through the target pump. Everything else is answered locally with a
    /// content-level error so the agent can recover.
    async fn handle_firewall_confirm(
        &mut self,
        request_id: Value,
        arguments: &Value,
        writer: &mut tokio::io::Stdout,
    ) -> Result<()> {
        let code = arguments
            .get(firewall::CONFIRM_CODE_ARG)
            .and_then(Value::as_str)
            .unwrap_or_default();

        if code.is_empty() {
            let response = build_error_result(
                request_id,
                "Missing 'otp' argument. Ask the user for the code.",
            );
            return send_response(writer, response).await;
        }

        match self.store.validate(code) {
            None => {
                warn!("Approval code rejected");
                let response = build_error_result(
                    request_id,
                    "Invalid or expired code. Do not guess. Ask the user.",
                );
                send_response(writer, response).await
            }
            Some(action) => {
                info!(tool = %action.tool_name, "Approval code confirmed - replaying original call");
                let replay = json!({
                    "jsonrpc": "2.0",
                    "id": request_id,
                    "method": methods::TOOLS_CALL,
                    "params": {
                        "name": action.tool_name,
                        "arguments": action.arguments,
                    },
                });
                self.send_to_target(&replay).await
            }
        }
    }

    // ------------------------------------------------------------------
    // Target -> Agent direction
    // ------------------------------------------------------------------

    async fn handle_target_message(
        &mut self,
        msg: Value,
        writer: &mut tokio::io::Stdout,
    ) -> Result<()> {
        let mut msg = msg;

        if let Some(key) = msg.get("id").and_then(id_key) {
            if let Some(original_method) = self.pending_requests.remove(&key) {
                if original_method == methods::TOOLS_LIST {
                    msg = augment_tools_list(msg);
                }
            }
        }

        let line = serde_json::to_string(&msg)?;
        send_line_to_agent(writer, &line).await
    }

    // ------------------------------------------------------------------
    // I/O helpers
    // ------------------------------------------------------------------

    async fn send_to_target(&mut self, msg: &Value) -> Result<()> {
        let line = serde_json::to_string(msg)?;
        debug!("Writing to target: {}", line);
        self.send_line_to_target(&line).await
    }

    async fn send_line_to_target(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .target_stdin
            .as_mut()
            .context("Target stdin is closed")?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

async fn send_line_to_agent(writer: &mut tokio::io::Stdout, line: &str) -> Result<()> {
    debug!("Writing to agent: {}", line);
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn send_response(writer: &mut tokio::io::Stdout, response: JsonRpcResponse) -> Result<()> {
    let line = serde_json::to_string(&response)?;
    send_line_to_agent(writer, &line).await
}

/// Stringified form of a request id, usable as a correlation key.
/// Ids are strings or numbers per JSON-RPC; anything else is untrackable.
fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Descriptor for the virtual confirmation tool. Synthesized here, never
/// sourced from the target.
fn confirm_tool_descriptor() -> Value {
    json!({
        "name": firewall::CONFIRM_TOOL_NAME,
        "description": "Call this tool ONLY when the user provides the correct 4-digit approval code to confirm a paused action.",
        "inputSchema": {
            "type": "object",
            "properties": {
                "otp": {
                    "type": "string",
                    "description": "The 4-digit code provided by the user.",
                }
            },
            "required": ["otp"],
        },
    })
}

/// Inject the confirmation tool into a `tools/list` response, unless a tool
/// of that name is already advertised.
fn augment_tools_list(mut response: Value) -> Value {
    if let Some(obj) = response.as_object_mut() {
        let result = obj.entry("result").or_insert_with(|| json!({}));
        if let Some(result_obj) = result.as_object_mut() {
            let tools = result_obj.entry("tools").or_insert_with(|| json!([]));
            if let Some(list) = tools.as_array_mut() {
                let present = list.iter().any(|t| {
                    t.get("name").and_then(Value::as_str) == Some(firewall::CONFIRM_TOOL_NAME)
                });
                if !present {
                    list.push(confirm_tool_descriptor());
                    debug!("Injected {} into tools/list response", firewall::CONFIRM_TOOL_NAME);
                }
            }
        }
    }
    response
}

/// Build the structured PAUSED response instructing the agent to ask the
/// user for the approval code.
///
/// Arguments are echoed in the prompt so the human can verify exactly what
/// will be executed before typing the code.
fn build_soft_rejection(
    request_id: Value,
    tool_name: &str,
    arguments: &Value,
    code: &str,
) -> JsonRpcResponse {
    let args_summary = match arguments.as_object() {
        Some(o) if o.is_empty() => "(no arguments)".to_string(),
        _ => serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string()),
    };

    let payload = json!({
        "status": firewall::STATUS_PAUSED,
        "message": format!(
            "The action '{}' is HIGH RISK and has been locked by lilith-gate.",
            tool_name
        ),
        "action": {
            "tool": tool_name,
            "arguments": arguments,
        },
        "instruction": format!(
            "To unlock this action, you MUST ask the user for authorization.\n\n\
             1. Show the user the following and ask for approval:\n   \
             Tool: **{tool}**\n   Arguments:\n{args}\n\n\
             2. Tell the user: 'Please reply with approval code: **{code}**' \
             to allow this action, or say no to cancel.\n\
             3. STOP and wait for their reply.\n\
             4. When they reply with '{code}', call the '{confirm}' tool with that code.\n\
             5. If they say no or give a different code, do NOT retry.",
            tool = tool_name,
            args = args_summary,
            code = code,
            confirm = firewall::CONFIRM_TOOL_NAME,
        ),
    });

    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: Some(json!({
            "content": [
                {
                    "type": "text",
                    "text": serde_json::to_string_pretty(&payload)
                        .unwrap_or_else(|_| payload.to_string()),
                }
            ],
        })),
        error: None,
        id: request_id,
    }
}

/// Build a tool-result error response. Content-level, not a protocol error,
/// so the calling agent can relay the guidance and keep operating.
fn build_error_result(request_id: Value, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: Some(json!({
            "content": [
                {
                    "type": "text",
                    "text": format!("FIREWALL ERROR: {}", message),
                }
            ],
            "isError": true,
        })),
        error: None,
        id: request_id,
    }
}
