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

//! Background reader tasks feeding the proxy's event loop.
//!
//! Each stream gets its own task that reads one line at a time and emits
//! typed events over an mpsc channel. Lines that are not JSON objects are
//! surfaced as raw passthrough events rather than errors - protocol
//! preambles the gate does not understand must still flow.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::error;

use crate::core::constants::limits;

/// Messages arriving from the agent (our stdin).
#[derive(Debug)]
pub enum AgentEvent {
    /// Parsed JSON object message.
    Message(Value),
    /// Non-JSON line, forwarded verbatim to the target.
    Raw(String),
    /// Agent stream closed (EOF) or hit a fatal framing condition.
    Disconnect,
}

/// Messages arriving from the target process.
#[derive(Debug)]
pub enum TargetEvent {
    /// Parsed JSON object message.
    Message(Value),
    /// Non-JSON line, forwarded verbatim to the agent.
    Raw(String),
    /// Unstructured log line from the target's stderr.
    Log(String),
    /// Target stdout closed - the process is gone or going.
    Disconnect,
}

/// Spawns a background task reading agent messages from our stdin.
pub fn spawn_agent_reader<R>(stream: R, tx: mpsc::Sender<AgentEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(n) if n as u64 > limits::MAX_MESSAGE_SIZE_BYTES => {
                    error!(
                        "Agent message exceeded size limit of {} bytes",
                        limits::MAX_MESSAGE_SIZE_BYTES
                    );
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let event = classify(line);
                    let sent = match event {
                        Line::Json(v) => tx.send(AgentEvent::Message(v)).await,
                        Line::Raw(s) => tx.send(AgentEvent::Raw(s)).await,
                    };
                    if sent.is_err() {
                        return; // Proxy loop is gone.
                    }
                }
                Err(e) => {
                    error!("Agent stdin read error: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(AgentEvent::Disconnect).await;
    });
}

/// Spawns a background task reading target messages from the child's stdout.
pub fn spawn_target_reader<R>(stream: R, tx: mpsc::Sender<TargetEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(n) if n as u64 > limits::MAX_MESSAGE_SIZE_BYTES => {
                    error!(
                        "Target message exceeded size limit of {} bytes",
                        limits::MAX_MESSAGE_SIZE_BYTES
                    );
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let sent = match classify(line) {
                        Line::Json(v) => tx.send(TargetEvent::Message(v)).await,
                        Line::Raw(s) => tx.send(TargetEvent::Raw(s)).await,
                    };
                    if sent.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("Target stdout read error: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(TargetEvent::Disconnect).await;
    });
}

/// Spawns a background task draining the target's stderr into our
/// diagnostics, never the protocol stream. Stderr closing means the
/// process is gone or going, so it tears the session down like stdout.
pub fn spawn_target_stderr_drain<R>(stream: R, tx: mpsc::Sender<TargetEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break, // Pipe closed
                Ok(_) => {
                    let log_msg = line.trim().to_string();
                    if !log_msg.is_empty() && tx.send(TargetEvent::Log(log_msg)).await.is_err() {
                        return;
                    }
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(TargetEvent::Disconnect).await;
    });
}

enum Line {
    Json(Value),
    Raw(String),
}

/// A line is a protocol message only if it parses as a JSON object;
/// anything else passes through untouched.
fn classify(line: String) -> Line {
    match serde_json::from_str::<Value>(&line) {
        Ok(v) if v.is_object() => Line::Json(v),
        _ => Line::Raw(line),
    }
}
