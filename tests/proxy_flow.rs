//! End-to-end tests driving the real binary over piped stdio.
//!
//! The target is `cat`, which echoes every forwarded line back verbatim.
//! A forwarded request therefore comes back as a "response" bearing the
//! same id, which is enough to observe exactly what the gate forwarded,
//! what it answered locally, and what it rewrote.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use serde_json::{json, Value};

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

struct Gate {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl Gate {
    fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    fn spawn_with_env(env: &[(&str, &str)]) -> Self {
        let bin = env!("CARGO_BIN_EXE_lilith-gate");
        let mut cmd = Command::new(bin);
        cmd.arg("--target-cmd")
            .arg("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        for (key, value) in env {
            cmd.env(key, value);
        }
        let mut child = cmd.spawn().expect("failed to spawn gate");

        let stdin = child.stdin.take().expect("gate stdin");
        let stdout = child.stdout.take().expect("gate stdout");

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Gate {
            child,
            stdin,
            lines: rx,
        }
    }

    fn send(&mut self, msg: &Value) {
        self.send_raw(&msg.to_string());
    }

    fn send_raw(&mut self, line: &str) {
        self.stdin
            .write_all(format!("{}\n", line).as_bytes())
            .expect("write to gate stdin");
        self.stdin.flush().expect("flush gate stdin");
    }

    fn recv_line(&self) -> String {
        self.lines
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for gate output")
    }

    fn recv(&self) -> Value {
        let line = self.recv_line();
        serde_json::from_str(&line).unwrap_or_else(|e| panic!("invalid JSON '{}': {}", line, e))
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// The paused payload embeds the code in the instruction text; it is the
/// only run of exactly four consecutive digits there.
fn extract_code(instruction: &str) -> String {
    let chars: Vec<char> = instruction.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                return chars[start..i].iter().collect();
            }
        } else {
            i += 1;
        }
    }
    panic!("no 4-digit code found in: {}", instruction);
}

fn paused_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("content text");
    serde_json::from_str(text).expect("payload should be JSON")
}

// --- Tests ---

#[test]
fn allowed_tool_is_forwarded_unmodified() {
    let mut gate = Gate::spawn();

    let request = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "get_balance", "arguments": {} },
    });
    gate.send(&request);

    // cat echoes the forwarded request straight back
    let echoed = gate.recv();
    assert_eq!(echoed["id"], 2);
    assert_eq!(echoed["method"], "tools/call");
    assert_eq!(echoed["params"]["name"], "get_balance");
}

#[test]
fn blocked_tool_pauses_then_valid_code_replays() {
    let mut gate = Gate::spawn();

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "delete_user", "arguments": { "id": 42 } },
    }));

    // Answered locally, never forwarded
    let response = gate.recv();
    assert_eq!(response["id"], 2);
    let payload = paused_payload(&response);
    assert_eq!(payload["status"], "PAUSED_FOR_APPROVAL");
    assert_eq!(payload["action"]["tool"], "delete_user");
    assert_eq!(payload["action"]["arguments"]["id"], 42);

    let code = extract_code(payload["instruction"].as_str().unwrap());

    // Confirm: the original call is replayed under the confirmation id
    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": { "name": "firewall_confirm", "arguments": { "otp": code } },
    }));

    let replayed = gate.recv();
    assert_eq!(replayed["id"], 3);
    assert_eq!(replayed["method"], "tools/call");
    assert_eq!(replayed["params"]["name"], "delete_user");
    assert_eq!(replayed["params"]["arguments"]["id"], 42);
}

#[test]
fn wrong_code_is_rejected_and_nothing_is_forwarded() {
    let mut gate = Gate::spawn();

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "delete_user", "arguments": { "id": 7 } },
    }));
    let _ = gate.recv(); // paused response

    // Five digits can never match a generated code
    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": { "name": "firewall_confirm", "arguments": { "otp": "99999" } },
    }));

    let rejection = gate.recv();
    assert_eq!(rejection["id"], 3);
    assert_eq!(rejection["result"]["isError"], true);
    assert!(rejection["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Invalid or expired code"));

    // The next thing to come back must be the echo of a fresh allowed call,
    // proving the wrong code forwarded nothing
    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": { "name": "get_balance", "arguments": {} },
    }));
    let echoed = gate.recv();
    assert_eq!(echoed["id"], 4);
}

#[test]
fn missing_code_asks_the_user_again() {
    let mut gate = Gate::spawn();

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "firewall_confirm", "arguments": {} },
    }));

    let response = gate.recv();
    assert_eq!(response["id"], 2);
    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Missing 'otp'"));
}

#[test]
fn tools_list_response_gains_the_confirm_tool() {
    let mut gate = Gate::spawn();

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/list",
        "params": {},
    }));

    // cat echoes the request; the gate still correlates the id and injects
    // the virtual tool into the (created) result
    let response = gate.recv();
    assert_eq!(response["id"], 1);
    let tools = response["result"]["tools"].as_array().unwrap();
    let confirm_count = tools
        .iter()
        .filter(|t| t["name"] == "firewall_confirm")
        .count();
    assert_eq!(confirm_count, 1);
}

#[test]
fn non_json_lines_pass_through_both_directions() {
    let mut gate = Gate::spawn();

    gate.send_raw("hello protocol preamble");

    // Forwarded verbatim to cat, echoed, relayed verbatim back
    assert_eq!(gate.recv_line(), "hello protocol preamble");
}

#[test]
fn expired_code_is_rejected() {
    let mut gate = Gate::spawn_with_env(&[("LILITH_GATE_OTP_TTL_SECS", "0")]);

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "delete_user", "arguments": {} },
    }));
    let payload = paused_payload(&gate.recv());
    let code = extract_code(payload["instruction"].as_str().unwrap());

    std::thread::sleep(Duration::from_millis(50));

    gate.send(&json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": { "name": "firewall_confirm", "arguments": { "otp": code } },
    }));

    let rejection = gate.recv();
    assert_eq!(rejection["id"], 3);
    assert_eq!(rejection["result"]["isError"], true);
}

#[test]
fn notifications_are_forwarded_without_correlation() {
    let mut gate = Gate::spawn();

    gate.send(&json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized",
    }));

    let echoed = gate.recv();
    assert_eq!(echoed["method"], "notifications/initialized");
    assert!(echoed.get("id").is_none());
}
