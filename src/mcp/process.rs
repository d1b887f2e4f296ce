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

//! Target process management with zombie-process protection.
//!
//! The gate owns exactly one target subprocess per session. On Linux the
//! child is bound to the parent via PR_SET_PDEATHSIG so a crashed gate
//! cannot leave an orphaned tool server behind.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::core::errors::FirewallError;

pub struct ProcessSupervisor {
    pub child: Child,
}

impl ProcessSupervisor {
    pub fn spawn(cmd: &str, args: &[String]) -> Result<Self, FirewallError> {
        debug!("ProcessSupervisor: spawning '{}' with args {:?}", cmd, args);

        let mut command = Command::new(cmd);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "linux")]
        unsafe {
            use std::os::unix::process::CommandExt;
            command.pre_exec(|| {
                // Send SIGKILL to the child if the gate dies
                let ret = libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL);
                if ret != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(|e| {
            FirewallError::ProcessError(format!("Failed to spawn target process: {}", e))
        })?;

        Ok(Self { child })
    }

    /// Ask the target to exit gracefully, escalating to SIGKILL after the
    /// grace period. Returns once the child has been fully reaped.
    pub async fn shutdown(&mut self, grace: Duration) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Target already exited: {}", status);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll target status: {}", e);
            }
        }

        self.terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Target exited: {}", status),
            Ok(Err(e)) => warn!("Failed to reap target: {}", e),
            Err(_) => {
                warn!("Target did not exit within {:?} - killing", grace);
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill target: {}", e);
                }
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to target: {}", e);
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self) {
        // No graceful signal on this platform; the timeout path kills.
    }
}
