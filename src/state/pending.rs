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

//! In-memory pending-action store.
//!
//! Maps one-time approval codes to blocked tool calls so they can be
//! resumed after explicit user approval. Entries are single-use,
//! time-limited, and locked out after wrong guesses.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::core::constants::otp;
use crate::core::errors::FirewallError;

/// Record of a blocked tool call awaiting user confirmation.
///
/// Only `attempt_count` ever mutates; everything else is fixed at creation.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub code: String,
    pub created_at: Instant,
    /// Failed validation attempts against any sibling entry since creation.
    pub attempt_count: u32,
}

/// Concurrent store mapping approval codes to pending tool-call actions.
///
/// Every operation takes the single store-wide lock; critical sections are
/// bounded by the pending-entry count, which stays small in practice
/// (human-approval-rate bounded).
pub struct PendingActionStore {
    entries: Mutex<HashMap<String, PendingAction>>,
    ttl: Duration,
    max_attempts: u32,
}

impl Default for PendingActionStore {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(otp::DEFAULT_TTL_SECS),
            otp::DEFAULT_MAX_ATTEMPTS,
        )
    }
}

impl PendingActionStore {
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_attempts,
        }
    }

    /// Store a pending action and return the generated code.
    ///
    /// Fails with [`FirewallError::CodeSpaceExhausted`] if no collision-free
    /// code is found within the attempt budget; that signals the pending set
    /// has grown pathologically large and must not be retried automatically.
    pub fn create(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, FirewallError> {
        if tool_name.is_empty() {
            return Err(FirewallError::ValidationError(
                "tool_name must be a non-empty string".to_string(),
            ));
        }

        let mut entries = self.lock();
        let code = Self::generate_unique_code(&entries)?;
        entries.insert(
            code.clone(),
            PendingAction {
                tool_name: tool_name.to_string(),
                arguments,
                code: code.clone(),
                created_at: Instant::now(),
                attempt_count: 0,
            },
        );
        Ok(code)
    }

    /// Validate a code and return the pending action if it matches.
    ///
    /// A matching entry is removed on return, so each code satisfies at most
    /// one `validate` call. A wrong (non-empty) code increments the attempt
    /// counter on every pending entry - the store cannot know which action
    /// the human meant to approve - and permanently removes each entry whose
    /// counter reaches the configured maximum.
    pub fn validate(&self, code: &str) -> Option<PendingAction> {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries);

        if code.is_empty() {
            return None;
        }

        if let Some(action) = entries.remove(code) {
            return Some(action);
        }

        // Wrong code: penalize every pending entry.
        let before = entries.len();
        for action in entries.values_mut() {
            action.attempt_count += 1;
        }
        let max = self.max_attempts;
        entries.retain(|_, action| action.attempt_count < max);
        let locked_out = before - entries.len();
        if locked_out > 0 {
            warn!(
                locked_out,
                "Wrong approval code - pending actions locked out"
            );
        }
        None
    }

    /// Remove entries older than the configured TTL; returns how many.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries)
    }

    /// Number of live (non-expired) pending actions.
    pub fn pending_count(&self) -> usize {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries);
        entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingAction>> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the map itself is still structurally sound.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep_locked(&self, entries: &mut HashMap<String, PendingAction>) -> usize {
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, action| action.created_at.elapsed() <= ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Expired pending actions swept");
        }
        removed
    }

    /// Generate a fixed-width numeric code not already present in the map.
    fn generate_unique_code(
        entries: &HashMap<String, PendingAction>,
    ) -> Result<String, FirewallError> {
        let mut rng = rand::rng();
        for _ in 0..otp::MAX_GENERATION_ATTEMPTS {
            let code = format!(
                "{:0width$}",
                rng.random_range(0..otp::CODE_SPACE),
                width = otp::CODE_LENGTH
            );
            if !entries.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(FirewallError::CodeSpaceExhausted {
            attempts: otp::MAX_GENERATION_ATTEMPTS,
        })
    }
}
