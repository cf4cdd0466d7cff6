// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot authentication tokens, HMAC message signing, and a sliding-window
//! rate limiter.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use orc_core::{Clock, FatalError, OrchestratorError, RobotId};
use parking_lot::Mutex;
use rand::RngCore;
use sha2::Sha256;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub robot_id: RobotId,
    pub scopes: BTreeSet<String>,
    pub expires_at: std::time::Instant,
}

pub struct SecurityManager<C: Clock> {
    clock: C,
    default_ttl: Duration,
    hmac_secret: Vec<u8>,
    tokens: Mutex<HashMap<String, Token>>,
    rate_limits: Mutex<HashMap<String, VecDeque<std::time::Instant>>>,
    rate_limit_window: Duration,
    rate_limit_capacity: u32,
}

impl<C: Clock> SecurityManager<C> {
    pub fn new(
        clock: C,
        hmac_secret: Vec<u8>,
        default_ttl: Duration,
        rate_limit_window: Duration,
        rate_limit_capacity: u32,
    ) -> Self {
        Self {
            clock,
            default_ttl,
            hmac_secret,
            tokens: Mutex::new(HashMap::new()),
            rate_limits: Mutex::new(HashMap::new()),
            rate_limit_window,
            rate_limit_capacity,
        }
    }

    /// 32-byte URL-safe random token, default 24h TTL.
    pub fn issue_token(&self, robot_id: RobotId, scopes: BTreeSet<String>) -> Token {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let value = URL_SAFE_NO_PAD.encode(bytes);
        let token = Token { value: value.clone(), robot_id, scopes, expires_at: self.clock.now() + self.default_ttl };
        self.tokens.lock().insert(value, token.clone());
        token
    }

    /// Constant-time lookup; expired tokens are deleted lazily on access.
    pub fn validate_token(&self, value: &str) -> Option<Token> {
        let mut tokens = self.tokens.lock();
        let now = self.clock.now();

        let mut found: Option<Token> = None;
        for (stored_value, token) in tokens.iter() {
            if constant_time_eq(stored_value.as_bytes(), value.as_bytes()) {
                found = Some(token.clone());
                break;
            }
        }

        match found {
            Some(token) if token.expires_at > now => Some(token),
            Some(token) => {
                tokens.remove(&token.value);
                None
            }
            None => None,
        }
    }

    pub fn revoke_token(&self, value: &str) -> bool {
        self.tokens.lock().remove(value).is_some()
    }

    pub fn revoke_robot(&self, robot_id: RobotId) -> usize {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, t| t.robot_id != robot_id);
        before - tokens.len()
    }

    /// Hex-encoded `HMAC-SHA256(secret, message)`.
    pub fn sign(&self, message: &[u8]) -> Result<String, OrchestratorError> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.hmac_secret)
            .map_err(|e| FatalError::CorruptState(format!("invalid HMAC key: {e}")))?;
        mac.update(message);
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }

    /// Constant-time comparison against a freshly computed signature.
    /// Returns `false`, rather than propagating, if the signature itself
    /// cannot be computed.
    pub fn verify(&self, message: &[u8], signature: &str) -> bool {
        match self.sign(message) {
            Ok(expected) => constant_time_eq(expected.as_bytes(), signature.as_bytes()),
            Err(_) => false,
        }
    }

    /// True iff `identity` has issued fewer than `rate_limit_capacity`
    /// requests within the trailing `rate_limit_window`; records this
    /// call as a request when allowed.
    pub fn check_rate_limit(&self, identity: &str) -> bool {
        let now = self.clock.now();
        let mut limits = self.rate_limits.lock();
        let window = limits.entry(identity.to_string()).or_default();

        while let Some(front) = window.front() {
            if now.duration_since(*front) > self.rate_limit_window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() as u32 >= self.rate_limit_capacity {
            return false;
        }
        window.push_back(now);
        true
    }
}

/// Hand-rolled since no constant-time-compare crate is in the dependency
/// stack; XORs every byte regardless of an early mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
