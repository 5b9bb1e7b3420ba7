// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Session verification.
//!
//! Sessions are issued elsewhere; the server only maps a presented token to
//! the user it belongs to.

use std::collections::HashMap;

pub trait SessionVerifier: Send + Sync {
    /// The user owning `token`, if the session is valid.
    fn verify(&self, token: &str) -> Option<String>;
}

/// Fixed token table, configured at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticSessions {
    tokens: HashMap<String, String>,
}

impl StaticSessions {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticSessions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        StaticSessions {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl SessionVerifier for StaticSessions {
    fn verify(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Parse a `KEY=VALUE` command-line pair (e.g. `--session tok=alice`).
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
