//! Outcomes of remote calls and discovery runs.

use serde::{Deserialize, Serialize};

/// Outcome of one remote call attempt.
///
/// `code` is the remote HTTP status, or a local code when the call failed
/// before a response was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    is_success: bool,
    code: u16,
    messages: Vec<String>,
}

impl SyncResult {
    pub fn success(code: u16, messages: Vec<String>) -> Self {
        Self {
            is_success: true,
            code,
            messages,
        }
    }

    pub fn failure(code: u16, messages: Vec<String>) -> Self {
        Self {
            is_success: false,
            code,
            messages,
        }
    }

    pub fn is_success(&self) -> bool {
        self.is_success
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Outcome of one discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryResult {
    is_success: bool,
    messages: Vec<String>,
}

impl DiscoveryResult {
    pub fn success(messages: Vec<String>) -> Self {
        Self {
            is_success: true,
            messages,
        }
    }

    pub fn failure(messages: Vec<String>) -> Self {
        Self {
            is_success: false,
            messages,
        }
    }

    pub fn is_success(&self) -> bool {
        self.is_success
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
