//! Store scopes and the credentials bound to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A host store view. Each API key is bound to exactly one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub id: u32,
    pub code: String,
}

impl Scope {
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.id)
    }
}

/// Account credentials for the remote indexing API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub js_api_key: String,
    pub rest_auth_key: String,
}

impl AccountCredentials {
    pub fn new(js_api_key: impl Into<String>, rest_auth_key: impl Into<String>) -> Self {
        Self {
            js_api_key: js_api_key.into(),
            rest_auth_key: rest_auth_key.into(),
        }
    }
}

// The REST key is a secret; keep it out of logs.
impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("js_api_key", &self.js_api_key)
            .field("rest_auth_key", &"********")
            .finish()
    }
}
