//! Pending and historical record actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An indexing action.
///
/// Used both as the pending instruction on a record (`next_action`) and as the
/// historical fact of what was last pushed (`last_action`). The set is closed:
/// storage values outside it are rejected rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[default]
    #[serde(rename = "")]
    NoAction,
}

impl Action {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::NoAction => "",
        }
    }

    /// Whether this action requires a remote call.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !matches!(self, Action::NoAction)
    }

    /// Whether the target is present in the remote index after this action
    /// has been executed successfully.
    #[must_use]
    pub const fn leaves_indexed(&self) -> bool {
        matches!(self, Action::Add | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoAction => f.write_str("no_action"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for Action {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Action::Add),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "" | "no_action" => Ok(Action::NoAction),
            other => Err(crate::Error::InvalidAction(other.to_string())),
        }
    }
}
