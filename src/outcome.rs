use serde::{Serialize, Serializer};
use serde_json::json;

use crate::Result;

/// Structured result handed back across a tool-call boundary.
///
/// Failures become data carrying the error message instead of propagating.
/// Serializes to the same shape as [`CallOutcome::to_json`].
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome {
    Success { data: serde_json::Value },
    Failed { error: String },
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// `{"ok": true, "data": ...}` or `{"ok": false, "error": "..."}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Success { data } => json!({ "ok": true, "data": data }),
            Self::Failed { error } => json!({ "ok": false, "error": error }),
        }
    }
}

impl Serialize for CallOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<T: Serialize> From<Result<T>> for CallOutcome {
    fn from(result: Result<T>) -> Self {
        match result.map(serde_json::to_value) {
            Ok(Ok(data)) => Self::Success { data },
            Ok(Err(err)) => Self::Failed {
                error: format!("failed to encode result: {err}"),
            },
            Err(err) => Self::Failed {
                error: err.to_string(),
            },
        }
    }
}
