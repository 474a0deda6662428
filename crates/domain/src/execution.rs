//! Execution outcomes — what happened to one run of an entity's script.

use serde::{Deserialize, Serialize};

/// Why a single run failed. Fatal to that run only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The runner stopped waiting after the configured timeout.
    #[error("script timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The script raised an error; the message is kept verbatim.
    #[error("{message}")]
    Script { message: String },

    /// The execution context could not be assembled (state provider failure).
    #[error("execution context unavailable: {message}")]
    Context { message: String },
}

/// Result of one execution as recorded by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed,
    Failed {
        error: ExecutionError,
    },
    /// The failure streak reached the configured threshold and scheduling was disabled.
    Disabled {
        failures: u32,
        error: ExecutionError,
    },
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            Self::Completed => None,
            Self::Failed { error } | Self::Disabled { error, .. } => Some(error),
        }
    }
}

/// What started an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Timer,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_script_message_verbatim() {
        let err = ExecutionError::Script {
            message: "boom at line 3".to_string(),
        };
        assert_eq!(err.to_string(), "boom at line 3");
    }

    #[test]
    fn should_describe_timeout_in_milliseconds() {
        let err = ExecutionError::Timeout { timeout_ms: 10_000 };
        assert_eq!(err.to_string(), "script timed out after 10000 ms");
    }

    #[test]
    fn should_expose_error_of_disabled_outcome() {
        let outcome = ExecutionOutcome::Disabled {
            failures: 5,
            error: ExecutionError::Timeout { timeout_ms: 1 },
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.error(), Some(&ExecutionError::Timeout { timeout_ms: 1 }));
    }

    #[test]
    fn should_serialize_outcome_with_tag() {
        let json = serde_json::to_value(ExecutionOutcome::Failed {
            error: ExecutionError::Script {
                message: "nope".to_string(),
            },
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "outcome": "failed",
                "error": { "kind": "script", "message": "nope" }
            })
        );
    }
}
