//! Artifact locators and completion outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::task::TaskStatus;

/// Where a task's artifact lives in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocator {
    /// Object store key.
    pub key: String,
    /// Display name used in `Content-Disposition`.
    pub filename: String,
    /// Size in bytes as reported by the compute.
    pub size: u64,
}

/// Result attached to a successful task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Location of the produced artifact.
    pub artifact: ArtifactLocator,
    /// Free-form numeric counters reported by the compute.
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Number>,
}

/// A validated completion signal, ready to apply to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The compute produced an artifact.
    Success(TaskResult),
    /// The compute failed.
    Error {
        /// Human-readable failure reason.
        message: String,
    },
}

impl CompletionOutcome {
    /// The terminal status this outcome moves a task to.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Success(_) => TaskStatus::Success,
            Self::Error { .. } => TaskStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_status() {
        let ok = CompletionOutcome::Success(TaskResult {
            artifact: ArtifactLocator {
                key: "artifacts/a/out.bin".to_string(),
                filename: "out.bin".to_string(),
                size: 3,
            },
            metrics: BTreeMap::new(),
        });
        assert_eq!(ok.status(), TaskStatus::Success);

        let failed = CompletionOutcome::Error {
            message: "boom".to_string(),
        };
        assert_eq!(failed.status(), TaskStatus::Error);
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = TaskResult {
            artifact: ArtifactLocator {
                key: "k".to_string(),
                filename: "f".to_string(),
                size: 1,
            },
            metrics: BTreeMap::from([("pages".to_string(), serde_json::Number::from(4))]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["artifact"]["key"], "k");
        assert_eq!(json["metrics"]["pages"], 4);
    }
}
