//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists with the given rendering of its settings
    Present { details: Option<String> },
    /// Resource does not exist
    Absent,
    /// Resource exists but its settings drifted from the desired ones
    Modified { from: String, to: String },
    /// State cannot be determined (for example the endpoint is unreachable)
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Short lowercase label used in plan output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Present { .. } => "present",
            Self::Absent => "absent",
            Self::Modified { .. } => "drifted",
            Self::Unknown => "unknown",
        }
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified in place
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange => write!(f, "unchanged"),
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "updated"),
            Self::Removed => write!(f, "removed"),
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// A resource that failed to apply, kept for the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub resource_id: String,
    pub error: String,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Failed resources in completion order
    pub failures: Vec<Failure>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
        self.failures.extend(other.failures.iter().cloned());
    }

    /// Record the result of one resource
    pub fn record(&mut self, resource_id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { error } => {
                self.failed += 1;
                self.failures.push(Failure {
                    resource_id: resource_id.to_string(),
                    error: error.clone(),
                });
            }
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of resources applied concurrently within a stage
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
    /// Skip the remaining stages once a stage reports a failure
    pub stop_on_failure: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
            stop_on_failure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_failures() {
        let mut summary = ExecuteSummary::default();
        summary.record("role.app", &ApplyResult::Created);
        summary.record(
            "grant.app",
            &ApplyResult::Failed {
                error: "connection reset".into(),
            },
        );

        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 2);
        assert!(!summary.is_success());
        assert_eq!(summary.failures[0].resource_id, "grant.app");
    }

    #[test]
    fn test_merge() {
        let mut a = ExecuteSummary::default();
        a.record("database.app", &ApplyResult::Modified);
        let mut b = ExecuteSummary::default();
        b.record("role.app", &ApplyResult::Removed);
        b.record("role.old", &ApplyResult::Failed { error: "x".into() });

        a.merge(&b);
        assert_eq!(a.total_changes(), 2);
        assert_eq!(a.failures.len(), 1);
    }

    #[test]
    fn test_apply_result_display() {
        assert_eq!(ApplyResult::Modified.to_string(), "updated");
        assert_eq!(
            ApplyResult::Skipped {
                reason: "dry run".into()
            }
            .to_string(),
            "skipped: dry run"
        );
    }
}
