//! Execution status of a stack within one command.

use serde::{Deserialize, Serialize};

/// Per-stack execution status.
///
/// Transitions are monotonic: `Pending -> InProgress -> {Complete | Failed}`.
/// A stack skipped because of a failed dependency goes straight from
/// `Pending` to `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// Not yet considered.
    #[default]
    Pending,
    /// Action dispatched and running.
    InProgress,
    /// Action finished successfully.
    Complete,
    /// Action failed, or a dependency did not complete.
    Failed,
}

impl StackStatus {
    /// Returns true for `Complete` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` respects the state machine.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress | Self::Failed)
                | (Self::InProgress, Self::Complete | Self::Failed)
        )
    }

    /// Maps a provider status string to a simplified status.
    ///
    /// `*_ROLLBACK_COMPLETE` counts as failed even though it ends in `_COMPLETE`.
    #[must_use]
    pub fn from_provider_status(status: &str) -> Self {
        let status = status.trim().to_ascii_uppercase();
        if status.ends_with("ROLLBACK_COMPLETE") || status.ends_with("_FAILED") {
            Self::Failed
        } else if status.ends_with("_COMPLETE") {
            Self::Complete
        } else if status.ends_with("_IN_PROGRESS") {
            Self::InProgress
        } else {
            Self::Pending
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(StackStatus::Pending.can_transition_to(StackStatus::InProgress));
        assert!(StackStatus::Pending.can_transition_to(StackStatus::Failed));
        assert!(StackStatus::InProgress.can_transition_to(StackStatus::Complete));
        assert!(!StackStatus::Complete.can_transition_to(StackStatus::InProgress));
        assert!(!StackStatus::Failed.can_transition_to(StackStatus::Complete));
        assert!(!StackStatus::Pending.can_transition_to(StackStatus::Complete));
    }

    #[test]
    fn test_provider_status_mapping() {
        assert_eq!(StackStatus::from_provider_status("CREATE_COMPLETE"), StackStatus::Complete);
        assert_eq!(
            StackStatus::from_provider_status("UPDATE_ROLLBACK_COMPLETE"),
            StackStatus::Failed
        );
        assert_eq!(StackStatus::from_provider_status("ROLLBACK_COMPLETE"), StackStatus::Failed);
        assert_eq!(StackStatus::from_provider_status("DELETE_FAILED"), StackStatus::Failed);
        assert_eq!(
            StackStatus::from_provider_status("UPDATE_IN_PROGRESS"),
            StackStatus::InProgress
        );
        assert_eq!(StackStatus::from_provider_status("REVIEW"), StackStatus::Pending);
    }
}
