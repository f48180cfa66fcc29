use super::types::CommitState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal lifecycle status of a workflow node or job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildStatus {
    Pending,
    Waiting,
    Building,
    Checking,
    Success,
    Fail,
    Disabled,
    Skipped,
    Stopped,
    NeverBuilt,
    /// Anything the engine sent that this crate does not know about
    Unknown(String),
}

impl BuildStatus {
    pub const KNOWN: [BuildStatus; 10] = [
        BuildStatus::Pending,
        BuildStatus::Waiting,
        BuildStatus::Building,
        BuildStatus::Checking,
        BuildStatus::Success,
        BuildStatus::Fail,
        BuildStatus::Disabled,
        BuildStatus::Skipped,
        BuildStatus::Stopped,
        BuildStatus::NeverBuilt,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Pending => "Pending",
            BuildStatus::Waiting => "Waiting",
            BuildStatus::Building => "Building",
            BuildStatus::Checking => "Checking",
            BuildStatus::Success => "Success",
            BuildStatus::Fail => "Fail",
            BuildStatus::Disabled => "Disabled",
            BuildStatus::Skipped => "Skipped",
            BuildStatus::Stopped => "Stopped",
            BuildStatus::NeverBuilt => "Never Built",
            BuildStatus::Unknown(s) => s,
        }
    }

    /// Provider commit state for this status. Total: unknown values fail.
    pub fn commit_state(&self) -> CommitState {
        match self {
            BuildStatus::Success | BuildStatus::Skipped | BuildStatus::Disabled => {
                CommitState::Successful
            }
            BuildStatus::Waiting | BuildStatus::Building => CommitState::InProgress,
            _ => CommitState::Failed,
        }
    }

    /// Whether the node reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success
                | BuildStatus::Fail
                | BuildStatus::Stopped
                | BuildStatus::Skipped
                | BuildStatus::Disabled
        )
    }
}

impl From<&str> for BuildStatus {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => BuildStatus::Pending,
            "Waiting" => BuildStatus::Waiting,
            "Building" => BuildStatus::Building,
            "Checking" => BuildStatus::Checking,
            "Success" => BuildStatus::Success,
            "Fail" => BuildStatus::Fail,
            "Disabled" => BuildStatus::Disabled,
            "Skipped" => BuildStatus::Skipped,
            "Stopped" => BuildStatus::Stopped,
            "Never Built" => BuildStatus::NeverBuilt,
            other => BuildStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reverse projection used when reading statuses back from a provider
pub fn build_status_from_commit_state(state: CommitState) -> BuildStatus {
    match state {
        CommitState::Successful => BuildStatus::Success,
        CommitState::InProgress => BuildStatus::Building,
        CommitState::Failed => BuildStatus::Fail,
    }
}

/// `{project}-{workflow}-{node}`
pub fn status_key(project_key: &str, workflow_name: &str, node_name: &str) -> String {
    format!("{project_key}-{workflow_name}-{node_name}")
}
