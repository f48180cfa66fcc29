use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote repository as seen by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsRepo {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// `<namespace>/<slug>`, unique within a provider instance
    pub fullname: String,
    /// Web URL
    pub url: String,
    pub http_clone_url: String,
    pub ssh_clone_url: String,
    /// Link templates, `%s` is replaced by the hash, tag or branch
    pub url_commit_format: String,
    pub url_tag_format: String,
    pub url_branch_format: String,
}

impl VcsRepo {
    pub fn commit_url(&self, hash: &str) -> String {
        self.url_commit_format.replacen("%s", hash, 1)
    }

    pub fn tag_url(&self, tag: &str) -> String {
        self.url_tag_format.replacen("%s", tag, 1)
    }

    pub fn branch_url(&self, branch: &str) -> String {
        self.url_branch_format.replacen("%s", branch, 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsAuthor {
    pub name: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub slug: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsCommit {
    pub hash: String,
    pub author: VcsAuthor,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsBranch {
    pub id: String,
    pub display_id: String,
    pub latest_commit: String,
    pub default: bool,
    pub parents: Vec<String>,
}

/// Return the branch flagged as default, if any.
pub fn default_branch(branches: &[VcsBranch]) -> Option<&VcsBranch> {
    branches.iter().find(|b| b.default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsTag {
    pub tag: String,
    /// Provider-internal sha of the tag object
    pub sha: String,
    /// Hash of the targeted commit
    pub hash: String,
    pub message: String,
    pub tagger: VcsAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsPushEvent {
    pub repo: String,
    pub branch: VcsBranch,
    pub commit: VcsCommit,
    pub clone_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VcsPullRequestState {
    Open,
    Merged,
    Declined,
    All,
}

impl VcsPullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
            Self::All => "ALL",
        }
    }
}

impl std::str::FromStr for VcsPullRequestState {
    type Err = crate::errors::VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "MERGED" => Ok(Self::Merged),
            "DECLINED" | "CLOSED" => Ok(Self::Declined),
            "ALL" | "" => Ok(Self::All),
            other => Err(crate::errors::VcsError::WrongRequest(format!(
                "unknown pull request state '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsPullRequest {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub state: String,
    pub closed: bool,
    pub merged: bool,
    pub base: VcsPushEvent,
    pub head: VcsPushEvent,
    pub user: VcsAuthor,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsPullRequestCommentRequest {
    pub id: u64,
    pub message: String,
}

/// A webhook registration. The URL is the idempotency key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsHook {
    /// Provider assigned, empty until created
    pub id: String,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
    pub method: String,
    pub content_type: String,
}

/// Provider-side commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommitState {
    #[serde(rename = "INPROGRESS")]
    InProgress,
    Successful,
    Failed,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::InProgress => "INPROGRESS",
            CommitState::Successful => "SUCCESSFUL",
            CommitState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsCommitStatus {
    #[serde(rename = "ref")]
    pub ref_: String,
    pub state: CommitState,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Engine-side status the provider state maps back to
    pub decoded_state: super::status::BuildStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsContent {
    pub name: String,
    pub is_directory: bool,
    pub is_file: bool,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsRelease {
    pub id: i64,
    pub upload_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsBranchFilters {
    pub branch_name: String,
    pub default: bool,
}

impl VcsBranchFilters {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            branch_name: name.into(),
            default: false,
        }
    }

    pub fn default_branch() -> Self {
        Self {
            branch_name: String::new(),
            default: true,
        }
    }
}

/// Listing filter; a zero limit means "everything".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VcsBranchesFilter {
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InsightDataKind {
    Text,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsInsightData {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: InsightDataKind,
    pub value: serde_json::Value,
}

/// Provider-rendered build report attached to a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsInsight {
    pub title: String,
    pub detail: String,
    pub reporter: String,
    pub data: Vec<VcsInsightData>,
}

/// Status as pushed by the synchronizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsBuildStatus {
    pub title: String,
    pub description: String,
    pub url_cds: String,
    /// Stable status key, `{project}-{workflow}-{node}`
    pub context: String,
    pub status: String,
    pub repository_fullname: String,
    pub git_hash: String,
}
