//! Bitbucket Server REST payloads and their projection onto the canonical entities

use crate::vcs::status::build_status_from_commit_state;
use crate::vcs::{
    CommitState, VcsAuthor, VcsBranch, VcsCommit, VcsCommitStatus, VcsHook, VcsPullRequest,
    VcsPushEvent, VcsRepo, VcsTag,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Slug placed on cached lookups of emails that match no server account
pub const UNKNOWN_SLUG: &str = "unknownSlug";

fn default_true() -> bool {
    true
}

/// One page of a paged listing
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub start: usize,
    #[serde(rename = "isLastPage", default = "default_true")]
    pub is_last_page: bool,
    #[serde(rename = "nextPageStart")]
    pub next_page_start: Option<usize>,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: u64,
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub clone: Vec<Link>,
    #[serde(rename = "self", default)]
    pub self_link: Vec<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    pub project: Project,
    #[serde(default)]
    pub links: Links,
}

impl Repository {
    pub fn fullname(&self) -> String {
        format!("{}/{}", self.project.key, self.slug)
    }

    fn clone_url(&self, kind: &str) -> String {
        self.links
            .clone
            .iter()
            .find(|l| l.name == kind)
            .map(|l| l.href.clone())
            .unwrap_or_default()
    }

    pub fn to_vcs_repo(&self, base_url: &str) -> VcsRepo {
        let repo_url = format!(
            "{}/projects/{}/repos/{}",
            base_url, self.project.key, self.slug
        );
        let url = self
            .links
            .self_link
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{repo_url}/browse"));

        VcsRepo {
            id: self.id.to_string(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            fullname: self.fullname(),
            url,
            http_clone_url: self.clone_url("http"),
            ssh_clone_url: self.clone_url("ssh"),
            url_commit_format: format!("{repo_url}/commits/%s"),
            url_tag_format: format!("{repo_url}/browse?at=refs%2Ftags%2F%s"),
            url_branch_format: format!("{repo_url}/browse?at=refs%2Fheads%2F%s"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Branch {
    pub id: String,
    #[serde(rename = "displayId")]
    pub display_id: String,
    #[serde(rename = "latestCommit", default)]
    pub latest_commit: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

impl From<Branch> for VcsBranch {
    fn from(b: Branch) -> Self {
        VcsBranch {
            id: b.id,
            display_id: b.display_id,
            latest_commit: b.latest_commit,
            default: b.is_default,
            parents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    pub id: String,
    #[serde(rename = "displayId")]
    pub display_id: String,
    #[serde(rename = "latestCommit", default)]
    pub latest_commit: String,
    #[serde(default)]
    pub hash: Option<String>,
}

impl From<Tag> for VcsTag {
    fn from(t: Tag) -> Self {
        VcsTag {
            tag: t.display_id,
            sha: t.hash.unwrap_or_default(),
            hash: t.latest_commit,
            message: String::new(),
            tagger: VcsAuthor::default(),
        }
    }
}

/// Author block embedded in commits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "emailAddress", default)]
    pub email_address: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitParent {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub author: Author,
    #[serde(rename = "authorTimestamp", default)]
    pub author_timestamp: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parents: Vec<CommitParent>,
}

impl Commit {
    /// Canonical commit with author data taken from the embedded block only
    pub fn to_vcs_commit(&self, commit_url: String) -> VcsCommit {
        VcsCommit {
            hash: self.id.clone(),
            author: VcsAuthor {
                name: self.author.name.clone(),
                display_name: self
                    .author
                    .display_name
                    .clone()
                    .unwrap_or_else(|| self.author.name.clone()),
                email: self.author.email_address.clone(),
                avatar: None,
                slug: self.author.slug.clone(),
                id: None,
            },
            timestamp: self.author_timestamp,
            message: self.message.clone(),
            url: commit_url,
        }
    }
}

/// A server account, also the shape cached by email lookups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(rename = "emailAddress", default)]
    pub email_address: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl User {
    pub fn unknown(author: &Author) -> Self {
        Self {
            id: None,
            name: author.name.clone(),
            email_address: Some(author.email_address.clone()),
            display_name: Some(author.name.clone()),
            slug: Some(UNKNOWN_SLUG.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.slug.as_deref() == Some(UNKNOWN_SLUG)
    }

    /// Avatar URL, only for accounts with a real slug
    pub fn avatar_url(&self, base_url: &str) -> Option<String> {
        match self.slug.as_deref() {
            Some(slug) if !slug.is_empty() && slug != UNKNOWN_SLUG => {
                Some(format!("{base_url}/users/{slug}/avatar.png"))
            }
            _ => None,
        }
    }

    pub fn to_vcs_author(&self, base_url: &str) -> VcsAuthor {
        VcsAuthor {
            name: self.name.clone(),
            display_name: self.display_name.clone().unwrap_or_else(|| self.name.clone()),
            email: self.email_address.clone().unwrap_or_default(),
            avatar: self.avatar_url(base_url),
            slug: self.slug.clone().filter(|s| s != UNKNOWN_SLUG),
            id: self.id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestRef {
    pub id: String,
    #[serde(rename = "displayId", default)]
    pub display_id: String,
    #[serde(rename = "latestCommit", default)]
    pub latest_commit: String,
    pub repository: Repository,
}

impl PullRequestRef {
    fn to_push_event(&self, base_url: &str) -> VcsPushEvent {
        let repo = self.repository.to_vcs_repo(base_url);
        let branch_name = self
            .id
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.id)
            .to_string();
        VcsPushEvent {
            repo: repo.fullname.clone(),
            branch: VcsBranch {
                id: branch_name.clone(),
                display_id: branch_name,
                latest_commit: self.latest_commit.clone(),
                default: false,
                parents: Vec::new(),
            },
            commit: VcsCommit {
                hash: self.latest_commit.clone(),
                url: repo.commit_url(&self.latest_commit),
                ..Default::default()
            },
            clone_url: repo.http_clone_url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Participant {
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestLinks {
    #[serde(rename = "self", default)]
    pub self_link: Vec<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(rename = "updatedDate", default)]
    pub updated_date: Option<i64>,
    #[serde(rename = "fromRef")]
    pub from_ref: PullRequestRef,
    #[serde(rename = "toRef")]
    pub to_ref: PullRequestRef,
    #[serde(default)]
    pub author: Participant,
    #[serde(default)]
    pub links: PullRequestLinks,
}

impl PullRequest {
    pub fn to_vcs_pull_request(&self, base_url: &str) -> VcsPullRequest {
        VcsPullRequest {
            id: self.id,
            url: self
                .links
                .self_link
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            title: self.title.clone(),
            description: self.description.clone().unwrap_or_default(),
            state: self.state.clone(),
            closed: self.state == "DECLINED",
            merged: self.state == "MERGED",
            base: self.to_ref.to_push_event(base_url),
            head: self.from_ref.to_push_event(base_url),
            user: self.author.user.to_vcs_author(base_url),
            updated: self.updated_date.and_then(millis_to_datetime),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefRequest {
    pub id: String,
    pub repository: RepositoryRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRef {
    pub slug: String,
    pub project: ProjectRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRef {
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequestRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "fromRef")]
    pub from_ref: RefRequest,
    #[serde(rename = "toRef")]
    pub to_ref: RefRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub configuration: serde_json::Map<String, serde_json::Value>,
}

impl Webhook {
    pub fn to_vcs_hook(&self) -> VcsHook {
        VcsHook {
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            name: self.name.clone(),
            url: self.url.clone(),
            events: self.events.clone(),
            enabled: self.active,
            method: "POST".to_string(),
            content_type: "application/json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStatusPayload {
    pub state: CommitState,
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "dateAdded", default, skip_serializing)]
    pub date_added: i64,
}

impl BuildStatusPayload {
    pub fn to_vcs_status(&self, git_ref: &str) -> VcsCommitStatus {
        VcsCommitStatus {
            ref_: git_ref.to_string(),
            state: self.state,
            description: self.description.clone(),
            created_at: millis_to_datetime(self.date_added).unwrap_or_default(),
            decoded_state: build_status_from_commit_state(self.state),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPermission {
    pub user: User,
    pub permission: String,
}

/// Response of `/browse/{path}?type=true`
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseType {
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
