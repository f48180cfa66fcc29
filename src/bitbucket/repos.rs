use super::authorized::{repo_path, split_fullname, BitbucketAuthorizedClient};
use super::client::{path_segments, segment, ApiFamily, PageRequest};
use super::types::{Author, Branch, BrowseType, Commit, Repository, Tag, User};
use crate::cache;
use crate::errors::{Result, VcsError};
use crate::vcs::{
    VcsAuthor, VcsBranch, VcsBranchFilters, VcsBranchesFilter, VcsCommit, VcsContent, VcsRepo,
    VcsStream, VcsTag,
};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// How long an email with no matching account stays cached
const UNKNOWN_USER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

impl BitbucketAuthorizedClient {
    pub(crate) async fn list_repos(&self) -> Result<Vec<VcsRepo>> {
        let repos: Vec<Repository> = self
            .client
            .paginate(PageRequest::core("repos").partial_on_cancel())
            .await?;

        let base_url = self.client.base_url();
        Ok(repos.iter().map(|r| r.to_vcs_repo(base_url)).collect())
    }

    pub(crate) async fn find_repo(&self, fullname: &str) -> Result<VcsRepo> {
        let path = repo_path(fullname)?;
        let repo: Repository = self.client.get(ApiFamily::Core, &path, &[]).await?;
        Ok(repo.to_vcs_repo(self.client.base_url()))
    }

    pub(crate) async fn forks(&self, fullname: &str) -> Result<Vec<VcsRepo>> {
        let path = format!("{}/forks", repo_path(fullname)?);
        let repos: Vec<Repository> = self.client.paginate(PageRequest::core(path)).await?;

        let base_url = self.client.base_url();
        Ok(repos.iter().map(|r| r.to_vcs_repo(base_url)).collect())
    }

    /// All branches, with exactly one flagged default when the repo has one
    pub(crate) async fn list_branches(&self, fullname: &str, filter: VcsBranchesFilter) -> Result<Vec<VcsBranch>> {
        let path = format!("{}/branches", repo_path(fullname)?);
        let raw: Vec<Branch> = self
            .client
            .paginate(PageRequest::core(path).limit(filter.limit).partial_on_cancel())
            .await?;
        let mut branches: Vec<VcsBranch> = raw.into_iter().map(VcsBranch::from).collect();

        if branches.iter().any(|b| b.default) || self.client.is_cancelled() {
            return Ok(branches);
        }

        let default = match self.default_branch(fullname).await {
            Ok(default) => default,
            Err(e) if e.is(crate::errors::ErrorKind::NotFound) => {
                debug!("Repository {} has no default branch", fullname);
                return Ok(branches);
            }
            Err(e) => return Err(e),
        };

        match branches.iter_mut().find(|b| b.id == default.id) {
            Some(existing) => existing.default = true,
            None => branches.push(default),
        }
        Ok(branches)
    }

    async fn default_branch(&self, fullname: &str) -> Result<VcsBranch> {
        let path = format!("{}/branches/default", repo_path(fullname)?);
        let branch: Branch = self.client.get(ApiFamily::Core, &path, &[]).await?;
        let mut branch = VcsBranch::from(branch);
        branch.default = true;
        Ok(branch)
    }

    pub(crate) async fn find_branch(&self, fullname: &str, filters: VcsBranchFilters) -> Result<VcsBranch> {
        if filters.default {
            return self.default_branch(fullname).await.map_err(|e| match e {
                VcsError::NotFound(_) => VcsError::NoBranch(format!("{fullname} has no default branch")),
                other => other,
            });
        }

        let name = filters.branch_name.trim_start_matches("refs/heads/");
        if name.is_empty() {
            return Err(VcsError::NoBranch(format!("no branch name given for {fullname}")));
        }

        let path = format!("{}/branches", repo_path(fullname)?);
        let candidates: Vec<Branch> = self
            .client
            .paginate(PageRequest::core(path).query("filterText", name))
            .await?;

        candidates
            .into_iter()
            .find(|b| b.display_id == name)
            .map(VcsBranch::from)
            .ok_or_else(|| VcsError::NoBranch(format!("{name} in {fullname}")))
    }

    pub(crate) async fn list_tags(&self, fullname: &str) -> Result<Vec<VcsTag>> {
        let path = format!("{}/tags", repo_path(fullname)?);
        let tags: Vec<Tag> = self.client.paginate(PageRequest::core(path)).await?;
        Ok(tags.into_iter().map(VcsTag::from).collect())
    }

    pub(crate) async fn find_tag(&self, fullname: &str, tag_name: &str) -> Result<VcsTag> {
        let path = format!("{}/tags/{}", repo_path(fullname)?, path_segments(tag_name));
        let tag: Tag = self.client.get(ApiFamily::Core, &path, &[]).await?;
        Ok(tag.into())
    }

    /// Commits reachable from `until` and not from `since`
    pub(crate) async fn list_commits(&self, fullname: &str, since: &str, until: &str) -> Result<Vec<VcsCommit>> {
        let path = format!("{}/commits", repo_path(fullname)?);
        let commits: Vec<Commit> = self
            .client
            .paginate(
                PageRequest::core(path)
                    .query("since", since)
                    .query("until", until),
            )
            .await?;

        let mut result = Vec::with_capacity(commits.len());
        for commit in &commits {
            result.push(self.enrich_commit(fullname, commit).await?);
        }
        Ok(result)
    }

    pub(crate) async fn find_commit(&self, fullname: &str, hash: &str) -> Result<VcsCommit> {
        let path = format!("{}/commits/{}", repo_path(fullname)?, segment(hash));
        let commit: Commit = self.client.get(ApiFamily::Core, &path, &[]).await?;
        self.enrich_commit(fullname, &commit).await
    }

    async fn enrich_commit(&self, fullname: &str, commit: &Commit) -> Result<VcsCommit> {
        let (project, slug) = split_fullname(fullname)?;
        let url = format!(
            "{}/projects/{}/repos/{}/commits/{}",
            self.client.base_url(),
            project,
            slug,
            commit.id
        );
        let mut vcs = commit.to_vcs_commit(url);
        if let Some(user) = self.user_by_email(&commit.author).await {
            apply_user(&mut vcs.author, &user, self.client.base_url());
        }
        Ok(vcs)
    }

    /// Account behind a commit email, cached. Lookup failures are never fatal.
    async fn user_by_email(&self, author: &Author) -> Option<User> {
        let email = author.email_address.trim();
        if email.is_empty() {
            return None;
        }

        let host = url::Url::parse(self.client.base_url())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let key = cache::key(&["vcs", "bitbucketserver", host.as_str(), "users", email]);
        let store = self.client.cache().as_ref();

        match cache::get_json::<User>(store, &key).await {
            Ok(Some(user)) => return Some(user),
            Ok(None) => {}
            Err(e) => warn!("Unable to read cached user {}: {}", email, e),
        }

        let found: Result<Vec<User>> = self
            .client
            .paginate(PageRequest::core("users").query("filter", email).limit(1))
            .await;

        let (user, ttl) = match found {
            Ok(users) => match users
                .into_iter()
                .find(|u| u.email_address.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            {
                Some(user) => (user, None),
                None => (User::unknown(author), Some(UNKNOWN_USER_TTL)),
            },
            Err(e) => {
                // Not cached: the next commit by this author retries the lookup
                warn!("Unable to get Bitbucket user {}: {}", email, e);
                return Some(User::unknown(author));
            }
        };

        if let Err(e) = cache::set_json(store, &key, &user, ttl).await {
            warn!("Unable to cache user {}: {}", email, e);
        }
        Some(user)
    }

    pub(crate) async fn archive(&self, fullname: &str, dir: &str, format: &str, commit: &str) -> Result<VcsStream> {
        let path = format!("{}/archive", repo_path(fullname)?);
        let query = vec![
            ("format", format.to_string()),
            ("at", commit.to_string()),
            ("path", dir.trim_matches('/').to_string()),
        ];
        self.client.stream(ApiFamily::Core, &path, &query).await
    }

    /// Flat listing of everything under `dir`
    pub(crate) async fn files(&self, fullname: &str, commit: &str, dir: &str) -> Result<Vec<VcsContent>> {
        let mut path = format!("{}/files", repo_path(fullname)?);
        let dir = path_segments(dir);
        if !dir.is_empty() {
            path = format!("{path}/{dir}");
        }

        let files: Vec<String> = self
            .client
            .paginate(PageRequest::core(path).query("at", commit))
            .await?;
        Ok(flatten_paths(&files))
    }

    pub(crate) async fn file(&self, fullname: &str, commit: &str, file_path: &str) -> Result<VcsContent> {
        let repo = repo_path(fullname)?;
        let encoded = path_segments(file_path);
        let at = vec![("at", commit.to_string())];

        let mut type_query = at.clone();
        type_query.push(("type", "true".to_string()));
        let kind: BrowseType = self
            .client
            .get(ApiFamily::Core, &format!("{repo}/browse/{encoded}"), &type_query)
            .await?;

        let name = file_path.trim_matches('/').to_string();
        if kind.kind != "FILE" {
            return Ok(VcsContent {
                name,
                is_directory: true,
                is_file: false,
                content: None,
            });
        }

        let raw = self
            .client
            .get_raw(ApiFamily::Core, &format!("{repo}/raw/{encoded}"), &at)
            .await?;
        Ok(VcsContent {
            name,
            is_directory: false,
            is_file: true,
            content: Some(String::from_utf8_lossy(&raw).into_owned()),
        })
    }
}

fn apply_user(author: &mut VcsAuthor, user: &User, base_url: &str) {
    let resolved = user.to_vcs_author(base_url);
    if let Some(display_name) = user.display_name.as_ref().filter(|d| !d.is_empty()) {
        author.display_name = display_name.clone();
    }
    author.avatar = resolved.avatar;
    if resolved.slug.is_some() {
        author.slug = resolved.slug;
    }
    if resolved.id.is_some() {
        author.id = resolved.id;
    }
}

/// The last segment of each path is a file, every prefix before it a directory.
/// Directories are emitted once, ahead of their first file.
pub(crate) fn flatten_paths(paths: &[String]) -> Vec<VcsContent> {
    let mut seen_dirs = HashSet::new();
    let mut contents = Vec::new();

    for path in paths {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((_, dirs)) = segments.split_last() else {
            continue;
        };

        for depth in 1..=dirs.len() {
            let dir = dirs[..depth].join("/");
            if seen_dirs.insert(dir.clone()) {
                contents.push(VcsContent {
                    name: dir,
                    is_directory: true,
                    is_file: false,
                    content: None,
                });
            }
        }

        contents.push(VcsContent {
            name: segments.join("/"),
            is_directory: false,
            is_file: true,
            content: None,
        });
    }

    contents
}
