use super::Context;
use crate::cli::output::Output;
use crate::errors::Result;
use crate::vcs::VcsBranchesFilter;
use std::path::PathBuf;

pub async fn list_repos(config: Option<PathBuf>, link: &str) -> Result<()> {
    let ctx = Context::load(config)?;
    let client = ctx.client(link).await?;
    let repos = client.repos().await?;

    Output::section(format!("Repositories ({})", repos.len()));
    for repo in &repos {
        Output::repo_line(&repo.fullname, &repo.http_clone_url);
    }
    Ok(())
}

pub async fn list_branches(config: Option<PathBuf>, link: &str, repo: &str, limit: usize) -> Result<()> {
    let ctx = Context::load(config)?;
    let client = ctx.client(link).await?;
    let branches = client.branches(repo, VcsBranchesFilter { limit }).await?;

    if branches.is_empty() {
        Output::warning(format!("No branches in {repo}"));
        return Ok(());
    }

    Output::section(format!("Branches of {repo}"));
    for branch in &branches {
        Output::branch_line(&branch.display_id, &branch.latest_commit, branch.default);
    }
    Ok(())
}
