use super::Context;
use crate::cli::output::Output;
use crate::errors::Result;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, link: &str, repo: &str, git_ref: &str) -> Result<()> {
    let ctx = Context::load(config)?;
    let client = ctx.client(link).await?;
    let statuses = client.list_statuses(repo, git_ref).await?;

    if statuses.is_empty() {
        Output::info(format!("No statuses on {git_ref}"));
        return Ok(());
    }

    Output::section(format!("Statuses on {git_ref}"));
    for status in &statuses {
        Output::status_line(
            status.state.as_str(),
            &status.description,
            status.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}
