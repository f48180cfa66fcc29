use super::Context;
use crate::cli::output::Output;
use crate::cli::HookAction;
use crate::errors::Result;
use crate::vcs::VcsHook;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, action: HookAction) -> Result<()> {
    let ctx = Context::load(config)?;
    match action {
        HookAction::Create {
            link,
            repo,
            url,
            events,
        } => {
            let client = ctx.client(&link).await?;
            let mut hook = VcsHook {
                url,
                events,
                ..Default::default()
            };
            client.create_hook(&repo, &mut hook).await?;

            Output::success(format!("Webhook registered on {repo}"));
            Output::sub_item(format!("Id: {}", hook.id));
            Output::sub_item(format!("Events: {}", hook.events.join(", ")));
        }
        HookAction::Delete { link, repo, url } => {
            let client = ctx.client(&link).await?;
            let hook = client.get_hook(&repo, &url).await?;
            client.delete_hook(&repo, &hook).await?;
            Output::success(format!("Webhook {} removed from {repo}", hook.id));
        }
    }
    Ok(())
}
