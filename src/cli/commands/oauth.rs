use super::Context;
use crate::cli::output::Output;
use crate::cli::OAuthAction;
use crate::config::{AuthConfig, OAuthToken};
use crate::errors::Result;
use crate::vcs::Provider;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, action: OAuthAction) -> Result<()> {
    let ctx = Context::load(config)?;
    match action {
        OAuthAction::Authorize => authorize(&ctx).await,
        OAuthAction::Token {
            link,
            request_token,
            request_secret,
            verifier,
            base_url,
        } => {
            let request = OAuthToken::new(request_token, request_secret);
            token(&ctx, &link, &request, &verifier, base_url).await
        }
    }
}

async fn authorize(ctx: &Context) -> Result<()> {
    let server = ctx.server(Provider::BitbucketServer)?;
    let (request, url) = server.authorize_redirect().await?;

    Output::success("Request token obtained");
    Output::sub_item(format!("Token:  {}", request.token));
    Output::sub_item(format!("Secret: {}", request.secret));
    Output::info(format!("Approve access at {url}"));
    Output::tip("Then run `vcs-bridge oauth token` with the verifier shown by the server");
    Ok(())
}

async fn token(
    ctx: &Context,
    link: &str,
    request: &OAuthToken,
    verifier: &str,
    base_url: Option<String>,
) -> Result<()> {
    let link = ctx.link(link)?.clone();
    let server = ctx.server(link.provider)?;
    let access = server.authorize_token(request, verifier).await?;

    let base_url = base_url.unwrap_or_else(|| ctx.settings.bitbucket.url.clone());
    ctx.credentials
        .store(&link.id, AuthConfig::oauth1(access, &base_url))?;

    Output::success(format!("Access token stored for link {}", link.name));
    Ok(())
}
