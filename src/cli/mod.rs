pub mod commands;
pub mod output;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vcs-bridge")]
#[command(about = "Talk to VCS providers the way the CD engine does")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ~/.vcs-bridge/settings.{toml,json,yaml})
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// OAuth1 application link flow
    Oauth {
        #[command(subcommand)]
        action: OAuthAction,
    },

    /// List repositories visible to a link
    Repos {
        /// Link id or name
        #[arg(long)]
        link: String,
    },

    /// List branches of a repository
    Branches {
        #[arg(long)]
        link: String,
        /// Repository fullname, <project>/<slug>
        #[arg(long)]
        repo: String,
        /// Stop after this many branches (0 = all)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Webhook management
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Show statuses this engine posted on a commit
    Statuses {
        #[arg(long)]
        link: String,
        #[arg(long)]
        repo: String,
        /// Commit hash
        #[arg(long = "ref")]
        git_ref: String,
    },

    /// Run the repository cache loader and the status synchronizer.
    /// Build events are read from stdin, one JSON object per line.
    Serve,

    /// Show version information
    Version,
}

#[derive(Debug, Subcommand)]
pub enum OAuthAction {
    /// Obtain a request token and print the URL to approve it
    Authorize,

    /// Exchange an approved request token for an access token and store it
    Token {
        /// Link id the access token is stored under
        #[arg(long)]
        link: String,
        #[arg(long)]
        request_token: String,
        #[arg(long)]
        request_secret: String,
        #[arg(long)]
        verifier: String,
        /// Server URL stored with the credential
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum HookAction {
    /// Register a webhook (no-op if the URL is already registered)
    Create {
        #[arg(long)]
        link: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        url: String,
        /// Events to subscribe to (provider default when omitted)
        #[arg(long = "event")]
        events: Vec<String>,
    },

    /// Remove the webhook registered for a URL
    Delete {
        #[arg(long)]
        link: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        url: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        self.setup_logging();

        let config = self.config.clone();
        match self.command {
            Commands::Oauth { action } => commands::oauth::run(config, action).await,
            Commands::Repos { link } => commands::repos::list_repos(config, &link).await,
            Commands::Branches { link, repo, limit } => {
                commands::repos::list_branches(config, &link, &repo, limit).await
            }
            Commands::Hook { action } => commands::hooks::run(config, action).await,
            Commands::Statuses {
                link,
                repo,
                git_ref,
            } => commands::statuses::run(config, &link, &repo, &git_ref).await,
            Commands::Serve => commands::serve::run(config).await,
            Commands::Version => commands::version::run().await,
        }
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}
