use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

/// Closed classification of every error the VCS layer can surface.
///
/// Callers branch on the kind instead of matching message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    WrongRequest,
    RepoNotFound,
    NoBranch,
    HookNotFound,
    NotImplemented,
    UserNotFound,
    Config,
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::WrongRequest => "wrong request",
            ErrorKind::RepoNotFound => "repository not found",
            ErrorKind::NoBranch => "branch not found",
            ErrorKind::HookNotFound => "hook not found",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::UserNotFound => "user not found",
            ErrorKind::Config => "configuration error",
            ErrorKind::Transport => "transport error",
        };
        f.write_str(name)
    }
}

/// VCS Error Types
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// 404 from the provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// 403 from the provider
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 401 from the provider
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 400 from the provider
    #[error("Wrong request: {0}")]
    WrongRequest(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Branch not found: {0}")]
    NoBranch(String),

    #[error("Hook not found: {0}")]
    HookNotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else that went wrong talking to the provider
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        trace: Arc<Backtrace>,
    },
}

impl VcsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VcsError::NotFound(_) => ErrorKind::NotFound,
            VcsError::Forbidden(_) => ErrorKind::Forbidden,
            VcsError::Unauthorized(_) => ErrorKind::Unauthorized,
            VcsError::WrongRequest(_) => ErrorKind::WrongRequest,
            VcsError::RepoNotFound(_) => ErrorKind::RepoNotFound,
            VcsError::NoBranch(_) => ErrorKind::NoBranch,
            VcsError::HookNotFound(_) => ErrorKind::HookNotFound,
            VcsError::NotImplemented(_) => ErrorKind::NotImplemented,
            VcsError::UserNotFound(_) => ErrorKind::UserNotFound,
            VcsError::Config(_) => ErrorKind::Config,
            VcsError::Transport { .. } => ErrorKind::Transport,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        VcsError::Config(msg.into())
    }

    pub fn not_implemented<S: Into<String>>(msg: S) -> Self {
        VcsError::NotImplemented(msg.into())
    }

    pub fn repo_not_found<S: Into<String>>(msg: S) -> Self {
        VcsError::RepoNotFound(msg.into())
    }

    /// Wrap an arbitrary cause, capturing where it happened.
    pub fn transport<S, E>(context: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        VcsError::Transport {
            context: context.into(),
            source: source.into(),
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// Captured stack for wrapped transport errors.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            VcsError::Transport { trace, .. } => Some(trace),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for VcsError {
    fn from(err: reqwest::Error) -> Self {
        VcsError::transport("HTTP request failed", err)
    }
}

impl From<serde_json::Error> for VcsError {
    fn from(err: serde_json::Error) -> Self {
        VcsError::transport("Failed to decode JSON", err)
    }
}

impl From<std::io::Error> for VcsError {
    fn from(err: std::io::Error) -> Self {
        VcsError::transport("I/O error", err)
    }
}

impl From<url::ParseError> for VcsError {
    fn from(err: url::ParseError) -> Self {
        VcsError::config(format!("Invalid URL: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, VcsError>;
