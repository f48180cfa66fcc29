//! Provider-agnostic VCS integration layer
//!
//! The engine talks to hosting providers only through [`vcs::VcsServer`] and
//! [`vcs::VcsAuthorizedClient`]. Bitbucket Server is the implemented provider.

pub mod bitbucket;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod vcs;

pub use errors::{ErrorKind, Result, VcsError};
