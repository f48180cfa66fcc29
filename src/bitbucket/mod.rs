//! Bitbucket Server provider
//!
//! This module provides:
//! - The REST transport with response caching and error classification
//! - The OAuth1 consumer used by application links
//! - The [`crate::vcs::VcsAuthorizedClient`] implementation

pub mod authorized;
pub mod client;
mod hooks;
pub mod oauth;
mod pull_request;
mod repos;
pub mod server;
mod status;
pub mod types;

pub use authorized::BitbucketAuthorizedClient;
pub use client::{ApiFamily, BitbucketClient, PageRequest};
pub use oauth::{OAuthConsumer, SignatureMethod};
pub use server::BitbucketServer;
