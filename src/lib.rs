//! One capability interface over GitLab and GitHub.
//!
//! Build a provider with [`create_provider`] and talk to it through the
//! traits in [`provider`]; every result is expressed in the canonical types
//! of [`model`], whichever platform served it.

pub mod auth;
pub mod config;
pub mod diff;
pub mod error;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod report;

pub use auth::{AuthProvider, StaticTokenAuth};
pub use error::{ErrorCode, ProviderError, Result};
pub use provider::{
    create_provider, IssueProvider, PipelineProvider, Platform, Provider, ProviderConfig,
    PullRequestProvider, RepositoryProvider, UserProvider,
};
