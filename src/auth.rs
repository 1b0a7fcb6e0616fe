use async_trait::async_trait;

use crate::error::Result;

/// Source of authentication headers for every outgoing request.
///
/// Headers are opaque to the adapters: bearer tokens, `PRIVATE-TOKEN` and
/// cookie headers all look the same from here.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn headers(&self) -> Result<Vec<(String, String)>>;

    /// Whether the provider can currently authenticate requests.
    fn is_valid(&self) -> bool;
}

/// How a static token is presented to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenHeader {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `<name>: <token>`, e.g. GitLab's `PRIVATE-TOKEN`
    Named(String),
}

/// A fixed token, or no token at all for anonymous access to public data.
#[derive(Debug, Clone)]
pub struct StaticTokenAuth {
    token: Option<String>,
    header: TokenHeader,
}

impl StaticTokenAuth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            header: TokenHeader::Bearer,
        }
    }

    pub fn named(header: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            header: TokenHeader::Named(header.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            token: None,
            header: TokenHeader::Bearer,
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn headers(&self) -> Result<Vec<(String, String)>> {
        let Some(token) = &self.token else {
            return Ok(Vec::new());
        };
        let header = match &self.header {
            TokenHeader::Bearer => ("Authorization".to_string(), format!("Bearer {}", token)),
            TokenHeader::Named(name) => (name.clone(), token.clone()),
        };
        Ok(vec![header])
    }

    fn is_valid(&self) -> bool {
        self.token.as_deref().map_or(true, |t| !t.trim().is_empty())
    }
}
