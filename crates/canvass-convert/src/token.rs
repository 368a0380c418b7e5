//! Bearer token providers

use crate::error::{ConvertError, Result};
use async_trait::async_trait;

/// Source of the API bearer token, asked once per request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token (from configuration)
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(ConvertError::Token("no api token configured".into()));
        }
        Ok(self.0.clone())
    }
}
