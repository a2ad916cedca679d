//! Session resolution.
//!
//! The owner is either fixed (from `--owner`, `LEDGER_SYNC_OWNER` or the
//! config file) or looked up from a bearer token against the remote auth
//! endpoint at sync time.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::model::Session;
use crate::sync::SessionProvider;

/// Where the current owner comes from.
#[derive(Debug, Clone)]
pub enum SessionSource {
    /// A fixed owner, or none at all.
    Static(Option<String>),
    /// Resolve the owner from a bearer token.
    Token(TokenLookup),
}

/// Bearer-token lookup against `GET {endpoint}/auth/v1/user`.
#[derive(Debug, Clone)]
pub struct TokenLookup {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    token: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

impl SessionSource {
    /// Pick a source from settings.
    ///
    /// An explicit `owner` wins. A token is used only together with an
    /// endpoint; otherwise the configured owner (if any) is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ResolvedConfig, owner: Option<&str>) -> Result<Self> {
        if let Some(owner) = owner.filter(|o| !o.trim().is_empty()) {
            return Ok(Self::Static(Some(owner.trim().to_string())));
        }

        if let (Some(endpoint), Some(token)) = (&config.endpoint, &config.access_token) {
            return Ok(Self::Token(TokenLookup::new(
                endpoint,
                config.api_key.clone(),
                token,
                config.request_timeout,
            )?));
        }

        Ok(Self::Static(config.owner_id.clone()))
    }

    /// The owner known without a network call, if any.
    #[must_use]
    pub fn known_owner(&self) -> Option<&str> {
        match self {
            Self::Static(owner) => owner.as_deref(),
            Self::Token(_) => None,
        }
    }
}

impl TokenLookup {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            token: token.to_string(),
        })
    }

    async fn lookup(&self) -> Result<Option<Session>> {
        let url = format!("{}/auth/v1/user", self.endpoint);
        let mut request = self.client.get(&url).bearer_auth(&self.token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();

        // An expired or revoked token means nobody is signed in
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            debug!(status = status.as_u16(), "Access token rejected");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let user: AuthUser = response.json().await?;
        Ok((!user.id.is_empty()).then_some(Session { owner_id: user.id }))
    }
}

impl SessionProvider for SessionSource {
    async fn get_session(&self) -> Result<Option<Session>> {
        match self {
            Self::Static(owner) => Ok(owner.clone().map(|owner_id| Session { owner_id })),
            Self::Token(lookup) => lookup.lookup().await,
        }
    }
}
