use serde::{Deserialize, Serialize};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Host,
    Guest,
}

/// An authenticated caller. The booking core trusts it as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn host(username: impl Into<String>) -> Self {
        Self { username: username.into(), role: Role::Host }
    }

    pub fn guest(username: impl Into<String>) -> Self {
        Self { username: username.into(), role: Role::Guest }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token into the principal it was issued to
    async fn authenticate(&self, token: &str) -> Result<Principal, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Accepts tokens of the form `host:<name>` or `guest:<name>`.
pub struct MockIdentityProvider;

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Principal, IdentityError> {
        let (role, username) = token
            .split_once(':')
            .ok_or_else(|| IdentityError::InvalidCredentials("malformed token".to_string()))?;

        if username.is_empty() {
            return Err(IdentityError::InvalidCredentials("empty username".to_string()));
        }

        tracing::info!("Authenticated {} as {}", username, role);

        match role {
            "host" => Ok(Principal::host(username)),
            "guest" => Ok(Principal::guest(username)),
            other => Err(IdentityError::InvalidCredentials(format!("unknown role {}", other))),
        }
    }
}
