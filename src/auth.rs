//! Caller authentication
//!
//! Resolves the bearer credential carried on each request to a user identity
//! via an external identity service. The relay service depends only on the
//! [`IdentityProvider`] trait, so tests can substitute a stub.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Deserialize;

use crate::error::AppError;

/// Authenticated user identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Stable user id assigned by the identity service
    pub id: String,
    /// Email address, when the identity service exposes one
    pub email: Option<String>,
}

/// Verifies a bearer credential and yields the caller's identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an opaque bearer token to a user identity
    ///
    /// # Errors
    /// * `AppError::Unauthorized` if the token is invalid, expired, or the
    ///   identity service rejects it.
    async fn resolve(&self, credential: &str) -> Result<UserIdentity, AppError>;
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Expected a bearer credential".to_string()))
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Identity provider backed by an HTTP identity service
///
/// Sends the caller's bearer token to `GET {base_url}/user` and expects a JSON
/// body with at least an `id` field.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityProvider {
    /// Create a provider pointing at the given identity service base URL
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, credential: &str) -> Result<UserIdentity, AppError> {
        let url = format!("{}/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| AppError::Unauthorized(format!("Identity service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                status_code = status.as_u16(),
                "Identity service rejected credential"
            );
            return Err(AppError::Unauthorized(
                "Credential rejected by identity service".to_string(),
            ));
        }

        let identity: IdentityResponse = response.json().await.map_err(|e| {
            AppError::Unauthorized(format!("Malformed identity response: {}", e))
        })?;

        Ok(UserIdentity {
            id: identity.id,
            email: identity.email,
        })
    }
}
