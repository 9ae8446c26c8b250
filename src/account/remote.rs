//! Optional remote identity service.
//!
//! [`CloudAccounts`] talks to an Identity-Toolkit-style REST API
//! (`accounts:signUp`, `accounts:signInWithPassword`) and, after sign-up,
//! writes a `users/<uid>` profile document to a Firestore-style document
//! store.  All endpoints come from [`CloudConfig`].

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::config::CloudConfig;

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("no account found with this email")]
    NotFound,

    #[error("incorrect email or password")]
    BadCredentials,

    #[error("remote sign-in failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Other("request timed out".into())
        } else {
            AuthError::Other(e.to_string())
        }
    }
}

/// Map an identity-service error message such as `"EMAIL_NOT_FOUND"` or
/// `"TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"` to an [`AuthError`].
pub fn map_error_code(message: &str) -> AuthError {
    let code = message
        .split(|c: char| c == ' ' || c == ':')
        .next()
        .unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" => AuthError::NotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthError::BadCredentials,
        "EMAIL_EXISTS" => AuthError::Other("an account with this email already exists".into()),
        _ => AuthError::Other(message.to_string()),
    }
}

// ---------------------------------------------------------------------------
// RemoteAccounts trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait RemoteAccounts: Send + Sync {
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, AuthError>;
}

// ---------------------------------------------------------------------------
// CloudAccounts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudAccounts {
    client: reqwest::Client,
    api_key: String,
    project_id: Option<String>,
    auth_base_url: String,
    datastore_base_url: String,
}

impl CloudAccounts {
    /// Build from the `[cloud]` section.  An API key is required.
    pub fn from_config(config: &CloudConfig) -> Result<Self, AuthError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::Other("cloud.api_key is not set".into()))?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            api_key,
            project_id: config.project_id.clone(),
            auth_base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            datastore_base_url: config.datastore_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn identity_url(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.auth_base_url, self.api_key)
    }

    fn profile_url(&self, project: &str, uid: &str) -> String {
        format!(
            "{}/projects/{project}/databases/(default)/documents/users/{uid}",
            self.datastore_base_url
        )
    }

    async fn call_identity(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<IdentityResponse, AuthError> {
        let body = serde_json::json!({
            "email":             email,
            "password":          password,
            "returnSecureToken": true
        });

        let response = self
            .client
            .post(self.identity_url(method))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => map_error_code(&envelope.error.message),
                Err(_) => AuthError::Other(format!("identity service returned {status}")),
            };
            log::warn!("account: {method} failed: {error}");
            return Err(error);
        }

        response
            .json::<IdentityResponse>()
            .await
            .map_err(|e| AuthError::Other(format!("unexpected identity response: {e}")))
    }

    async fn write_profile(
        &self,
        identity: &IdentityResponse,
        username: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        let Some(project) = self.project_id.as_deref() else {
            log::warn!("account: cloud.project_id not set, skipping profile document");
            return Ok(());
        };

        let body = serde_json::json!({
            "fields": {
                "username":  { "stringValue": username },
                "email":     { "stringValue": email },
                "createdAt": { "timestampValue": Utc::now().to_rfc3339() }
            }
        });

        let response = self
            .client
            .patch(self.profile_url(project, &identity.local_id))
            .bearer_auth(&identity.id_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Other(format!(
                "profile write returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAccounts for CloudAccounts {
    async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RemoteIdentity, AuthError> {
        let identity = self.call_identity("signUp", email, password).await?;
        log::debug!("account: remote user {} created", identity.local_id);
        self.write_profile(&identity, username, email).await?;

        Ok(RemoteIdentity {
            email: identity.email.clone().unwrap_or_else(|| email.to_string()),
            uid: identity.local_id,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<RemoteIdentity, AuthError> {
        let identity = self
            .call_identity("signInWithPassword", email, password)
            .await?;
        Ok(RemoteIdentity {
            email: identity.email.unwrap_or_else(|| email.to_string()),
            uid: identity.local_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
