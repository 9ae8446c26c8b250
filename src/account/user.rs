//! Account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The signed-in user, stored under `currentUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Empty after a remote sign-in, which only knows the email and uid.
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl CurrentUser {
    /// Key suffix for this user's collections: the username, else the uid.
    pub fn namespace(&self) -> &str {
        if !self.username.is_empty() {
            return &self.username;
        }
        match self.uid.as_deref() {
            Some(uid) if !uid.is_empty() => uid,
            _ => &self.email,
        }
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

/// A locally registered account, stored in the `users` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(&salt, password),
            salt,
            created_at: Utc::now(),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }

    pub fn to_current(&self) -> CurrentUser {
        CurrentUser {
            username: self.username.clone(),
            email: self.email.clone(),
            uid: None,
        }
    }
}

/// Hex-encoded SHA-256 of `salt || password`.
pub fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    hex::encode(digest)
}
