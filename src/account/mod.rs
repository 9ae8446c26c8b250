//! Accounts: local sign-up/sign-in plus the optional remote identity
//! service.
//!
//! ```text
//! AccountService
//!   ├─ validation (username, email, password)
//!   ├─ LocalAccounts    → Repository (`users`, `currentUser`)
//!   └─ RemoteAccounts?  → CloudAccounts (identity REST + profile document)
//! ```
//!
//! With no remote service configured everything stays local.  When one is
//! configured, sign-up and sign-in go through it and only the resulting
//! session is stored locally.

pub mod local;
pub mod remote;
pub mod user;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;

use crate::store::{PersistenceError, Repository};

pub use local::LocalAccounts;
pub use remote::{AuthError, CloudAccounts, RemoteAccounts, RemoteIdentity};
pub use user::{CurrentUser, StoredUser};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} already exists")]
    Taken(&'static str),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("not signed in; run `rehearse signin` first")]
    NotSignedIn,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Remote(#[from] AuthError),
}

/// Check sign-up input, reporting the first problem found.
pub fn validate_sign_up(username: &str, email: &str, password: &str) -> Result<(), AccountError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AccountError::Validation("Username is required".into()));
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AccountError::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if email.trim().is_empty() {
        return Err(AccountError::Validation("Email is required".into()));
    }
    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err(AccountError::Validation("Please enter a valid email".into()));
    }
    validate_password(password)
}

pub fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.is_empty() {
        return Err(AccountError::Validation("Password is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AccountService
// ---------------------------------------------------------------------------

pub struct AccountService {
    local: LocalAccounts,
    repository: Repository,
    remote: Option<Arc<dyn RemoteAccounts>>,
}

impl AccountService {
    pub fn new(repository: Repository, remote: Option<Arc<dyn RemoteAccounts>>) -> Self {
        Self {
            local: LocalAccounts::new(repository.clone()),
            repository,
            remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Register and sign in.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, AccountError> {
        let Some(remote) = &self.remote else {
            return self.local.sign_up(username, email, password);
        };

        validate_sign_up(username, email, password)?;
        let identity = remote.sign_up(username.trim(), email.trim(), password).await?;
        let user = CurrentUser {
            username: username.trim().to_string(),
            email: identity.email,
            uid: Some(identity.uid),
        };
        self.repository.set_current_user(&user)?;
        log::info!("account: signed up {} (remote)", user.display_name());
        Ok(user)
    }

    /// Sign in with a username (local) or an email (remote).
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<CurrentUser, AccountError> {
        let Some(remote) = &self.remote else {
            return self.local.sign_in(login, password);
        };

        validate_password(password)?;
        let identity = remote.sign_in(login.trim(), password).await?;
        let user = CurrentUser {
            username: String::new(),
            email: identity.email,
            uid: Some(identity.uid),
        };
        self.repository.set_current_user(&user)?;
        log::info!("account: signed in {} (remote)", user.display_name());
        Ok(user)
    }

    pub fn sign_out(&self) -> Result<(), AccountError> {
        self.local.sign_out()
    }

    pub fn current(&self) -> Result<Option<CurrentUser>, AccountError> {
        self.local.current()
    }

    pub fn require_current(&self) -> Result<CurrentUser, AccountError> {
        self.current()?.ok_or(AccountError::NotSignedIn)
    }
}
