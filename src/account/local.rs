//! Accounts kept in the local store.

use crate::store::Repository;

use super::user::{CurrentUser, StoredUser};
use super::{validate_password, validate_sign_up, AccountError};

pub struct LocalAccounts {
    repository: Repository,
}

impl LocalAccounts {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Validate, reject duplicates, store the salted hash and sign in.
    pub fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, AccountError> {
        validate_sign_up(username, email, password)?;
        let username = username.trim();
        let email = email.trim();

        let users = self.repository.users()?;
        if users.iter().any(|u| u.username == username) {
            return Err(AccountError::Taken("Username"));
        }
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AccountError::Taken("Email"));
        }

        let stored = StoredUser::new(username, email, password);
        self.repository.append_user(&stored)?;

        let current = stored.to_current();
        self.repository.set_current_user(&current)?;
        log::info!("account: signed up {username}");
        Ok(current)
    }

    pub fn sign_in(&self, username: &str, password: &str) -> Result<CurrentUser, AccountError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AccountError::Validation("Username is required".into()));
        }
        validate_password(password)?;

        let user = self
            .repository
            .users()?
            .into_iter()
            .find(|u| u.username == username && u.verify(password))
            .ok_or_else(|| {
                log::warn!("account: failed sign-in for {username}");
                AccountError::InvalidCredentials
            })?;

        let current = user.to_current();
        self.repository.set_current_user(&current)?;
        log::info!("account: signed in {username}");
        Ok(current)
    }

    pub fn sign_out(&self) -> Result<(), AccountError> {
        self.repository.clear_current_user()?;
        log::info!("account: signed out");
        Ok(())
    }

    pub fn current(&self) -> Result<Option<CurrentUser>, AccountError> {
        Ok(self.repository.current_user()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailingStore, MemoryStore};
    use std::sync::Arc;

    fn accounts() -> (LocalAccounts, Repository) {
        let repository = Repository::new(Arc::new(MemoryStore::new()));
        (LocalAccounts::new(repository.clone()), repository)
    }

    #[test]
    fn sign_up_stores_hash_and_signs_in() {
        let (accounts, repo) = accounts();
        let user = accounts.sign_up(" ana ", "ana@example.com", "secret1").unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(repo.current_user().unwrap(), Some(user));

        let stored = repo.users().unwrap();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0].password_hash, "secret1");
    }

    #[test]
    fn duplicate_username_or_email_is_rejected() {
        let (accounts, repo) = accounts();
        accounts.sign_up("ana", "ana@example.com", "secret1").unwrap();

        assert!(matches!(
            accounts.sign_up("ana", "other@example.com", "secret1"),
            Err(AccountError::Taken("Username"))
        ));
        assert!(matches!(
            accounts.sign_up("anna", "ANA@example.com", "secret1"),
            Err(AccountError::Taken("Email"))
        ));
        assert_eq!(repo.users().unwrap().len(), 1);
    }

    #[test]
    fn invalid_input_is_not_stored() {
        let (accounts, repo) = accounts();
        assert!(matches!(
            accounts.sign_up("ana", "nope", "secret1"),
            Err(AccountError::Validation(_))
        ));
        assert!(repo.users().unwrap().is_empty());
        assert!(repo.current_user().unwrap().is_none());
    }

    #[test]
    fn sign_in_verifies_password() {
        let (accounts, _repo) = accounts();
        accounts.sign_up("ana", "ana@example.com", "secret1").unwrap();
        accounts.sign_out().unwrap();

        assert!(matches!(
            accounts.sign_in("ana", "wrong-pass"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.sign_in("nobody", "secret1"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.sign_in("ana", "123"),
            Err(AccountError::Validation(_))
        ));
        assert!(accounts.current().unwrap().is_none());

        let user = accounts.sign_in("ana", "secret1").unwrap();
        assert_eq!(accounts.current().unwrap(), Some(user));
    }

    #[test]
    fn store_failure_is_reported() {
        let accounts = LocalAccounts::new(Repository::new(Arc::new(FailingStore)));
        assert!(matches!(
            accounts.sign_up("ana", "ana@example.com", "secret1"),
            Err(AccountError::Persistence(_))
        ));
    }
}
