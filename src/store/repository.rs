//! Typed, per-user collections on top of a [`KeyValueStore`].
//!
//! Collections are JSON arrays.  Appends read the whole array, push, and
//! write it back; lookups read the whole array and filter by id.  Entries
//! this build cannot decode are skipped on read and kept on append.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::account::{CurrentUser, StoredUser};
use crate::interview::{Interview, InterviewResult};

use super::{KeyValueStore, PersistenceError};

const CURRENT_USER_KEY: &str = "currentUser";
const USERS_KEY: &str = "users";

fn interviews_key(user: &str) -> String {
    format!("interviews_{user}")
}

fn results_key(user: &str) -> String {
    format!("results_{user}")
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    // -----------------------------------------------------------------------
    // Interviews
    // -----------------------------------------------------------------------

    pub fn interviews(&self, user: &str) -> Result<Vec<Interview>, PersistenceError> {
        self.read_list(&interviews_key(user))
    }

    pub fn append_interview(
        &self,
        user: &str,
        interview: &Interview,
    ) -> Result<(), PersistenceError> {
        self.append(&interviews_key(user), interview)?;
        log::debug!("store: interview {} saved for {user}", interview.id);
        Ok(())
    }

    pub fn find_interview(
        &self,
        user: &str,
        id: &str,
    ) -> Result<Option<Interview>, PersistenceError> {
        Ok(self.interviews(user)?.into_iter().find(|i| i.id == id))
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    pub fn results(&self, user: &str) -> Result<Vec<InterviewResult>, PersistenceError> {
        self.read_list(&results_key(user))
    }

    pub fn append_result(
        &self,
        user: &str,
        result: &InterviewResult,
    ) -> Result<(), PersistenceError> {
        self.append(&results_key(user), result)?;
        log::debug!("store: result {} saved for {user}", result.id);
        Ok(())
    }

    pub fn find_result(
        &self,
        user: &str,
        id: &str,
    ) -> Result<Option<InterviewResult>, PersistenceError> {
        Ok(self.results(user)?.into_iter().find(|r| r.id == id))
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn current_user(&self) -> Result<Option<CurrentUser>, PersistenceError> {
        match self.store.get(CURRENT_USER_KEY)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| corrupt(CURRENT_USER_KEY, e)),
        }
    }

    pub fn set_current_user(&self, user: &CurrentUser) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(user)?;
        self.store.set(CURRENT_USER_KEY, &raw)
    }

    pub fn clear_current_user(&self) -> Result<(), PersistenceError> {
        self.store.remove(CURRENT_USER_KEY)
    }

    pub fn users(&self) -> Result<Vec<StoredUser>, PersistenceError> {
        self.read_list(USERS_KEY)
    }

    pub fn append_user(&self, user: &StoredUser) -> Result<(), PersistenceError> {
        self.append(USERS_KEY, user)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The collection's raw entries.  Only a value that is not a JSON array
    /// is corrupt.
    fn read_raw(&self, key: &str) -> Result<Vec<serde_json::Value>, PersistenceError> {
        match self.store.get(key)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| corrupt(key, e)),
        }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, PersistenceError> {
        let entries = self.read_raw(key)?;
        let mut list = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value(entry) {
                Ok(item) => list.push(item),
                Err(e) => log::warn!("store: skipping entry {i} of `{key}`: {e}"),
            }
        }
        Ok(list)
    }

    /// Push one record.  Existing entries are carried over untouched, even
    /// ones this build cannot decode.
    fn append<T: Serialize>(&self, key: &str, item: &T) -> Result<(), PersistenceError> {
        let mut list = self.read_raw(key)?;
        list.push(serde_json::to_value(item)?);
        let raw = serde_json::to_string(&list)?;
        self.store.set(key, &raw)
    }
}

fn corrupt(key: &str, error: serde_json::Error) -> PersistenceError {
    log::error!("store: cannot decode `{key}`: {error}");
    PersistenceError::Corrupt {
        key: key.to_string(),
        reason: error.to_string(),
    }
}
