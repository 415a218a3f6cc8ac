use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use super::account::Account;
use crate::core::persist;

/// Durable record of the Microsoft account plus its in-process mirror.
///
/// Only the auth coordinator mutates it, under its own lock.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    cache: Mutex<Option<Account>>,
}

impl AccountStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Cached account, else the one on disk. Unreadable files count as absent.
    pub fn read(&self) -> Option<Account> {
        let mut cache = self.lock_cache();
        if let Some(account) = cache.as_ref() {
            return Some(account.clone());
        }

        match persist::read_json::<Account>(&self.path) {
            Ok(Some(account)) => {
                *cache = Some(account.clone());
                Some(account)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring unreadable account file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Overwrite the durable record and the cache.
    ///
    /// The cache is updated even if the write fails so the running session
    /// keeps the fresh tokens.
    pub fn persist(&self, account: &Account) {
        if let Err(e) = persist::write_json_atomic(&self.path, account) {
            warn!("Cannot persist account {}: {}", account.name, e);
        } else {
            debug!("Account {} persisted to {:?}", account.name, self.path);
        }
        *self.lock_cache() = Some(account.clone());
    }

    pub fn clear(&self) {
        *self.lock_cache() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed account file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove account file {:?}: {}", self.path, e),
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<Account>> {
        // A poisoned cache still holds a valid Option.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
