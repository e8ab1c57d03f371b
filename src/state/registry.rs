//! The account registry: every registered name and its account.
//!
//! Operations that span several accounts (deletion, message delivery) are
//! atomic under the registry lock; anything that touches the network happens
//! after the locks are released.

use crate::state::account::{Account, AccountRecord};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of trying to add a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    Added,
    Duplicate,
    Missing,
}

/// Shared map of account name to account.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: Mutex<BTreeMap<String, Arc<Account>>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_exists(&self, name: &str) -> bool {
        self.accounts.lock().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Account>> {
        self.accounts.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.accounts.lock().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<Account>> {
        self.accounts.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }

    /// Create an account. The very first account becomes an administrator.
    pub fn register(&self, name: &str, password: &str) -> Option<Arc<Account>> {
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(name) {
            return None;
        }
        let account = Account::new(name, password, accounts.is_empty());
        accounts.insert(name.to_string(), Arc::clone(&account));
        Some(account)
    }

    /// Re-insert an account loaded from the store.
    pub fn insert_loaded(&self, account: Arc<Account>) {
        self.accounts
            .lock()
            .insert(account.name().to_string(), account);
    }

    /// Drop the account and scrub its name from every other account's
    /// contact list. Channel scrubbing is the hub's job, outside this lock.
    pub fn delete(&self, name: &str) -> bool {
        let mut accounts = self.accounts.lock();
        if accounts.remove(name).is_none() {
            return false;
        }
        for account in accounts.values() {
            account.remove_contact(name);
        }
        true
    }

    /// Append an unread message to `name`'s inbox and tell the recipient's
    /// live connection about it. Returns false when the account is gone.
    pub async fn deliver_message(&self, source: &str, name: &str, text: &str) -> bool {
        let account = self.get(name);
        let Some(account) = account else {
            return false;
        };
        account.push_message(source, text);
        account
            .notify(&format!("[EVENT] {source} has sent you a message."))
            .await;
        true
    }

    /// Whether `name` is an administrator; `None` when it does not exist.
    pub fn is_administrator(&self, name: &str) -> Option<bool> {
        self.get(name).map(|a| a.is_administrator())
    }

    pub fn is_online(&self, name: &str) -> bool {
        self.get(name).map(|a| a.is_online()).unwrap_or(false)
    }

    /// Add `name` to `account`'s contacts after checking it exists.
    pub fn add_contact(&self, account: &Account, name: &str) -> ContactOutcome {
        if account.has_contact(name) {
            return ContactOutcome::Duplicate;
        }
        if !self.account_exists(name) {
            return ContactOutcome::Missing;
        }
        if account.add_contact(name) {
            ContactOutcome::Added
        } else {
            ContactOutcome::Duplicate
        }
    }

    pub fn to_records(&self) -> Vec<AccountRecord> {
        self.all().iter().map(|a| a.to_record()).collect()
    }
}
