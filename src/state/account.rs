//! Accounts and the data they own: contacts, inbox, flags.
//!
//! Each account guards its mutable fields with its own lock; callers
//! snapshot under the lock and print after releasing it. The only link back
//! to a live connection is a weak reference, so a torn-down connection
//! simply stops resolving.

use crate::network::LineClient;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// One line of channel chat, rendered as `[source] message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLine {
    pub source: String,
    pub body: String,
}

impl ChannelLine {
    pub fn new(source: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            body: body.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("[{}] {}", self.source, self.body)
    }
}

/// An inbox message. `unread` flips to false when the message is read in
/// full, not when it is merely listed.
#[derive(Debug, Clone)]
pub struct InboxMessage {
    pub id: u64,
    pub source: String,
    pub body: String,
    pub unread: bool,
    pub sent_at: i64,
}

/// Persisted form of an inbox message.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub source: String,
    pub body: String,
    pub unread: bool,
    pub sent_at: i64,
}

/// Persisted form of an account.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub name: String,
    pub password: String,
    pub administrator: bool,
    pub forgiven: i64,
    pub contacts: Vec<String>,
    pub messages: Vec<MessageRecord>,
}

struct AccountState {
    password: String,
    administrator: bool,
    contacts: Vec<String>,
    messages: Vec<InboxMessage>,
    forgiven: i64,
    online: bool,
    client: Weak<LineClient>,
}

/// A registered user.
pub struct Account {
    name: String,
    state: Mutex<AccountState>,
}

impl Account {
    pub fn new(name: impl Into<String>, password: impl Into<String>, administrator: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(AccountState {
                password: password.into(),
                administrator,
                contacts: Vec::new(),
                messages: Vec::new(),
                forgiven: 0,
                online: false,
                client: Weak::new(),
            }),
        })
    }

    pub fn from_record(record: AccountRecord) -> Arc<Self> {
        Arc::new(Self {
            name: record.name,
            state: Mutex::new(AccountState {
                password: record.password,
                administrator: record.administrator,
                contacts: record.contacts,
                messages: record
                    .messages
                    .into_iter()
                    .map(|m| InboxMessage {
                        id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
                        source: m.source,
                        body: m.body,
                        unread: m.unread,
                        sent_at: m.sent_at,
                    })
                    .collect(),
                forgiven: record.forgiven,
                online: false,
                client: Weak::new(),
            }),
        })
    }

    pub fn to_record(&self) -> AccountRecord {
        let state = self.state.lock();
        AccountRecord {
            name: self.name.clone(),
            password: state.password.clone(),
            administrator: state.administrator,
            forgiven: state.forgiven,
            contacts: state.contacts.clone(),
            messages: state
                .messages
                .iter()
                .map(|m| MessageRecord {
                    source: m.source.clone(),
                    body: m.body.clone(),
                    unread: m.unread,
                    sent_at: m.sent_at,
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_administrator(&self) -> bool {
        self.state.lock().administrator
    }

    /// Flip the administrator flag and return the new value.
    pub fn toggle_administrator(&self) -> bool {
        let mut state = self.state.lock();
        state.administrator = !state.administrator;
        state.administrator
    }

    pub fn password(&self) -> String {
        self.state.lock().password.clone()
    }

    pub fn password_matches(&self, candidate: &str) -> bool {
        self.state.lock().password == candidate
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.state.lock().password = password.into();
    }

    pub fn forgiven(&self) -> i64 {
        self.state.lock().forgiven
    }

    pub fn bump_forgiven(&self) {
        self.state.lock().forgiven += 1;
    }

    pub fn reset_forgiven(&self) {
        self.state.lock().forgiven = 0;
    }

    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    /// Bind a live connection to the account. Fails if another connection
    /// is already logged in.
    pub fn login(&self, client: &Arc<LineClient>) -> bool {
        let mut state = self.state.lock();
        if state.online {
            return false;
        }
        state.online = true;
        state.client = Arc::downgrade(client);
        true
    }

    pub fn set_offline(&self) {
        let mut state = self.state.lock();
        state.online = false;
        state.client = Weak::new();
    }

    /// The live connection, when one still exists.
    pub fn live_client(&self) -> Option<Arc<LineClient>> {
        let state = self.state.lock();
        if state.online {
            state.client.upgrade()
        } else {
            None
        }
    }

    /// Best-effort message to the account's live connection, if any.
    pub async fn notify(&self, text: &str) {
        if let Some(client) = self.live_client() {
            let _ = client.print(text).await;
        }
    }

    /// Force the live connection, if any, off the server.
    pub async fn force_disconnect(&self) {
        if let Some(client) = self.live_client() {
            let _ = client.close(true).await;
        }
    }

    // Contacts

    pub fn contacts(&self) -> Vec<String> {
        self.state.lock().contacts.clone()
    }

    pub fn has_contact(&self, name: &str) -> bool {
        self.state.lock().contacts.iter().any(|c| c == name)
    }

    /// Append a contact unless it is already present.
    pub fn add_contact(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        if state.contacts.iter().any(|c| c == name) {
            return false;
        }
        state.contacts.push(name.to_string());
        true
    }

    pub fn remove_contact(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.contacts.len();
        state.contacts.retain(|c| c != name);
        state.contacts.len() != before
    }

    pub fn purge_contacts(&self) {
        self.state.lock().contacts.clear();
    }

    // Inbox

    pub fn push_message(&self, source: &str, body: &str) {
        self.state.lock().messages.push(InboxMessage {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            source: source.to_string(),
            body: body.to_string(),
            unread: true,
            sent_at: chrono::Utc::now().timestamp(),
        });
    }

    pub fn messages(&self) -> Vec<InboxMessage> {
        self.state.lock().messages.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.lock().messages.iter().filter(|m| m.unread).count()
    }

    /// Flip a message to read and return its final state.
    pub fn mark_read(&self, id: u64) -> Option<InboxMessage> {
        let mut state = self.state.lock();
        let message = state.messages.iter_mut().find(|m| m.id == id)?;
        message.unread = false;
        Some(message.clone())
    }

    pub fn delete_messages(&self, ids: &[u64]) -> usize {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|m| !ids.contains(&m.id));
        before - state.messages.len()
    }

    pub fn purge_messages(&self) {
        self.state.lock().messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_stay_unique() {
        let account = Account::new("alice", "pw", false);
        assert!(account.add_contact("bob"));
        assert!(!account.add_contact("bob"));
        assert_eq!(account.contacts(), vec!["bob".to_string()]);
        assert!(account.remove_contact("bob"));
        assert!(!account.remove_contact("bob"));
    }

    #[test]
    fn reading_flips_unread_exactly_once() {
        let account = Account::new("alice", "pw", false);
        account.push_message("bob", "hi there");
        let id = account.messages()[0].id;
        assert_eq!(account.unread_count(), 1);
        let read = account.mark_read(id).unwrap();
        assert!(!read.unread);
        assert_eq!(account.unread_count(), 0);
        assert!(account.mark_read(999).is_none());
    }

    #[test]
    fn record_round_trip_preserves_fields() {
        let account = Account::new("alice", "pw", true);
        account.add_contact("bob");
        account.push_message("bob", "one");
        account.bump_forgiven();
        let record = account.to_record();
        let restored = Account::from_record(record);
        assert_eq!(restored.name(), "alice");
        assert!(restored.is_administrator());
        assert_eq!(restored.forgiven(), 1);
        assert_eq!(restored.contacts(), vec!["bob".to_string()]);
        assert_eq!(restored.messages().len(), 1);
        assert!(!restored.is_online());
    }

    #[test]
    fn only_one_login_wins() {
        // login() refuses a second binding while the first is online
        let account = Account::new("alice", "pw", false);
        assert!(!account.is_online());
        // no live client needed to observe the online flag transitions
        account.state.lock().online = true;
        assert!(account.live_client().is_none());
        account.set_offline();
        assert!(!account.is_online());
    }
}
