//! The Hub - central shared state for the chat server.
//!
//! The hub owns the account and channel registries, the table of live
//! connections, the accept-stop signal and the database handle. Handlers
//! receive it by `Arc` at construction; there is no process-global state.
//!
//! # Lock order (deadlock prevention)
//!
//! When a path needs more than one of these locks it takes them in this
//! order, releasing earlier ones where the order would invert:
//!
//! 1. connection table (DashMap shard)
//! 2. account registry
//! 3. individual account
//! 4. channel registry
//! 5. individual room
//! 6. room admin gate (try-only)
//!
//! None of them is ever held across an `.await`; snapshot under the lock,
//! release, then do the I/O.

use crate::config::Config;
use crate::db::Database;
use crate::network::LineClient;
use crate::state::channels::ChannelRegistry;
use crate::state::registry::AccountRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fallback when the mercy-limit setting is missing or unreadable.
pub const DEFAULT_MERCY_LIMIT: i64 = 2;

const MERCY_LIMIT_KEY: &str = "InsideMenu.mercy_limit";

/// Central shared state container.
pub struct Hub {
    pub accounts: AccountRegistry,
    pub channels: ChannelRegistry,
    /// Live connections by id; entries disappear at stack teardown, which
    /// is what makes account back-references effectively weak.
    pub clients: DashMap<u64, Arc<LineClient>>,
    pub db: Database,
    pub config: Config,
    accept_stop: CancellationToken,
    next_conn_id: AtomicU64,
}

impl Hub {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            accounts: AccountRegistry::new(),
            channels: ChannelRegistry::new(),
            clients: DashMap::new(),
            db,
            config,
            accept_stop: CancellationToken::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Cancelled once the server stops accepting connections.
    pub fn accept_stopped(&self) -> &CancellationToken {
        &self.accept_stop
    }

    /// Stop accepting new connections. Returns false when the accept loop
    /// had already been stopped.
    pub fn stop_accepting(&self) -> bool {
        if self.accept_stop.is_cancelled() {
            return false;
        }
        self.accept_stop.cancel();
        true
    }

    /// The number of unauthorized admin attempts forgiven before the ban.
    pub async fn mercy_limit(&self) -> i64 {
        match self.db.settings().get_i64(MERCY_LIMIT_KEY).await {
            Ok(Some(limit)) => limit,
            _ => DEFAULT_MERCY_LIMIT,
        }
    }

    /// Remove the account and every trace of its name: registry entry,
    /// other accounts' contacts, then each room's ban and mute lists. The
    /// registry lock is released before any room lock is taken.
    pub fn delete_account(&self, name: &str) -> bool {
        let removed = self.accounts.delete(name);
        if removed {
            for room in self.channels.rooms() {
                room.scrub_name(name);
            }
        }
        removed
    }

    /// Connected clients that never logged in.
    pub fn sleepers(&self) -> Vec<Arc<LineClient>> {
        self.clients
            .iter()
            .filter(|entry| entry.value().name().is_none())
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Notify and drop every sleeper; returns how many were disconnected.
    pub async fn disconnect_sleepers(&self, message: &str) -> usize {
        let sleepers = self.sleepers();
        let mut count = 0;
        for client in sleepers {
            let _ = client.print(message).await;
            let _ = client.close(true).await;
            count += 1;
        }
        count
    }

    /// The `shutdown all` path used by signal handling: stop accepting and
    /// force every connection off the server.
    pub async fn run_complete_shutdown(&self) {
        info!("Complete shutdown in progress ...");
        let message = "KeyboardInterrupt is shutting down your connection.";
        self.stop_accepting();
        let sleepers = self.disconnect_sleepers(message).await;
        info!(count = sleepers, "Sleepers disconnected");
        for account in self.accounts.all() {
            account.notify(message).await;
            account.force_disconnect().await;
        }
    }

    /// Load persisted registries from the store.
    pub async fn load(&self) -> Result<(), crate::db::DbError> {
        let records = self.db.accounts().load_all().await?;
        let account_count = records.len();
        for record in records {
            self.accounts
                .insert_loaded(crate::state::Account::from_record(record));
        }
        let rooms = self.db.channels().load_all().await?;
        let room_count = rooms.len();
        self.channels.restore(rooms);
        info!(
            accounts = account_count,
            channels = room_count,
            "Registries loaded"
        );
        Ok(())
    }

    /// Save the registries back to the store.
    pub async fn save(&self) -> Result<(), crate::db::DbError> {
        let records = self.accounts.to_records();
        let rooms = self.channels.snapshot_all();
        info!(
            accounts = records.len(),
            channels = rooms.len(),
            "Saving registries"
        );
        self.db.accounts().save_all(&records).await?;
        self.db.channels().save_all(&rooms).await?;
        Ok(())
    }
}
