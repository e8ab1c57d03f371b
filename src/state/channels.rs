//! The channel registry: live rooms and their registered names.
//!
//! Rooms get stable numeric ids; renaming remaps the name to the same id
//! and deleting only drops the name entry, so connected clients keep their
//! room object.

use crate::state::room::{ChannelRoom, RoomSnapshot};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a rename attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    Taken,
    Missing,
}

#[derive(Default)]
struct Registry {
    next_id: i64,
    names: BTreeMap<String, i64>,
    rooms: BTreeMap<i64, Arc<ChannelRoom>>,
}

/// Shared map of channel name to room.
pub struct ChannelRegistry {
    inner: Mutex<Registry>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                next_id: 1,
                ..Registry::default()
            }),
        }
    }

    pub fn channel_exists(&self, name: &str) -> bool {
        self.inner.lock().names.contains_key(name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.inner.lock().names.keys().cloned().collect()
    }

    /// Every room ever created, registered name or not.
    pub fn rooms(&self) -> Vec<Arc<ChannelRoom>> {
        self.inner.lock().rooms.values().cloned().collect()
    }

    /// Fetch the room registered under `name`, creating a fresh one owned
    /// by `owner` when the name is unknown.
    pub fn open_or_create(&self, name: &str, owner: &str) -> Arc<ChannelRoom> {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.names.get(name).copied()
            && let Some(room) = inner.rooms.get(&id)
        {
            return Arc::clone(room);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let room = ChannelRoom::new(id, name, owner);
        inner.names.insert(name.to_string(), id);
        inner.rooms.insert(id, Arc::clone(&room));
        room
    }

    /// Drop the name entry. The room object itself stays alive for anyone
    /// still connected.
    pub fn delete_channel(&self, name: &str) -> bool {
        self.inner.lock().names.remove(name).is_some()
    }

    pub fn rename_channel(&self, old: &str, new: &str) -> RenameOutcome {
        let mut inner = self.inner.lock();
        if inner.names.contains_key(new) {
            return RenameOutcome::Taken;
        }
        match inner.names.remove(old) {
            Some(id) => {
                inner.names.insert(new.to_string(), id);
                RenameOutcome::Renamed
            }
            None => RenameOutcome::Missing,
        }
    }

    /// Rebuild the registry from persisted rooms. Rooms with a cleared
    /// name keep their id but get no name entry.
    pub fn restore(&self, snapshots: Vec<RoomSnapshot>) {
        let mut inner = self.inner.lock();
        for snapshot in snapshots {
            let id = snapshot.id;
            let name = snapshot.name.clone();
            let room = ChannelRoom::from_snapshot(snapshot);
            if let Some(name) = name {
                inner.names.insert(name, id);
            }
            inner.rooms.insert(id, room);
            inner.next_id = inner.next_id.max(id + 1);
        }
    }

    pub fn snapshot_all(&self) -> Vec<RoomSnapshot> {
        self.rooms().iter().map(|room| room.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_across_rename() {
        let registry = ChannelRegistry::new();
        let room = registry.open_or_create("first", "alice");
        let again = registry.open_or_create("first", "bob");
        assert!(Arc::ptr_eq(&room, &again));
        assert_eq!(again.owner(), "alice");

        assert_eq!(
            registry.rename_channel("first", "second"),
            RenameOutcome::Renamed
        );
        let renamed = registry.open_or_create("second", "carol");
        assert_eq!(renamed.id(), room.id());
        assert_eq!(
            registry.rename_channel("missing", "second"),
            RenameOutcome::Taken
        );
        assert_eq!(
            registry.rename_channel("missing", "third"),
            RenameOutcome::Missing
        );
    }

    #[test]
    fn delete_keeps_the_room_instance() {
        let registry = ChannelRegistry::new();
        let room = registry.open_or_create("doomed", "alice");
        assert!(registry.delete_channel("doomed"));
        assert!(!registry.channel_exists("doomed"));
        assert_eq!(registry.rooms().len(), 1);
        // reopening the name creates a brand new room with a new id
        let fresh = registry.open_or_create("doomed", "bob");
        assert!(!Arc::ptr_eq(&room, &fresh));
        assert_ne!(room.id(), fresh.id());
    }

    #[test]
    fn restore_keeps_ids_and_skips_deleted_names() {
        let registry = ChannelRegistry::new();
        let room = registry.open_or_create("kept", "alice");
        let mut deleted = registry.open_or_create("gone", "bob").snapshot();
        deleted.name = None;
        let snapshots = vec![room.snapshot(), deleted];

        let reloaded = ChannelRegistry::new();
        reloaded.restore(snapshots);
        assert_eq!(reloaded.channel_names(), vec!["kept".to_string()]);
        assert_eq!(reloaded.rooms().len(), 2);
        let fresh = reloaded.open_or_create("new", "carol");
        assert_eq!(fresh.id(), 3);
    }
}
