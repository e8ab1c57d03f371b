//! Channel rooms: membership, bounded history, replay, moderation.
//!
//! A room outlives its registry entry: deleting a channel only clears the
//! name, so clients still inside keep a working room object. All room state
//! sits behind one lock; broadcasts snapshot the recipient set under the
//! lock and write to sockets only after releasing it. The admin takeover
//! gate is a separate try-only lock because its guard is held across the
//! whole channel-admin command loop.

use crate::network::LineClient;
use crate::state::account::ChannelLine;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Hard ceiling on buffered history, whatever the configured size says.
pub const BUILTIN_BUFFER_LIMIT: usize = 10_000;

/// Replay size a fresh or reset room starts with.
pub const DEFAULT_REPLAY_SIZE: usize = 10;

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Start,
    Setup,
    Ready,
    Reset,
    Final,
}

impl RoomPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Setup => "setup",
            Self::Ready => "ready",
            Self::Reset => "reset",
            Self::Final => "final",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "start" => Some(Self::Start),
            "setup" => Some(Self::Setup),
            "ready" => Some(Self::Ready),
            "reset" => Some(Self::Reset),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

/// What a connecting client should do, decided by the phase machine.
pub enum Entry {
    /// Deleted-for-good room; leave silently.
    Bounced,
    /// Someone else is mid-wizard; the payload is the owner's name.
    SettingUp(String),
    /// This client won the race and must run the setup wizard.
    RunSetup,
    /// Normal entry.
    Run,
}

/// Persisted form of a room. Membership, kick marks and the admin gate are
/// transient and never stored.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: i64,
    pub name: Option<String>,
    pub owner: String,
    pub password: String,
    pub buffer_size: Option<usize>,
    pub replay_size: Option<usize>,
    pub phase: RoomPhase,
    pub buffer: Vec<ChannelLine>,
    pub banned: Vec<String>,
    /// `(muted, muter)` pairs.
    pub mutes: Vec<(String, String)>,
}

struct RoomState {
    name: Option<String>,
    owner: String,
    password: String,
    buffer: VecDeque<ChannelLine>,
    buffer_size: Option<usize>,
    replay_size: Option<usize>,
    phase: RoomPhase,
    connected: HashMap<u64, Arc<LineClient>>,
    muted_to_muter: HashMap<String, Vec<String>>,
    kicked: Vec<String>,
    banned: Vec<String>,
    admin_name: String,
}

/// A named chat room with history, owner and access controls.
pub struct ChannelRoom {
    id: i64,
    state: Mutex<RoomState>,
    admin_gate: Arc<tokio::sync::Mutex<()>>,
}

impl ChannelRoom {
    pub fn new(id: i64, name: impl Into<String>, owner: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(RoomState {
                name: Some(name.into()),
                owner: owner.into(),
                password: String::new(),
                buffer: VecDeque::new(),
                buffer_size: None,
                replay_size: Some(DEFAULT_REPLAY_SIZE),
                phase: RoomPhase::Start,
                connected: HashMap::new(),
                muted_to_muter: HashMap::new(),
                kicked: Vec::new(),
                banned: Vec::new(),
                admin_name: String::new(),
            }),
            admin_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn from_snapshot(snapshot: RoomSnapshot) -> Arc<Self> {
        let mut muted_to_muter: HashMap<String, Vec<String>> = HashMap::new();
        for (muted, muter) in snapshot.mutes {
            muted_to_muter.entry(muted).or_default().push(muter);
        }
        // A save can catch a room mid-wizard; restart the wizard on load.
        let phase = match snapshot.phase {
            RoomPhase::Setup => RoomPhase::Start,
            other => other,
        };
        Arc::new(Self {
            id: snapshot.id,
            state: Mutex::new(RoomState {
                name: snapshot.name,
                owner: snapshot.owner,
                password: snapshot.password,
                buffer: snapshot.buffer.into(),
                buffer_size: snapshot.buffer_size,
                replay_size: snapshot.replay_size,
                phase,
                connected: HashMap::new(),
                muted_to_muter,
                kicked: Vec::new(),
                banned: snapshot.banned,
                admin_name: String::new(),
            }),
            admin_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.lock();
        RoomSnapshot {
            id: self.id,
            name: state.name.clone(),
            owner: state.owner.clone(),
            password: state.password.clone(),
            buffer_size: state.buffer_size,
            replay_size: state.replay_size,
            phase: state.phase,
            buffer: state.buffer.iter().cloned().collect(),
            banned: state.banned.clone(),
            mutes: state
                .muted_to_muter
                .iter()
                .flat_map(|(muted, muters)| {
                    muters
                        .iter()
                        .map(move |muter| (muted.clone(), muter.clone()))
                })
                .collect(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub(crate) fn set_name(&self, name: Option<String>) {
        self.state.lock().name = name;
    }

    /// Clear the registered name, returning what it was.
    pub fn take_name(&self) -> Option<String> {
        self.state.lock().name.take()
    }

    pub fn owner(&self) -> String {
        self.state.lock().owner.clone()
    }

    pub fn is_owner(&self, name: &str) -> bool {
        self.state.lock().owner == name
    }

    pub fn password(&self) -> String {
        self.state.lock().password.clone()
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.state.lock().password = password.into();
    }

    pub fn clear_password(&self) {
        self.state.lock().password.clear();
    }

    // Phase machine

    /// Decide what a connecting client does, advancing the phase machine.
    /// The first arrival in START claims SETUP; a returning owner moves a
    /// RESET room back to START first.
    pub fn begin_entry(&self, client_name: &str) -> Entry {
        let mut state = self.state.lock();
        if state.phase == RoomPhase::Final {
            return Entry::Bounced;
        }
        if state.phase == RoomPhase::Reset && state.owner == client_name {
            state.phase = RoomPhase::Start;
        }
        let observed = state.phase;
        if observed == RoomPhase::Start {
            state.phase = RoomPhase::Setup;
        }
        match observed {
            RoomPhase::Start => Entry::RunSetup,
            RoomPhase::Setup | RoomPhase::Reset => Entry::SettingUp(state.owner.clone()),
            RoomPhase::Ready => Entry::Run,
            RoomPhase::Final => Entry::Bounced,
        }
    }

    /// The setup wizard finished (or died); the room is open either way.
    pub fn finish_setup(&self) {
        self.state.lock().phase = RoomPhase::Ready;
    }

    pub fn phase(&self) -> RoomPhase {
        self.state.lock().phase
    }

    // Membership

    pub fn connect(&self, client: &Arc<LineClient>) {
        self.state
            .lock()
            .connected
            .insert(client.id(), Arc::clone(client));
    }

    pub fn disconnect(&self, conn_id: u64) {
        self.state.lock().connected.remove(&conn_id);
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().connected.len()
    }

    pub fn member_names(&self) -> Vec<String> {
        self.state
            .lock()
            .connected
            .values()
            .filter_map(|c| c.name())
            .collect()
    }

    /// The connected client named `target`, unless the sender's own muter
    /// list blocks the whisper.
    pub fn whisper_target(&self, sender: &str, target: &str) -> Option<Arc<LineClient>> {
        let state = self.state.lock();
        if let Some(muters) = state.muted_to_muter.get(sender)
            && muters.iter().any(|m| m == target)
        {
            return None;
        }
        state
            .connected
            .values()
            .find(|c| c.name().as_deref() == Some(target))
            .cloned()
    }

    // History

    /// Append a line to the history, evicting the oldest entries past the
    /// effective cap. With a configured size of zero the line is still
    /// returned for broadcast, just never stored.
    pub fn add_line(&self, source: &str, body: &str) -> ChannelLine {
        let mut state = self.state.lock();
        let cap = effective_cap(state.buffer_size);
        let line = ChannelLine::new(source, body);
        if cap > 0 {
            state.buffer.push_back(line.clone());
            while state.buffer.len() > cap {
                state.buffer.pop_front();
            }
        }
        line
    }

    pub fn buffer_snapshot(&self) -> Vec<ChannelLine> {
        self.state.lock().buffer.iter().cloned().collect()
    }

    pub fn buffer_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// The prefix of history a newly connected member sees.
    pub fn replay_lines(&self) -> Vec<ChannelLine> {
        let state = self.state.lock();
        match state.replay_size {
            None => state.buffer.iter().cloned().collect(),
            Some(0) => Vec::new(),
            Some(n) => {
                let skip = state.buffer.len().saturating_sub(n);
                state.buffer.iter().skip(skip).cloned().collect()
            }
        }
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.state.lock().buffer_size
    }

    pub fn set_buffer_size(&self, size: Option<usize>) {
        let mut state = self.state.lock();
        state.buffer_size = size;
        let cap = effective_cap(size);
        while state.buffer.len() > cap {
            state.buffer.pop_front();
        }
    }

    pub fn replay_size(&self) -> Option<usize> {
        self.state.lock().replay_size
    }

    pub fn set_replay_size(&self, size: Option<usize>) {
        self.state.lock().replay_size = size;
    }

    pub fn purge_buffer(&self) {
        self.state.lock().buffer.clear();
    }

    // Fan-out

    /// Send a line to the connected members, honoring kick marks and the
    /// sender's mute lists. With `echo` the sender receives its own line.
    pub async fn broadcast(&self, line: &ChannelLine, sender_id: u64, echo: bool) {
        let recipients: Vec<Arc<LineClient>> = {
            let state = self.state.lock();
            let muters = state
                .muted_to_muter
                .get(&line.source)
                .cloned()
                .unwrap_or_default();
            state
                .connected
                .values()
                .filter(|client| {
                    let name = client.name().unwrap_or_default();
                    if state.kicked.iter().any(|k| *k == name) {
                        return false;
                    }
                    if muters.iter().any(|m| *m == name) {
                        return false;
                    }
                    echo || client.id() != sender_id
                })
                .cloned()
                .collect()
        };
        let text = line.render();
        for client in recipients {
            let _ = client.print(&text).await;
        }
    }

    // Moderation

    pub fn is_banned(&self, name: &str) -> bool {
        self.state.lock().banned.iter().any(|b| b == name)
    }

    /// Ban `name`; returns false when it was already banned.
    pub fn add_ban(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        if state.banned.iter().any(|b| b == name) {
            return false;
        }
        state.banned.push(name.to_string());
        true
    }

    pub fn del_ban(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.banned.len();
        state.banned.retain(|b| b != name);
        state.banned.len() != before
    }

    pub fn banned(&self) -> Vec<String> {
        self.state.lock().banned.clone()
    }

    /// Mute `muted` from `muter`'s point of view; returns false when the
    /// pair already existed.
    pub fn add_mute(&self, muted: &str, muter: &str) -> bool {
        let mut state = self.state.lock();
        let muters = state.muted_to_muter.entry(muted.to_string()).or_default();
        if muters.iter().any(|m| m == muter) {
            return false;
        }
        muters.push(muter.to_string());
        true
    }

    /// Undo a mute; the muted entry disappears with its last muter.
    pub fn del_mute(&self, muted: &str, muter: &str) -> bool {
        let mut state = self.state.lock();
        let Some(muters) = state.muted_to_muter.get_mut(muted) else {
            return false;
        };
        let before = muters.len();
        muters.retain(|m| m != muter);
        let removed = muters.len() != before;
        if muters.is_empty() {
            state.muted_to_muter.remove(muted);
        }
        removed
    }

    /// Names this muter has muted.
    pub fn mutes_by(&self, muter: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut muted: Vec<String> = state
            .muted_to_muter
            .iter()
            .filter(|(_, muters)| muters.iter().any(|m| m == muter))
            .map(|(name, _)| name.clone())
            .collect();
        muted.sort();
        muted
    }

    pub fn is_kicked(&self, name: &str) -> bool {
        self.state.lock().kicked.iter().any(|k| k == name)
    }

    /// Mark `name` for eviction if a connection with that name is present.
    pub fn kick_if_connected(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let present = state
            .connected
            .values()
            .any(|c| c.name().as_deref() == Some(name));
        if present {
            state.kicked.push(name.to_string());
        }
        present
    }

    pub fn kick_everyone(&self) {
        let mut state = self.state.lock();
        let names: Vec<String> = state.connected.values().filter_map(|c| c.name()).collect();
        state.kicked.extend(names);
    }

    /// Consume every kick mark for `name`; runs when its connection leaves.
    pub fn drain_kicks(&self, name: &str) {
        self.state.lock().kicked.retain(|k| k != name);
    }

    /// Remove a deleted account's name from bans and both sides of the
    /// mute map.
    pub fn scrub_name(&self, name: &str) {
        let mut state = self.state.lock();
        state.banned.retain(|b| b != name);
        state.muted_to_muter.remove(name);
        state.muted_to_muter.retain(|_, muters| {
            muters.retain(|m| m != name);
            !muters.is_empty()
        });
    }

    // Admin takeover

    /// Try to claim the admin console. On success the caller holds the gate
    /// for as long as it keeps the guard, and is recorded as the holder.
    pub fn try_admin(&self, name: &str) -> Option<OwnedMutexGuard<()>> {
        let guard = Arc::clone(&self.admin_gate).try_lock_owned().ok()?;
        self.state.lock().admin_name = name.to_string();
        Some(guard)
    }

    /// The most recent holder of the admin gate.
    pub fn admin_name(&self) -> String {
        self.state.lock().admin_name.clone()
    }

    /// Transfer ownership. `exists` is the caller's account-registry check.
    pub fn transfer_owner(&self, new_owner: &str, exists: bool) -> OwnerChange {
        let mut state = self.state.lock();
        if state.owner == new_owner {
            OwnerChange::Same
        } else if exists {
            state.owner = new_owner.to_string();
            OwnerChange::Set
        } else {
            OwnerChange::Missing
        }
    }

    /// Kick everyone and restore new-room settings under `owner`. Kick
    /// marks survive so present members leave on their next read turn.
    pub fn reset_as(&self, owner: &str) {
        let mut state = self.state.lock();
        state.phase = RoomPhase::Reset;
        let names: Vec<String> = state.connected.values().filter_map(|c| c.name()).collect();
        state.kicked.extend(names);
        clear_settings(&mut state, owner);
    }

    /// Reset plus permanent closure: the name is surrendered and the phase
    /// sticks at FINAL. Returns the name that was registered, if any.
    pub fn finalize_as(&self, owner: &str) -> Option<String> {
        let mut state = self.state.lock();
        state.phase = RoomPhase::Final;
        let name = state.name.take();
        let names: Vec<String> = state.connected.values().filter_map(|c| c.name()).collect();
        state.kicked.extend(names);
        clear_settings(&mut state, owner);
        name
    }

    /// Owner, password, buffer size and replay size in one snapshot.
    pub fn settings(&self) -> (String, String, Option<usize>, Option<usize>) {
        let state = self.state.lock();
        (
            state.owner.clone(),
            state.password.clone(),
            state.buffer_size,
            state.replay_size,
        )
    }
}

/// Result of an ownership transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerChange {
    Same,
    Set,
    Missing,
}

fn effective_cap(buffer_size: Option<usize>) -> usize {
    buffer_size
        .unwrap_or(BUILTIN_BUFFER_LIMIT)
        .min(BUILTIN_BUFFER_LIMIT)
}

fn clear_settings(state: &mut RoomState, owner: &str) {
    state.owner = owner.to_string();
    state.password.clear();
    state.buffer.clear();
    state.buffer_size = None;
    state.replay_size = Some(DEFAULT_REPLAY_SIZE);
    state.muted_to_muter.clear();
    state.banned.clear();
}
