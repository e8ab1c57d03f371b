//! Shared server state: accounts, channels, and the hub that owns them.

mod account;
mod channels;
mod hub;
mod registry;
mod room;

pub use account::{Account, AccountRecord, ChannelLine, InboxMessage, MessageRecord};
pub use channels::{ChannelRegistry, RenameOutcome};
pub use hub::{DEFAULT_MERCY_LIMIT, Hub};
pub use registry::{AccountRegistry, ContactOutcome};
pub use room::{
    BUILTIN_BUFFER_LIMIT, ChannelRoom, DEFAULT_REPLAY_SIZE, Entry, OwnerChange, RoomPhase,
    RoomSnapshot,
};
