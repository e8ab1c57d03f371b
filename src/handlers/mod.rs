//! The concrete handlers behind every menu and sub-tool.
//!
//! A connection walks ban filter → outside menu → inside menu, and from
//! there into channels, consoles and plugins. Each handler owns its client
//! reference and a hub reference; nothing here is global.

pub mod admin;
pub mod ban_filter;
pub mod channel;
pub mod contacts;
pub mod inside;
pub mod math_v1;
pub mod math_v2;
pub mod messages;
pub mod options;
pub mod outside;
pub mod summary;

pub use admin::{AccountEditor, AdminConsole};
pub use ban_filter::BanFilter;
pub use channel::{ChannelAdmin, ChannelSession};
pub use contacts::ContactManager;
pub use inside::InsideMenu;
pub use math_v1::MathExpressionEvaluator;
pub use math_v2::MathEvaluator;
pub use messages::MessageManager;
pub use options::AccountOptions;
pub use outside::OutsideMenu;
pub use summary::MarkVShaney;

use crate::error::{HandlerError, HandlerResult};
use crate::network::LineClient;
use crate::state::Account;
use std::sync::Arc;

/// The logged-in account behind a client; handlers past the outside menu
/// may assume it exists.
pub(crate) fn current_account(client: &LineClient) -> HandlerResult<Arc<Account>> {
    client
        .account()
        .ok_or_else(|| HandlerError::Internal("no account bound to this connection".to_string()))
}

/// The logged-in name behind a client.
pub(crate) fn current_name(client: &LineClient) -> HandlerResult<String> {
    client
        .name()
        .ok_or_else(|| HandlerError::Internal("no name bound to this connection".to_string()))
}
