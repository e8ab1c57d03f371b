//! Network module.
//!
//! Contains the Gateway (TCP listener) and the framed line client.

mod client;
mod gateway;

pub use client::{Identity, LineClient, SEPARATOR, normalize};
pub use gateway::Gateway;
