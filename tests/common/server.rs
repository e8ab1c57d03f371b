//! Test server management.
//!
//! Spawns an in-process Confabulator gateway on an ephemeral port with an
//! isolated in-memory database, and exposes the hub for state assertions.

#![allow(dead_code)]

use confabulator::config::Config;
use confabulator::db::Database;
use confabulator::network::Gateway;
use confabulator::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    hub: Arc<Hub>,
}

impl TestServer {
    /// Spawn a server over a fresh in-memory database.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with_db(Database::new(":memory:").await?).await
    }

    /// Spawn a server over an existing database handle.
    pub async fn spawn_with_db(db: Database) -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.server.listen = "127.0.0.1:0".parse()?;
        let hub = Arc::new(Hub::new(config.clone(), db));
        hub.load().await?;
        let gateway = Gateway::bind(config.server.listen, Arc::clone(&hub)).await?;
        let addr = gateway.local_addr()?;
        tokio::spawn(gateway.run());
        Ok(Self { addr, hub })
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for asserting on registries directly.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }
}
