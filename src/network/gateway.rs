//! Gateway - TCP listener that accepts incoming connections.
//!
//! The Gateway binds to a socket and spawns a handler-stack worker for each
//! incoming client. Accepting stops when the hub's accept-stop token fires;
//! the gateway then waits for the live workers to finish.

use crate::network::LineClient;
use crate::session::HandlerStack;
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// The accept loop and its worker tracker.
pub struct Gateway {
    listener: TcpListener,
    hub: Arc<Hub>,
    tracker: TaskTracker,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(addr: SocketAddr, hub: Arc<Hub>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Gateway listening");
        Ok(Self {
            listener,
            hub,
            tracker: TaskTracker::new(),
        })
    }

    /// The bound address (useful when binding to port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the hub stops accepting, then drain the
    /// remaining sessions.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            tokio::select! {
                _ = self.hub.accept_stopped().cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = self.hub.next_conn_id();
                        let client = LineClient::new(id, stream, addr);
                        self.hub.clients.insert(id, Arc::clone(&client));
                        info!(id, %addr, "Connection accepted");
                        let stack = HandlerStack::new(Arc::clone(&self.hub), client);
                        self.tracker.spawn(stack.run());
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
            }
        }
        drop(self.listener);
        info!("Gateway stopped accepting, waiting for live sessions");
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }
}
