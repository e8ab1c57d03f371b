//! The per-connection handler scheduler.
//!
//! Each accepted connection gets one `HandlerStack` worker. The stack seeds
//! itself with the ban filter and then repeatedly drives the top handler:
//! a returned handler is pushed, `None` pops, and the disconnect signal
//! unwinds everything. Teardown always runs, whatever path ended the
//! session.

use crate::error::HandlerError;
use crate::handlers::BanFilter;
use crate::network::LineClient;
use crate::session::Handler;
use crate::state::Hub;
use std::sync::Arc;
use tracing::{error, info};

/// The LIFO scheduler over one connection's handlers.
pub struct HandlerStack {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
    stack: Vec<Box<dyn Handler>>,
}

impl HandlerStack {
    /// Seed the stack for a fresh connection with the ban filter.
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        let root = Box::new(BanFilter::new(Arc::clone(&hub), Arc::clone(&client)));
        Self {
            hub,
            client,
            stack: vec![root],
        }
    }

    /// Drive the connection to completion, then tear it down.
    pub async fn run(mut self) {
        let id = self.client.id();
        let addr = self.client.addr();
        match self.drive().await {
            Ok(()) => info!(id, %addr, "Session finished"),
            Err(HandlerError::Disconnect) => info!(id, %addr, "Client disconnected"),
            Err(HandlerError::Internal(report)) => {
                error!(id, %addr, error = %report, "Handler failed");
                self.report_failure(&report).await;
            }
        }
        self.hub.clients.remove(&id);
        if let Some(account) = self.client.account() {
            account.set_offline();
        }
        let _ = self.client.close(true).await;
    }

    async fn drive(&mut self) -> Result<(), HandlerError> {
        while let Some(top) = self.stack.last_mut() {
            match top.handle().await? {
                Some(next) => self.stack.push(next),
                None => {
                    self.stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Best-effort banner for unexpected errors; a failed write here is
    /// swallowed because the connection is going away regardless.
    async fn report_failure(&self, report: &str) {
        let bar = "X".repeat(70);
        let banner = async {
            self.client.print(&bar).await?;
            self.client.print("Please report this error ASAP!").await?;
            self.client.print(&bar).await?;
            self.client.print(report).await?;
            self.client.print(&bar).await
        };
        let _ = banner.await;
    }
}
