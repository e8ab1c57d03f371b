//! The connect-time ban screen.
//!
//! First frame on every connection's stack: a banned peer address is cut
//! off before it sees a single prompt. A second `handle` call only happens
//! if every later frame popped, so it closes the connection for good.

use crate::error::HandlerResult;
use crate::handlers::OutsideMenu;
use crate::network::LineClient;
use crate::session::{Handler, Next};
use crate::state::Hub;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// One-shot handler screening the peer address against the ban list.
pub struct BanFilter {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
    passed: bool,
}

impl BanFilter {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self {
            hub,
            client,
            passed: false,
        }
    }

    /// Ban the peer address of `client`.
    pub async fn ban_client(hub: &Hub, client: &LineClient) -> HandlerResult<()> {
        let address = client.addr().ip().to_string().to_lowercase();
        hub.db.bans().add(&address).await?;
        info!(%address, "Address banned");
        Ok(())
    }
}

#[async_trait]
impl Handler for BanFilter {
    async fn handle(&mut self) -> HandlerResult<Next> {
        if self.passed {
            self.client.print("Disconnecting ...").await?;
            self.client.close(false).await?;
            return Ok(None);
        }
        let address = self.client.addr().ip().to_string().to_lowercase();
        if self.hub.db.bans().contains(&address).await? {
            info!(%address, "Banned address refused");
            self.client.close(false).await?;
        }
        self.passed = true;
        Ok(Some(Box::new(OutsideMenu::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.client),
        ))))
    }
}
