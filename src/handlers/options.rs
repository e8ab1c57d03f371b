//! Account self-service: deletion, password change, purges.

use crate::error::HandlerResult;
use crate::handlers::{current_account, current_name};
use crate::network::LineClient;
use crate::session::{COMMAND_PROMPT, Console, Handler, Next, Step, Verb, YES_WORDS, command_loop};
use crate::state::Hub;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const VERBS: &[Verb] = &[
    Verb {
        name: "delete_account",
        help: "Delete your account permanently.",
    },
    Verb {
        name: "exit",
        help: "Exit from this area of the server.",
    },
    Verb {
        name: "help",
        help: "Call help with a command name for more information.",
    },
    Verb {
        name: "password",
        help: "Change your password.",
    },
    Verb {
        name: "purge",
        help: "Purge your messages, contacts, or both.",
    },
];

/// Options over the logged-in account itself.
pub struct AccountOptions {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl AccountOptions {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    async fn delete_account(&mut self, args: &[String]) -> HandlerResult<()> {
        let delete = args.first().map(String::as_str) == Some("force")
            || YES_WORDS.contains(&self.client.input(Some("Seriously?")).await?.as_str());
        if delete {
            self.client
                .print("Your account and connection are being closed.")
                .await?;
            let name = current_name(&self.client)?;
            self.hub.delete_account(&name);
            info!(name = %name, "Account self-deleted");
            self.client.close(false).await?;
        }
        self.client.print("Cancelling ...").await
    }

    async fn password(&mut self, args: &[String]) -> HandlerResult<()> {
        let old = match args.first() {
            Some(old) => old.clone(),
            None => self.client.input(Some("Old password:")).await?,
        };
        let account = current_account(&self.client)?;
        if !account.password_matches(&old) {
            return self.client.print("Old password is not correct.").await;
        }
        let new = match args.get(1) {
            Some(new) => new.clone(),
            None => self.client.input(Some("New password:")).await?,
        };
        if new.is_empty() {
            self.client.print("Your password may not be empty.").await
        } else {
            account.set_password(&new);
            self.client.print("Your password has been changed.").await
        }
    }

    async fn purge(&mut self, args: &[String]) -> HandlerResult<()> {
        let what = match args.first() {
            Some(what) => what.clone(),
            None => self.client.input(Some("What?")).await?,
        };
        let account = current_account(&self.client)?;
        match what.as_str() {
            "messages" => {
                account.purge_messages();
                self.client
                    .print("All of your messages have been deleted.")
                    .await
            }
            "contacts" => {
                account.purge_contacts();
                self.client
                    .print("All of your contacts have been deleted.")
                    .await
            }
            "both" => {
                account.purge_messages();
                account.purge_contacts();
                self.client
                    .print("Your messages and contacts have been deleted.")
                    .await
            }
            _ => {
                self.client
                    .print("Try messages, contacts, or both.")
                    .await
            }
        }
    }
}

#[async_trait]
impl Handler for AccountOptions {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print("Opening account options ...").await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for AccountOptions {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "delete_account" => self.delete_account(args).await?,
            "password" => self.password(args).await?,
            "purge" => self.purge(args).await?,
            _ => {}
        }
        Ok(Step::Idle)
    }
}
