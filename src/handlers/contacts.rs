//! The contact manager.

use crate::error::HandlerResult;
use crate::handlers::current_account;
use crate::network::LineClient;
use crate::session::{COMMAND_PROMPT, Console, Handler, Next, Step, Verb, command_loop};
use crate::state::{Account, AccountRegistry, ContactOutcome, Hub};
use async_trait::async_trait;
use std::sync::Arc;

const VERBS: &[Verb] = &[
    Verb {
        name: "add",
        help: "Add a friend to your contact list.",
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
        name: "remove",
        help: "Remove someone from your contact list.",
    },
    Verb {
        name: "show",
        help: "Display your friend list with online/offline status.",
    },
];

/// Editor over the logged-in account's contact list.
pub struct ContactManager {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl ContactManager {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    async fn add(&mut self, args: &[String]) -> HandlerResult<()> {
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Who?")).await?,
        };
        let account = current_account(&self.client)?;
        match self.hub.accounts.add_contact(&account, &name) {
            ContactOutcome::Added => {
                self.client
                    .print(&format!("{name} has been added to your contact list."))
                    .await
            }
            ContactOutcome::Duplicate => {
                self.client
                    .print(&format!("{name} is already in your contact list."))
                    .await
            }
            ContactOutcome::Missing => {
                self.client
                    .print(&format!("{name} does not currently exist."))
                    .await
            }
        }
    }

    async fn remove(&mut self, args: &[String]) -> HandlerResult<()> {
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Who?")).await?,
        };
        let account = current_account(&self.client)?;
        if account.remove_contact(&name) {
            self.client
                .print(&format!("{name} has been removed from your contact list."))
                .await
        } else {
            self.client
                .print(&format!("{name} is not in your contact list."))
                .await
        }
    }
}

#[async_trait]
impl Handler for ContactManager {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print("Opening contact manager ...").await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for ContactManager {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "add" => self.add(args).await?,
            "remove" => self.remove(args).await?,
            "show" => {
                let account = current_account(&self.client)?;
                print_contacts(&self.client, &account, Some(&self.hub.accounts)).await?;
            }
            _ => {}
        }
        Ok(Step::Idle)
    }
}

/// Print a numbered contact list; with a registry the online status is
/// shown per name.
pub(crate) async fn print_contacts(
    client: &LineClient,
    account: &Account,
    registry: Option<&AccountRegistry>,
) -> HandlerResult<Vec<String>> {
    let contacts = account.contacts();
    if contacts.is_empty() {
        client.print("Contact list is empty.").await?;
        return Ok(contacts);
    }
    for (index, name) in contacts.iter().enumerate() {
        match registry {
            Some(registry) => {
                let filler = if registry.is_online(name) { "N" } else { "FF" };
                client
                    .print(&format!("({}) {name} [O{filler}line]", index + 1))
                    .await?;
            }
            None => {
                client.print(&format!("({}) {name}", index + 1)).await?;
            }
        }
    }
    Ok(contacts)
}
