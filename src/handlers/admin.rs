//! The server admin console and the account editor it opens.
//!
//! Only reachable through the inside menu's `admin` gate, so every command
//! here may assume an administrator is driving.

use crate::error::HandlerResult;
use crate::handlers::{contacts, current_account, current_name, messages};
use crate::network::LineClient;
use crate::session::{COMMAND_PROMPT, Console, Handler, Next, Step, Verb, YES_WORDS, command_loop};
use crate::state::{Account, Hub};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const VERBS: &[Verb] = &[
    Verb {
        name: "account",
        help: "Access all account related controls.",
    },
    Verb {
        name: "ban",
        help: "Access all IP ban filter controls.",
    },
    Verb {
        name: "channels",
        help: "View a list of all current channels.",
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
        name: "shutdown",
        help: "Arrange for the server to shutdown and save its data.",
    },
];

/// Graduated shutdown levels; each one includes everything below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ShutdownLevel {
    Server,
    Users,
    Admin,
    All,
}

impl ShutdownLevel {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "server" => Some(Self::Server),
            "users" => Some(Self::Users),
            "admin" => Some(Self::Admin),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// The server-wide administration console.
pub struct AdminConsole {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl AdminConsole {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    // account view | remove | edit

    async fn account(&mut self, args: &[String]) -> HandlerResult<Step> {
        match args.first().map(String::as_str) {
            Some("view") => {
                self.account_view(&self.hub.accounts.names()).await?;
                Ok(Step::Idle)
            }
            Some("remove") => {
                self.account_remove(args.get(1)).await?;
                Ok(Step::Idle)
            }
            Some("edit") => self.account_edit(args.get(1)).await,
            _ => {
                self.client.print("Try view, remove, or edit.").await?;
                Ok(Step::Idle)
            }
        }
    }

    async fn account_view(&self, names: &[String]) -> HandlerResult<()> {
        for (index, name) in names.iter().enumerate() {
            self.client.print(&format!("({}) {name}", index + 1)).await?;
        }
        Ok(())
    }

    async fn account_remove(&mut self, arg: Option<&String>) -> HandlerResult<()> {
        let me = current_name(&self.client)?;
        let name = match arg {
            Some(name) => {
                if *name == me {
                    self.client.print("You cannot remove yourself.").await?;
                    return Ok(());
                }
                name.clone()
            }
            None => match self.pick_account_name(&me).await? {
                Some(name) => name,
                None => return Ok(()),
            },
        };
        if self.disconnect_and_remove(&name).await? {
            self.client.print("Account has been removed.").await?;
        }
        Ok(())
    }

    async fn account_edit(&mut self, arg: Option<&String>) -> HandlerResult<Step> {
        let me = current_name(&self.client)?;
        let name = match arg {
            Some(name) => name.clone(),
            None => match self.pick_account_name(&me).await? {
                Some(name) => name,
                None => return Ok(Step::Idle),
            },
        };
        if name == me {
            self.client.print("You may not edit yourself.").await?;
            return Ok(Step::Idle);
        }
        match self.hub.accounts.get(&name) {
            Some(account) => Ok(Step::Push(Box::new(AccountEditor::new(
                Arc::clone(&self.client),
                name,
                account,
            )))),
            None => {
                self.client.print("Unable to access account.").await?;
                Ok(Step::Idle)
            }
        }
    }

    /// List every other account and prompt for a number.
    async fn pick_account_name(&self, me: &str) -> HandlerResult<Option<String>> {
        let names: Vec<String> = self
            .hub
            .accounts
            .names()
            .into_iter()
            .filter(|name| name != me)
            .collect();
        if names.is_empty() {
            self.client.print("There are no other accounts.").await?;
            return Ok(None);
        }
        self.account_view(&names).await?;
        let line = self.client.input(Some("Account number?")).await?;
        match parse_index(&line, names.len()) {
            Some(index) => Ok(Some(names[index].clone())),
            None => {
                self.client.print("You must enter a valid number.").await?;
                Ok(None)
            }
        }
    }

    async fn disconnect_and_remove(&self, name: &str) -> HandlerResult<bool> {
        match self.hub.accounts.get(name) {
            Some(account) => {
                account.force_disconnect().await;
                self.hub.delete_account(name);
                info!(name = %name, "Account removed by administrator");
                Ok(true)
            }
            None => {
                self.client.print("Account does not exist.").await?;
                Ok(false)
            }
        }
    }

    // ban view | add | remove

    async fn ban(&mut self, args: &[String]) -> HandlerResult<()> {
        match args.first().map(String::as_str) {
            Some("view") => {
                let addresses = self.hub.db.bans().list().await?;
                self.ban_view(&addresses).await
            }
            Some("add") => self.ban_add(args.get(1)).await,
            Some("remove") => self.ban_remove(args.get(1)).await,
            _ => self.client.print("Try view, add, or remove.").await,
        }
    }

    async fn ban_view(&self, addresses: &[String]) -> HandlerResult<()> {
        if addresses.is_empty() {
            self.client.print("No one is in the ban list.").await
        } else {
            for (index, address) in addresses.iter().enumerate() {
                self.client
                    .print(&format!("({}) {address}", index + 1))
                    .await?;
            }
            Ok(())
        }
    }

    async fn ban_add(&mut self, arg: Option<&String>) -> HandlerResult<()> {
        let address = match arg {
            Some(address) => address.clone(),
            None => self.client.input(Some("Address:")).await?,
        };
        if address.is_empty() {
            return self.client.print("Empty address may not be added.").await;
        }
        let address = address.to_lowercase();
        if self.hub.db.bans().add(&address).await? {
            self.client
                .print("Address has been successfully added.")
                .await
        } else {
            self.client.print("Address in already in ban list.").await
        }
    }

    async fn ban_remove(&mut self, arg: Option<&String>) -> HandlerResult<()> {
        let address = match arg {
            Some(address) => address.to_lowercase(),
            None => {
                let addresses = self.hub.db.bans().list().await?;
                self.ban_view(&addresses).await?;
                if addresses.is_empty() {
                    return Ok(());
                }
                let line = self.client.input(Some("Item number?")).await?;
                match parse_index(&line, addresses.len()) {
                    Some(index) => addresses[index].clone(),
                    None => {
                        return self.client.print("You must enter a valid number.").await;
                    }
                }
            }
        };
        if self.hub.db.bans().remove(&address).await? {
            self.client.print("Address has been removed.").await
        } else {
            self.client.print("Address not found.").await
        }
    }

    async fn channels(&self) -> HandlerResult<()> {
        let names = self.hub.channels.channel_names();
        if names.is_empty() {
            self.client
                .print("There are no channels at this time.")
                .await
        } else {
            self.client
                .print(&format!(
                    "Channel{}currently in existence:",
                    if names.len() == 1 { " " } else { "s " }
                ))
                .await?;
            for name in names {
                self.client.print(&format!("    {name}")).await?;
            }
            Ok(())
        }
    }

    // shutdown server | users | admin | all

    async fn shutdown(&mut self, args: &[String]) -> HandlerResult<()> {
        let Some(level) = args.first().and_then(|t| ShutdownLevel::parse(t)) else {
            return self
                .client
                .print("Try server, users, admin, or all.")
                .await;
        };
        let me = current_name(&self.client)?;
        let message = format!("{me} is shutting down your connection.");
        info!(by = %me, level = ?level, "Shutdown requested");
        self.shutdown_server(&message).await?;
        if level > ShutdownLevel::Server {
            self.disconnect_accounts(&message, level).await?;
        }
        Ok(())
    }

    /// Stop accepting and drop clients that never logged in.
    async fn shutdown_server(&self, message: &str) -> HandlerResult<()> {
        if self.hub.stop_accepting() {
            self.client.print("Server has been shutdown.").await?;
            let count = self.hub.disconnect_sleepers(message).await;
            self.client
                .print(&format!(
                    "{count} sleeper{} disconnected.",
                    if count == 1 { " was" } else { "s were" }
                ))
                .await?;
        } else {
            self.client.print("Server was already closed.").await?;
        }
        Ok(())
    }

    async fn disconnect_accounts(
        &self,
        message: &str,
        level: ShutdownLevel,
    ) -> HandlerResult<()> {
        let me = current_account(&self.client)?;
        for account in self.hub.accounts.all() {
            if Arc::ptr_eq(&account, &me) {
                continue;
            }
            if level > ShutdownLevel::Users || !account.is_administrator() {
                account.notify(message).await;
                account.force_disconnect().await;
            }
        }
        self.client
            .print("Shutdown process has been completed.")
            .await?;
        if level == ShutdownLevel::All {
            self.client.close(false).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for AdminConsole {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print("Opening admin console ...").await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for AdminConsole {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "account" => self.account(args).await,
            "ban" => {
                self.ban(args).await?;
                Ok(Step::Idle)
            }
            "channels" => {
                self.channels().await?;
                Ok(Step::Idle)
            }
            "shutdown" => {
                self.shutdown(args).await?;
                Ok(Step::Idle)
            }
            _ => Ok(Step::Idle),
        }
    }
}

const EDITOR_VERBS: &[Verb] = &[
    Verb {
        name: "edit",
        help: "Change various attributes of the account.",
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
        name: "info",
        help: "Show information about the current account.",
    },
    Verb {
        name: "password",
        help: "Show the password on the account.",
    },
    Verb {
        name: "read",
        help: "Show account's contact list or read message summaries.",
    },
];

/// Administrator's editor over somebody else's account.
pub struct AccountEditor {
    client: Arc<LineClient>,
    name: String,
    account: Arc<Account>,
}

impl AccountEditor {
    pub fn new(client: Arc<LineClient>, name: String, account: Arc<Account>) -> Self {
        Self {
            client,
            name,
            account,
        }
    }

    async fn edit(&mut self, args: &[String]) -> HandlerResult<()> {
        let attr = match args.first() {
            Some(attr) => attr.clone(),
            None => self.client.input(Some("What?")).await?,
        };
        match attr.as_str() {
            "admin" => {
                let admin = self.account.toggle_administrator();
                self.client
                    .print(&format!(
                        "{} is {}an administrator now.",
                        self.name,
                        if admin { "" } else { "not " }
                    ))
                    .await
            }
            "password" => {
                let word = match args.get(1) {
                    Some(word) => word.clone(),
                    None => self.client.input(Some("Password:")).await?,
                };
                self.account.set_password(&word);
                self.client
                    .print(&format!("Password has been changed to '{word}'"))
                    .await
            }
            "forgiven" => {
                let reset = args.get(1).map(String::as_str) == Some("reset")
                    || YES_WORDS.contains(&self.client.input(Some("Reset?")).await?.as_str());
                if reset {
                    self.account.reset_forgiven();
                    self.client
                        .print("Forgiven count has been set to zero.")
                        .await?;
                }
                Ok(())
            }
            _ => {
                self.client
                    .print("Try admin, password, or forgiven.")
                    .await
            }
        }
    }

    async fn info(&self) -> HandlerResult<()> {
        self.client
            .print(&format!("About account \"{}\":", self.name))
            .await?;
        self.client
            .print(&format!("Admin    = {}", self.account.is_administrator()))
            .await?;
        self.client
            .print(&format!("Online   = {}", self.account.is_online()))
            .await?;
        self.client
            .print(&format!("Friends  = {}", self.account.contacts().len()))
            .await?;
        self.client
            .print(&format!("Messages = {}", self.account.messages().len()))
            .await?;
        self.client
            .print(&format!("Forgiven = {}", self.account.forgiven()))
            .await
    }

    async fn read(&mut self, args: &[String]) -> HandlerResult<()> {
        let attr = match args.first() {
            Some(attr) => attr.clone(),
            None => self.client.input(Some("Contacts or messages?")).await?,
        };
        match attr.as_str() {
            "contacts" => {
                self.client
                    .print(&format!("{}'s contact list:", self.name))
                    .await?;
                contacts::print_contacts(&self.client, &self.account, None).await?;
                Ok(())
            }
            "messages" => {
                self.client
                    .print("First 70 bytes of each message:")
                    .await?;
                messages::print_message_summary(&self.client, &self.account, false, 70, None, None)
                    .await?;
                Ok(())
            }
            _ => self.client.print("Try contacts or messages.").await,
        }
    }
}

#[async_trait]
impl Handler for AccountEditor {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print("Opening account editor ...").await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for AccountEditor {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        EDITOR_VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "edit" => self.edit(args).await?,
            "info" => self.info().await?,
            "password" => {
                self.client
                    .print(&format!("Username: '{}'", self.name))
                    .await?;
                self.client
                    .print(&format!("Password: '{}'", self.account.password()))
                    .await?;
            }
            "read" => self.read(args).await?,
            _ => {}
        }
        Ok(Step::Idle)
    }
}

/// Parse a 1-based selection against a list length.
pub(crate) fn parse_index(line: &str, len: usize) -> Option<usize> {
    let index = line.trim().parse::<usize>().ok()?.checked_sub(1)?;
    (index < len).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_levels_escalate() {
        assert!(ShutdownLevel::parse("server").unwrap() < ShutdownLevel::parse("users").unwrap());
        assert!(ShutdownLevel::parse("users").unwrap() < ShutdownLevel::parse("admin").unwrap());
        assert!(ShutdownLevel::parse("admin").unwrap() < ShutdownLevel::parse("all").unwrap());
        assert!(ShutdownLevel::parse("everything").is_none());
    }

    #[test]
    fn selection_indexes_are_one_based() {
        assert_eq!(parse_index("1", 3), Some(0));
        assert_eq!(parse_index(" 3 ", 3), Some(2));
        assert_eq!(parse_index("0", 3), None);
        assert_eq!(parse_index("4", 3), None);
        assert_eq!(parse_index("x", 3), None);
    }
}
