//! The inside menu: the hub a logged-in client works from.

use crate::error::HandlerResult;
use crate::handlers::{
    AccountOptions, AdminConsole, BanFilter, ChannelSession, ContactManager,
    MathEvaluator, MathExpressionEvaluator, MessageManager, current_account, current_name,
};
use crate::network::LineClient;
use crate::session::{COMMAND_PROMPT, Console, Handler, Next, Step, Verb, command_loop};
use crate::state::Hub;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const VERBS: &[Verb] = &[
    Verb {
        name: "admin",
        help: "Access the administration console (if you are an administrator).",
    },
    Verb {
        name: "channel",
        help: "Allows you create and connect to message channels.",
    },
    Verb {
        name: "contacts",
        help: "Opens up your contacts list and allows you to edit it.",
    },
    Verb {
        name: "eval",
        help: "Proof of concept: this is a math expression evaluator.",
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
        name: "messages",
        help: "Opens up your account's inbox to read and send messages.",
    },
    Verb {
        name: "options",
        help: "You can change some your settings with this command.",
    },
];

/// The post-login menu.
pub struct InsideMenu {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl InsideMenu {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    /// Greeting shown on every entry: admin welcome, unread count, and how
    /// many contacts are online.
    async fn print_status(&self) -> HandlerResult<()> {
        let account = current_account(&self.client)?;
        if account.is_administrator() {
            self.client.print("Welcome, administrator!").await?;
        }
        let new = account.unread_count();
        self.client
            .print(&format!(
                "You have {new} new message{}.",
                plural_s(new)
            ))
            .await?;
        let contacts = account.contacts();
        let total = contacts.len();
        let online = contacts
            .iter()
            .filter(|name| self.hub.accounts.is_online(name))
            .count();
        self.client
            .print(&format!(
                "{online} of your {total} friend{} {} online.",
                plural_s(total),
                if online == 1 { "is" } else { "are" }
            ))
            .await?;
        Ok(())
    }

    /// The mercy gate: non-administrators get warned, counted and, past
    /// the limit, banned by address and deleted.
    async fn admin(&mut self) -> HandlerResult<Step> {
        let account = current_account(&self.client)?;
        if account.is_administrator() {
            return Ok(Step::Push(Box::new(AdminConsole::new(
                Arc::clone(&self.hub),
                Arc::clone(&self.client),
            ))));
        }
        let mercy_limit = self.hub.mercy_limit().await;
        if account.forgiven() >= mercy_limit {
            let name = current_name(&self.client)?;
            BanFilter::ban_client(&self.hub, &self.client).await?;
            self.hub.delete_account(&name);
            info!(name = %name, "Mercy limit exceeded; account removed");
            self.client
                .print("You have been warned for the last time!")
                .await?;
            self.client
                .print("Now your IP address has been blocked &")
                .await?;
            self.client
                .print("your account has been completely removed.")
                .await?;
            self.client.close(false).await?;
        }
        account.bump_forgiven();
        self.client.print("You are not authorized to be here.").await?;
        Ok(Step::Exit)
    }

    async fn channel(&mut self, args: &[String]) -> HandlerResult<Step> {
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Channel to open?")).await?,
        };
        if args.len() > 1 || name.split_whitespace().count() > 1 {
            self.client
                .print("Channel name may not have whitespace!")
                .await?;
            return Ok(Step::Idle);
        }
        if name.is_empty() {
            self.client.print("Channel name may not be empty.").await?;
            return Ok(Step::Idle);
        }
        let owner = current_name(&self.client)?;
        let room = self.hub.channels.open_or_create(&name, &owner);
        self.client
            .print(&format!("Opening the {name} channel ..."))
            .await?;
        room.connect(&self.client);
        Ok(Step::Push(Box::new(ChannelSession::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.client),
            room,
        ))))
    }

    async fn eval(&mut self, args: &[String]) -> HandlerResult<Step> {
        let version = match args.first() {
            Some(version) => version.clone(),
            None => self.client.input(Some("Version?")).await?,
        };
        match version.as_str() {
            "old" => Ok(Step::Push(Box::new(MathExpressionEvaluator::new(
                Arc::clone(&self.client),
            )))),
            "new" => Ok(Step::Push(Box::new(MathEvaluator::new(Arc::clone(
                &self.client,
            ))))),
            _ => {
                self.client.print("Try old or new.").await?;
                Ok(Step::Idle)
            }
        }
    }
}

#[async_trait]
impl Handler for InsideMenu {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.print_status().await?;
        let next = command_loop(self, COMMAND_PROMPT).await?;
        if next.is_none() {
            // logging out: the account frees up for another connection
            if let Some(account) = self.client.account() {
                account.set_offline();
            }
            self.client.clear_identity();
        }
        Ok(next)
    }
}

#[async_trait]
impl Console for InsideMenu {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "admin" => self.admin().await,
            "channel" => self.channel(args).await,
            "contacts" => Ok(Step::Push(Box::new(ContactManager::new(
                Arc::clone(&self.hub),
                Arc::clone(&self.client),
            )))),
            "eval" => self.eval(args).await,
            "messages" => Ok(Step::Push(Box::new(MessageManager::new(
                Arc::clone(&self.hub),
                Arc::clone(&self.client),
            )))),
            "options" => Ok(Step::Push(Box::new(AccountOptions::new(
                Arc::clone(&self.hub),
                Arc::clone(&self.client),
            )))),
            _ => Ok(Step::Idle),
        }
    }
}

fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
