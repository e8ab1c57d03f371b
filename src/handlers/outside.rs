//! The outside menu: everything a client can do before logging in.

use crate::error::HandlerResult;
use crate::handlers::InsideMenu;
use crate::network::LineClient;
use crate::session::{
    COMMAND_PROMPT, Console, Handler, Next, Step, Verb, YES_WORDS, command_loop,
};
use crate::state::{Account, Hub};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

const BANNER: &str = r"/----------------------------\
|                            |
|   Welcome to Confabulator  |
|   ======================   |
|      Rust Edition 1.0      |
|                            |
\----------------------------/";

const TERMS_OF_SERVICE: &str = r"/----------------------------\
|      TERMS OF SERVICE      |
|  ========================  |
|  By registering with this  |
|  service, you agree to be  |
|  bound by these principle  |
|  requirements until death  |
|  or the end of the world:  |
|                            |
|  1. This service is being  |
|  provided to you for free  |
|  and must remain free for  |
|  these terms to continue.  |
|                            |
|  2. Administrators should  |
|  be held faultless in all  |
|  they do except promoting  |
|  falsehood and deception.  |
|                            |
|  3. The account given you  |
|  will remain the property  |
|  of the issuer and may be  |
|  removed without warning.  |
|                            |
|  4. You give up all legal  |
|  rights, privacy of data,  |
|  and demands for fairness  |
|  while using this system.  |
|                            |
|  5. Your terms of service  |
|  will remain in effect if  |
|  you lose possession over  |
|  an account you received.  |
\----------------------------/";

const VERBS: &[Verb] = &[
    Verb {
        name: "exit",
        help: "Exit from this area of the server.",
    },
    Verb {
        name: "help",
        help: "Call help with a command name for more information.",
    },
    Verb {
        name: "login",
        help: "Login to the server to access account.",
    },
    Verb {
        name: "open_source",
        help: "Display the entire source code for this program.",
    },
    Verb {
        name: "register",
        help: "Register for an account using this command.",
    },
];

/// The pre-login menu.
pub struct OutsideMenu {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl OutsideMenu {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    async fn login(&mut self, args: &[String]) -> HandlerResult<Step> {
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Username:")).await?,
        };
        let word = match args.get(1) {
            Some(word) => word.clone(),
            None => self.client.input(Some("Password:")).await?,
        };
        match self.hub.accounts.get(&name) {
            Some(account) if account.password_matches(&word) => {
                if account.login(&self.client) {
                    Ok(Step::Push(self.enter_account(name, account)))
                } else {
                    self.client.print("Account is already logged in!").await?;
                    Ok(Step::Idle)
                }
            }
            _ => {
                self.client.print("Authentication failed!").await?;
                Ok(Step::Idle)
            }
        }
    }

    async fn register(&mut self, args: &[String]) -> HandlerResult<Step> {
        if !self.agrees_to_terms().await? {
            return Ok(Step::Exit);
        }
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Username:")).await?,
        };
        if name.split_whitespace().count() > 1 {
            self.client
                .print("Username may not have whitespace!")
                .await?;
            return Ok(Step::Idle);
        }
        if self.hub.accounts.account_exists(&name) {
            self.client.print("Account already exists!").await?;
            return Ok(Step::Idle);
        }
        let word = match args.get(1) {
            Some(word) => word.clone(),
            None => self.client.input(Some("Password:")).await?,
        };
        if word.split_whitespace().count() != 1 {
            self.client
                .print("Password may not have whitespace!")
                .await?;
            return Ok(Step::Idle);
        }
        match self.hub.accounts.register(&name, &word) {
            Some(account) => {
                account.login(&self.client);
                info!(name = %name, administrator = account.is_administrator(), "Account registered");
                Ok(Step::Push(self.enter_account(name, account)))
            }
            None => {
                self.client.print("Account already exists!").await?;
                Ok(Step::Idle)
            }
        }
    }

    fn enter_account(&self, name: String, account: Arc<Account>) -> Box<dyn Handler> {
        self.client.set_identity(name, account);
        Box::new(InsideMenu::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.client),
        ))
    }

    async fn agrees_to_terms(&mut self) -> HandlerResult<bool> {
        self.client.print(TERMS_OF_SERVICE).await?;
        let answer = self.client.input(Some("Do you agree?")).await?;
        Ok(YES_WORDS.contains(&answer.as_str()))
    }

    async fn open_source(&mut self, args: &[String]) -> HandlerResult<()> {
        let confirmed = args.first().map(String::as_str) == Some("force")
            || YES_WORDS.contains(&self.client.input(Some("Are you sure?")).await?.as_str());
        if confirmed {
            for line in crate::source::render() {
                self.client.print(&line).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for OutsideMenu {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print(BANNER).await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for OutsideMenu {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "login" => self.login(args).await,
            "register" => self.register(args).await,
            "open_source" => {
                self.open_source(args).await?;
                Ok(Step::Idle)
            }
            _ => Ok(Step::Idle),
        }
    }
}
