//! The handler abstraction and its command loop.
//!
//! Every interactive subsystem of the server is a [`Handler`]: the ban
//! screen, the menus, the admin consoles, channels and the expression
//! evaluators. A handler's `handle` call returns the next handler to push,
//! `None` to pop back to its parent, or fails with the disconnect signal.
//!
//! Menu-style handlers also implement [`Console`], exposing a verb table
//! that [`command_loop`] drives: lines are tokenized on whitespace, the
//! first token selects a verb, and the reserved verbs (`help`, `?`,
//! `__json_help__` and the stop words) are handled uniformly.

pub mod stack;

use crate::error::HandlerResult;
use crate::network::LineClient;
use async_trait::async_trait;
use std::sync::Arc;

pub use stack::HandlerStack;

/// Words accepted as an affirmative answer.
pub const YES_WORDS: &[&str] = &["yes", "true", "1"];

/// Words that exit a command loop or REPL.
pub const STOP_WORDS: &[&str] = &["exit", "quit", "stop"];

/// The default command-loop prompt.
pub const COMMAND_PROMPT: &str = "Command:";

/// What a finished handler hands back to the stack: a handler to push,
/// or nothing to pop the current frame.
pub type Next = Option<Box<dyn Handler>>;

/// A stateful object driving one modal step of the user interface.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&mut self) -> HandlerResult<Next>;
}

/// One entry in a handler's verb table.
pub struct Verb {
    pub name: &'static str,
    pub help: &'static str,
}

/// Result of running a single verb.
pub enum Step {
    /// Stay in the command loop.
    Idle,
    /// Leave the current handler (pop).
    Exit,
    /// Descend into a sub-handler (push).
    Push(Box<dyn Handler>),
}

/// A handler with a dispatchable command vocabulary.
#[async_trait]
pub trait Console: Send {
    fn client(&self) -> &Arc<LineClient>;

    /// The verb table, sorted by name. `help` and `__json_help__` enumerate
    /// exactly this set.
    fn verbs(&self) -> &'static [Verb];

    /// Run one verb from the table with the tokens that followed it.
    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step>;
}

/// Result of dispatching one input line.
pub enum Outcome {
    /// Nothing to report; read the next line.
    Silent,
    /// `__json_help__` ran; suppress the next prompt exactly once.
    Mute,
    /// The verb is not in the table.
    Unknown,
    /// Pop the current handler.
    Exit,
    /// Push this handler.
    Push(Box<dyn Handler>),
}

/// Tokenize a line and route its first token through the reserved verbs and
/// the console's verb table.
pub async fn dispatch_line<C>(console: &mut C, line: &str) -> HandlerResult<Outcome>
where
    C: Console + ?Sized,
{
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
        return Ok(Outcome::Silent);
    };
    let args: Vec<String> = tokens.map(str::to_owned).collect();
    if first == "__json_help__" {
        let catalog = json_help(console.verbs())?;
        console.client().print(&catalog).await?;
        return Ok(Outcome::Mute);
    }
    let verb = if first == "?" { "help" } else { first };
    if verb == "help" {
        print_help(console, &args).await?;
        return Ok(Outcome::Silent);
    }
    if STOP_WORDS.contains(&verb) {
        return Ok(Outcome::Exit);
    }
    if !console.verbs().iter().any(|v| v.name == verb) {
        return Ok(Outcome::Unknown);
    }
    match console.run_verb(verb, &args).await? {
        Step::Idle => Ok(Outcome::Silent),
        Step::Exit => Ok(Outcome::Exit),
        Step::Push(next) => Ok(Outcome::Push(next)),
    }
}

/// Prompt for lines and dispatch them until a verb pops or pushes.
pub async fn command_loop<C>(console: &mut C, prompt: &str) -> HandlerResult<Next>
where
    C: Console + ?Sized,
{
    let mut mute = false;
    loop {
        let line = if mute {
            console.client().input(None).await?
        } else {
            console.client().input(Some(prompt)).await?
        };
        mute = false;
        match dispatch_line(console, &line).await? {
            Outcome::Silent => {}
            Outcome::Mute => mute = true,
            Outcome::Unknown => console.client().print("Command not found!").await?,
            Outcome::Exit => return Ok(None),
            Outcome::Push(next) => return Ok(Some(next)),
        }
    }
}

async fn print_help<C>(console: &mut C, args: &[String]) -> HandlerResult<()>
where
    C: Console + ?Sized,
{
    if let Some(first) = args.first() {
        let name = if first == "?" { "help" } else { first.as_str() };
        console
            .client()
            .print(verb_help(console.verbs(), name))
            .await
    } else {
        console.client().print(&help_catalog(console.verbs())).await?;
        console
            .client()
            .print("Call help with command name for more info.")
            .await
    }
}

/// The `help` listing: every verb, one per indented line.
pub fn help_catalog(verbs: &[Verb]) -> String {
    let mut catalog = String::from("Command list:");
    for verb in verbs {
        catalog.push_str("\n    ");
        catalog.push_str(verb.name);
    }
    catalog
}

/// The doc string for one verb, or the standard fallbacks.
pub fn verb_help<'a>(verbs: &'a [Verb], name: &str) -> &'a str {
    match verbs.iter().find(|v| v.name == name) {
        Some(verb) if !verb.help.is_empty() => verb.help,
        Some(_) => "Command has no help!",
        None => "Command not found!",
    }
}

/// Serialize `{verb: doc}` for every verb as one JSON line.
pub fn json_help(verbs: &[Verb]) -> serde_json::Result<String> {
    let mut package = serde_json::Map::new();
    for verb in verbs {
        package.insert(
            verb.name.to_string(),
            serde_json::Value::String(verb.help.to_string()),
        );
    }
    serde_json::to_string(&serde_json::Value::Object(package))
}
