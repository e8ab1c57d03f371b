//! The inbox manager: list, read, compose, delete.

use crate::error::HandlerResult;
use crate::handlers::{current_account, current_name};
use crate::network::LineClient;
use crate::session::{COMMAND_PROMPT, Console, Handler, Next, Step, Verb, command_loop};
use crate::state::{Account, Hub, InboxMessage};
use async_trait::async_trait;
use std::sync::Arc;

const SUMMARY_LENGTH: usize = 70;
const RULE_WIDTH: usize = 70;

const VERBS: &[Verb] = &[
    Verb {
        name: "delete",
        help: "Provides various options for deleting your messages.",
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
        name: "read",
        help: "Allows you to read a message in its entirety.",
    },
    Verb {
        name: "send",
        help: "Allows you to send a message to someone else.",
    },
    Verb {
        name: "show",
        help: "Shows messages summaries with status information.",
    },
];

/// Selection produced by the message picker.
enum Selection {
    One(InboxMessage),
    Many(Vec<InboxMessage>),
}

/// Editor over the logged-in account's inbox.
pub struct MessageManager {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
}

impl MessageManager {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>) -> Self {
        Self { hub, client }
    }

    async fn delete(&mut self, args: &[String]) -> HandlerResult<()> {
        let account = current_account(&self.client)?;
        let Some(selection) = self.parse_args(&account, args, true).await? else {
            return Ok(());
        };
        let ids: Vec<u64> = match selection {
            Selection::One(message) => vec![message.id],
            Selection::Many(messages) => messages.iter().map(|m| m.id).collect(),
        };
        account.delete_messages(&ids);
        self.client.print("Deletion has been completed.").await
    }

    async fn read(&mut self, args: &[String]) -> HandlerResult<()> {
        let account = current_account(&self.client)?;
        let Some(selection) = self.parse_args(&account, args, false).await? else {
            return Ok(());
        };
        let Selection::One(message) = selection else {
            return Ok(());
        };
        let message = account.mark_read(message.id).unwrap_or(message);
        self.client
            .print(&format!("From: {}", message.source))
            .await?;
        let rule = "=".repeat(RULE_WIDTH);
        self.client.print(&rule).await?;
        let paragraphs: Vec<&str> = message.body.split("\n\n").collect();
        for (index, paragraph) in paragraphs.iter().enumerate() {
            for line in wrap(&paragraph.replace('\n', " "), RULE_WIDTH) {
                self.client.print(&line).await?;
            }
            if index + 1 < paragraphs.len() {
                self.client.print("").await?;
            }
        }
        self.client.print(&rule).await
    }

    async fn send(&mut self, args: &[String]) -> HandlerResult<()> {
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Destination:")).await?,
        };
        if name == current_name(&self.client)? {
            return self
                .client
                .print("You are not allowed to talk to yourself.")
                .await;
        }
        if !self.hub.accounts.account_exists(&name) {
            return self.client.print("Account does not exist.").await;
        }
        let text = self.compose().await?;
        if text.is_empty() {
            return self.client.print("Empty messages may not be sent.").await;
        }
        let me = current_name(&self.client)?;
        if self.hub.accounts.deliver_message(&me, &name, &text).await {
            self.client.print("Message has been delivered.").await
        } else {
            self.client
                .print(&format!("{name} was removed while you were writing."))
                .await
        }
    }

    /// Free-form paragraph input, terminated by two blank lines.
    async fn compose(&mut self) -> HandlerResult<String> {
        self.client.print("Please compose your message.").await?;
        self.client.print("Enter 2 blank lines to send.").await?;
        let rule = "=".repeat(RULE_WIDTH);
        self.client.print(&rule).await?;
        let mut lines: Vec<String> = Vec::new();
        while lines.len() < 2 || lines[lines.len() - 2..] != ["", ""] {
            lines.push(self.client.input(None).await?);
        }
        self.client.print(&rule).await?;
        while lines.first().is_some_and(|line| line.is_empty()) {
            lines.remove(0);
        }
        lines.truncate(lines.len().saturating_sub(2));
        Ok(lines.join("\n"))
    }

    /// Resolve an argument (index, `all`, `read`/`unread`, or a source
    /// name) or fall back to the interactive picker.
    async fn parse_args(
        &mut self,
        account: &Account,
        args: &[String],
        allow_all: bool,
    ) -> HandlerResult<Option<Selection>> {
        if let Some(clue) = args.first() {
            return self.find_message(account, clue, allow_all).await;
        }
        let messages =
            print_message_summary(&self.client, account, true, SUMMARY_LENGTH, None, None).await?;
        self.pick_message(messages, allow_all).await
    }

    async fn find_message(
        &mut self,
        account: &Account,
        clue: &str,
        allow_all: bool,
    ) -> HandlerResult<Option<Selection>> {
        if let Ok(number) = clue.parse::<usize>() {
            let messages = account.messages();
            return match number.checked_sub(1).filter(|i| *i < messages.len()) {
                Some(index) => Ok(Some(Selection::One(messages[index].clone()))),
                None => {
                    self.client
                        .print("That is not a valid message number.")
                        .await?;
                    Ok(None)
                }
            };
        }
        let (status, source) = if clue == "read" || clue == "unread" {
            (Some(clue), None)
        } else {
            (None, Some(clue))
        };
        let messages =
            print_message_summary(&self.client, account, true, SUMMARY_LENGTH, status, source)
                .await?;
        self.pick_message(messages, allow_all).await
    }

    async fn pick_message(
        &mut self,
        messages: Vec<InboxMessage>,
        allow_all: bool,
    ) -> HandlerResult<Option<Selection>> {
        while !messages.is_empty() {
            let line = self.client.input(Some("Which one?")).await?;
            if line.is_empty() {
                self.client.print("Cancelling ...").await?;
                return Ok(None);
            }
            if allow_all && line == "all" {
                return Ok(Some(Selection::Many(messages)));
            }
            match super::admin::parse_index(&line, messages.len()) {
                Some(index) => return Ok(Some(Selection::One(messages[index].clone()))),
                None => {
                    self.client
                        .print("Please enter a valid message number.")
                        .await?;
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Handler for MessageManager {
    async fn handle(&mut self) -> HandlerResult<Next> {
        self.client.print("Opening message manager ...").await?;
        command_loop(self, COMMAND_PROMPT).await
    }
}

#[async_trait]
impl Console for MessageManager {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "delete" => self.delete(args).await?,
            "read" => self.read(args).await?,
            "send" => self.send(args).await?,
            "show" => {
                let account = current_account(&self.client)?;
                print_message_summary(&self.client, &account, true, SUMMARY_LENGTH, None, None)
                    .await?;
            }
            _ => {}
        }
        Ok(Step::Idle)
    }
}

/// Keep only messages matching a read/unread status.
fn prune_by_status(status: Option<&str>, messages: Vec<InboxMessage>) -> Vec<InboxMessage> {
    match status {
        Some(status) => messages
            .into_iter()
            .filter(|m| m.unread == (status == "unread"))
            .collect(),
        None => messages,
    }
}

/// Keep only messages from one source.
fn prune_by_source(source: Option<&str>, messages: Vec<InboxMessage>) -> Vec<InboxMessage> {
    match source {
        Some(source) => messages
            .into_iter()
            .filter(|m| m.source == source)
            .collect(),
        None => messages,
    }
}

/// Print clipped one-line summaries and return the listed messages in the
/// printed order.
pub(crate) async fn print_message_summary(
    client: &LineClient,
    account: &Account,
    with_status: bool,
    length: usize,
    filter_status: Option<&str>,
    filter_source: Option<&str>,
) -> HandlerResult<Vec<InboxMessage>> {
    let messages = prune_by_source(
        filter_source,
        prune_by_status(filter_status, account.messages()),
    );
    if messages.is_empty() {
        client.print("There are no messages.").await?;
        return Ok(messages);
    }
    for (index, message) in messages.iter().enumerate() {
        let filler = if with_status {
            if message.unread { " [Unread]" } else { " [read]" }
        } else {
            ""
        };
        client
            .print(&format!(
                "Message {} from {}{filler}:",
                index + 1,
                message.source
            ))
            .await?;
        let text = message.body.replace('\n', " ");
        let clipped: String = text.chars().take(length).collect();
        if text.chars().count() > length {
            client.print(&format!("    {clipped}...")).await?;
        } else {
            client.print(&format!("    {clipped}")).await?;
        }
    }
    Ok(messages)
}

/// Greedy word wrap; words longer than the width get their own line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(source: &str, body: &str, unread: bool) -> InboxMessage {
        InboxMessage {
            id: 0,
            source: source.to_string(),
            body: body.to_string(),
            unread,
            sent_at: 0,
        }
    }

    #[test]
    fn status_filter_matches_unread_flag() {
        let messages = vec![message("a", "x", true), message("b", "y", false)];
        let unread = prune_by_status(Some("unread"), messages.clone());
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].source, "a");
        let read = prune_by_status(Some("read"), messages.clone());
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].source, "b");
        assert_eq!(prune_by_status(None, messages).len(), 2);
    }

    #[test]
    fn source_filter_matches_exactly() {
        let messages = vec![message("alice", "x", true), message("bob", "y", true)];
        let from_bob = prune_by_source(Some("bob"), messages);
        assert_eq!(from_bob.len(), 1);
        assert_eq!(from_bob[0].source, "bob");
    }

    #[test]
    fn wrap_is_greedy_and_total() {
        let lines = wrap("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert!(wrap("", 10).is_empty());
        let long = wrap("short extraordinarily-long-word end", 10);
        assert_eq!(long, vec!["short", "extraordinarily-long-word", "end"]);
    }
}
