//! Channel membership: the message loop and the takeover admin console.
//!
//! A `ChannelSession` is what the stack actually runs while a client sits
//! in a room. Plain lines fan out to the members; lines starting with `:`
//! go through the normal verb dispatch. `ChannelAdmin` holds the room's
//! try-only admin gate for the duration of its command loop and hands the
//! client back to the room when it closes.

use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{MarkVShaney, current_account, current_name};
use crate::network::LineClient;
use crate::session::{
    COMMAND_PROMPT, Console, Handler, Next, Outcome, Step, Verb, YES_WORDS, command_loop,
    dispatch_line,
};
use crate::state::{ChannelLine, ChannelRoom, Entry, Hub, OwnerChange, RenameOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::info;

const SESSION_VERBS: &[Verb] = &[
    Verb {
        name: "admin",
        help: "Owner: change this channels settings.",
    },
    Verb {
        name: "ban",
        help: "Owner: ban a user from joining this channel.",
    },
    Verb {
        name: "bot",
        help: "Owner: add optional channel commands.",
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
        name: "invite",
        help: "Invite someone to join this channel.",
    },
    Verb {
        name: "kick",
        help: "Owner: kick a user off this channel.",
    },
    Verb {
        name: "list",
        help: "Show everyone connected to this channel.",
    },
    Verb {
        name: "map",
        help: "Owner: add optional channel modifiers.",
    },
    Verb {
        name: "mute",
        help: "Access and change your muted user list.",
    },
    Verb {
        name: "run",
        help: "Owner: add optional channel extensions.",
    },
    Verb {
        name: "summary",
        help: "Proof of concept: Mark V Shaney summarizes the channel.",
    },
    Verb {
        name: "whisper",
        help: "Send a message to one specific person.",
    },
];

/// One client's presence in a room.
pub struct ChannelSession {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
    room: Arc<ChannelRoom>,
}

impl ChannelSession {
    /// The caller must have connected `client` to `room` already.
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>, room: Arc<ChannelRoom>) -> Self {
        Self { hub, client, room }
    }

    async fn dispatch(&mut self) -> HandlerResult<Next> {
        let name = current_name(&self.client)?;
        match self.room.begin_entry(&name) {
            Entry::Bounced => Ok(None),
            Entry::SettingUp(owner) => {
                self.client
                    .print(&format!("{owner} is setting up this channel."))
                    .await?;
                Ok(None)
            }
            Entry::RunSetup => {
                let outcome = self.setup_channel().await;
                self.room.finish_setup();
                outcome?;
                self.run_channel().await
            }
            Entry::Run => self.run_channel().await,
        }
    }

    // Setup wizard (password, buffer size, replay size)

    async fn setup_channel(&mut self) -> HandlerResult<()> {
        self.setup_password().await?;
        let answer = self
            .client
            .input(Some("Do you want to set the buffer size?"))
            .await?;
        if YES_WORDS.contains(&answer.as_str()) {
            let size = get_size(&self.client, None).await?;
            self.room.set_buffer_size(size);
        }
        let answer = self
            .client
            .input(Some("Do you want to set the replay size?"))
            .await?;
        if YES_WORDS.contains(&answer.as_str()) {
            let size = get_size(&self.client, None).await?;
            self.room.set_replay_size(size);
        }
        Ok(())
    }

    async fn setup_password(&mut self) -> HandlerResult<()> {
        let answer = self
            .client
            .input(Some("Password protect this channel?"))
            .await?;
        if !YES_WORDS.contains(&answer.as_str()) {
            return Ok(());
        }
        loop {
            let password = self.client.input(Some("Set password to:")).await?;
            if password.is_empty() {
                self.client.print("Password may not be empty.").await?;
            } else {
                self.room.set_password(password);
                return Ok(());
            }
        }
    }

    // Normal entry

    async fn run_channel(&mut self) -> HandlerResult<Next> {
        let name = current_name(&self.client)?;
        if self.room.is_banned(&name) {
            self.client
                .print("You have been banned from this channel.")
                .await?;
            return Ok(None);
        }
        if !self.authenticate().await? {
            self.client.print("You have failed authentication.").await?;
            return Ok(None);
        }
        for line in self.room.replay_lines() {
            self.client.print(&line.render()).await?;
        }
        let connected = self.room.member_count();
        self.client
            .print(&format!(
                "{connected} {} connected.",
                if connected == 1 {
                    "person is"
                } else {
                    "people are"
                }
            ))
            .await?;
        let outcome = self.message_loop(&name).await;
        let leave = ChannelLine::new("EVENT", format!("{name} is leaving."));
        self.room.broadcast(&leave, self.client.id(), false).await;
        outcome
    }

    async fn authenticate(&mut self) -> HandlerResult<bool> {
        let password = self.room.password();
        if password.is_empty() || self.privileged(false).await? {
            return Ok(true);
        }
        let answer = self.client.input(Some("Password to connect:")).await?;
        Ok(answer == password)
    }

    async fn message_loop(&mut self, name: &str) -> HandlerResult<Next> {
        let join = ChannelLine::new("EVENT", format!("{name} is joining."));
        self.room.broadcast(&join, self.client.id(), false).await;
        loop {
            let line = self.client.input(None).await?;
            if self.room.is_kicked(name) {
                self.client
                    .print("You have been kicked out of this channel.")
                    .await?;
                return Ok(None);
            }
            if let Some(command) = line.strip_prefix(':') {
                match dispatch_line(self, command).await? {
                    Outcome::Silent | Outcome::Mute => {}
                    Outcome::Unknown => self.client.print("Command not found!").await?,
                    Outcome::Exit => return Ok(None),
                    Outcome::Push(next) => return Ok(Some(next)),
                }
            } else {
                // join/leave events are never buffered; chat lines are
                let channel_line = self.room.add_line(name, &line);
                self.room.broadcast(&channel_line, self.client.id(), true).await;
            }
        }
    }

    /// Global administrator or channel owner.
    async fn privileged(&self, show_error: bool) -> HandlerResult<bool> {
        let account = current_account(&self.client)?;
        if account.is_administrator() {
            return Ok(true);
        }
        let name = current_name(&self.client)?;
        if self.room.is_owner(&name) {
            return Ok(true);
        }
        if show_error {
            self.client
                .print("Only administrators or channel owner may do that.")
                .await?;
        }
        Ok(false)
    }

    /// Owner protection and the admin shield; `None` means the name does
    /// not exist (already reported).
    async fn is_protected(&self, name: &str) -> HandlerResult<Option<bool>> {
        if self.room.is_owner(name) {
            return Ok(Some(true));
        }
        match self.hub.accounts.is_administrator(name) {
            Some(administrator) => Ok(Some(administrator)),
            None => {
                self.client.print(&format!("{name} does not exist.")).await?;
                Ok(None)
            }
        }
    }

    // Verbs

    async fn ban(&mut self, args: &[String]) -> HandlerResult<()> {
        if !self.privileged(true).await? {
            return Ok(());
        }
        match args.first().map(String::as_str) {
            Some("add") => {
                let name = self.name_argument(args.get(1)).await?;
                let Some(name) = name else {
                    return self.client.print("Cancelling ...").await;
                };
                self.add_ban(&name).await
            }
            Some("del") => {
                let name = self.name_argument(args.get(1)).await?;
                let Some(name) = name else {
                    return self.client.print("Cancelling ...").await;
                };
                if self.room.del_ban(&name) {
                    self.client
                        .print(&format!("{name} is no longer banned on this channel."))
                        .await
                } else {
                    self.client
                        .print(&format!("{name} was not banned on this channel."))
                        .await
                }
            }
            Some("list") => {
                let banned = self.room.banned();
                if banned.is_empty() {
                    self.client
                        .print("No one has been banned on this channel.")
                        .await
                } else {
                    self.client
                        .print("Those that are banned from this channel:")
                        .await?;
                    for name in banned {
                        self.client.print(&format!("    {name}")).await?;
                    }
                    Ok(())
                }
            }
            _ => self.client.print("Try add, del, or list.").await,
        }
    }

    async fn add_ban(&mut self, name: &str) -> HandlerResult<()> {
        match self.is_protected(name).await? {
            None => Ok(()),
            Some(true) => {
                self.client
                    .print(&format!("{name} cannot be banned."))
                    .await
            }
            Some(false) => {
                if self.room.add_ban(name) {
                    // banning a present member implies kicking them
                    self.kick(&[name.to_string()], false).await?;
                    self.client.print(&format!("{name} has been banned.")).await
                } else {
                    self.client
                        .print(&format!("{name} was already been banned."))
                        .await
                }
            }
        }
    }

    async fn invite(&mut self, args: &[String]) -> HandlerResult<()> {
        let channel_name = self.room.name();
        let password = self.room.password();
        let Some(channel_name) = channel_name else {
            return self
                .client
                .print("This channel has been permanently closed.")
                .await;
        };
        if !password.is_empty() && !self.privileged(true).await? {
            return Ok(());
        }
        let Some(name) = self.name_argument(args.first()).await? else {
            return self.client.print("Cancelling ...").await;
        };
        let me = current_name(&self.client)?;
        if name == me {
            return self.client.print("You are already here.").await;
        }
        let mut message = format!("{me} has invited you to channel {channel_name}.");
        if !password.is_empty() {
            message.push_str(&format!("\n\nUse this to get in: '{password}'"));
        }
        if self.hub.accounts.deliver_message(&me, &name, &message).await {
            self.client.print("Invitation has been sent.").await
        } else {
            self.client.print(&format!("{name} does not exist.")).await
        }
    }

    async fn kick(&mut self, args: &[String], verbose: bool) -> HandlerResult<()> {
        if !self.privileged(true).await? {
            return Ok(());
        }
        let name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("Who?")).await?,
        };
        if name.is_empty() {
            if verbose {
                self.client.print("Cancelling ...").await?;
            }
            return Ok(());
        }
        match self.is_protected(&name).await? {
            None => Ok(()),
            Some(true) => {
                if verbose {
                    self.client
                        .print(&format!("{name} cannot be kicked."))
                        .await?;
                }
                Ok(())
            }
            Some(false) => {
                if self.room.kick_if_connected(&name) {
                    if verbose {
                        self.client.print(&format!("{name} has been kicked.")).await?;
                    }
                } else if verbose {
                    self.client
                        .print(&format!("{name} is not on this channel."))
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn list(&self) -> HandlerResult<()> {
        let members = self.room.member_names();
        if members.len() == 1 {
            self.client.print("You alone are on this channel.").await
        } else {
            self.client
                .print("Current connected to this channel:")
                .await?;
            for name in members {
                self.client.print(&format!("    {name}")).await?;
            }
            Ok(())
        }
    }

    async fn mute(&mut self, args: &[String]) -> HandlerResult<()> {
        let me = current_name(&self.client)?;
        match args.first().map(String::as_str) {
            Some("add") => {
                let muted = match args.get(1) {
                    Some(muted) => muted.clone(),
                    None => self.client.input(Some("Who?")).await?,
                };
                if !self.hub.accounts.account_exists(&muted) {
                    if muted.is_empty() {
                        self.client.print("Cancelling ...").await
                    } else {
                        self.client.print(&format!("{muted} does not exist.")).await
                    }
                } else if self.room.add_mute(&muted, &me) {
                    self.client.print(&format!("{muted} has been muted.")).await
                } else {
                    self.client
                        .print(&format!("{muted} was already muted."))
                        .await
                }
            }
            Some("del") => {
                let muted = match args.get(1) {
                    Some(muted) => muted.clone(),
                    None => self.client.input(Some("Who?")).await?,
                };
                if muted.is_empty() {
                    self.client.print("Cancelling ...").await
                } else if self.room.del_mute(&muted, &me) {
                    self.client
                        .print(&format!("{muted} is no longer muted."))
                        .await
                } else {
                    self.client.print(&format!("{muted} was not muted.")).await
                }
            }
            Some("list") => {
                let muted = self.room.mutes_by(&me);
                if muted.is_empty() {
                    self.client.print("Your list is empty.").await
                } else {
                    let mut listing = String::from("You have muted:");
                    for name in muted {
                        listing.push_str("\n    ");
                        listing.push_str(&name);
                    }
                    self.client.print(&listing).await
                }
            }
            _ => self.client.print("Try add, del, or list.").await,
        }
    }

    async fn summary(&mut self) -> HandlerResult<Step> {
        let buffer = self.room.buffer_snapshot();
        if buffer.is_empty() {
            self.client.print("There is nothing to summarize.").await?;
            return Ok(Step::Idle);
        }
        let size = (buffer.len() + 3) / 4;
        Ok(Step::Push(Box::new(MarkVShaney::new(
            Arc::clone(&self.client),
            buffer,
            size,
            Arc::clone(&self.room),
        ))))
    }

    async fn whisper(&mut self, args: &[String]) -> HandlerResult<()> {
        let Some(name) = self.name_argument(args.first()).await? else {
            return self.client.print("Cancelling ...").await;
        };
        if !self.hub.accounts.account_exists(&name) {
            return self.client.print(&format!("{name} does not exist.")).await;
        }
        let message = self.client.input(Some("Message:")).await?;
        if message.is_empty() {
            return self
                .client
                .print("You may not whisper empty messages.")
                .await;
        }
        let me = current_name(&self.client)?;
        // a recipient blocked by the sender's own muter entry gets the
        // whisper as inbox mail instead of in real time
        let delivered = match self.room.whisper_target(&me, &name) {
            Some(target) => {
                let _ = target.print(&format!("({me}) {message}")).await;
                true
            }
            None => self.hub.accounts.deliver_message(&me, &name, &message).await,
        };
        if delivered {
            self.client.print("Message sent.").await
        } else {
            self.client
                .print(&format!("{name} no longer has an account."))
                .await
        }
    }

    async fn name_argument(&mut self, arg: Option<&String>) -> HandlerResult<Option<String>> {
        let name = match arg {
            Some(name) => name.clone(),
            None => self.client.input(Some("Who?")).await?,
        };
        Ok((!name.is_empty()).then_some(name))
    }
}

#[async_trait]
impl Handler for ChannelSession {
    async fn handle(&mut self) -> HandlerResult<Next> {
        let outcome = self.dispatch().await;
        // leaving for any reason consumes this name's kick marks
        if let Some(name) = self.client.name() {
            self.room.drain_kicks(&name);
        }
        self.room.disconnect(self.client.id());
        outcome
    }
}

#[async_trait]
impl Console for ChannelSession {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        SESSION_VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "admin" => {
                if self.privileged(true).await? {
                    return Ok(Step::Push(Box::new(ChannelAdmin::new(
                        Arc::clone(&self.hub),
                        Arc::clone(&self.client),
                        Arc::clone(&self.room),
                    ))));
                }
                Ok(Step::Idle)
            }
            "ban" => {
                self.ban(args).await?;
                Ok(Step::Idle)
            }
            "invite" => {
                self.invite(args).await?;
                Ok(Step::Idle)
            }
            "kick" => {
                self.kick(args, true).await?;
                Ok(Step::Idle)
            }
            "list" => {
                self.list().await?;
                Ok(Step::Idle)
            }
            "mute" => {
                self.mute(args).await?;
                Ok(Step::Idle)
            }
            "summary" => self.summary().await,
            "whisper" => {
                self.whisper(args).await?;
                Ok(Step::Idle)
            }
            "bot" | "map" | "run" => {
                if self.privileged(true).await? {
                    self.client
                        .print("Reserved command for future expansion ...")
                        .await?;
                }
                Ok(Step::Idle)
            }
            _ => Ok(Step::Idle),
        }
    }
}

const ADMIN_VERBS: &[Verb] = &[
    Verb {
        name: "buffer",
        help: "Set the buffer size of this channel.",
    },
    Verb {
        name: "close",
        help: "Kick everyone off the channel (useful after delete).",
    },
    Verb {
        name: "delete",
        help: "Un-register this channel as though it did not exist.",
    },
    Verb {
        name: "exit",
        help: "Exit from this area of the server.",
    },
    Verb {
        name: "finalize",
        help: "Delete, close, and reset the channel (returns you to main menu).",
    },
    Verb {
        name: "help",
        help: "Call help with a command name for more information.",
    },
    Verb {
        name: "history",
        help: "Show the entire contents of the channel buffer.",
    },
    Verb {
        name: "owner",
        help: "Change the owner of this channel.",
    },
    Verb {
        name: "password",
        help: "Change the password of this channel.",
    },
    Verb {
        name: "purge",
        help: "Clear the contents of the channel buffer.",
    },
    Verb {
        name: "rename",
        help: "Give this channel a new name not used by another channel.",
    },
    Verb {
        name: "replay",
        help: "Set the replay size of this channel.",
    },
    Verb {
        name: "reset",
        help: "Make the channel like new again with nothing in it.",
    },
    Verb {
        name: "settings",
        help: "Show channel owner, password, buffer size, and replay size.",
    },
];

/// Channel settings console; exclusive via the room's admin gate.
pub struct ChannelAdmin {
    hub: Arc<Hub>,
    client: Arc<LineClient>,
    room: Arc<ChannelRoom>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ChannelAdmin {
    pub fn new(hub: Arc<Hub>, client: Arc<LineClient>, room: Arc<ChannelRoom>) -> Self {
        Self {
            hub,
            client,
            room,
            guard: None,
        }
    }

    async fn delete(&mut self) -> HandlerResult<()> {
        match self.room.take_name() {
            None => {
                self.client
                    .print("This channel had been previously deleted.")
                    .await
            }
            Some(name) => {
                if !self.hub.channels.delete_channel(&name) {
                    return Err(HandlerError::Internal(
                        "channel name was set but never registered".to_string(),
                    ));
                }
                info!(channel = %name, "Channel deleted");
                self.client.print("This channel is no longer enabled.").await
            }
        }
    }

    async fn finalize(&mut self) -> HandlerResult<Step> {
        let me = current_name(&self.client)?;
        let name = self.room.finalize_as(&me);
        if let Some(name) = &name {
            self.hub.channels.delete_channel(name);
            info!(channel = %name, "Channel finalized");
        }
        self.client.print("The channel has been finalized.").await?;
        self.client.print("Returning to the main menu ...").await?;
        Ok(Step::Exit)
    }

    async fn history(&self) -> HandlerResult<()> {
        let buffer = self.room.buffer_snapshot();
        if buffer.is_empty() {
            self.client.print("The channel buffer is empty.").await
        } else {
            for line in buffer {
                self.client.print(&line.render()).await?;
            }
            Ok(())
        }
    }

    async fn owner(&mut self, args: &[String]) -> HandlerResult<()> {
        let new_owner = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("New owner:")).await?,
        };
        if new_owner.is_empty() {
            return self.client.print("Cancelling ...").await;
        }
        if args.len() > 1 || new_owner.split_whitespace().count() > 1 {
            return self.client.print("Username may not have whitespace!").await;
        }
        let exists = self.hub.accounts.account_exists(&new_owner);
        match self.room.transfer_owner(&new_owner, exists) {
            OwnerChange::Same => {
                self.client
                    .print(&format!("{new_owner} already owns this channel."))
                    .await
            }
            OwnerChange::Set => {
                self.client
                    .print(&format!("{new_owner} is now the owner of this channel."))
                    .await
            }
            OwnerChange::Missing => {
                self.client
                    .print(&format!("{new_owner} does not have an account."))
                    .await
            }
        }
    }

    async fn password(&mut self, args: &[String]) -> HandlerResult<()> {
        match args.first().map(String::as_str) {
            Some("set") => {
                let word = match args.get(1) {
                    Some(word) => word.clone(),
                    None => self.client.input(Some("Password:")).await?,
                };
                if word.is_empty() {
                    self.client.print("Password may not be empty.").await
                } else {
                    self.room.set_password(word.clone());
                    self.client
                        .print(&format!("Password has been set to: {word}"))
                        .await
                }
            }
            Some("unset") => {
                self.room.clear_password();
                self.client.print("The password has been cleared.").await
            }
            _ => self.client.print("Try set or unset.").await,
        }
    }

    async fn rename(&mut self, args: &[String]) -> HandlerResult<()> {
        let Some(old_name) = self.room.name() else {
            return self.client.print("Deleted channels cannot be renamed.").await;
        };
        let new_name = match args.first() {
            Some(name) => name.clone(),
            None => self.client.input(Some("New name:")).await?,
        };
        if new_name.is_empty() {
            return self.client.print("Cancelling ...").await;
        }
        if args.len() > 1 || new_name.split_whitespace().count() > 1 {
            return self
                .client
                .print("Channel name may not have whitespace!")
                .await;
        }
        match self.hub.channels.rename_channel(&old_name, &new_name) {
            RenameOutcome::Renamed => {
                self.room.set_name(Some(new_name.clone()));
                info!(old = %old_name, new = %new_name, "Channel renamed");
                self.client
                    .print(&format!("{new_name} is the new name of this channel."))
                    .await
            }
            RenameOutcome::Taken => {
                self.client
                    .print(&format!("The name {new_name} is already in use."))
                    .await
            }
            RenameOutcome::Missing => self.client.print("This channel has been deleted.").await,
        }
    }

    async fn reset(&mut self) -> HandlerResult<()> {
        let me = current_name(&self.client)?;
        self.room.reset_as(&me);
        self.client
            .print("Channel has been reset, and you are its owner.")
            .await
    }

    async fn settings(&self) -> HandlerResult<()> {
        let (owner, password, buffer_size, replay_size) = self.room.settings();
        self.client
            .print(&format!("{:<12} {owner}", "Owner:"))
            .await?;
        self.client
            .print(&format!("{:<12} {password}", "Password:"))
            .await?;
        self.client
            .print(&format!("{:<12} {}", "Buffer size:", render_size(buffer_size)))
            .await?;
        self.client
            .print(&format!("{:<12} {}", "Replay size:", render_size(replay_size)))
            .await
    }
}

#[async_trait]
impl Handler for ChannelAdmin {
    async fn handle(&mut self) -> HandlerResult<Next> {
        let me = current_name(&self.client)?;
        match self.room.try_admin(&me) {
            Some(guard) => {
                self.guard = Some(guard);
                self.client.print("Opening admin console ...").await?;
                let outcome = command_loop(self, COMMAND_PROMPT).await;
                self.guard = None;
                let next = outcome?;
                if next.is_none() {
                    self.room.connect(&self.client);
                }
                Ok(next)
            }
            None => {
                let holder = self.room.admin_name();
                self.client
                    .print(&format!("{holder} is currently using the admin console."))
                    .await?;
                self.room.connect(&self.client);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Console for ChannelAdmin {
    fn client(&self) -> &Arc<LineClient> {
        &self.client
    }

    fn verbs(&self) -> &'static [Verb] {
        ADMIN_VERBS
    }

    async fn run_verb(&mut self, verb: &str, args: &[String]) -> HandlerResult<Step> {
        match verb {
            "buffer" => {
                let size = get_size(&self.client, args.first()).await?;
                self.room.set_buffer_size(size);
                Ok(Step::Idle)
            }
            "close" => {
                self.room.kick_everyone();
                self.client
                    .print("Everyone has been kicked off the channel.")
                    .await?;
                Ok(Step::Idle)
            }
            "delete" => {
                self.delete().await?;
                Ok(Step::Idle)
            }
            "finalize" => self.finalize().await,
            "history" => {
                self.history().await?;
                Ok(Step::Idle)
            }
            "owner" => {
                self.owner(args).await?;
                Ok(Step::Idle)
            }
            "password" => {
                self.password(args).await?;
                Ok(Step::Idle)
            }
            "purge" => {
                self.room.purge_buffer();
                self.client.print("The buffer has been cleared.").await?;
                Ok(Step::Idle)
            }
            "rename" => {
                self.rename(args).await?;
                Ok(Step::Idle)
            }
            "replay" => {
                let size = get_size(&self.client, args.first()).await?;
                self.room.set_replay_size(size);
                Ok(Step::Idle)
            }
            "reset" => {
                self.reset().await?;
                Ok(Step::Idle)
            }
            "settings" => {
                self.settings().await?;
                Ok(Step::Idle)
            }
            _ => Ok(Step::Idle),
        }
    }
}

/// Prompt for a size; `all`, `infinite` and `total` mean unlimited. A seed
/// argument is tried once before prompting.
async fn get_size(
    client: &Arc<LineClient>,
    seed: Option<&String>,
) -> HandlerResult<Option<usize>> {
    let mut seed = seed.cloned();
    loop {
        let line = match seed.take() {
            Some(line) => line,
            None => client.input(Some("Size limitation:")).await?,
        };
        if matches!(line.as_str(), "all" | "infinite" | "total") {
            return Ok(None);
        }
        match line.parse::<usize>() {
            Ok(size) => return Ok(Some(size)),
            Err(_) => {
                client.print("Please enter a non-negative number.").await?;
            }
        }
    }
}

fn render_size(size: Option<usize>) -> String {
    match size {
        None => "Infinite".to_string(),
        Some(size) => size.to_string(),
    }
}
