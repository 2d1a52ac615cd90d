//! Command dispatch
//!
//! Maps a command token to an action through a table built once from
//! [`Command`]. A token missing from the table is the "invalid command"
//! branch. Every dispatch yields exactly one reply, and mutating commands may
//! add a broadcast.

use anyhow::Result;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use super::state_store::StateStore;
use crate::protocol::messages::QueryCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    Status,
    Open,
    OpenSilent,
    Close,
    CloseSilent,
    Toggle,
    ToggleSilent,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Open,
    Close,
    Toggle,
}

impl Target {
    pub fn wanted(self, current: bool) -> bool {
        match self {
            Target::Open => true,
            Target::Close => false,
            Target::Toggle => !current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Report,
    Help,
    Mutate { target: Target, silent: bool },
}

impl Command {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn action(self) -> Action {
        match self {
            Command::Status => Action::Report,
            Command::Help => Action::Help,
            Command::Open => Action::Mutate {
                target: Target::Open,
                silent: false,
            },
            Command::OpenSilent => Action::Mutate {
                target: Target::Open,
                silent: true,
            },
            Command::Close => Action::Mutate {
                target: Target::Close,
                silent: false,
            },
            Command::CloseSilent => Action::Mutate {
                target: Target::Close,
                silent: true,
            },
            Command::Toggle => Action::Mutate {
                target: Target::Toggle,
                silent: false,
            },
            Command::ToggleSilent => Action::Mutate {
                target: Target::Toggle,
                silent: true,
            },
        }
    }
}

/// One inbound command, whatever topic it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    pub argument: String,
    /// Opaque requester identity, echoed back untouched.
    pub source: Value,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            argument: String::new(),
            source: Value::Null,
        }
    }

    pub fn from_query(query: QueryCommand) -> Self {
        Self {
            command: query.command,
            argument: String::new(),
            source: query.source,
        }
    }

    /// Parse the argument string of `!spacestatus <command> [args...]`.
    ///
    /// Runs of whitespace separate words; no words at all means `status`.
    pub fn from_chat_arg(arg: &str) -> Self {
        let mut words = arg.split_whitespace();
        let command = words.next().unwrap_or(Command::Status.name()).to_string();
        let argument = words.collect::<Vec<_>>().join(" ");
        Self {
            command,
            argument,
            source: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgment {
    pub command: Command,
    pub is_open: bool,
    pub has_changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack(Acknowledgment),
    Help {
        commands: Vec<&'static str>,
    },
    Invalid {
        command: String,
        commands: Vec<&'static str>,
    },
}

/// Announcement for every listener, not only the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Broadcast {
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub reply: Reply,
    pub broadcast: Option<Broadcast>,
    pub source: Value,
}

pub struct CommandRouter {
    store: Arc<StateStore>,
    table: HashMap<&'static str, Command>,
}

impl CommandRouter {
    pub fn new(store: Arc<StateStore>) -> Self {
        let table = Command::iter()
            .map(|command| (command.name(), command))
            .collect();
        Self { store, table }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn lookup(&self, token: &str) -> Option<Command> {
        self.table.get(token).copied()
    }

    /// Known command names, each once, in declaration order.
    pub fn command_names(&self) -> Vec<&'static str> {
        Command::iter().map(Command::name).collect()
    }

    /// Run one command.
    ///
    /// Only a failure to persist the flag is returned as an error; it is fatal.
    pub fn dispatch(&self, request: &CommandRequest) -> Result<Dispatch> {
        log::info!(
            "Received spacestatus command {:?} (argument {:?})",
            request.command,
            request.argument
        );

        let Some(command) = self.lookup(&request.command) else {
            log::warn!("Invalid spacestatus command {:?}", request.command);
            return Ok(Dispatch {
                reply: Reply::Invalid {
                    command: request.command.clone(),
                    commands: self.command_names(),
                },
                broadcast: None,
                source: request.source.clone(),
            });
        };

        let (reply, broadcast) = match command.action() {
            Action::Report => {
                let ack = Acknowledgment {
                    command,
                    is_open: self.store.read_state(),
                    has_changed: false,
                };
                (Reply::Ack(ack), None)
            }
            Action::Help => (
                Reply::Help {
                    commands: self.command_names(),
                },
                None,
            ),
            Action::Mutate { target, silent } => {
                let transition = self.store.transition(|current| target.wanted(current))?;
                self.store.check_changed_state();

                let has_changed = transition.has_changed();
                let broadcast = (!silent && has_changed).then_some(Broadcast {
                    is_open: transition.current,
                });
                let ack = Acknowledgment {
                    command,
                    is_open: transition.current,
                    has_changed,
                };
                (Reply::Ack(ack), broadcast)
            }
        };

        Ok(Dispatch {
            reply,
            broadcast,
            source: request.source.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hub::{ChangeEvent, StateChangeHub};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        router: CommandRouter,
        changes: Arc<Mutex<Vec<bool>>>,
    }

    fn fixture(initially_open: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status");
        fs::write(&path, if initially_open { "1" } else { "0" }).unwrap();

        let hub = Arc::new(StateChangeHub::new());
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        hub.subscribe(move |event: &ChangeEvent| sink.lock().push(event.new_state));

        let store = Arc::new(StateStore::open(path, hub));
        Fixture {
            _dir: dir,
            router: CommandRouter::new(store),
            changes,
        }
    }

    fn ack(dispatch: &Dispatch) -> &Acknowledgment {
        match &dispatch.reply {
            Reply::Ack(ack) => ack,
            other => panic!("expected an acknowledgment, got {other:?}"),
        }
    }

    #[test]
    fn test_open_when_already_open_does_not_broadcast() -> Result<()> {
        let fx = fixture(true);
        let dispatch = fx.router.dispatch(&CommandRequest::new("open"))?;

        let ack = ack(&dispatch);
        assert!(ack.is_open);
        assert!(!ack.has_changed);
        assert_eq!(dispatch.broadcast, None);
        assert!(fx.changes.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_open_when_closed_acknowledges_and_broadcasts() -> Result<()> {
        let fx = fixture(false);
        let dispatch = fx.router.dispatch(&CommandRequest::new("open"))?;

        let ack = ack(&dispatch);
        assert!(ack.is_open);
        assert!(ack.has_changed);
        assert_eq!(dispatch.broadcast, Some(Broadcast { is_open: true }));
        assert!(fx.router.store().read_state());
        assert_eq!(*fx.changes.lock(), vec![true]);
        Ok(())
    }

    #[test]
    fn test_silent_open_changes_state_without_broadcast() -> Result<()> {
        let fx = fixture(false);
        let dispatch = fx.router.dispatch(&CommandRequest::new("open_silent"))?;

        let ack = ack(&dispatch);
        assert!(ack.is_open);
        assert!(ack.has_changed);
        assert_eq!(dispatch.broadcast, None);
        // The state-change path still runs for silent commands.
        assert_eq!(*fx.changes.lock(), vec![true]);
        Ok(())
    }

    #[test]
    fn test_close_and_close_silent() -> Result<()> {
        let fx = fixture(true);
        let dispatch = fx.router.dispatch(&CommandRequest::new("close"))?;
        assert_eq!(dispatch.broadcast, Some(Broadcast { is_open: false }));

        let dispatch = fx.router.dispatch(&CommandRequest::new("close_silent"))?;
        assert!(!ack(&dispatch).has_changed);
        assert_eq!(dispatch.broadcast, None);
        assert!(!fx.router.store().read_state());
        Ok(())
    }

    #[test]
    fn test_toggle_flips_relative_to_current_state() -> Result<()> {
        let fx = fixture(false);

        let first = fx.router.dispatch(&CommandRequest::new("toggle"))?;
        assert!(ack(&first).is_open);
        assert_eq!(first.broadcast, Some(Broadcast { is_open: true }));

        let second = fx.router.dispatch(&CommandRequest::new("toggle_silent"))?;
        assert!(!ack(&second).is_open);
        assert!(ack(&second).has_changed);
        assert_eq!(second.broadcast, None);

        assert_eq!(*fx.changes.lock(), vec![true, false]);
        Ok(())
    }

    #[test]
    fn test_status_is_read_only() -> Result<()> {
        let fx = fixture(true);
        let request = CommandRequest {
            source: json!({"nick": "someone"}),
            ..CommandRequest::new("status")
        };
        let dispatch = fx.router.dispatch(&request)?;

        assert_eq!(
            dispatch.reply,
            Reply::Ack(Acknowledgment {
                command: Command::Status,
                is_open: true,
                has_changed: false,
            })
        );
        assert_eq!(dispatch.source, json!({"nick": "someone"}));
        assert!(fx.changes.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_command_lists_every_command_once() -> Result<()> {
        let fx = fixture(false);
        let dispatch = fx.router.dispatch(&CommandRequest::new("explode"))?;

        let Reply::Invalid { command, commands } = &dispatch.reply else {
            panic!("expected invalid reply, got {:?}", dispatch.reply);
        };
        assert_eq!(command, "explode");
        assert_eq!(dispatch.broadcast, None);

        for name in [
            "status",
            "open",
            "open_silent",
            "close",
            "close_silent",
            "toggle",
            "toggle_silent",
            "help",
        ] {
            assert_eq!(commands.iter().filter(|c| **c == name).count(), 1, "{name}");
        }
        assert_eq!(commands.len(), 8);
        assert!(!fx.router.store().read_state());
        Ok(())
    }

    #[test]
    fn test_lookup_is_exact() {
        let fx = fixture(false);
        assert_eq!(fx.router.lookup("open_silent"), Some(Command::OpenSilent));
        assert_eq!(fx.router.lookup("Open"), None);
        assert_eq!(fx.router.lookup("on_open"), None);
        assert_eq!(fx.router.lookup(""), None);
    }

    #[test]
    fn test_chat_arg_parsing() {
        let request = CommandRequest::from_chat_arg("  toggle   now  please ");
        assert_eq!(request.command, "toggle");
        assert_eq!(request.argument, "now please");

        let request = CommandRequest::from_chat_arg("   ");
        assert_eq!(request.command, "status");
        assert!(request.argument.is_empty());
    }
}
