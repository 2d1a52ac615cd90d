//! Bus payloads
//!
//! Every payload is a JSON object published under `<prefix>/<topic>`. Topic
//! names match the ones the other HAUM microservices already speak.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands addressed to this service (`status`, `open`, `close_silent`, ...).
pub const TOPIC_QUERY: &str = "spacestatus_query";
/// Chat commands relayed by the IRC bot.
pub const TOPIC_IRC_COMMAND: &str = "irc_command";
pub const TOPIC_STATE_CHANGED: &str = "spacestatus_state_changed";
pub const TOPIC_ANSWER: &str = "spacestatus_answer";
/// Free text written to the chat channel by the IRC bot.
pub const TOPIC_IRC_DEBUG: &str = "irc_debug";

/// The IRC bot command word this service answers to.
pub const IRC_COMMAND_WORD: &str = "spacestatus";

pub const SUBSCRIBED_TOPICS: [&str; 2] = [TOPIC_QUERY, TOPIC_IRC_COMMAND];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCommand {
    pub command: String,
    #[serde(default)]
    pub source: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrcCommand {
    pub command: String,
    #[serde(default)]
    pub arg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub new_value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub is_open: bool,
    pub has_changed: bool,
    pub source: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    pub error: String,
    pub command: String,
    pub commands: Vec<String>,
    pub source: Value,
}

/// Answer to `help` on the query topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHelp {
    pub commands: Vec<String>,
    pub source: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrcDebug {
    pub privmsg: String,
}

/// Messages flowing from the bus into the core.
#[derive(Debug, Clone, PartialEq)]
pub enum BusToCore {
    Query(QueryCommand),
    Irc(IrcCommand),
}

/// Messages flowing from the core out to the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreToBus {
    StateChanged(StateChanged),
    Answer(QueryAnswer),
    AnswerError(QueryError),
    AnswerHelp(QueryHelp),
    IrcDebug(IrcDebug),
}

impl CoreToBus {
    pub fn irc_debug(text: impl Into<String>) -> Self {
        CoreToBus::IrcDebug(IrcDebug {
            privmsg: text.into(),
        })
    }

    pub fn topic(&self) -> &'static str {
        match self {
            CoreToBus::StateChanged(_) => TOPIC_STATE_CHANGED,
            CoreToBus::Answer(_) | CoreToBus::AnswerError(_) | CoreToBus::AnswerHelp(_) => {
                TOPIC_ANSWER
            }
            CoreToBus::IrcDebug(_) => TOPIC_IRC_DEBUG,
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            CoreToBus::StateChanged(msg) => serde_json::to_vec(msg),
            CoreToBus::Answer(msg) => serde_json::to_vec(msg),
            CoreToBus::AnswerError(msg) => serde_json::to_vec(msg),
            CoreToBus::AnswerHelp(msg) => serde_json::to_vec(msg),
            CoreToBus::IrcDebug(msg) => serde_json::to_vec(msg),
        };
        bytes.with_context(|| format!("Failed to encode payload for {}", self.topic()))
    }
}

/// Join the configured prefix and a topic name.
pub fn full_topic(prefix: &str, topic: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        topic.to_string()
    } else {
        format!("{prefix}/{topic}")
    }
}

/// Decode an inbound publish.
///
/// Returns `Ok(None)` for messages that are well formed but not for us
/// (unknown topic, IRC command for another service).
pub fn decode_inbound(prefix: &str, topic: &str, payload: &[u8]) -> Result<Option<BusToCore>> {
    let prefix = prefix.trim_matches('/');
    let name = if prefix.is_empty() {
        topic
    } else {
        match topic
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(name) => name,
            None => return Ok(None),
        }
    };

    match name {
        TOPIC_QUERY => {
            let command: QueryCommand = serde_json::from_slice(payload)
                .map_err(|err| anyhow!("Malformed {TOPIC_QUERY} payload: {err}"))?;
            Ok(Some(BusToCore::Query(command)))
        }
        TOPIC_IRC_COMMAND => {
            let command: IrcCommand = serde_json::from_slice(payload)
                .map_err(|err| anyhow!("Malformed {TOPIC_IRC_COMMAND} payload: {err}"))?;
            if command.command == IRC_COMMAND_WORD {
                Ok(Some(BusToCore::Irc(command)))
            } else {
                Ok(None)
            }
        }
        _ => Ok(None),
    }
}
