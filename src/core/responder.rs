//! Turns router outcomes into bus messages
//!
//! Query-topic requesters get structured answers on `spacestatus_answer`.
//! Chat requesters get localized lines on `irc_debug`. Broadcasts always go
//! out as an `@tweet` announcement on `irc_debug`, whatever the origin.

use super::router::{Acknowledgment, Action, Broadcast, Dispatch, Reply};
use crate::{
    api::ShieldStatus,
    i18n::{fill, Lang},
    protocol::messages::{CoreToBus, QueryAnswer, QueryError, QueryHelp},
};

pub const INVALID_COMMAND_ERROR: &str = "invalid_command";

/// Where a command came from, which decides how it is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Query,
    Chat,
}

/// Every message to publish for one dispatch, reply first.
pub fn render(dispatch: &Dispatch, origin: Origin, lang: &Lang) -> Vec<CoreToBus> {
    let mut out = match origin {
        Origin::Query => vec![render_answer(dispatch)],
        Origin::Chat => render_chat(&dispatch.reply, lang)
            .into_iter()
            .map(CoreToBus::irc_debug)
            .collect(),
    };

    if let Some(broadcast) = dispatch.broadcast {
        out.push(CoreToBus::irc_debug(announcement(broadcast, lang)));
    }
    out
}

fn owned(commands: &[&'static str]) -> Vec<String> {
    commands.iter().map(|c| c.to_string()).collect()
}

fn render_answer(dispatch: &Dispatch) -> CoreToBus {
    let source = dispatch.source.clone();
    match &dispatch.reply {
        Reply::Ack(ack) => CoreToBus::Answer(QueryAnswer {
            is_open: ack.is_open,
            has_changed: ack.has_changed,
            source,
        }),
        Reply::Help { commands } => CoreToBus::AnswerHelp(QueryHelp {
            commands: owned(commands),
            source,
        }),
        Reply::Invalid { command, commands } => CoreToBus::AnswerError(QueryError {
            error: INVALID_COMMAND_ERROR.to_string(),
            command: command.clone(),
            commands: owned(commands),
            source,
        }),
    }
}

fn render_chat(reply: &Reply, lang: &Lang) -> Vec<String> {
    match reply {
        Reply::Ack(ack) => vec![chat_ack(ack, lang)],
        Reply::Help { commands } => help_lines(commands, lang),
        Reply::Invalid { commands, .. } => {
            let mut lines = vec![lang.invalid_command.clone()];
            lines.extend(help_lines(commands, lang));
            lines
        }
    }
}

fn chat_ack(ack: &Acknowledgment, lang: &Lang) -> String {
    let line = match (ack.command.action(), ack.has_changed, ack.is_open) {
        (Action::Mutate { .. }, false, true) => &lang.already_open,
        (Action::Mutate { .. }, false, false) => &lang.already_closed,
        (Action::Mutate { .. }, true, true) => &lang.now_open,
        (Action::Mutate { .. }, true, false) => &lang.now_closed,
        (_, _, true) => &lang.status_open,
        (_, _, false) => &lang.status_closed,
    };
    line.clone()
}

fn help_lines(commands: &[&'static str], lang: &Lang) -> Vec<String> {
    vec![
        lang.help_usage.clone(),
        fill(&lang.help_commands, &[("commands", commands.join(", ").as_str())]),
    ]
}

pub fn announcement(broadcast: Broadcast, lang: &Lang) -> String {
    if broadcast.is_open {
        lang.tweet_open.clone()
    } else {
        lang.tweet_closed.clone()
    }
}

/// Human readable list of the raised shield flags.
pub fn describe_flags(status: &ShieldStatus) -> String {
    let flags: Vec<&str> = [
        (status.ssl_error, "ssl_error"),
        (status.crash_error, "crash_error"),
        (status.bad_http_code, "bad_http_code"),
    ]
    .into_iter()
    .filter_map(|(raised, name)| raised.then_some(name))
    .collect();
    flags.join(", ")
}

/// Chat line reporting a SpaceAPI update that did not go cleanly.
pub fn shield_report(open: bool, status: &ShieldStatus, lang: &Lang) -> String {
    let flags = describe_flags(status);
    fill(
        &lang.spaceapi_sync_failed,
        &[
            ("state", if open { "true" } else { "false" }),
            ("flags", flags.as_str()),
        ],
    )
}
