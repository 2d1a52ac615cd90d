use anyhow::{anyhow, Result};
use clap::ArgMatches;
use serde::Serialize;
use std::sync::Arc;

use super::config::{SpaceStatusConfig, SPACEAPI_KEY_ENV};
use crate::{
    api::spaceapi::{ShieldStatus, Shielded},
    core::{hub::StateChangeHub, state_store::StateStore, task_manager::spawn_blocking_task},
};

#[derive(Debug, Serialize)]
struct RemoteState {
    open: bool,
    #[serde(flatten)]
    faults: ShieldStatus,
}

#[derive(Debug, Serialize)]
struct LocalState<'a> {
    file: &'a str,
    open: bool,
}

fn open_word(open: bool) -> &'static str {
    if open {
        "open"
    } else {
        "closed"
    }
}

fn print_remote(result: Shielded<bool>, want_json: bool) -> Result<()> {
    if want_json {
        let out = RemoteState {
            open: result.value,
            faults: result.status,
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("SpaceAPI: {}", open_word(result.value));
        if !result.status.is_clean() {
            eprintln!(
                "Warning: {}",
                crate::core::responder::describe_flags(&result.status)
            );
        }
    }
    Ok(())
}

/// Run the requested one-shot action, if any.
///
/// Returns `true` when an action ran and the process should exit.
pub async fn run_one_shot_actions(matches: &ArgMatches, config: &SpaceStatusConfig) -> Result<bool> {
    let want_json = matches.get_flag("json");

    if matches.get_flag("read-state") {
        let store = StateStore::open(&config.status.file, Arc::new(StateChangeHub::new()));
        let open = store.read_state();
        if want_json {
            let out = LocalState {
                file: &config.status.file,
                open,
            };
            println!("{}", serde_json::to_string(&out)?);
        } else {
            println!("{}: {}", config.status.file, open_word(open));
        }
        return Ok(true);
    }

    if matches.get_flag("spaceapi-status") {
        let api = config.spaceapi.builder().build();
        let result = spawn_blocking_task(move || api.is_open()).await?;
        print_remote(result, want_json)?;
        return Ok(true);
    }

    if matches.get_flag("spaceapi-toggle") {
        if config.spaceapi.key.is_empty() {
            return Err(anyhow!(
                "A SpaceAPI key is required: set spaceapi.key or {SPACEAPI_KEY_ENV}"
            ));
        }
        let api = config.spaceapi.builder().build();
        let result = spawn_blocking_task(move || api.toggle()).await?;
        print_remote(result, want_json)?;
        return Ok(true);
    }

    Ok(false)
}
