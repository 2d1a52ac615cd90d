/// Daemon wiring and main loop
///
/// The daemon owns one `StateStore` shared by two triggers: the filesystem
/// watcher (through the filesystem hub) and the bus consume loop (through the
/// router). State changes fan out to the logger, the bus and, when enabled,
/// the SpaceAPI sync worker.
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};

use super::{
    bus::{Bus, BusToCore},
    hub::{ChangeEvent, FsEvent, FsEventHub, StateChangeHub},
    responder::{render, Origin},
    router::{CommandRequest, CommandRouter},
    spaceapi_sync::{SpaceApiSync, SyncMessage},
    state_store::StateStore,
    watcher::DirectoryWatcher,
};
use crate::{
    api::spaceapi::{SpaceApi, StatusTransport},
    i18n::Lang,
    protocol::messages::{CoreToBus, StateChanged},
};

pub struct Daemon {
    router: CommandRouter,
    fs_hub: Arc<FsEventHub>,
    bus: Bus,
    lang: &'static Lang,
    sync: Option<SpaceApiSync>,
    watcher: Option<DirectoryWatcher>,
}

impl Daemon {
    pub fn new(status_file: impl Into<PathBuf>, bus: Bus, lang: &'static Lang) -> Self {
        let state_hub = Arc::new(StateChangeHub::new());
        state_hub.subscribe(|event: &ChangeEvent| {
            log::info!("🔔 State changed: open={}", event.new_state);
        });
        let publisher = bus.clone();
        state_hub.subscribe(move |event: &ChangeEvent| {
            publisher.publish(CoreToBus::StateChanged(StateChanged {
                new_value: event.new_state,
            }));
        });

        let store = Arc::new(StateStore::open(status_file, state_hub));

        let fs_hub = Arc::new(FsEventHub::new());
        let watched = store.clone();
        fs_hub.subscribe(move |event: &FsEvent| {
            log::debug!("{:?} {}", event.kind, event.path.display());
            watched.check_changed_state();
        });

        Self {
            router: CommandRouter::new(store),
            fs_hub,
            bus,
            lang,
            sync: None,
            watcher: None,
        }
    }

    /// Mirror every state change to SpaceAPI from a dedicated worker.
    pub fn with_spaceapi<T>(mut self, api: SpaceApi<T>) -> Result<Self>
    where
        T: StatusTransport + 'static,
    {
        let worker = SpaceApiSync::start(api, self.bus.clone(), self.lang)?;
        let tx = worker.sender();
        self.store().hub().subscribe(move |event: &ChangeEvent| {
            if tx.send(SyncMessage::Push(event.new_state)).is_err() {
                log::warn!("SpaceAPI sync worker is gone, state not mirrored");
            }
        });
        self.sync = Some(worker);
        Ok(self)
    }

    /// Start watching the directory that holds the flag file.
    pub fn watch(mut self) -> Result<Self> {
        let directory = self.store().directory().to_path_buf();
        let watcher = DirectoryWatcher::start(&directory, self.fs_hub.clone())
            .context("Cannot monitor the status directory")?;
        self.watcher = Some(watcher);
        Ok(self)
    }

    pub fn store(&self) -> &Arc<StateStore> {
        self.router.store()
    }

    pub fn fs_hub(&self) -> &Arc<FsEventHub> {
        &self.fs_hub
    }

    /// Route one inbound bus message and publish the answers.
    ///
    /// Fails only when the flag file cannot be written.
    pub fn handle_inbound(&self, msg: BusToCore) -> Result<()> {
        let (request, origin) = match msg {
            BusToCore::Query(query) => (CommandRequest::from_query(query), Origin::Query),
            BusToCore::Irc(irc) => (CommandRequest::from_chat_arg(&irc.arg), Origin::Chat),
        };

        let dispatch = self.router.dispatch(&request)?;
        for out in render(&dispatch, origin, self.lang) {
            self.bus.publish(out);
        }
        Ok(())
    }

    /// Consume the bus until it closes or a message cannot be handled.
    pub async fn serve(&self) -> Result<()> {
        while let Ok(msg) = self.bus.inbound_rx.recv_async().await {
            self.handle_inbound(msg)?;
        }
        log::info!("Bus closed, leaving the consume loop");
        Ok(())
    }

    /// Serve until Ctrl-C, then shut down.
    pub async fn run(self) -> Result<()> {
        log::info!(
            "🚀 Space status service started on {}",
            self.store().path().display()
        );

        let result = tokio::select! {
            res = self.serve() => res,
            res = tokio::signal::ctrl_c() => {
                log::info!("Got Ctrl-C, shutting down...");
                res.context("Failed to listen for Ctrl-C")
            }
        };

        self.shutdown();
        result
    }

    /// Stop watching and let the SpaceAPI worker drain its queue.
    pub fn shutdown(mut self) {
        self.watcher.take();
        if let Some(sync) = self.sync.take() {
            sync.stop();
        }
        log::info!("Space status service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::hub::FsEventKind,
        i18n::lang,
        protocol::messages::{IrcCommand, QueryCommand},
    };
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn daemon() -> (TempDir, Daemon, flume::Receiver<CoreToBus>) {
        let dir = TempDir::new().unwrap();
        let (bus, _inbound_tx, outbound_rx) = Bus::unbounded();
        let daemon = Daemon::new(dir.path().join("status"), bus, lang());
        (dir, daemon, outbound_rx)
    }

    #[test]
    fn test_query_open_publishes_answer_change_and_tweet() -> Result<()> {
        let (_dir, daemon, outbound_rx) = daemon();
        daemon.handle_inbound(BusToCore::Query(QueryCommand {
            command: "open".to_string(),
            source: json!("door"),
        }))?;

        let published: Vec<CoreToBus> = outbound_rx.drain().collect();
        assert_eq!(published.len(), 3);
        assert_eq!(
            published[0],
            CoreToBus::StateChanged(StateChanged { new_value: true })
        );
        assert!(matches!(&published[1], CoreToBus::Answer(a) if a.is_open && a.has_changed));
        assert_eq!(published[2], CoreToBus::irc_debug(lang().tweet_open.clone()));
        Ok(())
    }

    #[test]
    fn test_chat_status_is_answered_on_chat() -> Result<()> {
        let (_dir, daemon, outbound_rx) = daemon();
        daemon.handle_inbound(BusToCore::Irc(IrcCommand {
            command: "spacestatus".to_string(),
            arg: String::new(),
        }))?;

        let published: Vec<CoreToBus> = outbound_rx.drain().collect();
        assert_eq!(
            published,
            vec![CoreToBus::irc_debug(lang().status_closed.clone())]
        );
        Ok(())
    }

    #[test]
    fn test_external_edit_is_published_once() -> Result<()> {
        let (_dir, daemon, outbound_rx) = daemon();
        fs::write(daemon.store().path(), "1")?;

        let event = FsEvent {
            kind: FsEventKind::Modified,
            path: daemon.store().path().to_path_buf(),
        };
        daemon.fs_hub().publish(&event);
        daemon.fs_hub().publish(&event);

        let published: Vec<CoreToBus> = outbound_rx.drain().collect();
        assert_eq!(
            published,
            vec![CoreToBus::StateChanged(StateChanged { new_value: true })]
        );
        Ok(())
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (bus, _inbound_tx, _outbound_rx) = Bus::unbounded();
        let daemon = Daemon::new(dir.path().join("missing").join("status"), bus, lang());

        let result = daemon.handle_inbound(BusToCore::Query(QueryCommand {
            command: "open".to_string(),
            source: json!(null),
        }));
        assert!(result.is_err());
    }
}
