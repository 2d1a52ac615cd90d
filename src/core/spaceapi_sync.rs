use anyhow::Result;
use flume::Sender;
use std::thread::JoinHandle;

use super::{bus::Bus, responder::shield_report, task_manager::spawn_named_thread};
use crate::{
    api::spaceapi::{SpaceApi, StatusTransport},
    i18n::Lang,
    protocol::messages::CoreToBus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMessage {
    Push(bool),
    Stop,
}

/// Dedicated thread mirroring local state changes to SpaceAPI, in order.
///
/// HTTP calls block for up to the configured timeout, so they never run on
/// the watcher or bus threads.
pub struct SpaceApiSync {
    tx: Sender<SyncMessage>,
    handle: Option<JoinHandle<()>>,
}

impl SpaceApiSync {
    pub fn start<T>(api: SpaceApi<T>, bus: Bus, lang: &'static Lang) -> Result<Self>
    where
        T: StatusTransport + 'static,
    {
        let (tx, rx) = flume::unbounded::<SyncMessage>();
        let handle = spawn_named_thread("spaceapi-sync", move || {
            for msg in rx.iter() {
                match msg {
                    SyncMessage::Push(open) => {
                        let status = api.set_state(open);
                        if status.is_clean() {
                            log::info!("🌐 SpaceAPI now reports open={open}");
                        } else {
                            log::warn!("SpaceAPI update open={open} not clean: {status:?}");
                            bus.publish(CoreToBus::irc_debug(shield_report(open, &status, lang)));
                        }
                    }
                    SyncMessage::Stop => break,
                }
            }
            log::debug!("SpaceAPI sync worker stopped");
        })?;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> Sender<SyncMessage> {
        self.tx.clone()
    }

    /// Finish the queued updates, then stop the worker.
    pub fn stop(mut self) {
        if self.tx.send(SyncMessage::Stop).is_err() {
            log::warn!("SpaceAPI sync worker already gone");
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("SpaceAPI sync worker panicked");
            }
        }
    }
}
