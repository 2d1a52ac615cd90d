use flume::{Receiver, Sender};

pub use crate::protocol::messages::{BusToCore, CoreToBus};

/// Core-side view of the message bus: inbound commands and outbound publishes.
///
/// The transport (MQTT in production, bare channels in tests) owns the other
/// ends.
#[derive(Debug, Clone)]
pub struct Bus {
    pub inbound_rx: Receiver<BusToCore>,
    pub outbound_tx: Sender<CoreToBus>,
}

impl Bus {
    pub fn new(inbound_rx: Receiver<BusToCore>, outbound_tx: Sender<CoreToBus>) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
        }
    }

    /// Build a bus whose far ends are handed back to the caller.
    ///
    /// Returns `(bus, inbound_tx, outbound_rx)`.
    pub fn unbounded() -> (Self, Sender<BusToCore>, Receiver<CoreToBus>) {
        let (inbound_tx, inbound_rx) = flume::unbounded();
        let (outbound_tx, outbound_rx) = flume::unbounded();
        (Self::new(inbound_rx, outbound_tx), inbound_tx, outbound_rx)
    }

    /// Queue a message for publishing. A closed transport only loses the message.
    pub fn publish(&self, msg: CoreToBus) {
        if let Err(err) = self.outbound_tx.send(msg) {
            log::warn!("Bus transport is gone, dropping {:?}", err.into_inner());
        }
    }
}
