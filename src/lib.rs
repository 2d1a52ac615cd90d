//! hms_spacestatus: open/closed status service for the HAUM hackerspace
//!
//! The service keeps a single open/closed flag on disk, answers commands
//! coming from the message bus (MQTT), announces every change to the other
//! microservices and mirrors it to the public SpaceAPI status. The flag can
//! also be edited by hand; a filesystem watcher picks those edits up.
//!
//! The public modules expose the building blocks used by the binary: the
//! fault-shielded SpaceAPI client, the core state/command logic and the bus
//! payloads. The boot and CLI helpers are hidden from the generated docs.

pub mod api;
#[doc(hidden)]
pub mod boot;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod i18n;
pub mod protocol;
#[doc(hidden)]
pub mod utils;

pub use api::*;
