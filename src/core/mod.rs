/// Core logic of the space status service
///
/// This package is transport independent:
/// - Durable flag storage with change detection
/// - Event hubs for state and filesystem notifications
/// - Command routing and reply rendering
/// - SpaceAPI mirroring worker
/// - Daemon wiring and main loop
pub mod bus;
pub mod hub;
pub mod responder;
pub mod router;
pub mod runtime;
pub mod spaceapi_sync;
pub mod state_store;
pub mod task_manager;
pub mod watcher;

// Re-export commonly used types
pub use bus::{Bus, BusToCore, CoreToBus};
pub use router::{Command, CommandRequest, CommandRouter, Dispatch};
pub use runtime::Daemon;
pub use state_store::StateStore;
