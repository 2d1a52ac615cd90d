//! Sleep utilities

use std::time::Duration;

/// Pause between two reconnection attempts to the bus broker.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Sleep for 3 seconds on a plain thread (bus event loop).
pub fn sleep_3s_blocking() {
    std::thread::sleep(RECONNECT_DELAY);
}
