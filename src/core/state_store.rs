//! Durable open/closed flag and change detection
//!
//! The flag lives in a single file: `"1"` means open, anything else (including
//! a missing file) means closed. `StateStore` is the only writer. It remembers
//! the last value it compared against so that filesystem wake-ups which do not
//! actually change the content stay silent.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::hub::{ChangeEvent, StateChangeHub};

const OPEN_MARKER: &str = "1";
const CLOSED_MARKER: &str = "0";

/// Decode the on-disk representation.
pub fn decode_flag(content: &str) -> bool {
    content.trim() == OPEN_MARKER
}

pub fn encode_flag(open: bool) -> &'static str {
    if open {
        OPEN_MARKER
    } else {
        CLOSED_MARKER
    }
}

/// Result of an atomic read-decide-write on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State read just before writing.
    pub previous: bool,
    /// State that was written.
    pub current: bool,
}

impl Transition {
    pub fn has_changed(&self) -> bool {
        self.previous != self.current
    }
}

pub struct StateStore {
    path: PathBuf,
    previous_state: Mutex<bool>,
    /// Held from compare through publish so observers see changes in order.
    notify: Mutex<()>,
    hub: Arc<StateChangeHub>,
}

impl StateStore {
    /// Open the store and seed the last-observed value from disk.
    pub fn open(path: impl Into<PathBuf>, hub: Arc<StateChangeHub>) -> Self {
        let path = path.into();
        let initial = read_flag(&path);
        log::info!(
            "Status file {} initially {}",
            path.display(),
            if initial { "open" } else { "closed" }
        );

        Self {
            path,
            previous_state: Mutex::new(initial),
            notify: Mutex::new(()),
            hub,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the flag, the one the filesystem watcher observes.
    pub fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn hub(&self) -> &Arc<StateChangeHub> {
        &self.hub
    }

    /// Current persisted state. Never fails: an unreadable flag reads as closed.
    pub fn read_state(&self) -> bool {
        read_flag(&self.path)
    }

    /// Overwrite the persisted flag.
    ///
    /// Errors must be treated as fatal by the caller.
    pub fn set_state(&self, open: bool) -> Result<()> {
        let _guard = self.previous_state.lock();
        write_flag(&self.path, open)
    }

    /// Value seen by the most recent detected transition (or at startup).
    pub fn previous_state(&self) -> bool {
        *self.previous_state.lock()
    }

    /// Compare the persisted flag against the last observed value and notify
    /// observers when it differs.
    ///
    /// Returns `true` exactly once per transition. Concurrent callers deliver
    /// their events one after the other, in detection order, so the last
    /// event observers see matches the flag on disk. Observers must not call
    /// back into `check_changed_state`.
    pub fn check_changed_state(&self) -> bool {
        let _notify = self.notify.lock();
        let changed_to = {
            let mut previous = self.previous_state.lock();
            let state = read_flag(&self.path);
            if state == *previous {
                None
            } else {
                *previous = state;
                Some(state)
            }
        };

        match changed_to {
            Some(new_state) => {
                log::info!("State has changed to {new_state}, notifying observers...");
                self.hub.publish(&ChangeEvent { new_state });
                true
            }
            None => false,
        }
    }

    /// Read the current state, let `decide` pick the wanted one and persist it,
    /// all under the store lock.
    ///
    /// Observers are not notified here; call [`StateStore::check_changed_state`]
    /// afterwards.
    pub fn transition<F>(&self, decide: F) -> Result<Transition>
    where
        F: FnOnce(bool) -> bool,
    {
        let _guard = self.previous_state.lock();
        let previous = read_flag(&self.path);
        let current = decide(previous);
        write_flag(&self.path, current)?;
        Ok(Transition { previous, current })
    }
}

fn read_flag(path: &Path) -> bool {
    log::debug!("Reading status file {}...", path.display());

    match fs::read_to_string(path) {
        Ok(content) => decode_flag(&content),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::error!("Status file not found! ({})", path.display());
            false
        }
        Err(err) => {
            log::error!("Failed to read status file {}: {err}", path.display());
            false
        }
    }
}

/// Replace the flag in one step: write a sibling temporary file, then rename it
/// over the flag.
fn write_flag(path: &Path, open: bool) -> Result<()> {
    log::info!("Writing new state {open}...");

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "status".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, encode_flag(open))
        .with_context(|| format!("Failed to write status to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to move {} over {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    log::info!("Written new state {open}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::OnceCell;
    use std::{thread, time::Duration};
    use tempfile::TempDir;

    /// Global logger keeping every formatted record for later inspection.
    struct CaptureLogger {
        lines: Mutex<Vec<String>>,
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            self.lines
                .lock()
                .push(format!("[{}] {}", record.level(), record.args()));
        }

        fn flush(&self) {}
    }

    static CAPTURE: OnceCell<CaptureLogger> = OnceCell::new();

    fn captured_logs() -> &'static Mutex<Vec<String>> {
        let logger = CAPTURE.get_or_init(|| CaptureLogger {
            lines: Mutex::new(Vec::new()),
        });
        if log::set_logger(logger).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
        &logger.lines
    }

    fn store_in(dir: &TempDir) -> (StateStore, Arc<StateChangeHub>) {
        let hub = Arc::new(StateChangeHub::new());
        let store = StateStore::open(dir.path().join("status"), hub.clone());
        (store, hub)
    }

    fn recorder(hub: &StateChangeHub) -> Arc<Mutex<Vec<bool>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hub.subscribe(move |event: &ChangeEvent| sink.lock().push(event.new_state));
        seen
    }

    #[test]
    fn test_decode_flag() {
        assert!(decode_flag("1"));
        assert!(decode_flag("1\n"));
        assert!(decode_flag("  1 "));
        assert!(!decode_flag("0"));
        assert!(!decode_flag(""));
        assert!(!decode_flag("11"));
        assert!(!decode_flag("open"));
    }

    #[test]
    fn test_missing_file_reads_closed_and_logs_an_error() {
        let logs = captured_logs();
        let dir = TempDir::new().unwrap();
        let (store, _hub) = store_in(&dir);
        assert!(!store.read_state());
        assert!(!store.previous_state());

        let expected = format!("[ERROR] Status file not found! ({})", store.path().display());
        assert!(
            logs.lock().iter().any(|line| *line == expected),
            "missing log line {expected:?}"
        );
    }

    #[test]
    fn test_concurrent_changes_are_delivered_in_order() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, hub) = store_in(&dir);
        let store = Arc::new(store);

        // Stall delivery of the opening so the closing races against it.
        let (entered_tx, entered_rx) = flume::bounded::<()>(1);
        hub.subscribe(move |event: &ChangeEvent| {
            if event.new_state {
                let _ = entered_tx.try_send(());
                thread::sleep(Duration::from_millis(300));
            }
        });
        let seen = recorder(&hub);

        let opener = {
            let store = store.clone();
            thread::spawn(move || -> Result<bool> {
                store.set_state(true)?;
                Ok(store.check_changed_state())
            })
        };
        entered_rx.recv_timeout(Duration::from_secs(5))?;

        store.set_state(false)?;
        let closed = store.check_changed_state();
        let opened = opener
            .join()
            .map_err(|_| anyhow::anyhow!("opener thread panicked"))??;

        assert!(opened);
        assert!(closed);
        assert_eq!(*seen.lock(), vec![true, false]);
        assert_eq!(seen.lock().last().copied(), Some(store.read_state()));
        Ok(())
    }

    #[test]
    fn test_read_after_write_returns_written_value() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, _hub) = store_in(&dir);

        for value in [true, true, false, true, false, false] {
            store.set_state(value)?;
            assert_eq!(store.read_state(), value);
        }
        assert_eq!(fs::read_to_string(store.path())?, "0");
        Ok(())
    }

    #[test]
    fn test_write_leaves_no_temporary_file() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, _hub) = store_in(&dir);
        store.set_state(true)?;

        let names: Vec<String> = fs::read_dir(dir.path())?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<_>>()?;
        assert_eq!(names, vec!["status".to_string()]);
        Ok(())
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let hub = Arc::new(StateChangeHub::new());
        let store = StateStore::open(dir.path().join("nope").join("status"), hub);
        assert!(store.set_state(true).is_err());
    }

    #[test]
    fn test_check_changed_state_fires_once_per_transition() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, hub) = store_in(&dir);
        let seen = recorder(&hub);

        store.set_state(true)?;
        assert!(store.check_changed_state());
        assert!(!store.check_changed_state());
        assert!(store.previous_state());

        store.set_state(false)?;
        assert!(store.check_changed_state());
        assert!(!store.check_changed_state());

        assert_eq!(*seen.lock(), vec![true, false]);
        Ok(())
    }

    #[test]
    fn test_rewriting_same_value_is_silent() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("status"), "1")?;
        let (store, hub) = store_in(&dir);
        let seen = recorder(&hub);

        // Seeded from disk at construction.
        assert!(store.previous_state());
        store.set_state(true)?;
        assert!(!store.check_changed_state());
        assert!(seen.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_external_edit_is_detected() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, hub) = store_in(&dir);
        let seen = recorder(&hub);

        fs::write(store.path(), "1\n")?;
        assert!(store.check_changed_state());
        fs::remove_file(store.path())?;
        assert!(store.check_changed_state());

        assert_eq!(*seen.lock(), vec![true, false]);
        Ok(())
    }

    #[test]
    fn test_transition_reports_previous_and_current() -> Result<()> {
        let dir = TempDir::new()?;
        let (store, _hub) = store_in(&dir);

        let toggled = store.transition(|open| !open)?;
        assert_eq!(
            toggled,
            Transition {
                previous: false,
                current: true
            }
        );
        assert!(toggled.has_changed());

        let opened = store.transition(|_| true)?;
        assert!(!opened.has_changed());
        assert!(store.read_state());
        Ok(())
    }

    #[test]
    fn test_directory_of_bare_file_name() {
        let hub = Arc::new(StateChangeHub::new());
        let store = StateStore::open("status-flag-that-does-not-exist", hub);
        assert_eq!(store.directory(), Path::new("."));
    }
}
