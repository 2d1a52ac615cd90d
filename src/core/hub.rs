/// Typed fan-out of events to registered observers.
///
/// One hub exists per event kind (state changes, raw filesystem events) so
/// the state logic never depends on the shape of filesystem notifications.
/// Delivery is synchronous and in subscription order. There is no filtering
/// and no back-pressure: an observer that needs to do blocking I/O must hand
/// the event off to its own worker.
use parking_lot::RwLock;
use std::path::PathBuf;

type Observer<T> = Box<dyn Fn(&T) + Send + Sync>;

/// The persisted flag went from one value to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub new_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
}

/// A create/modify notification for an entry under the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

pub struct NotificationHub<T> {
    observers: RwLock<Vec<Observer<T>>>,
}

impl<T> NotificationHub<T> {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer. It will see every event published after this call.
    ///
    /// Observers must not subscribe to the same hub from inside their callback.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observers.write().push(Box::new(observer));
    }

    /// Deliver `event` to every observer, in subscription order.
    ///
    /// A panicking observer is not caught; it aborts delivery to the
    /// observers registered after it.
    pub fn publish(&self, event: &T) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl<T> Default for NotificationHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type StateChangeHub = NotificationHub<ChangeEvent>;
pub type FsEventHub = NotificationHub<FsEvent>;
