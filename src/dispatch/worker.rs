//! Single-writer dispatcher thread
//!
//! The worker owns the only connection to the store and drains the request
//! channel one command at a time. It stops after a `Close` command, after a
//! shutdown signal, or once every client handle has been dropped.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use crossbeam::channel::{self, Receiver, Sender};
use crate::{Error, Result};
use crate::storage::AtlasStore;
use super::client::Database;
use super::command::{Command, Responder};

/// Lifecycle of the dispatcher. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    Closed,
}

/// Shared view of whether the worker has closed the connection
#[derive(Debug, Clone, Default)]
pub(crate) struct StateFlag(Arc<AtomicBool>);

impl StateFlag {
    pub(crate) fn get(&self) -> DispatcherState {
        if self.0.load(Ordering::Acquire) {
            DispatcherState::Closed
        } else {
            DispatcherState::Running
        }
    }

    fn close(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Delivers the termination signal to the worker's control loop.
///
/// Commands still queued when the signal is observed are not executed; their
/// callers receive [`Error::DispatcherClosed`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Sender<()>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // A full slot means a signal is already pending
        let _ = self.signal.try_send(());
    }
}

/// Owner of the dispatcher thread
pub struct Dispatcher {
    database: Database,
    shutdown: ShutdownHandle,
    handle: Option<thread::JoinHandle<()>>,
}

/// Why the worker loop stopped
enum Exit {
    Close(Responder<()>),
    Signal,
    Disconnected,
}

impl Dispatcher {
    /// Open the store at `path` and start serving it.
    ///
    /// Failing to open the store or create the schema is returned here and
    /// should abort startup.
    pub fn open(path: &Path) -> Result<Self> {
        let store = AtlasStore::open(path)?;
        Self::spawn(store)
    }

    /// Start the worker thread, handing it exclusive ownership of `store`
    pub fn spawn(store: AtlasStore) -> Result<Self> {
        let (requests_tx, requests_rx) = channel::unbounded::<Command>();
        let (signal_tx, signal_rx) = channel::bounded::<()>(1);
        let state = StateFlag::default();

        let worker_state = state.clone();
        let handle = thread::Builder::new()
            .name("emoji-atlas-db".to_string())
            .spawn({
                // The worker keeps a sender so the signal channel never disconnects
                let signal_tx = signal_tx.clone();
                move || run(store, requests_rx, (signal_tx, signal_rx), worker_state)
            })?;

        tracing::info!("Reaction store dispatcher started");
        Ok(Self {
            database: Database::new(requests_tx, state),
            shutdown: ShutdownHandle { signal: signal_tx },
            handle: Some(handle),
        })
    }

    /// A client handle; clone freely across threads
    pub fn database(&self) -> Database {
        self.database.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> DispatcherState {
        self.database.state()
    }

    /// Wait for the worker thread to finish.
    ///
    /// Only returns once the dispatcher has been closed, signalled, or every
    /// `Database` handle (including the one kept here) has been dropped.
    pub fn join(mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        drop(self);
        handle
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("dispatcher thread panicked")))
    }
}

/// Worker control loop
fn run(
    mut store: AtlasStore,
    requests: Receiver<Command>,
    (_signal_tx, signal): (Sender<()>, Receiver<()>),
    state: StateFlag,
) {
    let exit = loop {
        // Signals are observed between commands, ahead of queued work
        if signal.try_recv().is_ok() {
            break Exit::Signal;
        }

        crossbeam::select! {
            recv(signal) -> _ => break Exit::Signal,
            recv(requests) -> command => match command {
                Ok(Command::Close { respond }) => break Exit::Close(respond),
                Ok(command) => {
                    tracing::debug!("Executing {}", command.name());
                    command.execute(&mut store);
                }
                Err(_) => break Exit::Disconnected,
            },
        }
    };

    state.close();
    let closed = store.close();
    match exit {
        Exit::Close(respond) => {
            tracing::info!("Reaction store closed");
            super::command::reply(respond, closed);
        }
        Exit::Signal => {
            tracing::info!("Reaction store closing down on shutdown signal ({} commands dropped)", requests.len());
            if let Err(err) = closed {
                tracing::error!("Failed to close reaction store: {}", err);
            }
        }
        Exit::Disconnected => {
            tracing::debug!("All clients dropped, reaction store closed");
            if let Err(err) = closed {
                tracing::error!("Failed to close reaction store: {}", err);
            }
        }
    }
    // Dropping `requests` releases any queued commands; their callers see
    // a disconnected response slot.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_transitions_to_closed() {
        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        let db = dispatcher.database();
        assert_eq!(dispatcher.state(), DispatcherState::Running);

        db.insert_user("U1").unwrap();
        db.close().unwrap();
        assert_eq!(db.state(), DispatcherState::Closed);

        dispatcher.join().unwrap();
        assert!(matches!(db.find_user_by_external_id("U1"), Err(Error::DispatcherClosed)));
    }

    #[test]
    fn test_shutdown_signal_stops_worker() {
        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        let db = dispatcher.database();
        db.insert_emoji("wave", 1.0).unwrap();

        dispatcher.shutdown_handle().shutdown();
        dispatcher.join().unwrap();

        assert_eq!(db.state(), DispatcherState::Closed);
        assert!(matches!(db.top_n_emojis(5, false), Err(Error::DispatcherClosed)));
        assert!(matches!(db.close(), Err(Error::DispatcherClosed)));
    }

    #[test]
    fn test_callers_in_flight_at_shutdown_never_hang() {
        use std::sync::Barrier;
        use std::time::Duration;

        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        let callers = 64;
        let barrier = Arc::new(Barrier::new(callers + 1));
        let (done_tx, done_rx) = channel::unbounded();

        for i in 0..callers {
            let db = dispatcher.database();
            let barrier = Arc::clone(&barrier);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                barrier.wait();
                let _ = done_tx.send(db.insert_user(&format!("U{i}")));
            });
        }
        drop(done_tx);

        barrier.wait();
        dispatcher.shutdown_handle().shutdown();

        for _ in 0..callers {
            match done_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(Ok(_)) | Ok(Err(Error::DispatcherClosed)) => {}
                Ok(Err(err)) => panic!("unexpected error: {err:?}"),
                Err(_) => panic!("a caller hung after shutdown"),
            }
        }
        dispatcher.join().unwrap();
    }

    #[test]
    fn test_worker_exits_when_clients_dropped() {
        let dispatcher = Dispatcher::spawn(AtlasStore::open_in_memory().unwrap()).unwrap();
        {
            let db = dispatcher.database();
            db.insert_model("vader").unwrap();
        }
        // join drops the last handle and must not hang
        dispatcher.join().unwrap();
    }

    #[test]
    fn test_open_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("atlas.db");
        assert!(Dispatcher::open(&path).is_err());
    }
}
