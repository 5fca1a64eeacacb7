//! Background task bookkeeping.
//!
//! Long-running loops (wind listeners, cached result retries) and one-shot
//! writes (scoreboard updates) run on named threads registered here, so a
//! shutdown can cancel and join all of them.

use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

/// Owning side of a cancellation signal. Cancels when dropped.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(&mut self) {
        self.tx.take();
    }
}

/// Observing side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleep up to `timeout`, waking early on cancellation.
    ///
    /// Returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }
}

/// Create a linked cancel handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = bounded(0);
    (CancelHandle { tx: Some(tx) }, CancelToken { rx })
}

/// Owns every background thread the station starts.
#[derive(Debug)]
pub struct TaskSupervisor {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Mutex<Option<CancelHandle>>,
    token: CancelToken,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        let (handle, token) = cancel_pair();
        Self {
            tasks: Mutex::new(Vec::new()),
            shutdown: Mutex::new(Some(handle)),
            token,
        }
    }

    /// Token cancelled when [`TaskSupervisor::shutdown`] runs.
    pub fn shutdown_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Start a named background thread.
    pub fn spawn<F>(&self, name: &str, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(task)?;
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
        Ok(())
    }

    /// Number of threads still running.
    pub fn active(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancel the shutdown token and join every task.
    ///
    /// Tasks blocked on device I/O must be unblocked by the caller (by
    /// closing the devices) before calling this.
    pub fn shutdown(&self) {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        debug!("Joining {} background tasks", tasks.len());
        for task in tasks {
            let name = task.thread().name().unwrap_or("unnamed").to_string();
            if task.join().is_err() {
                warn!("Background task {name} panicked");
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
