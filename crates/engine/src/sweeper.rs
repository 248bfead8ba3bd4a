//! Background expiry sweeper
//!
//! A named thread that calls [`SessionStore::sweep_expired`] once per
//! interval. Stopping it (explicitly or by drop) wakes the thread
//! immediately and joins it.

use crate::store::SessionStore;
use chrono::Utc;
use sessiondb_core::{Error, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Handle to the background sweep thread
#[derive(Debug)]
pub struct Sweeper {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Sweeper {
    /// Start sweeping `store` every `interval`
    pub fn spawn(store: Arc<SessionStore>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument("sweep interval must be positive".into()));
        }
        let (shutdown, signal) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("sessiondb-sweeper".to_string())
            .spawn(move || sweep_loop(&store, interval, &signal))
            .map_err(|e| Error::engine(format!("cannot start sweeper thread: {}", e)))?;
        debug!(interval_ms = interval.as_millis() as u64, "Started session sweeper");
        Ok(Sweeper {
            shutdown: Some(shutdown),
            handle: Some(handle),
            interval,
        })
    }

    /// Sweep period
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the sweep thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The thread may already have exited on a closed store
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Session sweeper thread panicked");
            }
            debug!("Stopped session sweeper");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sweep_loop(store: &SessionStore, interval: Duration, signal: &mpsc::Receiver<()>) {
    loop {
        match signal.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match store.sweep_expired(Utc::now()) {
                Ok(_) => {}
                Err(Error::Closed) => break,
                Err(e) => error!(error = %e, "Session sweep failed"),
            },
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
