//! Progress/result channel types and the host-facing [`NestHandle`].
//! The engine never blocks the host: progress and completion are pushed
//! through callbacks supplied to [`crate::start`], and
//! [`NestHandle::worker_status`] is a synchronous poll a host can call
//! between events without touching engine internals.

use crate::placer::PlaceResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Overall progress for the individual currently being evaluated.
/// `fraction < 0.0` signals that the run has finished (stopped or
/// exhausted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NestProgress {
    pub nest_index: u64,
    pub fraction: f64,
}

/// Best-so-far placement results, ordered best first.
#[derive(Debug, Clone)]
pub struct NestComplete {
    pub results: Vec<PlaceResult>,
}

/// Polled snapshot of what the worker pool is doing right now, backed
/// by an actual `AtomicBool` rather than just a documented event shape.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub is_running: bool,
    pub current_operation: String,
}

/// Shared handle a running GA loop and its host both hold: the loop
/// flips `running` and updates `operation` as it works, the host reads
/// them through [`NestHandle::worker_status`].
#[derive(Debug)]
pub(crate) struct SharedStatus {
    pub running: AtomicBool,
    pub operation: std::sync::Mutex<String>,
}

impl SharedStatus {
    fn new() -> Self {
        Self { running: AtomicBool::new(true), operation: std::sync::Mutex::new("starting".to_string()) }
    }

    pub fn set(&self, running: bool, operation: impl Into<String>) {
        self.running.store(running, Ordering::SeqCst);
        if let Ok(mut guard) = self.operation.lock() {
            *guard = operation.into();
        }
    }

    pub fn snapshot(&self) -> WorkerStatus {
        let operation = self.operation.lock().map(|g| g.clone()).unwrap_or_default();
        WorkerStatus { is_running: self.running.load(Ordering::SeqCst), current_operation: operation }
    }
}

/// Handle returned by [`crate::start`]. Dropping it does not stop the
/// run; call [`NestHandle::stop`] explicitly.
pub struct NestHandle {
    pub(crate) stop_flag: Arc<AtomicBool>,
    pub(crate) status: Arc<SharedStatus>,
    pub(crate) join: Option<std::thread::JoinHandle<()>>,
}

impl NestHandle {
    pub(crate) fn new(stop_flag: Arc<AtomicBool>, status: Arc<SharedStatus>, join: std::thread::JoinHandle<()>) -> Self {
        Self { stop_flag, status, join: Some(join) }
    }

    /// Request termination; resources are released once the current
    /// individual completes.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Synchronous poll of what the worker pool is doing right now.
    pub fn worker_status(&self) -> WorkerStatus {
        self.status.snapshot()
    }

    /// Block until the GA thread has observed `stop` and exited.
    pub fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NestHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.join.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }
    }
}

pub(crate) fn new_shared_status() -> Arc<SharedStatus> {
    Arc::new(SharedStatus::new())
}
