//! Embedding bridge: runs the core on a dedicated OS thread with its
//! own single-threaded tokio runtime, so a UI (or any other thread)
//! can start/stop it without driving an executor itself. Mirrors the
//! thread-plus-own-runtime pattern used for long-lived ingest workers
//! elsewhere in this codebase, generalized to submit arbitrary tasks
//! rather than running one fixed loop.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::Notify;
use tokio::task::JoinHandle as TokioJoinHandle;
use tracing::info;

use crate::app::Application;

pub struct AsyncWorker {
    handle: tokio::runtime::Handle,
    shutdown: Arc<Notify>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AsyncWorker {
    /// Spawns the worker thread and blocks until its runtime is ready
    /// to accept work.
    pub fn spawn() -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let shutdown = Arc::new(Notify::new());
        let shutdown_for_thread = shutdown.clone();

        let thread = thread::Builder::new()
            .name("arb-observer-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(runtime.handle().clone()));
                info!("async worker runtime started");
                runtime.block_on(async move {
                    shutdown_for_thread.notified().await;
                });
                info!("async worker runtime stopped");
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|e| anyhow::anyhow!("worker thread did not report readiness: {e}"))?
            .map_err(|e| anyhow::anyhow!("worker runtime failed to start: {e}"))?;

        Ok(Self {
            handle,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Submits `application.start()` onto the worker's runtime from any
    /// thread. The returned handle completes when `start()` does.
    pub fn start_task(&self, application: Arc<Application>) -> TokioJoinHandle<()> {
        self.handle
            .spawn(async move { application.start().await })
    }

    /// Submits `application.stop()` onto the worker's runtime.
    pub fn stop_task(&self, application: Arc<Application>) -> TokioJoinHandle<()> {
        self.handle
            .spawn(async move { application.stop().await })
    }

    /// Stops the worker's runtime and joins its thread. Safe to call
    /// only after any submitted tasks have completed (typically after
    /// awaiting a `stop_task` handle).
    pub fn stop_loop(mut self) {
        self.shutdown.notify_waiters();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for AsyncWorker {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
