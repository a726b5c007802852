//! Periodic timeout sweep.
//!
//! Reads already fail overdue jobs lazily. The sweeper does the same on a
//! fixed interval so jobs nobody polls still reach a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::jobs::store::JobStore;

pub struct TimeoutSweeper {
    store: Arc<JobStore>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    trigger: broadcast::Sender<()>,
}

impl TimeoutSweeper {
    pub fn new(store: Arc<JobStore>, interval: Duration) -> Self {
        let (trigger, _) = broadcast::channel(4);
        Self {
            store,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            trigger,
        }
    }

    /// Spawns the sweep loop on the current tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let mut trigger_rx = self.trigger.subscribe();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // skip immediate first tick

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        log::debug!("Manual timeout sweep triggered");
                    },
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let expired = store.expire_timed_out();
                if !expired.is_empty() {
                    let ids: Vec<&str> = expired.iter().map(|id| id.as_str()).collect();
                    log::info!("Timed out {} job(s): {}", expired.len(), ids.join(", "));
                }
            }

            log::debug!("Timeout sweeper stopped");
        })
    }

    /// Requests a sweep without waiting for the next tick.
    pub fn trigger(&self) {
        let _ = self.trigger.send(());
    }

    /// Signals the loop to exit and wakes it up.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.trigger.send(());
    }
}
