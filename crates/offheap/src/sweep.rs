//! Background expiry sweep.
//!
//! A single recurring thread owned by the pool: it sleeps on a stop channel
//! with the configured tick as the timeout, so a tick elapsing means "sweep
//! and go around" and a message (or a dropped pool) means "exit now". The
//! loop holds only a `Weak` reference to its pool — dropping the pool can
//! never deadlock against a sweep in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use offheap_core::Settings;

use crate::pool::AllocationPool;

/// Handle to the sweep thread. Dropping it signals the thread and joins.
#[derive(Debug)]
pub(crate) struct Sweeper {
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweep loop.
    ///
    /// The loop re-reads `expired_check_interval` every tick and exits on
    /// its own within one tick of pooling being disabled; the pool restarts
    /// it on the next allocation if pooling is re-enabled.
    pub(crate) fn spawn(pool: Weak<AllocationPool>, settings: Arc<Settings>) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(settings.expired_check_interval()) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                if !settings.pooling_enabled() {
                    break;
                }
                match pool.upgrade() {
                    Some(pool) => {
                        pool.sweep_expired();
                    }
                    None => break,
                }
            }
            flag.store(false, Ordering::Release);
        });

        Self {
            stop_tx,
            running,
            thread: Some(thread),
        }
    }

    /// Whether the loop is still alive (it exits on its own once pooling
    /// is disabled).
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        // Best effort: the thread may already have exited on its own.
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            // The last pool Arc can be dropped on the sweep thread itself
            // (the loop holds a short-lived upgrade). Joining would then be
            // a self-join; let the thread run out on the stop signal.
            if thread.thread().id() != std::thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}
