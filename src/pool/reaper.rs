use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

enum ReaperState {
    Stopped,
    // Dropping the sender is the cancellation signal
    Running { cancel: Sender<()> },
}

/// Start/stop switch for the background thread that removes idle locks from a pool.
///
/// At most one reaper thread is started per [Reaper]. Stopping doesn't wait for the thread,
/// it notices the cancellation while it waits for its next tick and exits. Dropping the
/// [Reaper] stops it as well.
///
/// Every thread started by a [Reaper] sweeps under the same scan lock, so a thread started
/// right after [Reaper::stop] waits for a sweep still running in the old one.
pub(crate) struct Reaper {
    state: Mutex<ReaperState>,
    scan: Arc<Mutex<()>>,
}

impl Reaper {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReaperState::Stopped),
            scan: Arc::new(Mutex::new(())),
        }
    }

    fn _state(&self) -> MutexGuard<'_, ReaperState> {
        self.state
            .lock()
            .expect("The mutex protecting the reaper state is poisoned. This shouldn't happen since no user code runs while it is held")
    }

    /// Spawn a thread calling `sweep` every `interval`.
    ///
    /// `sweep` returns the number of removed entries, or [None] if the pool it works on is gone,
    /// in which case the thread exits.
    pub fn start<F>(&self, interval: Duration, sweep: F)
    where
        F: FnMut() -> Option<usize> + Send + 'static,
    {
        let mut state = self._state();
        if let ReaperState::Running { .. } = *state {
            info!("idle reaper already running");
            return;
        }

        let (cancel, cancelled) = mpsc::channel();
        let scan = Arc::clone(&self.scan);
        let spawn_result = thread::Builder::new()
            .name("lockpool-reaper".to_string())
            .spawn(move || run(interval, cancelled, &scan, sweep));
        match spawn_result {
            Ok(_) => {
                debug!(?interval, "idle reaper started");
                *state = ReaperState::Running { cancel };
            }
            Err(err) => {
                error!(%err, "failed to spawn the idle reaper thread");
            }
        }
    }

    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self._state(), ReaperState::Stopped);
        if let ReaperState::Running { cancel } = previous {
            // The reaper sees the disconnect while waiting for its next tick
            std::mem::drop(cancel);
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self._state(), ReaperState::Running { .. })
    }
}

fn run<F>(interval: Duration, cancelled: mpsc::Receiver<()>, scan: &Mutex<()>, mut sweep: F)
where
    F: FnMut() -> Option<usize>,
{
    loop {
        match cancelled.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("idle reaper cancelled");
                return;
            }
        }

        let _scan = scan
            .lock()
            .expect("The idle reaper scan lock is poisoned. A sweep panicked in another reaper thread");
        // We may have waited for the scan lock. Don't start a sweep after being stopped meanwhile.
        if let Ok(()) | Err(TryRecvError::Disconnected) = cancelled.try_recv() {
            info!("idle reaper cancelled");
            return;
        }

        match sweep() {
            Some(0) => {}
            Some(removed) => info!(removed, "removed idle locks"),
            None => {
                debug!("lock pool is gone, idle reaper exiting");
                return;
            }
        }
    }
}
