//! Background thread driving periodic map updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::map::StreamingMap;

/// Owns the update thread of a [`StreamingMap`].
///
/// Each tick calls [`StreamingMap::refresh`], which itself decides whether
/// the agent has moved far enough to warrant a request. Dropping the
/// updater stops the thread and joins it.
pub struct MapUpdater {
    running: Arc<AtomicBool>,
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MapUpdater {
    /// Spawn the update thread, ticking at the map's configured interval.
    pub fn spawn(map: Arc<StreamingMap>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("map-updater".into())
            .spawn(move || run_update_loop(map, thread_running, shutdown_rx))
            .expect("Failed to spawn map updater thread");

        Self {
            running,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Whether the update thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the update thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Map updater thread panicked");
        }
    }
}

impl Drop for MapUpdater {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_update_loop(map: Arc<StreamingMap>, running: Arc<AtomicBool>, shutdown_rx: Receiver<()>) {
    let interval = map.tick_interval();
    log::info!("Map updater started, interval {:?}", interval);

    while running.load(Ordering::Relaxed) {
        match shutdown_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => map.refresh(),
        }
    }

    log::info!("Map updater stopped");
}
