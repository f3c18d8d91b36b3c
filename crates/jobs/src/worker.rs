use tokio::sync::watch;
use tracing::{error, info};

use crate::JobEngine;

/// Spawns the worker loop: repeatedly claim the next due job and run its
/// handler, sleeping `poll_interval` when nothing is due. Exits promptly
/// when `stop_rx` observes `true`, mirroring the teacher's
/// `tokio::select! { _ = sleep(...) => {...}, changed = stop_rx.changed() => {...} }`
/// shutdown pattern.
pub fn spawn_worker_loop(engine: JobEngine, mut stop_rx: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("job worker loop starting");
        loop {
            if *stop_rx.borrow() {
                break;
            }

            match engine.run_once().await {
                Ok(true) => continue, // a job ran; immediately look for the next one
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(engine.poll_interval()) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
                Err(err) => {
                    error!(%err, "job worker iteration failed");
                    tokio::select! {
                        _ = tokio::time::sleep(engine.poll_interval()) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
            }

            if *stop_rx.borrow() {
                break;
            }
        }
        info!("job worker loop stopped");
    })
}
