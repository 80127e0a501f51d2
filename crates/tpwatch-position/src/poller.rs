//! Background poller driving periodic update passes.
//!
//! The loop waits on either the next tick or the stop token. A pass that
//! has already started is never interrupted: cancellation is only observed
//! between passes, so stopping cannot leave a position half-updated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::monitor::{MonitoringEngine, PassTrigger};

/// Handle to a running poller task.
pub struct PollerHandle {
    token: CancellationToken,
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request stop without waiting.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Request stop and wait for the loop (and any in-flight pass) to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Poller task ended abnormally");
        }
    }
}

/// Spawn the poller on the current tokio runtime.
///
/// The first pass runs immediately; later passes follow every `interval`.
/// Ticks missed while a slow pass runs are skipped rather than bunched up.
pub fn spawn_poller(engine: Arc<MonitoringEngine>, interval: Duration) -> PollerHandle {
    let token = CancellationToken::new();
    let running = Arc::new(AtomicBool::new(true));

    let join = tokio::spawn(run_loop(
        engine,
        interval,
        token.clone(),
        Arc::clone(&running),
    ));

    PollerHandle {
        token,
        running,
        join,
    }
}

async fn run_loop(
    engine: Arc<MonitoringEngine>,
    interval: Duration,
    token: CancellationToken,
    running: Arc<AtomicBool>,
) {
    info!(interval_secs = interval.as_secs(), "Position monitor started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Stop requested");
                break;
            }
            _ = ticker.tick() => {}
        }

        engine.run_pass(PassTrigger::Poller).await;
    }

    running.store(false, Ordering::SeqCst);
    info!("Position monitor stopped");
}
