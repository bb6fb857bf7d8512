use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, error, info, warn};

use deathraid_utils::time::now_unix_secs;

use crate::coordinator::DeathRaidCoordinator;
use crate::gateway::ProtectionGateway;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the periodic expiration sweep and persistence flush.
///
/// Each task receives the coordinator explicitly and runs every tick to completion; shutdown is
/// only observed between ticks.
#[derive(Debug)]
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn start<G>(coordinator: Arc<DeathRaidCoordinator<G>>, sweep_interval: Duration) -> Self
    where
        G: ProtectionGateway + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let sweep = tokio::spawn(run_expiration_sweep(
            Arc::clone(&coordinator),
            sweep_interval,
            shutdown_rx.clone(),
        ));
        let flush = tokio::spawn(run_auto_save(coordinator, shutdown_rx));

        info!(
            sweep_interval_secs = sweep_interval.as_secs(),
            "scheduled tasks registered"
        );

        Self {
            shutdown,
            tasks: vec![("raid_window_check", sweep), ("auto_save", flush)],
        }
    }

    /// Signal both tasks and wait for any in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);

        for (name, task) in self.tasks {
            if let Err(source) = task.await {
                error!(?source, task = name, "scheduled task ended abnormally");
            }
        }
    }
}

async fn run_expiration_sweep<G>(
    coordinator: Arc<DeathRaidCoordinator<G>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    G: ProtectionGateway,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let report = coordinator.sweep_expirations(now_unix_secs()).await;
        if report.is_empty() {
            debug!("raid window check found nothing to do");
            continue;
        }

        info!(
            closed = report.closed.len(),
            reconciled = report.reconciled.len(),
            failed = report.failed.len(),
            "raid window check finished"
        );
        for (party, source) in &report.failed {
            warn!(%source, party = %party, "raid window left for next check");
        }
    }
}

async fn run_auto_save<G>(
    coordinator: Arc<DeathRaidCoordinator<G>>,
    mut shutdown: watch::Receiver<bool>,
) where
    G: ProtectionGateway,
{
    loop {
        // Re-read every cycle so interval changes apply without a restart.
        let period = Duration::from_secs(coordinator.settings().snapshot().save_interval_secs());

        tokio::select! {
            _ = sleep(period) => {}
            _ = shutdown.changed() => break,
        }

        match coordinator.flush().await {
            Ok(()) => info!("auto-saved death raid data"),
            Err(source) => error!(%source, "auto-save failed; keeping in-memory state"),
        }
    }
}
