use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::config::SyncSettings;
use crate::services::sync::{SyncManager, SyncRun};

#[derive(Debug, Clone, Copy)]
pub(crate) struct AgentTiming {
    pub(crate) sync_every: Duration,
    pub(crate) probe_every: Duration,
}

impl AgentTiming {
    pub(crate) fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            sync_every: Duration::from_secs(settings.interval_seconds.max(1)),
            probe_every: Duration::from_secs(settings.health_probe_seconds.max(1)),
        }
    }
}

/// Runs the sync loop and the health probe until a shutdown signal arrives.
pub(crate) async fn run(manager: Arc<SyncManager>, timing: AgentTiming) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = spawn(manager, timing, shutdown_rx);

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to sync tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Sync task join failed");
        }
    }

    Ok(())
}

pub(crate) fn spawn(
    manager: Arc<SyncManager>,
    timing: AgentTiming,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let reconnected = Arc::new(Notify::new());

    vec![
        tokio::spawn(sync_loop(
            manager.clone(),
            timing.sync_every,
            reconnected.clone(),
            shutdown.clone(),
        )),
        tokio::spawn(probe_loop(manager, timing.probe_every, reconnected, shutdown)),
    ]
}

async fn sync_loop(
    manager: Arc<SyncManager>,
    every: Duration,
    reconnected: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
            _ = reconnected.notified() => {
                tracing::info!("Sync server reachable again; syncing");
            }
        }

        if let SyncRun::Skipped = manager.sync_now().await {
            tracing::debug!("Scheduled sync skipped; a round is already running");
        }
    }
}

/// Wakes the sync loop on an offline to online transition.
async fn probe_loop(
    manager: Arc<SyncManager>,
    every: Duration,
    reconnected: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut online = None;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let reachable = manager.probe().await;
        match (online, reachable) {
            (Some(false), true) => {
                tracing::info!("Sync server is back online");
                if !manager.is_syncing() {
                    reconnected.notify_one();
                }
            }
            (Some(true) | None, false) => {
                tracing::warn!("Sync server is unreachable");
            }
            _ => {}
        }
        online = Some(reachable);
    }
}
