//! Periodic service loops
//!
//! Each loop runs on its own tokio task with a fixed-period interval. A tick
//! that fires while the previous one is still running is skipped rather
//! than queued, and every loop exits when the shutdown flag flips to true.

use super::Frontier;
use crate::config::SchedulerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use url::Url;

/// Starts the drain, dispatch, retry, stats and seed loops
///
/// # Arguments
///
/// * `frontier` - Shared frontier state
/// * `config` - Loop intervals and batch sizes
/// * `sink` - Receives the URLs handed out as fetch tasks
/// * `shutdown` - Loops stop once this reads `true`
///
/// # Returns
///
/// Handles of the spawned tasks
pub fn spawn_service_loops(
    frontier: Arc<Frontier>,
    config: SchedulerConfig,
    sink: mpsc::Sender<Url>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    {
        let frontier = Arc::clone(&frontier);
        handles.push(spawn_loop(
            "drain",
            config.drain_interval_ms,
            shutdown.clone(),
            move || {
                let frontier = Arc::clone(&frontier);
                async move {
                    frontier.run_drain_cycle();
                    true
                }
            },
        ));
    }

    {
        let frontier = Arc::clone(&frontier);
        let batch = config.dispatch_batch_size;
        handles.push(spawn_loop(
            "dispatch",
            config.dispatch_interval_ms,
            shutdown.clone(),
            move || {
                let frontier = Arc::clone(&frontier);
                let sink = sink.clone();
                async move { dispatch_batch(&frontier, &sink, batch).await }
            },
        ));
    }

    {
        let frontier = Arc::clone(&frontier);
        handles.push(spawn_loop(
            "retry",
            config.retry_interval_ms,
            shutdown.clone(),
            move || {
                let frontier = Arc::clone(&frontier);
                async move {
                    frontier.sweep_retries().await;
                    true
                }
            },
        ));
    }

    {
        let frontier = Arc::clone(&frontier);
        handles.push(spawn_loop(
            "stats",
            config.stats_interval_ms,
            shutdown.clone(),
            move || {
                let frontier = Arc::clone(&frontier);
                async move {
                    let stats = frontier.stats();
                    tracing::info!(
                        "Frontier: {} front URLs, {} back URLs, {} host mappings, {} pending retries",
                        stats.total_front,
                        stats.total_back,
                        stats.host_mappings,
                        stats.retry_pending
                    );
                    true
                }
            },
        ));
    }

    if config.seed_interval_ms > 0 {
        let frontier = Arc::clone(&frontier);
        handles.push(spawn_loop(
            "seed",
            config.seed_interval_ms,
            shutdown,
            move || {
                let frontier = Arc::clone(&frontier);
                async move {
                    if let Err(e) = frontier.schedule_seeds().await {
                        tracing::error!("Seed scheduling failed: {}", e);
                    }
                    true
                }
            },
        ));
    }

    handles
}

/// Sends up to `batch` back-queue URLs to the sink
///
/// # Returns
///
/// `false` once the receiving side is gone
async fn dispatch_batch(frontier: &Frontier, sink: &mpsc::Sender<Url>, batch: usize) -> bool {
    for _ in 0..batch {
        let Some(url) = frontier.dequeue_back_queue() else {
            break;
        };
        tracing::debug!("Dispatching {}", url);
        if sink.send(url).await.is_err() {
            tracing::warn!("Fetch task receiver closed, stopping dispatch");
            return false;
        }
    }
    true
}

/// Runs `tick` every `period_ms` until shutdown or until it returns false
fn spawn_loop<F, Fut>(
    name: &'static str,
    period_ms: u64,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(period_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!("Started {} loop every {}ms", name, period_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if !tick().await {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Stopped {} loop", name);
    })
}
