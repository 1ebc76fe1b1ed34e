//! Schedule sweeper: wakes schedule-trigger pauses whose delay has elapsed.
//!
//! A periodic task polls the pause store for due schedule pauses and feeds
//! each one to the resume coordinator. Resume failures are logged and
//! retried on the next tick; a pause that resumes successfully is deleted
//! by the coordinator and drops out of the due list.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fermata_core::executor::BlockHandler;
use fermata_core::repository::pause::PauseStore;
use fermata_core::repository::runs::RunSink;
use fermata_core::repository::wait::WaitRegistry;
use fermata_core::resume::{ResumeCoordinator, ResumeError};
use fermata_types::graph::ResumeTriggerKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the sweeper task. It runs until `shutdown` is cancelled.
pub fn spawn_schedule_sweeper<P, W, R, H>(
    store: Arc<P>,
    coordinator: Arc<ResumeCoordinator<P, W, R, H>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    P: PauseStore + 'static,
    W: WaitRegistry + 'static,
    R: RunSink + 'static,
    H: BlockHandler + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "schedule sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("schedule sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    sweep(&store, &coordinator).await;
                }
            }
        }
    })
}

async fn sweep<P, W, R, H>(store: &Arc<P>, coordinator: &Arc<ResumeCoordinator<P, W, R, H>>)
where
    P: PauseStore,
    W: WaitRegistry,
    R: RunSink,
    H: BlockHandler,
{
    let due = match store.list_due_schedules(Utc::now()).await {
        Ok(due) => due,
        Err(err) => {
            warn!(error = %err, "failed to list due schedule pauses");
            return;
        }
    };

    for summary in due {
        if summary.trigger != ResumeTriggerKind::Schedule {
            continue;
        }
        debug!(execution_id = %summary.execution_id, "waking due schedule pause");
        match coordinator.resume_on_schedule(summary.execution_id).await {
            Ok(outcome) => {
                info!(
                    execution_id = %summary.execution_id,
                    is_paused = outcome.result.is_paused,
                    success = outcome.result.success,
                    "schedule pause resumed"
                );
            }
            // Another instance may have raced us to it.
            Err(ResumeError::NotFound) => {}
            Err(err) => {
                warn!(
                    execution_id = %summary.execution_id,
                    error = %err,
                    "schedule resume failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
