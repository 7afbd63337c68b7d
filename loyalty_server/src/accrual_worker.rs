use std::time::Duration;

use accrual_client::AccrualApi;
use log::*;
use loyalty_engine::{OrderFlowApi, SqliteDatabase};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Back-off applied when the accrual service rate-limits us without a `Retry-After` hint.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

/// Starts the accrual reconciliation worker. Do not await the returned JoinHandle, as it runs until aborted
/// at shutdown; aborting cancels any in-flight poll at its next await point.
///
/// Ticks never overlap: the next tick is not started until the previous pass (plus any rate-limit pause)
/// has finished.
pub fn start_accrual_worker(db: SqliteDatabase, accrual: AccrualApi, poll_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = OrderFlowApi::new(db, accrual);
        let mut timer = tokio::time::interval(poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Accrual reconciliation worker started, tick interval {poll_interval:?}");
        loop {
            timer.tick().await;
            match api.reconcile_once().await {
                Ok(outcome) => {
                    if outcome.updated > 0 {
                        info!(
                            "🕰️ Reconciled {} orders: {} updated, {} settled",
                            outcome.polled, outcome.updated, outcome.settled
                        );
                    } else {
                        trace!("🕰️ Reconciliation tick: {} orders polled, nothing to do", outcome.polled);
                    }
                    if outcome.rate_limited {
                        let pause = outcome.retry_after.unwrap_or(DEFAULT_BACKOFF);
                        warn!("🕰️ Accrual service demanded a back-off. Pausing for {pause:?}");
                        tokio::time::sleep(pause).await;
                    }
                },
                Err(e) => {
                    error!("🕰️ Reconciliation tick failed: {e}");
                },
            }
        }
    })
}
