//! Periodic retention sweep
//!
//! Runs the evaluator for every tenant on a fixed interval. Errors are logged
//! and the next tick proceeds.

use std::sync::Arc;
use std::time::Duration;

use shared::util::now_millis;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::evaluator::recalculate_tenant;
use super::rules::RetentionRules;
use crate::db::RetentionStore;

/// Evaluate every tenant once. Returns the number of tenants evaluated.
pub async fn sweep_all_tenants(store: &dyn RetentionStore, rules: &RetentionRules) -> usize {
    let tenant_ids = match store.list_tenant_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Retention sweep could not list tenants");
            return 0;
        }
    };

    let mut evaluated = 0;
    for tenant_id in &tenant_ids {
        match recalculate_tenant(store, rules, tenant_id, now_millis()).await {
            Ok(_) => evaluated += 1,
            Err(e) => tracing::error!(tenant_id = %tenant_id, error = %e, "Retention sweep failed"),
        }
    }
    evaluated
}

/// Spawn the background sweep (first run after one full interval)
///
/// `shutdown` is only observed between runs: a sweep that has started always
/// finishes its tenant batch before the task exits.
pub fn spawn_sweep(
    store: Arc<dyn RetentionStore>,
    rules: Arc<RetentionRules>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tracing::info!(interval_secs = every.as_secs(), "Retention sweep scheduled");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await; // skip immediate tick
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Retention sweep shutting down");
                    break;
                }
                _ = interval.tick() => {}
            }
            let tenants = sweep_all_tenants(store.as_ref(), &rules).await;
            tracing::info!(tenants, "Retention sweep completed");
        }
    })
}
