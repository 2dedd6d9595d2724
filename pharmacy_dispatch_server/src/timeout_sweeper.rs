use std::time::Duration;

use log::*;
use pharmacy_dispatch_engine::{dispatch::DispatchPolicy, DispatchBackend, EmergencyOrderApi, SweepResult};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{config::ServerConfig, errors::ServerError, server::connect_database};

/// Starts the timeout sweeper. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick runs one sweep to completion before waiting for the next, so sweeps never overlap. Ticks missed while a
/// slow sweep was running are skipped rather than bunched up. A failed sweep is logged and the next tick runs as usual.
///
/// The task is spawned onto the current thread's local task set, so this must be called from within the actix
/// runtime.
pub fn start_timeout_sweeper<B>(db: B, policy: DispatchPolicy, interval: Duration) -> JoinHandle<()>
where B: DispatchBackend + 'static {
    tokio::task::spawn_local(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let api = EmergencyOrderApi::new(db, policy);
        info!("🕰️ Emergency order timeout sweeper started. Sweeping every {}ms", interval.as_millis());
        loop {
            timer.tick().await;
            trace!("🕰️ Running emergency order timeout sweep");
            match api.process_order_timeouts().await {
                Ok(result) => log_result(&result),
                Err(e) => {
                    error!("🕰️ Error running emergency order timeout sweep: {e}");
                },
            }
        }
    })
}

/// Runs exactly one sweep against the configured database.
pub async fn run_single_sweep(config: &ServerConfig) -> Result<SweepResult, ServerError> {
    let mut db = connect_database(config).await?;
    let api = EmergencyOrderApi::new(db.clone(), config.dispatch_policy());
    let result = api.process_order_timeouts().await;
    db.close().await?;
    let result = result?;
    log_result(&result);
    Ok(result)
}

fn log_result(result: &SweepResult) {
    if result.is_empty() {
        debug!("🕰️ No overdue emergency orders");
    } else {
        info!("🕰️ {} emergency orders expired without a response: {:?}", result.count(), result.expired);
    }
}
