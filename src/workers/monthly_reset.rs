//! Background worker driving periodic merchant housekeeping.

use crate::services::HousekeepingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

pub struct MonthlyResetWorker {
    housekeeping: Arc<HousekeepingService>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl MonthlyResetWorker {
    pub fn new(
        housekeeping: Arc<HousekeepingService>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            housekeeping,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "monthly_reset_worker_started");
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so a restart does not
        // reset counters mid-month.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.housekeeping.run_monthly_reset().await {
                        error!(error = %err, "monthly_reset_run_failed");
                    }
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("monthly_reset_worker_stopping");
                        break;
                    }
                }
            }
        }
    }
}
