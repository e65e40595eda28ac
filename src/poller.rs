use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::device_client::{DeviceClient, RefreshOutcome};
use crate::error::Hs110Error;

/// Shortest accepted polling period; `interval` cannot tick at zero.
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Drives a `DeviceClient` at a fixed interval until it reports a fatal error.
pub struct Poller {
    client: DeviceClient,
    period: Duration,
}

impl Poller {
    /// Periods shorter than `MIN_POLL_PERIOD` are raised to it.
    pub fn new(client: DeviceClient, period: Duration) -> Self {
        Self {
            client,
            period: period.max(MIN_POLL_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Polls forever. Only returns once the client gives up, with the reason.
    pub async fn run(mut self) -> Hs110Error {
        info!(
            connection = %self.client.connection_description(),
            period = ?self.period,
            "starting HS110 poller"
        );

        let mut ticks = interval(self.period);
        // A slow refresh delays the next poll instead of bunching them up
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            match self.client.refresh().await {
                Ok(RefreshOutcome::Updated(sample)) => info!("{sample}"),
                Ok(_) => info!("{}", self.client.current_sample()),
                Err(fatal) => return fatal,
            }
        }
    }
}
