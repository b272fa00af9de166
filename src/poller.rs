/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::error::PollerError;
use crate::metrics::UnitMetrics;
use crate::unit_hook::UnitHook;

/// Destination of drained unit metrics, e.g. a metrics exporter
pub trait MetricsSink: Send + Sync + 'static {
    fn export(&self, metrics: Vec<UnitMetrics>);
}

impl<F> MetricsSink for F
where
    F: Fn(Vec<UnitMetrics>) + Send + Sync + 'static,
{
    fn export(&self, metrics: Vec<UnitMetrics>) {
        self(metrics)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PollerSettings {
    interval: Duration,
}

impl PollerSettings {
    /// Changes how often metrics are drained from the hook
    ///
    /// # Arguments
    ///
    /// * `interval`: time between drains, must not be zero
    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Background task draining a [`UnitHook`] into a [`MetricsSink`]
///
/// Must be spawned from within a tokio runtime.
pub struct MetricsPoller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<usize>,
}

impl MetricsPoller {
    /// Starts draining `hook` into `sink` on every settings interval
    ///
    /// Fails with [`PollerError::ZeroInterval`] when the interval is zero.
    pub fn spawn(
        hook: Arc<UnitHook>,
        settings: PollerSettings,
        sink: impl MetricsSink,
    ) -> Result<Self, PollerError> {
        if settings.interval().is_zero() {
            return Err(PollerError::ZeroInterval);
        }

        let (shutdown, mut signal) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(settings.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut exported = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => exported += drain(&hook, &sink),
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }
            }

            exported + drain(&hook, &sink)
        });

        Ok(Self { shutdown, task })
    }

    /// Stops polling after one last drain
    ///
    /// Returns number of records handed to the sink over the poller lifetime.
    pub async fn stop(self) -> Result<usize, PollerError> {
        self.shutdown.send_replace(true);
        Ok(self.task.await?)
    }
}

impl Debug for MetricsPoller {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsPoller")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

fn drain(hook: &UnitHook, sink: &impl MetricsSink) -> usize {
    let metrics = hook.unit_metrics();
    if metrics.is_empty() {
        return 0;
    }

    let count = metrics.len();
    debug!(count, "exporting unit metrics");
    sink.export(metrics);
    count
}
