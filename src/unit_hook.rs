/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::{self, Debug, Formatter};
use std::time::SystemTime;

use tracing::{error, trace};

use crate::cache::LruCache;
use crate::chunk::Chunk;
use crate::error::{error_unit, CacheError, ScanError};
use crate::hook::JobProgressHook;
use crate::job::JobRef;
use crate::metrics::{MetricsKey, UnitMetrics};
use crate::sync::{lock, Mutex};
use crate::unit::UnitRef;

/// Number of unit metrics kept in memory by default
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug)]
pub struct UnitHookSettings {
    capacity: usize,
}

impl UnitHookSettings {
    /// Changes number of units tracked at the same time
    ///
    /// # Arguments
    ///
    /// * `capacity`: maximum number of resident entries, must not be zero
    pub fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for UnitHookSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Eviction listener reporting metrics that were lost before any reader saw them
pub fn log_dropped_metric(key: &MetricsKey, metrics: &UnitMetrics) {
    if metrics.is_handled() {
        return;
    }

    error!(id = %key, metric = ?metrics, "dropping unit metric");
}

/// Tracks chunking progress of each individual unit
///
/// Keeps at most [`capacity`](UnitHookSettings::capacity) entries; the least
/// recently touched one is evicted when a new unit starts over the limit.
/// Events for evicted units are ignored.
pub struct UnitHook {
    metrics: Mutex<LruCache<MetricsKey, UnitMetrics>>,
}

impl UnitHook {
    pub fn new() -> Self {
        match Self::with_settings(UnitHookSettings::default()) {
            Ok(hook) => hook,
            Err(_) => unreachable!(),
        }
    }

    pub fn with_settings(settings: UnitHookSettings) -> Result<Self, CacheError> {
        LruCache::with_listener(settings.capacity(), log_dropped_metric).map(Self::with_cache)
    }

    /// Uses provided cache for storing metrics
    ///
    /// Allows replacing the eviction listener, which by default
    /// is [`log_dropped_metric`].
    pub fn with_cache(cache: LruCache<MetricsKey, UnitMetrics>) -> Self {
        Self {
            metrics: Mutex::new(cache),
        }
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        lock(&self.metrics).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.metrics).is_empty()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.metrics).capacity()
    }

    /// Returns all active and newly finished unit metrics
    ///
    /// Finished units are removed from the hook as part of this call, so each
    /// of them is returned exactly once. Units still in progress stay and are
    /// returned again by later calls.
    pub fn unit_metrics(&self) -> Vec<UnitMetrics> {
        let mut metrics = lock(&self.metrics);
        let mut output = Vec::with_capacity(metrics.len());

        for key in metrics.keys() {
            let Some(entry) = metrics.get_mut(&key) else {
                continue;
            };

            output.push(entry.clone());

            if entry.is_finished() {
                entry.mark_handled();
                metrics.remove(&key);
            }
        }

        output
    }
}

impl Default for UnitHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for UnitHook {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHook")
            .field("metrics", &*lock(&self.metrics))
            .finish()
    }
}

impl JobProgressHook for UnitHook {
    fn start_unit_chunking(&self, job: &JobRef, unit: Option<&UnitRef>, start: SystemTime) {
        let key = MetricsKey::new(job, unit);
        let entry = UnitMetrics::new(job.clone(), unit.cloned(), Some(start));

        lock(&self.metrics).add(key, entry);
    }

    fn end_unit_chunking(&self, job: &JobRef, unit: Option<&UnitRef>, end: SystemTime) {
        let key = MetricsKey::new(job, unit);
        let mut metrics = lock(&self.metrics);

        match metrics.get_mut(&key) {
            Some(entry) => entry.finish_at(end),
            None => trace!(id = %key, "ignoring end of untracked unit"),
        }
    }

    fn report_chunk(&self, job: &JobRef, unit: Option<&UnitRef>, chunk: &Chunk) {
        let key = MetricsKey::new(job, unit);
        let mut metrics = lock(&self.metrics);

        match metrics.get_mut(&key) {
            Some(entry) => entry.record_chunk(chunk.len()),
            None if unit.is_some() => trace!(id = %key, "ignoring chunk of evicted unit"),
            None => {
                // Sources without unit support never start chunking explicitly.
                let mut entry = UnitMetrics::new(job.clone(), None, job.snapshot().start_time);
                entry.record_chunk(chunk.len());
                metrics.add(key, entry);
            }
        }
    }

    fn report_error(&self, job: &JobRef, error: &ScanError) {
        let mut metrics = lock(&self.metrics);

        if let Some(entry) = metrics.get_mut(&MetricsKey::job(job)) {
            entry.record_error(error);
        }

        let Some(unit) = error_unit(error) else {
            return;
        };

        if let Some(entry) = metrics.get_mut(&MetricsKey::new(job, Some(unit))) {
            entry.record_error(error);
        }
    }

    fn finish(&self, job: &JobRef) {
        let prefix = MetricsKey::job(job);
        let mut metrics = lock(&self.metrics);
        let mut snapshot = None;

        for key in metrics.keys() {
            if !key.starts_with(&prefix) {
                continue;
            }

            let Some(entry) = metrics.get_mut(&key) else {
                continue;
            };

            // Without unit support the job's own bookkeeping is the most
            // complete record of the work done.
            if entry.unit().is_none() {
                entry.reconcile(snapshot.get_or_insert_with(|| job.snapshot()));
            }
        }
    }
}
