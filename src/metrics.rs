/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::ScanError;
use crate::job::{elapsed_between, JobRef, JobSnapshot};
use crate::unit::UnitRef;

/// Cache key of a unit's metrics
///
/// Formatted as `{source_id}/{job_id}/{unit_id}` with an empty unit id for
/// sources without unit support. The key of the job itself is therefore a
/// prefix of every unit key of the same job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricsKey(String);

impl MetricsKey {
    pub fn new(job: &JobRef, unit: Option<&UnitRef>) -> Self {
        let unit_id = unit.map(|unit| unit.source_unit_id()).unwrap_or_default();

        Self(format!("{}/{}/{}", job.source_id(), job.job_id(), unit_id))
    }

    /// Key of the entry that stands in for the whole job
    pub fn job(job: &JobRef) -> Self {
        Self::new(job, None)
    }

    pub fn starts_with(&self, prefix: &MetricsKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetricsKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chunking metrics of a single unit
#[derive(Debug, Clone)]
pub struct UnitMetrics {
    unit: Option<UnitRef>,
    parent: JobRef,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    total_chunks: u64,
    total_bytes: u64,
    errors: Vec<ScanError>,
    // Set once the record has been delivered to a reader, so that removing
    // it from the cache is not a loss.
    handled: bool,
}

impl UnitMetrics {
    pub(crate) fn new(
        parent: JobRef,
        unit: Option<UnitRef>,
        start_time: Option<SystemTime>,
    ) -> Self {
        Self {
            unit,
            parent,
            start_time,
            end_time: None,
            total_chunks: 0,
            total_bytes: 0,
            errors: Vec::new(),
            handled: false,
        }
    }

    /// Unit these metrics belong to, `None` when the source has no units
    pub fn unit(&self) -> Option<&UnitRef> {
        self.unit.as_ref()
    }

    pub fn parent(&self) -> &JobRef {
        &self.parent
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Number of chunks produced from the unit
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Number of bytes produced from the unit
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Every error encountered by the unit, in reporting order
    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Time spent chunking the unit
    ///
    /// Zero if chunking has not started, time since start while it is in
    /// progress and the total time once it has finished.
    ///
    /// ```rust
    /// use std::time::{Duration, SystemTime};
    /// use scanprogress::{CommonSourceUnit, JobId, JobProgressHook, JobRef, SourceId, UnitHook};
    ///
    /// let hook = UnitHook::new();
    /// let job = JobRef::new(SourceId(1), JobId(1));
    /// let unit = CommonSourceUnit::shared("repo");
    /// let start = SystemTime::UNIX_EPOCH;
    ///
    /// hook.start_unit_chunking(&job, Some(&unit), start);
    /// hook.end_unit_chunking(&job, Some(&unit), start + Duration::from_secs(3));
    ///
    /// assert_eq!(hook.unit_metrics()[0].elapsed_time(), Duration::from_secs(3));
    /// ```
    pub fn elapsed_time(&self) -> Duration {
        elapsed_between(self.start_time, self.end_time)
    }

    pub(crate) fn finish_at(&mut self, end: SystemTime) {
        self.end_time = Some(end);
    }

    pub(crate) fn record_chunk(&mut self, bytes: usize) {
        self.total_chunks = self.total_chunks.saturating_add(1);
        self.total_bytes = self.total_bytes.saturating_add(bytes as u64);
    }

    pub(crate) fn record_error(&mut self, error: &ScanError) {
        self.errors.push(Arc::clone(error));
    }

    /// Replaces timing and errors with the job level bookkeeping
    pub(crate) fn reconcile(&mut self, snapshot: &JobSnapshot) {
        self.start_time = snapshot.start_time;
        self.end_time = snapshot.end_time;
        self.errors = snapshot.errors.clone();
    }

    pub(crate) fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub(crate) fn is_handled(&self) -> bool {
        self.handled
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UnitMetrics {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let errors: Vec<String> = self.errors.iter().map(ToString::to_string).collect();

        let mut state = serializer.serialize_struct("UnitMetrics", 8)?;
        state.serialize_field(
            "unit",
            &self.unit.as_ref().map(|unit| unit.source_unit_id()),
        )?;
        state.serialize_field("source_id", &self.parent.source_id())?;
        state.serialize_field("job_id", &self.parent.job_id())?;
        state.serialize_field("start_time", &self.start_time)?;
        state.serialize_field("end_time", &self.end_time)?;
        state.serialize_field("total_chunks", &self.total_chunks)?;
        state.serialize_field("total_bytes", &self.total_bytes)?;
        state.serialize_field("errors", &errors)?;
        state.end()
    }
}
