/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::chunk::Chunk;
use crate::error::ScanError;
use crate::hook::JobProgressHook;
use crate::sync::{lock, Mutex};
use crate::unit::UnitRef;

/// Identifier of a configured source, assigned by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct SourceId(pub i64);

/// Identifier of one execution of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct JobId(pub i64);

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Job level state as seen by the orchestrator at a point in time
#[derive(Debug, Clone, Default)]
pub struct JobSnapshot {
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub enumeration_start: Option<SystemTime>,
    pub enumeration_end: Option<SystemTime>,
    pub errors: Vec<ScanError>,
}

impl JobSnapshot {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Time the job has been running, zero when it has not started yet
    pub fn elapsed_time(&self) -> Duration {
        elapsed_between(self.start_time, self.end_time)
    }
}

pub(crate) fn elapsed_between(start: Option<SystemTime>, end: Option<SystemTime>) -> Duration {
    let Some(start) = start else {
        return Duration::ZERO;
    };

    end.unwrap_or_else(SystemTime::now)
        .duration_since(start)
        .unwrap_or_default()
}

/// Reference to a running job
///
/// Cheap to clone. All clones observe the same job level state, which is
/// only ever written by the owning [`JobProgress`].
#[derive(Clone)]
pub struct JobRef {
    source_id: SourceId,
    job_id: JobId,
    state: Arc<Mutex<JobSnapshot>>,
}

impl JobRef {
    /// Creates a reference with its own empty job state
    pub fn new(source_id: SourceId, job_id: JobId) -> Self {
        Self {
            source_id,
            job_id,
            state: Arc::new(Mutex::new(JobSnapshot::default())),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Copy of the current job level state
    pub fn snapshot(&self) -> JobSnapshot {
        lock(&self.state).clone()
    }

    fn update(&self, apply: impl FnOnce(&mut JobSnapshot)) {
        apply(&mut *lock(&self.state));
    }
}

impl Debug for JobRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRef")
            .field("source_id", &self.source_id)
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

/// Orchestrator side of a job
///
/// Keeps the job level bookkeeping and forwards every lifecycle event to the
/// registered hooks. Connectors hold on to it for the lifetime of a scan.
pub struct JobProgress {
    job: JobRef,
    hooks: Vec<Arc<dyn JobProgressHook>>,
}

impl JobProgress {
    pub fn new(source_id: SourceId, job_id: JobId, hooks: Vec<Arc<dyn JobProgressHook>>) -> Self {
        Self {
            job: JobRef::new(source_id, job_id),
            hooks,
        }
    }

    pub fn job_ref(&self) -> &JobRef {
        &self.job
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.job.snapshot()
    }

    pub fn start(&self, start: SystemTime) {
        self.job.update(|state| state.start_time = Some(start));
        self.notify(|hook, job| hook.start(job, start));
    }

    pub fn end(&self, end: SystemTime) {
        self.job.update(|state| state.end_time = Some(end));
        self.notify(|hook, job| hook.end(job, end));
    }

    pub fn start_enumerating(&self, start: SystemTime) {
        self.job.update(|state| state.enumeration_start = Some(start));
        self.notify(|hook, job| hook.start_enumerating(job, start));
    }

    pub fn end_enumerating(&self, end: SystemTime) {
        self.job.update(|state| state.enumeration_end = Some(end));
        self.notify(|hook, job| hook.end_enumerating(job, end));
    }

    pub fn report_unit(&self, unit: &UnitRef) {
        self.notify(|hook, job| hook.report_unit(job, unit));
    }

    pub fn start_unit_chunking(&self, unit: Option<&UnitRef>, start: SystemTime) {
        self.notify(|hook, job| hook.start_unit_chunking(job, unit, start));
    }

    pub fn end_unit_chunking(&self, unit: Option<&UnitRef>, end: SystemTime) {
        self.notify(|hook, job| hook.end_unit_chunking(job, unit, end));
    }

    pub fn report_chunk(&self, unit: Option<&UnitRef>, chunk: &Chunk) {
        self.notify(|hook, job| hook.report_chunk(job, unit, chunk));
    }

    /// Records the error on the job and forwards it to hooks
    pub fn report_error(&self, error: ScanError) {
        self.job.update(|state| state.errors.push(Arc::clone(&error)));
        self.notify(|hook, job| hook.report_error(job, &error));
    }

    /// Signals hooks that no more events will be reported for this job
    pub fn finish(&self) {
        self.notify(|hook, job| hook.finish(job));
    }

    // Job state lock is never held here, hooks are free to take snapshots.
    fn notify(&self, event: impl Fn(&dyn JobProgressHook, &JobRef)) {
        for hook in &self.hooks {
            event(hook.as_ref(), &self.job);
        }
    }
}

impl Debug for JobProgress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobProgress")
            .field("job", &self.job)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
