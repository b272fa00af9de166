/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::time::SystemTime;

use crate::chunk::Chunk;
use crate::error::ScanError;
use crate::job::JobRef;
use crate::unit::UnitRef;

/// Observer of job progress
///
/// Connectors invoke these from their own threads while scanning, so every
/// implementation must tolerate concurrent calls. Each event has an empty
/// default body: implement only the events you care about.
///
/// Implementations must not block on I/O, they run inline with the scan.
pub trait JobProgressHook: Send + Sync {
    /// Called when the job starts
    fn start(&self, _job: &JobRef, _start: SystemTime) {}

    /// Called when the job ends
    fn end(&self, _job: &JobRef, _end: SystemTime) {}

    /// Called when the source begins listing its units
    fn start_enumerating(&self, _job: &JobRef, _start: SystemTime) {}

    /// Called when the source finished listing its units
    fn end_enumerating(&self, _job: &JobRef, _end: SystemTime) {}

    /// Called before chunks of a unit are produced
    ///
    /// `unit` is `None` for sources without unit support.
    fn start_unit_chunking(&self, _job: &JobRef, _unit: Option<&UnitRef>, _start: SystemTime) {}

    /// Called after the last chunk of a unit has been produced
    fn end_unit_chunking(&self, _job: &JobRef, _unit: Option<&UnitRef>, _end: SystemTime) {}

    /// Called for every error encountered while scanning the job
    fn report_error(&self, _job: &JobRef, _error: &ScanError) {}

    /// Called for every unit found during enumeration
    fn report_unit(&self, _job: &JobRef, _unit: &UnitRef) {}

    /// Called for every chunk produced
    fn report_chunk(&self, _job: &JobRef, _unit: Option<&UnitRef>, _chunk: &Chunk) {}

    /// Called once after the job has ended
    fn finish(&self, _job: &JobRef) {}
}

/// Hook that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl JobProgressHook for NoopHook {}
