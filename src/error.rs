/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

use crate::unit::UnitRef;

/// Error produced by a connector or detector while scanning
///
/// Shared so that metric records can be copied out to readers without
/// giving up the original error value.
pub type ScanError = Arc<dyn Error + Send + Sync>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache capacity must be greater than zero")]
    ZeroCapacity,
}

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Poller interval must be greater than zero")]
    ZeroInterval,
    #[error("Metrics poller task failed")]
    Task(#[from] tokio::task::JoinError),
}

/// Error scoped to a single unit of a job
///
/// Reporting it attributes the failure to the unit as well as to the job.
#[derive(Error, Debug)]
#[error("unit {unit_id}: {source}", unit_id = .unit.source_unit_id())]
pub struct ChunkError {
    unit: UnitRef,
    #[source]
    source: Box<dyn Error + Send + Sync>,
}

impl ChunkError {
    pub fn new(unit: UnitRef, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            unit,
            source: source.into(),
        }
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    /// Wraps the error into a shareable [`ScanError`]
    pub fn into_scan_error(self) -> ScanError {
        Arc::new(self)
    }
}

/// Finds the unit a reported error belongs to
///
/// Walks the whole [`Error::source`] chain, so a [`ChunkError`] wrapped by
/// another error is still recognized.
pub fn error_unit(error: &ScanError) -> Option<&UnitRef> {
    let root: &(dyn Error + 'static) = &**error;
    let mut current = Some(root);

    while let Some(error) = current {
        if let Some(chunk_error) = error.downcast_ref::<ChunkError>() {
            return Some(chunk_error.unit());
        }
        current = error.source();
    }

    None
}
