/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use crate::job::{JobId, JobRef, SourceId};

/// Piece of content produced by a connector for detectors to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    source_id: SourceId,
    job_id: JobId,
    data: Vec<u8>,
}

impl Chunk {
    pub fn new(job: &JobRef, data: impl Into<Vec<u8>>) -> Self {
        Self {
            source_id: job.source_id(),
            job_id: job.job_id(),
            data: data.into(),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
