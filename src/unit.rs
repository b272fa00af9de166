/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
use std::fmt::Debug;
use std::sync::Arc;

/// Independently progressable part of a source's work
///
/// A repository inside an organization scan or a single bucket of an object
/// store are typical units. The identifier must be stable and unique within
/// the source that produced it.
pub trait SourceUnit: Debug + Send + Sync {
    fn source_unit_id(&self) -> &str;
}

/// Shared handle to a unit, as passed around by connectors
pub type UnitRef = Arc<dyn SourceUnit>;

/// Unit identified only by its string id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommonSourceUnit {
    id: String,
}

impl CommonSourceUnit {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Creates a shareable [`UnitRef`] out of the id
    ///
    /// ```rust
    /// use scanprogress::CommonSourceUnit;
    ///
    /// let unit = CommonSourceUnit::shared("org/repo");
    /// assert_eq!(unit.source_unit_id(), "org/repo");
    /// ```
    pub fn shared(id: impl Into<String>) -> UnitRef {
        Arc::new(Self::new(id))
    }
}

impl SourceUnit for CommonSourceUnit {
    fn source_unit_id(&self) -> &str {
        &self.id
    }
}
