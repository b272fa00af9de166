/*
 * Copyright © 2024. EcomDev B.V.
 * All rights reserved.
 * See LICENSE for license details.
 */
//! Progress tracking of scan jobs and their units.
//!
//! Connectors report lifecycle events through [`JobProgress`], which fans
//! them out to every registered [`JobProgressHook`]. [`UnitHook`] aggregates
//! them into bounded per unit [`UnitMetrics`] that readers drain with
//! [`UnitHook::unit_metrics`], either directly or through a [`MetricsPoller`].
#![warn(missing_debug_implementations, unreachable_pub)]

mod cache;
mod chunk;
mod error;
mod hook;
mod job;
mod metrics;
mod poller;
mod sync;
mod unit;
mod unit_hook;

pub use cache::*;
pub use chunk::*;
pub use error::*;
pub use hook::*;
pub use job::*;
pub use metrics::*;
pub use poller::*;
pub use unit::*;
pub use unit_hook::*;
