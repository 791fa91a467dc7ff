//! Concurrent resource loading.
//!
//! This module provides the `DataLoader`, which asks the sync layer for
//! both map resources in parallel, exposes their observable states, and
//! schedules single-flight background refreshes when a stale copy was
//! served while online.

pub mod coordinator;

pub use coordinator::{DataLoader, ResourceState};
