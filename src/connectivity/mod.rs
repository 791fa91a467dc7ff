//! Connectivity observation.
//!
//! This module provides the `ConnectivityMonitor`, which tracks
//! online/offline state and link quality and notifies subscribers of
//! transitions. Platform signals are injected through the
//! `ConnectivitySource` trait so the monitor itself stays testable and
//! platform-agnostic.

pub mod monitor;
pub mod source;
pub mod status;

pub use monitor::{ConnectivityMonitor, ListenerHandle};
pub use source::{ConnectivitySource, PushConnectivitySource, SourceSubscription, StatusCallback};
pub use status::{ConnectionStatus, NetworkQuality};
