//! Backend health tracking.
//!
//! The [`HealthMonitor`] is the only writer of backend health. Readers hold a
//! [`HealthHandle`] and get the latest completed [`HealthSnapshot`] without
//! waiting on any probe in flight.

mod monitor;
mod snapshot;

pub use monitor::*;
pub use snapshot::*;
