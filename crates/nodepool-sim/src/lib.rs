//! nodepool-sim: an in-memory fleet implementing every collaborator trait.
//!
//! A `FleetSnapshot` describes one cluster, its scaling group, the
//! instances behind it and the services running on it. `SimulatedFleet`
//! loads a snapshot and answers container, compute and scaling calls
//! against it, with a little behavior layered on top:
//!
//! ```text
//!   detach (keep desired) ──► launch queue ──► group describes tick ──► new member
//!   terminate             ──► deregister   ──► pending tasks pushed
//!   describe services     ──► pending drained by a fixed step
//! ```
//!
//! Every mutation and every service describe is appended to an event log
//! so tests can assert ordering.

pub mod fleet;
pub mod snapshot;

use std::time::Duration;

use nodepool_core::{ReplacementTiming, RetryPolicy, Settings};

pub use fleet::{SimEvent, SimulatedFleet};
pub use snapshot::{FleetSnapshot, GroupSnapshot, InstanceSnapshot, ServiceSnapshot, SimBehavior};

/// Default settings with every wait shortened to milliseconds.
pub fn fast_settings() -> Settings {
    Settings {
        replacement: ReplacementTiming {
            member_poll_interval: Duration::from_millis(10),
            member_timeout: Duration::from_millis(500),
            drain_warmup: Duration::from_millis(20),
            drain_poll_interval: Duration::from_millis(10),
            drain_timeout: Duration::from_millis(500),
        },
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        },
        ..Settings::default()
    }
}
