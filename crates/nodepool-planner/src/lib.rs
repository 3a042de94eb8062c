//! nodepool-planner: how many nodes does the workload need?
//!
//! Pure computation over the services' per-task profiles and one node's
//! capacity. No I/O; callers fetch profiles through the cluster inspector.
//!
//! # Algorithm
//!
//! ```text
//! for service with desired > 0:
//!     memory += per_task.memory * desired
//!     cpu    += per_task.cpu    * desired
//!     largest_memory = max(largest_memory, per_task.memory)
//!     largest_cpu    = max(largest_cpu,    per_task.cpu)
//!
//! memory += largest_memory   // room to start one extra copy of the
//! cpu    += largest_cpu      // biggest task during a rolling update
//!
//! nodes = max(ceil(memory / node.memory), ceil(cpu / node.cpu))
//! ```
//!
//! The largest memory and largest cpu are tracked independently and may
//! come from different services.

pub mod capacity;

pub use capacity::{PlanError, ResourceNeeds, compute_needed, largest_desired_count, nodes_needed};
