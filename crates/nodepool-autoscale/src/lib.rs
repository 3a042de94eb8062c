//! nodepool-autoscale: one-shot right-sizing of a cluster's scaling group.
//!
//! Computes how many nodes the cluster's active services need and moves
//! the group's desired and minimum size there.
//!
//! # Sizing
//!
//! ```text
//! target = nodes_needed(instance capacity, compute_needed(active services))
//!
//! with floor enforcement:
//!     target = max(target, largest desired count of any service)
//!
//! group.min < target  → ScaleUp   (desired = min = target, max raised if needed)
//! group.min > target  → ScaleDown (desired = min = target, max untouched)
//! otherwise           → NoChange
//! ```
//!
//! The group's minimum, not its desired count, is the comparison point:
//! this tool keeps `min == desired` as the steady state.

pub mod sizer;

pub use sizer::{RightSizePlan, RightSizer, ScaleDecision, apply_floor, decide};
