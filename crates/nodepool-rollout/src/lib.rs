//! nodepool-rollout: rolling replacement of a cluster's nodes.
//!
//! Every member of the cluster's scaling group is swapped for a fresh
//! instance without losing capacity:
//!
//! ```text
//!   Start ──► Detaching ──► AwaitingReplacements ──┐
//!                                                  ▼
//!        ┌──────────── for each retired node ──────────────┐
//!        │  Terminating ──► Draining (pending tasks == 0)  │
//!        └─────────────────────────────────────────────────┘
//!                                                  ▼
//!                                                 Done
//! ```
//!
//! Phases only move forward. A failure aborts the run; running again
//! starts from `Start` and re-derives everything from live state.

pub mod orchestrator;

pub use orchestrator::{
    ProgressCallback, ProgressEvent, ReplacementOrchestrator, ReplacementPhase, ReplacementReport,
};
