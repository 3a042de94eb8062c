//! nodepool-core: shared vocabulary for the nodepool crates.
//!
//! Holds the domain types (clusters, nodes, services, scaling groups),
//! the error taxonomy, `nodepool.toml` parsing, the instance-type
//! catalog, the collaborator traits the cloud bindings implement, and
//! the `FleetContext` every component receives.

pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use api::{ComputeApi, ContainerApi, ScalingApi};
pub use catalog::InstanceCatalog;
pub use config::{FleetConfig, ReplacementTiming, RetryPolicy, Settings};
pub use context::FleetContext;
pub use error::{ApiError, ApiResult, ErrorKind, FleetError, FleetResult};
pub use types::*;
