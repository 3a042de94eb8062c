//! nodepool-cluster: read the cluster, steer its scaling group.
//!
//! # Architecture
//!
//! ```text
//! ClusterInspector (read-only)
//!   ├── list_nodes()            → ContainerApi::describe_cluster_nodes
//!   ├── list_services()         → list_cluster_services (every page) + describe_services
//!   ├── service_demands()       → describe_task_resource_profile per active service
//!   ├── node_private_addresses()→ ComputeApi::describe_private_addresses
//!   └── pending_task_count()    → sum of pending_count over all services
//!
//! ScalingGroupController
//!   ├── group_name_for_nodes()  → group tag of the first node's instance
//!   ├── describe() / current_counts() / member_instance_ids()
//!   ├── set_counts()            → desired = min = n, max raised if needed
//!   ├── detach_without_shrinking()
//!   └── wait_for_member_count() → bounded poll of the member list
//! ```
//!
//! Every collaborator call goes through `FleetContext::call`, so
//! transient failures are retried and shutdown is honoured.

pub mod group;
pub mod inspector;

pub use group::ScalingGroupController;
pub use inspector::ClusterInspector;
