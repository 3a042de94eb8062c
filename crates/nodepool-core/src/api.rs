//! Collaborator traits: the semantic contracts of the cloud services.
//!
//! The core never sees how these calls are transported. A binding maps
//! its transport errors onto `ApiError`; throttling and unavailability
//! must be reported as such so the context can retry them.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::*;

/// The container orchestration service.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// Nodes registered to the cluster.
    async fn describe_cluster_nodes(&self, cluster: &ClusterRef) -> ApiResult<Vec<Node>>;

    /// One page of service ARNs. Pass the previous page's token to continue.
    async fn list_cluster_services(
        &self,
        cluster: &ClusterRef,
        next_token: Option<&str>,
    ) -> ApiResult<ServicePage>;

    async fn describe_services(
        &self,
        cluster: &ClusterRef,
        service_arns: &[String],
    ) -> ApiResult<Vec<Service>>;

    /// Per-container reservations of a task definition.
    async fn describe_task_resource_profile(
        &self,
        task_definition: &str,
    ) -> ApiResult<Vec<ContainerResources>>;
}

/// The compute service backing the nodes.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_node_tags(&self, instance_id: &str) -> ApiResult<Vec<Tag>>;

    async fn describe_private_addresses(&self, instance_ids: &[InstanceId])
        -> ApiResult<Vec<String>>;

    /// `None` when the instance is unknown.
    async fn describe_instance_state(&self, instance_id: &str)
        -> ApiResult<Option<InstanceState>>;

    async fn terminate_instance(&self, instance_id: &str) -> ApiResult<()>;
}

/// The scaling group service.
#[async_trait]
pub trait ScalingApi: Send + Sync {
    /// Every group matching `name`. Callers expect exactly one.
    async fn describe_scaling_group(&self, name: &str) -> ApiResult<Vec<ScalingGroup>>;

    async fn set_scaling_group_counts(&self, name: &str, counts: GroupCounts) -> ApiResult<()>;

    /// With `shrink_desired == false` the group launches replacements.
    async fn detach_scaling_group_members(
        &self,
        name: &str,
        instance_ids: &[InstanceId],
        shrink_desired: bool,
    ) -> ApiResult<()>;
}
