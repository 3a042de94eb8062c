//! Cluster inspector: read-only view of a cluster's nodes and services.

use tracing::debug;

use nodepool_core::{
    ClusterRef, FleetContext, FleetResult, InstanceId, Node, ResourceProfile, Service,
    ServiceDemand,
};

/// Reads nodes, services and resource profiles of a cluster.
///
/// Holds no state between calls; every method re-reads live data.
#[derive(Clone)]
pub struct ClusterInspector {
    ctx: FleetContext,
}

impl ClusterInspector {
    pub fn new(ctx: FleetContext) -> Self {
        Self { ctx }
    }

    /// Nodes currently registered to the cluster.
    pub async fn list_nodes(&self, cluster: &ClusterRef) -> FleetResult<Vec<Node>> {
        let nodes = self
            .ctx
            .call("describe_cluster_nodes", || {
                self.ctx.container().describe_cluster_nodes(cluster)
            })
            .await?;
        debug!(%cluster, nodes = nodes.len(), "listed cluster nodes");
        Ok(nodes)
    }

    /// Every service of the cluster.
    ///
    /// Follows continuation tokens until the listing is exhausted; callers
    /// never see a partial result.
    pub async fn list_services(&self, cluster: &ClusterRef) -> FleetResult<Vec<Service>> {
        let mut services = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let page = self
                .ctx
                .call("list_cluster_services", || {
                    self.ctx
                        .container()
                        .list_cluster_services(cluster, token.as_deref())
                })
                .await?;
            pages += 1;

            if !page.arns.is_empty() {
                let described = self
                    .ctx
                    .call("describe_services", || {
                        self.ctx.container().describe_services(cluster, &page.arns)
                    })
                    .await?;
                services.extend(described);
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(%cluster, pages, services = services.len(), "listed cluster services");
        Ok(services)
    }

    /// Per-task resource profiles of the active services.
    ///
    /// Services with a desired count of zero are skipped without a lookup.
    pub async fn service_demands(&self, services: &[Service]) -> FleetResult<Vec<ServiceDemand>> {
        let mut demands = Vec::new();

        for service in services.iter().filter(|s| s.desired_count > 0) {
            let containers = self
                .ctx
                .call("describe_task_resource_profile", || {
                    self.ctx
                        .container()
                        .describe_task_resource_profile(&service.task_definition)
                })
                .await?;

            demands.push(ServiceDemand {
                name: service.name.clone(),
                desired_count: service.desired_count,
                profile: ResourceProfile::from_containers(&containers),
            });
        }

        Ok(demands)
    }

    /// Private addresses of the given instances.
    pub async fn node_private_addresses(&self, instance_ids: &[InstanceId]) -> FleetResult<Vec<String>> {
        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.ctx
            .call("describe_private_addresses", || {
                self.ctx.compute().describe_private_addresses(instance_ids)
            })
            .await
    }

    /// Private addresses of every node registered to the cluster.
    pub async fn cluster_private_addresses(&self, cluster: &ClusterRef) -> FleetResult<Vec<String>> {
        let ids: Vec<InstanceId> = self
            .list_nodes(cluster)
            .await?
            .into_iter()
            .map(|n| n.instance_id)
            .collect();
        self.node_private_addresses(&ids).await
    }

    /// Pending tasks summed over every service, idle ones included.
    pub async fn pending_task_count(&self, cluster: &ClusterRef) -> FleetResult<u64> {
        let services = self.list_services(cluster).await?;
        Ok(services.iter().map(|s| u64::from(s.pending_count)).sum())
    }
}
