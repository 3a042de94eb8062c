//! `nodepool addresses`: private addresses of a cluster's nodes.

use anyhow::Result;

use nodepool_cluster::ClusterInspector;
use nodepool_core::{ClusterRef, FleetContext};

pub async fn addresses(ctx: FleetContext, cluster: &str) -> Result<()> {
    let inspector = ClusterInspector::new(ctx);
    let addresses = inspector
        .cluster_private_addresses(&ClusterRef::new(cluster))
        .await?;

    for address in addresses {
        println!("{address}");
    }
    Ok(())
}
