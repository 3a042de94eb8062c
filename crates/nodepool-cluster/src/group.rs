//! Scaling group controller: resolve, read and resize the node pool.
//!
//! The group owns node membership. Detaching without shrinking is how
//! fresh nodes are requested: the group sees fewer members than desired
//! and launches replacements.

use tracing::{debug, info};

use nodepool_core::{
    ClusterRef, FleetContext, FleetError, FleetResult, GroupCounts, InstanceId, Node,
    ScalingGroup,
};

pub struct ScalingGroupController {
    ctx: FleetContext,
}

impl ScalingGroupController {
    pub fn new(ctx: FleetContext) -> Self {
        Self { ctx }
    }

    /// Resolve the group from the group tag of the first node's instance.
    pub async fn group_name_for_nodes(&self, cluster: &ClusterRef, nodes: &[Node]) -> FleetResult<String> {
        let node = nodes
            .first()
            .ok_or_else(|| FleetError::EmptyCluster(cluster.to_string()))?;

        let tags = self
            .ctx
            .call("describe_node_tags", || {
                self.ctx.compute().describe_node_tags(&node.instance_id)
            })
            .await?;

        let tag_key = &self.ctx.settings().group_tag;
        let name = tags
            .into_iter()
            .find(|t| &t.key == tag_key)
            .map(|t| t.value)
            .ok_or_else(|| FleetError::MissingTag {
                instance_id: node.instance_id.clone(),
                tag: tag_key.clone(),
            })?;

        debug!(%cluster, group = %name, via = %node.instance_id, "resolved scaling group");
        Ok(name)
    }

    /// The group named `group`. Anything other than exactly one match fails.
    pub async fn describe(&self, group: &str) -> FleetResult<ScalingGroup> {
        let mut groups = self
            .ctx
            .call("describe_scaling_group", || {
                self.ctx.scaling().describe_scaling_group(group)
            })
            .await?;

        match groups.len() {
            0 => Err(FleetError::NotFound {
                kind: "scaling group",
                name: group.to_string(),
            }),
            1 => Ok(groups.remove(0)),
            n => Err(FleetError::Invariant(format!(
                "expected exactly one scaling group named {group}, found {n}"
            ))),
        }
    }

    pub async fn current_counts(&self, group: &str) -> FleetResult<GroupCounts> {
        Ok(self.describe(group).await?.counts)
    }

    pub async fn member_instance_ids(&self, group: &str) -> FleetResult<Vec<InstanceId>> {
        Ok(self.describe(group).await?.members)
    }

    /// Set desired and min to `n`; max is raised to `n` when below it.
    ///
    /// Returns the counts that were applied.
    pub async fn set_counts(&self, group: &str, n: u32) -> FleetResult<GroupCounts> {
        let current = self.current_counts(group).await?;
        let counts = current.pinned_to(n);

        self.ctx
            .call("set_scaling_group_counts", || {
                self.ctx.scaling().set_scaling_group_counts(group, counts)
            })
            .await?;

        info!(%group, from = %current, to = %counts, "scaling group resized");
        Ok(counts)
    }

    /// Detach members while holding desired capacity, so the group
    /// launches one replacement per detached member.
    pub async fn detach_without_shrinking(&self, group: &str, instance_ids: &[InstanceId]) -> FleetResult<()> {
        self.ctx
            .call("detach_scaling_group_members", || {
                self.ctx
                    .scaling()
                    .detach_scaling_group_members(group, instance_ids, false)
            })
            .await?;

        info!(%group, detached = instance_ids.len(), "detached members without shrinking");
        Ok(())
    }

    /// Poll the member list until it holds `expected` members.
    ///
    /// `observe` sees every count read. Bounded by the configured member
    /// timeout.
    pub async fn wait_for_member_count<F>(&self, group: &str, expected: usize, observe: F) -> FleetResult<usize>
    where
        F: Fn(usize),
    {
        let timing = self.ctx.settings().replacement;
        let observe = &observe;

        self.ctx
            .poll_until(
                "scaling group replacements",
                timing.member_poll_interval,
                timing.member_timeout,
                || async move {
                    let members = self.member_instance_ids(group).await?.len();
                    observe(members);
                    debug!(%group, members, expected, "polled scaling group members");
                    Ok((members == expected).then_some(members))
                },
            )
            .await
    }
}
