//! Right-sizer: plan and apply a scaling group's size.

use serde::Serialize;
use tracing::{debug, info};

use nodepool_cluster::{ClusterInspector, ScalingGroupController};
use nodepool_core::{ClusterRef, FleetContext, FleetResult, GroupCounts, InstanceCapacity};
use nodepool_planner::{ResourceNeeds, compute_needed, largest_desired_count, nodes_needed};

/// What the group's size should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScaleDecision {
    ScaleUp { from: u32, to: u32 },
    ScaleDown { from: u32, to: u32 },
    /// Already at `size`.
    NoChange { size: u32 },
}

impl ScaleDecision {
    /// Size the group should end up at.
    pub fn target(&self) -> u32 {
        match *self {
            Self::ScaleUp { to, .. } | Self::ScaleDown { to, .. } => to,
            Self::NoChange { size } => size,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange { .. })
    }
}

/// Compare the group's current minimum with the target.
pub fn decide(current_min: u32, target: u32) -> ScaleDecision {
    match current_min.cmp(&target) {
        std::cmp::Ordering::Less => ScaleDecision::ScaleUp {
            from: current_min,
            to: target,
        },
        std::cmp::Ordering::Greater => ScaleDecision::ScaleDown {
            from: current_min,
            to: target,
        },
        std::cmp::Ordering::Equal => ScaleDecision::NoChange { size: target },
    }
}

/// Raise `computed` to the largest service desired count when enforced.
pub fn apply_floor(computed: u32, largest_desired: u32, enforce: bool) -> u32 {
    if enforce { computed.max(largest_desired) } else { computed }
}

/// Everything one right-sizing pass looked at and decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RightSizePlan {
    pub cluster: String,
    pub group: String,
    pub instance_type: String,
    pub capacity: InstanceCapacity,
    pub needs: ResourceNeeds,
    /// Nodes the workload needs, before the floor.
    pub computed: u32,
    pub largest_desired: u32,
    pub floor_enforced: bool,
    pub current: GroupCounts,
    pub decision: ScaleDecision,
    /// Counts written to the group; `None` for a dry run or no change.
    pub applied: Option<GroupCounts>,
}

/// Converges a cluster's scaling group to the size its services need.
pub struct RightSizer {
    ctx: FleetContext,
    inspector: ClusterInspector,
    groups: ScalingGroupController,
}

impl RightSizer {
    pub fn new(ctx: FleetContext) -> Self {
        Self {
            inspector: ClusterInspector::new(ctx.clone()),
            groups: ScalingGroupController::new(ctx.clone()),
            ctx,
        }
    }

    /// Compute the decision without touching the group.
    pub async fn plan(&self, cluster: &ClusterRef, enforce_floor: bool) -> FleetResult<RightSizePlan> {
        let nodes = self.inspector.list_nodes(cluster).await?;
        let group_name = self.groups.group_name_for_nodes(cluster, &nodes).await?;
        let group = self.groups.describe(&group_name).await?;
        let capacity = self.ctx.settings().catalog.capacity(&group.instance_type)?;
        info!(%cluster, group = %group_name, instance_type = %group.instance_type, "resolved scaling group");

        let services = self.inspector.list_services(cluster).await?;
        let demands = self.inspector.service_demands(&services).await?;
        let needs = compute_needed(&demands);
        let computed = nodes_needed(&capacity, &needs)?;
        debug!(
            memory = needs.memory,
            cpu = needs.cpu,
            active_services = demands.len(),
            computed,
            "computed capacity needs"
        );

        let largest_desired = largest_desired_count(&services);
        let target = apply_floor(computed, largest_desired, enforce_floor);
        let decision = decide(group.counts.min, target);
        info!(%cluster, current = %group.counts, target, ?decision, "planned right-size");

        Ok(RightSizePlan {
            cluster: cluster.to_string(),
            group: group_name,
            instance_type: group.instance_type,
            capacity,
            needs,
            computed,
            largest_desired,
            floor_enforced: enforce_floor,
            current: group.counts,
            decision,
            applied: None,
        })
    }

    /// Plan, then resize the group when the decision is a change.
    pub async fn right_size(&self, cluster: &ClusterRef, enforce_floor: bool) -> FleetResult<RightSizePlan> {
        let mut plan = self.plan(cluster, enforce_floor).await?;

        if plan.decision.is_change() {
            let applied = self.groups.set_counts(&plan.group, plan.decision.target()).await?;
            plan.applied = Some(applied);
        } else {
            info!(%cluster, group = %plan.group, "scaling group already right-sized");
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_compares_against_min() {
        assert_eq!(decide(2, 5), ScaleDecision::ScaleUp { from: 2, to: 5 });
        assert_eq!(decide(5, 2), ScaleDecision::ScaleDown { from: 5, to: 2 });
        assert_eq!(decide(3, 3), ScaleDecision::NoChange { size: 3 });
        assert!(!decide(3, 3).is_change());
        assert_eq!(decide(4, 0).target(), 0);
    }

    #[test]
    fn floor_only_raises_when_enforced() {
        assert_eq!(apply_floor(2, 6, true), 6);
        assert_eq!(apply_floor(2, 6, false), 2);
        assert_eq!(apply_floor(7, 6, true), 7);
    }

    #[test]
    fn decision_serializes_with_action_tag() {
        let json = serde_json::to_value(ScaleDecision::ScaleUp { from: 1, to: 3 }).unwrap();
        assert_eq!(json["action"], "scale_up");
        assert_eq!(json["to"], 3);
    }
}
