//! `nodepool right-size`: fit the scaling group to the cluster's services.

use anyhow::Result;

use nodepool_autoscale::{RightSizePlan, RightSizer, ScaleDecision};
use nodepool_core::{ClusterRef, FleetContext};

pub async fn right_size(
    ctx: FleetContext,
    cluster: &str,
    at_least_service_desired_count: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let sizer = RightSizer::new(ctx);
    let cluster = ClusterRef::new(cluster);

    let plan = if dry_run {
        sizer.plan(&cluster, at_least_service_desired_count).await?
    } else {
        sizer.right_size(&cluster, at_least_service_desired_count).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        for line in render_plan(&plan, dry_run) {
            println!("{line}");
        }
    }
    Ok(())
}

fn render_plan(plan: &RightSizePlan, dry_run: bool) -> Vec<String> {
    let mut lines = vec![
        format!("Scaling group found: {}", plan.group),
        format!(
            "Scaling group uses instance type: {} ({} MiB memory, {} cpu units per node)",
            plan.instance_type, plan.capacity.memory, plan.capacity.cpu
        ),
        format!(
            "Memory needed for all services with desired count > 0: {}, CPU needed: {}",
            plan.needs.memory, plan.needs.cpu
        ),
        format!("Scaling group should have {} nodes to fit all tasks", plan.computed),
    ];

    if plan.floor_enforced && plan.largest_desired > plan.computed {
        lines.push(format!(
            "Raised to {} nodes to match the largest service desired count",
            plan.largest_desired
        ));
    }

    lines.push(format!("Scaling group currently set to: {}", plan.current));

    match plan.decision {
        ScaleDecision::ScaleUp { from, to } => {
            lines.push(format!("Scaling group needs to be scaled up by {} nodes", to - from));
        }
        ScaleDecision::ScaleDown { from, to } => {
            lines.push(format!("Scaling group can be scaled down by {} nodes", from - to));
        }
        ScaleDecision::NoChange { .. } => {
            lines.push("Scaling group is already right-sized.".to_string());
        }
    }

    if let Some(applied) = plan.applied {
        lines.push(format!("Scaling group set to: {applied}"));
    } else if dry_run && plan.decision.is_change() {
        lines.push("Dry run: scaling group left unchanged.".to_string());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepool_core::{GroupCounts, InstanceCapacity};

    fn plan(decision: ScaleDecision, applied: Option<GroupCounts>) -> RightSizePlan {
        RightSizePlan {
            cluster: "prod".into(),
            group: "prod-nodes".into(),
            instance_type: "m5.large".into(),
            capacity: InstanceCapacity { memory: 8192, cpu: 2048 },
            needs: Default::default(),
            computed: 2,
            largest_desired: 5,
            floor_enforced: true,
            current: GroupCounts { desired: 2, min: 2, max: 4 },
            decision,
            applied,
        }
    }

    #[test]
    fn applied_scale_up_reports_new_counts() {
        let lines = render_plan(
            &plan(
                ScaleDecision::ScaleUp { from: 2, to: 5 },
                Some(GroupCounts { desired: 5, min: 5, max: 5 }),
            ),
            false,
        );
        assert!(lines.contains(&"Raised to 5 nodes to match the largest service desired count".to_string()));
        assert!(lines.contains(&"Scaling group needs to be scaled up by 3 nodes".to_string()));
        assert_eq!(lines.last().unwrap(), "Scaling group set to: desired = 5, min = 5, max = 5");
    }

    #[test]
    fn dry_run_says_nothing_changed() {
        let lines = render_plan(&plan(ScaleDecision::ScaleDown { from: 2, to: 1 }, None), true);
        assert!(lines.contains(&"Scaling group can be scaled down by 1 nodes".to_string()));
        assert_eq!(lines.last().unwrap(), "Dry run: scaling group left unchanged.");
    }
}
