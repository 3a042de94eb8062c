//! Right-sizing integration tests against the simulated fleet.

use std::sync::Arc;

use nodepool_autoscale::{RightSizer, ScaleDecision};
use nodepool_core::{ClusterRef, ContainerResources, ErrorKind, FleetError, GroupCounts, InstanceCapacity, Settings};
use nodepool_sim::{FleetSnapshot, SimEvent, SimulatedFleet, fast_settings};

fn prod() -> ClusterRef {
    ClusterRef::new("prod")
}

fn res(memory: u64, cpu: u64) -> ContainerResources {
    ContainerResources { memory, cpu }
}

fn sizer_with(snapshot: FleetSnapshot, settings: Settings) -> (Arc<SimulatedFleet>, RightSizer) {
    let fleet = Arc::new(SimulatedFleet::from_snapshot(snapshot));
    let sizer = RightSizer::new(fleet.context(settings));
    (fleet, sizer)
}

fn sizer(snapshot: FleetSnapshot) -> (Arc<SimulatedFleet>, RightSizer) {
    sizer_with(snapshot, fast_settings())
}

fn counts_set(fleet: &SimulatedFleet) -> Vec<GroupCounts> {
    fleet
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SimEvent::CountsSet { counts } => Some(counts),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn scales_up_to_fit_mixed_services() {
    let mut settings = fast_settings();
    settings
        .catalog
        .insert("sim.narrow", InstanceCapacity { memory: 4000, cpu: 400 });
    let (fleet, sizer) = sizer_with(
        FleetSnapshot::new("prod", "prod-nodes", "sim.narrow")
            .with_instances(1)
            .with_service("a", 2, &[res(600, 60), res(400, 40)])
            .with_service("b", 1, &[res(3000, 50)]),
        settings,
    );

    let plan = sizer.right_size(&prod(), false).await.unwrap();

    assert_eq!(plan.needs.memory, 8000);
    assert_eq!(plan.needs.cpu, 350);
    assert_eq!(plan.computed, 2);
    assert_eq!(plan.decision, ScaleDecision::ScaleUp { from: 1, to: 2 });
    assert_eq!(plan.applied, Some(GroupCounts { desired: 2, min: 2, max: 2 }));
    assert_eq!(fleet.group_counts(), GroupCounts { desired: 2, min: 2, max: 2 });
}

#[tokio::test]
async fn second_run_with_same_workload_is_a_no_op() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(1)
            .with_service("api", 10, &[res(1024, 256)]),
    );

    let first = sizer.right_size(&prod(), false).await.unwrap();
    assert_eq!(first.decision, ScaleDecision::ScaleUp { from: 1, to: 2 });

    let second = sizer.right_size(&prod(), false).await.unwrap();
    assert_eq!(second.decision, ScaleDecision::NoChange { size: 2 });
    assert_eq!(second.applied, None);
    assert_eq!(counts_set(&fleet).len(), 1);
}

#[tokio::test]
async fn scale_down_keeps_max() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(4)
            .with_service("api", 1, &[res(512, 256)]),
    );

    let plan = sizer.right_size(&prod(), false).await.unwrap();

    assert_eq!(plan.decision, ScaleDecision::ScaleDown { from: 4, to: 1 });
    assert_eq!(fleet.group_counts(), GroupCounts { desired: 1, min: 1, max: 4 });
}

#[tokio::test]
async fn floor_raises_target_to_largest_desired_count() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(2)
            .with_service("web", 5, &[res(64, 32)])
            .with_service("cron", 1, &[res(128, 64)]),
    );

    let floored = sizer.plan(&prod(), true).await.unwrap();
    assert_eq!(floored.computed, 1);
    assert_eq!(floored.largest_desired, 5);
    assert_eq!(floored.decision, ScaleDecision::ScaleUp { from: 2, to: 5 });

    let unfloored = sizer.plan(&prod(), false).await.unwrap();
    assert_eq!(unfloored.decision, ScaleDecision::ScaleDown { from: 2, to: 1 });

    assert!(counts_set(&fleet).is_empty());
}

#[tokio::test]
async fn compares_against_min_not_desired() {
    let (_fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(3)
            .with_counts(GroupCounts { desired: 3, min: 1, max: 3 })
            .with_service("api", 1, &[res(512, 256)]),
    );

    let plan = sizer.plan(&prod(), false).await.unwrap();
    assert_eq!(plan.decision, ScaleDecision::NoChange { size: 1 });
}

#[tokio::test]
async fn idle_cluster_plans_zero_nodes() {
    let (_fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(2)
            .with_service("batch", 0, &[res(4096, 1024)]),
    );

    let plan = sizer.plan(&prod(), true).await.unwrap();
    assert_eq!(plan.computed, 0);
    assert_eq!(plan.decision, ScaleDecision::ScaleDown { from: 2, to: 0 });
}

#[tokio::test]
async fn unknown_instance_type_is_fatal() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "x9.mega")
            .with_instances(1)
            .with_service("api", 3, &[res(512, 256)]),
    );

    let err = sizer.right_size(&prod(), false).await.unwrap_err();
    assert!(matches!(err, FleetError::UnknownInstanceType(ref t) if t == "x9.mega"));
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(counts_set(&fleet).is_empty());
}

#[tokio::test]
async fn missing_group_tag_is_fatal() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(2)
            .with_service("api", 3, &[res(512, 256)]),
    );
    fleet.clear_tags("i-0001");

    let err = sizer.right_size(&prod(), false).await.unwrap_err();
    assert!(matches!(err, FleetError::MissingTag { .. }));
    assert!(counts_set(&fleet).is_empty());
}

#[tokio::test]
async fn zero_capacity_instance_type_is_an_invariant_violation() {
    let mut settings = fast_settings();
    settings
        .catalog
        .insert("sim.broken", InstanceCapacity { memory: 0, cpu: 1024 });
    let (_fleet, sizer) = sizer_with(
        FleetSnapshot::new("prod", "prod-nodes", "sim.broken")
            .with_instances(1)
            .with_service("api", 1, &[res(512, 256)]),
        settings,
    );

    let err = sizer.plan(&prod(), false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);
}

#[tokio::test]
async fn workload_change_is_picked_up_on_next_run() {
    let (fleet, sizer) = sizer(
        FleetSnapshot::new("prod", "prod-nodes", "m5.large")
            .with_instances(1)
            .with_service("api", 2, &[res(1024, 128)]),
    );

    let plan = sizer.right_size(&prod(), false).await.unwrap();
    assert_eq!(plan.decision, ScaleDecision::NoChange { size: 1 });

    fleet.set_desired_count("api", 12);
    let plan = sizer.right_size(&prod(), false).await.unwrap();
    // 12 * 1024 + 1024 memory over 8192 per node.
    assert_eq!(plan.decision, ScaleDecision::ScaleUp { from: 1, to: 2 });
}
