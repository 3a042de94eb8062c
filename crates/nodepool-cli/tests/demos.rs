//! The shipped demo fleet and configuration load and run end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nodepool_autoscale::{RightSizer, ScaleDecision};
use nodepool_core::{ClusterRef, FleetConfig, InstanceCapacity};
use nodepool_rollout::ReplacementOrchestrator;
use nodepool_sim::SimulatedFleet;

fn demo(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(file)
}

fn demo_fleet() -> (Arc<SimulatedFleet>, nodepool_core::Settings) {
    let settings = FleetConfig::from_file(&demo("nodepool.toml"))
        .unwrap()
        .resolve()
        .unwrap();
    let fleet = Arc::new(SimulatedFleet::from_json_file(&demo("fleet.json")).unwrap());
    (fleet, settings)
}

#[test]
fn demo_config_overrides_catalog() {
    let (_fleet, settings) = demo_fleet();
    assert_eq!(
        settings.catalog.capacity("m5.large").unwrap(),
        InstanceCapacity { memory: 7680, cpu: 2048 }
    );
}

#[tokio::test(start_paused = true)]
async fn demo_fleet_is_sized_for_its_workload() {
    let (fleet, settings) = demo_fleet();
    let sizer = RightSizer::new(fleet.context(settings));

    let plan = sizer.plan(&ClusterRef::new("prod"), false).await.unwrap();
    assert_eq!(plan.needs.memory, 17920);
    assert_eq!(plan.needs.cpu, 5504);
    assert_eq!(plan.computed, 3);
    assert_eq!(plan.decision, ScaleDecision::NoChange { size: 3 });
}

#[tokio::test(start_paused = true)]
async fn demo_floor_lifts_to_largest_service() {
    let (fleet, settings) = demo_fleet();
    let sizer = RightSizer::new(fleet.context(settings));

    // api runs 6 tasks.
    let plan = sizer.plan(&ClusterRef::new("prod"), true).await.unwrap();
    assert_eq!(plan.computed, 3);
    assert_eq!(plan.largest_desired, 6);
    assert_eq!(plan.decision, ScaleDecision::ScaleUp { from: 3, to: 6 });
    assert_eq!(plan.applied, None);
}

#[tokio::test(start_paused = true)]
async fn demo_fleet_replaces_all_nodes() {
    let (fleet, settings) = demo_fleet();
    let mut orchestrator = ReplacementOrchestrator::new(fleet.context(settings));

    let report = orchestrator.run(&ClusterRef::new("prod")).await.unwrap();
    assert_eq!(report.retired, vec!["i-0001", "i-0002", "i-0003"]);
    assert_eq!(report.final_node_count, 3);
}
