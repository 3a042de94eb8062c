//! `nodepool replace-instances`: roll every node of the scaling group.

use std::sync::Arc;

use anyhow::Result;

use nodepool_core::{ClusterRef, FleetContext};
use nodepool_rollout::{ProgressEvent, ReplacementOrchestrator, ReplacementPhase};

pub async fn replace_instances(ctx: FleetContext, cluster: &str, json: bool) -> Result<()> {
    let cluster = ClusterRef::new(cluster);

    let mut orchestrator = ReplacementOrchestrator::new(ctx);
    if !json {
        orchestrator = orchestrator.with_progress(Arc::new(|event: &ProgressEvent| {
            if let Some(line) = render_event(event) {
                println!("{line}");
            }
        }));
    }

    let report = orchestrator.run(&cluster).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Replaced {} nodes of {}; cluster {} now has {} nodes.",
            report.retired.len(),
            report.group,
            report.cluster,
            report.final_node_count
        );
    }
    Ok(())
}

fn render_event(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::PhaseChanged(ReplacementPhase::Start) => None,
        ProgressEvent::PhaseChanged(ReplacementPhase::Detaching) => {
            Some("Detaching nodes from the scaling group, keeping desired capacity...".to_string())
        }
        ProgressEvent::PhaseChanged(ReplacementPhase::AwaitingReplacements) => {
            Some("Waiting for replacement nodes to join the scaling group...".to_string())
        }
        ProgressEvent::PhaseChanged(ReplacementPhase::Terminating {
            index,
            total,
            instance_id,
        }) => Some(format!("Terminating {instance_id} ({index}/{total})...")),
        ProgressEvent::PhaseChanged(ReplacementPhase::Draining { .. }) => {
            Some("Waiting for displaced tasks to be placed...".to_string())
        }
        ProgressEvent::PhaseChanged(ReplacementPhase::Done) => None,
        ProgressEvent::MembersObserved { members, expected } => {
            Some(format!("  scaling group has {members} of {expected} nodes"))
        }
        ProgressEvent::PendingObserved { pending } => Some(format!("  {pending} tasks pending")),
        ProgressEvent::Terminated { instance_id, already: true } => {
            Some(format!("  {instance_id} was already terminating"))
        }
        ProgressEvent::Terminated { .. } => None,
    }
}
