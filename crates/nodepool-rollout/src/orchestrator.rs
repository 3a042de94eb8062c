//! Replacement orchestrator: drives the node replacement state machine.
//!
//! Retired nodes are handled strictly one at a time: a node's drain wait
//! finishes before the next node's terminate call is issued.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use nodepool_cluster::{ClusterInspector, ScalingGroupController};
use nodepool_core::{ClusterRef, FleetContext, FleetError, FleetResult, InstanceId};

/// Current phase of a replacement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplacementPhase {
    /// Resolving the group and the members to retire.
    Start,
    /// Detaching the members while holding desired capacity.
    Detaching,
    /// Waiting for the group to launch one replacement per detached member.
    AwaitingReplacements,
    /// Terminating retired node `index` of `total` (1-based).
    Terminating {
        index: usize,
        total: usize,
        instance_id: InstanceId,
    },
    /// Waiting for the tasks displaced by that node to be placed.
    Draining {
        index: usize,
        total: usize,
        instance_id: InstanceId,
    },
    /// Finished.
    Done,
}

impl fmt::Display for ReplacementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Detaching => f.write_str("detaching"),
            Self::AwaitingReplacements => f.write_str("awaiting replacements"),
            Self::Terminating {
                index,
                total,
                instance_id,
            } => write!(f, "terminating {instance_id} ({index}/{total})"),
            Self::Draining {
                index,
                total,
                instance_id,
            } => write!(f, "draining {instance_id} ({index}/{total})"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PhaseChanged(ReplacementPhase),
    /// Member count read while waiting for replacements.
    MembersObserved { members: usize, expected: usize },
    /// Aggregate pending task count read while draining.
    PendingObserved { pending: u64 },
    /// A retired instance is gone. `already` when it was terminating
    /// before we asked.
    Terminated { instance_id: InstanceId, already: bool },
}

/// Callback receiving every progress event.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Outcome of a completed replacement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementReport {
    pub cluster: String,
    pub group: String,
    /// Instances that were detached and terminated, in order.
    pub retired: Vec<InstanceId>,
    /// Group members once replacements arrived.
    pub replacements: Vec<InstanceId>,
    /// Nodes registered to the cluster at the end.
    pub final_node_count: usize,
    /// Every phase entered, in order.
    pub phases: Vec<ReplacementPhase>,
}

/// Replaces every node of a cluster's scaling group.
pub struct ReplacementOrchestrator {
    ctx: FleetContext,
    inspector: ClusterInspector,
    groups: ScalingGroupController,
    phase: ReplacementPhase,
    history: Vec<ReplacementPhase>,
    progress: Option<ProgressCallback>,
}

impl ReplacementOrchestrator {
    pub fn new(ctx: FleetContext) -> Self {
        Self {
            inspector: ClusterInspector::new(ctx.clone()),
            groups: ScalingGroupController::new(ctx.clone()),
            ctx,
            phase: ReplacementPhase::Start,
            history: Vec::new(),
            progress: None,
        }
    }

    /// Set the callback that receives progress events.
    pub fn with_progress(mut self, f: ProgressCallback) -> Self {
        self.progress = Some(f);
        self
    }

    /// Phase the last run reached. After a failure this is where it stopped.
    pub fn phase(&self) -> &ReplacementPhase {
        &self.phase
    }

    /// Replace every member of the cluster's scaling group.
    pub async fn run(&mut self, cluster: &ClusterRef) -> FleetResult<ReplacementReport> {
        self.history.clear();
        self.enter(ReplacementPhase::Start);

        let nodes = self.inspector.list_nodes(cluster).await?;
        let group = self.groups.group_name_for_nodes(cluster, &nodes).await?;
        let to_retire = self.groups.member_instance_ids(&group).await?;

        info!(%cluster, %group, members = to_retire.len(), "starting node replacement");

        if to_retire.is_empty() {
            info!(%cluster, %group, "scaling group has no members, nothing to replace");
            return Ok(self.finish(cluster, group, to_retire, Vec::new(), nodes.len()));
        }

        self.enter(ReplacementPhase::Detaching);
        self.groups.detach_without_shrinking(&group, &to_retire).await?;

        self.enter(ReplacementPhase::AwaitingReplacements);
        let expected = to_retire.len();
        self.groups
            .wait_for_member_count(&group, expected, |members| {
                self.emit(ProgressEvent::MembersObserved { members, expected });
            })
            .await?;
        let replacements = self.groups.member_instance_ids(&group).await?;
        info!(%group, replacements = replacements.len(), "replacements joined the group");

        let total = to_retire.len();
        for (i, instance_id) in to_retire.iter().enumerate() {
            let index = i + 1;

            self.enter(ReplacementPhase::Terminating {
                index,
                total,
                instance_id: instance_id.clone(),
            });
            self.terminate(instance_id).await?;

            self.enter(ReplacementPhase::Draining {
                index,
                total,
                instance_id: instance_id.clone(),
            });
            self.drain(cluster).await?;
        }

        let final_node_count = self.inspector.list_nodes(cluster).await?.len();
        Ok(self.finish(cluster, group, to_retire, replacements, final_node_count))
    }

    /// Terminate one instance. Already terminating is success; unknown is not.
    async fn terminate(&self, instance_id: &str) -> FleetResult<()> {
        let state = self
            .ctx
            .call("describe_instance_state", || {
                self.ctx.compute().describe_instance_state(instance_id)
            })
            .await?;

        let already = match state {
            None => {
                return Err(FleetError::NotFound {
                    kind: "instance",
                    name: instance_id.to_string(),
                });
            }
            Some(state) if state.is_terminating() => {
                info!(%instance_id, ?state, "instance already terminating");
                true
            }
            Some(_) => {
                self.ctx
                    .call("terminate_instance", || {
                        self.ctx.compute().terminate_instance(instance_id)
                    })
                    .await?;
                info!(%instance_id, "terminated instance");
                false
            }
        };

        self.emit(ProgressEvent::Terminated {
            instance_id: instance_id.to_string(),
            already,
        });
        Ok(())
    }

    /// Give the orchestrator time to notice the lost node, then wait until
    /// no task anywhere in the cluster is pending.
    async fn drain(&self, cluster: &ClusterRef) -> FleetResult<()> {
        let timing = self.ctx.settings().replacement;
        self.ctx.sleep(timing.drain_warmup, "drain warm-up").await?;

        self.ctx
            .poll_until(
                "pending tasks to drain",
                timing.drain_poll_interval,
                timing.drain_timeout,
                || async move {
                    let pending = self.inspector.pending_task_count(cluster).await?;
                    self.emit(ProgressEvent::PendingObserved { pending });
                    debug!(%cluster, pending, "polled pending tasks");
                    Ok((pending == 0).then_some(()))
                },
            )
            .await
    }

    fn finish(
        &mut self,
        cluster: &ClusterRef,
        group: String,
        retired: Vec<InstanceId>,
        replacements: Vec<InstanceId>,
        final_node_count: usize,
    ) -> ReplacementReport {
        self.enter(ReplacementPhase::Done);
        info!(%cluster, %group, retired = retired.len(), final_node_count, "node replacement finished");

        ReplacementReport {
            cluster: cluster.to_string(),
            group,
            retired,
            replacements,
            final_node_count,
            phases: self.history.clone(),
        }
    }

    fn enter(&mut self, phase: ReplacementPhase) {
        debug!(%phase, "entering phase");
        self.phase = phase.clone();
        self.history.push(phase.clone());
        self.emit(ProgressEvent::PhaseChanged(phase));
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(f) = &self.progress {
            f(&event);
        }
    }
}
