//! The simulated fleet: collaborator traits over mutex-guarded state.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use nodepool_core::{
    ApiError, ApiResult, ClusterRef, ComputeApi, ContainerApi, ContainerResources, FleetContext,
    GroupCounts, InstanceId, InstanceState, Node, NodeStatus, ScalingApi, ScalingGroup, Service,
    ServicePage, Settings, Tag,
};

use crate::snapshot::{FleetSnapshot, ServiceSnapshot, SimBehavior, address_for, instance_id_for};

/// Something that happened to the fleet, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Detached {
        instance_ids: Vec<InstanceId>,
        shrink_desired: bool,
    },
    Launched {
        instance_id: InstanceId,
    },
    CountsSet {
        counts: GroupCounts,
    },
    Terminated {
        instance_id: InstanceId,
    },
    /// A describe of the services, with the pending total it reported.
    ServicesDescribed {
        pending: u32,
    },
}

struct SimInstance {
    id: InstanceId,
    address: String,
    state: InstanceState,
    registered: bool,
    tags: Vec<Tag>,
}

struct SimState {
    cluster: String,
    group_name: String,
    instance_type: String,
    tag_key: String,
    counts: GroupCounts,
    members: Vec<InstanceId>,
    instances: Vec<SimInstance>,
    services: Vec<ServiceSnapshot>,
    behavior: SimBehavior,
    /// Group describes left before each queued launch materializes.
    launch_queue: Vec<u32>,
    next_seq: usize,
    duplicate_group: bool,
    faults: HashMap<String, VecDeque<ApiError>>,
    events: Vec<SimEvent>,
}

/// In-memory cluster, compute and scaling group service.
pub struct SimulatedFleet {
    state: Mutex<SimState>,
}

impl SimulatedFleet {
    pub fn from_snapshot(snapshot: FleetSnapshot) -> Self {
        let FleetSnapshot {
            cluster,
            group,
            instances,
            services,
            behavior,
        } = snapshot;

        let members = instances
            .iter()
            .filter(|i| i.member)
            .map(|i| i.id.clone())
            .collect();

        let instances: Vec<SimInstance> = instances
            .into_iter()
            .map(|i| SimInstance {
                tags: vec![Tag {
                    key: group.tag_key.clone(),
                    value: group.name.clone(),
                }],
                id: i.id,
                address: i.private_address,
                state: i.state,
                registered: i.registered,
            })
            .collect();

        let next_seq = instances.len() + 1;

        Self {
            state: Mutex::new(SimState {
                cluster,
                group_name: group.name,
                instance_type: group.instance_type,
                tag_key: group.tag_key,
                counts: group.counts,
                members,
                instances,
                services,
                behavior,
                launch_queue: Vec::new(),
                next_seq,
                duplicate_group: false,
                faults: HashMap::new(),
                events: Vec::new(),
            }),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fleet snapshot {}", path.display()))?;
        let snapshot: FleetSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("invalid fleet snapshot {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// A context whose shutdown signal never fires.
    pub fn context(self: &Arc<Self>, settings: Settings) -> FleetContext {
        let (_tx, rx) = watch::channel(false);
        self.context_with_shutdown(settings, rx)
    }

    pub fn context_with_shutdown(self: &Arc<Self>, settings: Settings, shutdown: watch::Receiver<bool>) -> FleetContext {
        FleetContext::from_backend(Arc::clone(self), settings, shutdown)
    }

    // ── Test hooks ─────────────────────────────────────────────────

    /// Fail the next call of `operation` with `error`. Faults queue up.
    pub fn inject_fault(&self, operation: &str, error: ApiError) {
        self.lock()
            .faults
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    pub fn clear_tags(&self, instance_id: &str) {
        if let Some(i) = self.lock().instance_mut(instance_id) {
            i.tags.clear();
        }
    }

    /// Make group describes return the group twice.
    pub fn duplicate_group(&self) {
        self.lock().duplicate_group = true;
    }

    pub fn set_desired_count(&self, service: &str, desired: u32) {
        if let Some(s) = self.lock().services.iter_mut().find(|s| s.name == service) {
            s.desired_count = desired;
        }
    }

    pub fn set_instance_state(&self, instance_id: &str, state: InstanceState) {
        if let Some(i) = self.lock().instance_mut(instance_id) {
            i.state = state;
        }
    }

    /// Drop every record of an instance, as if it never existed.
    pub fn forget_instance(&self, instance_id: &str) {
        self.lock().instances.retain(|i| i.id != instance_id);
    }

    pub fn group_counts(&self) -> GroupCounts {
        self.lock().counts
    }

    pub fn members(&self) -> Vec<InstanceId> {
        self.lock().members.clone()
    }

    pub fn instance_state(&self, instance_id: &str) -> Option<InstanceState> {
        self.lock()
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .map(|i| i.state)
    }

    /// Instances currently registered to the cluster.
    pub fn registered_nodes(&self) -> Vec<InstanceId> {
        self.lock()
            .instances
            .iter()
            .filter(|i| i.registered)
            .map(|i| i.id.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the state, first consuming any fault queued for `operation`.
    fn enter(&self, operation: &str) -> ApiResult<MutexGuard<'_, SimState>> {
        let mut state = self.lock();
        if let Some(fault) = state.faults.get_mut(operation).and_then(VecDeque::pop_front) {
            debug!(operation, error = %fault, "injecting fault");
            return Err(fault);
        }
        Ok(state)
    }
}

impl SimState {
    fn instance_mut(&mut self, instance_id: &str) -> Option<&mut SimInstance> {
        self.instances.iter_mut().find(|i| i.id == instance_id)
    }

    fn check_cluster(&self, cluster: &ClusterRef) -> ApiResult<()> {
        if cluster.name() == self.cluster {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("cluster {cluster}")))
        }
    }

    fn check_group(&self, name: &str) -> ApiResult<()> {
        if name == self.group_name {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("scaling group {name}")))
        }
    }

    fn service_arn(&self, name: &str) -> String {
        format!("arn:sim:service/{}/{name}", self.cluster)
    }

    fn group(&self) -> ScalingGroup {
        ScalingGroup {
            name: self.group_name.clone(),
            counts: self.counts,
            members: self.members.clone(),
            instance_type: self.instance_type.clone(),
        }
    }

    fn queue_launches(&mut self, n: usize) {
        if self.behavior.replacement_delay == 0 {
            (0..n).for_each(|_| self.launch());
        } else {
            self.launch_queue
                .extend(std::iter::repeat_n(self.behavior.replacement_delay, n));
        }
    }

    fn tick_launches(&mut self) {
        for remaining in &mut self.launch_queue {
            *remaining = remaining.saturating_sub(1);
        }
        let ready = self.launch_queue.iter().filter(|r| **r == 0).count();
        self.launch_queue.retain(|r| *r > 0);
        (0..ready).for_each(|_| self.launch());
    }

    fn launch(&mut self) {
        let mut seq = self.next_seq;
        while self.instances.iter().any(|i| i.id == instance_id_for(seq)) {
            seq += 1;
        }
        self.next_seq = seq + 1;

        let id = instance_id_for(seq);
        self.instances.push(SimInstance {
            id: id.clone(),
            address: address_for(seq),
            state: InstanceState::Running,
            registered: true,
            tags: vec![Tag {
                key: self.tag_key.clone(),
                value: self.group_name.clone(),
            }],
        });
        self.members.push(id.clone());
        debug!(instance_id = %id, "launched replacement");
        self.events.push(SimEvent::Launched { instance_id: id });
    }

    fn terminate(&mut self, instance_id: &str) {
        if let Some(i) = self.instance_mut(instance_id) {
            i.state = InstanceState::Terminated;
            i.registered = false;
        }
        self.members.retain(|m| m != instance_id);

        let reschedule = self.behavior.reschedule_on_terminate;
        if let Some(s) = self.services.iter_mut().find(|s| s.desired_count > 0) {
            s.pending_count += reschedule;
        }
        self.events.push(SimEvent::Terminated {
            instance_id: instance_id.to_string(),
        });
    }

    /// Bring members plus queued launches in line with desired capacity.
    fn reconcile(&mut self) {
        let desired = self.counts.desired as usize;
        let planned = self.members.len() + self.launch_queue.len();

        if planned < desired {
            self.queue_launches(desired - planned);
            return;
        }

        let mut excess = planned - desired;
        while excess > 0 && self.launch_queue.pop().is_some() {
            excess -= 1;
        }
        while excess > 0 {
            let Some(id) = self.members.last().cloned() else {
                break;
            };
            self.terminate(&id);
            excess -= 1;
        }
    }
}

#[async_trait]
impl ContainerApi for SimulatedFleet {
    async fn describe_cluster_nodes(&self, cluster: &ClusterRef) -> ApiResult<Vec<Node>> {
        let state = self.enter("describe_cluster_nodes")?;
        state.check_cluster(cluster)?;

        Ok(state
            .instances
            .iter()
            .filter(|i| i.registered)
            .map(|i| Node {
                arn: format!("arn:sim:container-instance/{}/{}", state.cluster, i.id),
                instance_id: i.id.clone(),
                status: NodeStatus::Active,
            })
            .collect())
    }

    async fn list_cluster_services(&self, cluster: &ClusterRef, next_token: Option<&str>) -> ApiResult<ServicePage> {
        let state = self.enter("list_cluster_services")?;
        state.check_cluster(cluster)?;

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::Rejected(format!("invalid continuation token {token}")))?,
            None => 0,
        };
        let page_size = state.behavior.page_size.max(1);
        let end = (start + page_size).min(state.services.len());

        let arns = state
            .services
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|s| state.service_arn(&s.name))
            .collect();
        let next_token = (end < state.services.len()).then(|| end.to_string());

        Ok(ServicePage { arns, next_token })
    }

    async fn describe_services(&self, cluster: &ClusterRef, service_arns: &[String]) -> ApiResult<Vec<Service>> {
        let mut state = self.enter("describe_services")?;
        state.check_cluster(cluster)?;

        let prefix = format!("arn:sim:service/{}/", state.cluster);
        let drain = state.behavior.drain_per_describe;
        let mut described = Vec::with_capacity(service_arns.len());

        for arn in service_arns {
            let name = arn
                .strip_prefix(&prefix)
                .ok_or_else(|| ApiError::NotFound(format!("service {arn}")))?;
            let service = state
                .services
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| ApiError::NotFound(format!("service {arn}")))?;

            described.push(Service {
                name: service.name.clone(),
                arn: arn.clone(),
                desired_count: service.desired_count,
                pending_count: service.pending_count,
                task_definition: format!("{}:1", service.name),
            });
            service.pending_count = service.pending_count.saturating_sub(drain);
        }

        let pending = described.iter().map(|s| s.pending_count).sum();
        state.events.push(SimEvent::ServicesDescribed { pending });
        Ok(described)
    }

    async fn describe_task_resource_profile(&self, task_definition: &str) -> ApiResult<Vec<ContainerResources>> {
        let state = self.enter("describe_task_resource_profile")?;
        let family = task_definition
            .rsplit_once(':')
            .map_or(task_definition, |(family, _)| family);

        state
            .services
            .iter()
            .find(|s| s.name == family)
            .map(|s| s.containers.clone())
            .ok_or_else(|| ApiError::NotFound(format!("task definition {task_definition}")))
    }
}

#[async_trait]
impl ComputeApi for SimulatedFleet {
    async fn describe_node_tags(&self, instance_id: &str) -> ApiResult<Vec<Tag>> {
        let state = self.enter("describe_node_tags")?;
        state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .map(|i| i.tags.clone())
            .ok_or_else(|| ApiError::NotFound(format!("instance {instance_id}")))
    }

    async fn describe_private_addresses(&self, instance_ids: &[InstanceId]) -> ApiResult<Vec<String>> {
        let state = self.enter("describe_private_addresses")?;
        instance_ids
            .iter()
            .map(|id| {
                state
                    .instances
                    .iter()
                    .find(|i| &i.id == id)
                    .map(|i| i.address.clone())
                    .ok_or_else(|| ApiError::NotFound(format!("instance {id}")))
            })
            .collect()
    }

    async fn describe_instance_state(&self, instance_id: &str) -> ApiResult<Option<InstanceState>> {
        let state = self.enter("describe_instance_state")?;
        Ok(state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .map(|i| i.state))
    }

    async fn terminate_instance(&self, instance_id: &str) -> ApiResult<()> {
        let mut state = self.enter("terminate_instance")?;
        if !state.instances.iter().any(|i| i.id == instance_id) {
            return Err(ApiError::NotFound(format!("instance {instance_id}")));
        }
        state.terminate(instance_id);
        Ok(())
    }
}

#[async_trait]
impl ScalingApi for SimulatedFleet {
    async fn describe_scaling_group(&self, name: &str) -> ApiResult<Vec<ScalingGroup>> {
        let mut state = self.enter("describe_scaling_group")?;
        if name != state.group_name {
            return Ok(Vec::new());
        }

        state.tick_launches();
        let group = state.group();
        if state.duplicate_group {
            Ok(vec![group.clone(), group])
        } else {
            Ok(vec![group])
        }
    }

    async fn set_scaling_group_counts(&self, name: &str, counts: GroupCounts) -> ApiResult<()> {
        let mut state = self.enter("set_scaling_group_counts")?;
        state.check_group(name)?;

        if counts.min > counts.desired || counts.desired > counts.max {
            return Err(ApiError::Rejected(format!("invalid group counts {counts}")));
        }

        state.counts = counts;
        state.events.push(SimEvent::CountsSet { counts });
        state.reconcile();
        Ok(())
    }

    async fn detach_scaling_group_members(
        &self,
        name: &str,
        instance_ids: &[InstanceId],
        shrink_desired: bool,
    ) -> ApiResult<()> {
        let mut state = self.enter("detach_scaling_group_members")?;
        state.check_group(name)?;

        if let Some(stranger) = instance_ids.iter().find(|id| !state.members.contains(id)) {
            return Err(ApiError::NotFound(format!("{stranger} is not a member of {name}")));
        }

        state.members.retain(|m| !instance_ids.contains(m));
        state.events.push(SimEvent::Detached {
            instance_ids: instance_ids.to_vec(),
            shrink_desired,
        });

        if shrink_desired {
            let n = instance_ids.len() as u32;
            state.counts.desired = state.counts.desired.saturating_sub(n);
            state.counts.min = state.counts.min.min(state.counts.desired);
        } else {
            state.queue_launches(instance_ids.len());
        }
        Ok(())
    }
}
