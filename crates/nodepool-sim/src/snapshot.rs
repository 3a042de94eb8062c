//! Fleet snapshots: the serializable starting state of a simulated fleet.

use serde::{Deserialize, Serialize};

use nodepool_core::config::DEFAULT_GROUP_TAG;
use nodepool_core::{ContainerResources, GroupCounts, InstanceState};

/// One cluster, its scaling group, instances and services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub cluster: String,
    pub group: GroupSnapshot,
    #[serde(default)]
    pub instances: Vec<InstanceSnapshot>,
    #[serde(default)]
    pub services: Vec<ServiceSnapshot>,
    #[serde(default)]
    pub behavior: SimBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub name: String,
    pub instance_type: String,
    /// Tag key carrying the group name on member instances.
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
    pub counts: GroupCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub private_address: String,
    #[serde(default = "default_state")]
    pub state: InstanceState,
    /// Registered to the cluster as a node.
    #[serde(default = "yes")]
    pub registered: bool,
    /// Member of the scaling group.
    #[serde(default = "yes")]
    pub member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub name: String,
    pub desired_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    /// Containers of the service's task definition.
    #[serde(default)]
    pub containers: Vec<ContainerResources>,
}

/// Knobs for the fleet's simulated reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimBehavior {
    /// Group describes before a queued replacement becomes a member.
    /// Zero launches at detach time.
    pub replacement_delay: u32,
    /// Pending tasks pushed onto the first active service per termination.
    pub reschedule_on_terminate: u32,
    /// Pending tasks placed per service each time it is described.
    pub drain_per_describe: u32,
    /// Service ARNs per listing page.
    pub page_size: usize,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            replacement_delay: 1,
            reschedule_on_terminate: 0,
            drain_per_describe: 1,
            page_size: 10,
        }
    }
}

fn default_tag_key() -> String {
    DEFAULT_GROUP_TAG.to_string()
}

fn default_state() -> InstanceState {
    InstanceState::Running
}

fn yes() -> bool {
    true
}

/// Address of the n-th simulated instance, starting at `10.0.0.1`.
pub(crate) fn address_for(seq: usize) -> String {
    format!("10.0.{}.{}", seq / 256, seq % 256)
}

pub(crate) fn instance_id_for(seq: usize) -> String {
    format!("i-{seq:04}")
}

impl FleetSnapshot {
    /// An empty cluster with an empty group launching `instance_type`.
    pub fn new(cluster: &str, group: &str, instance_type: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            group: GroupSnapshot {
                name: group.to_string(),
                instance_type: instance_type.to_string(),
                tag_key: default_tag_key(),
                counts: GroupCounts { desired: 0, min: 0, max: 0 },
            },
            instances: Vec::new(),
            services: Vec::new(),
            behavior: SimBehavior::default(),
        }
    }

    /// Add `n` running member instances (`i-0001`, `10.0.0.1`, ...) and pin
    /// the group counts to the new member total.
    pub fn with_instances(mut self, n: usize) -> Self {
        for _ in 0..n {
            let seq = self.instances.len() + 1;
            self.instances.push(InstanceSnapshot {
                id: instance_id_for(seq),
                private_address: address_for(seq),
                state: InstanceState::Running,
                registered: true,
                member: true,
            });
        }
        self.pin_counts_to_members();
        self
    }

    pub fn with_instance(mut self, instance: InstanceSnapshot) -> Self {
        self.instances.push(instance);
        self.pin_counts_to_members();
        self
    }

    /// Add a service whose tasks run `containers`.
    pub fn with_service(mut self, name: &str, desired_count: u32, containers: &[ContainerResources]) -> Self {
        self.services.push(ServiceSnapshot {
            name: name.to_string(),
            desired_count,
            pending_count: 0,
            containers: containers.to_vec(),
        });
        self
    }

    /// Set the pending count of an already added service.
    pub fn with_pending(mut self, service: &str, pending: u32) -> Self {
        if let Some(s) = self.services.iter_mut().find(|s| s.name == service) {
            s.pending_count = pending;
        }
        self
    }

    pub fn with_counts(mut self, counts: GroupCounts) -> Self {
        self.group.counts = counts;
        self
    }

    pub fn with_group_tag(mut self, tag_key: &str) -> Self {
        self.group.tag_key = tag_key.to_string();
        self
    }

    pub fn with_behavior(mut self, behavior: SimBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn pin_counts_to_members(&mut self) {
        let members = self.instances.iter().filter(|i| i.member).count() as u32;
        self.group.counts = self.group.counts.pinned_to(members);
    }
}
