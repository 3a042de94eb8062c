//! Domain types shared by the nodepool crates.
//!
//! These are read-only snapshots of live cluster state. Nothing here is
//! persisted; every invocation re-reads what it needs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the compute instance backing a node.
pub type InstanceId = String;

// ── Cluster ────────────────────────────────────────────────────────

/// A named orchestration cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterRef(String);

impl ClusterRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration status of a node within its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Active,
    Draining,
    Inactive,
}

/// A compute host registered as a worker in a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Cluster-side identifier (container instance ARN).
    pub arn: String,
    /// Backing compute instance.
    pub instance_id: InstanceId,
    pub status: NodeStatus,
}

// ── Services ───────────────────────────────────────────────────────

/// A long-running workload bound to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub arn: String,
    pub desired_count: u32,
    /// Tasks not yet running. Only meaningful at the moment it was read.
    pub pending_count: u32,
    /// Reference to the service's current task definition.
    pub task_definition: String,
}

/// One page of service ARNs from a paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePage {
    pub arns: Vec<String>,
    /// Continuation token; `None` on the last page.
    pub next_token: Option<String>,
}

/// Resources reserved by a single container of a task definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    pub memory: u64,
    pub cpu: u64,
}

/// Aggregate demand of one task of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub memory: u64,
    pub cpu: u64,
}

impl ResourceProfile {
    /// Sum the reservations of every container in a task.
    pub fn from_containers(containers: &[ContainerResources]) -> Self {
        containers.iter().fold(Self::default(), |acc, c| Self {
            memory: acc.memory + c.memory,
            cpu: acc.cpu + c.cpu,
        })
    }
}

/// An active service paired with its per-task profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDemand {
    pub name: String,
    pub desired_count: u32,
    pub profile: ResourceProfile,
}

// ── Compute ────────────────────────────────────────────────────────

/// Capacity of one node of a given instance type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCapacity {
    /// Memory in MiB.
    pub memory: u64,
    /// CPU units (1024 per vCPU).
    pub cpu: u64,
}

/// Lifecycle state of a compute instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    /// True once the instance is terminated or on its way there.
    pub fn is_terminating(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

/// A key/value tag on a compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

// ── Scaling groups ─────────────────────────────────────────────────

/// Desired/min/max triple of a scaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub desired: u32,
    pub min: u32,
    pub max: u32,
}

impl GroupCounts {
    /// Pin desired and min to `n`, raising max when it is below `n`.
    pub fn pinned_to(self, n: u32) -> Self {
        Self {
            desired: n,
            min: n,
            max: self.max.max(n),
        }
    }
}

impl fmt::Display for GroupCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired = {}, min = {}, max = {}",
            self.desired, self.min, self.max
        )
    }
}

/// A managed pool of homogeneous nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub name: String,
    pub counts: GroupCounts,
    pub members: Vec<InstanceId>,
    /// Instance type launched by the group.
    pub instance_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_sums_all_containers() {
        let profile = ResourceProfile::from_containers(&[
            ContainerResources { memory: 256, cpu: 128 },
            ContainerResources { memory: 512, cpu: 0 },
            ContainerResources { memory: 64, cpu: 64 },
        ]);
        assert_eq!(profile, ResourceProfile { memory: 832, cpu: 192 });
    }

    #[test]
    fn profile_of_no_containers_is_zero() {
        assert_eq!(ResourceProfile::from_containers(&[]), ResourceProfile::default());
    }

    #[test]
    fn pinned_counts_raise_but_never_lower_max() {
        let counts = GroupCounts { desired: 2, min: 2, max: 4 };
        assert_eq!(counts.pinned_to(6), GroupCounts { desired: 6, min: 6, max: 6 });
        assert_eq!(counts.pinned_to(1), GroupCounts { desired: 1, min: 1, max: 4 });
    }

    #[test]
    fn instance_state_serializes_kebab_case() {
        let json = serde_json::to_string(&InstanceState::ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting-down\"");
        assert!(InstanceState::ShuttingDown.is_terminating());
        assert!(!InstanceState::Running.is_terminating());
    }
}
