//! Capacity computation: resource totals and node counts.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use nodepool_core::{FleetError, InstanceCapacity, Service, ServiceDemand};

/// Errors from node-count computation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("instance capacity has zero {resource} but {needed} is needed")]
    ZeroCapacity { resource: &'static str, needed: u64 },
    #[error("{nodes} nodes needed, more than a scaling group can hold")]
    TooManyNodes { nodes: u64 },
}

impl From<PlanError> for FleetError {
    fn from(e: PlanError) -> Self {
        FleetError::Invariant(e.to_string())
    }
}

/// Total resources the active services need, headroom included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceNeeds {
    /// Memory for every desired task plus one copy of the largest task.
    pub memory: u64,
    /// CPU for every desired task plus one copy of the largest task.
    pub cpu: u64,
    /// Largest per-task memory among active services (the memory headroom).
    pub largest_memory: u64,
    /// Largest per-task cpu among active services (the cpu headroom).
    pub largest_cpu: u64,
}

/// Sum the demand of every active service and add rolling-update headroom.
///
/// Totals saturate at `u64::MAX`; `nodes_needed` rejects the resulting count.
pub fn compute_needed(demands: &[ServiceDemand]) -> ResourceNeeds {
    let mut needs = ResourceNeeds::default();

    for demand in demands {
        if demand.desired_count == 0 {
            continue;
        }

        let desired = u64::from(demand.desired_count);
        needs.memory = needs.memory.saturating_add(demand.profile.memory.saturating_mul(desired));
        needs.cpu = needs.cpu.saturating_add(demand.profile.cpu.saturating_mul(desired));
        needs.largest_memory = needs.largest_memory.max(demand.profile.memory);
        needs.largest_cpu = needs.largest_cpu.max(demand.profile.cpu);

        debug!(
            service = %demand.name,
            desired = demand.desired_count,
            task_memory = demand.profile.memory,
            task_cpu = demand.profile.cpu,
            "counted service demand"
        );
    }

    needs.memory = needs.memory.saturating_add(needs.largest_memory);
    needs.cpu = needs.cpu.saturating_add(needs.largest_cpu);
    needs
}

/// Smallest node count whose memory and cpu both cover `needs`.
pub fn nodes_needed(capacity: &InstanceCapacity, needs: &ResourceNeeds) -> Result<u32, PlanError> {
    let by_memory = nodes_for("memory", needs.memory, capacity.memory)?;
    let by_cpu = nodes_for("cpu", needs.cpu, capacity.cpu)?;
    let nodes = by_memory.max(by_cpu);
    u32::try_from(nodes).map_err(|_| PlanError::TooManyNodes { nodes })
}

fn nodes_for(resource: &'static str, needed: u64, per_node: u64) -> Result<u64, PlanError> {
    if needed == 0 {
        return Ok(0);
    }
    if per_node == 0 {
        return Err(PlanError::ZeroCapacity { resource, needed });
    }
    Ok(needed.div_ceil(per_node))
}

/// Largest desired count of any single service.
pub fn largest_desired_count(services: &[Service]) -> u32 {
    services.iter().map(|s| s.desired_count).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodepool_core::ResourceProfile;

    fn demand(name: &str, desired: u32, memory: u64, cpu: u64) -> ServiceDemand {
        ServiceDemand {
            name: name.to_string(),
            desired_count: desired,
            profile: ResourceProfile { memory, cpu },
        }
    }

    fn service(name: &str, desired: u32) -> Service {
        Service {
            name: name.to_string(),
            arn: format!("arn:svc/{name}"),
            desired_count: desired,
            pending_count: 0,
            task_definition: format!("{name}:1"),
        }
    }

    #[test]
    fn single_service_with_headroom() {
        let needs = compute_needed(&[demand("api", 3, 512, 256)]);
        assert_eq!(needs.memory, 3 * 512 + 512);
        assert_eq!(needs.cpu, 3 * 256 + 256);

        let capacity = InstanceCapacity { memory: 2048, cpu: 1024 };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 1);
    }

    #[test]
    fn largest_memory_and_cpu_come_from_different_services() {
        let needs = compute_needed(&[demand("a", 2, 1000, 100), demand("b", 1, 3000, 50)]);
        assert_eq!(needs.largest_memory, 3000);
        assert_eq!(needs.largest_cpu, 100);
        assert_eq!(needs.memory, 8000);
        assert_eq!(needs.cpu, 350);

        let capacity = InstanceCapacity { memory: 4000, cpu: 400 };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 2);
    }

    #[test]
    fn idle_services_need_nothing() {
        let needs = compute_needed(&[demand("a", 0, 4096, 2048), demand("b", 0, 128, 128)]);
        assert_eq!(needs, ResourceNeeds::default());

        let capacity = InstanceCapacity { memory: 2048, cpu: 1024 };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 0);
    }

    #[test]
    fn no_services_need_no_nodes() {
        let needs = compute_needed(&[]);
        let capacity = InstanceCapacity { memory: 2048, cpu: 1024 };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 0);
    }

    #[test]
    fn idle_services_add_no_headroom() {
        let with_idle = compute_needed(&[demand("a", 1, 100, 10), demand("big", 0, 9000, 900)]);
        let without = compute_needed(&[demand("a", 1, 100, 10)]);
        assert_eq!(with_idle, without);
    }

    #[test]
    fn totals_never_decrease_as_desired_grows() {
        let mut previous = ResourceNeeds::default();
        for desired in 0..20 {
            let needs = compute_needed(&[demand("a", 2, 700, 300), demand("b", desired, 256, 512)]);
            assert!(needs.memory >= previous.memory, "memory shrank at desired={desired}");
            assert!(needs.cpu >= previous.cpu, "cpu shrank at desired={desired}");
            previous = needs;
        }
    }

    #[test]
    fn removing_largest_service_drops_its_headroom() {
        let all = compute_needed(&[
            demand("small", 4, 256, 128),
            demand("medium", 2, 1024, 256),
            demand("large", 1, 4096, 1024),
        ]);
        let rest = compute_needed(&[demand("small", 4, 256, 128), demand("medium", 2, 1024, 256)]);

        assert_eq!(all.largest_memory - rest.largest_memory, 4096 - 1024);
        assert_eq!(all.largest_cpu - rest.largest_cpu, 1024 - 256);
    }

    #[test]
    fn tied_largest_keeps_headroom() {
        let all = compute_needed(&[demand("a", 1, 2048, 512), demand("b", 3, 2048, 512)]);
        let rest = compute_needed(&[demand("b", 3, 2048, 512)]);
        assert_eq!(all.largest_memory, rest.largest_memory);
        assert_eq!(all.largest_cpu, rest.largest_cpu);
    }

    #[test]
    fn node_count_rounds_up_on_the_tighter_resource() {
        let needs = ResourceNeeds {
            memory: 4097,
            cpu: 100,
            ..Default::default()
        };
        let capacity = InstanceCapacity { memory: 2048, cpu: 1024 };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 3);

        let needs = ResourceNeeds {
            memory: 100,
            cpu: 5000,
            ..Default::default()
        };
        assert_eq!(nodes_needed(&capacity, &needs).unwrap(), 5);
    }

    #[test]
    fn zero_capacity_with_demand_is_an_error() {
        let needs = ResourceNeeds {
            memory: 10,
            cpu: 10,
            ..Default::default()
        };
        let capacity = InstanceCapacity { memory: 0, cpu: 1024 };
        let err = nodes_needed(&capacity, &needs).unwrap_err();
        assert_eq!(err, PlanError::ZeroCapacity { resource: "memory", needed: 10 });
        assert_eq!(FleetError::from(err).kind(), nodepool_core::ErrorKind::Invariant);
    }

    #[test]
    fn oversized_demand_is_rejected_not_capped() {
        let needs = compute_needed(&[demand("huge", u32::MAX, u64::MAX / 2, 1)]);
        assert_eq!(needs.memory, u64::MAX);

        let capacity = InstanceCapacity { memory: 1024, cpu: 1024 };
        let err = nodes_needed(&capacity, &needs).unwrap_err();
        assert_eq!(err, PlanError::TooManyNodes { nodes: u64::MAX.div_ceil(1024) });
        assert_eq!(FleetError::from(err).kind(), nodepool_core::ErrorKind::Invariant);
    }

    #[test]
    fn largest_desired_count_across_services() {
        assert_eq!(largest_desired_count(&[]), 0);
        let services = [service("a", 2), service("b", 7), service("c", 0)];
        assert_eq!(largest_desired_count(&services), 7);
    }
}
