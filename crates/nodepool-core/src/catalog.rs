//! Instance-type catalog: per-node capacity by instance type.
//!
//! Memory is in MiB and cpu in units of 1024 per vCPU, the same units
//! task definitions reserve in.

use std::collections::HashMap;

use crate::error::{FleetError, FleetResult};
use crate::types::InstanceCapacity;

const GIB: u64 = 1024;
const VCPU: u64 = 1024;

/// (instance type, vCPUs, memory GiB)
const BUILTIN: &[(&str, u64, u64)] = &[
    ("t3.micro", 2, 1),
    ("t3.small", 2, 2),
    ("t3.medium", 2, 4),
    ("t3.large", 2, 8),
    ("t3.xlarge", 4, 16),
    ("t3.2xlarge", 8, 32),
    ("m5.large", 2, 8),
    ("m5.xlarge", 4, 16),
    ("m5.2xlarge", 8, 32),
    ("m5.4xlarge", 16, 64),
    ("m5.8xlarge", 32, 128),
    ("c5.large", 2, 4),
    ("c5.xlarge", 4, 8),
    ("c5.2xlarge", 8, 16),
    ("c5.4xlarge", 16, 32),
    ("r5.large", 2, 16),
    ("r5.xlarge", 4, 32),
    ("r5.2xlarge", 8, 64),
    ("r5.4xlarge", 16, 128),
];

#[derive(Debug, Clone, Default)]
pub struct InstanceCatalog {
    types: HashMap<String, InstanceCapacity>,
}

impl InstanceCatalog {
    /// Catalog of common general-purpose, compute and memory types.
    pub fn builtin() -> Self {
        let types = BUILTIN
            .iter()
            .map(|&(name, vcpus, gib)| {
                (
                    name.to_string(),
                    InstanceCapacity {
                        memory: gib * GIB,
                        cpu: vcpus * VCPU,
                    },
                )
            })
            .collect();
        Self { types }
    }

    /// Add or override an entry.
    pub fn insert(&mut self, instance_type: &str, capacity: InstanceCapacity) {
        self.types.insert(instance_type.to_string(), capacity);
    }

    pub fn capacity(&self, instance_type: &str) -> FleetResult<InstanceCapacity> {
        self.types
            .get(instance_type)
            .copied()
            .ok_or_else(|| FleetError::UnknownInstanceType(instance_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_uses_task_definition_units() {
        let catalog = InstanceCatalog::builtin();
        assert_eq!(
            catalog.capacity("m5.large").unwrap(),
            InstanceCapacity { memory: 8192, cpu: 2048 }
        );
        assert_eq!(catalog.len(), BUILTIN.len());
    }

    #[test]
    fn unknown_type_is_a_resolution_error() {
        let err = InstanceCatalog::builtin().capacity("z1.imaginary").unwrap_err();
        assert!(matches!(err, FleetError::UnknownInstanceType(ref t) if t == "z1.imaginary"));
    }

    #[test]
    fn insert_overrides_builtin() {
        let mut catalog = InstanceCatalog::builtin();
        let reserved = InstanceCapacity { memory: 7680, cpu: 2048 };
        catalog.insert("m5.large", reserved);
        assert_eq!(catalog.capacity("m5.large").unwrap(), reserved);
    }
}
