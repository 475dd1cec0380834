// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Dependency-ordered service sequencing.
//!
//! Every service that participates in initialization declares the interface
//! ids it depends on. For ordering purposes the *transitive* dependency set
//! matters: if A depends on an interface of B, A inherits B's dependencies
//! too. A service encountered again while its own set is still being
//! collected is a cycle, which is fatal.
//!
//! The result is split in two:
//! 1. services with an empty dependency set - initialized concurrently;
//! 2. services with dependencies - initialized strictly sequentially, each
//!    after all of its providers.
//!
//! Shutdown reuses the same computation with the sequential group reversed.

use std::any::TypeId;
use std::collections::HashSet;

use crate::error::{EngineError, ErrorPtr};

/// One orderable participant: its advertised interfaces plus its *declared*
/// (direct) dependencies.
#[derive(Clone, Debug)]
pub(crate) struct OrderableService {
    pub interfaces: Vec<TypeId>,
    pub declared_dependencies: Vec<TypeId>,
}

/// Index-based ordering result over the input slice.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct OrderedServices {
    /// Indices of services with no dependencies; may run concurrently.
    pub independent: Vec<usize>,
    /// Indices of dependency-bearing services in initialization order.
    pub dependent: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

/// Computes the initialization order. Errors on cyclic dependencies.
pub(crate) fn order_services(
    services: &[OrderableService],
) -> Result<OrderedServices, ErrorPtr> {
    let mut transitive: Vec<HashSet<TypeId>> = vec![HashSet::new(); services.len()];
    let mut visit = vec![Visit::Unvisited; services.len()];

    for index in 0..services.len() {
        collect_transitive(services, index, &mut transitive, &mut visit)?;
    }

    let mut independent = Vec::new();
    let mut dependent: Vec<usize> = Vec::new();
    for (index, deps) in transitive.iter().enumerate() {
        if deps.is_empty() {
            independent.push(index);
        } else {
            dependent.push(index);
        }
    }

    // Order the dependent group: repeatedly take the first service whose
    // providers have all been emitted. Registration order is preserved
    // between unrelated services.
    let mut ordered = Vec::with_capacity(dependent.len());
    let mut remaining = dependent;
    while !remaining.is_empty() {
        let position = remaining.iter().position(|&candidate| {
            remaining.iter().all(|&other| {
                other == candidate || !depends_on(&transitive[candidate], &services[other])
            })
        });
        match position {
            Some(position) => ordered.push(remaining.remove(position)),
            None => {
                return Err(EngineError::contract_violation(
                    "service cyclic dependency",
                ));
            }
        }
    }

    Ok(OrderedServices {
        independent,
        dependent: ordered,
    })
}

/// `true` when `dependencies` names any interface `provider` advertises.
fn depends_on(dependencies: &HashSet<TypeId>, provider: &OrderableService) -> bool {
    provider
        .interfaces
        .iter()
        .any(|interface| dependencies.contains(interface))
}

fn collect_transitive(
    services: &[OrderableService],
    index: usize,
    transitive: &mut Vec<HashSet<TypeId>>,
    visit: &mut Vec<Visit>,
) -> Result<(), ErrorPtr> {
    match visit[index] {
        Visit::Done => return Ok(()),
        Visit::InProgress => {
            return Err(EngineError::contract_violation(
                "service cyclic dependency",
            ));
        }
        Visit::Unvisited => {}
    }
    visit[index] = Visit::InProgress;

    let declared: Vec<TypeId> = services[index].declared_dependencies.clone();
    let mut collected: HashSet<TypeId> = declared.iter().copied().collect();

    if !declared.is_empty() {
        for (other_index, other) in services.iter().enumerate() {
            if other_index == index {
                continue;
            }
            let provides_dependency = other
                .interfaces
                .iter()
                .any(|interface| declared.contains(interface));
            if provides_dependency {
                collect_transitive(services, other_index, transitive, visit)?;
                collected.extend(transitive[other_index].iter().copied());
            }
        }
    }

    transitive[index] = collected;
    visit[index] = Visit::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface_id(tag: u32) -> TypeId {
        // Distinct TypeIds for tests, taken from distinct const generics.
        match tag {
            0 => TypeId::of::<[u8; 0]>(),
            1 => TypeId::of::<[u8; 1]>(),
            2 => TypeId::of::<[u8; 2]>(),
            3 => TypeId::of::<[u8; 3]>(),
            _ => TypeId::of::<[u8; 9]>(),
        }
    }

    fn service(interfaces: &[u32], dependencies: &[u32]) -> OrderableService {
        OrderableService {
            interfaces: interfaces.iter().map(|&t| interface_id(t)).collect(),
            declared_dependencies: dependencies
                .iter()
                .map(|&t| interface_id(t))
                .collect(),
        }
    }

    #[test]
    fn independent_services_keep_registration_order() {
        let services = [service(&[0], &[]), service(&[1], &[]), service(&[2], &[])];
        let ordered = order_services(&services).unwrap();
        assert_eq!(ordered.independent, [0, 1, 2]);
        assert!(ordered.dependent.is_empty());
    }

    #[test]
    fn chain_is_ordered_providers_first() {
        // S0 provides I0; S1 (I1) depends on I0; S2 (I2) depends on I0, I1.
        let services = [
            service(&[2], &[0, 1]),
            service(&[1], &[0]),
            service(&[0], &[]),
        ];
        let ordered = order_services(&services).unwrap();
        assert_eq!(ordered.independent, [2]);
        assert_eq!(ordered.dependent, [1, 0]);
    }

    #[test]
    fn transitive_dependencies_are_inherited() {
        // S0 (I0) <- S1 (I1, deps I0) <- S2 (deps I1 only).
        let services = [
            service(&[0], &[]),
            service(&[1], &[0]),
            service(&[2], &[1]),
        ];
        let ordered = order_services(&services).unwrap();
        assert_eq!(ordered.independent, [0]);
        // S2 inherited the dependency on I0 through S1.
        assert_eq!(ordered.dependent, [1, 2]);
    }

    #[test]
    fn dependency_on_unprovided_interface_is_still_dependent_group() {
        let services = [service(&[0], &[3])];
        let ordered = order_services(&services).unwrap();
        assert!(ordered.independent.is_empty());
        assert_eq!(ordered.dependent, [0]);
    }

    #[test]
    fn cycle_is_fatal() {
        let services = [service(&[0], &[1]), service(&[1], &[0])];
        let err = order_services(&services).unwrap_err();
        assert!(matches!(*err, EngineError::ContractViolation(_)));
    }
}
