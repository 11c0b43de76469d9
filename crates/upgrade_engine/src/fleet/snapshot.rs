use std::collections::BTreeMap;

use thiserror::Error;

use crate::world::{CargoId, EntityId, Instruction, Location, UnitRole, WorldView};

/// Ordered unit roles of one composite entity; exact-match dedup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositionSignature(Vec<UnitRole>);

impl CompositionSignature {
    pub fn new(roles: Vec<UnitRole>) -> Self {
        Self(roles)
    }

    pub fn roles(&self) -> &[UnitRole] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cargo of the first carriage; traction units are refitted to it when they can be.
    pub fn dominant_cargo(&self) -> Option<CargoId> {
        self.0.iter().find_map(|role| role.cargo())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(pub usize);

/// Cohort of entities that shared one instruction list before the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    instructions: Vec<Instruction>,
    clone_sources: BTreeMap<CompositionSignature, EntityId>,
    designation: Option<EntityId>,
}

impl Route {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            clone_sources: BTreeMap::new(),
            designation: None,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Rebuilt entity with this signature that later members may clone with shared orders.
    pub fn clone_source(&self, signature: &CompositionSignature) -> Option<EntityId> {
        self.clone_sources.get(signature).copied()
    }

    pub fn record_clone_source(&mut self, signature: &CompositionSignature, entity: EntityId) {
        self.clone_sources
            .entry(signature.clone())
            .or_insert(entity);
    }

    pub fn designation(&self) -> Option<EntityId> {
        self.designation
    }

    /// Write-once; later calls keep the first designation.
    pub fn designate(&mut self, entity: EntityId) {
        debug_assert!(
            self.designation.is_none(),
            "route designation is write-once"
        );
        self.designation.get_or_insert(entity);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub original: EntityId,
    pub depot: Location,
    pub signature: CompositionSignature,
    pub route: RouteId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSnapshot {
    pub routes: Vec<Route>,
    pub entities: Vec<EntitySnapshot>,
    pub depots: Vec<Location>,
}

impl FleetSnapshot {
    pub fn route(&self, id: RouteId) -> &Route {
        &self.routes[id.0]
    }
}

/// Position right after the visit to `depot` in `instructions`, wrapping at the end.
pub fn resume_index_after(instructions: &[Instruction], depot: Location) -> Option<usize> {
    let depot_index = instructions
        .iter()
        .position(|instruction| instruction.targets_depot(depot))?;
    Some((depot_index + 1) % instructions.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("entity {0} disappeared while its composition was being captured")]
    EntityVanished(EntityId),
}

/// Groups `entities` by shared instruction list and captures each member.
///
/// Entities are ordered by group identity (stable within a group), so every
/// route is pushed before the snapshots that reference it.
pub fn capture_fleet(
    world: &dyn WorldView,
    entities: &[EntityId],
) -> Result<FleetSnapshot, SnapshotError> {
    let mut keyed = Vec::with_capacity(entities.len());
    for &entity in entities {
        let group = world
            .shared_group(entity)
            .ok_or(SnapshotError::EntityVanished(entity))?;
        keyed.push((group, entity));
    }
    keyed.sort_by_key(|(group, _)| *group);

    let mut snapshot = FleetSnapshot::default();
    let mut current_group = None;
    for (group, entity) in keyed {
        if current_group != Some(group) {
            let instructions = world
                .instructions(entity)
                .ok_or(SnapshotError::EntityVanished(entity))?;
            snapshot.routes.push(Route::new(instructions));
            current_group = Some(group);
        }
        let route = RouteId(snapshot.routes.len() - 1);

        let roles = world
            .unit_roles(entity)
            .ok_or(SnapshotError::EntityVanished(entity))?;
        let depot = world
            .location(entity)
            .ok_or(SnapshotError::EntityVanished(entity))?;
        snapshot.entities.push(EntitySnapshot {
            original: entity,
            depot,
            signature: CompositionSignature::new(roles),
            route,
        });
        snapshot.depots.push(depot);
    }

    snapshot.depots.sort();
    snapshot.depots.dedup();
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimWorld, TrainSpec};
    use crate::world::{AgentId, CargoId};

    const AGENT: AgentId = AgentId(1);

    fn coal() -> UnitRole {
        UnitRole::Cargo(CargoId(0))
    }

    #[test]
    fn groups_by_shared_list_and_dedups_depots() {
        let mut world = SimWorld::standard_test_world();
        let depot_a = Location::new(2, 2);
        let depot_b = Location::new(6, 2);
        let route_a = vec![Instruction::Other(1), Instruction::GoToDepot(depot_a)];
        let route_b = vec![Instruction::Other(2)];

        let first = world
            .spawn_train(
                TrainSpec::in_depot(AGENT, depot_a, &[1, 10]).with_instructions(route_a.clone()),
            )
            .expect("first");
        let lone = world
            .spawn_train(
                TrainSpec::in_depot(AGENT, depot_b, &[1]).with_instructions(route_b.clone()),
            )
            .expect("lone");
        let second = world
            .spawn_train(TrainSpec::in_depot(AGENT, depot_a, &[1, 10]).sharing_with(first))
            .expect("second");

        let snapshot = capture_fleet(&world, &[second, lone, first]).expect("snapshot");

        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(snapshot.entities.len(), 3);
        assert_eq!(snapshot.depots, vec![depot_a, depot_b]);

        let first_route = snapshot.entities[0].route;
        assert_eq!(
            snapshot.route(first_route).instructions(),
            route_a.as_slice()
        );
        assert_eq!(snapshot.entities[0].original, second);
        assert_eq!(snapshot.entities[1].original, first);
        assert_eq!(snapshot.entities[1].route, first_route);
        assert_eq!(
            snapshot.entities[0].signature.roles(),
            &[UnitRole::Traction, coal()]
        );
        assert_eq!(
            snapshot.route(snapshot.entities[2].route).instructions(),
            route_b.as_slice()
        );
        for entity in &snapshot.entities {
            assert!(entity.route.0 < snapshot.routes.len());
        }
    }

    #[test]
    fn missing_entity_reports_vanished() {
        let world = SimWorld::standard_test_world();
        let error = capture_fleet(&world, &[EntityId(404)]).expect_err("missing");
        assert_eq!(error, SnapshotError::EntityVanished(EntityId(404)));
    }

    #[test]
    fn dominant_cargo_is_first_carriage() {
        let signature = CompositionSignature::new(vec![
            UnitRole::Traction,
            UnitRole::Cargo(CargoId(3)),
            UnitRole::Cargo(CargoId(1)),
        ]);
        assert_eq!(signature.dominant_cargo(), Some(CargoId(3)));
        assert_eq!(
            CompositionSignature::new(vec![UnitRole::Traction]).dominant_cargo(),
            None
        );
    }

    #[test]
    fn designation_and_clone_sources_are_write_once() {
        let mut route = Route::new(vec![Instruction::Other(5)]);
        let signature = CompositionSignature::new(vec![UnitRole::Traction]);
        route.record_clone_source(&signature, EntityId(1));
        route.record_clone_source(&signature, EntityId(2));
        assert_eq!(route.clone_source(&signature), Some(EntityId(1)));

        route.designate(EntityId(1));
        assert_eq!(route.designation(), Some(EntityId(1)));
    }

    #[test]
    fn resume_index_wraps_past_last_step() {
        let depot = Location::new(1, 1);
        let list = [
            Instruction::GoToDepot(depot),
            Instruction::Other(1),
            Instruction::GoToDepot(depot),
        ];
        assert_eq!(resume_index_after(&list, depot), Some(1));
        assert_eq!(resume_index_after(&list[1..], depot), Some(0));
        assert_eq!(resume_index_after(&list, Location::new(9, 9)), None);
    }
}
