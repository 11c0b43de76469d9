use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;
use tracing::debug;

use crate::world::{
    AgentId, CargoId, Command, CommandGateway, CommandKind, CommandOutcome, Design, DesignId,
    EntityId, Instruction, Location, Region, Ticket, TransportRejected, UnitRole, VariantId,
    WorldView,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("unknown design {0}")]
    UnknownDesign(DesignId),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("design {0} has no cargo to carry")]
    NoCargo(DesignId),
    #[error("train needs at least one unit")]
    EmptyTrain,
    #[error("{0} is not a depot")]
    NotADepot(Location),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Running,
    HeadingToDepot { remaining: u32 },
    StoppedInDepot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialState {
    InDepot,
    Running,
    HeadingToDepot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSpec {
    pub design: DesignId,
    pub cargo: Option<CargoId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainSpec {
    pub owner: AgentId,
    pub depot: Location,
    pub units: Vec<UnitSpec>,
    pub instructions: Vec<Instruction>,
    pub shares_with: Option<EntityId>,
    pub state: InitialState,
    pub travel_ticks: u32,
    pub unreachable_sends: u32,
}

impl TrainSpec {
    pub fn in_depot(owner: AgentId, depot: Location, designs: &[u32]) -> Self {
        Self {
            owner,
            depot,
            units: designs
                .iter()
                .map(|id| UnitSpec {
                    design: DesignId(*id),
                    cargo: None,
                })
                .collect(),
            instructions: Vec::new(),
            shares_with: None,
            state: InitialState::InDepot,
            travel_ticks: 0,
            unreachable_sends: 0,
        }
    }

    pub fn running(owner: AgentId, depot: Location, designs: &[u32]) -> Self {
        Self {
            state: InitialState::Running,
            ..Self::in_depot(owner, depot, designs)
        }
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn sharing_with(mut self, entity: EntityId) -> Self {
        self.shares_with = Some(entity);
        self
    }

    pub fn with_state(mut self, state: InitialState) -> Self {
        self.state = state;
        self
    }

    pub fn with_travel_ticks(mut self, ticks: u32) -> Self {
        self.travel_ticks = ticks;
        self
    }

    pub fn with_unreachable_sends(mut self, attempts: u32) -> Self {
        self.unreachable_sends = attempts;
        self
    }

    pub fn with_cargo(mut self, unit_index: usize, cargo: CargoId) -> Self {
        if let Some(unit) = self.units.get_mut(unit_index) {
            unit.cargo = Some(cargo);
        }
        self
    }
}

#[derive(Debug, Clone)]
struct Unit {
    id: EntityId,
    design: DesignId,
    role: UnitRole,
}

#[derive(Debug, Clone)]
struct Chain {
    owner: AgentId,
    units: Vec<Unit>,
    location: Location,
    home_depot: Location,
    motion: Motion,
    list: u64,
    current: usize,
    travel_ticks: u32,
    unreachable_sends: u32,
}

impl Chain {
    fn is_primary(&self) -> bool {
        self.units
            .first()
            .is_some_and(|unit| unit.role == UnitRole::Traction)
    }

    fn in_depot(&self, depot: Location) -> bool {
        self.motion == Motion::StoppedInDepot && self.location == depot
    }
}

#[derive(Debug, Clone)]
struct RejectionRule {
    kind: CommandKind,
    at: Option<Location>,
    remaining: u32,
    reason: String,
}

#[derive(Debug, Clone)]
struct PendingCommand {
    ticket: Ticket,
    due_tick: u64,
    agent: Option<AgentId>,
    command: Command,
}

/// In-memory rail world with delayed command resolution.
///
/// Commands are validated and applied when they resolve, never on submission.
#[derive(Debug, Clone)]
pub struct SimWorld {
    tick: u64,
    controlling_agent: Option<AgentId>,
    variant_names: Vec<String>,
    compatible: BTreeSet<(VariantId, VariantId)>,
    region: Region,
    tiles: BTreeMap<Location, VariantId>,
    depots: BTreeSet<Location>,
    catalog: Vec<(Design, Option<Vec<AgentId>>)>,
    chains: BTreeMap<EntityId, Chain>,
    head_by_unit: BTreeMap<EntityId, EntityId>,
    lists: BTreeMap<u64, Vec<Instruction>>,
    last_built_head: BTreeMap<Location, EntityId>,
    next_entity: u64,
    next_list: u64,
    next_ticket: u64,
    latency_ticks: u64,
    auto_attach: bool,
    transport_down: bool,
    rejections: Vec<RejectionRule>,
    pending: VecDeque<PendingCommand>,
    resolved: VecDeque<(Ticket, CommandOutcome)>,
    submitted: Vec<Command>,
}

impl SimWorld {
    pub fn new(variant_names: Vec<String>, region: Region, controlling_agent: Option<AgentId>) -> Self {
        Self {
            tick: 0,
            controlling_agent,
            variant_names,
            compatible: BTreeSet::new(),
            region,
            tiles: BTreeMap::new(),
            depots: BTreeSet::new(),
            catalog: Vec::new(),
            chains: BTreeMap::new(),
            head_by_unit: BTreeMap::new(),
            lists: BTreeMap::new(),
            last_built_head: BTreeMap::new(),
            next_entity: 1,
            next_list: 1,
            next_ticket: 1,
            latency_ticks: 1,
            auto_attach: true,
            transport_down: false,
            rejections: Vec::new(),
            pending: VecDeque::new(),
            resolved: VecDeque::new(),
            submitted: Vec::new(),
        }
    }

    /// Rail/electric/monorail/maglev world with three rail depots and a small catalog.
    ///
    /// Designs 1-3 are engines (2 is the best electric one and refits to mail),
    /// 10-12 are wagons (10 carries coal, 11 mail, 12 is an electric wagon for both).
    pub fn standard_test_world() -> Self {
        let region = Region {
            from: Location::new(14, 14),
            to: Location::new(1, 1),
        };
        let names = ["rail", "electric", "monorail", "maglev"];
        let mut world = Self::new(
            names.iter().map(ToString::to_string).collect(),
            region,
            Some(AgentId(1)),
        );
        world.allow_running_on(VariantId(0), VariantId(1));
        for x in 1..=14 {
            world.set_tile(Location::new(x, 1), VariantId(0));
        }
        for depot in [Location::new(2, 2), Location::new(6, 2), Location::new(10, 2)] {
            world.add_depot(depot, VariantId(0));
        }

        let coal = CargoId(0);
        let mail = CargoId(1);
        let designs = [
            (1, VariantId(0), 100, 1000, 50, vec![]),
            (2, VariantId(1), 160, 2000, 90, vec![mail]),
            (3, VariantId(1), 160, 1500, 95, vec![]),
            (10, VariantId(0), 120, 0, 5, vec![coal]),
            (11, VariantId(0), 120, 0, 6, vec![mail]),
            (12, VariantId(1), 160, 0, 8, vec![coal, mail]),
        ];
        for (id, variant, top_speed, power, cost, refittable) in designs {
            world.add_design(
                Design {
                    id: DesignId(id),
                    variant,
                    top_speed,
                    power,
                    cost,
                    refittable,
                },
                None,
            );
        }
        world
    }

    pub fn allow_running_on(&mut self, design_variant: VariantId, target: VariantId) {
        self.compatible.insert((design_variant, target));
    }

    pub fn set_tile(&mut self, location: Location, variant: VariantId) {
        self.tiles.insert(location, variant);
    }

    pub fn add_depot(&mut self, location: Location, variant: VariantId) {
        self.tiles.insert(location, variant);
        self.depots.insert(location);
    }

    pub fn add_design(&mut self, design: Design, available_to: Option<Vec<AgentId>>) {
        self.catalog.push((design, available_to));
    }

    pub fn clear_catalog(&mut self) {
        self.catalog.clear();
    }

    pub fn set_controlling_agent(&mut self, agent: Option<AgentId>) {
        self.controlling_agent = agent;
    }

    pub fn set_latency(&mut self, ticks: u64) {
        self.latency_ticks = ticks.max(1);
    }

    pub fn set_auto_attach(&mut self, enabled: bool) {
        self.auto_attach = enabled;
    }

    pub fn set_transport_down(&mut self, down: bool) {
        self.transport_down = down;
    }

    /// Next `count` resolutions of `kind` (optionally only at `at`) fail with `reason`.
    pub fn reject_next(
        &mut self,
        kind: CommandKind,
        at: Option<Location>,
        count: u32,
        reason: impl Into<String>,
    ) {
        self.rejections.push(RejectionRule {
            kind,
            at,
            remaining: count,
            reason: reason.into(),
        });
    }

    pub fn spawn_train(&mut self, spec: TrainSpec) -> Result<EntityId, SimError> {
        if spec.units.is_empty() {
            return Err(SimError::EmptyTrain);
        }
        if !self.depots.contains(&spec.depot) {
            return Err(SimError::NotADepot(spec.depot));
        }
        let mut roles = Vec::with_capacity(spec.units.len());
        for unit in &spec.units {
            let design = self
                .design(unit.design)
                .ok_or(SimError::UnknownDesign(unit.design))?;
            let role = if design.is_traction() {
                UnitRole::Traction
            } else {
                let cargo = unit
                    .cargo
                    .or_else(|| design.refittable.first().copied())
                    .ok_or(SimError::NoCargo(unit.design))?;
                UnitRole::Cargo(cargo)
            };
            roles.push((unit.design, role));
        }

        let list = match spec.shares_with {
            Some(other) => {
                self.chains
                    .get(&other)
                    .ok_or(SimError::UnknownEntity(other))?
                    .list
            }
            None => self.alloc_list(spec.instructions),
        };
        let motion = match spec.state {
            InitialState::InDepot => Motion::StoppedInDepot,
            InitialState::Running => Motion::Running,
            InitialState::HeadingToDepot => Motion::HeadingToDepot {
                remaining: spec.travel_ticks,
            },
        };
        let location = match spec.state {
            InitialState::InDepot => spec.depot,
            InitialState::Running | InitialState::HeadingToDepot => {
                Location::new(spec.depot.x, spec.depot.y.saturating_sub(1))
            }
        };

        let units: Vec<Unit> = roles
            .into_iter()
            .map(|(design, role)| Unit {
                id: self.alloc_entity(),
                design,
                role,
            })
            .collect();
        let head = units[0].id;
        self.insert_chain(
            head,
            Chain {
                owner: spec.owner,
                units,
                location,
                home_depot: spec.depot,
                motion,
                list,
                current: 0,
                travel_ticks: spec.travel_ticks,
                unreachable_sends: spec.unreachable_sends,
            },
        );
        Ok(head)
    }

    /// Removes an entity outright, as if another agent had destroyed it.
    pub fn remove_entity(&mut self, head: EntityId) -> bool {
        match self.chains.remove(&head) {
            Some(chain) => {
                for unit in &chain.units {
                    self.head_by_unit.remove(&unit.id);
                }
                true
            }
            None => false,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn variant_name(&self, variant: VariantId) -> Option<&str> {
        self.variant_names.get(variant.0 as usize).map(String::as_str)
    }

    pub fn submitted_commands(&self) -> &[Command] {
        &self.submitted
    }

    pub fn submitted_count(&self, kind: CommandKind) -> usize {
        self.submitted
            .iter()
            .filter(|command| command.kind() == kind)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_running(&self, entity: EntityId) -> bool {
        self.chains
            .get(&entity)
            .is_some_and(|chain| chain.motion == Motion::Running)
    }

    pub fn motion(&self, entity: EntityId) -> Option<Motion> {
        self.chains.get(&entity).map(|chain| chain.motion)
    }

    pub fn chains_in_depot(&self, agent: AgentId, depot: Location) -> usize {
        self.chains
            .values()
            .filter(|chain| chain.owner == agent && chain.in_depot(depot))
            .count()
    }

    /// Advances world time, moves trains and resolves commands that are due.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
        for chain in self.chains.values_mut() {
            if let Motion::HeadingToDepot { remaining } = chain.motion {
                if remaining == 0 {
                    chain.motion = Motion::StoppedInDepot;
                    chain.location = chain.home_depot;
                } else {
                    chain.motion = Motion::HeadingToDepot {
                        remaining: remaining - 1,
                    };
                }
            }
        }

        while self
            .pending
            .front()
            .is_some_and(|pending| pending.due_tick <= self.tick)
        {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            let outcome = match self.take_rejection(&pending.command) {
                Some(reason) => CommandOutcome::rejected(reason),
                None => self.apply(pending.agent, &pending.command),
            };
            debug!(
                ticket = %pending.ticket,
                kind = %pending.command.kind(),
                succeeded = outcome.succeeded(),
                "sim_command_resolved"
            );
            self.resolved.push_back((pending.ticket, outcome));
        }
    }

    pub fn take_resolved(&mut self) -> Vec<(Ticket, CommandOutcome)> {
        self.resolved.drain(..).collect()
    }

    fn design(&self, id: DesignId) -> Option<&Design> {
        self.catalog
            .iter()
            .map(|(design, _)| design)
            .find(|design| design.id == id)
    }

    fn alloc_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn alloc_list(&mut self, instructions: Vec<Instruction>) -> u64 {
        let id = self.next_list;
        self.next_list += 1;
        self.lists.insert(id, instructions);
        id
    }

    fn insert_chain(&mut self, head: EntityId, chain: Chain) {
        for unit in &chain.units {
            self.head_by_unit.insert(unit.id, head);
        }
        self.chains.insert(head, chain);
    }

    fn take_rejection(&mut self, command: &Command) -> Option<String> {
        let kind = command.kind();
        let location = command.location();
        let rule = self.rejections.iter_mut().find(|rule| {
            rule.remaining > 0 && rule.kind == kind && rule.at.map_or(true, |at| at == location)
        })?;
        rule.remaining -= 1;
        Some(rule.reason.clone())
    }

    fn try_send(chain: &mut Chain) -> bool {
        if chain.unreachable_sends > 0 {
            chain.unreachable_sends -= 1;
            return false;
        }
        chain.motion = Motion::HeadingToDepot {
            remaining: chain.travel_ticks,
        };
        true
    }

    fn depot_accepts(&self, depot: Location, design: DesignId) -> bool {
        let (Some(infra), Some(design)) = (self.tiles.get(&depot), self.design(design)) else {
            return false;
        };
        self.depots.contains(&depot) && self.runs_on(design.variant, *infra)
    }

    fn apply(&mut self, agent: Option<AgentId>, command: &Command) -> CommandOutcome {
        let Some(agent) = agent else {
            return CommandOutcome::rejected("no company to act for");
        };
        match command {
            Command::SendAllToDepot { agent: owner } => {
                let mut failed = 0usize;
                for chain in self.chains.values_mut() {
                    if chain.owner == *owner
                        && chain.is_primary()
                        && chain.motion == Motion::Running
                        && !Self::try_send(chain)
                    {
                        failed += 1;
                    }
                }
                if failed > 0 {
                    CommandOutcome::rejected(format!("{failed} trains cannot find a depot"))
                } else {
                    CommandOutcome::success()
                }
            }
            Command::SendToDepot { entity, .. } => {
                let Some(chain) = self.chains.get_mut(entity) else {
                    return CommandOutcome::rejected("no such train");
                };
                match chain.motion {
                    Motion::StoppedInDepot => {
                        CommandOutcome::rejected("train is already stopped in a depot")
                    }
                    Motion::HeadingToDepot { .. } => CommandOutcome::success(),
                    Motion::Running => {
                        if Self::try_send(chain) {
                            CommandOutcome::success()
                        } else {
                            CommandOutcome::rejected("unable to find route to depot")
                        }
                    }
                }
            }
            Command::SellAllInDepot { depot, agent: owner } => {
                if !self.depots.contains(depot) {
                    return CommandOutcome::rejected("not a depot");
                }
                let sold: Vec<EntityId> = self
                    .chains
                    .iter()
                    .filter(|(_, chain)| chain.owner == *owner && chain.in_depot(*depot))
                    .map(|(head, _)| *head)
                    .collect();
                for head in sold {
                    self.remove_entity(head);
                }
                CommandOutcome::success()
            }
            Command::ConvertInfrastructure { region, variant } => {
                if self.variant_name(*variant).is_none() {
                    return CommandOutcome::rejected("unknown track type");
                }
                for (location, tile) in self.tiles.iter_mut() {
                    if region.contains(*location) {
                        *tile = *variant;
                    }
                }
                CommandOutcome::success()
            }
            Command::BuildUnit {
                depot,
                design,
                refit,
            } => self.build_unit(agent, *depot, *design, *refit),
            Command::CloneEntity {
                depot,
                source,
                share_instructions,
            } => self.clone_entity(agent, *depot, *source, *share_instructions),
            Command::AttachUnit { unit, after, .. } => self.attach_unit(*unit, *after),
            Command::ShareInstructions { entity, source, .. } => {
                let Some(list) = self.chains.get(source).map(|chain| chain.list) else {
                    return CommandOutcome::rejected("no such source train");
                };
                let Some(chain) = self.chains.get_mut(entity) else {
                    return CommandOutcome::rejected("no such train");
                };
                chain.list = list;
                chain.current = 0;
                CommandOutcome::success()
            }
            Command::DeleteInstruction { entity, index, .. } => {
                let Some(chain) = self.chains.get_mut(entity) else {
                    return CommandOutcome::rejected("no such train");
                };
                let Some(list) = self.lists.get_mut(&chain.list) else {
                    return CommandOutcome::rejected("no order list");
                };
                if *index >= list.len() {
                    return CommandOutcome::rejected("no such order");
                }
                list.remove(*index);
                if chain.current >= list.len() {
                    chain.current = 0;
                }
                CommandOutcome::success()
            }
            Command::InsertInstruction {
                entity,
                index,
                instruction,
                ..
            } => {
                let Some(chain) = self.chains.get(entity) else {
                    return CommandOutcome::rejected("no such train");
                };
                let Some(list) = self.lists.get_mut(&chain.list) else {
                    return CommandOutcome::rejected("no order list");
                };
                if *index > list.len() {
                    return CommandOutcome::rejected("order index out of range");
                }
                list.insert(*index, *instruction);
                CommandOutcome::success()
            }
            Command::SkipToInstruction { entity, index, .. } => {
                let Some(chain) = self.chains.get_mut(entity) else {
                    return CommandOutcome::rejected("no such train");
                };
                let len = self.lists.get(&chain.list).map_or(0, Vec::len);
                if *index >= len {
                    return CommandOutcome::rejected("order index out of range");
                }
                chain.current = *index;
                CommandOutcome::success()
            }
            Command::StartAll { agent: owner } => {
                for chain in self.chains.values_mut() {
                    if chain.owner == *owner && chain.is_primary() {
                        chain.motion = Motion::Running;
                    }
                }
                CommandOutcome::success()
            }
        }
    }

    fn build_unit(
        &mut self,
        agent: AgentId,
        depot: Location,
        design_id: DesignId,
        refit: Option<CargoId>,
    ) -> CommandOutcome {
        if !self.is_buildable(design_id, agent) {
            return CommandOutcome::rejected("vehicle is not available");
        }
        if !self.depot_accepts(depot, design_id) {
            return CommandOutcome::rejected("depot has incompatible track");
        }
        let Some(design) = self.design(design_id).cloned() else {
            return CommandOutcome::rejected("vehicle is not available");
        };
        if let Some(cargo) = refit {
            if !design.can_refit_to(cargo) {
                return CommandOutcome::rejected("vehicle cannot be refitted");
            }
        }
        let role = if design.is_traction() {
            UnitRole::Traction
        } else {
            match refit.or_else(|| design.refittable.first().copied()) {
                Some(cargo) => UnitRole::Cargo(cargo),
                None => return CommandOutcome::rejected("wagon carries no cargo"),
            }
        };

        let unit = Unit {
            id: self.alloc_entity(),
            design: design_id,
            role,
        };
        let unit_id = unit.id;
        if role != UnitRole::Traction && self.auto_attach {
            let target = self
                .last_built_head
                .get(&depot)
                .copied()
                .filter(|head| {
                    self.chains
                        .get(head)
                        .is_some_and(|chain| chain.owner == agent && chain.in_depot(depot))
                });
            if let Some(head) = target {
                if let Some(chain) = self.chains.get_mut(&head) {
                    chain.units.push(unit);
                    self.head_by_unit.insert(unit_id, head);
                    return CommandOutcome::created(unit_id);
                }
            }
        }

        let list = self.alloc_list(Vec::new());
        self.insert_chain(
            unit_id,
            Chain {
                owner: agent,
                units: vec![unit],
                location: depot,
                home_depot: depot,
                motion: Motion::StoppedInDepot,
                list,
                current: 0,
                travel_ticks: 0,
                unreachable_sends: 0,
            },
        );
        if role == UnitRole::Traction {
            self.last_built_head.insert(depot, unit_id);
        }
        CommandOutcome::created(unit_id)
    }

    fn clone_entity(
        &mut self,
        agent: AgentId,
        depot: Location,
        source: EntityId,
        share_instructions: bool,
    ) -> CommandOutcome {
        let Some(template) = self.chains.get(&source).cloned() else {
            return CommandOutcome::rejected("no such train to clone");
        };
        for unit in &template.units {
            if !self.is_buildable(unit.design, agent) {
                return CommandOutcome::rejected("vehicle is not available");
            }
            if !self.depot_accepts(depot, unit.design) {
                return CommandOutcome::rejected("depot has incompatible track");
            }
        }

        let units: Vec<Unit> = template
            .units
            .iter()
            .map(|unit| Unit {
                id: self.alloc_entity(),
                design: unit.design,
                role: unit.role,
            })
            .collect();
        let head = units[0].id;
        let list = if share_instructions {
            template.list
        } else {
            let copied = self.lists.get(&template.list).cloned().unwrap_or_default();
            self.alloc_list(copied)
        };
        self.insert_chain(
            head,
            Chain {
                owner: agent,
                units,
                location: depot,
                home_depot: depot,
                motion: Motion::StoppedInDepot,
                list,
                current: 0,
                travel_ticks: 0,
                unreachable_sends: 0,
            },
        );
        CommandOutcome::created(head)
    }

    fn attach_unit(&mut self, unit: EntityId, after: EntityId) -> CommandOutcome {
        let (Some(unit_head), Some(after_head)) = (
            self.head_by_unit.get(&unit).copied(),
            self.head_by_unit.get(&after).copied(),
        ) else {
            return CommandOutcome::rejected("no such vehicle");
        };
        if unit_head != unit {
            return CommandOutcome::rejected("vehicle is not the front of its chain");
        }
        if unit_head == after_head {
            return CommandOutcome::rejected("vehicle is already in this train");
        }
        let is_tail = self
            .chains
            .get(&after_head)
            .and_then(|chain| chain.units.last())
            .is_some_and(|tail| tail.id == after);
        if !is_tail {
            return CommandOutcome::rejected("can only attach behind the last vehicle");
        }
        let Some(moved) = self.chains.remove(&unit_head) else {
            return CommandOutcome::rejected("no such vehicle");
        };
        for moved_unit in &moved.units {
            self.head_by_unit.insert(moved_unit.id, after_head);
        }
        if let Some(chain) = self.chains.get_mut(&after_head) {
            chain.units.extend(moved.units);
        }
        CommandOutcome::success()
    }
}

impl WorldView for SimWorld {
    fn controlling_agent(&self) -> Option<AgentId> {
        self.controlling_agent
    }

    fn resolve_variant(&self, name: &str) -> Option<VariantId> {
        self.variant_names
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .and_then(|index| u8::try_from(index).ok())
            .map(VariantId)
    }

    fn owned_entities(&self, agent: AgentId) -> Vec<EntityId> {
        self.chains
            .iter()
            .filter(|(_, chain)| chain.owner == agent && chain.is_primary())
            .map(|(head, _)| *head)
            .collect()
    }

    fn is_stopped_in_depot(&self, entity: EntityId) -> Option<bool> {
        self.chains
            .get(&entity)
            .map(|chain| chain.motion == Motion::StoppedInDepot)
    }

    fn is_heading_to_depot(&self, entity: EntityId) -> Option<bool> {
        self.chains
            .get(&entity)
            .map(|chain| matches!(chain.motion, Motion::HeadingToDepot { .. }))
    }

    fn location(&self, entity: EntityId) -> Option<Location> {
        self.chains.get(&entity).map(|chain| chain.location)
    }

    fn shared_group(&self, entity: EntityId) -> Option<EntityId> {
        let list = self.chains.get(&entity)?.list;
        self.chains
            .iter()
            .find(|(_, chain)| chain.list == list)
            .map(|(head, _)| *head)
    }

    fn instructions(&self, entity: EntityId) -> Option<Vec<Instruction>> {
        let chain = self.chains.get(&entity)?;
        Some(self.lists.get(&chain.list).cloned().unwrap_or_default())
    }

    fn current_instruction(&self, entity: EntityId) -> Option<usize> {
        self.chains.get(&entity).map(|chain| chain.current)
    }

    fn unit_roles(&self, entity: EntityId) -> Option<Vec<UnitRole>> {
        self.chains
            .get(&entity)
            .map(|chain| chain.units.iter().map(|unit| unit.role).collect())
    }

    fn chain_head(&self, unit: EntityId) -> Option<EntityId> {
        self.head_by_unit.get(&unit).copied()
    }

    fn chain_tail(&self, head: EntityId) -> Option<EntityId> {
        self.chains
            .get(&head)
            .and_then(|chain| chain.units.last())
            .map(|unit| unit.id)
    }

    fn infrastructure_at(&self, location: Location) -> Option<VariantId> {
        self.tiles.get(&location).copied()
    }

    fn addressable_region(&self) -> Region {
        self.region
    }

    fn catalog(&self) -> Vec<Design> {
        self.catalog.iter().map(|(design, _)| design.clone()).collect()
    }

    fn is_buildable(&self, design: DesignId, agent: AgentId) -> bool {
        self.catalog
            .iter()
            .find(|(candidate, _)| candidate.id == design)
            .is_some_and(|(_, available_to)| {
                available_to
                    .as_ref()
                    .map_or(true, |agents| agents.contains(&agent))
            })
    }

    fn runs_on(&self, design_variant: VariantId, target: VariantId) -> bool {
        design_variant == target || self.compatible.contains(&(design_variant, target))
    }
}

impl CommandGateway for SimWorld {
    fn submit(&mut self, command: &Command) -> Result<Ticket, TransportRejected> {
        if self.transport_down {
            return Err(TransportRejected);
        }
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.submitted.push(command.clone());
        self.pending.push_back(PendingCommand {
            ticket,
            due_tick: self.tick + self.latency_ticks,
            agent: self.controlling_agent,
            command: command.clone(),
        });
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: AgentId = AgentId(1);
    const DEPOT: Location = Location { x: 2, y: 2 };

    fn resolve_all(world: &mut SimWorld) -> Vec<(Ticket, CommandOutcome)> {
        let mut out = Vec::new();
        for _ in 0..4 {
            world.advance_tick();
            out.extend(world.take_resolved());
        }
        out
    }

    #[test]
    fn commands_resolve_after_latency_not_on_submit() {
        let mut world = SimWorld::standard_test_world();
        world.set_latency(3);
        let train = world
            .spawn_train(TrainSpec::running(AGENT, DEPOT, &[1]).with_travel_ticks(5))
            .expect("train");
        let ticket = world
            .submit(&Command::SendToDepot {
                entity: train,
                at: DEPOT,
            })
            .expect("accepted");
        assert_eq!(world.is_heading_to_depot(train), Some(false));

        world.advance_tick();
        world.advance_tick();
        assert!(world.take_resolved().is_empty());
        world.advance_tick();
        assert_eq!(
            world.take_resolved(),
            vec![(ticket, CommandOutcome::success())]
        );
        assert_eq!(world.is_heading_to_depot(train), Some(true));
    }

    #[test]
    fn heading_train_stops_in_its_depot_after_travel() {
        let mut world = SimWorld::standard_test_world();
        let train = world
            .spawn_train(
                TrainSpec::running(AGENT, DEPOT, &[1])
                    .with_state(InitialState::HeadingToDepot)
                    .with_travel_ticks(2),
            )
            .expect("train");
        for _ in 0..3 {
            world.advance_tick();
        }
        assert_eq!(world.is_stopped_in_depot(train), Some(true));
        assert_eq!(world.location(train), Some(DEPOT));
    }

    #[test]
    fn built_wagon_auto_attaches_to_last_engine_in_depot() {
        let mut world = SimWorld::standard_test_world();
        world
            .submit(&Command::BuildUnit {
                depot: DEPOT,
                design: DesignId(1),
                refit: None,
            })
            .expect("engine");
        world
            .submit(&Command::BuildUnit {
                depot: DEPOT,
                design: DesignId(10),
                refit: Some(CargoId(0)),
            })
            .expect("wagon");
        let resolved = resolve_all(&mut world);
        let engine = resolved[0].1.created_entity().expect("engine id");
        let wagon = resolved[1].1.created_entity().expect("wagon id");
        assert_eq!(world.chain_head(wagon), Some(engine));
        assert_eq!(world.chain_tail(engine), Some(wagon));
        assert_eq!(
            world.unit_roles(engine),
            Some(vec![UnitRole::Traction, UnitRole::Cargo(CargoId(0))])
        );
    }

    #[test]
    fn detached_wagon_can_be_attached_behind_tail() {
        let mut world = SimWorld::standard_test_world();
        world.set_auto_attach(false);
        world
            .submit(&Command::BuildUnit {
                depot: DEPOT,
                design: DesignId(1),
                refit: None,
            })
            .expect("engine");
        world
            .submit(&Command::BuildUnit {
                depot: DEPOT,
                design: DesignId(10),
                refit: None,
            })
            .expect("wagon");
        let resolved = resolve_all(&mut world);
        let engine = resolved[0].1.created_entity().expect("engine id");
        let wagon = resolved[1].1.created_entity().expect("wagon id");
        assert_eq!(world.chain_head(wagon), Some(wagon));

        world
            .submit(&Command::AttachUnit {
                depot: DEPOT,
                unit: wagon,
                after: engine,
            })
            .expect("attach");
        let resolved = resolve_all(&mut world);
        assert!(resolved[0].1.succeeded());
        assert_eq!(world.chain_head(wagon), Some(engine));
        assert_eq!(world.owned_entities(AGENT), vec![engine]);
    }

    #[test]
    fn clone_without_share_copies_list_and_with_share_joins_group() {
        let mut world = SimWorld::standard_test_world();
        let source = world
            .spawn_train(
                TrainSpec::in_depot(AGENT, DEPOT, &[1])
                    .with_instructions(vec![Instruction::Other(4), Instruction::Other(5)]),
            )
            .expect("source");
        world
            .submit(&Command::CloneEntity {
                depot: DEPOT,
                source,
                share_instructions: false,
            })
            .expect("copy");
        world
            .submit(&Command::CloneEntity {
                depot: DEPOT,
                source,
                share_instructions: true,
            })
            .expect("share");
        let resolved = resolve_all(&mut world);
        let copy = resolved[0].1.created_entity().expect("copy id");
        let shared = resolved[1].1.created_entity().expect("shared id");

        assert_eq!(world.instructions(copy), world.instructions(source));
        assert_eq!(world.shared_group(copy), Some(copy));
        assert_eq!(world.shared_group(shared), Some(source));
    }

    #[test]
    fn scripted_rejection_applies_only_to_matching_location() {
        let mut world = SimWorld::standard_test_world();
        let other_depot = Location::new(6, 2);
        world.reject_next(CommandKind::SellAllInDepot, Some(other_depot), 1, "sale blocked");
        world
            .spawn_train(TrainSpec::in_depot(AGENT, DEPOT, &[1]))
            .expect("train");
        world
            .submit(&Command::SellAllInDepot {
                depot: DEPOT,
                agent: AGENT,
            })
            .expect("sell a");
        world
            .submit(&Command::SellAllInDepot {
                depot: other_depot,
                agent: AGENT,
            })
            .expect("sell b");
        let resolved = resolve_all(&mut world);
        assert!(resolved[0].1.succeeded());
        assert_eq!(resolved[1].1, CommandOutcome::rejected("sale blocked"));
        assert!(world.owned_entities(AGENT).is_empty());
    }

    #[test]
    fn transport_down_rejects_submission() {
        let mut world = SimWorld::standard_test_world();
        world.set_transport_down(true);
        assert_eq!(
            world.submit(&Command::StartAll { agent: AGENT }),
            Err(TransportRejected)
        );
        assert!(world.submitted_commands().is_empty());
    }

    #[test]
    fn electric_engine_cannot_be_built_in_rail_depot() {
        let mut world = SimWorld::standard_test_world();
        world
            .submit(&Command::BuildUnit {
                depot: DEPOT,
                design: DesignId(2),
                refit: None,
            })
            .expect("submit");
        let resolved = resolve_all(&mut world);
        assert_eq!(
            resolved[0].1,
            CommandOutcome::rejected("depot has incompatible track")
        );
    }
}
