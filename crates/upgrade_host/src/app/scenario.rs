use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use upgrade_engine::sim::{InitialState, SimWorld, TrainSpec, UnitSpec};
use upgrade_engine::world::{
    AgentId, CargoId, CommandKind, Design, DesignId, EntityId, Instruction, Location, Region,
    VariantId,
};

use super::HostError;

/// Headless run description: a world to simulate plus timed console input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) world: WorldDef,
    #[serde(default)]
    pub(crate) script: Vec<ScriptLine>,
    #[serde(default)]
    pub(crate) agent_changes: Vec<AgentChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptLine {
    pub(crate) tick: u64,
    pub(crate) line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AgentChange {
    pub(crate) tick: u64,
    pub(crate) agent: Option<AgentId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WorldDef {
    variants: Vec<String>,
    #[serde(default)]
    compatible: Vec<(VariantId, VariantId)>,
    region: Region,
    agent: Option<AgentId>,
    #[serde(default)]
    tiles: Vec<TileDef>,
    depots: Vec<TileDef>,
    designs: Vec<DesignDef>,
    trains: Vec<TrainDef>,
    #[serde(default)]
    latency_ticks: Option<u64>,
    #[serde(default = "default_auto_attach")]
    auto_attach: bool,
    #[serde(default)]
    rejections: Vec<RejectionDef>,
}

fn default_auto_attach() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
struct TileDef {
    at: Location,
    variant: VariantId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DesignDef {
    id: DesignId,
    variant: VariantId,
    top_speed: u32,
    power: u32,
    cost: u64,
    #[serde(default)]
    refittable: Vec<CargoId>,
    #[serde(default)]
    available_to: Option<Vec<AgentId>>,
}

impl DesignDef {
    fn design(&self) -> Design {
        Design {
            id: self.id,
            variant: self.variant,
            top_speed: self.top_speed,
            power: self.power,
            cost: self.cost,
            refittable: self.refittable.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TrainState {
    InDepot,
    Running,
    HeadingToDepot,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitDef {
    design: DesignId,
    #[serde(default)]
    cargo: Option<CargoId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrainDef {
    owner: AgentId,
    depot: Location,
    units: Vec<UnitDef>,
    #[serde(default)]
    instructions: Vec<Instruction>,
    /// Index of an earlier train whose instruction list this one shares.
    #[serde(default)]
    shares_with: Option<usize>,
    #[serde(default = "default_train_state")]
    state: TrainState,
    #[serde(default)]
    travel_ticks: u32,
    #[serde(default)]
    unreachable_sends: u32,
}

fn default_train_state() -> TrainState {
    TrainState::InDepot
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RejectionDef {
    kind: String,
    #[serde(default)]
    at: Option<Location>,
    #[serde(default = "default_rejection_count")]
    count: u32,
    reason: String,
}

fn default_rejection_count() -> u32 {
    1
}

pub(crate) fn load_scenario(path: &Path) -> Result<Scenario, HostError> {
    let raw = fs::read_to_string(path).map_err(|source| HostError::ReadScenario {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scenario(&raw)
}

pub(crate) fn parse_scenario(raw: &str) -> Result<Scenario, HostError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        HostError::ParseScenario {
            at,
            source: error.into_inner(),
        }
    })
}

impl WorldDef {
    /// Builds the simulated world; trains spawn in file order.
    pub(crate) fn build(&self) -> Result<SimWorld, HostError> {
        if self.variants.is_empty() {
            return Err(HostError::InvalidScenario(
                "world.variants must name at least one track type".to_string(),
            ));
        }
        let mut world = SimWorld::new(self.variants.clone(), self.region, self.agent);
        for (design_variant, target) in &self.compatible {
            world.allow_running_on(*design_variant, *target);
        }
        for tile in &self.tiles {
            world.set_tile(tile.at, tile.variant);
        }
        for depot in &self.depots {
            world.add_depot(depot.at, depot.variant);
        }
        for def in &self.designs {
            world.add_design(def.design(), def.available_to.clone());
        }
        if let Some(latency) = self.latency_ticks {
            world.set_latency(latency);
        }
        world.set_auto_attach(self.auto_attach);
        for (index, rule) in self.rejections.iter().enumerate() {
            let kind = CommandKind::parse(&rule.kind).ok_or_else(|| {
                HostError::InvalidScenario(format!(
                    "world.rejections[{index}].kind: unknown command kind '{}'",
                    rule.kind
                ))
            })?;
            world.reject_next(kind, rule.at, rule.count, rule.reason.clone());
        }

        let mut spawned: BTreeMap<usize, EntityId> = BTreeMap::new();
        for (index, def) in self.trains.iter().enumerate() {
            let shares_with = match def.shares_with {
                Some(other) => Some(spawned.get(&other).copied().ok_or_else(|| {
                    HostError::InvalidScenario(format!(
                        "world.trains[{index}].shares_with: train {other} is not defined before it"
                    ))
                })?),
                None => None,
            };
            let spec = TrainSpec {
                owner: def.owner,
                depot: def.depot,
                units: def
                    .units
                    .iter()
                    .map(|unit| UnitSpec {
                        design: unit.design,
                        cargo: unit.cargo,
                    })
                    .collect(),
                instructions: def.instructions.clone(),
                shares_with,
                state: match def.state {
                    TrainState::InDepot => InitialState::InDepot,
                    TrainState::Running => InitialState::Running,
                    TrainState::HeadingToDepot => InitialState::HeadingToDepot,
                },
                travel_ticks: def.travel_ticks,
                unreachable_sends: def.unreachable_sends,
            };
            let head = world
                .spawn_train(spec)
                .map_err(|source| HostError::Train { index, source })?;
            spawned.insert(index, head);
        }
        Ok(world)
    }
}
