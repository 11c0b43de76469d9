mod world;

pub use world::{InitialState, Motion, SimError, SimWorld, TrainSpec, UnitSpec};

use tracing::warn;

use crate::orchestrator::Orchestrator;

/// One fixed step: world time, then resolved commands, then the orchestrator tick.
pub fn step(world: &mut SimWorld, orchestrator: &mut Orchestrator) {
    world.advance_tick();
    for (ticket, outcome) in world.take_resolved() {
        if let Err(error) = orchestrator.deliver(world, ticket, outcome) {
            warn!(ticket = %ticket, error = %error, "sim_delivery_dropped");
        }
    }
    orchestrator.on_tick(world);
}
