use tracing::info;

use crate::fleet::{capture_fleet, FleetSnapshot};
use crate::world::EntityId;

use super::{expect_elapsed, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed};

enum Stage {
    Start,
    BeforeCapture,
    AfterCapture,
}

/// Records routes and compositions once every vehicle is parked.
pub(crate) struct CapturePhase {
    stage: Stage,
    entities: Vec<EntityId>,
    fleet: FleetSnapshot,
}

impl CapturePhase {
    pub fn new(entities: Vec<EntityId>) -> Self {
        Self {
            stage: Stage::Start,
            entities,
            fleet: FleetSnapshot::default(),
        }
    }

    pub fn resume(
        &mut self,
        ctx: &mut PhaseCtx<'_>,
        input: Resumed,
    ) -> Result<Progress<FleetSnapshot>, Bailout> {
        match self.stage {
            Stage::Start => {
                self.stage = Stage::BeforeCapture;
                Ok(Progress::Yield(ctx.settle()))
            }
            Stage::BeforeCapture => {
                expect_elapsed(input)?;
                self.fleet = capture_fleet(ctx.world, &self.entities)?;
                info!(
                    routes = self.fleet.routes.len(),
                    entities = self.fleet.entities.len(),
                    depots = self.fleet.depots.len(),
                    "fleet_captured"
                );
                ctx.diagnostics.info("Saved instruction lists.");
                self.stage = Stage::AfterCapture;
                Ok(Progress::Yield(ctx.settle()))
            }
            Stage::AfterCapture => {
                expect_elapsed(input)?;
                Ok(Progress::Done(std::mem::take(&mut self.fleet)))
            }
        }
    }
}
