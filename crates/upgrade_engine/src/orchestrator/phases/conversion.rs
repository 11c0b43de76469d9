use tracing::info;

use crate::fleet::FleetSnapshot;
use crate::world::{Command, CommandOutcome};

use super::{expect_elapsed, expect_outcome, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed, Step};

enum Stage {
    Start,
    AwaitConversion,
    AfterConversion,
}

pub(crate) struct ConversionPhase {
    stage: Stage,
    fleet: FleetSnapshot,
}

impl ConversionPhase {
    pub fn new(fleet: FleetSnapshot) -> Self {
        Self {
            stage: Stage::Start,
            fleet,
        }
    }

    pub fn resume(
        &mut self,
        ctx: &mut PhaseCtx<'_>,
        input: Resumed,
    ) -> Result<Progress<FleetSnapshot>, Bailout> {
        match self.stage {
            Stage::Start => {
                let region = ctx.world.addressable_region();
                info!(
                    target_variant = %ctx.target,
                    from = %region.from,
                    to = %region.to,
                    "conversion_requested"
                );
                self.stage = Stage::AwaitConversion;
                Ok(Progress::Yield(Step::Submit(Command::ConvertInfrastructure {
                    region,
                    variant: ctx.target,
                })))
            }
            Stage::AwaitConversion => {
                if let CommandOutcome::Failure(reason) = expect_outcome(input)? {
                    return Err(Bailout::ConversionFailed { reason });
                }
                ctx.diagnostics.info("Infrastructure has been converted.");
                self.stage = Stage::AfterConversion;
                Ok(Progress::Yield(ctx.settle()))
            }
            Stage::AfterConversion => {
                expect_elapsed(input)?;
                Ok(Progress::Done(std::mem::take(&mut self.fleet)))
            }
        }
    }
}
