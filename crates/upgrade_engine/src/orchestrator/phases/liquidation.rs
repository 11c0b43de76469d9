use crate::fleet::FleetSnapshot;
use crate::world::{Command, CommandOutcome};

use super::{expect_elapsed, expect_outcome, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed, Step};

enum Stage {
    Start,
    AwaitSale,
    AfterSale,
    AfterAllSold,
}

/// Sells everything parked in each captured depot, one depot at a time.
///
/// A failed sale aborts the run; depots already emptied stay emptied.
pub(crate) struct LiquidationPhase {
    stage: Stage,
    fleet: FleetSnapshot,
    next_depot: usize,
}

impl LiquidationPhase {
    pub fn new(fleet: FleetSnapshot) -> Self {
        Self {
            stage: Stage::Start,
            fleet,
            next_depot: 0,
        }
    }

    pub fn resume(
        &mut self,
        ctx: &mut PhaseCtx<'_>,
        input: Resumed,
    ) -> Result<Progress<FleetSnapshot>, Bailout> {
        match self.stage {
            Stage::Start => {
                ctx.diagnostics.info("Selling all vehicles...");
                Ok(self.sell_next(ctx))
            }
            Stage::AwaitSale => {
                let depot = self.fleet.depots[self.next_depot];
                if let CommandOutcome::Failure(reason) = expect_outcome(input)? {
                    return Err(Bailout::LiquidationFailed { depot, reason });
                }
                self.next_depot += 1;
                self.stage = Stage::AfterSale;
                Ok(Progress::Yield(ctx.settle()))
            }
            Stage::AfterSale => {
                expect_elapsed(input)?;
                Ok(self.sell_next(ctx))
            }
            Stage::AfterAllSold => {
                expect_elapsed(input)?;
                Ok(Progress::Done(std::mem::take(&mut self.fleet)))
            }
        }
    }

    fn sell_next(&mut self, ctx: &mut PhaseCtx<'_>) -> Progress<FleetSnapshot> {
        match self.fleet.depots.get(self.next_depot) {
            Some(&depot) => {
                self.stage = Stage::AwaitSale;
                Progress::Yield(Step::Submit(Command::SellAllInDepot {
                    depot,
                    agent: ctx.agent,
                }))
            }
            None => {
                ctx.diagnostics.info("All vehicles have been sold.");
                self.stage = Stage::AfterAllSold;
                Progress::Yield(ctx.settle())
            }
        }
    }
}
