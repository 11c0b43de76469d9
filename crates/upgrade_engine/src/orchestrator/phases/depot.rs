use tracing::{debug, warn};

use crate::world::{Command, EntityId};

use super::{expect_elapsed, expect_outcome, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed, Step};

type DepotProgress = Result<Progress<Vec<EntityId>>, Bailout>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    AwaitMassDispatch,
    Settling,
    AwaitSend,
    AfterSend,
    PassCooldown,
    Polling,
}

/// Gets every owned vehicle stopped in a depot.
///
/// One fleet-wide dispatch, then repeated individual passes until a pass has
/// no rejected sends, then polling until everything reports stopped.
pub(crate) struct DepotPhase {
    stage: Stage,
    entities: Vec<EntityId>,
    cursor: usize,
    failed: usize,
    any_sent: bool,
    passes: u32,
    last_remaining: usize,
}

impl DepotPhase {
    pub fn new() -> Self {
        Self {
            stage: Stage::Start,
            entities: Vec::new(),
            cursor: 0,
            failed: 0,
            any_sent: false,
            passes: 0,
            last_remaining: 0,
        }
    }

    pub fn resume(&mut self, ctx: &mut PhaseCtx<'_>, input: Resumed) -> DepotProgress {
        match self.stage {
            Stage::Start => {
                ctx.diagnostics.info("Issuing orders for all vehicles to go to depot...");
                self.stage = Stage::AwaitMassDispatch;
                Ok(Progress::Yield(Step::Submit(Command::SendAllToDepot {
                    agent: ctx.agent,
                })))
            }
            Stage::AwaitMassDispatch => {
                let outcome = expect_outcome(input)?;
                if outcome.succeeded() {
                    ctx.diagnostics.info("Mass go-to-depot order sent.");
                } else {
                    warn!(agent = %ctx.agent, "mass_depot_dispatch_rejected");
                    ctx.diagnostics.warning(
                        "Failed to send all vehicles to depot, but we will carry on anyway.",
                    );
                }
                self.stage = Stage::Settling;
                Ok(Progress::Yield(ctx.settle()))
            }
            Stage::Settling => {
                expect_elapsed(input)?;
                self.entities = ctx.world.owned_entities(ctx.agent);
                ctx.diagnostics.info("Issuing orders for remaining vehicles to go to depot...");
                self.begin_pass();
                self.continue_pass(ctx)
            }
            Stage::AwaitSend => {
                if expect_outcome(input)?.succeeded() {
                    self.any_sent = true;
                    self.stage = Stage::AfterSend;
                    return Ok(Progress::Yield(ctx.settle()));
                }
                self.failed += 1;
                self.continue_pass(ctx)
            }
            Stage::AfterSend => {
                expect_elapsed(input)?;
                self.continue_pass(ctx)
            }
            Stage::PassCooldown => {
                expect_elapsed(input)?;
                self.begin_pass();
                self.continue_pass(ctx)
            }
            Stage::Polling => {
                expect_elapsed(input)?;
                self.poll(ctx)
            }
        }
    }

    fn begin_pass(&mut self) {
        self.cursor = 0;
        self.failed = 0;
        self.any_sent = false;
    }

    fn continue_pass(&mut self, ctx: &mut PhaseCtx<'_>) -> DepotProgress {
        while let Some(&entity) = self.entities.get(self.cursor) {
            self.cursor += 1;
            if ctx.is_stopped_in_depot(entity)? {
                continue;
            }
            let heading = ctx
                .world
                .is_heading_to_depot(entity)
                .ok_or(Bailout::EntityVanished(entity))?;
            if heading {
                continue;
            }
            self.stage = Stage::AwaitSend;
            return Ok(Progress::Yield(Step::Submit(Command::SendToDepot {
                entity,
                at: ctx.location(entity)?,
            })));
        }
        self.finish_pass(ctx)
    }

    fn finish_pass(&mut self, ctx: &mut PhaseCtx<'_>) -> DepotProgress {
        self.passes += 1;
        debug!(pass = self.passes, failed = self.failed, "depot_pass_finished");
        if self.failed == 0 {
            ctx.diagnostics.info("Done issuing all orders to go to depot.");
            ctx.diagnostics.info("Waiting for all vehicles to stop in depot...");
            self.last_remaining = self.entities.len();
            return self.poll(ctx);
        }

        if let Some(cap) = ctx.config.max_depot_retry_passes {
            if self.passes >= cap {
                return Err(Bailout::RetryLimit {
                    passes: self.passes,
                });
            }
        }
        if self.any_sent {
            ctx.diagnostics.info(format_args!(
                "Still have not ordered {} vehicles to go to depot...",
                self.failed
            ));
        }
        self.stage = Stage::PassCooldown;
        Ok(Progress::Yield(ctx.settle()))
    }

    fn poll(&mut self, ctx: &mut PhaseCtx<'_>) -> DepotProgress {
        let mut remaining = 0;
        for &entity in &self.entities {
            if !ctx.is_stopped_in_depot(entity)? {
                remaining += 1;
            }
        }
        if remaining == 0 {
            ctx.diagnostics.info("All vehicles are now stopped in depot.");
            return Ok(Progress::Done(std::mem::take(&mut self.entities)));
        }
        if remaining != self.last_remaining {
            ctx.diagnostics.info(format_args!(
                "Waiting for {remaining} more vehicles to stop in depot..."
            ));
            self.last_remaining = remaining;
        }
        self.stage = Stage::Polling;
        Ok(Progress::Yield(ctx.settle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::phases::testing::Harness;
    use crate::sim::{InitialState, SimWorld, TrainSpec};
    use crate::world::{AgentId, CommandOutcome, Location, VariantId};

    const AGENT: AgentId = AgentId(1);
    const DEPOT: Location = Location { x: 2, y: 2 };

    fn drive_to_first_pass(phase: &mut DepotPhase, harness: &mut Harness, world: &SimWorld) {
        let mut ctx = harness.ctx(world);
        let first = phase.resume(&mut ctx, Resumed::Start).expect("start");
        assert!(matches!(
            first,
            Progress::Yield(Step::Submit(Command::SendAllToDepot { .. }))
        ));
        let settle = phase
            .resume(&mut ctx, Resumed::Command(CommandOutcome::success()))
            .expect("dispatch");
        assert!(matches!(settle, Progress::Yield(Step::Wait(2))));
    }

    #[test]
    fn pass_over_stopped_and_heading_fleet_submits_nothing() {
        let mut world = SimWorld::standard_test_world();
        world
            .spawn_train(TrainSpec::in_depot(AGENT, DEPOT, &[1]))
            .expect("stopped");
        world
            .spawn_train(
                TrainSpec::running(AGENT, DEPOT, &[1])
                    .with_state(InitialState::HeadingToDepot)
                    .with_travel_ticks(10),
            )
            .expect("heading");
        let mut harness = Harness::new(VariantId(1));
        let mut phase = DepotPhase::new();
        drive_to_first_pass(&mut phase, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        let next = phase.resume(&mut ctx, Resumed::Elapsed).expect("pass");
        assert!(matches!(next, Progress::Yield(Step::Wait(2))));
        assert_eq!(phase.passes, 1);
        assert_eq!(phase.stage, Stage::Polling);

        let messages = harness.messages();
        assert!(messages
            .iter()
            .any(|line| line.ends_with("Done issuing all orders to go to depot.")));
        assert!(messages
            .iter()
            .any(|line| line.ends_with("Waiting for 1 more vehicles to stop in depot...")));
    }

    #[test]
    fn rejected_send_repeats_the_pass_after_cooldown() {
        let mut world = SimWorld::standard_test_world();
        let lost = world
            .spawn_train(TrainSpec::running(AGENT, DEPOT, &[1]))
            .expect("running");
        let mut harness = Harness::new(VariantId(1));
        let mut phase = DepotPhase::new();
        drive_to_first_pass(&mut phase, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        let send = phase.resume(&mut ctx, Resumed::Elapsed).expect("pass");
        let Progress::Yield(Step::Submit(Command::SendToDepot { entity, .. })) = send else {
            panic!("expected individual send");
        };
        assert_eq!(entity, lost);

        let cooldown = phase
            .resume(&mut ctx, Resumed::Command(CommandOutcome::rejected("no route")))
            .expect("rejected");
        assert!(matches!(cooldown, Progress::Yield(Step::Wait(2))));
        assert_eq!(phase.stage, Stage::PassCooldown);

        let retry = phase.resume(&mut ctx, Resumed::Elapsed).expect("retry");
        assert!(matches!(
            retry,
            Progress::Yield(Step::Submit(Command::SendToDepot { .. }))
        ));
        let messages = harness.messages();
        assert!(!messages.iter().any(|line| line.contains("Still have not ordered")));
    }

    #[test]
    fn retry_cap_turns_endless_rejections_into_a_bailout() {
        let mut world = SimWorld::standard_test_world();
        world
            .spawn_train(TrainSpec::running(AGENT, DEPOT, &[1]))
            .expect("running");
        let mut harness = Harness::new(VariantId(1));
        harness.config.max_depot_retry_passes = Some(1);
        let mut phase = DepotPhase::new();
        drive_to_first_pass(&mut phase, &mut harness, &world);

        let mut ctx = harness.ctx(&world);
        phase.resume(&mut ctx, Resumed::Elapsed).expect("pass");
        let result = phase.resume(&mut ctx, Resumed::Command(CommandOutcome::rejected("no route")));
        assert_eq!(result.err(), Some(Bailout::RetryLimit { passes: 1 }));
    }

    #[test]
    fn vanished_entity_is_fatal() {
        let mut world = SimWorld::standard_test_world();
        let doomed = world
            .spawn_train(TrainSpec::running(AGENT, DEPOT, &[1]))
            .expect("running");
        let mut harness = Harness::new(VariantId(1));
        let mut phase = DepotPhase::new();
        drive_to_first_pass(&mut phase, &mut harness, &world);
        {
            let mut ctx = harness.ctx(&world);
            phase.resume(&mut ctx, Resumed::Elapsed).expect("pass");
            phase
                .resume(&mut ctx, Resumed::Command(CommandOutcome::rejected("no route")))
                .expect("cooldown");
        }

        world.remove_entity(doomed);
        let mut ctx = harness.ctx(&world);
        let result = phase.resume(&mut ctx, Resumed::Elapsed);
        assert_eq!(result.err(), Some(Bailout::EntityVanished(doomed)));
    }
}
