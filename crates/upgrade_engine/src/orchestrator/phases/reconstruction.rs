use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::fleet::{
    resume_index_after, AcquisitionPlanner, CompositionSignature, EntitySnapshot, FleetSnapshot,
};
use crate::world::{Command, CommandKind, EntityId, Location};

use super::{created_entity, expect_elapsed, expect_outcome, require_success, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed, Step};

type RebuildProgress = Result<Progress<()>, Bailout>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    AwaitSharedClone,
    AfterSharedClone,
    AwaitCopy,
    AwaitBuild,
    AfterBuild,
    AwaitAttach,
    AfterAttach,
    AwaitShare,
    AfterShare,
    AwaitDelete,
    AwaitInsert,
    AfterInsert,
    AwaitSkip,
}

/// Rebuilds every captured vehicle in its old depot, in capture order.
///
/// Per vehicle the cheapest path wins: clone a same-route twin sharing its
/// instructions, copy a same-composition vehicle from another route, or build
/// unit by unit. Copies and builds then join the route's designation or become
/// it, and finally skip past the visit to the depot they were built in.
pub(crate) struct ReconstructionPhase {
    stage: Stage,
    fleet: FleetSnapshot,
    copy_sources: BTreeMap<CompositionSignature, EntityId>,
    index: usize,
    current: Option<EntityId>,
    head: Option<EntityId>,
    built_unit: Option<EntityId>,
    unit_cursor: usize,
    insert_cursor: usize,
}

impl ReconstructionPhase {
    pub fn new(fleet: FleetSnapshot) -> Self {
        Self {
            stage: Stage::Start,
            fleet,
            copy_sources: BTreeMap::new(),
            index: 0,
            current: None,
            head: None,
            built_unit: None,
            unit_cursor: 0,
            insert_cursor: 0,
        }
    }

    pub fn resume(&mut self, ctx: &mut PhaseCtx<'_>, input: Resumed) -> RebuildProgress {
        match self.stage {
            Stage::Start => {
                ctx.diagnostics.info("Buying new vehicles...");
                self.begin_entity(ctx)
            }
            Stage::AwaitSharedClone => {
                let entity = created_entity(
                    expect_outcome(input)?,
                    CommandKind::CloneEntity,
                    "clone vehicle to share instructions",
                )?;
                self.current = Some(entity);
                self.stage = Stage::AfterSharedClone;
                Ok(Progress::Yield(ctx.step_delay()))
            }
            Stage::AfterSharedClone => {
                expect_elapsed(input)?;
                self.skip_past_depot(ctx)
            }
            Stage::AwaitCopy => {
                let entity = created_entity(
                    expect_outcome(input)?,
                    CommandKind::CloneEntity,
                    "copy vehicle",
                )?;
                self.current = Some(entity);
                self.assign_instructions(ctx)
            }
            Stage::AwaitBuild => {
                let unit = created_entity(
                    expect_outcome(input)?,
                    CommandKind::BuildUnit,
                    "build engine or wagon",
                )?;
                self.built_unit = Some(unit);
                self.stage = Stage::AfterBuild;
                Ok(Progress::Yield(ctx.step_delay()))
            }
            Stage::AfterBuild => {
                expect_elapsed(input)?;
                self.place_built_unit(ctx)
            }
            Stage::AwaitAttach => {
                require_success(expect_outcome(input)?, "move wagon to train")?;
                self.stage = Stage::AfterAttach;
                Ok(Progress::Yield(ctx.step_delay()))
            }
            Stage::AfterAttach => {
                expect_elapsed(input)?;
                self.build_next_unit(ctx)
            }
            Stage::AwaitShare => {
                require_success(expect_outcome(input)?, "share instructions")?;
                self.stage = Stage::AfterShare;
                Ok(Progress::Yield(ctx.step_delay()))
            }
            Stage::AfterShare => {
                expect_elapsed(input)?;
                self.record_clone_source()?;
                self.skip_past_depot(ctx)
            }
            Stage::AwaitDelete => {
                require_success(expect_outcome(input)?, "delete instruction")?;
                self.delete_next_instruction(ctx)
            }
            Stage::AwaitInsert => {
                require_success(expect_outcome(input)?, "insert instruction")?;
                self.stage = Stage::AfterInsert;
                Ok(Progress::Yield(ctx.step_delay()))
            }
            Stage::AfterInsert => {
                expect_elapsed(input)?;
                self.insert_cursor += 1;
                self.insert_next_instruction(ctx)
            }
            Stage::AwaitSkip => {
                require_success(expect_outcome(input)?, "skip to instruction")?;
                self.index += 1;
                self.begin_entity(ctx)
            }
        }
    }

    fn snapshot(&self) -> &EntitySnapshot {
        &self.fleet.entities[self.index]
    }

    fn depot(&self) -> Location {
        self.snapshot().depot
    }

    fn current_entity(&self) -> Result<EntityId, Bailout> {
        self.current.ok_or(Bailout::OutOfSequence)
    }

    fn submit(&mut self, stage: Stage, command: Command) -> RebuildProgress {
        debug!(kind = %command.kind(), index = self.index, "rebuild_command");
        self.stage = stage;
        Ok(Progress::Yield(Step::Submit(command)))
    }

    fn begin_entity(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let Some(snapshot) = self.fleet.entities.get(self.index) else {
            info!(rebuilt = self.index, "fleet_rebuilt");
            return Ok(Progress::Done(()));
        };
        let depot = snapshot.depot;
        if ctx.world.infrastructure_at(depot) != Some(ctx.target) {
            return Err(Bailout::DepotNotConverted {
                depot,
                target: ctx.target,
            });
        }
        self.current = None;
        self.head = None;
        self.built_unit = None;
        self.unit_cursor = 0;
        self.insert_cursor = 0;

        let route = self.fleet.route(snapshot.route);
        if let Some(source) = route.clone_source(&snapshot.signature) {
            return self.submit(
                Stage::AwaitSharedClone,
                Command::CloneEntity {
                    depot,
                    source,
                    share_instructions: true,
                },
            );
        }
        if let Some(&source) = self.copy_sources.get(&snapshot.signature) {
            return self.submit(
                Stage::AwaitCopy,
                Command::CloneEntity {
                    depot,
                    source,
                    share_instructions: false,
                },
            );
        }
        self.build_next_unit(ctx)
    }

    fn build_next_unit(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let snapshot = &self.fleet.entities[self.index];
        let Some(&role) = snapshot.signature.roles().get(self.unit_cursor) else {
            let head = self.head.ok_or(Bailout::EmptyComposition {
                original: snapshot.original,
            })?;
            self.copy_sources
                .entry(snapshot.signature.clone())
                .or_insert(head);
            self.current = Some(head);
            return self.assign_instructions(ctx);
        };

        let planner = AcquisitionPlanner::new(ctx.world, ctx.agent, ctx.target);
        let acquisition = planner.select(role, snapshot.signature.dominant_cargo())?;
        let depot = snapshot.depot;
        self.submit(
            Stage::AwaitBuild,
            Command::BuildUnit {
                depot,
                design: acquisition.design,
                refit: acquisition.refit,
            },
        )
    }

    fn place_built_unit(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let unit = self.built_unit.take().ok_or(Bailout::OutOfSequence)?;
        self.unit_cursor += 1;
        let Some(head) = self.head else {
            self.head = Some(unit);
            return self.build_next_unit(ctx);
        };

        let unit_head = ctx
            .world
            .chain_head(unit)
            .ok_or(Bailout::EntityVanished(unit))?;
        if unit_head == head {
            return self.build_next_unit(ctx);
        }
        let tail = ctx
            .world
            .chain_tail(head)
            .ok_or(Bailout::EntityVanished(head))?;
        let depot = self.depot();
        self.submit(
            Stage::AwaitAttach,
            Command::AttachUnit {
                depot,
                unit,
                after: tail,
            },
        )
    }

    fn assign_instructions(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let entity = self.current_entity()?;
        let depot = self.depot();
        let designation = self.fleet.route(self.snapshot().route).designation();
        match designation {
            Some(source) => self.submit(
                Stage::AwaitShare,
                Command::ShareInstructions {
                    depot,
                    entity,
                    source,
                },
            ),
            None => self.delete_next_instruction(ctx),
        }
    }

    fn delete_next_instruction(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let entity = self.current_entity()?;
        let count = ctx
            .world
            .instructions(entity)
            .ok_or(Bailout::EntityVanished(entity))?
            .len();
        if count == 0 {
            self.insert_cursor = 0;
            return self.insert_next_instruction(ctx);
        }
        let depot = self.depot();
        self.submit(
            Stage::AwaitDelete,
            Command::DeleteInstruction {
                depot,
                entity,
                index: count - 1,
            },
        )
    }

    fn insert_next_instruction(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let entity = self.current_entity()?;
        let route_id = self.snapshot().route;
        let next = self
            .fleet
            .route(route_id)
            .instructions()
            .get(self.insert_cursor)
            .copied();
        if let Some(instruction) = next {
            let depot = self.depot();
            return self.submit(
                Stage::AwaitInsert,
                Command::InsertInstruction {
                    depot,
                    entity,
                    index: self.insert_cursor,
                    instruction,
                },
            );
        }

        self.fleet.routes[route_id.0].designate(entity);
        self.record_clone_source()?;
        self.skip_past_depot(ctx)
    }

    fn record_clone_source(&mut self) -> Result<(), Bailout> {
        let entity = self.current_entity()?;
        let snapshot = &self.fleet.entities[self.index];
        self.fleet.routes[snapshot.route.0].record_clone_source(&snapshot.signature, entity);
        Ok(())
    }

    fn skip_past_depot(&mut self, ctx: &mut PhaseCtx<'_>) -> RebuildProgress {
        let entity = self.current_entity()?;
        let depot = self.depot();
        let instructions = ctx
            .world
            .instructions(entity)
            .ok_or(Bailout::EntityVanished(entity))?;
        if let Some(next) = resume_index_after(&instructions, depot) {
            let current = ctx
                .world
                .current_instruction(entity)
                .ok_or(Bailout::EntityVanished(entity))?;
            if current != next {
                return self.submit(
                    Stage::AwaitSkip,
                    Command::SkipToInstruction {
                        depot,
                        entity,
                        index: next,
                    },
                );
            }
        }
        self.index += 1;
        self.begin_entity(ctx)
    }
}
