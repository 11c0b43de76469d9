mod activation;
mod capture;
mod conversion;
mod depot;
mod liquidation;
mod reconstruction;

pub(crate) use activation::ActivationPhase;
pub(crate) use capture::CapturePhase;
pub(crate) use conversion::ConversionPhase;
pub(crate) use depot::DepotPhase;
pub(crate) use liquidation::LiquidationPhase;
pub(crate) use reconstruction::ReconstructionPhase;

use crate::world::{
    AgentId, CommandKind, CommandOutcome, EntityId, Location, VariantId, WorldView,
};

use super::config::EngineConfig;
use super::diagnostics::DiagnosticLog;
use super::task::{Bailout, Resumed, Step};

/// Everything a phase may read while it is being resumed.
pub(crate) struct PhaseCtx<'a> {
    pub world: &'a dyn WorldView,
    pub agent: AgentId,
    pub target: VariantId,
    pub config: &'a EngineConfig,
    pub diagnostics: &'a mut DiagnosticLog,
}

impl PhaseCtx<'_> {
    pub fn settle(&self) -> Step {
        Step::Wait(self.config.settle_delay_ticks)
    }

    pub fn step_delay(&self) -> Step {
        Step::Wait(self.config.step_delay_ticks)
    }

    pub fn is_stopped_in_depot(&self, entity: EntityId) -> Result<bool, Bailout> {
        self.world
            .is_stopped_in_depot(entity)
            .ok_or(Bailout::EntityVanished(entity))
    }

    pub fn location(&self, entity: EntityId) -> Result<Location, Bailout> {
        self.world
            .location(entity)
            .ok_or(Bailout::EntityVanished(entity))
    }
}

pub(crate) enum Progress<T> {
    Yield(Step),
    Done(T),
}

pub(crate) fn expect_elapsed(input: Resumed) -> Result<(), Bailout> {
    match input {
        Resumed::Elapsed => Ok(()),
        Resumed::Start | Resumed::Command(_) => Err(Bailout::OutOfSequence),
    }
}

pub(crate) fn expect_outcome(input: Resumed) -> Result<CommandOutcome, Bailout> {
    match input {
        Resumed::Command(outcome) => Ok(outcome),
        Resumed::Start | Resumed::Elapsed => Err(Bailout::OutOfSequence),
    }
}

/// Created entity of a successful build or clone, or the failure as a bailout.
pub(crate) fn created_entity(
    outcome: CommandOutcome,
    kind: CommandKind,
    action: &'static str,
) -> Result<EntityId, Bailout> {
    match outcome {
        CommandOutcome::Success {
            created: Some(entity),
        } => Ok(entity),
        CommandOutcome::Success { created: None } => Err(Bailout::MissingCreatedEntity { kind }),
        CommandOutcome::Failure(reason) => Err(Bailout::CommandFailed { action, reason }),
    }
}

pub(crate) fn require_success(outcome: CommandOutcome, action: &'static str) -> Result<(), Bailout> {
    match outcome {
        CommandOutcome::Success { .. } => Ok(()),
        CommandOutcome::Failure(reason) => Err(Bailout::CommandFailed { action, reason }),
    }
}
