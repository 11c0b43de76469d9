use thiserror::Error;
use tracing::info;

use crate::fleet::{SelectionError, SnapshotError};
use crate::world::{
    Command, CommandKind, CommandOutcome, EntityId, FailureReason, Location, VariantId,
};

use super::phases::{
    ActivationPhase, CapturePhase, ConversionPhase, DepotPhase, LiquidationPhase, PhaseCtx,
    Progress, ReconstructionPhase,
};

/// Fatal causes that end a run. Partially rebuilt fleets are left as they are.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Bailout {
    #[error("company changed")]
    AuthorizationLost,
    #[error("cannot sell all vehicles in depot {depot}: {reason}")]
    LiquidationFailed {
        depot: Location,
        reason: FailureReason,
    },
    #[error("failed to convert the whole region: {reason}")]
    ConversionFailed { reason: FailureReason },
    #[error("cannot start all vehicles: {reason}")]
    ActivationFailed { reason: FailureReason },
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("depot {depot} was not converted to {target}")]
    DepotNotConverted { depot: Location, target: VariantId },
    #[error("cannot {action}: {reason}")]
    CommandFailed {
        action: &'static str,
        reason: FailureReason,
    },
    #[error("entity {0} disappeared during the run")]
    EntityVanished(EntityId),
    #[error("{kind} succeeded without reporting the created entity")]
    MissingCreatedEntity { kind: CommandKind },
    #[error("replacement for {original} has no units")]
    EmptyComposition { original: EntityId },
    #[error("gave up sending vehicles to depot after {passes} passes")]
    RetryLimit { passes: u32 },
    #[error("task resumed out of sequence")]
    OutOfSequence,
}

impl From<SnapshotError> for Bailout {
    fn from(error: SnapshotError) -> Self {
        match error {
            SnapshotError::EntityVanished(entity) => Self::EntityVanished(entity),
        }
    }
}

/// What the task asks of the scheduler at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Submit(Command),
    Wait(u64),
    Finished,
    Abort(Bailout),
}

/// Value the task is resumed with; always matches the preceding `Step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resumed {
    Start,
    Elapsed,
    Command(CommandOutcome),
}

enum Phase {
    Depot(DepotPhase),
    Capture(CapturePhase),
    Liquidation(LiquidationPhase),
    Conversion(ConversionPhase),
    Reconstruction(ReconstructionPhase),
    Activation(ActivationPhase),
    Ended,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::Depot(_) => "depot",
            Self::Capture(_) => "snapshot",
            Self::Liquidation(_) => "liquidation",
            Self::Conversion(_) => "conversion",
            Self::Reconstruction(_) => "reconstruction",
            Self::Activation(_) => "activation",
            Self::Ended => "ended",
        }
    }
}

/// The single suspendable task of a run, resumed by the scheduler.
pub struct UpgradeTask {
    phase: Phase,
}

impl Default for UpgradeTask {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgradeTask {
    pub fn new() -> Self {
        Self {
            phase: Phase::Depot(DepotPhase::new()),
        }
    }

    pub fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    pub(crate) fn resume(&mut self, ctx: &mut PhaseCtx<'_>, input: Resumed) -> Step {
        match self.advance(ctx, input) {
            Ok(step) => {
                if step == Step::Finished {
                    self.phase = Phase::Ended;
                }
                step
            }
            Err(bailout) => Step::Abort(bailout),
        }
    }

    fn advance(&mut self, ctx: &mut PhaseCtx<'_>, mut input: Resumed) -> Result<Step, Bailout> {
        loop {
            let next = match &mut self.phase {
                Phase::Depot(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(entities) => Phase::Capture(CapturePhase::new(entities)),
                },
                Phase::Capture(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(fleet) => Phase::Liquidation(LiquidationPhase::new(fleet)),
                },
                Phase::Liquidation(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(fleet) => Phase::Conversion(ConversionPhase::new(fleet)),
                },
                Phase::Conversion(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(fleet) => {
                        Phase::Reconstruction(ReconstructionPhase::new(fleet))
                    }
                },
                Phase::Reconstruction(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(()) => Phase::Activation(ActivationPhase::new()),
                },
                Phase::Activation(phase) => match phase.resume(ctx, input)? {
                    Progress::Yield(step) => return Ok(step),
                    Progress::Done(()) => {
                        ctx.diagnostics.info("Auto upgrade complete!");
                        return Ok(Step::Finished);
                    }
                },
                Phase::Ended => return Err(Bailout::OutOfSequence),
            };
            info!(
                from = self.phase.name(),
                to = next.name(),
                "upgrade_phase_entered"
            );
            self.phase = next;
            input = Resumed::Start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CargoId;

    #[test]
    fn bailout_messages_name_the_cause() {
        let failed = Bailout::LiquidationFailed {
            depot: Location::new(6, 2),
            reason: FailureReason::Rejected("sale blocked".to_string()),
        };
        assert_eq!(
            failed.to_string(),
            "cannot sell all vehicles in depot (6, 2): sale blocked"
        );
        let selection: Bailout = SelectionError::NoCarriage {
            cargo: CargoId(1),
            variant: VariantId(3),
        }
        .into();
        assert_eq!(
            selection.to_string(),
            "cannot find a suitable wagon for cargo#1 on variant#3"
        );
        assert_eq!(Bailout::AuthorizationLost.to_string(), "company changed");
    }
}
