use crate::world::{Command, CommandOutcome};

use super::{expect_outcome, PhaseCtx, Progress};
use crate::orchestrator::task::{Bailout, Resumed, Step};

pub(crate) struct ActivationPhase {
    submitted: bool,
}

impl ActivationPhase {
    pub fn new() -> Self {
        Self { submitted: false }
    }

    pub fn resume(
        &mut self,
        ctx: &mut PhaseCtx<'_>,
        input: Resumed,
    ) -> Result<Progress<()>, Bailout> {
        if !self.submitted {
            self.submitted = true;
            return Ok(Progress::Yield(Step::Submit(Command::StartAll {
                agent: ctx.agent,
            })));
        }
        match expect_outcome(input)? {
            CommandOutcome::Success { .. } => Ok(Progress::Done(())),
            CommandOutcome::Failure(reason) => Err(Bailout::ActivationFailed { reason }),
        }
    }
}
