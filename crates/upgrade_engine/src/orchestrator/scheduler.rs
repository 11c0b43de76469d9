use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::world::{
    AgentId, CommandGateway, CommandKind, CommandOutcome, FailureReason, Ticket, VariantId,
    WorldView,
};

use super::clock::TickClock;
use super::config::EngineConfig;
use super::diagnostics::{Diagnostic, DiagnosticLog};
use super::phases::PhaseCtx;
use super::task::{Bailout, Resumed, Step, UpgradeTask};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("no controlling agent to run the upgrade for")]
    NoAuthorizingAgent,
    #[error("unknown target variant '{0}'")]
    UnknownVariant(String),
    #[error("controlling agent owns no vehicles")]
    NoEntities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("no upgrade run is active")]
    NoRunActive,
    #[error("the active run is not waiting on a command")]
    NotAwaitingCommand,
    #[error("outcome for {got} does not match outstanding {expected}")]
    StaleTicket { expected: Ticket, got: Ticket },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspension {
    Ticks { deadline: u64 },
    Command { ticket: Ticket, kind: CommandKind },
}

struct RunContext {
    agent: AgentId,
    target: VariantId,
    variant_name: String,
    task: UpgradeTask,
    suspension: Suspension,
    started_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub agent: AgentId,
    pub target: VariantId,
    pub variant_name: String,
    pub phase: &'static str,
    pub started_at: u64,
    pub waiting_on: Option<CommandKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    BailedOut(Bailout),
}

/// Owns the run context and pumps its task on ticks and command resolutions.
///
/// At most one run is live. Every resume yields exactly one step, so at most
/// one command is ever outstanding.
pub struct Orchestrator {
    config: EngineConfig,
    clock: TickClock,
    run: Option<RunContext>,
    diagnostics: DiagnosticLog,
    last_end: Option<RunEnd>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: TickClock::default(),
            run: None,
            diagnostics: DiagnosticLog::default(),
            last_end: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn last_end(&self) -> Option<&RunEnd> {
        self.last_end.as_ref()
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.run.as_ref().map(|run| RunStatus {
            agent: run.agent,
            target: run.target,
            variant_name: run.variant_name.clone(),
            phase: run.task.phase_name(),
            started_at: run.started_at,
            waiting_on: match run.suspension {
                Suspension::Command { kind, .. } => Some(kind),
                Suspension::Ticks { .. } => None,
            },
        })
    }

    pub fn drain_diagnostics_into(&mut self, out: &mut Vec<Diagnostic>) {
        self.diagnostics.drain_into(out);
    }

    /// Validates and begins a run; the first dispatch happens on the next tick.
    ///
    /// A run already in progress is discarded without rollback.
    pub fn start<W: WorldView>(
        &mut self,
        world: &W,
        variant_name: &str,
    ) -> Result<(), StartError> {
        let Some(agent) = world.controlling_agent() else {
            self.diagnostics.warning("You must be in a company to do this action.");
            return Err(StartError::NoAuthorizingAgent);
        };
        let Some(target) = world.resolve_variant(variant_name) else {
            self.diagnostics.error(format_args!("Invalid target variant '{variant_name}'."));
            return Err(StartError::UnknownVariant(variant_name.to_string()));
        };
        if world.owned_entities(agent).is_empty() {
            self.diagnostics.error("You don't have any vehicles.");
            return Err(StartError::NoEntities);
        }

        if let Some(previous) = self.run.take() {
            warn!(
                agent = %previous.agent,
                phase = previous.task.phase_name(),
                "upgrade_run_replaced"
            );
        }
        self.run = Some(RunContext {
            agent,
            target,
            variant_name: variant_name.to_string(),
            task: UpgradeTask::new(),
            suspension: Suspension::Ticks {
                deadline: self.clock.deadline_after(1),
            },
            started_at: self.clock.now(),
        });
        info!(
            agent = %agent,
            variant = variant_name,
            tick = self.clock.now(),
            "upgrade_run_started"
        );
        Ok(())
    }

    /// Advances the clock and resumes the task if its wait has elapsed.
    pub fn on_tick<W: WorldView + CommandGateway>(&mut self, world: &mut W) {
        self.clock.advance();
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let (agent, suspension) = (run.agent, run.suspension);
        if world.controlling_agent() != Some(agent) {
            self.bail(Bailout::AuthorizationLost);
            return;
        }
        match suspension {
            Suspension::Ticks { deadline } if self.clock.has_reached(deadline) => {
                self.pump(world, Resumed::Elapsed);
            }
            Suspension::Ticks { .. } | Suspension::Command { .. } => {}
        }
    }

    /// Resumes the task with the resolution of its outstanding command.
    pub fn deliver<W: WorldView + CommandGateway>(
        &mut self,
        world: &mut W,
        ticket: Ticket,
        outcome: CommandOutcome,
    ) -> Result<(), DeliveryError> {
        let run = self.run.as_ref().ok_or(DeliveryError::NoRunActive)?;
        let (agent, suspension) = (run.agent, run.suspension);
        match suspension {
            Suspension::Command { ticket: expected, .. } if expected == ticket => {}
            Suspension::Command { ticket: expected, .. } => {
                return Err(DeliveryError::StaleTicket {
                    expected,
                    got: ticket,
                });
            }
            Suspension::Ticks { .. } => return Err(DeliveryError::NotAwaitingCommand),
        }
        if world.controlling_agent() != Some(agent) {
            self.bail(Bailout::AuthorizationLost);
            return Ok(());
        }
        debug!(ticket = %ticket, succeeded = outcome.succeeded(), "command_delivered");
        self.pump(world, Resumed::Command(outcome));
        Ok(())
    }

    fn pump<W: WorldView + CommandGateway>(&mut self, world: &mut W, mut input: Resumed) {
        loop {
            let Some(run) = self.run.as_mut() else {
                return;
            };
            let step = {
                let mut ctx = PhaseCtx {
                    world: &*world,
                    agent: run.agent,
                    target: run.target,
                    config: &self.config,
                    diagnostics: &mut self.diagnostics,
                };
                run.task.resume(&mut ctx, input)
            };

            match step {
                Step::Submit(command) => match world.submit(&command) {
                    Ok(ticket) => {
                        debug!(ticket = %ticket, kind = %command.kind(), "command_submitted");
                        run.suspension = Suspension::Command {
                            ticket,
                            kind: command.kind(),
                        };
                        return;
                    }
                    Err(rejected) => {
                        warn!(
                            kind = %command.kind(),
                            error = %rejected,
                            "command_transport_rejected"
                        );
                        input = Resumed::Command(CommandOutcome::Failure(
                            FailureReason::TransportRejected,
                        ));
                    }
                },
                Step::Wait(0) => input = Resumed::Elapsed,
                Step::Wait(ticks) => {
                    run.suspension = Suspension::Ticks {
                        deadline: self.clock.deadline_after(ticks),
                    };
                    return;
                }
                Step::Finished => {
                    self.finish();
                    return;
                }
                Step::Abort(bailout) => {
                    self.bail(bailout);
                    return;
                }
            }
        }
    }

    fn finish(&mut self) {
        if let Some(run) = self.run.take() {
            info!(
                agent = %run.agent,
                elapsed_ticks = self.clock.now().saturating_sub(run.started_at),
                "upgrade_run_completed"
            );
        }
        self.last_end = Some(RunEnd::Completed);
    }

    fn bail(&mut self, bailout: Bailout) {
        if let Some(run) = self.run.take() {
            error!(
                agent = %run.agent,
                phase = run.task.phase_name(),
                cause = %bailout,
                "upgrade_run_bailed_out"
            );
        }
        self.diagnostics.error(format_args!("Bailed out: {bailout}."));
        self.last_end = Some(RunEnd::BailedOut(bailout));
    }
}
