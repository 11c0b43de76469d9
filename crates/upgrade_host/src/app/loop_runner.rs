use std::io::Write;

use tracing::{error, info, warn};
use upgrade_engine::console::{execute_upgrade_command, ConsoleCommandProcessor, ConsoleState};
use upgrade_engine::orchestrator::{Diagnostic, RunEnd};
use upgrade_engine::sim;

use super::bootstrap::AppWiring;
use super::HostError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunReport {
    pub(crate) ticks: u64,
    pub(crate) last_end: Option<RunEnd>,
    /// A run was still in progress when the tick budget ran out.
    pub(crate) unfinished: bool,
}

impl RunReport {
    /// Nothing bailed out and nothing was left running.
    pub(crate) fn succeeded(&self) -> bool {
        !self.unfinished && !matches!(self.last_end, Some(RunEnd::BailedOut(_)))
    }
}

/// Fixed-step headless loop: advance the world, deliver outcomes, tick the
/// orchestrator, then feed due console lines and flush everything to `out`.
pub(crate) fn run<Out: Write>(app: AppWiring, out: &mut Out) -> Result<RunReport, HostError> {
    let AppWiring {
        config,
        mut world,
        mut orchestrator,
        script,
        agent_changes,
    } = app;
    let mut console = ConsoleState::default();
    let mut processor = ConsoleCommandProcessor::new();
    let mut script_cursor = 0usize;
    let mut change_cursor = 0usize;
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut output: Vec<String> = Vec::new();
    let mut queued = Vec::new();

    let mut ticks = 0u64;
    while ticks < config.max_ticks {
        sim::step(&mut world, &mut orchestrator);
        ticks += 1;
        let now = world.tick();

        while let Some(change) = agent_changes.get(change_cursor).filter(|c| c.tick <= now) {
            info!(tick = now, agent = ?change.agent, "controlling_agent_changed");
            world.set_controlling_agent(change.agent);
            change_cursor += 1;
        }
        while let Some(entry) = script.get(script_cursor).filter(|entry| entry.tick <= now) {
            console.submit_line(&entry.line);
            script_cursor += 1;
        }
        processor.process_pending_lines(&mut console);
        processor.drain_pending_upgrade_commands_into(&mut queued);
        for command in queued.drain(..) {
            execute_upgrade_command(&command, &mut orchestrator, &world, &mut console);
        }

        console.drain_output_lines_into(&mut output);
        for line in output.drain(..) {
            writeln!(out, "{line}").map_err(HostError::Output)?;
        }
        orchestrator.drain_diagnostics_into(&mut diagnostics);
        for diagnostic in diagnostics.drain(..) {
            writeln!(out, "{}: {}", diagnostic.level.as_str(), diagnostic.message)
                .map_err(HostError::Output)?;
        }

        let script_done =
            script_cursor == script.len() && change_cursor == agent_changes.len();
        if script_done && !orchestrator.is_running() {
            break;
        }
    }

    let unfinished = orchestrator.is_running();
    if unfinished {
        if let Some(status) = orchestrator.status() {
            warn!(
                phase = status.phase,
                max_ticks = config.max_ticks,
                "tick_budget_exhausted_mid_run"
            );
        }
    }
    let report = RunReport {
        ticks,
        last_end: orchestrator.last_end().cloned(),
        unfinished,
    };
    match &report.last_end {
        Some(RunEnd::BailedOut(bailout)) => {
            error!(ticks, cause = %bailout, "host_finished_after_bailout")
        }
        Some(RunEnd::Completed) | None => info!(
            ticks,
            seconds = config.engine.ticks_to_seconds(ticks),
            "host_finished"
        ),
    }
    Ok(report)
}
