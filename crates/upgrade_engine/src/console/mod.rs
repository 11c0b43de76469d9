mod commands;
mod state;

pub use commands::{
    CommandParseError, ConsoleCommandProcessor, ConsoleCommandRegistry, LocalAction,
    ParsedCommand, UpgradeCommand,
};
pub use state::{ConsoleState, MAX_LINE_CHARS, MAX_OUTPUT_LINES, MAX_PENDING_LINES};

use tracing::info;

use crate::orchestrator::{Orchestrator, RunEnd};
use crate::world::WorldView;

/// Applies a queued console command to the orchestrator and reports back on the console.
pub fn execute_upgrade_command<W: WorldView>(
    command: &UpgradeCommand,
    orchestrator: &mut Orchestrator,
    world: &W,
    console: &mut ConsoleState,
) {
    match command {
        UpgradeCommand::Start { variant } => match orchestrator.start(world, variant) {
            Ok(()) => {
                info!(variant = variant.as_str(), "console_upgrade_requested");
                console.append_output_line(format!("auto upgrade to '{variant}' started"));
            }
            Err(error) => console.append_output_line(format!("error: {error}")),
        },
        UpgradeCommand::Status => {
            for line in status_lines(orchestrator) {
                console.append_output_line(line);
            }
        }
    }
}

fn status_lines(orchestrator: &Orchestrator) -> Vec<String> {
    let mut lines = Vec::new();
    match orchestrator.status() {
        Some(status) => {
            let mut line = format!(
                "auto upgrade: phase {} for {} to '{}' since tick {}",
                status.phase, status.agent, status.variant_name, status.started_at
            );
            if let Some(kind) = status.waiting_on {
                line.push_str(&format!(", waiting on {kind}"));
            }
            lines.push(line);
        }
        None => lines.push("auto upgrade: idle".to_string()),
    }
    match orchestrator.last_end() {
        Some(RunEnd::Completed) => lines.push("last run: completed".to_string()),
        Some(RunEnd::BailedOut(bailout)) => lines.push(format!("last run: bailed out: {bailout}")),
        None => {}
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::EngineConfig;
    use crate::sim::{self, SimWorld, TrainSpec};
    use crate::world::{AgentId, Location};

    fn drain_output(console: &mut ConsoleState) -> Vec<String> {
        let mut lines = Vec::new();
        console.drain_output_lines_into(&mut lines);
        lines
    }

    fn run_console(
        lines: &[&str],
        processor: &mut ConsoleCommandProcessor,
        console: &mut ConsoleState,
        orchestrator: &mut Orchestrator,
        world: &SimWorld,
    ) {
        for line in lines {
            console.submit_line(line);
        }
        processor.process_pending_lines(console);
        let mut queued = Vec::new();
        processor.drain_pending_upgrade_commands_into(&mut queued);
        for command in &queued {
            execute_upgrade_command(command, orchestrator, world, console);
        }
    }

    #[test]
    fn console_starts_and_reports_a_run() {
        let mut world = SimWorld::standard_test_world();
        world
            .spawn_train(TrainSpec::in_depot(AgentId(1), Location::new(2, 2), &[1]))
            .expect("train");
        let mut orchestrator = Orchestrator::new(EngineConfig::default());
        let mut processor = ConsoleCommandProcessor::new();
        let mut console = ConsoleState::default();

        run_console(
            &["auto_upgrade_status", "auto_upgrade ELECTRIC"],
            &mut processor,
            &mut console,
            &mut orchestrator,
            &world,
        );
        sim::step(&mut world, &mut orchestrator);
        run_console(
            &["auto_upgrade_status"],
            &mut processor,
            &mut console,
            &mut orchestrator,
            &world,
        );

        assert_eq!(
            drain_output(&mut console),
            vec![
                "> auto_upgrade_status",
                "> auto_upgrade ELECTRIC",
                "auto upgrade: idle",
                "auto upgrade to 'ELECTRIC' started",
                "> auto_upgrade_status",
                "auto upgrade: phase depot for agent#1 to 'ELECTRIC' since tick 0, waiting on send_all_to_depot",
            ]
        );
    }

    #[test]
    fn rejected_start_is_reported_as_an_error() {
        let world = SimWorld::standard_test_world();
        let mut orchestrator = Orchestrator::default();
        let mut processor = ConsoleCommandProcessor::new();
        let mut console = ConsoleState::default();

        run_console(
            &["auto_upgrade hovercraft"],
            &mut processor,
            &mut console,
            &mut orchestrator,
            &world,
        );

        assert_eq!(
            drain_output(&mut console),
            vec![
                "> auto_upgrade hovercraft",
                "error: unknown target variant 'hovercraft'",
            ]
        );
        assert!(!orchestrator.is_running());
    }
}
