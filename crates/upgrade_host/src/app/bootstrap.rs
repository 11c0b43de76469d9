use std::env;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use upgrade_engine::orchestrator::{EngineConfig, Orchestrator};
use upgrade_engine::sim::SimWorld;

use super::scenario::{load_scenario, AgentChange, ScriptLine};
use super::HostError;

pub(crate) const MAX_TICKS_ENV_VAR: &str = "UPGRADE_MAX_TICKS";
pub(crate) const COMMAND_LATENCY_ENV_VAR: &str = "UPGRADE_COMMAND_LATENCY";
pub(crate) const RETRY_CAP_ENV_VAR: &str = "UPGRADE_RETRY_CAP";

const DEFAULT_MAX_TICKS: u64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostConfig {
    pub(crate) max_ticks: u64,
    /// Overrides the scenario's command latency when set.
    pub(crate) command_latency: Option<u64>,
    pub(crate) engine: EngineConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_ticks: DEFAULT_MAX_TICKS,
            command_latency: None,
            engine: EngineConfig::default(),
        }
    }
}

impl HostConfig {
    pub(crate) fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max_ticks) = env_override(MAX_TICKS_ENV_VAR, env::var(MAX_TICKS_ENV_VAR)) {
            config.max_ticks = max_ticks;
        }
        config.command_latency =
            env_override(COMMAND_LATENCY_ENV_VAR, env::var(COMMAND_LATENCY_ENV_VAR));
        if let Some(cap) = env_override::<u32>(RETRY_CAP_ENV_VAR, env::var(RETRY_CAP_ENV_VAR)) {
            config.engine.max_depot_retry_passes = Some(cap);
        }
        config
    }
}

/// Parsed value of an override variable; unset or unusable values yield `None`.
fn env_override<T: FromStr>(
    env_var: &'static str,
    raw: Result<String, env::VarError>,
) -> Option<T> {
    match raw {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(
                    env_var,
                    value = value.as_str(),
                    "invalid env var value; falling back to default"
                );
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var,
                error = %err,
                "unable to read env var; falling back to default"
            );
            None
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: HostConfig,
    pub(crate) world: SimWorld,
    pub(crate) orchestrator: Orchestrator,
    pub(crate) script: Vec<ScriptLine>,
    pub(crate) agent_changes: Vec<AgentChange>,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn build_app(scenario_path: &Path, config: HostConfig) -> Result<AppWiring, HostError> {
    info!(scenario = %scenario_path.display(), "=== Auto Upgrade Host Startup ===");
    let scenario = load_scenario(scenario_path)?;
    let mut world = scenario.world.build()?;
    if let Some(latency) = config.command_latency {
        world.set_latency(latency);
    }

    let mut script = scenario.script;
    script.sort_by_key(|entry| entry.tick);
    let mut agent_changes = scenario.agent_changes;
    agent_changes.sort_by_key(|change| change.tick);
    info!(
        script_lines = script.len(),
        agent_changes = agent_changes.len(),
        max_ticks = config.max_ticks,
        "scenario_loaded"
    );

    Ok(AppWiring {
        orchestrator: Orchestrator::new(config.engine.clone()),
        config,
        world,
        script,
        agent_changes,
    })
}
