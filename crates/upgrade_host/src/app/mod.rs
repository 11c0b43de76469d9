mod bootstrap;
mod loop_runner;
mod scenario;

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use upgrade_engine::sim::SimError;

pub(crate) use bootstrap::{build_app, init_tracing, HostConfig};
pub(crate) use loop_runner::run;

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error("failed to read scenario {}: {source}", .path.display())]
    ReadScenario {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse scenario json at {at}: {source}")]
    ParseScenario {
        at: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("cannot place world.trains[{index}]: {source}")]
    Train {
        index: usize,
        #[source]
        source: SimError,
    },
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}
