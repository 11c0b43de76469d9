mod clock;
mod config;
mod diagnostics;
mod phases;
mod scheduler;
mod task;


pub use clock::TickClock;
pub use config::{EngineConfig, TICKS_PER_SECOND};
pub use diagnostics::{
    Diagnostic, DiagnosticLevel, DiagnosticLog, DIAGNOSTIC_PREFIX, MAX_PENDING_DIAGNOSTICS,
};
pub use scheduler::{DeliveryError, Orchestrator, RunEnd, RunStatus, StartError};
pub use task::{Bailout, Resumed, Step, UpgradeTask};

pub(crate) use diagnostics::push_bounded;
