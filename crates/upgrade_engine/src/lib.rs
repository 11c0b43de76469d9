pub mod console;
pub mod fleet;
pub mod orchestrator;
pub mod sim;
pub mod world;

pub use console::{execute_upgrade_command, ConsoleCommandProcessor, ConsoleState, UpgradeCommand};
pub use orchestrator::{
    Bailout, DeliveryError, Diagnostic, DiagnosticLevel, EngineConfig, Orchestrator, RunEnd,
    RunStatus, StartError, DIAGNOSTIC_PREFIX, TICKS_PER_SECOND,
};
pub use sim::SimWorld;
pub use world::{
    AgentId, Command, CommandGateway, CommandKind, CommandOutcome, EntityId, FailureReason,
    Location, Ticket, VariantId, WorldView,
};
