mod command;
mod types;
mod view;

pub use command::{
    Command, CommandGateway, CommandKind, CommandOutcome, FailureReason, Ticket,
    TransportRejected,
};
pub use types::{
    AgentId, CargoId, Design, DesignId, EntityId, Instruction, Location, Region, UnitRole,
    VariantId,
};
pub use view::WorldView;
