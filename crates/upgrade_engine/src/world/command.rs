use std::fmt;

use thiserror::Error;

use super::{AgentId, CargoId, DesignId, EntityId, Instruction, Location, Region, VariantId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendAllToDepot {
        agent: AgentId,
    },
    SendToDepot {
        entity: EntityId,
        at: Location,
    },
    SellAllInDepot {
        depot: Location,
        agent: AgentId,
    },
    ConvertInfrastructure {
        region: Region,
        variant: VariantId,
    },
    BuildUnit {
        depot: Location,
        design: DesignId,
        refit: Option<CargoId>,
    },
    CloneEntity {
        depot: Location,
        source: EntityId,
        share_instructions: bool,
    },
    AttachUnit {
        depot: Location,
        unit: EntityId,
        after: EntityId,
    },
    ShareInstructions {
        depot: Location,
        entity: EntityId,
        source: EntityId,
    },
    DeleteInstruction {
        depot: Location,
        entity: EntityId,
        index: usize,
    },
    InsertInstruction {
        depot: Location,
        entity: EntityId,
        index: usize,
        instruction: Instruction,
    },
    SkipToInstruction {
        depot: Location,
        entity: EntityId,
        index: usize,
    },
    StartAll {
        agent: AgentId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SendAllToDepot,
    SendToDepot,
    SellAllInDepot,
    ConvertInfrastructure,
    BuildUnit,
    CloneEntity,
    AttachUnit,
    ShareInstructions,
    DeleteInstruction,
    InsertInstruction,
    SkipToInstruction,
    StartAll,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendAllToDepot => "send_all_to_depot",
            Self::SendToDepot => "send_to_depot",
            Self::SellAllInDepot => "sell_all_in_depot",
            Self::ConvertInfrastructure => "convert_infrastructure",
            Self::BuildUnit => "build_unit",
            Self::CloneEntity => "clone_entity",
            Self::AttachUnit => "attach_unit",
            Self::ShareInstructions => "share_instructions",
            Self::DeleteInstruction => "delete_instruction",
            Self::InsertInstruction => "insert_instruction",
            Self::SkipToInstruction => "skip_to_instruction",
            Self::StartAll => "start_all",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        const ALL: [CommandKind; 12] = [
            CommandKind::SendAllToDepot,
            CommandKind::SendToDepot,
            CommandKind::SellAllInDepot,
            CommandKind::ConvertInfrastructure,
            CommandKind::BuildUnit,
            CommandKind::CloneEntity,
            CommandKind::AttachUnit,
            CommandKind::ShareInstructions,
            CommandKind::DeleteInstruction,
            CommandKind::InsertInstruction,
            CommandKind::SkipToInstruction,
            CommandKind::StartAll,
        ];
        ALL.into_iter().find(|kind| kind.as_str() == token)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SendAllToDepot { .. } => CommandKind::SendAllToDepot,
            Self::SendToDepot { .. } => CommandKind::SendToDepot,
            Self::SellAllInDepot { .. } => CommandKind::SellAllInDepot,
            Self::ConvertInfrastructure { .. } => CommandKind::ConvertInfrastructure,
            Self::BuildUnit { .. } => CommandKind::BuildUnit,
            Self::CloneEntity { .. } => CommandKind::CloneEntity,
            Self::AttachUnit { .. } => CommandKind::AttachUnit,
            Self::ShareInstructions { .. } => CommandKind::ShareInstructions,
            Self::DeleteInstruction { .. } => CommandKind::DeleteInstruction,
            Self::InsertInstruction { .. } => CommandKind::InsertInstruction,
            Self::SkipToInstruction { .. } => CommandKind::SkipToInstruction,
            Self::StartAll { .. } => CommandKind::StartAll,
        }
    }

    /// Tile the command is addressed to; fleet-wide commands target the origin.
    pub fn location(&self) -> Location {
        match self {
            Self::SendAllToDepot { .. } | Self::StartAll { .. } => Location::ORIGIN,
            Self::SendToDepot { at, .. } => *at,
            Self::SellAllInDepot { depot, .. }
            | Self::BuildUnit { depot, .. }
            | Self::CloneEntity { depot, .. }
            | Self::AttachUnit { depot, .. }
            | Self::ShareInstructions { depot, .. }
            | Self::DeleteInstruction { depot, .. }
            | Self::InsertInstruction { depot, .. }
            | Self::SkipToInstruction { depot, .. } => *depot,
            Self::ConvertInfrastructure { region, .. } => region.to,
        }
    }

    pub fn creates_entity(&self) -> bool {
        matches!(self, Self::BuildUnit { .. } | Self::CloneEntity { .. })
    }
}

/// Handle the gateway hands out for one accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Rejected(String),
    TransportRejected,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => f.write_str(reason),
            Self::TransportRejected => f.write_str("transport rejected the submission"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success { created: Option<EntityId> },
    Failure(FailureReason),
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self::Success { created: None }
    }

    pub fn created(entity: EntityId) -> Self {
        Self::Success {
            created: Some(entity),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Failure(FailureReason::Rejected(reason.into()))
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn created_entity(&self) -> Option<EntityId> {
        match self {
            Self::Success { created } => *created,
            Self::Failure(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command transport is unavailable")]
pub struct TransportRejected;

/// Asynchronous submission side of the world.
///
/// An accepted submission must later be resolved exactly once through
/// `Orchestrator::deliver` with the returned ticket.
pub trait CommandGateway {
    fn submit(&mut self, command: &Command) -> Result<Ticket, TransportRejected>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_kind_tokens_parse_back() {
        for token in ["send_to_depot", "sell_all_in_depot", "start_all"] {
            let kind = CommandKind::parse(token).expect("known kind");
            assert_eq!(kind.as_str(), token);
        }
        assert_eq!(CommandKind::parse("launch_rockets"), None);
    }

    #[test]
    fn fleet_wide_commands_target_origin() {
        let command = Command::StartAll { agent: AgentId(1) };
        assert_eq!(command.location(), Location::ORIGIN);
        let sell = Command::SellAllInDepot {
            depot: Location::new(4, 2),
            agent: AgentId(1),
        };
        assert_eq!(sell.location(), Location::new(4, 2));
        assert!(!sell.creates_entity());
    }

    #[test]
    fn outcome_exposes_created_entity_only_on_success() {
        assert_eq!(
            CommandOutcome::created(EntityId(9)).created_entity(),
            Some(EntityId(9))
        );
        assert_eq!(CommandOutcome::rejected("nope").created_entity(), None);
        assert!(!CommandOutcome::Failure(FailureReason::TransportRejected).succeeded());
    }
}
