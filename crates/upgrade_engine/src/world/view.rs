use super::{AgentId, Design, DesignId, EntityId, Instruction, Location, Region, UnitRole, VariantId};

/// Read-only queries the orchestrator is allowed to make against the world.
///
/// Per-entity queries return `None` when the entity no longer exists.
pub trait WorldView {
    /// Agent the operator currently controls; `None` when spectating.
    fn controlling_agent(&self) -> Option<AgentId>;

    fn resolve_variant(&self, name: &str) -> Option<VariantId>;

    /// Primary composite entities owned by `agent`, in stable world order.
    fn owned_entities(&self, agent: AgentId) -> Vec<EntityId>;

    fn is_stopped_in_depot(&self, entity: EntityId) -> Option<bool>;

    fn is_heading_to_depot(&self, entity: EntityId) -> Option<bool>;

    fn location(&self, entity: EntityId) -> Option<Location>;

    /// Identity shared by every entity that runs on the same instruction list.
    fn shared_group(&self, entity: EntityId) -> Option<EntityId>;

    fn instructions(&self, entity: EntityId) -> Option<Vec<Instruction>>;

    fn current_instruction(&self, entity: EntityId) -> Option<usize>;

    /// Roles of the physical units, head first.
    fn unit_roles(&self, entity: EntityId) -> Option<Vec<UnitRole>>;

    /// Head of the chain `unit` is currently part of.
    fn chain_head(&self, unit: EntityId) -> Option<EntityId>;

    /// Last unit of the chain headed by `head`.
    fn chain_tail(&self, head: EntityId) -> Option<EntityId>;

    fn infrastructure_at(&self, location: Location) -> Option<VariantId>;

    fn addressable_region(&self) -> Region;

    fn catalog(&self) -> Vec<Design>;

    fn is_buildable(&self, design: DesignId, agent: AgentId) -> bool;

    /// Whether units built for `design_variant` may legally run on `target`.
    fn runs_on(&self, design_variant: VariantId, target: VariantId) -> bool;
}
