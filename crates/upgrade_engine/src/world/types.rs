use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CargoId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DesignId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: u32,
    pub y: u32,
}

impl Location {
    pub const ORIGIN: Location = Location { x: 0, y: 0 };

    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Inclusive rectangle of addressable tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub from: Location,
    pub to: Location,
}

impl Region {
    pub fn contains(&self, location: Location) -> bool {
        let (min_x, max_x) = (self.from.x.min(self.to.x), self.from.x.max(self.to.x));
        let (min_y, max_y) = (self.from.y.min(self.to.y), self.from.y.max(self.to.y));
        (min_x..=max_x).contains(&location.x) && (min_y..=max_y).contains(&location.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    Traction,
    Cargo(CargoId),
}

impl UnitRole {
    pub fn cargo(self) -> Option<CargoId> {
        match self {
            Self::Traction => None,
            Self::Cargo(cargo) => Some(cargo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    GoToDepot(Location),
    /// Packed descriptor the engine never interprets; copied verbatim.
    Other(u64),
}

impl Instruction {
    pub fn targets_depot(&self, depot: Location) -> bool {
        matches!(self, Self::GoToDepot(target) if *target == depot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Design {
    pub id: DesignId,
    pub variant: VariantId,
    pub top_speed: u32,
    pub power: u32,
    pub cost: u64,
    #[serde(default)]
    pub refittable: Vec<CargoId>,
}

impl Design {
    pub fn is_traction(&self) -> bool {
        self.power > 0
    }

    pub fn can_refit_to(&self, cargo: CargoId) -> bool {
        self.refittable.contains(&cargo)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant#{}", self.0)
    }
}

impl fmt::Display for CargoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cargo#{}", self.0)
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "design#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_contains_is_inclusive_and_order_independent() {
        let region = Region {
            from: Location::new(9, 9),
            to: Location::new(1, 1),
        };
        assert!(region.contains(Location::new(1, 1)));
        assert!(region.contains(Location::new(9, 5)));
        assert!(!region.contains(Location::new(0, 5)));
        assert!(!region.contains(Location::new(5, 10)));
    }

    #[test]
    fn instruction_decodes_from_scenario_form() {
        let decoded: Vec<Instruction> =
            serde_json::from_str(r#"[{"go_to_depot":{"x":3,"y":4}},{"other":17}]"#)
                .expect("decode");
        assert_eq!(
            decoded,
            vec![
                Instruction::GoToDepot(Location::new(3, 4)),
                Instruction::Other(17)
            ]
        );
        assert!(decoded[0].targets_depot(Location::new(3, 4)));
        assert!(!decoded[1].targets_depot(Location::new(3, 4)));
    }

    #[test]
    fn unit_role_orders_traction_before_cargo() {
        assert!(UnitRole::Traction < UnitRole::Cargo(CargoId(0)));
        assert_eq!(UnitRole::Cargo(CargoId(2)).cargo(), Some(CargoId(2)));
        assert_eq!(UnitRole::Traction.cargo(), None);
    }
}
