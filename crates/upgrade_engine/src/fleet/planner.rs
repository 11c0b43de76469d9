use std::cmp::Ordering;

use thiserror::Error;

use crate::world::{AgentId, CargoId, Design, DesignId, UnitRole, VariantId, WorldView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKey {
    TopSpeed,
    Power,
    Cost,
}

impl RankKey {
    fn value(self, design: &Design) -> u64 {
        match self {
            Self::TopSpeed => u64::from(design.top_speed),
            Self::Power => u64::from(design.power),
            Self::Cost => design.cost,
        }
    }
}

pub const TRACTION_RANKING: [RankKey; 3] = [RankKey::TopSpeed, RankKey::Power, RankKey::Cost];
pub const CARRIAGE_RANKING: [RankKey; 2] = [RankKey::TopSpeed, RankKey::Cost];

/// Lexicographic comparison over `keys`; higher values rank higher.
pub fn compare_by(keys: &[RankKey], a: &Design, b: &Design) -> Ordering {
    keys.iter()
        .map(|key| key.value(a).cmp(&key.value(b)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Best candidate under `keys`. Full ties keep the earliest candidate.
pub fn pick_best<'a>(
    candidates: impl IntoIterator<Item = &'a Design>,
    keys: &[RankKey],
) -> Option<&'a Design> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if compare_by(keys, candidate, current) != Ordering::Greater => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition {
    pub design: DesignId,
    pub refit: Option<CargoId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("cannot find a suitable engine for {variant}")]
    NoTraction { variant: VariantId },
    #[error("cannot find a suitable wagon for {cargo} on {variant}")]
    NoCarriage { cargo: CargoId, variant: VariantId },
}

pub struct AcquisitionPlanner<'w> {
    world: &'w dyn WorldView,
    agent: AgentId,
    target: VariantId,
    catalog: Vec<Design>,
}

impl<'w> AcquisitionPlanner<'w> {
    pub fn new(world: &'w dyn WorldView, agent: AgentId, target: VariantId) -> Self {
        Self {
            world,
            agent,
            target,
            catalog: world.catalog(),
        }
    }

    pub fn select(
        &self,
        role: UnitRole,
        dominant_cargo: Option<CargoId>,
    ) -> Result<Acquisition, SelectionError> {
        match role {
            UnitRole::Traction => self.select_traction(dominant_cargo),
            UnitRole::Cargo(cargo) => self.select_carriage(cargo),
        }
    }

    fn buildable(&self, design: &Design) -> bool {
        self.world.is_buildable(design.id, self.agent)
    }

    fn select_traction(
        &self,
        dominant_cargo: Option<CargoId>,
    ) -> Result<Acquisition, SelectionError> {
        // Traction must match the target exactly, unlike carriages.
        let candidates = self.catalog.iter().filter(|design| {
            design.is_traction() && design.variant == self.target && self.buildable(design)
        });
        let best = pick_best(candidates, &TRACTION_RANKING).ok_or(SelectionError::NoTraction {
            variant: self.target,
        })?;
        let refit = dominant_cargo.filter(|cargo| best.can_refit_to(*cargo));
        Ok(Acquisition {
            design: best.id,
            refit,
        })
    }

    fn select_carriage(&self, cargo: CargoId) -> Result<Acquisition, SelectionError> {
        let candidates = self.catalog.iter().filter(|design| {
            !design.is_traction()
                && self.world.runs_on(design.variant, self.target)
                && design.can_refit_to(cargo)
                && self.buildable(design)
        });
        let best = pick_best(candidates, &CARRIAGE_RANKING).ok_or(SelectionError::NoCarriage {
            cargo,
            variant: self.target,
        })?;
        Ok(Acquisition {
            design: best.id,
            refit: Some(cargo),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;
    use crate::world::AgentId;

    const AGENT: AgentId = AgentId(1);
    const RAIL: VariantId = VariantId(0);
    const ELECTRIC: VariantId = VariantId(1);
    const COAL: CargoId = CargoId(0);
    const MAIL: CargoId = CargoId(1);

    fn design(id: u32, variant: VariantId, speed: u32, power: u32, cost: u64) -> Design {
        Design {
            id: DesignId(id),
            variant,
            top_speed: speed,
            power,
            cost,
            refittable: Vec::new(),
        }
    }

    fn world_with(designs: Vec<Design>) -> SimWorld {
        let mut world = SimWorld::standard_test_world();
        world.clear_catalog();
        for design in designs {
            world.add_design(design, None);
        }
        world
    }

    #[test]
    fn traction_prefers_speed_then_power_then_cost() {
        let world = world_with(vec![
            design(1, ELECTRIC, 100, 900, 10),
            design(2, ELECTRIC, 120, 500, 10),
            design(3, ELECTRIC, 120, 800, 5),
            design(4, ELECTRIC, 120, 800, 50),
            design(5, RAIL, 300, 2000, 99),
        ]);
        let planner = AcquisitionPlanner::new(&world, AGENT, ELECTRIC);
        let picked = planner.select(UnitRole::Traction, None).expect("traction");
        assert_eq!(picked.design, DesignId(4));
        assert_eq!(picked.refit, None);
    }

    #[test]
    fn carriage_accepts_compatible_variant_and_ignores_power_rank() {
        let mut slow = design(10, RAIL, 80, 0, 40);
        slow.refittable = vec![COAL];
        let mut fast_cheap = design(11, RAIL, 120, 0, 10);
        fast_cheap.refittable = vec![COAL, MAIL];
        let mut fast_pricey = design(12, ELECTRIC, 120, 0, 20);
        fast_pricey.refittable = vec![COAL];
        let mut wrong_cargo = design(13, ELECTRIC, 200, 0, 90);
        wrong_cargo.refittable = vec![MAIL];
        let world = world_with(vec![slow, fast_cheap, fast_pricey, wrong_cargo]);

        let planner = AcquisitionPlanner::new(&world, AGENT, ELECTRIC);
        let picked = planner.select(UnitRole::Cargo(COAL), None).expect("wagon");
        assert_eq!(picked.design, DesignId(12));
        assert_eq!(picked.refit, Some(COAL));
    }

    #[test]
    fn traction_refits_to_dominant_cargo_only_when_supported() {
        let mut engine = design(1, ELECTRIC, 100, 900, 10);
        engine.refittable = vec![MAIL];
        let world = world_with(vec![engine]);
        let planner = AcquisitionPlanner::new(&world, AGENT, ELECTRIC);

        let with_mail = planner.select(UnitRole::Traction, Some(MAIL)).expect("mail");
        assert_eq!(with_mail.refit, Some(MAIL));
        let with_coal = planner.select(UnitRole::Traction, Some(COAL)).expect("coal");
        assert_eq!(with_coal.refit, None);
    }

    #[test]
    fn unbuildable_designs_are_skipped() {
        let mut world = world_with(vec![design(1, ELECTRIC, 100, 900, 10)]);
        world.add_design(design(2, ELECTRIC, 500, 900, 10), Some(vec![AgentId(7)]));
        let planner = AcquisitionPlanner::new(&world, AGENT, ELECTRIC);
        assert_eq!(
            planner.select(UnitRole::Traction, None).expect("pick").design,
            DesignId(1)
        );
    }

    #[test]
    fn empty_candidate_sets_are_selection_failures() {
        let world = world_with(vec![design(1, RAIL, 100, 900, 10)]);
        let planner = AcquisitionPlanner::new(&world, AGENT, ELECTRIC);
        assert_eq!(
            planner.select(UnitRole::Traction, None),
            Err(SelectionError::NoTraction { variant: ELECTRIC })
        );
        assert_eq!(
            planner.select(UnitRole::Cargo(COAL), None),
            Err(SelectionError::NoCarriage {
                cargo: COAL,
                variant: ELECTRIC
            })
        );
    }

    #[test]
    fn full_ties_are_deterministic_and_keep_catalog_order() {
        let designs = vec![
            design(7, ELECTRIC, 100, 900, 10),
            design(3, ELECTRIC, 100, 900, 10),
        ];
        let first = pick_best(designs.iter(), &TRACTION_RANKING).expect("best");
        for _ in 0..8 {
            let again = pick_best(designs.iter(), &TRACTION_RANKING).expect("best");
            assert_eq!(again.id, first.id);
        }
        assert_eq!(first.id, DesignId(7));
        assert_eq!(
            compare_by(&CARRIAGE_RANKING, &designs[0], &designs[1]),
            Ordering::Equal
        );
    }
}
