/// Ticks observed by the orchestrator. Waits are deadlines on this clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickClock {
    tick: u64,
}

impl TickClock {
    pub fn now(&self) -> u64 {
        self.tick
    }

    pub fn advance(&mut self) -> u64 {
        self.tick = self.tick.saturating_add(1);
        self.tick
    }

    pub fn deadline_after(&self, ticks: u64) -> u64 {
        self.tick.saturating_add(ticks)
    }

    pub fn has_reached(&self, deadline: u64) -> bool {
        self.tick >= deadline
    }
}
