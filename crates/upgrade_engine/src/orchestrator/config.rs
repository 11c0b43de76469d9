pub const TICKS_PER_SECOND: u32 = 30;
const SETTLE_SECONDS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub ticks_per_second: u32,
    /// Pause after dispatches, sales and conversion so the world can catch up.
    pub settle_delay_ticks: u64,
    /// Pause after each build, attach, clone-with-share and instruction edit.
    pub step_delay_ticks: u64,
    /// `None` retries the depot pass until every send is accepted.
    pub max_depot_retry_passes: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: TICKS_PER_SECOND,
            settle_delay_ticks: u64::from(TICKS_PER_SECOND * SETTLE_SECONDS),
            step_delay_ticks: 1,
            max_depot_retry_passes: None,
        }
    }
}

impl EngineConfig {
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        if self.ticks_per_second == 0 {
            return 0.0;
        }
        ticks as f64 / f64::from(self.ticks_per_second)
    }
}
