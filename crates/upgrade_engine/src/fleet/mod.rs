mod planner;
mod snapshot;

pub use planner::{
    compare_by, pick_best, Acquisition, AcquisitionPlanner, RankKey, SelectionError,
    CARRIAGE_RANKING, TRACTION_RANKING,
};
pub use snapshot::{
    capture_fleet, resume_index_after, CompositionSignature, EntitySnapshot, FleetSnapshot,
    Route, RouteId, SnapshotError,
};
