//! Timeline presentation engine: block model, day store, time-axis layout and
//! the selection shared by the preview panels.

pub mod block;
pub mod clock;
pub mod normalize;
pub mod polyline;
pub mod selection;
pub mod store;

pub use block::{decode_blocks, ActivityBlock, BlockCategory, RouteBlock, ScheduleBlock};
pub use clock::{format_duration_minutes, ClockTime, MINUTES_PER_DAY};
pub use normalize::{
    normalize, normalize_with_gap, FreeTimeGap, NormalizedDay, PositionedBlock, SkipReason,
    SkippedBlock, DEFAULT_MIN_GAP_MINUTES,
};
pub use selection::{SelectionChange, SelectionCoordinator};
pub use store::{DayPlan, IngestReport, RejectedKey};
