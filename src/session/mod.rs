//! Wizard state carried between steps and the backend fetches that move it forward.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

pub mod fetch;
pub mod preview;
pub mod wizard;

pub use fetch::PendingFetch;
pub use preview::{PreviewPhase, PreviewSession, PreviewState};
pub use wizard::{DeckMove, StepFetch, StepOutcome, TripSession, WizardStep};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a {0} request is already in flight")]
    FetchInFlight(&'static str),
    #[error("preview already {0}; restart it first")]
    NotIdle(PreviewPhase),
    #[error("{selected} POIs selected but {required} are required")]
    BelowMinimum { selected: usize, required: u32 },
    #[error("no plan has been generated yet")]
    NoPlan,
    #[error("trip form is invalid: {0}")]
    InvalidForm(String),
    #[error("could not start fetch worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Why a fetch ended without a usable response.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no response after {}s", .after.as_secs())]
    Timeout { after: Duration },
    #[error("fetch worker stopped unexpectedly")]
    WorkerLost,
}
