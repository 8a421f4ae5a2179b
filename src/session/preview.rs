use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use strum::Display;

use crate::api::{PreviewRequest, TripBackend};
use crate::session::{FetchFailure, PendingFetch, SessionError};
use crate::timeline::{DayPlan, IngestReport, ScheduleBlock, SelectionCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PreviewPhase {
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
pub enum PreviewState {
    Idle,
    Loading(PendingFetch<IndexMap<String, Vec<ScheduleBlock>>>),
    Ready { plan: DayPlan, report: IngestReport },
    Failed(FetchFailure),
}

impl PreviewState {
    pub fn phase(&self) -> PreviewPhase {
        match self {
            PreviewState::Idle => PreviewPhase::Idle,
            PreviewState::Loading(_) => PreviewPhase::Loading,
            PreviewState::Ready { .. } => PreviewPhase::Ready,
            PreviewState::Failed(_) => PreviewPhase::Failed,
        }
    }
}

/// One visit to the preview step: the `/preview` fetch, the ingested plan and
/// the block selection shared by the map, time axis and text list.
///
/// `Ready` and `Failed` stay put until [`PreviewSession::restart`]; nothing
/// retries on its own.
#[derive(Debug)]
pub struct PreviewSession {
    state: PreviewState,
    selection: SelectionCoordinator,
    timeout: Duration,
}

impl PreviewSession {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: PreviewState::Idle,
            selection: SelectionCoordinator::new(),
            timeout,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn phase(&self) -> PreviewPhase {
        self.state.phase()
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn plan(&self) -> Option<&DayPlan> {
        match &self.state {
            PreviewState::Ready { plan, .. } => Some(plan),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&IngestReport> {
        match &self.state {
            PreviewState::Ready { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.state {
            PreviewState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn begin(
        &mut self,
        backend: &Arc<dyn TripBackend>,
        request: PreviewRequest,
    ) -> Result<(), SessionError> {
        match self.phase() {
            PreviewPhase::Idle => {}
            PreviewPhase::Loading => return Err(SessionError::FetchInFlight("/preview")),
            settled => return Err(SessionError::NotIdle(settled)),
        }
        let backend = Arc::clone(backend);
        let fetch = PendingFetch::spawn("/preview", self.timeout, move || backend.preview(&request))?;
        self.state = PreviewState::Loading(fetch);
        Ok(())
    }

    /// Moves `Loading` forward when the fetch has settled. Returns true on a
    /// phase change.
    pub fn poll(&mut self) -> bool {
        let PreviewState::Loading(fetch) = &self.state else {
            return false;
        };
        let Some(result) = fetch.poll() else {
            return false;
        };
        self.state = match result {
            Ok(raw) => {
                let (plan, report) = DayPlan::ingest(raw);
                tracing::info!(
                    days = plan.len(),
                    blocks = plan.total_blocks(),
                    rejected = report.rejected.len(),
                    "preview ready"
                );
                PreviewState::Ready { plan, report }
            }
            Err(failure) => PreviewState::Failed(failure),
        };
        true
    }

    /// Back to `Idle` with a fresh selection cell. An in-flight fetch is abandoned.
    pub fn restart(&mut self) {
        if let PreviewState::Loading(fetch) = &self.state {
            tracing::debug!(elapsed_ms = fetch.elapsed().as_millis() as u64, "abandoning preview fetch");
        }
        self.state = PreviewState::Idle;
        self.selection = SelectionCoordinator::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::wizard::tests::StubBackend;
    use crate::trip::DayKey;
    use assert_matches::assert_matches;
    use std::thread;
    use std::time::Instant;

    fn settle(session: &mut PreviewSession) {
        let give_up = Instant::now() + Duration::from_secs(5);
        while !session.poll() {
            assert!(Instant::now() < give_up, "preview never settled");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn request() -> PreviewRequest {
        PreviewRequest {
            plan: Default::default(),
            options: Default::default(),
        }
    }

    #[test]
    fn idle_to_ready_ingests_the_plan() -> anyhow::Result<()> {
        let backend: Arc<dyn TripBackend> = Arc::new(StubBackend::default());
        let mut session = PreviewSession::new(Duration::from_secs(5));
        assert_eq!(session.phase(), PreviewPhase::Idle);
        session.begin(&backend, request())?;
        assert_eq!(session.phase(), PreviewPhase::Loading);
        settle(&mut session);

        assert_eq!(session.phase(), PreviewPhase::Ready);
        let plan = session.plan().expect("ready plan");
        let day = DayKey::parse("2025-04-04").expect("day key");
        assert_eq!(plan.blocks(day).len(), 1);
        assert!(session.report().is_some_and(IngestReport::is_clean));
        Ok(())
    }

    #[test]
    fn ready_is_terminal_until_restart() -> anyhow::Result<()> {
        let backend: Arc<dyn TripBackend> = Arc::new(StubBackend::default());
        let mut session = PreviewSession::new(Duration::from_secs(5));
        session.begin(&backend, request())?;
        settle(&mut session);
        assert_matches!(
            session.begin(&backend, request()),
            Err(SessionError::NotIdle(PreviewPhase::Ready))
        );

        session.selection().set_active(Some("a"));
        let old_selection = session.selection().clone();
        session.restart();
        assert_eq!(session.phase(), PreviewPhase::Idle);
        assert!(session.selection().active().is_none());
        assert_eq!(old_selection.active().as_deref(), Some("a"));
        session.begin(&backend, request())?;
        Ok(())
    }

    #[test]
    fn second_begin_while_loading_is_refused() -> anyhow::Result<()> {
        let backend: Arc<dyn TripBackend> = Arc::new(StubBackend {
            delay: Some(Duration::from_millis(200)),
            ..StubBackend::default()
        });
        let mut session = PreviewSession::new(Duration::from_secs(5));
        session.begin(&backend, request())?;
        assert_matches!(
            session.begin(&backend, request()),
            Err(SessionError::FetchInFlight("/preview"))
        );
        Ok(())
    }

    #[test]
    fn slow_backend_times_out_into_failed() -> anyhow::Result<()> {
        let backend: Arc<dyn TripBackend> = Arc::new(StubBackend {
            delay: Some(Duration::from_millis(500)),
            ..StubBackend::default()
        });
        let mut session = PreviewSession::new(Duration::from_millis(20));
        session.begin(&backend, request())?;
        settle(&mut session);
        assert_matches!(session.failure(), Some(FetchFailure::Timeout { .. }));
        assert!(!session.poll());
        assert_eq!(session.phase(), PreviewPhase::Failed);
        Ok(())
    }
}
