use std::sync::Arc;
use std::time::Duration;

use strum::{Display, EnumIter};
use time::Date;
use uuid::Uuid;

use crate::api::{FormPayload, PlanRequest, PlanResponse, PreviewRequest, RecommendResponse, TripBackend};
use crate::form::TripForm;
use crate::poi::{Poi, PoiPool, PoiSelection};
use crate::session::{FetchFailure, PendingFetch, SessionError};
use crate::trip::{minimum_required, parse_calendar_date, DayKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum WizardStep {
    Design,
    Recommend,
    Plan,
    Preview,
}

impl WizardStep {
    pub fn number(self) -> usize {
        match self {
            WizardStep::Design => 1,
            WizardStep::Recommend => 2,
            WizardStep::Plan => 3,
            WizardStep::Preview => 4,
        }
    }
}

#[derive(Debug)]
pub enum StepFetch {
    Recommend(PendingFetch<RecommendResponse>),
    More(PendingFetch<Vec<Poi>>),
    Plan(PendingFetch<PlanResponse>),
}

impl StepFetch {
    pub fn label(&self) -> &'static str {
        match self {
            StepFetch::Recommend(fetch) => fetch.label(),
            StepFetch::More(fetch) => fetch.label(),
            StepFetch::Plan(fetch) => fetch.label(),
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Recommended { cards: usize },
    MoreLoaded { added: usize },
    Planned { days: usize },
    Failed { label: &'static str, failure: FetchFailure },
}

enum Settled {
    Recommend(RecommendResponse),
    More(Vec<Poi>),
    Plan(PlanResponse),
}

/// Result of a like/skip on the recommendation deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckMove {
    Liked(String),
    Skipped(String),
    Exhausted,
}

/// Everything one trip carries from the design form to the preview.
///
/// Collections start empty and are only replaced by backend responses, so a
/// step never has to special-case "not loaded yet".
#[derive(Debug)]
pub struct TripSession {
    id: Uuid,
    pub form: TripForm,
    step: WizardStep,
    cards: Vec<Poi>,
    pool: PoiPool,
    selection: PoiSelection,
    deck_cursor: usize,
    plan: Option<PlanResponse>,
    pending: Option<StepFetch>,
    timeout: Duration,
}

impl TripSession {
    pub fn new(form: TripForm, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            form,
            step: WizardStep::Design,
            cards: Vec::new(),
            pool: PoiPool::default(),
            selection: PoiSelection::default(),
            deck_cursor: 0,
            plan: None,
            pending: None,
            timeout,
        }
    }

    /// Random id tagging this trip's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn cards(&self) -> &[Poi] {
        &self.cards
    }

    pub fn pool(&self) -> &PoiPool {
        &self.pool
    }

    pub fn selection(&self) -> &PoiSelection {
        &self.selection
    }

    pub fn plan(&self) -> Option<&PlanResponse> {
        self.plan.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_label(&self) -> Option<&'static str> {
        self.pending.as_ref().map(StepFetch::label)
    }

    pub fn minimum_required(&self) -> u32 {
        minimum_required(&self.form.start_date, &self.form.end_date, self.form.intensity)
    }

    pub fn can_request_plan(&self) -> bool {
        self.selection.can_submit(self.minimum_required())
    }

    pub fn selected_pois(&self) -> Vec<&Poi> {
        self.selection
            .ids()
            .iter()
            .filter_map(|id| self.pool.get(id))
            .collect()
    }

    pub fn current_card(&self) -> Option<&Poi> {
        self.cards.get(self.deck_cursor)
    }

    /// Zero-based cursor and deck length.
    pub fn deck_position(&self) -> (usize, usize) {
        (self.deck_cursor, self.cards.len())
    }

    pub fn like(&mut self) -> DeckMove {
        let Some(card) = self.cards.get(self.deck_cursor) else {
            return DeckMove::Exhausted;
        };
        let id = card.id.clone();
        self.selection.select(&id);
        self.deck_cursor += 1;
        DeckMove::Liked(id)
    }

    pub fn skip(&mut self) -> DeckMove {
        let Some(card) = self.cards.get(self.deck_cursor) else {
            return DeckMove::Exhausted;
        };
        let id = card.id.clone();
        self.deck_cursor += 1;
        DeckMove::Skipped(id)
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        self.selection.remove(id)
    }

    pub fn request_recommendations(
        &mut self,
        backend: &Arc<dyn TripBackend>,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if let Err(errors) = self.form.validate() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SessionError::InvalidForm(joined));
        }
        let payload = FormPayload::from(&self.form);
        tracing::info!(trip = %self.id, to = %self.form.to, "requesting recommendations");
        let backend = Arc::clone(backend);
        let fetch = PendingFetch::spawn("/recommend", self.timeout, move || {
            backend.recommend(&payload)
        })?;
        self.pending = Some(StepFetch::Recommend(fetch));
        Ok(())
    }

    pub fn request_more(
        &mut self,
        backend: &Arc<dyn TripBackend>,
        page_size: usize,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let start = self.cards.len();
        let backend = Arc::clone(backend);
        let fetch = PendingFetch::spawn("/recommend/more", self.timeout, move || {
            backend.recommend_more(start, page_size)
        })?;
        self.pending = Some(StepFetch::More(fetch));
        Ok(())
    }

    pub fn request_plan(&mut self, backend: &Arc<dyn TripBackend>) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let request = self.plan_request()?;
        tracing::info!(trip = %self.id, selected = request.accepted_pois.len(), "requesting plan");
        let backend = Arc::clone(backend);
        let fetch = PendingFetch::spawn("/plan", self.timeout, move || backend.plan(&request))?;
        self.pending = Some(StepFetch::Plan(fetch));
        Ok(())
    }

    pub fn plan_request(&self) -> Result<PlanRequest, SessionError> {
        let required = self.minimum_required();
        if !self.selection.can_submit(required) {
            return Err(SessionError::BelowMinimum {
                selected: self.selection.len(),
                required,
            });
        }
        Ok(PlanRequest {
            accepted_pois: self.selection.ids().to_vec(),
            all_pois: self.pool.to_vec(),
            form: FormPayload::from(&self.form),
        })
    }

    /// Applies a finished fetch, if any. Called once per UI tick.
    pub fn poll(&mut self) -> Option<StepOutcome> {
        let settled = match self.pending.as_ref()? {
            StepFetch::Recommend(fetch) => fetch.poll()?.map(Settled::Recommend),
            StepFetch::More(fetch) => fetch.poll()?.map(Settled::More),
            StepFetch::Plan(fetch) => fetch.poll()?.map(Settled::Plan),
        };
        let label = self.pending.take().map(|fetch| fetch.label()).unwrap_or_default();
        let outcome = match settled {
            Ok(Settled::Recommend(response)) => {
                self.apply_recommendations(response);
                StepOutcome::Recommended {
                    cards: self.cards.len(),
                }
            }
            Ok(Settled::More(cards)) => StepOutcome::MoreLoaded {
                added: self.append_cards(cards),
            },
            Ok(Settled::Plan(response)) => {
                let days = response.plan.len();
                self.apply_plan(response);
                StepOutcome::Planned { days }
            }
            Err(failure) => StepOutcome::Failed { label, failure },
        };
        Some(outcome)
    }

    /// Replaces the deck and pool with a fresh `/recommend` response.
    pub fn apply_recommendations(&mut self, response: RecommendResponse) {
        self.pool = PoiPool::from_cards(response.all_pois);
        self.cards.clear();
        self.deck_cursor = 0;
        self.selection = PoiSelection::default();
        self.plan = None;
        self.append_cards(response.cards);
        self.step = WizardStep::Recommend;
    }

    /// Appends cards not already on the deck; returns how many were new.
    pub fn append_cards(&mut self, cards: Vec<Poi>) -> usize {
        let mut added = 0;
        for poi in cards.into_iter().filter_map(Poi::sanitized) {
            if self.cards.iter().any(|existing| existing.id == poi.id) {
                continue;
            }
            self.pool.extend(std::iter::once(poi.clone()));
            self.cards.push(poi);
            added += 1;
        }
        added
    }

    pub fn apply_plan(&mut self, response: PlanResponse) {
        if response.plan.is_empty() {
            tracing::warn!("backend returned an empty plan");
        }
        self.plan = Some(response);
        self.step = WizardStep::Plan;
    }

    pub fn preview_request(&self) -> Result<PreviewRequest, SessionError> {
        let plan = self.plan.as_ref().ok_or(SessionError::NoPlan)?;
        Ok(PreviewRequest {
            plan: plan.plan.clone(),
            options: plan.options.clone(),
        })
    }

    /// First and last trip day for the preview calendar.
    ///
    /// Prefers the plan options, then the plan's own day keys, then the form.
    pub fn trip_bounds(&self) -> Option<(Date, Date)> {
        let from_options = self.plan.as_ref().and_then(|plan| {
            let start = plan.option_str("start_datetime").and_then(parse_calendar_date)?;
            let end = plan.option_str("end_datetime").and_then(parse_calendar_date)?;
            Some((start, end))
        });
        let from_keys = || {
            let plan = self.plan.as_ref()?;
            let mut keys = plan.plan.keys().filter_map(|key| DayKey::parse(key));
            let first = keys.next()?;
            let last = keys.last().unwrap_or(first);
            Some((first.date(), last.date()))
        };
        let from_form = || Some((self.form.start()?, parse_calendar_date(&self.form.end_date)?));
        from_options
            .or_else(from_keys)
            .or_else(from_form)
            .filter(|(start, end)| start <= end)
    }

    pub fn enter_preview(&mut self) -> Result<(), SessionError> {
        if self.plan.is_none() {
            return Err(SessionError::NoPlan);
        }
        self.step = WizardStep::Preview;
        Ok(())
    }

    /// Returns to the deck with form, pool and picks intact. The old plan is
    /// dropped so the next preview is fetched fresh.
    pub fn edit_trip(&mut self) {
        tracing::info!(trip = %self.id, selected = self.selection.len(), "editing trip");
        self.plan = None;
        self.step = WizardStep::Recommend;
    }

    pub fn back_to_design(&mut self) {
        self.step = WizardStep::Design;
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match &self.pending {
            Some(fetch) => Err(SessionError::FetchInFlight(fetch.label())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::form::tests::sample_form;
    use crate::poi::tests::poi;
    use crate::timeline::ScheduleBlock;
    use assert_matches::assert_matches;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::thread;
    use std::time::Instant;

    /// Canned backend: four deck cards, a two-day plan, one preview day.
    #[derive(Default)]
    pub(crate) struct StubBackend {
        pub delay: Option<Duration>,
        pub fail_plan: bool,
    }

    impl TripBackend for StubBackend {
        fn recommend(&self, _form: &FormPayload) -> Result<RecommendResponse, ApiError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            Ok(RecommendResponse {
                cards: (0..4).map(|n| poi(&format!("p{n}"), 40.7, -74.0)).collect(),
                all_pois: (0..6).map(|n| poi(&format!("p{n}"), 40.7, -74.0)).collect(),
            })
        }

        fn recommend_more(&self, start: usize, size: usize) -> Result<Vec<Poi>, ApiError> {
            Ok((start..start + size)
                .map(|n| poi(&format!("p{n}"), 40.7, -74.0))
                .collect())
        }

        fn plan(&self, request: &PlanRequest) -> Result<PlanResponse, ApiError> {
            if self.fail_plan {
                return Err(ApiError::Status {
                    endpoint: "/plan",
                    status: 500,
                    body: "boom".into(),
                });
            }
            let ids = &request.accepted_pois;
            serde_json::from_value(json!({
                "plan": {
                    "Fri, 04 Apr 2025 00:00:00 GMT": [{ "id": ids[0], "name": "first", "lat": 40.7, "lng": -74.0 }],
                    "Sat, 05 Apr 2025 00:00:00 GMT": [{ "id": ids[1], "name": "second", "lat": 40.7, "lng": -74.0 }]
                },
                "options": {}
            }))
            .map_err(|source| ApiError::Decode {
                endpoint: "/plan",
                source,
            })
        }

        fn preview(
            &self,
            _request: &PreviewRequest,
        ) -> Result<IndexMap<String, Vec<ScheduleBlock>>, ApiError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            let mut days = IndexMap::new();
            days.insert(
                "2025-04-04".to_string(),
                vec![crate::timeline::block::tests::activity("a", "09:00", "10:00", "Meal")],
            );
            Ok(days)
        }
    }

    pub(crate) fn settle(session: &mut TripSession) -> StepOutcome {
        let give_up = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = session.poll() {
                return outcome;
            }
            assert!(Instant::now() < give_up, "step fetch never settled");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn backend(stub: StubBackend) -> Arc<dyn TripBackend> {
        Arc::new(stub)
    }

    #[test]
    fn new_session_starts_empty_at_design() {
        let session = TripSession::new(sample_form(), Duration::from_secs(5));
        assert_eq!(session.step(), WizardStep::Design);
        assert!(session.cards().is_empty() && session.pool().is_empty());
        assert!(session.plan().is_none());
        assert_eq!(session.minimum_required(), 8);
    }

    #[test]
    fn recommend_then_swipe_then_plan() -> anyhow::Result<()> {
        let backend = backend(StubBackend::default());
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        session.request_recommendations(&backend)?;
        assert_matches!(settle(&mut session), StepOutcome::Recommended { cards: 4 });
        assert_eq!(session.step(), WizardStep::Recommend);
        assert_eq!(session.pool().len(), 6);

        assert_eq!(session.like(), DeckMove::Liked("p0".into()));
        assert_eq!(session.skip(), DeckMove::Skipped("p1".into()));
        assert_eq!(session.like(), DeckMove::Liked("p2".into()));
        assert_eq!(session.like(), DeckMove::Liked("p3".into()));
        assert_eq!(session.like(), DeckMove::Exhausted);
        assert!(!session.can_request_plan());
        assert_matches!(
            session.request_plan(&backend),
            Err(SessionError::BelowMinimum { selected: 3, required: 8 })
        );

        session.request_more(&backend, 6)?;
        assert_matches!(settle(&mut session), StepOutcome::MoreLoaded { added: 6 });
        while let DeckMove::Liked(_) = session.like() {}
        assert_eq!(session.selection().len(), 9);
        assert!(session.can_request_plan());

        session.request_plan(&backend)?;
        assert_matches!(settle(&mut session), StepOutcome::Planned { days: 2 });
        assert_eq!(session.step(), WizardStep::Plan);
        let request = session.preview_request()?;
        assert_eq!(request.plan.len(), 2);
        Ok(())
    }

    #[test]
    fn second_request_while_busy_is_refused() -> anyhow::Result<()> {
        let backend = backend(StubBackend {
            delay: Some(Duration::from_millis(200)),
            ..StubBackend::default()
        });
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        session.request_recommendations(&backend)?;
        assert!(session.is_busy());
        assert_matches!(
            session.request_recommendations(&backend),
            Err(SessionError::FetchInFlight("/recommend"))
        );
        settle(&mut session);
        assert!(!session.is_busy());
        Ok(())
    }

    #[test]
    fn invalid_form_never_reaches_the_backend() {
        let backend = backend(StubBackend::default());
        let mut form = sample_form();
        form.to.clear();
        let mut session = TripSession::new(form, Duration::from_secs(5));
        assert_matches!(
            session.request_recommendations(&backend),
            Err(SessionError::InvalidForm(message)) if message.contains("destination")
        );
        assert!(!session.is_busy());
    }

    #[test]
    fn plan_failure_keeps_the_deck() -> anyhow::Result<()> {
        let backend = backend(StubBackend {
            fail_plan: true,
            ..StubBackend::default()
        });
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        session.apply_recommendations(RecommendResponse {
            cards: (0..8).map(|n| poi(&format!("p{n}"), 1.0, 1.0)).collect(),
            all_pois: Vec::new(),
        });
        while let DeckMove::Liked(_) = session.like() {}
        session.request_plan(&backend)?;
        assert_matches!(
            settle(&mut session),
            StepOutcome::Failed { label: "/plan", failure: FetchFailure::Api(ApiError::Status { status: 500, .. }) }
        );
        assert_eq!(session.step(), WizardStep::Recommend);
        assert_eq!(session.selection().len(), 8);
        Ok(())
    }

    #[test]
    fn more_cards_are_deduplicated() {
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        session.apply_recommendations(RecommendResponse {
            cards: vec![poi("a", 1.0, 1.0)],
            all_pois: Vec::new(),
        });
        let added = session.append_cards(vec![poi("a", 1.0, 1.0), poi("b", 1.0, 1.0), poi(" ", 1.0, 1.0)]);
        assert_eq!(added, 1);
        assert_eq!(session.deck_position(), (0, 2));
        assert!(session.pool().get("b").is_some());
    }

    #[test]
    fn trip_bounds_fall_back_through_options_keys_and_form() {
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        let april = |day| Date::from_calendar_date(2025, time::Month::April, day).ok();
        assert_eq!(session.trip_bounds(), april(4).zip(april(7)));

        session.apply_plan(PlanResponse {
            plan: [
                ("2025-04-05".to_string(), Vec::new()),
                ("2025-04-06".to_string(), Vec::new()),
            ]
            .into_iter()
            .collect(),
            options: Default::default(),
        });
        assert_eq!(session.trip_bounds(), april(5).zip(april(6)));

        let mut options = serde_json::Map::new();
        options.insert("start_datetime".into(), json!("2025-04-04T00:00:00"));
        options.insert("end_datetime".into(), json!("2025-04-08"));
        session.apply_plan(PlanResponse {
            plan: Default::default(),
            options,
        });
        assert_eq!(session.trip_bounds(), april(4).zip(april(8)));
    }

    #[test]
    fn edit_trip_keeps_picks_but_drops_plan() -> anyhow::Result<()> {
        let mut session = TripSession::new(sample_form(), Duration::from_secs(5));
        session.apply_recommendations(RecommendResponse {
            cards: vec![poi("a", 1.0, 1.0)],
            all_pois: Vec::new(),
        });
        session.like();
        session.apply_plan(PlanResponse::default());
        session.enter_preview()?;
        assert_eq!(session.step(), WizardStep::Preview);

        session.edit_trip();
        assert_eq!(session.step(), WizardStep::Recommend);
        assert_eq!(session.selection().ids(), ["a".to_string()]);
        assert_matches!(session.preview_request(), Err(SessionError::NoPlan));
        Ok(())
    }
}
