use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::api::TripBackend;
use crate::config::AppConfig;
use crate::form::TripForm;
use crate::session::{DeckMove, PreviewPhase, PreviewSession, StepOutcome, TripSession, WizardStep};
use crate::timeline::ScheduleBlock;
use crate::trip::DayKey;
use crate::ui;

mod actions;
pub mod state;

use self::actions::{map_key, Action};
pub use state::{AppState, DeckFocus, FormField, ListEntry, MapRoute, Overlay, PreviewView};

pub struct App {
    pub config: Arc<AppConfig>,
    backend: Arc<dyn TripBackend>,
    session: TripSession,
    preview: PreviewSession,
    state: AppState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, backend: Arc<dyn TripBackend>, form: TripForm) -> Self {
        let timeout = config.backend.request_timeout();
        let state = AppState::new(config.timeline.min_gap_minutes);
        Self {
            session: TripSession::new(form, timeout),
            preview: PreviewSession::new(timeout),
            config,
            backend,
            state,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn session(&self) -> &TripSession {
        &self.session
    }

    pub fn preview(&self) -> &PreviewSession {
        &self.preview
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Sends the form straight to `/recommend`; used when the trip came from the command line.
    pub fn submit_form(&mut self) {
        self.state.form_errors.clear();
        if let Err(errors) = self.session.form.validate() {
            self.state.form_errors = errors.iter().map(ToString::to_string).collect();
            self.state
                .set_status_message(Some("Fix the highlighted fields before continuing"));
            return;
        }
        match self.session.request_recommendations(&self.backend) {
            Ok(()) => self
                .state
                .set_status_message(Some("Fetching recommendations…")),
            Err(err) => self.state.set_status_message(Some(err.to_string())),
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, &self.session, &self.preview, &self.state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let overlay_open = self.state.overlay().is_some();
        if let Some(action) = map_key(self.session.step(), overlay_open, key) {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::CloseOverlay => self.state.close_overlay(),
            Action::ShowHelp => self.state.open_overlay(Overlay::Help),
            Action::NextField => self.state.focus_next_field(),
            Action::PrevField => self.state.focus_previous_field(),
            Action::Input(ch) => self.state.form_field.input(&mut self.session.form, ch),
            Action::Backspace => self.state.form_field.backspace(&mut self.session.form),
            Action::CycleField => self.state.form_field.cycle(&mut self.session.form),
            Action::Submit => self.submit_form(),
            Action::Like | Action::Skip => self.handle_swipe(action),
            Action::LoadMore => self.load_more(),
            Action::ToggleFocus => self.state.toggle_deck_focus(),
            Action::RemoveSelected => self.remove_selected(),
            Action::RequestPlan => self.request_plan(),
            Action::Back => self.go_back(),
            Action::MoveDown => self.move_cursor(1),
            Action::MoveUp => self.move_cursor(-1),
            Action::OpenPreview => self.open_preview(),
            Action::NextDay => self.step_day(true),
            Action::PrevDay => self.step_day(false),
            Action::FirstDay => self.show_first_day(),
            Action::NextMonth => self.state.preview.page_month(1),
            Action::PrevMonth => self.state.preview.page_month(-1),
            Action::OpenDetails => self.open_details(),
            Action::EditTrip => self.edit_trip(),
            Action::Retry => self.retry_preview(),
        }
    }

    pub(crate) fn on_tick(&mut self) {
        if let Some(outcome) = self.session.poll() {
            self.handle_step_outcome(outcome);
        }
        if self.preview.poll() {
            self.handle_preview_settled();
        }
    }

    fn handle_step_outcome(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Recommended { cards } => {
                self.state.deck_focus = DeckFocus::Deck;
                self.state.selected_cursor = 0;
                let message = if cards == 0 {
                    "No recommendations came back; press m to load more".to_string()
                } else {
                    format!("{cards} recommendations ready")
                };
                self.state.set_status_message(Some(message));
            }
            StepOutcome::MoreLoaded { added } => {
                self.state
                    .set_status_message(Some(format!("Loaded {added} more card(s)")));
            }
            StepOutcome::Planned { days } => {
                self.state.plan_scroll = 0;
                let message = if days == 0 {
                    "No plan data found.".to_string()
                } else {
                    format!("Plan ready: {days} day(s). Press p to preview")
                };
                self.state.set_status_message(Some(message));
            }
            StepOutcome::Failed { label, failure } => {
                tracing::error!(label, %failure, "backend step failed");
                self.state
                    .set_status_message(Some(format!("{label} failed: {failure}")));
            }
        }
    }

    fn handle_preview_settled(&mut self) {
        match self.preview.phase() {
            PreviewPhase::Ready => {
                if let Some(report) = self.preview.report() {
                    if !report.rejected.is_empty() {
                        self.state.set_status_message(Some(format!(
                            "{} day(s) had unreadable dates and were left out",
                            report.rejected.len()
                        )));
                    } else {
                        self.state.clear_status_message();
                    }
                }
                self.show_first_day();
            }
            PreviewPhase::Failed => {
                let message = self
                    .preview
                    .failure()
                    .map(|failure| format!("Preview failed: {failure}. Press r to retry"))
                    .unwrap_or_default();
                self.state.set_status_message(Some(message));
            }
            PreviewPhase::Idle | PreviewPhase::Loading => {}
        }
    }

    fn handle_swipe(&mut self, action: Action) {
        if self.session.step() != WizardStep::Recommend {
            return;
        }
        let outcome = if action == Action::Like {
            self.session.like()
        } else {
            self.session.skip()
        };
        if outcome == DeckMove::Exhausted {
            self.load_more();
            return;
        }
        let required = self.session.minimum_required();
        let selected = self.session.selection().len();
        self.state.set_status_message(Some(format!("Selected {selected} / {required} required")));
    }

    fn load_more(&mut self) {
        let page_size = self.config.backend.more_page_size;
        match self.session.request_more(&self.backend, page_size) {
            Ok(()) => self.state.set_status_message(Some("Loading more cards…")),
            Err(err) => self.state.set_status_message(Some(err.to_string())),
        }
    }

    fn remove_selected(&mut self) {
        let Some(id) = self
            .session
            .selection()
            .ids()
            .get(self.state.selected_cursor)
            .cloned()
        else {
            return;
        };
        if self.session.deselect(&id) {
            let len = self.session.selection().len();
            self.state.move_selected_cursor(0, len);
        }
    }

    fn request_plan(&mut self) {
        match self.session.request_plan(&self.backend) {
            Ok(()) => self.state.set_status_message(Some("Generating plan…")),
            Err(err) => self.state.set_status_message(Some(err.to_string())),
        }
    }

    fn go_back(&mut self) {
        match self.session.step() {
            WizardStep::Recommend => {
                self.session.back_to_design();
                self.state.clear_status_message();
            }
            WizardStep::Plan => self.edit_trip(),
            WizardStep::Design | WizardStep::Preview => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.session.step() {
            WizardStep::Recommend => {
                let len = self.session.selection().len();
                self.state.move_selected_cursor(delta, len);
            }
            WizardStep::Plan => {
                let len = self.session.plan().map(|plan| plan.plan.len()).unwrap_or(0);
                self.state.scroll_plan(delta, len);
            }
            WizardStep::Preview => {
                self.state.preview.move_cursor(delta, self.preview.selection());
            }
            WizardStep::Design => {}
        }
    }

    fn open_preview(&mut self) {
        if self.session.plan().map_or(true, |plan| plan.plan.is_empty()) {
            self.state.set_status_message(Some("No plan data found."));
            return;
        }
        let request = match self.session.preview_request() {
            Ok(request) => request,
            Err(err) => {
                self.state.set_status_message(Some(err.to_string()));
                return;
            }
        };
        self.preview.restart();
        self.state.preview.reset();
        if let Err(err) = self.preview.begin(&self.backend, request) {
            self.state.set_status_message(Some(err.to_string()));
            return;
        }
        if let Err(err) = self.session.enter_preview() {
            self.state.set_status_message(Some(err.to_string()));
            return;
        }
        self.state.set_status_message(Some("Building your timeline…"));
    }

    fn retry_preview(&mut self) {
        if self.preview.phase() != PreviewPhase::Failed {
            return;
        }
        let request = match self.session.preview_request() {
            Ok(request) => request,
            Err(err) => {
                self.state.set_status_message(Some(err.to_string()));
                return;
            }
        };
        self.preview.restart();
        match self.preview.begin(&self.backend, request) {
            Ok(()) => self.state.set_status_message(Some("Retrying preview…")),
            Err(err) => self.state.set_status_message(Some(err.to_string())),
        }
    }

    fn first_day(&self) -> Option<DayKey> {
        let plan = self.preview.plan()?;
        self.session
            .trip_bounds()
            .map(|(start, _)| DayKey(start))
            .filter(|day| plan.contains(*day))
            .or_else(|| plan.first_day())
    }

    fn show_first_day(&mut self) {
        let Some(day) = self.first_day() else {
            return;
        };
        self.show_day(day);
    }

    fn show_day(&mut self, day: DayKey) {
        let Some(plan) = self.preview.plan() else {
            return;
        };
        self.state
            .preview
            .show_day(plan, day, self.preview.selection());
    }

    fn step_day(&mut self, forward: bool) {
        let next = match (self.preview.plan(), self.state.preview.day) {
            (Some(plan), Some(current)) => plan.step(current, forward),
            _ => None,
        };
        if let Some(day) = next {
            self.show_day(day);
        }
    }

    fn open_details(&mut self) {
        let id = match self.session.step() {
            WizardStep::Recommend => match self.state.deck_focus {
                DeckFocus::Deck => self.session.current_card().map(|poi| poi.id.clone()),
                DeckFocus::Selected => self
                    .session
                    .selection()
                    .ids()
                    .get(self.state.selected_cursor)
                    .cloned(),
            },
            WizardStep::Preview => self
                .state
                .preview
                .selected_block()
                .and_then(ScheduleBlock::id)
                .map(str::to_string),
            WizardStep::Design | WizardStep::Plan => None,
        };
        match id {
            Some(id) if self.session.pool().get(&id).is_some() => {
                self.state.open_overlay(Overlay::PoiDetail(id));
            }
            Some(id) => {
                tracing::debug!(%id, "no POI details for block");
                self.state
                    .set_status_message(Some("No details available for this block"));
            }
            None => {}
        }
    }

    fn edit_trip(&mut self) {
        if self.session.is_busy() {
            return;
        }
        self.preview.restart();
        self.state.preview.reset();
        self.state.close_overlay();
        self.session.edit_trip();
        self.state
            .set_status_message(Some("Editing trip: adjust your picks and press p to re-plan"));
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
