use strum::{Display, EnumIter, IntoEnumIterator};
use time::Date;

use crate::form::{MealFlags, Transportation, TripFlags, TripForm};
use crate::poi::Coordinates;
use crate::timeline::polyline::decode_or_warn;
use crate::timeline::{
    DayPlan, NormalizedDay, PositionedBlock, ScheduleBlock, SelectionCoordinator, SkippedBlock,
    DEFAULT_MIN_GAP_MINUTES,
};
use crate::trip::calendar::{first_of_month, shift_month};
use crate::trip::{DayKey, Intensity};

const MAX_TEXT_FIELD_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum FormField {
    #[strum(to_string = "From")]
    From,
    #[strum(to_string = "To")]
    To,
    #[strum(to_string = "Start date")]
    StartDate,
    #[strum(to_string = "End date")]
    EndDate,
    #[strum(to_string = "Description")]
    Description,
    #[strum(to_string = "Travelers")]
    Travelers,
    #[strum(to_string = "Budget")]
    Budget,
    #[strum(to_string = "Transportation")]
    Transportation,
    #[strum(to_string = "Intensity")]
    Intensity,
    #[strum(to_string = "Wake-up time")]
    WakeUp,
    #[strum(to_string = "Return time")]
    Return,
    #[strum(to_string = "Round trip")]
    RoundTrip,
    #[strum(to_string = "Include hotels")]
    IncludeHotels,
    #[strum(to_string = "Breakfast")]
    Breakfast,
    #[strum(to_string = "Lunch")]
    Lunch,
    #[strum(to_string = "Dinner")]
    Dinner,
}

impl FormField {
    pub fn is_text(self) -> bool {
        matches!(
            self,
            FormField::From
                | FormField::To
                | FormField::StartDate
                | FormField::EndDate
                | FormField::Description
                | FormField::Travelers
                | FormField::Budget
                | FormField::WakeUp
                | FormField::Return
        )
    }

    pub fn value(self, form: &TripForm) -> String {
        let flag = |on: bool| if on { "[x]" } else { "[ ]" }.to_string();
        match self {
            FormField::From => form.from.clone(),
            FormField::To => form.to.clone(),
            FormField::StartDate => form.start_date.clone(),
            FormField::EndDate => form.end_date.clone(),
            FormField::Description => form.description.clone(),
            FormField::Travelers => form.travelers.map(|n| n.to_string()).unwrap_or_default(),
            FormField::Budget => form.budget.clone().unwrap_or_default(),
            FormField::Transportation => form.transportation.to_string(),
            FormField::Intensity => form.intensity.to_string(),
            FormField::WakeUp => form.wake_up_time.clone().unwrap_or_default(),
            FormField::Return => form.return_time.clone().unwrap_or_default(),
            FormField::RoundTrip => flag(form.flags.contains(TripFlags::ROUND_TRIP)),
            FormField::IncludeHotels => flag(form.flags.contains(TripFlags::INCLUDE_HOTELS)),
            FormField::Breakfast => flag(form.meals.contains(MealFlags::BREAKFAST)),
            FormField::Lunch => flag(form.meals.contains(MealFlags::LUNCH)),
            FormField::Dinner => flag(form.meals.contains(MealFlags::DINNER)),
        }
    }

    /// Types `ch` into a text field, or flips a choice field on space.
    pub fn input(self, form: &mut TripForm, ch: char) {
        if !self.is_text() {
            if ch == ' ' {
                self.cycle(form);
            }
            return;
        }
        match self {
            FormField::Travelers => {
                if let Some(digit) = ch.to_digit(10) {
                    let current = form.travelers.unwrap_or(0);
                    let next = current * 10 + digit;
                    if next <= 999 {
                        form.travelers = Some(next).filter(|n| *n > 0);
                    }
                }
            }
            _ => {
                if let Some(text) = self.text_mut(form) {
                    if text.chars().count() < MAX_TEXT_FIELD_LEN {
                        text.push(ch);
                    }
                }
            }
        }
    }

    pub fn backspace(self, form: &mut TripForm) {
        match self {
            FormField::Travelers => {
                form.travelers = form.travelers.map(|n| n / 10).filter(|n| *n > 0);
            }
            _ => {
                if let Some(text) = self.text_mut(form) {
                    text.pop();
                }
            }
        }
        if form.budget.as_deref() == Some("") {
            form.budget = None;
        }
        if form.wake_up_time.as_deref() == Some("") {
            form.wake_up_time = None;
        }
        if form.return_time.as_deref() == Some("") {
            form.return_time = None;
        }
    }

    pub fn cycle(self, form: &mut TripForm) {
        match self {
            FormField::Transportation => {
                form.transportation = match form.transportation {
                    Transportation::Car => Transportation::Public,
                    Transportation::Public => Transportation::Car,
                };
            }
            FormField::Intensity => {
                let all: Vec<Intensity> = Intensity::iter().collect();
                let index = all.iter().position(|i| *i == form.intensity).unwrap_or(0);
                form.intensity = all[(index + 1) % all.len()];
            }
            FormField::RoundTrip => form.flags.toggle(TripFlags::ROUND_TRIP),
            FormField::IncludeHotels => form.flags.toggle(TripFlags::INCLUDE_HOTELS),
            FormField::Breakfast => form.meals.toggle(MealFlags::BREAKFAST),
            FormField::Lunch => form.meals.toggle(MealFlags::LUNCH),
            FormField::Dinner => form.meals.toggle(MealFlags::DINNER),
            _ => {}
        }
    }

    fn text_mut(self, form: &mut TripForm) -> Option<&mut String> {
        match self {
            FormField::From => Some(&mut form.from),
            FormField::To => Some(&mut form.to),
            FormField::StartDate => Some(&mut form.start_date),
            FormField::EndDate => Some(&mut form.end_date),
            FormField::Description => Some(&mut form.description),
            FormField::Budget => Some(form.budget.get_or_insert_with(String::new)),
            FormField::WakeUp => Some(form.wake_up_time.get_or_insert_with(String::new)),
            FormField::Return => Some(form.return_time.get_or_insert_with(String::new)),
            _ => None,
        }
    }

    fn shifted(self, delta: isize) -> Self {
        let all: Vec<FormField> = FormField::iter().collect();
        let index = all.iter().position(|f| *f == self).unwrap_or(0) as isize;
        let len = all.len() as isize;
        all[(index + delta).rem_euclid(len) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    PoiDetail(String),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckFocus {
    Deck,
    Selected,
}

/// One row of the preview's text list.
#[derive(Debug, Clone, Copy)]
pub enum ListEntry<'a> {
    Timed(&'a PositionedBlock),
    Untimed(&'a SkippedBlock),
}

impl<'a> ListEntry<'a> {
    pub fn block(&self) -> &'a ScheduleBlock {
        match self {
            ListEntry::Timed(positioned) => &positioned.block,
            ListEntry::Untimed(skipped) => &skipped.block,
        }
    }
}

/// Decoded path of one route block, ready for the map panel.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRoute {
    pub key: Option<String>,
    pub points: Vec<Coordinates>,
}

/// Which day, month and row the preview panels are showing.
#[derive(Debug, Clone)]
pub struct PreviewView {
    pub day: Option<DayKey>,
    pub month: Option<Date>,
    pub layout: NormalizedDay,
    pub routes: Vec<MapRoute>,
    pub cursor: Option<usize>,
    min_gap: u16,
}

impl Default for PreviewView {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GAP_MINUTES)
    }
}

impl PreviewView {
    pub fn new(min_gap: u16) -> Self {
        Self {
            day: None,
            month: None,
            layout: NormalizedDay::default(),
            routes: Vec::new(),
            cursor: None,
            min_gap,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.min_gap);
    }

    pub fn show_day(&mut self, plan: &DayPlan, day: DayKey, selection: &SelectionCoordinator) {
        self.layout = plan.normalized_with_gap(day, self.min_gap);
        let context = day.to_string();
        self.routes = plan
            .blocks(day)
            .iter()
            .filter_map(|block| {
                let route = block.route()?;
                let points = decode_or_warn(&route.polyline, &context)?;
                Some(MapRoute {
                    key: block.selection_key(),
                    points,
                })
            })
            .collect();
        self.day = Some(day);
        self.month = Some(first_of_month(day.date()));
        self.cursor = None;
        selection.clear();
    }

    /// Timed blocks in layout order, then the blocks without usable times.
    pub fn entries(&self) -> Vec<ListEntry<'_>> {
        self.layout
            .blocks
            .iter()
            .map(ListEntry::Timed)
            .chain(self.layout.skipped.iter().map(ListEntry::Untimed))
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.layout.blocks.len() + self.layout.skipped.len()
    }

    pub fn selected_block(&self) -> Option<&ScheduleBlock> {
        let index = self.cursor?;
        self.entries().get(index).map(ListEntry::block)
    }

    /// Moves the list cursor and publishes the block under it as the shared selection.
    pub fn move_cursor(&mut self, delta: isize, selection: &SelectionCoordinator) {
        let count = self.entry_count();
        if count == 0 {
            self.cursor = None;
            return;
        }
        let next = match self.cursor {
            None if delta >= 0 => 0,
            None => count - 1,
            Some(current) => (current as isize + delta).clamp(0, count as isize - 1) as usize,
        };
        self.cursor = Some(next);
        let key = self.selected_block().and_then(ScheduleBlock::selection_key);
        selection.set_active(key);
    }

    pub fn page_month(&mut self, delta: i32) {
        if let Some(month) = self.month {
            self.month = Some(shift_month(month, delta));
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status_message: Option<String>,
    pub overlay: Option<Overlay>,
    pub form_field: FormField,
    pub form_errors: Vec<String>,
    pub deck_focus: DeckFocus,
    pub selected_cursor: usize,
    pub plan_scroll: usize,
    pub preview: PreviewView,
}

impl AppState {
    pub fn new(min_gap: u16) -> Self {
        Self {
            status_message: None,
            overlay: None,
            form_field: FormField::From,
            form_errors: Vec::new(),
            deck_focus: DeckFocus::Deck,
            selected_cursor: 0,
            plan_scroll: 0,
            preview: PreviewView::new(min_gap),
        }
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn open_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn focus_next_field(&mut self) {
        self.form_field = self.form_field.shifted(1);
    }

    pub fn focus_previous_field(&mut self) {
        self.form_field = self.form_field.shifted(-1);
    }

    pub fn toggle_deck_focus(&mut self) {
        self.deck_focus = match self.deck_focus {
            DeckFocus::Deck => DeckFocus::Selected,
            DeckFocus::Selected => DeckFocus::Deck,
        };
    }

    pub fn move_selected_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected_cursor = 0;
            return;
        }
        self.selected_cursor =
            (self.selected_cursor as isize + delta).clamp(0, len as isize - 1) as usize;
    }

    pub fn scroll_plan(&mut self, delta: isize, len: usize) {
        let last = len.saturating_sub(1) as isize;
        self.plan_scroll = (self.plan_scroll as isize + delta).clamp(0, last) as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tests::sample_form;
    use crate::timeline::block::tests::activity;
    use time::macros::date;

    fn plan() -> DayPlan {
        let mut untimed = activity("late", "", "", "Flexible");
        if let ScheduleBlock::Activity(block) = &mut untimed {
            block.start_time = None;
        }
        DayPlan::from_days([
            (
                DayKey(date!(2025 - 04 - 04)),
                vec![
                    activity("lunch", "12:00", "13:00", "Meal"),
                    untimed,
                    activity("museum", "09:00", "11:00", "Sightseeing"),
                ],
            ),
            (DayKey(date!(2025 - 04 - 05)), vec![activity("park", "10:00", "12:00", "Sightseeing")]),
        ])
    }

    #[test]
    fn text_fields_take_input_and_choices_cycle() {
        let mut form = sample_form();
        FormField::To.input(&mut form, '!');
        assert_eq!(form.to, "New York!");
        FormField::To.backspace(&mut form);
        assert_eq!(form.to, "New York");

        FormField::Intensity.cycle(&mut form);
        assert_eq!(form.intensity, Intensity::Intense);
        FormField::Intensity.input(&mut form, ' ');
        assert_eq!(form.intensity, Intensity::Chill);

        FormField::Breakfast.input(&mut form, ' ');
        assert!(form.meals.contains(MealFlags::BREAKFAST));
    }

    #[test]
    fn travelers_accepts_digits_only() {
        let mut form = TripForm::default();
        FormField::Travelers.input(&mut form, '1');
        FormField::Travelers.input(&mut form, 'x');
        FormField::Travelers.input(&mut form, '2');
        assert_eq!(form.travelers, Some(12));
        FormField::Travelers.backspace(&mut form);
        FormField::Travelers.backspace(&mut form);
        assert_eq!(form.travelers, None);
    }

    #[test]
    fn clearing_optional_text_resets_to_none() {
        let mut form = TripForm::default();
        FormField::Budget.input(&mut form, '5');
        assert_eq!(form.budget.as_deref(), Some("5"));
        FormField::Budget.backspace(&mut form);
        assert_eq!(form.budget, None);
    }

    #[test]
    fn field_focus_wraps() {
        let mut state = AppState::new(30);
        state.focus_previous_field();
        assert_eq!(state.form_field, FormField::Dinner);
        state.focus_next_field();
        assert_eq!(state.form_field, FormField::From);
    }

    #[test]
    fn list_puts_untimed_blocks_last() {
        let selection = SelectionCoordinator::new();
        let mut view = PreviewView::default();
        view.show_day(&plan(), DayKey(date!(2025 - 04 - 04)), &selection);
        let ids: Vec<_> = view
            .entries()
            .iter()
            .map(|entry| entry.block().id().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, ["museum", "lunch", "late"]);
        assert_eq!(view.month, Some(date!(2025 - 04 - 01)));
    }

    #[test]
    fn cursor_publishes_selection_and_clamps() {
        let selection = SelectionCoordinator::new();
        let mut view = PreviewView::default();
        view.show_day(&plan(), DayKey(date!(2025 - 04 - 04)), &selection);
        view.move_cursor(1, &selection);
        assert_eq!(selection.active().as_deref(), Some("museum"));
        view.move_cursor(10, &selection);
        assert_eq!(view.cursor, Some(2));
        assert_eq!(selection.active().as_deref(), Some("late"));
        view.move_cursor(-1, &selection);
        assert_eq!(selection.active().as_deref(), Some("lunch"));

        view.show_day(&plan(), DayKey(date!(2025 - 04 - 05)), &selection);
        assert!(selection.active().is_none());
        assert_eq!(view.cursor, None);
    }

    #[test]
    fn month_paging_crosses_years() {
        let selection = SelectionCoordinator::new();
        let mut view = PreviewView::default();
        view.show_day(&plan(), DayKey(date!(2025 - 04 - 04)), &selection);
        view.page_month(-4);
        assert_eq!(view.month, Some(date!(2024 - 12 - 01)));
    }
}
