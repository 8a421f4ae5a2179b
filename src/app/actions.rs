use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::session::WizardStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    CloseOverlay,
    ShowHelp,
    // design form
    NextField,
    PrevField,
    Input(char),
    Backspace,
    CycleField,
    Submit,
    // recommendation deck
    Like,
    Skip,
    LoadMore,
    ToggleFocus,
    RemoveSelected,
    RequestPlan,
    Back,
    // lists
    MoveDown,
    MoveUp,
    // plan
    OpenPreview,
    // preview
    NextDay,
    PrevDay,
    FirstDay,
    NextMonth,
    PrevMonth,
    OpenDetails,
    EditTrip,
    Retry,
}

fn plain(key: &KeyEvent) -> bool {
    !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

/// Maps a key press to an action for the current step.
pub fn map_key(step: WizardStep, overlay_open: bool, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    if overlay_open {
        return match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => Some(Action::CloseOverlay),
            _ => None,
        };
    }
    match step {
        WizardStep::Design => map_design(key),
        WizardStep::Recommend => map_recommend(key),
        WizardStep::Plan => map_plan(key),
        WizardStep::Preview => map_preview(key),
    }
}

fn map_design(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Left | KeyCode::Right => Some(Action::CycleField),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(ch) if plain(&key) => Some(Action::Input(ch)),
        _ => None,
    }
}

fn map_recommend(key: KeyEvent) -> Option<Action> {
    if !plain(&key) {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('?') => Some(Action::ShowHelp),
        KeyCode::Char('y') | KeyCode::Char('l') | KeyCode::Right => Some(Action::Like),
        KeyCode::Char('n') | KeyCode::Char('h') | KeyCode::Left => Some(Action::Skip),
        KeyCode::Char('m') => Some(Action::LoadMore),
        KeyCode::Tab => Some(Action::ToggleFocus),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Char('d') | KeyCode::Delete => Some(Action::RemoveSelected),
        KeyCode::Char('i') => Some(Action::OpenDetails),
        KeyCode::Char('p') | KeyCode::Enter => Some(Action::RequestPlan),
        KeyCode::Char('b') | KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

fn map_plan(key: KeyEvent) -> Option<Action> {
    if !plain(&key) {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('?') => Some(Action::ShowHelp),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Char('p') | KeyCode::Enter => Some(Action::OpenPreview),
        KeyCode::Char('b') | KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

fn map_preview(key: KeyEvent) -> Option<Action> {
    if !plain(&key) {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('?') => Some(Action::ShowHelp),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
        KeyCode::Char('l') | KeyCode::Right => Some(Action::NextDay),
        KeyCode::Char('h') | KeyCode::Left => Some(Action::PrevDay),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::FirstDay),
        KeyCode::Char(']') => Some(Action::NextMonth),
        KeyCode::Char('[') => Some(Action::PrevMonth),
        KeyCode::Enter => Some(Action::OpenDetails),
        KeyCode::Char('e') | KeyCode::Esc => Some(Action::EditTrip),
        KeyCode::Char('r') => Some(Action::Retry),
        _ => None,
    }
}
