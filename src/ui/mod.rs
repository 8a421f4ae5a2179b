use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use regex::{Regex, RegexBuilder};
use strum::IntoEnumIterator;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, DeckFocus, FormField, Overlay};
use crate::poi::Poi;
use crate::session::{PreviewSession, TripSession, WizardStep};

mod preview;

pub fn draw_app(frame: &mut Frame, session: &TripSession, preview: &PreviewSession, state: &AppState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    frame.render_widget(Paragraph::new(build_header(session)), vertical[0]);

    match session.step() {
        WizardStep::Design => draw_design(frame, vertical[1], session, state),
        WizardStep::Recommend => draw_deck(frame, vertical[1], session, state),
        WizardStep::Plan => draw_plan(frame, vertical[1], session, state),
        WizardStep::Preview => preview::draw_preview(frame, vertical[1], session, preview, state),
    }

    let status = Paragraph::new(build_status_line(session, state))
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, vertical[2]);

    render_overlay(frame, session, state);
}

fn build_header(session: &TripSession) -> Line<'static> {
    let mut spans = Vec::new();
    for step in WizardStep::iter() {
        if !spans.is_empty() {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let label = format!("{} {}", step.number(), step);
        let style = if step == session.step() {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
    }
    if let Some(label) = session.pending_label() {
        spans.push(Span::styled(
            format!("   ⟳ {label}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn build_status_line(session: &TripSession, state: &AppState) -> Text<'static> {
    let hints = match session.step() {
        WizardStep::Design => "Tab/↑↓ field • ←→/Space toggle • Enter recommend • Esc quit",
        WizardStep::Recommend => "y like • n skip • m more • Tab focus • d remove • i details • p plan • ? help",
        WizardStep::Plan => "j/k scroll • p preview • b back • ? help",
        WizardStep::Preview => "j/k block • h/l day • g day 1 • [/] month • Enter details • e edit • ? help",
    };
    let mut lines = Vec::with_capacity(2);
    if let Some(message) = &state.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(hints));
    Text::from(lines)
}

fn draw_design(frame: &mut Frame, area: Rect, session: &TripSession, state: &AppState) {
    let error_height = if state.form_errors.is_empty() {
        0
    } else {
        state.form_errors.len().min(6) as u16 + 2
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(error_height)])
        .split(area);

    let items: Vec<ListItem> = FormField::iter()
        .map(|field| {
            let focused = field == state.form_field;
            let mut value = field.value(&session.form);
            if focused && field.is_text() {
                value.push('▌');
            }
            let label_style = if focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<16}", field.to_string()), label_style),
                Span::raw(value),
            ]))
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(FormField::iter().position(|field| field == state.form_field));
    let list = List::new(items)
        .block(
            Block::default()
                .title("Design your trip")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_symbol("› ");
    frame.render_stateful_widget(list, rows[0], &mut list_state);

    if !state.form_errors.is_empty() {
        let lines: Vec<Line> = state
            .form_errors
            .iter()
            .map(|error| Line::from(Span::styled(format!("• {error}"), Style::default().fg(Color::Red))))
            .collect();
        let errors = Paragraph::new(lines)
            .block(Block::default().title("Please fix").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(errors, rows[1]);
    }
}

fn draw_deck(frame: &mut Frame, area: Rect, session: &TripSession, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let deck_style = focus_style(state.deck_focus == DeckFocus::Deck);
    let (cursor, total) = session.deck_position();
    let card_title = format!("Card {} / {}", (cursor + 1).min(total), total);
    let card_text = match session.current_card() {
        Some(poi) => poi_card_text(poi, columns[0].width.saturating_sub(4) as usize),
        None if session.is_busy() => Text::from("Loading cards…"),
        None => Text::from(vec![
            Line::from("No more cards."),
            Line::from(Span::styled(
                "Press m to load more or p to plan.",
                Style::default().fg(Color::Gray),
            )),
        ]),
    };
    let card = Paragraph::new(card_text)
        .block(
            Block::default()
                .title(card_title)
                .borders(Borders::ALL)
                .border_style(deck_style),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(card, columns[0]);

    let selected = session.selected_pois();
    let required = session.minimum_required();
    let counter_style = if session.can_request_plan() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let title = Line::from(Span::styled(
        format!("Selected {} / {} required", selected.len(), required),
        counter_style,
    ));
    let width = columns[1].width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = selected
        .iter()
        .map(|poi| ListItem::new(truncate_to_width(&poi.name, width)))
        .collect();
    let mut list_state = ListState::default();
    if state.deck_focus == DeckFocus::Selected && !selected.is_empty() {
        list_state.select(Some(state.selected_cursor.min(selected.len() - 1)));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(focus_style(state.deck_focus == DeckFocus::Selected)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("› ");
    frame.render_stateful_widget(list, columns[1], &mut list_state);
}

fn poi_card_text(poi: &Poi, width: usize) -> Text<'static> {
    let mut lines = vec![Line::from(Span::styled(
        truncate_to_width(&poi.name, width),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    let mut meta = Vec::new();
    if let Some(city) = &poi.city {
        meta.push(Span::styled(city.clone(), Style::default().fg(Color::Gray)));
        meta.push(Span::raw("  "));
    }
    if let Some(rating) = poi.rating {
        meta.push(Span::styled(rating_stars(rating), Style::default().fg(Color::Yellow)));
    }
    lines.push(Line::from(meta));
    lines.push(Line::from(""));
    let tags = tag_regex(&poi.highlight_tags);
    for paragraph in poi.description.lines() {
        lines.push(Line::from(highlight_spans(paragraph, tags.as_ref())));
    }
    if !poi.highlight_tags.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(
            poi.highlight_tags
                .iter()
                .map(|tag| Span::styled(format!("#{tag} "), Style::default().fg(Color::Magenta)))
                .collect::<Vec<_>>(),
        ));
    }
    Text::from(lines)
}

fn draw_plan(frame: &mut Frame, area: Rect, session: &TripSession, state: &AppState) {
    let Some(plan) = session.plan() else {
        let placeholder = Paragraph::new("Generating plan…")
            .block(Block::default().title("Plan").borders(Borders::ALL));
        frame.render_widget(placeholder, area);
        return;
    };
    if plan.plan.is_empty() {
        let empty = Paragraph::new("No plan data found.")
            .block(Block::default().title("Plan").borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }

    let width = area.width.saturating_sub(8) as usize;
    let items: Vec<ListItem> = plan
        .day_pois()
        .into_iter()
        .enumerate()
        .map(|(index, (day, pois))| {
            let mut lines = vec![Line::from(Span::styled(
                format!("Day {}  {}", index + 1, day_heading(&day)),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))];
            if pois.is_empty() {
                lines.push(Line::from(Span::styled(
                    "   (nothing scheduled)",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            for poi in pois {
                lines.push(Line::from(format!("   • {}", truncate_to_width(&poi.name, width))));
            }
            ListItem::new(lines)
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.plan_scroll.min(plan.plan.len() - 1)));
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Rough plan: {} day(s)", plan.plan.len()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_symbol("› ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn day_heading(raw: &str) -> String {
    crate::trip::parse_calendar_date(raw)
        .map(|date| format!("{} {} {}", date.weekday(), date.day(), date.month()))
        .unwrap_or_else(|| raw.to_string())
}

fn render_overlay(frame: &mut Frame, session: &TripSession, state: &AppState) {
    match state.overlay() {
        Some(Overlay::PoiDetail(id)) => {
            let Some(poi) = session.pool().get(id) else {
                return;
            };
            let area = centered_rect(70, 70, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(poi_detail_text(poi, area.width.saturating_sub(4) as usize))
                .block(
                    Block::default()
                        .title("Details")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Cyan)),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(Overlay::Help) => {
            let area = centered_rect(60, 60, frame.size());
            frame.render_widget(Clear, area);
            let lines: Vec<Line> = help_lines(session.step())
                .iter()
                .map(|(keys, what)| {
                    Line::from(vec![
                        Span::styled(format!("{keys:<14}"), Style::default().fg(Color::Cyan)),
                        Span::raw(*what),
                    ])
                })
                .collect();
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Keys")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn poi_detail_text(poi: &Poi, width: usize) -> Text<'static> {
    let mut text = poi_card_text(poi, width);
    let dim = Style::default().fg(Color::Gray);
    if !poi.opening_hours.is_empty() {
        text.lines.push(Line::from(""));
        text.lines.push(Line::from(Span::styled("Opening hours", dim)));
        for hours in &poi.opening_hours {
            text.lines.push(Line::from(format!("  {hours}")));
        }
    }
    if let Some(links) = &poi.source_links {
        text.lines.push(Line::from(""));
        if let Some(url) = &links.maps_url {
            text.lines.push(Line::from(vec![Span::styled("Map: ", dim), Span::raw(url.clone())]));
        }
        for link in &links.review_links {
            text.lines.push(Line::from(vec![Span::styled("Review: ", dim), Span::raw(link.clone())]));
        }
    }
    if let Some(url) = &poi.image_url {
        text.lines.push(Line::from(vec![Span::styled("Image: ", dim), Span::raw(url.clone())]));
    }
    text.lines.push(Line::from(Span::styled(
        format!("{:.5}, {:.5}", poi.coordinates.lat, poi.coordinates.lng),
        Style::default().fg(Color::DarkGray),
    )));
    text
}

fn help_lines(step: WizardStep) -> &'static [(&'static str, &'static str)] {
    match step {
        WizardStep::Design => &[
            ("Tab / ↓", "next field"),
            ("Shift-Tab / ↑", "previous field"),
            ("← → Space", "toggle choice"),
            ("Enter", "get recommendations"),
            ("Esc", "quit"),
        ],
        WizardStep::Recommend => &[
            ("y l →", "like card"),
            ("n h ←", "skip card"),
            ("m", "load more cards"),
            ("Tab", "switch deck / selected"),
            ("j k", "move in selected"),
            ("d Del", "remove selected"),
            ("i", "card details"),
            ("p Enter", "generate plan"),
            ("b Esc", "back to form"),
            ("q", "quit"),
        ],
        WizardStep::Plan => &[
            ("j k", "scroll days"),
            ("p Enter", "open preview"),
            ("b Esc", "edit picks"),
            ("q", "quit"),
        ],
        WizardStep::Preview => &[
            ("j k", "select block"),
            ("h l ← →", "previous / next day"),
            ("g Home", "back to day 1"),
            ("[ ]", "previous / next month"),
            ("Enter", "block details"),
            ("r", "retry failed preview"),
            ("e Esc", "edit trip"),
            ("q", "quit"),
        ],
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn rating_stars(rating: f64) -> String {
    let filled = rating.round().clamp(0.0, 5.0) as usize;
    format!("{}{} {rating:.1}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Case-insensitive whole-word pattern for a block's highlight tags, longest first.
fn tag_regex(tags: &[String]) -> Option<Regex> {
    let mut words: Vec<&str> = tags.iter().map(|tag| tag.trim()).filter(|tag| !tag.is_empty()).collect();
    if words.is_empty() {
        return None;
    }
    words.sort_by_key(|word| std::cmp::Reverse(word.len()));
    words.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    let alternation = words.iter().map(|word| regex::escape(word)).collect::<Vec<_>>().join("|");
    RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
        .case_insensitive(true)
        .build()
        .map_err(|err| tracing::debug!(%err, "tag pattern rejected"))
        .ok()
}

fn highlight_spans(text: &str, pattern: Option<&Regex>) -> Vec<Span<'static>> {
    let Some(pattern) = pattern else {
        return vec![Span::raw(text.to_string())];
    };
    let highlight = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let mut spans = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            spans.push(Span::raw(text[last..found.start()].to_string()));
        }
        spans.push(Span::styled(found.as_str().to_string(), highlight));
        last = found.end();
    }
    if last < text.len() || spans.is_empty() {
        spans.push(Span::raw(text[last..].to_string()));
    }
    spans
}

/// Cuts `text` to at most `max` terminal columns, ending in `…` when shortened.
pub(crate) fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let width = grapheme.width();
        if used + width + 1 > max {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
