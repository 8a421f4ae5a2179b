//! The four synchronized preview panels: map, time axis, text list and calendar.
//!
//! Every panel reads the active block from the preview's `SelectionCoordinator`
//! on each frame, so a change made through any one of them shows up in all.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use super::{highlight_spans, tag_regex, truncate_to_width};
use crate::app::state::{AppState, ListEntry, PreviewView};
use crate::poi::Coordinates;
use crate::session::{PreviewSession, PreviewState, TripSession};
use crate::timeline::{
    format_duration_minutes, BlockCategory, DayPlan, FreeTimeGap, NormalizedDay, SelectionCoordinator,
    MINUTES_PER_DAY,
};
use crate::trip::{DayKey, MonthGrid, TripWindow};

const DEFAULT_CENTER: Coordinates = Coordinates::new(40.7128, -74.0060);
const DEFAULT_SPAN_DEGREES: f64 = 0.05;
const MIN_PADDING_DEGREES: f64 = 0.005;

pub(super) fn draw_preview(
    frame: &mut Frame,
    area: Rect,
    session: &TripSession,
    preview: &PreviewSession,
    state: &AppState,
) {
    match preview.state() {
        PreviewState::Idle => {
            frame.render_widget(message_panel("Preparing preview…", Color::Gray), area);
        }
        PreviewState::Loading(fetch) => {
            let text = format!("Building your timeline… {}s", fetch.elapsed().as_secs());
            frame.render_widget(message_panel(&text, Color::Yellow), area);
        }
        PreviewState::Failed(failure) => {
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Could not load the preview: {failure}"),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "r retry • e edit trip",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(Block::default().title("Preview").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
        }
        PreviewState::Ready { plan, .. } => {
            if plan.is_empty() || state.preview.day.is_none() {
                frame.render_widget(message_panel("No plan data found.", Color::Gray), area);
                return;
            }
            draw_panels(frame, area, session, plan, preview.selection(), &state.preview);
        }
    }
}

fn message_panel(text: &str, color: Color) -> Paragraph<'static> {
    Paragraph::new(Span::styled(text.to_string(), Style::default().fg(color)))
        .block(Block::default().title("Preview").borders(Borders::ALL))
}

fn draw_panels(
    frame: &mut Frame,
    area: Rect,
    session: &TripSession,
    plan: &DayPlan,
    selection: &SelectionCoordinator,
    view: &PreviewView,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    let active = selection.active();
    let window = session
        .trip_bounds()
        .and_then(|(start, end)| TripWindow::new(start, end, session.form.intensity).ok());

    draw_map(frame, top[0], view, active.as_deref());
    draw_time_axis(frame, top[1], &view.layout, active.as_deref());
    draw_block_list(frame, bottom[0], view, active.as_deref());
    draw_calendar(frame, bottom[1], plan, view, window.as_ref());
}

struct MapMarker {
    point: (f64, f64),
    label: String,
    active: bool,
}

fn draw_map(frame: &mut Frame, area: Rect, view: &PreviewView, active: Option<&str>) {
    let markers: Vec<MapMarker> = view
        .entries()
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let block = entry.block();
            let location = block.location().filter(Coordinates::is_valid)?;
            let active = match (block.selection_key(), active) {
                (Some(key), Some(active)) => key == active,
                _ => false,
            };
            Some(MapMarker {
                point: (location.lng, location.lat),
                label: (index + 1).to_string(),
                active,
            })
        })
        .collect();

    let mut all_points: Vec<(f64, f64)> = markers.iter().map(|marker| marker.point).collect();
    for route in &view.routes {
        all_points.extend(route.points.iter().map(|point| (point.lng, point.lat)));
    }
    let (x_bounds, y_bounds) = map_bounds(&all_points);
    let idle_points: Vec<(f64, f64)> = markers.iter().filter(|m| !m.active).map(|m| m.point).collect();
    let active_points: Vec<(f64, f64)> = markers.iter().filter(|m| m.active).map(|m| m.point).collect();
    let empty = markers.is_empty() && view.routes.is_empty();

    let canvas = Canvas::default()
        .block(Block::default().title("Map").borders(Borders::ALL))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for route in &view.routes {
                let highlighted = route.key.as_deref().is_some_and(|key| Some(key) == active);
                let color = if highlighted { Color::White } else { Color::Magenta };
                for pair in route.points.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].lng,
                        y1: pair[0].lat,
                        x2: pair[1].lng,
                        y2: pair[1].lat,
                        color,
                    });
                }
            }
            ctx.layer();
            ctx.draw(&Points {
                coords: &idle_points,
                color: Color::Cyan,
            });
            ctx.draw(&Points {
                coords: &active_points,
                color: Color::Yellow,
            });
            for marker in &markers {
                let style = if marker.active {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Cyan)
                };
                ctx.print(marker.point.0, marker.point.1, Span::styled(marker.label.clone(), style));
            }
            if empty {
                ctx.print(
                    DEFAULT_CENTER.lng,
                    DEFAULT_CENTER.lat,
                    Span::styled("no locations for this day", Style::default().fg(Color::DarkGray)),
                );
            }
        });
    frame.render_widget(canvas, area);
}

/// Longitude and latitude bounds covering `points` with some padding, or a
/// window around the default center when there is nothing to show.
fn map_bounds(points: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    if points.is_empty() {
        return (
            [
                DEFAULT_CENTER.lng - DEFAULT_SPAN_DEGREES,
                DEFAULT_CENTER.lng + DEFAULT_SPAN_DEGREES,
            ],
            [
                DEFAULT_CENTER.lat - DEFAULT_SPAN_DEGREES,
                DEFAULT_CENTER.lat + DEFAULT_SPAN_DEGREES,
            ],
        );
    }
    let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let pad_x = ((max_x - min_x) * 0.1).max(MIN_PADDING_DEGREES);
    let pad_y = ((max_y - min_y) * 0.1).max(MIN_PADDING_DEGREES);
    ([min_x - pad_x, max_x + pad_x], [min_y - pad_y, max_y + pad_y])
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AxisCell<'a> {
    Block { index: usize, first: bool },
    Gap { gap: &'a FreeTimeGap, first: bool },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisRow<'a> {
    /// Hour that starts inside this row, if any.
    hour: Option<u16>,
    cell: AxisCell<'a>,
}

/// Samples the day layout into `rows` text rows, cropped to the hours the
/// blocks actually use. Blocks too short to cover a row still get one.
fn axis_rows(layout: &NormalizedDay, rows: usize) -> Vec<AxisRow<'_>> {
    if rows == 0 {
        return Vec::new();
    }
    let (lo, hi) = axis_window(layout);
    let span = f64::from(hi - lo);
    let day = f64::from(MINUTES_PER_DAY);
    let row_start = |row: usize| f64::from(lo) + span * row as f64 / rows as f64;

    let mut out = Vec::with_capacity(rows);
    let mut seen_blocks = vec![false; layout.blocks.len()];
    let mut seen_gaps = vec![false; layout.gaps.len()];
    for row in 0..rows {
        let (from, to) = (row_start(row), row_start(row + 1));
        let middle = (from + to) / 2.0 / day;
        let hour = ((from / 60.0).ceil() * 60.0 < to).then(|| (from / 60.0).ceil() as u16);

        let covering = layout
            .blocks
            .iter()
            .rposition(|positioned| positioned.top <= middle && middle < positioned.top + positioned.height);
        let cell = if let Some(index) = covering {
            let first = !seen_blocks[index];
            seen_blocks[index] = true;
            AxisCell::Block { index, first }
        } else if let Some(index) = layout
            .gaps
            .iter()
            .position(|gap| gap.top <= middle && middle < gap.top + gap.height)
        {
            let first = !seen_gaps[index];
            seen_gaps[index] = true;
            AxisCell::Gap {
                gap: &layout.gaps[index],
                first,
            }
        } else {
            AxisCell::Empty
        };
        out.push(AxisRow { hour, cell });
    }

    for (index, positioned) in layout.blocks.iter().enumerate() {
        if seen_blocks[index] {
            continue;
        }
        let offset = f64::from(positioned.start.minute_of_day()) - f64::from(lo);
        let row = ((offset / span) * rows as f64).floor().clamp(0.0, rows as f64 - 1.0) as usize;
        if !matches!(out[row].cell, AxisCell::Block { .. }) {
            out[row].cell = AxisCell::Block { index, first: true };
        }
    }
    out
}

/// Whole hours spanning every positioned block; the full day when there are none.
fn axis_window(layout: &NormalizedDay) -> (u16, u16) {
    let start = layout.blocks.iter().map(|b| b.start.minute_of_day()).min();
    let end = layout.blocks.iter().map(|b| b.end.minute_of_day()).max();
    match (start, end) {
        (Some(start), Some(end)) => {
            let lo = start / 60 * 60;
            let hi = (end.div_ceil(60) * 60).clamp(lo + 60, MINUTES_PER_DAY);
            (lo, hi)
        }
        _ => (0, MINUTES_PER_DAY),
    }
}

fn category_color(category: BlockCategory) -> Color {
    match category {
        BlockCategory::Sightseeing => Color::Blue,
        BlockCategory::Meal => Color::Yellow,
        BlockCategory::Transportation => Color::Magenta,
        BlockCategory::Other => Color::Gray,
    }
}

pub(crate) fn free_time_caption(gap: &FreeTimeGap) -> String {
    format!("Free time: {}", format_duration_minutes(gap.minutes()))
}

fn draw_time_axis(frame: &mut Frame, area: Rect, layout: &NormalizedDay, active: Option<&str>) {
    let inner_rows = area.height.saturating_sub(2) as usize;
    let text_width = area.width.saturating_sub(12) as usize;
    let dim = Style::default().fg(Color::DarkGray);
    let lines: Vec<Line> = axis_rows(layout, inner_rows)
        .into_iter()
        .map(|row| {
            let label = row
                .hour
                .map(|hour| format!("{:02}:00 ", hour % 24))
                .unwrap_or_else(|| " ".repeat(6));
            let mut spans = vec![Span::styled(label, dim), Span::styled("│", dim)];
            match row.cell {
                AxisCell::Block { index, first } => {
                    let positioned = &layout.blocks[index];
                    let is_active = positioned
                        .block
                        .selection_key()
                        .is_some_and(|key| Some(key.as_str()) == active);
                    let mut style = Style::default().fg(category_color(positioned.category));
                    if is_active {
                        style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
                    }
                    spans.push(Span::styled("█", style));
                    if first {
                        let caption = format!(" {} {}", positioned.start, positioned.block.activity());
                        spans.push(Span::styled(truncate_to_width(&caption, text_width), style));
                    }
                }
                AxisCell::Gap { gap, first } => {
                    spans.push(Span::styled("┆", Style::default().fg(Color::Green)));
                    if first {
                        spans.push(Span::styled(
                            format!(" {}", free_time_caption(gap)),
                            Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
                        ));
                    }
                }
                AxisCell::Empty => {}
            }
            Line::from(spans)
        })
        .collect();
    let paragraph = Paragraph::new(lines).block(Block::default().title("Time").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn draw_block_list(frame: &mut Frame, area: Rect, view: &PreviewView, active: Option<&str>) {
    let width = area.width.saturating_sub(22) as usize;
    let entries = view.entries();
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let block = entry.block();
            let is_active = block
                .selection_key()
                .is_some_and(|key| Some(key.as_str()) == active);
            let (times, trailer) = match entry {
                ListEntry::Timed(positioned) => (
                    format!("{}–{}", positioned.start, positioned.end),
                    format_duration_minutes(positioned.duration_minutes()),
                ),
                ListEntry::Untimed(_) => ("--:-- --:--".to_string(), "no time".to_string()),
            };
            let activity = truncate_to_width(&block.activity(), width);
            let mut spans = vec![
                Span::styled(
                    format!("{times}  "),
                    Style::default().fg(category_color(block.category())),
                ),
            ];
            spans.extend(highlight_spans(&activity, tag_regex(block.highlight_tags()).as_ref()));
            spans.push(Span::styled(format!("  {trailer}"), Style::default().fg(Color::DarkGray)));
            let item = ListItem::new(Line::from(spans));
            if is_active {
                item.style(Style::default().bg(Color::DarkGray))
            } else {
                item
            }
        })
        .collect();

    let title = match view.day {
        Some(day) => format!("{day} • {} block(s)", entries.len()),
        None => "Blocks".to_string(),
    };
    let mut list_state = ListState::default();
    list_state.select(view.cursor);
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_symbol("› ");
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_calendar(
    frame: &mut Frame,
    area: Rect,
    plan: &DayPlan,
    view: &PreviewView,
    window: Option<&TripWindow>,
) {
    let Some(month) = view.month else {
        return;
    };
    let grid = MonthGrid::for_month(month);
    let selected = view.day.map(|day| day.date());
    let mut lines = vec![
        Line::from(Span::styled(grid.title(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled("Su Mo Tu We Th Fr Sa", Style::default().fg(Color::Gray))),
    ];
    for week in &grid.weeks {
        let spans: Vec<Span> = week
            .iter()
            .map(|cell| match cell {
                None => Span::raw("   "),
                Some(date) => {
                    let mut style = Style::default();
                    if window.is_some_and(|window| window.contains(*date)) {
                        style = style.fg(Color::Cyan);
                    }
                    if plan.contains(DayKey(*date)) {
                        style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
                    }
                    if Some(*date) == selected {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    Span::styled(format!("{:>2} ", date.day()), style)
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));
    if let Some((n, of)) = selected.and_then(|date| window.and_then(|window| window.day_position(date))) {
        lines.push(Line::from(Span::styled(
            format!("Day {n} of {of}"),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(Span::styled(
        "g back to day 1 • [ ] month",
        Style::default().fg(Color::DarkGray),
    )));
    let paragraph = Paragraph::new(lines).block(Block::default().title("Calendar").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}
