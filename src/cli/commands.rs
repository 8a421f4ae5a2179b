use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::api::{decode_preview, FormPayload, HttpBackend, PreviewResponse, RecommendResponse, TripBackend};
use crate::app::App;
use crate::config::{AppConfig, PlannerDefaults};
use crate::form::{TripFlags, TripForm, Transportation};
use crate::timeline::{format_duration_minutes, DayPlan, IngestReport, SkipReason};
use crate::trip::calendar::{first_of_month, shift_month};
use crate::trip::{
    generate_monthly_span, minimum_required, parse_calendar_date, DayKey, Intensity, MonthGrid,
    TripWindow,
};
use crate::ui::truncate_to_width;

const CARD_DESCRIPTION_WIDTH: usize = 100;

/// Trip fields that pre-fill the design form; anything omitted comes from `[planner]`.
#[derive(Args, Debug, Clone, Default)]
pub struct TripArgs {
    /// Departure city
    #[arg(long)]
    pub from: Option<String>,
    /// Destination
    #[arg(long)]
    pub to: Option<String>,
    /// First trip day (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Last trip day (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
    /// Free-text wishes for the trip
    #[arg(long)]
    pub description: Option<String>,
    /// chill, normal or intense
    #[arg(long)]
    pub intensity: Option<Intensity>,
    /// car or public
    #[arg(long)]
    pub transportation: Option<Transportation>,
    #[arg(long)]
    pub travelers: Option<u32>,
    #[arg(long)]
    pub budget: Option<String>,
    #[arg(long)]
    pub round_trip: bool,
    #[arg(long)]
    pub hotels: bool,
    /// Send the form right away instead of opening on the design step (TUI only)
    #[arg(long)]
    pub submit: bool,
}

impl TripArgs {
    pub fn form(&self, defaults: &PlannerDefaults) -> TripForm {
        let mut form = defaults.form();
        let text = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or_default().to_string();
        form.from = text(&self.from);
        form.to = text(&self.to);
        form.start_date = text(&self.start);
        form.end_date = text(&self.end);
        form.description = text(&self.description);
        if let Some(intensity) = self.intensity {
            form.intensity = intensity;
        }
        if let Some(transportation) = self.transportation {
            form.transportation = transportation;
        }
        form.travelers = self.travelers;
        form.budget = self.budget.clone().filter(|budget| !budget.trim().is_empty());
        form.flags.set(TripFlags::ROUND_TRIP, self.round_trip);
        form.flags.set(TripFlags::INCLUDE_HOTELS, self.hotels);
        form
    }
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// First trip day
    pub start: String,
    /// Last trip day
    pub end: String,
}

#[derive(Args, Debug, Clone)]
pub struct MinRequiredArgs {
    pub start: String,
    pub end: String,
    #[arg(long, default_value = "normal")]
    pub intensity: Intensity,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Saved /preview response; `-` reads stdin
    #[arg(long, default_value = "-")]
    pub file: String,
    /// Only print this day
    #[arg(long)]
    pub day: Option<String>,
}

pub fn run_tui(config: Arc<AppConfig>, args: TripArgs) -> Result<()> {
    let form = args.form(&config.planner);
    let backend: Arc<dyn TripBackend> = Arc::new(HttpBackend::new(&config.backend)?);
    let mut app = App::new(config, backend, form);
    if args.submit {
        app.submit_form();
    }
    app.run()
}

pub fn print_calendar(args: CalendarArgs) -> Result<()> {
    let start = parse_date_arg("start", &args.start)?;
    let end = parse_date_arg("end", &args.end)?;
    print!("{}", format_calendar(start, end));
    Ok(())
}

pub fn print_min_required(args: MinRequiredArgs) -> Result<()> {
    println!("{}", format_min_required(&args.start, &args.end, args.intensity));
    Ok(())
}

pub fn print_preview(config: &AppConfig, args: PreviewArgs) -> Result<()> {
    let raw = if args.file == "-" {
        read_stdin()?.context("no preview JSON on stdin; pass --file <path>")?
    } else {
        fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file))?
    };
    let response: PreviewResponse =
        serde_json::from_str(&raw).context("parsing preview response JSON")?;
    let (plan, report) = DayPlan::ingest(decode_preview(response));

    let only = match args.day.as_deref() {
        Some(day) => Some(DayKey::parse(day).with_context(|| format!("unreadable day '{day}'"))?),
        None => None,
    };
    print!("{}", format_report(&report));
    print!(
        "{}",
        format_timelines(&plan, only, config.timeline.min_gap_minutes)
    );
    Ok(())
}

pub fn print_recommendations(config: &AppConfig, args: TripArgs) -> Result<()> {
    let mut form = args.form(&config.planner);
    if form.from.is_empty() {
        form.from = prompt("From")?;
    }
    if form.to.is_empty() {
        form.to = prompt("To")?;
    }
    if let Err(errors) = form.validate() {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("invalid trip: {joined}");
    }
    let backend = HttpBackend::new(&config.backend)?;
    let response = backend
        .recommend(&FormPayload::from(&form))
        .context("requesting recommendations")?;
    let required = minimum_required(&form.start_date, &form.end_date, form.intensity);
    print!("{}", format_cards(&response, required));
    Ok(())
}

fn parse_date_arg(name: &str, raw: &str) -> Result<time::Date> {
    parse_calendar_date(raw).with_context(|| format!("{name} date '{raw}' is not a valid date"))
}

fn format_calendar(start: time::Date, end: time::Date) -> String {
    let span = generate_monthly_span(start, end);
    let Some(&last) = span.last() else {
        return "Start date is after end date; nothing to show.\n".to_string();
    };
    let window = TripWindow::new(start, end, Intensity::default()).ok();
    let mut out = String::new();
    let mut month = first_of_month(start);
    while month <= last {
        let grid = MonthGrid::for_month(month);
        let _ = writeln!(&mut out, "{:^21}", grid.title());
        let _ = writeln!(&mut out, "Su Mo Tu We Th Fr Sa");
        for week in &grid.weeks {
            let row: String = week
                .iter()
                .map(|cell| match cell {
                    Some(date) => {
                        let marker = if window.as_ref().is_some_and(|w| w.contains(*date)) { '*' } else { ' ' };
                        format!("{:>2}{marker}", date.day())
                    }
                    None => "   ".to_string(),
                })
                .collect();
            let _ = writeln!(&mut out, "{}", row.trim_end());
        }
        out.push('\n');
        month = shift_month(month, 1);
    }
    if let Some(window) = window {
        let _ = writeln!(&mut out, "* trip day ({} total)", window.day_count());
    }
    out
}

fn format_min_required(start: &str, end: &str, intensity: Intensity) -> String {
    let required = minimum_required(start, end, intensity);
    match TripWindow::parse(start, end, intensity) {
        Ok(window) => format!(
            "{required} POIs ({} day(s) × {} per day, {intensity})",
            window.day_count(),
            intensity.per_day()
        ),
        Err(err) => format!("{required} POIs (fallback: {err})"),
    }
}

fn format_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for (raw, day) in &report.merged_keys {
        let _ = writeln!(&mut out, "note: '{raw}' merged into {day}");
    }
    for (raw, day) in &report.recovered_keys {
        let _ = writeln!(&mut out, "note: '{raw}' read as {day} from its blocks");
    }
    for rejected in &report.rejected {
        let _ = writeln!(
            &mut out,
            "warning: dropped '{}' ({} block(s)), no readable date",
            rejected.raw, rejected.block_count
        );
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Text rendering of the preview: timed blocks and free-time gaps in order, then untimed blocks.
fn format_timelines(plan: &DayPlan, only: Option<DayKey>, min_gap: u16) -> String {
    if plan.is_empty() {
        return "No plan data found.\n".to_string();
    }
    let mut out = String::new();
    let days: Vec<DayKey> = plan.days().filter(|day| only.map_or(true, |only| only == *day)).collect();
    if days.is_empty() {
        return "No blocks for that day.\n".to_string();
    }
    for (index, day) in days.iter().enumerate() {
        let layout = plan.normalized_with_gap(*day, min_gap);
        let _ = writeln!(&mut out, "{day}  ({} of {})", index + 1, days.len());
        let mut gaps = layout.gaps.iter().peekable();
        for positioned in &layout.blocks {
            while let Some(gap) = gaps.next_if(|gap| gap.end <= positioned.start) {
                let _ = writeln!(
                    &mut out,
                    "               Free time: {}",
                    format_duration_minutes(gap.minutes())
                );
            }
            let _ = writeln!(
                &mut out,
                "  {}–{}  {} [{}]",
                positioned.start,
                positioned.end,
                positioned.block.activity(),
                positioned.category
            );
        }
        for skipped in &layout.skipped {
            let why = match skipped.reason {
                SkipReason::MissingStart => "no start time",
                SkipReason::MissingEnd => "no end time",
                SkipReason::InvalidStart => "unreadable start time",
                SkipReason::InvalidEnd => "unreadable end time",
            };
            let _ = writeln!(&mut out, "  --:--        {} ({why})", skipped.block.activity());
        }
        out.push('\n');
    }
    out
}

fn format_cards(response: &RecommendResponse, required: u32) -> String {
    if response.cards.is_empty() {
        return "No recommendations returned.\n".to_string();
    }
    let mut out = String::new();
    for poi in &response.cards {
        let mut headline = format!("{}  {}", poi.id, poi.name);
        if let Some(city) = &poi.city {
            let _ = write!(&mut headline, " ({city})");
        }
        if let Some(rating) = poi.rating {
            let _ = write!(&mut headline, "  ★{rating:.1}");
        }
        let _ = writeln!(&mut out, "{headline}");
        let summary = poi.description.replace('\n', " ");
        let summary = summary.trim();
        if !summary.is_empty() {
            let _ = writeln!(&mut out, "    {}", truncate_to_width(summary, CARD_DESCRIPTION_WIDTH));
        }
        if !poi.highlight_tags.is_empty() {
            let tags = poi
                .highlight_tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(&mut out, "    {tags}");
        }
    }
    let _ = writeln!(
        &mut out,
        "\n{} card(s), {} POI(s) in the pool; pick at least {required} to plan.",
        response.cards.len(),
        response.all_pois.len()
    );
    out
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poi::tests::poi;
    use crate::timeline::block::tests::activity;
    use time::macros::date;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn trip_args_override_planner_defaults() {
        let args = TripArgs {
            from: Some(" Boston ".into()),
            to: Some("New York".into()),
            start: Some("2025-04-04".into()),
            end: Some("2025-04-07".into()),
            intensity: Some(Intensity::Intense),
            round_trip: true,
            ..TripArgs::default()
        };
        let form = args.form(&PlannerDefaults::default());
        assert_eq!(form.from, "Boston");
        assert_eq!(form.intensity, Intensity::Intense);
        assert_eq!(form.wake_up_time.as_deref(), Some("08:00"));
        assert!(form.flags.contains(TripFlags::ROUND_TRIP));
        assert!(!form.flags.contains(TripFlags::INCLUDE_HOTELS));
        assert!(form.validate().is_ok());
    }

    #[test]
    fn calendar_marks_trip_days_across_months() {
        let out = format_calendar(date!(2025 - 04 - 29), date!(2025 - 05 - 02));
        assert!(out.contains("April 2025"));
        assert!(out.contains("May 2025"));
        assert!(out.contains("29*30*"));
        assert!(out.contains(" 1* 2*"));
        assert!(out.contains("(4 total)"));
    }

    #[test]
    fn inverted_calendar_span_prints_nothing() {
        let out = format_calendar(date!(2025 - 05 - 02), date!(2025 - 04 - 29));
        assert!(out.starts_with("Start date is after end date"));
    }

    #[test]
    fn min_required_explains_the_count() {
        assert_eq!(
            format_min_required("2025-04-04", "2025-04-07", Intensity::Normal),
            "8 POIs (4 day(s) × 2 per day, normal)"
        );
        assert!(format_min_required("soon", "later", Intensity::Chill).starts_with("3 POIs (fallback"));
    }

    #[test]
    fn timeline_interleaves_gaps_and_lists_untimed_blocks() -> TestResult {
        let day = DayKey::parse("2025-04-04").context("day key")?;
        let plan = DayPlan::from_days([(
            day,
            vec![
                activity("b", "11:30", "12:00", "Meal"),
                activity("a", "09:00", "10:00", "Sightseeing"),
                activity("c", "", "13:00", "Other"),
            ],
        )]);
        let out = format_timelines(&plan, None, 30);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "2025-04-04  (1 of 1)");
        assert!(lines[1].starts_with("  09:00–10:00"));
        assert_eq!(lines[2].trim(), "Free time: 1h 30m");
        assert!(lines[3].starts_with("  11:30–12:00"));
        assert!(lines[4].contains("(no start time)"));
        Ok(())
    }

    #[test]
    fn timeline_filters_to_one_day() -> TestResult {
        let first = DayKey::parse("2025-04-04").context("day key")?;
        let second = DayKey::parse("2025-04-05").context("day key")?;
        let plan = DayPlan::from_days([
            (first, vec![activity("a", "09:00", "10:00", "Meal")]),
            (second, vec![activity("b", "09:00", "10:00", "Meal")]),
        ]);
        let out = format_timelines(&plan, Some(second), 30);
        assert!(out.starts_with("2025-04-05"));
        assert!(!out.contains("2025-04-04"));
        assert_eq!(format_timelines(&DayPlan::default(), None, 30), "No plan data found.\n");
        Ok(())
    }

    #[test]
    fn cards_list_pool_size_and_gate() {
        let response = RecommendResponse {
            cards: vec![poi("p1", 40.7, -74.0)],
            all_pois: vec![poi("p1", 40.7, -74.0), poi("p2", 40.7, -74.0)],
        };
        let out = format_cards(&response, 8);
        assert!(out.starts_with("p1  "));
        assert!(out.contains("1 card(s), 2 POI(s) in the pool; pick at least 8 to plan."));
    }

    #[test]
    fn report_mentions_rejected_keys() {
        let report = IngestReport {
            rejected: vec![crate::timeline::RejectedKey {
                raw: "someday".into(),
                block_count: 2,
            }],
            ..IngestReport::default()
        };
        assert!(format_report(&report).contains("dropped 'someday' (2 block(s))"));
        assert!(format_report(&IngestReport::default()).is_empty());
    }
}
