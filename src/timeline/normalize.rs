use crate::timeline::block::{BlockCategory, ScheduleBlock};
use crate::timeline::clock::{ClockTime, MINUTES_PER_DAY};

pub const DEFAULT_MIN_GAP_MINUTES: u16 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedBlock {
    pub block: ScheduleBlock,
    pub start: ClockTime,
    pub end: ClockTime,
    /// Fraction of the day above the block, in `[0, 1]`.
    pub top: f64,
    /// Fraction of the day the block covers, in `[0, 1]`.
    pub height: f64,
    pub category: BlockCategory,
}

impl PositionedBlock {
    pub fn duration_minutes(&self) -> u16 {
        self.end
            .minute_of_day()
            .saturating_sub(self.start.minute_of_day())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeTimeGap {
    pub start: ClockTime,
    pub end: ClockTime,
    pub top: f64,
    pub height: f64,
}

impl FreeTimeGap {
    pub fn minutes(&self) -> u16 {
        self.end.minute_of_day() - self.start.minute_of_day()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingStart,
    MissingEnd,
    InvalidStart,
    InvalidEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBlock {
    pub block: ScheduleBlock,
    pub reason: SkipReason,
}

/// Time-axis layout of one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDay {
    pub blocks: Vec<PositionedBlock>,
    pub gaps: Vec<FreeTimeGap>,
    pub skipped: Vec<SkippedBlock>,
}

impl NormalizedDay {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn position_of(&self, selection_key: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|positioned| positioned.block.selection_key().as_deref() == Some(selection_key))
    }
}

pub fn normalize(blocks: &[ScheduleBlock]) -> NormalizedDay {
    normalize_with_gap(blocks, DEFAULT_MIN_GAP_MINUTES)
}

/// Sorts a day's blocks by start time, places them on a 1440-minute axis and
/// reports free gaps of at least `min_gap` minutes. Overlaps are kept as-is.
pub fn normalize_with_gap(blocks: &[ScheduleBlock], min_gap: u16) -> NormalizedDay {
    let mut day = NormalizedDay::default();
    let mut timed = Vec::with_capacity(blocks.len());

    for block in blocks {
        match read_times(block) {
            Ok((start, end)) => timed.push((start, end, block)),
            Err(reason) => {
                tracing::warn!(
                    activity = %block.activity(),
                    start = ?block.start_time(),
                    end = ?block.end_time(),
                    ?reason,
                    "excluding block from time layout"
                );
                day.skipped.push(SkippedBlock {
                    block: block.clone(),
                    reason,
                });
            }
        }
    }

    timed.sort_by_key(|(start, _, _)| *start);
    // Untimed blocks keep a rough order for the text list.
    day.skipped
        .sort_by_cached_key(|skipped| ClockTime::minute_of_day_or_zero(skipped.block.start_time()));

    let mut latest_end: Option<u16> = None;
    for (start, end, block) in timed {
        let start_min = start.minute_of_day();
        let end_min = end.minute_of_day();

        if let Some(cursor) = latest_end {
            if start_min >= cursor && start_min - cursor >= min_gap {
                if let (Some(gap_start), Some(gap_end)) = (
                    ClockTime::from_minute_of_day(cursor),
                    ClockTime::from_minute_of_day(start_min),
                ) {
                    day.gaps.push(FreeTimeGap {
                        start: gap_start,
                        end: gap_end,
                        top: day_fraction(i32::from(cursor)),
                        height: day_fraction(i32::from(start_min) - i32::from(cursor)),
                    });
                }
            }
        }
        let reach = end_min.max(start_min);
        latest_end = Some(latest_end.map_or(reach, |cursor| cursor.max(reach)));

        day.blocks.push(PositionedBlock {
            category: block.category(),
            top: day_fraction(i32::from(start_min)),
            height: day_fraction(i32::from(end_min) - i32::from(start_min)),
            start,
            end,
            block: block.clone(),
        });
    }

    if !day.skipped.is_empty() {
        tracing::debug!(
            skipped = day.skipped.len(),
            laid_out = day.blocks.len(),
            "normalized day with excluded blocks"
        );
    }
    day
}

fn read_times(block: &ScheduleBlock) -> Result<(ClockTime, ClockTime), SkipReason> {
    let start = match block.start_time().map(str::trim) {
        None | Some("") => return Err(SkipReason::MissingStart),
        Some(raw) => ClockTime::parse(raw).ok_or(SkipReason::InvalidStart)?,
    };
    let end = match block.end_time().map(str::trim) {
        None | Some("") => return Err(SkipReason::MissingEnd),
        Some(raw) => ClockTime::parse(raw).ok_or(SkipReason::InvalidEnd)?,
    };
    Ok((start, end))
}

fn day_fraction(minutes: i32) -> f64 {
    (f64::from(minutes) / f64::from(MINUTES_PER_DAY)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::block::tests::activity;
    use crate::timeline::block::ActivityBlock;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn meal_then_sightseeing_leaves_one_hour_gap() {
        let day = normalize(&[
            activity("b", "10:00", "11:30", "Sightseeing"),
            activity("a", "08:00", "09:00", "Meal"),
        ]);
        assert_eq!(day.blocks.len(), 2);
        assert_eq!(day.blocks[0].category, BlockCategory::Meal);
        assert!(approx(day.blocks[0].top, 0.3333));
        assert!(approx(day.blocks[0].height, 0.0417));
        assert!(approx(day.blocks[1].top, 0.4167));
        assert!(approx(day.blocks[1].height, 0.0625));
        assert_eq!(day.gaps.len(), 1);
        assert_eq!(day.gaps[0].start.to_string(), "09:00");
        assert_eq!(day.gaps[0].end.to_string(), "10:00");
        assert_eq!(day.gaps[0].minutes(), 60);
    }

    #[test]
    fn untimed_blocks_are_ordered_by_any_readable_start() {
        let day = normalize(&[
            activity("late", "15:00", "later", "Sightseeing"),
            activity("broken", "soon", "10:00", "Meal"),
            activity("early", "09:00", "", "Meal"),
        ]);
        assert!(day.blocks.is_empty());
        let order: Vec<_> = day.skipped.iter().map(|s| s.block.id().unwrap_or("")).collect();
        assert_eq!(order, ["broken", "early", "late"]);
        assert_eq!(day.skipped[1].reason, SkipReason::MissingEnd);
    }

    #[test]
    fn short_gaps_are_not_surfaced() {
        let day = normalize(&[
            activity("a", "08:00", "09:00", "Meal"),
            activity("b", "09:29", "10:00", "Sightseeing"),
            activity("c", "10:30", "11:00", "Sightseeing"),
        ]);
        assert_eq!(day.gaps.len(), 1);
        assert_eq!(day.gaps[0].minutes(), 30);
    }

    #[test]
    fn missing_and_malformed_times_are_excluded_and_counted() {
        let missing = ScheduleBlock::Activity(ActivityBlock {
            activity: "Lunch".into(),
            kind: "Meal".into(),
            ..ActivityBlock::default()
        });
        let day = normalize(&[
            missing,
            activity("x", "25:00", "26:00", "Other"),
            activity("y", "09:00", "late", "Other"),
            activity("z", "12:00", "13:00", "Flexible"),
        ]);
        assert_eq!(day.blocks.len(), 1);
        assert_eq!(day.blocks[0].category, BlockCategory::Other);
        let reasons: Vec<_> = day.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::MissingStart,
                SkipReason::InvalidStart,
                SkipReason::InvalidEnd
            ]
        );
    }

    #[test]
    fn overlaps_are_preserved_and_gaps_stay_disjoint() {
        let day = normalize(&[
            activity("long", "08:00", "12:00", "Sightseeing"),
            activity("inner", "09:00", "10:00", "Meal"),
            activity("late", "11:00", "13:00", "Sightseeing"),
            activity("evening", "15:00", "16:00", "Meal"),
            activity("night", "18:00", "17:00", "Other"),
            activity("after", "18:45", "19:00", "Other"),
        ]);
        assert_eq!(day.blocks.len(), 6);
        let gap_spans: Vec<_> = day
            .gaps
            .iter()
            .map(|g| (g.start.to_string(), g.end.to_string()))
            .collect();
        assert_eq!(
            gap_spans,
            vec![
                ("13:00".to_string(), "15:00".to_string()),
                ("16:00".to_string(), "18:00".to_string()),
                ("18:00".to_string(), "18:45".to_string()),
            ]
        );
        for gap in &day.gaps {
            assert!(gap.minutes() >= DEFAULT_MIN_GAP_MINUTES);
        }
        for pair in day.gaps.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        let night = &day.blocks[4];
        assert_eq!(night.height, 0.0);
    }

    #[test]
    fn equal_start_times_keep_input_order() {
        let day = normalize(&[
            activity("first", "09:00", "10:00", "Meal"),
            activity("second", "09:00", "09:30", "Other"),
        ]);
        let ids: Vec<_> = day.blocks.iter().filter_map(|b| b.block.id()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(day.position_of("second"), Some(1));
    }

    #[test]
    fn custom_gap_threshold_is_respected() {
        let blocks = [
            activity("a", "08:00", "09:00", "Meal"),
            activity("b", "09:20", "10:00", "Meal"),
        ];
        assert!(normalize(&blocks).gaps.is_empty());
        assert_eq!(normalize_with_gap(&blocks, 15).gaps.len(), 1);
    }
}
