use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::timeline::block::ScheduleBlock;
use crate::timeline::normalize::{normalize_with_gap, NormalizedDay, DEFAULT_MIN_GAP_MINUTES};
use crate::trip::DayKey;

/// Raw day key that could not be mapped to a calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedKey {
    pub raw: String,
    pub block_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Raw keys that merged into an already-seen canonical day.
    pub merged_keys: Vec<(String, DayKey)>,
    /// Raw keys resolved through the blocks' own date because the key was unreadable.
    pub recovered_keys: Vec<(String, DayKey)>,
    pub rejected: Vec<RejectedKey>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.merged_keys.is_empty() && self.recovered_keys.is_empty() && self.rejected.is_empty()
    }
}

/// Schedule blocks keyed by canonical day. Immutable once ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayPlan {
    days: BTreeMap<DayKey, Vec<ScheduleBlock>>,
}

impl DayPlan {
    /// Canonicalizes backend day keys. Keys naming the same calendar day have
    /// their blocks concatenated in backend order.
    pub fn ingest(raw: IndexMap<String, Vec<ScheduleBlock>>) -> (Self, IngestReport) {
        let mut days: BTreeMap<DayKey, Vec<ScheduleBlock>> = BTreeMap::new();
        let mut report = IngestReport::default();

        for (raw_key, blocks) in raw {
            let key = match DayKey::parse(&raw_key) {
                Some(key) => key,
                None => match blocks.iter().find_map(ScheduleBlock::calendar_day) {
                    Some(date) => {
                        tracing::warn!(raw_key = %raw_key, day = %DayKey(date), "day key unreadable, using block date");
                        report.recovered_keys.push((raw_key.clone(), DayKey(date)));
                        DayKey(date)
                    }
                    None => {
                        tracing::warn!(raw_key = %raw_key, blocks = blocks.len(), "dropping day with unreadable key");
                        report.rejected.push(RejectedKey {
                            raw: raw_key,
                            block_count: blocks.len(),
                        });
                        continue;
                    }
                },
            };
            if days.contains_key(&key) {
                tracing::debug!(raw_key = %raw_key, day = %key, "merging duplicate day key");
                report.merged_keys.push((raw_key, key));
            }
            days.entry(key).or_default().extend(blocks);
        }

        (Self { days }, report)
    }

    pub fn from_days(days: impl IntoIterator<Item = (DayKey, Vec<ScheduleBlock>)>) -> Self {
        let mut plan = Self::default();
        for (key, blocks) in days {
            plan.days.entry(key).or_default().extend(blocks);
        }
        plan
    }

    pub fn blocks(&self, day: DayKey) -> &[ScheduleBlock] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, day: DayKey) -> bool {
        self.days.contains_key(&day)
    }

    pub fn days(&self) -> impl Iterator<Item = DayKey> + '_ {
        self.days.keys().copied()
    }

    pub fn first_day(&self) -> Option<DayKey> {
        self.days.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<DayKey> {
        self.days.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_blocks(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn normalized(&self, day: DayKey) -> NormalizedDay {
        self.normalized_with_gap(day, DEFAULT_MIN_GAP_MINUTES)
    }

    pub fn normalized_with_gap(&self, day: DayKey, min_gap: u16) -> NormalizedDay {
        normalize_with_gap(self.blocks(day), min_gap)
    }

    /// Neighbouring day present in the plan, used for day paging.
    pub fn step(&self, from: DayKey, forward: bool) -> Option<DayKey> {
        if forward {
            self.days.range(from..).map(|(k, _)| *k).find(|k| *k != from)
        } else {
            self.days.range(..from).next_back().map(|(k, _)| *k)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::block::tests::activity;
    use crate::timeline::block::ActivityBlock;
    use time::macros::date;

    fn raw(entries: Vec<(&str, Vec<ScheduleBlock>)>) -> IndexMap<String, Vec<ScheduleBlock>> {
        entries
            .into_iter()
            .map(|(key, blocks)| (key.to_string(), blocks))
            .collect()
    }

    #[test]
    fn merges_same_day_in_different_formats_in_order() {
        let (plan, report) = DayPlan::ingest(raw(vec![
            ("2025-04-04", vec![activity("a", "09:00", "10:00", "Meal")]),
            ("2025-04-05", vec![activity("c", "09:00", "10:00", "Meal")]),
            (
                "Fri, 04 Apr 2025 00:00:00 +0000",
                vec![activity("b", "08:00", "08:30", "Meal")],
            ),
        ]));
        let key = DayKey(date!(2025 - 04 - 04));
        let ids: Vec<_> = plan.blocks(key).iter().filter_map(|b| b.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(plan.len(), 2);
        assert_eq!(report.merged_keys.len(), 1);
        assert_eq!(report.merged_keys[0].1, key);
    }

    #[test]
    fn unreadable_key_recovers_from_block_date_or_is_rejected() {
        let dated = ScheduleBlock::Activity(ActivityBlock {
            date: Some("2025-04-06".into()),
            start_time: Some("09:00".into()),
            end_time: Some("10:00".into()),
            ..ActivityBlock::default()
        });
        let (plan, report) = DayPlan::ingest(raw(vec![
            ("Day 3", vec![dated]),
            ("Day 4", vec![activity("x", "09:00", "10:00", "Meal")]),
        ]));
        assert!(plan.contains(DayKey(date!(2025 - 04 - 06))));
        assert_eq!(report.recovered_keys.len(), 1);
        assert_eq!(
            report.rejected,
            vec![RejectedKey {
                raw: "Day 4".into(),
                block_count: 1
            }]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn days_iterate_in_calendar_order_and_step() {
        let (plan, report) = DayPlan::ingest(raw(vec![
            ("2025-04-07T00:00:00", vec![]),
            ("2025-04-04", vec![]),
            ("2025/04/05", vec![]),
        ]));
        assert!(report.is_clean());
        let keys: Vec<String> = plan.days().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2025-04-04", "2025-04-05", "2025-04-07"]);
        let first = plan.first_day().expect("first day");
        assert_eq!(plan.step(first, true).map(|k| k.to_string()).as_deref(), Some("2025-04-05"));
        assert_eq!(plan.step(first, false), None);
        assert_eq!(plan.last_day().and_then(|d| plan.step(d, true)), None);
        assert!(plan.blocks(DayKey(date!(2025 - 04 - 06))).is_empty());
    }

    #[test]
    fn normalized_view_sorts_stored_order() {
        let plan = DayPlan::from_days([(
            DayKey(date!(2025 - 04 - 04)),
            vec![
                activity("late", "14:00", "15:00", "Sightseeing"),
                activity("early", "08:00", "09:00", "Meal"),
            ],
        )]);
        let day = plan.normalized(DayKey(date!(2025 - 04 - 04)));
        assert_eq!(day.blocks[0].block.id(), Some("early"));
        assert_eq!(plan.total_blocks(), 2);
    }
}
