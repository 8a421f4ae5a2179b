use super::{inclusive_day_count, parse_calendar_date, Intensity, TripWindow};

/// Returned when either trip date cannot be read, so the user is never blocked on a parse error.
pub const FALLBACK_MINIMUM: u32 = 3;

/// Minimum number of POIs the user must pick before a plan can be requested.
///
/// `days = max(1, whole days between the dates + 1)`, multiplied by the
/// intensity's per-day target. The same formula gates both the swipe deck and
/// the recommendation grid.
pub fn minimum_required(start: &str, end: &str, intensity: Intensity) -> u32 {
    let (Some(start_date), Some(end_date)) = (parse_calendar_date(start), parse_calendar_date(end))
    else {
        tracing::warn!(
            start,
            end,
            fallback = FALLBACK_MINIMUM,
            "unparseable trip dates, using fallback minimum selection"
        );
        return FALLBACK_MINIMUM;
    };
    inclusive_day_count(start_date, end_date) * intensity.per_day()
}

pub fn minimum_required_for(window: &TripWindow) -> u32 {
    window.day_count() * window.intensity().per_day()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn four_day_normal_trip_needs_eight() {
        assert_eq!(minimum_required("2025-04-04", "2025-04-07", Intensity::Normal), 8);
    }

    #[test]
    fn accepts_datetime_strings() {
        assert_eq!(
            minimum_required("2025-04-04T08:00", "2025-04-05T20:00", Intensity::Intense),
            6
        );
    }

    #[test]
    fn malformed_dates_fall_back() {
        assert_eq!(minimum_required("", "2025-04-07", Intensity::Chill), FALLBACK_MINIMUM);
        assert_eq!(minimum_required("soon", "later", Intensity::Intense), FALLBACK_MINIMUM);
    }

    #[test]
    fn same_day_and_inverted_spans_count_one_day() {
        assert_eq!(minimum_required("2025-04-04", "2025-04-04", Intensity::Chill), 1);
        assert_eq!(minimum_required("2025-04-07", "2025-04-04", Intensity::Normal), 2);
    }

    #[test]
    fn intensity_ordering_holds_and_grows_with_length() {
        let mut previous = [0u32; 3];
        for end_day in 4..=20 {
            let end = format!("2025-04-{end_day:02}");
            let counts: Vec<u32> = Intensity::iter()
                .map(|intensity| minimum_required("2025-04-04", &end, intensity))
                .collect();
            assert!(counts[0] <= counts[1] && counts[1] <= counts[2]);
            for (current, before) in counts.iter().zip(previous.iter()) {
                assert!(current >= before);
            }
            previous = [counts[0], counts[1], counts[2]];
        }
    }

    #[test]
    fn window_and_string_forms_agree() -> anyhow::Result<()> {
        let window = TripWindow::parse("2025-12-30", "2026-01-02", Intensity::Intense)?;
        assert_eq!(
            minimum_required_for(&window),
            minimum_required("2025-12-30", "2026-01-02", Intensity::Intense)
        );
        Ok(())
    }
}
