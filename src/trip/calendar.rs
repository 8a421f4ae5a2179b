use time::{Date, Month};

/// Every calendar day from the first of `start`'s month through the last of `end`'s month.
///
/// Returns an empty sequence when `start` is after `end`.
pub fn generate_monthly_span(start: Date, end: Date) -> Vec<Date> {
    if start > end {
        tracing::warn!(%start, %end, "calendar span requested with start after end");
        return Vec::new();
    }
    let first = first_of_month(start);
    let last = last_of_month(end);
    std::iter::successors(Some(first), |day| day.next_day())
        .take_while(|day| *day <= last)
        .collect()
}

pub fn first_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

pub fn last_of_month(date: Date) -> Date {
    let days = date.month().length(date.year());
    date.replace_day(days).unwrap_or(date)
}

pub fn shift_month(date: Date, delta: i32) -> Date {
    let base = first_of_month(date);
    let index = base.year() * 12 + i32::from(u8::from(base.month())) - 1 + delta;
    let year = index.div_euclid(12);
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
    Date::from_calendar_date(year, month, 1).unwrap_or(base)
}

/// One month laid out in Sunday-first week rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub month_start: Date,
    pub weeks: Vec<[Option<Date>; 7]>,
}

impl MonthGrid {
    pub fn for_month(date: Date) -> Self {
        let month_start = first_of_month(date);
        let days = generate_monthly_span(month_start, month_start);
        let mut weeks = Vec::with_capacity(6);
        let mut row = [None; 7];
        for day in days {
            let column = day.weekday().number_days_from_sunday() as usize;
            row[column] = Some(day);
            if column == 6 {
                weeks.push(row);
                row = [None; 7];
            }
        }
        if row.iter().any(Option::is_some) {
            weeks.push(row);
        }
        Self { month_start, weeks }
    }

    pub fn title(&self) -> String {
        format!("{} {}", self.month_start.month(), self.month_start.year())
    }

    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.month_start.year() && date.month() == self.month_start.month()
    }
}
