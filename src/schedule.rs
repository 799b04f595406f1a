//! Monthly schedule arithmetic shared by EMIs, payments and the forecast.
//!
//! A payment with `emi_day = 31` falls on the last day of shorter months, so
//! every date produced here goes through [`YearMonth::day`], which clamps the
//! day-of-month instead of rolling over into the next month.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::models::PaymentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn index(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: (index.rem_euclid(12) + 1) as u32,
        }
    }

    pub fn succ(self) -> Self {
        self.plus(1)
    }

    pub fn plus(self, months: u32) -> Self {
        Self::from_index(self.index() + months as i64)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(self, other: YearMonth) -> i64 {
        other.index() - self.index()
    }

    /// The date in this month with `day` clamped to `1..=last_day`.
    pub fn day(self, day: u32) -> NaiveDate {
        clamp_day(self.year, self.month, day)
    }

    pub fn first_date(self) -> NaiveDate {
        self.day(1)
    }

    pub fn last_date(self) -> NaiveDate {
        self.day(31)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("Invalid month '{s}' (expected YYYY-MM)");
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u32 = m.parse().map_err(|_| bad())?;
        if !(1..=12).contains(&month) {
            return Err(bad());
        }
        Ok(YearMonth { year, month })
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

pub fn clamp_day(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, last_day_of_month(year, month));
    // Only out-of-range years fail here; saturate rather than panic.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
}

/// Scheduled occurrence in `month`, if it falls within `[start, end]`.
pub fn occurrence_in(
    start: NaiveDate,
    end: Option<NaiveDate>,
    emi_day: u32,
    month: YearMonth,
) -> Option<NaiveDate> {
    let date = month.day(emi_day);
    let after_start = date >= start;
    let before_end = end.map_or(true, |e| date <= e);
    (after_start && before_end).then_some(date)
}

/// All scheduled dates within `[start, end]` inclusive.
pub fn occurrences(start: NaiveDate, end: NaiveDate, emi_day: u32) -> Vec<NaiveDate> {
    if end < start {
        return Vec::new();
    }
    let last = YearMonth::of(end);
    let mut cursor = YearMonth::of(start);
    let mut dates = Vec::new();
    while cursor <= last {
        if let Some(date) = occurrence_in(start, Some(end), emi_day, cursor) {
            dates.push(date);
        }
        cursor = cursor.succ();
    }
    dates
}

pub fn count_occurrences(start: NaiveDate, end: NaiveDate, emi_day: u32) -> u32 {
    occurrences(start, end, emi_day).len() as u32
}

/// Occurrences due by `today` that are not yet covered by `paid_count`.
pub fn pending_count(
    start: NaiveDate,
    end: Option<NaiveDate>,
    emi_day: u32,
    paid_count: u32,
    today: NaiveDate,
) -> u32 {
    let until = end.map_or(today, |e| e.min(today));
    count_occurrences(start, until, emi_day).saturating_sub(paid_count)
}

/// The `n`-th (0-based) scheduled date on or after `start`.
pub fn nth_occurrence(start: NaiveDate, emi_day: u32, n: u32) -> NaiveDate {
    let mut first = YearMonth::of(start);
    if first.day(emi_day) < start {
        first = first.succ();
    }
    first.plus(n).day(emi_day)
}

/// Due date of a payment's next unpaid occurrence, `None` once past its end.
pub fn next_due(start: NaiveDate, end: Option<NaiveDate>, emi_day: u32, paid_count: u32) -> Option<NaiveDate> {
    let date = nth_occurrence(start, emi_day, paid_count);
    match end {
        Some(e) if date > e => None,
        _ => Some(date),
    }
}

/// Due date of EMI installment `k` (0-based): `start` moved forward `k`
/// months, keeping start's day-of-month where the month allows it.
pub fn installment_due(start: NaiveDate, k: u32) -> NaiveDate {
    YearMonth::of(start).plus(k).day(start.day())
}

/// Installments still owed on a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Count(u32),
    Ongoing,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Count(n) => write!(f, "{n}"),
            Remaining::Ongoing => f.write_str("Ongoing"),
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Count(n) => serializer.serialize_u32(*n),
            Remaining::Ongoing => serializer.serialize_str("Ongoing"),
        }
    }
}

pub fn remaining_installments(
    kind: PaymentKind,
    start: NaiveDate,
    end: Option<NaiveDate>,
    emi_day: u32,
    paid_count: u32,
) -> Remaining {
    match (kind, end) {
        (PaymentKind::Ending, Some(end)) => {
            Remaining::Count(count_occurrences(start, end, emi_day).saturating_sub(paid_count))
        }
        _ => Remaining::Ongoing,
    }
}
