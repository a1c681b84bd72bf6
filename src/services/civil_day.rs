//! Civil-day arithmetic for a fixed-offset business timezone.
//!
//! Storage is always UTC; every "today", "this month" or time-of-day rule in the
//! engine goes through [`CivilCalendar`] so the offset lives in one place.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// India Standard Time, UTC+05:30.
pub const IST_OFFSET_MINUTES: i32 = 5 * 60 + 30;

/// A local calendar day and the UTC instants bounding it (`start` inclusive, `end` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CivilDay {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CivilDay {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Half-open UTC range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl InstantRange {
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilCalendar {
    offset: FixedOffset,
}

impl Default for CivilCalendar {
    fn default() -> Self {
        Self::ist()
    }
}

impl CivilCalendar {
    pub fn ist() -> Self {
        Self::from_offset_minutes(IST_OFFSET_MINUTES).expect("IST offset is in range")
    }

    /// `None` when the offset is outside ±24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local_datetime(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn civil_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local_datetime(instant).date()
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        self.local_datetime(instant).time()
    }

    /// Whole minutes since local midnight; seconds are truncated.
    pub fn minute_of_day(&self, instant: DateTime<Utc>) -> i64 {
        let time = self.local_time(instant);
        i64::from(time.hour()) * 60 + i64::from(time.minute())
    }

    /// UTC instant of local midnight on `date`.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    pub fn day(&self, date: NaiveDate) -> CivilDay {
        let start = self.day_start(date);
        CivilDay {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> CivilDay {
        self.day(self.civil_date(now))
    }

    /// Places the wall-clock time of `stored` onto `date`.
    ///
    /// Office hours are stored as full instants, but only their local time of day
    /// carries meaning.
    pub fn anchor_time_of_day(&self, stored: DateTime<Utc>, date: NaiveDate) -> DateTime<Utc> {
        let since_midnight = self.local_time(stored) - NaiveTime::MIN;
        self.day_start(date) + since_midnight
    }

    pub fn days_in_month(&self, year: i32, month: u32) -> AppResult<u32> {
        let first = first_of_month(year, month)?;
        let next = first_of_next_month(first)?;
        Ok((next - first).num_days() as u32)
    }

    /// Full bounds of a civil month, future days included.
    pub fn month_range(&self, year: i32, month: u32) -> AppResult<InstantRange> {
        let first = first_of_month(year, month)?;
        Ok(InstantRange {
            start: self.day_start(first),
            end: self.day_start(first_of_next_month(first)?),
        })
    }

    /// Bounds of a civil month. For the month containing `now` the end is clamped to
    /// just after `now`; a month entirely in the future yields an empty range.
    pub fn month_bounds(&self, year: i32, month: u32, now: DateTime<Utc>) -> AppResult<InstantRange> {
        let range = self.month_range(year, month)?;
        Ok(clamp_to_now(range.start, range.end, now))
    }

    pub fn year_bounds(&self, year: i32) -> AppResult<InstantRange> {
        let first = first_of_month(year, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| AppError::validation(format!("year out of range: {}", year)))?;
        Ok(InstantRange {
            start: self.day_start(first),
            end: self.day_start(next),
        })
    }

    /// `(year, month)` of the civil day containing `instant`.
    pub fn year_month(&self, instant: DateTime<Utc>) -> (i32, u32) {
        let date = self.civil_date(instant);
        (date.year(), date.month())
    }
}

/// Every date in `[from, to]`, ascending.
pub fn days_inclusive(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |day| *day <= to)
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}

fn first_of_month(year: i32, month: u32) -> AppResult<NaiveDate> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation(format!("month must be 1-12, got {}", month)));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("year out of range: {}", year)))
}

fn first_of_next_month(first: NaiveDate) -> AppResult<NaiveDate> {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation(format!("year out of range: {}", year)))
}

fn clamp_to_now(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> InstantRange {
    if now < start {
        InstantRange { start, end: start }
    } else if now < end {
        // Stored instants carry microsecond precision, so `now` itself stays inside
        InstantRange { start, end: now + Duration::microseconds(1) }
    } else {
        InstantRange { start, end }
    }
}
