//! Query validation and date-window resolution.
//!
//! This is the only place structurally invalid input is rejected. Everything
//! downstream receives a [`NewsQuery`] whose keyword, count and window are
//! already known to be well formed.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;

use crate::cli::{Cli, DateMode};
use crate::models::{LanguageSelection, SearchMode};

pub const MAX_KEYWORD_CHARS: usize = 200;
pub const MAX_COUNT: usize = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("keyword must not be empty")]
    EmptyKeyword,
    #[error("keyword must be at most 200 characters, got {0}")]
    KeywordTooLong(usize),
    #[error("count must be between 1 and 20, got {0}")]
    CountOutOfRange(usize),
    #[error("custom date mode requires both start_date and end_date")]
    MissingCustomDates,
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("start date {start} is later than end date {end}")]
    InvertedRange { start: String, end: String },
}

/// A validated request for one digest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub keyword: String,
    pub language: LanguageSelection,
    pub count: usize,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub search_mode: SearchMode,
}

impl NewsQuery {
    /// Validate raw inputs and resolve the date window against `now`.
    ///
    /// `now` carries the reference timezone; custom dates are interpreted in it.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        keyword: &str,
        language: LanguageSelection,
        count: usize,
        date_mode: DateMode,
        start_date: Option<&str>,
        end_date: Option<&str>,
        search_mode: SearchMode,
        now: DateTime<FixedOffset>,
    ) -> Result<Self, QueryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(QueryError::EmptyKeyword);
        }
        let chars = keyword.chars().count();
        if chars > MAX_KEYWORD_CHARS {
            return Err(QueryError::KeywordTooLong(chars));
        }
        if !(1..=MAX_COUNT).contains(&count) {
            return Err(QueryError::CountOutOfRange(count));
        }

        let (start, end) = resolve_window(date_mode, start_date, end_date, now)?;

        Ok(Self {
            keyword: keyword.to_string(),
            language,
            count,
            start,
            end,
            search_mode,
        })
    }

    /// Build a query from parsed command-line arguments.
    pub fn from_cli(cli: &Cli, now: DateTime<FixedOffset>) -> Result<Self, QueryError> {
        Self::build(
            &cli.keyword,
            cli.language,
            cli.count,
            cli.date_mode,
            cli.start_date.as_deref(),
            cli.end_date.as_deref(),
            cli.search_mode,
            now,
        )
    }
}

/// Resolve the `[start, end]` window in the timezone of `now`.
pub fn resolve_window(
    date_mode: DateMode,
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: DateTime<FixedOffset>,
) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), QueryError> {
    let tz = *now.offset();
    match date_mode {
        DateMode::Today => {
            let midnight = at(tz, now.date_naive(), NaiveTime::MIN);
            Ok((midnight, now))
        }
        DateMode::Custom => {
            let (Some(start_raw), Some(end_raw)) = (start_date, end_date) else {
                return Err(QueryError::MissingCustomDates);
            };
            let start_day = parse_day(start_raw)?;
            let end_day = parse_day(end_raw)?;
            if start_day > end_day {
                return Err(QueryError::InvertedRange {
                    start: start_raw.trim().to_string(),
                    end: end_raw.trim().to_string(),
                });
            }
            let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
            Ok((at(tz, start_day, NaiveTime::MIN), at(tz, end_day, last_second)))
        }
    }
}

/// The day before `date`, saturating at the earliest representable date.
pub fn day_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

/// The day after `date`, saturating at the latest representable date.
pub fn day_after(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

fn parse_day(raw: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| QueryError::InvalidDate(raw.to_string()))
}

fn at(tz: FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<FixedOffset> {
    // Fixed offsets have no gaps or folds, so the mapping is always single.
    tz.from_local_datetime(&date.and_time(time))
        .single()
        .unwrap_or_else(|| date.and_time(time).and_utc().with_timezone(&tz))
}
