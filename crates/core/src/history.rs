//! Filtering and sorting of the history log as shown in the history view.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::HistoryRecordView;

/// Direction applied when sorting by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Predicate over joined history records.
///
/// Every criterion is optional; an empty filter accepts everything. Date
/// bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub search: Option<String>,
    pub company_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// Sets the date bounds from calendar days in `tz`, covering the whole end day.
    pub fn with_days(
        mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        tz: Tz,
    ) -> Result<Self, HistoryError> {
        self.start = start
            .map(|day| local_instant(day, NaiveTime::MIN, tz, Duration::hours(1)))
            .transpose()?;
        let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
            .ok_or(HistoryError::InvalidDay)?;
        self.end = end
            .map(|day| local_instant(day, end_of_day, tz, Duration::hours(-1)))
            .transpose()?;
        Ok(self)
    }

    pub fn matches(&self, record: &HistoryRecordView) -> bool {
        let entry = &record.entry;

        if let Some(company_id) = self.company_id.as_deref().filter(|id| !id.is_empty()) {
            if entry.company_id != company_id {
                return false;
            }
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let contains = |value: Option<&str>| {
                value
                    .map(|text| text.to_lowercase().contains(&term))
                    .unwrap_or(false)
            };
            if !contains(record.employee_name.as_deref())
                && !contains(record.company_name.as_deref())
            {
                return false;
            }
        }

        if self.start.is_some_and(|start| entry.date < start) {
            return false;
        }
        if self.end.is_some_and(|end| entry.date > end) {
            return false;
        }

        true
    }
}

/// Keeps the records accepted by `filter`, sorted by date in `order`.
///
/// Records sharing a date are ordered by id so the descending result is
/// always the exact reverse of the ascending one.
pub fn filter_and_sort(
    records: impl IntoIterator<Item = HistoryRecordView>,
    filter: &HistoryFilter,
    order: SortOrder,
) -> Vec<HistoryRecordView> {
    let mut kept: Vec<HistoryRecordView> = records
        .into_iter()
        .filter(|record| filter.matches(record))
        .collect();
    kept.sort_by(|a, b| {
        a.entry
            .date
            .cmp(&b.entry.date)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
    if order == SortOrder::Desc {
        kept.reverse();
    }
    kept
}

/// Client-side state of the history screen over one fully fetched collection.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    records: Vec<HistoryRecordView>,
    pub filter: HistoryFilter,
    pub order: SortOrder,
}

impl HistoryView {
    pub fn new(records: Vec<HistoryRecordView>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn toggle_sort(&mut self) {
        self.order = self.order.toggled();
    }

    /// Records currently visible under the active filter and sort order.
    pub fn visible(&self) -> Vec<HistoryRecordView> {
        filter_and_sort(self.records.iter().cloned(), &self.filter, self.order)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, HistoryError> {
    name.parse::<Tz>()
        .map_err(|_| HistoryError::InvalidTimezone(name.to_string()))
}

/// Resolves a local wall-clock time to UTC.
///
/// A time inside a DST gap is moved by `gap_shift` out of the gap: forward
/// for start bounds, backward for end bounds.
fn local_instant(
    day: NaiveDate,
    time: NaiveTime,
    tz: Tz,
    gap_shift: Duration,
) -> Result<DateTime<Utc>, HistoryError> {
    let naive = day.and_time(time);
    let local = tz.from_local_datetime(&naive).earliest().or_else(|| {
        let shifted = tz.from_local_datetime(&(naive + gap_shift));
        if gap_shift < Duration::zero() {
            shifted.latest()
        } else {
            shifted.earliest()
        }
    });
    local
        .map(|local| local.with_timezone(&Utc))
        .ok_or(HistoryError::InvalidDay)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("day does not exist in the configured timezone")]
    InvalidDay,
}
