use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime,
    SecondsFormat, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::errors::ExportError;

/// Length of one export window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalType {
    Hour,
    #[default]
    Day,
    Month,
}

impl IntervalType {
    pub fn as_code(&self) -> &'static str {
        match self {
            IntervalType::Hour => "hour",
            IntervalType::Day => "day",
            IntervalType::Month => "month",
        }
    }
}

/// Immutable `[start, end)` range in UTC plus the fixed offset used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
}

/// Converts whole hours east of UTC into a fixed offset.
pub fn fixed_offset(tz_offset_hours: i32) -> Result<FixedOffset, ExportError> {
    tz_offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ExportError::Config(format!("invalid timezone offset: {tz_offset_hours}h")))
}

impl TimeWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Result<Self, ExportError> {
        if start >= end {
            return Err(ExportError::Config(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end, offset })
    }

    /// Window ending at `now` truncated to the granularity boundary in local
    /// time, one calendar unit long.
    pub fn resolve(
        now: DateTime<Utc>,
        tz_offset_hours: i32,
        interval: IntervalType,
    ) -> Result<Self, ExportError> {
        let offset = fixed_offset(tz_offset_hours)?;
        let local = now.with_timezone(&offset);

        let (start_local, end_local) = match interval {
            IntervalType::Hour => {
                let end = local_at(&offset, local.date_naive(), local.hour())?;
                (end - Duration::hours(1), end)
            }
            IntervalType::Day => {
                let end = local_at(&offset, local.date_naive(), 0)?;
                let start = end
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| out_of_range(now))?;
                (start, end)
            }
            IntervalType::Month => {
                let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
                    .ok_or_else(|| out_of_range(now))?;
                let end = local_at(&offset, first, 0)?;
                let start = end
                    .checked_sub_months(Months::new(1))
                    .ok_or_else(|| out_of_range(now))?;
                (start, end)
            }
        };

        Self::new(
            start_local.with_timezone(&Utc),
            end_local.with_timezone(&Utc),
            offset,
        )
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Window start in local wall-clock time; names the exported file.
    pub fn local_start(&self) -> NaiveDateTime {
        self.to_local(self.start)
    }

    pub fn to_local(&self, time: DateTime<Utc>) -> NaiveDateTime {
        time.with_timezone(&self.offset).naive_local()
    }

    /// `2006-01-02T15:04:05.000000000Z` shape expected by the query API.
    pub fn start_rfc3339(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    pub fn end_rfc3339(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

fn local_at(
    offset: &FixedOffset,
    date: NaiveDate,
    hour: u32,
) -> Result<DateTime<FixedOffset>, ExportError> {
    date.and_hms_opt(hour, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .ok_or_else(|| ExportError::Config(format!("cannot build local time {date} {hour}:00")))
}

fn out_of_range(now: DateTime<Utc>) -> ExportError {
    ExportError::Config(format!("time window out of range for {now}"))
}
