//! Normalized event types produced by the event builder.
//!
//! An [`Event`] carries the fixed set of recognized fields plus the raw
//! extra properties (recurrence rules and verbatim custom directives)
//! that end up in the serialized VEVENT as-is.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// A point in time as authored in a source document.
///
/// Floating and zoned states are explicit variants rather than flags:
/// a floating time has no zone attached and is reinterpreted at render
/// time, a zoned time carries its IANA identifier verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Parse an authored scalar: RFC 3339 with offset, a naive
    /// date-time, or a bare date.
    pub fn parse(s: &str) -> Option<EventTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(EventTime::DateTimeUtc(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(EventTime::DateTimeFloating(dt));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(EventTime::Date)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, EventTime::DateTimeFloating(_))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Attach a zone to a floating time; every other variant is
    /// returned unchanged (dates have no zone, aware times keep theirs).
    pub fn with_zone(self, tzid: &str) -> EventTime {
        match self {
            EventTime::DateTimeFloating(datetime) => EventTime::DateTimeZoned {
                datetime,
                tzid: tzid.to_string(),
            },
            other => other,
        }
    }

    /// Compact stamp used in UNTIL, EXDATE and RDATE values:
    /// `YYYYMMDD` for dates, `YYYYMMDDTHHMMSS` for date-times
    /// (`Z`-suffixed when the value is UTC).
    pub fn to_stamp(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTimeUtc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::DateTimeFloating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            EventTime::DateTimeZoned { datetime, .. } => {
                datetime.format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }

    /// The date component, used when flooring all-day events.
    pub fn date_naive(&self) -> NaiveDate {
        match self {
            EventTime::Date(d) => *d,
            EventTime::DateTimeUtc(dt) => dt.date_naive(),
            EventTime::DateTimeFloating(dt) => dt.date(),
            EventTime::DateTimeZoned { datetime, .. } => datetime.date(),
        }
    }
}

/// A raw property appended verbatim to the serialized VEVENT:
/// recurrence directives and custom `ics` block lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraProperty {
    pub name: String,
    pub value: String,
    /// Emitted as a `TZID=` parameter when present.
    pub tzid: Option<String>,
}

impl ExtraProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        ExtraProperty {
            name: name.into(),
            value: value.into(),
            tzid: None,
        }
    }
}

/// A reminder/alarm for an event (minutes before start).
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub minutes: i64,
}

/// The normalized output unit of the event builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub summary: Option<String>,
    pub begin: Option<EventTime>,
    pub end: Option<EventTime>,
    pub duration: Option<Duration>,
    pub uid: Option<String>,
    pub description: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub transparent: bool,
    pub alarms: Vec<Reminder>,
    pub attendees: Vec<String>,
    pub categories: Vec<String>,
    pub status: Option<String>,
    pub organizer: Option<String>,
    pub geo: Option<String>,
    pub classification: Option<String>,

    /// Creation instant (DTSTAMP), always UTC, always recomputed at
    /// build time regardless of input.
    pub timestamp: DateTime<Utc>,
    /// Date-only semantics; never timezone-rewritten.
    pub all_day: bool,
    /// Effective zone identifier, if one applied during construction.
    pub timezone: Option<String>,
    /// Raw directives emitted as-is (RRULE/EXDATE/RDATE and the
    /// custom `ics` block), in declaration order.
    pub extra: Vec<ExtraProperty>,
}

impl Event {
    /// An event with no fields set, stamped now.
    pub fn empty() -> Self {
        Event {
            summary: None,
            begin: None,
            end: None,
            duration: None,
            uid: None,
            description: None,
            created: None,
            last_modified: None,
            location: None,
            url: None,
            transparent: false,
            alarms: Vec::new(),
            attendees: Vec::new(),
            categories: Vec::new(),
            status: None,
            organizer: None,
            geo: None,
            classification: None,
            timestamp: Utc::now(),
            all_day: false,
            timezone: None,
            extra: Vec::new(),
        }
    }
}
