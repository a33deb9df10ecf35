//! ICS parsing using the icalendar crate's parser.
//!
//! Raw calendar includes are absorbed through here rather than the
//! event builder: each VEVENT maps back into an [`Event`], with every
//! unrecognized property carried verbatim in `extra` so it survives
//! re-serialization.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use icalendar::{
    DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

use crate::error::{YamlCalError, YamlCalResult};
use crate::event::{Event, EventTime, ExtraProperty, Reminder};

/// Properties mapped into typed [`Event`] fields; anything else rides
/// along in `extra`.
const TYPED_PROPERTIES: [&str; 18] = [
    "UID",
    "SUMMARY",
    "DTSTART",
    "DTEND",
    "DTSTAMP",
    "CREATED",
    "LAST-MODIFIED",
    "DURATION",
    "DESCRIPTION",
    "LOCATION",
    "URL",
    "STATUS",
    "TRANSP",
    "CLASS",
    "GEO",
    "ORGANIZER",
    "CATEGORIES",
    "ATTENDEE",
];

/// Parse ICS content into the events it contains.
pub fn parse_calendar(content: &str) -> YamlCalResult<Vec<Event>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(YamlCalError::IcsParse)?;

    Ok(calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_vevent)
        .collect())
}

fn parse_vevent(vevent: &icalendar::parser::Component) -> Event {
    let mut event = Event::empty();

    event.uid = vevent.find_prop("UID").map(|p| p.val.to_string());
    event.summary = vevent.find_prop("SUMMARY").map(|p| p.val.to_string());
    event.description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    event.location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());
    event.url = vevent.find_prop("URL").map(|p| p.val.to_string());
    event.status = vevent.find_prop("STATUS").map(|p| p.val.to_string());
    event.classification = vevent.find_prop("CLASS").map(|p| p.val.to_string());
    event.geo = vevent.find_prop("GEO").map(|p| p.val.to_string());
    event.organizer = vevent
        .find_prop("ORGANIZER")
        .map(|p| strip_mailto(p.val.as_ref()));
    event.transparent = vevent
        .find_prop("TRANSP")
        .is_some_and(|p| p.val.as_ref() == "TRANSPARENT");

    event.begin = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);
    event.end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);
    event.all_day = event.begin.as_ref().is_some_and(EventTime::is_date);
    if let Some(EventTime::DateTimeZoned { tzid, .. }) = &event.begin {
        event.timezone = Some(tzid.clone());
    }

    event.duration = vevent
        .find_prop("DURATION")
        .and_then(|p| parse_duration(p.val.as_ref()));
    event.created = vevent
        .find_prop("CREATED")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));
    event.last_modified = vevent
        .find_prop("LAST-MODIFIED")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));
    if let Some(stamp) = vevent
        .find_prop("DTSTAMP")
        .and_then(|p| parse_utc_stamp(p.val.as_ref()))
    {
        event.timestamp = stamp;
    }

    event.categories = vevent
        .find_prop("CATEGORIES")
        .map(|p| {
            p.val
                .as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    event.attendees = vevent
        .properties
        .iter()
        .filter(|p| p.name == "ATTENDEE")
        .map(|p| strip_mailto(p.val.as_ref()))
        .collect();

    // Reminders from VALARM components
    event.alarms = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let trigger = alarm.find_prop("TRIGGER")?.val.as_ref().to_string();
            let minutes = parse_trigger_minutes(&trigger)?;
            Some(Reminder { minutes })
        })
        .collect();

    // Everything else is preserved verbatim (RRULE/EXDATE/RDATE, X- props, ...)
    event.extra = vevent
        .properties
        .iter()
        .filter(|p| !TYPED_PROPERTIES.contains(&p.name.as_ref()))
        .map(|p| ExtraProperty {
            name: p.name.to_string(),
            value: p.val.to_string(),
            tzid: tzid_param(p),
        })
        .collect();

    event
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving
/// timezone info.
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

fn tzid_param(prop: &Property) -> Option<String> {
    prop.params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()))
}

fn strip_mailto(value: &str) -> String {
    value.strip_prefix("mailto:").unwrap_or(value).to_string()
}

fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Parse an ISO 8601 duration value (PT1H30M, P2W, ...).
fn parse_duration(value: &str) -> Option<Duration> {
    let parsed = iso8601::duration(value).ok()?;
    let std_duration: std::time::Duration = parsed.into();
    Duration::from_std(std_duration).ok()
}

/// Parse TRIGGER value to minutes before event (-PT30M, -P1D, etc.)
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration = parse_duration(value.trim_start_matches('-'))?;
    let minutes = duration.num_minutes();

    Some(if is_before { minutes } else { -minutes })
}
