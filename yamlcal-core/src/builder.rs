//! Builds normalized events from raw YAML event descriptions.
//!
//! Construction is two-phase: the side-channel keys (`repeat`, `ics`,
//! `timezone`) are extracted first, then the remaining keys are mapped
//! through the fixed field schema. Unknown keys are dropped silently;
//! the source format is intentionally permissive.

use chrono::{DateTime, Duration, Utc};
use serde_yaml::{Mapping, Value};

use crate::error::{YamlCalError, YamlCalResult};
use crate::event::{Event, EventTime, ExtraProperty, Reminder};
use crate::recurrence::RecurrenceSpec;
use crate::timezone::lookup_timezone;

/// The fixed set of recognized event fields, in schema order.
pub const EVENT_FIELDS: [&str; 18] = [
    "summary",
    "begin",
    "end",
    "duration",
    "uid",
    "description",
    "created",
    "last_modified",
    "location",
    "url",
    "transparent",
    "alarms",
    "attendees",
    "categories",
    "status",
    "organizer",
    "geo",
    "classification",
];

/// Build one normalized [`Event`] from a raw description.
///
/// `inherited_tz` is the surrounding document's timezone; an explicit
/// per-event `timezone` key overrides it. `context` names the owning
/// file for error reporting.
pub fn build_event(
    mut raw: Mapping,
    inherited_tz: Option<&str>,
    context: &str,
) -> YamlCalResult<Event> {
    // Phase one: side-channel keys leave the mapping before filtering.
    let repeat = raw.remove("repeat");
    let ics_block = raw.remove("ics");
    let timezone = match raw.remove("timezone") {
        Some(v) => Some(scalar_string(&v, "timezone", context)?),
        None => inherited_tz.map(str::to_string),
    };
    if let Some(tz) = &timezone {
        lookup_timezone(tz)?;
    }

    // Phase two: the fixed schema. Anything left over is dropped.
    let mut event = Event::empty();
    event.summary = take_string(&mut raw, "summary", context)?;
    event.begin = take_time(&mut raw, "begin", context)?;
    event.end = take_time(&mut raw, "end", context)?;
    event.duration = take_duration(&mut raw, context)?;
    event.uid = take_string(&mut raw, "uid", context)?;
    event.description = take_string(&mut raw, "description", context)?;
    event.created = take_instant(&mut raw, "created", context)?;
    event.last_modified = take_instant(&mut raw, "last_modified", context)?;
    event.location = take_string(&mut raw, "location", context)?;
    event.url = take_string(&mut raw, "url", context)?;
    event.transparent = take_bool(&mut raw, "transparent", context)?.unwrap_or(false);
    event.alarms = take_alarms(&mut raw, context)?;
    event.attendees = take_string_list(&mut raw, "attendees", context)?;
    event.categories = take_string_list(&mut raw, "categories", context)?;
    event.status = take_string(&mut raw, "status", context)?;
    event.organizer = take_string(&mut raw, "organizer", context)?;
    event.geo = take_string(&mut raw, "geo", context)?;
    event.classification = take_string(&mut raw, "classification", context)?;

    // Neither duration nor end: a date-only block anchored at begin.
    if event.duration.is_none() && event.end.is_none() {
        event.all_day = true;
        if let Some(begin) = event.begin.take() {
            event.begin = Some(EventTime::Date(begin.date_naive()));
        }
    }

    if let Some(repeat) = repeat {
        if event.begin.is_none() {
            return Err(YamlCalError::InvalidField {
                field: "begin".to_string(),
                context: context.to_string(),
                reason: "repeating events must declare begin".to_string(),
            });
        }
        let spec = RecurrenceSpec::from_yaml(&repeat, context)?;
        event.extra.extend(spec.expand(timezone.as_deref()));
    }

    // Creation instant is always recomputed, never inherited.
    event.timestamp = Utc::now();

    // All-day events keep date-only semantics and are never zone-rewritten.
    if let Some(tz) = &timezone {
        if !event.all_day {
            event.begin = event.begin.take().map(|t| t.with_zone(tz));
            event.end = event.end.take().map(|t| t.with_zone(tz));
        }
    }
    event.timezone = timezone;

    if let Some(block) = ics_block {
        let text = scalar_string(&block, "ics", context)?;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| YamlCalError::MalformedDirective(line.to_string()))?;
            event.extra.push(ExtraProperty::new(name, value));
        }
    }

    Ok(event)
}

fn invalid_field(field: &str, context: &str, reason: &str) -> YamlCalError {
    YamlCalError::InvalidField {
        field: field.to_string(),
        context: context.to_string(),
        reason: reason.to_string(),
    }
}

/// Scalar coercion with trimming. Multi-line YAML scalars often carry
/// a trailing newline, so every string value is trimmed.
fn scalar_string(value: &Value, field: &str, context: &str) -> YamlCalResult<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid_field(field, context, "expected a scalar value")),
    }
}

fn take_string(raw: &mut Mapping, field: &str, context: &str) -> YamlCalResult<Option<String>> {
    raw.remove(field)
        .map(|v| scalar_string(&v, field, context))
        .transpose()
}

fn take_time(raw: &mut Mapping, field: &str, context: &str) -> YamlCalResult<Option<EventTime>> {
    let Some(value) = raw.remove(field) else {
        return Ok(None);
    };
    let s = scalar_string(&value, field, context)?;
    EventTime::parse(&s)
        .map(Some)
        .ok_or_else(|| invalid_field(field, context, "unrecognized date or date-time"))
}

fn take_instant(
    raw: &mut Mapping,
    field: &str,
    context: &str,
) -> YamlCalResult<Option<DateTime<Utc>>> {
    Ok(take_time(raw, field, context)?.map(|t| match t {
        EventTime::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
        EventTime::DateTimeUtc(dt) => dt,
        EventTime::DateTimeFloating(dt) => dt.and_utc(),
        EventTime::DateTimeZoned { datetime, .. } => datetime.and_utc(),
    }))
}

fn take_bool(raw: &mut Mapping, field: &str, context: &str) -> YamlCalResult<Option<bool>> {
    let Some(value) = raw.remove(field) else {
        return Ok(None);
    };
    value
        .as_bool()
        .map(Some)
        .ok_or_else(|| invalid_field(field, context, "expected a boolean"))
}

fn take_duration(raw: &mut Mapping, context: &str) -> YamlCalResult<Option<Duration>> {
    let Some(value) = raw.remove("duration") else {
        return Ok(None);
    };
    let map = value
        .as_mapping()
        .ok_or_else(|| invalid_field("duration", context, "expected a unit mapping"))?;

    let mut total = Duration::zero();
    for (key, amount) in map {
        let key = key.as_str().unwrap_or_default();
        let amount = amount
            .as_i64()
            .ok_or_else(|| invalid_field("duration", context, "amounts must be integers"))?;
        total = total + match key {
            "weeks" => Duration::weeks(amount),
            "days" => Duration::days(amount),
            "hours" => Duration::hours(amount),
            "minutes" => Duration::minutes(amount),
            "seconds" => Duration::seconds(amount),
            _ => {
                return Err(invalid_field(
                    "duration",
                    context,
                    "units are weeks, days, hours, minutes or seconds",
                ))
            }
        };
    }
    Ok(Some(total))
}

fn take_string_list(
    raw: &mut Mapping,
    field: &str,
    context: &str,
) -> YamlCalResult<Vec<String>> {
    let Some(value) = raw.remove(field) else {
        return Ok(Vec::new());
    };
    let seq = value
        .as_sequence()
        .ok_or_else(|| invalid_field(field, context, "expected a list"))?;
    seq.iter()
        .map(|v| scalar_string(v, field, context))
        .collect()
}

fn take_alarms(raw: &mut Mapping, context: &str) -> YamlCalResult<Vec<Reminder>> {
    let Some(value) = raw.remove("alarms") else {
        return Ok(Vec::new());
    };
    let seq = value
        .as_sequence()
        .ok_or_else(|| invalid_field("alarms", context, "expected a list"))?;

    seq.iter()
        .map(|item| {
            let minutes = match item {
                Value::Number(n) => n.as_i64(),
                Value::Mapping(m) => m.get("minutes").and_then(Value::as_i64),
                _ => None,
            };
            minutes.map(|minutes| Reminder { minutes }).ok_or_else(|| {
                invalid_field("alarms", context, "expected minutes-before values")
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn raw(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_all_day_inference_without_duration_or_end() {
        let event = build_event(raw("summary: Holiday\nbegin: 2024-01-01"), None, "cal.yaml")
            .unwrap();
        assert!(event.all_day);
        assert_eq!(
            event.begin,
            Some(EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
        );
        assert_eq!(event.end, None);
    }

    #[test]
    fn test_timed_event_with_end_is_not_all_day() {
        let event = build_event(
            raw("summary: Meeting\nbegin: 2024-01-01T09:00:00\nend: 2024-01-01T10:00:00"),
            None,
            "cal.yaml",
        )
        .unwrap();
        assert!(!event.all_day);
    }

    #[test]
    fn test_duration_event_is_not_all_day() {
        let event = build_event(
            raw("summary: Call\nbegin: 2024-01-01T09:00:00\nduration: {hours: 1, minutes: 30}"),
            None,
            "cal.yaml",
        )
        .unwrap();
        assert!(!event.all_day);
        assert_eq!(event.duration, Some(Duration::minutes(90)));
    }

    #[test]
    fn test_string_fields_are_trimmed() {
        let event = build_event(
            raw("summary: \"Fix the roof\\n\"\nbegin: 2024-01-01"),
            None,
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(event.summary.as_deref(), Some("Fix the roof"));
    }

    #[test]
    fn test_unknown_keys_are_silently_dropped() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01\nnonsense: 42"),
            None,
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(event.summary.as_deref(), Some("X"));
    }

    #[test]
    fn test_inherited_timezone_attaches_to_floating_times() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01T09:00:00\nend: 2024-01-01T10:00:00"),
            Some("Europe/Vienna"),
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(
            event.begin,
            Some(EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                tzid: "Europe/Vienna".to_string(),
            })
        );
        assert_eq!(event.timezone.as_deref(), Some("Europe/Vienna"));
    }

    #[test]
    fn test_event_timezone_overrides_inherited() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01T09:00:00\nend: 2024-01-01T10:00:00\n\
                 timezone: America/New_York"),
            Some("Europe/Vienna"),
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(event.timezone.as_deref(), Some("America/New_York"));
    }

    #[test]
    fn test_all_day_events_are_never_zone_rewritten() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01"),
            Some("Europe/Vienna"),
            "cal.yaml",
        )
        .unwrap();
        assert!(event.all_day);
        assert!(event.begin.as_ref().unwrap().is_date());
    }

    #[test]
    fn test_unknown_timezone_is_fatal() {
        let err = build_event(
            raw("summary: X\nbegin: 2024-01-01\ntimezone: Nowhere/Special"),
            None,
            "cal.yaml",
        )
        .unwrap_err();
        assert!(matches!(err, YamlCalError::UnknownTimezone(_)));
    }

    #[test]
    fn test_aware_begin_keeps_its_zone() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01T09:00:00+01:00\nend: 2024-01-01T10:00:00+01:00"),
            Some("Europe/Vienna"),
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(
            event.begin,
            Some(EventTime::DateTimeUtc(
                Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_repeat_appends_recurrence_directives() {
        let event = build_event(
            raw("summary: Standup\nbegin: 2024-01-01T09:00:00\nend: 2024-01-01T09:15:00\n\
                 repeat:\n  interval: {weeks: 1}\n  until: 2024-03-01"),
            None,
            "cal.yaml",
        )
        .unwrap();
        assert_eq!(event.extra.len(), 1);
        assert_eq!(event.extra[0].name, "RRULE");
        assert_eq!(event.extra[0].value, "FREQ=WEEKLY;INTERVAL=1;UNTIL=20240301T000000");
    }

    #[test]
    fn test_repeat_without_begin_is_rejected() {
        let err = build_event(
            raw("summary: X\nrepeat:\n  interval: {weeks: 1}\n  until: 2024-03-01"),
            None,
            "cal.yaml",
        )
        .unwrap_err();
        assert!(matches!(err, YamlCalError::InvalidField { ref field, .. } if field == "begin"));
    }

    #[test]
    fn test_ics_block_becomes_verbatim_directives() {
        let event = build_event(
            raw("summary: X\nbegin: 2024-01-01\nics: |\n  X-CUSTOM:hello\n  SEQUENCE:3"),
            None,
            "cal.yaml",
        )
        .unwrap();
        let names: Vec<&str> = event.extra.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["X-CUSTOM", "SEQUENCE"]);
        assert_eq!(event.extra[0].value, "hello");
    }

    #[test]
    fn test_ics_line_without_colon_is_fatal() {
        let err = build_event(
            raw("summary: X\nbegin: 2024-01-01\nics: |\n  BADLINE"),
            None,
            "cal.yaml",
        )
        .unwrap_err();
        assert!(matches!(err, YamlCalError::MalformedDirective(ref line) if line == "BADLINE"));
    }

    #[test]
    fn test_every_schema_field_is_recognized() {
        let yaml = "summary: Review\n\
                    begin: 2024-04-01T10:00:00\n\
                    end: 2024-04-01T11:00:00\n\
                    uid: review-1@example\n\
                    description: Quarterly review\n\
                    created: 2024-03-01T00:00:00Z\n\
                    last_modified: 2024-03-02T00:00:00Z\n\
                    location: Room 4\n\
                    url: https://example.org/review\n\
                    transparent: true\n\
                    alarms: [15, {minutes: 60}]\n\
                    attendees: [alice@example.org, bob@example.org]\n\
                    categories: [work]\n\
                    status: confirmed\n\
                    organizer: carol@example.org\n\
                    geo: \"48.2;16.37\"\n\
                    classification: private\n";
        let mapping = raw(yaml);
        for field in EVENT_FIELDS {
            assert!(
                field == "duration" || mapping.get(field).is_some(),
                "fixture is missing schema field {field}"
            );
        }

        let event = build_event(mapping, None, "cal.yaml").unwrap();
        assert_eq!(event.uid.as_deref(), Some("review-1@example"));
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert!(event.transparent);
        assert_eq!(
            event.alarms,
            [Reminder { minutes: 15 }, Reminder { minutes: 60 }]
        );
        assert_eq!(event.attendees.len(), 2);
        assert_eq!(event.status.as_deref(), Some("confirmed"));
        assert_eq!(event.geo.as_deref(), Some("48.2;16.37"));
        assert_eq!(
            event.created,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_timestamp_is_recomputed() {
        let before = Utc::now();
        let event = build_event(raw("summary: X\nbegin: 2024-01-01"), None, "cal.yaml").unwrap();
        assert!(event.timestamp >= before);
    }
}
