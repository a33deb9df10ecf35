//! ICS serialization.

use chrono::Duration;
use icalendar::{Alarm, Component, EventLike, Property, Trigger, ValueType};
use uuid::Uuid;

use crate::calendar::Calendar;
use crate::error::YamlCalResult;
use crate::event::{Event, EventTime};

/// Serialize a calendar to ICS text.
///
/// Output is deterministic for identical input, apart from DTSTAMP and
/// minted UIDs which are computed at build/serialization time.
pub fn generate_calendar(calendar: &Calendar) -> YamlCalResult<String> {
    let mut cal = icalendar::Calendar::new();

    for event in &calendar.events {
        cal.push(event_to_ics(event));
    }

    let cal = cal.done();
    Ok(postprocess(&cal.to_string(), calendar.name.as_deref()))
}

fn event_to_ics(event: &Event) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();

    // UID is required by RFC 5545; mint one when the author gave none
    let uid = event
        .uid
        .clone()
        .unwrap_or_else(|| format!("{}@yamlcal", Uuid::new_v4()));
    ics_event.uid(&uid);

    if let Some(summary) = &event.summary {
        ics_event.summary(summary);
    }

    ics_event.add_property(
        "DTSTAMP",
        event.timestamp.format("%Y%m%dT%H%M%SZ").to_string(),
    );
    if let Some(created) = event.created {
        ics_event.add_property("CREATED", created.format("%Y%m%dT%H%M%SZ").to_string());
    }
    if let Some(updated) = event.last_modified {
        ics_event.add_property("LAST-MODIFIED", updated.format("%Y%m%dT%H%M%SZ").to_string());
    }

    if event.all_day {
        // Date-only block; a point begin spans one full day (exclusive end)
        if let Some(begin) = &event.begin {
            let start = begin.date_naive();
            add_date_property(&mut ics_event, "DTSTART", start);
            let end = match &event.end {
                Some(t) => t.date_naive(),
                None => start + Duration::days(1),
            };
            add_date_property(&mut ics_event, "DTEND", end);
        }
    } else {
        if let Some(begin) = &event.begin {
            add_datetime_property(&mut ics_event, "DTSTART", begin);
        }
        if let Some(end) = &event.end {
            add_datetime_property(&mut ics_event, "DTEND", end);
        }
        if let Some(duration) = &event.duration {
            ics_event.add_property("DURATION", format_duration(duration));
        }
    }

    if let Some(desc) = &event.description {
        ics_event.description(desc);
    }
    if let Some(loc) = &event.location {
        ics_event.location(loc);
    }
    if let Some(url) = &event.url {
        ics_event.add_property("URL", url.as_str());
    }
    if let Some(status) = &event.status {
        ics_event.add_property("STATUS", status.to_uppercase());
    }
    // TRANSP - only emit if TRANSPARENT (OPAQUE is the default)
    if event.transparent {
        ics_event.add_property("TRANSP", "TRANSPARENT");
    }
    if let Some(class) = &event.classification {
        ics_event.add_property("CLASS", class.to_uppercase());
    }
    if let Some(geo) = &event.geo {
        ics_event.add_property("GEO", geo.as_str());
    }
    if let Some(organizer) = &event.organizer {
        ics_event.append_property(Property::new("ORGANIZER", mailto(organizer)));
    }

    if !event.categories.is_empty() {
        ics_event.add_property("CATEGORIES", event.categories.join(","));
    }
    // ATTENDEE can appear multiple times
    for attendee in &event.attendees {
        ics_event.append_multi_property(Property::new("ATTENDEE", mailto(attendee)));
    }

    for reminder in &event.alarms {
        let trigger = Trigger::before_start(Duration::minutes(reminder.minutes));
        ics_event.alarm(Alarm::display("Reminder", trigger));
    }

    // Recurrence directives and verbatim custom lines, as produced
    for extra in &event.extra {
        let mut prop = Property::new(extra.name.as_str(), extra.value.as_str());
        if let Some(tzid) = &extra.tzid {
            prop.add_parameter("TZID", tzid);
        }
        ics_event.append_multi_property(prop);
    }

    ics_event.done()
}

/// Clean up the icalendar crate's rendering:
/// - stable PRODID (and calendar NAME/X-WR-CALNAME injection after it)
/// - drop CALSCALE:GREGORIAN (it's the default)
/// - drop DTSTAMP and UID inside VALARM sections (not required)
fn postprocess(ics: &str, name: Option<&str>) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        let line = line.trim_end_matches('\r');

        if line.starts_with("PRODID:") {
            result.push_str("PRODID:-//yamlcal//EN\r\n");
            if let Some(name) = name {
                result.push_str(&format!("NAME:{}\r\n", name));
                result.push_str(&format!("X-WR-CALNAME:{}\r\n", name));
            }
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

/// Add a datetime property with formatting matching the EventTime variant.
fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTimeUtc(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        EventTime::DateTimeFloating(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%S").to_string());
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
    }
}

fn add_date_property(ics_event: &mut icalendar::Event, name: &str, date: chrono::NaiveDate) {
    let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
    prop.append_parameter(ValueType::Date);
    ics_event.append_property(prop);
}

fn mailto(address: &str) -> String {
    if address.contains('@') && !address.starts_with("mailto:") {
        format!("mailto:{}", address)
    } else {
        address.to_string()
    }
}

/// ISO 8601 duration, e.g. `PT1H30M`, `P2DT4H`, `P1W`.
fn format_duration(duration: &Duration) -> String {
    let total = duration.num_seconds().max(0);
    if total == 0 {
        return "PT0S".to_string();
    }
    if total % 604_800 == 0 {
        return format!("P{}W", total / 604_800);
    }

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExtraProperty, Reminder};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn make_test_event() -> Event {
        let mut event = Event::empty();
        event.uid = Some("test-event-123@yamlcal".to_string());
        event.summary = Some("Test Event".to_string());
        event.begin = Some(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap(),
        ));
        event.end = Some(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2025, 3, 20, 16, 0, 0).unwrap(),
        ));
        event
    }

    fn make_calendar(events: Vec<Event>, name: Option<&str>) -> Calendar {
        Calendar::new(events, name.map(str::to_string))
    }

    #[test]
    fn test_named_calendar_carries_both_name_directives() {
        let cal = make_calendar(vec![make_test_event()], Some("Team Calendar"));
        let ics = generate_calendar(&cal).unwrap();

        assert!(ics.contains("NAME:Team Calendar\r\n"), "ICS:\n{}", ics);
        assert!(ics.contains("X-WR-CALNAME:Team Calendar\r\n"), "ICS:\n{}", ics);
    }

    #[test]
    fn test_unnamed_calendar_has_no_name_directives() {
        let cal = make_calendar(vec![make_test_event()], None);
        let ics = generate_calendar(&cal).unwrap();

        assert!(!ics.contains("X-WR-CALNAME"));
        assert!(!ics.lines().any(|l| l.starts_with("NAME:")));
    }

    #[test]
    fn test_all_day_event_has_value_date_and_exclusive_end() {
        let mut event = make_test_event();
        event.all_day = true;
        event.begin = Some(EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()));
        event.end = None;
        event.duration = None;

        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();

        assert!(ics.contains("DTSTART;VALUE=DATE:20250320"), "ICS:\n{}", ics);
        assert!(ics.contains("DTEND;VALUE=DATE:20250321"), "ICS:\n{}", ics);
    }

    #[test]
    fn test_zoned_time_carries_tzid_parameter() {
        let mut event = make_test_event();
        event.begin = Some(EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2025, 3, 20)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap(),
            tzid: "Europe/Vienna".to_string(),
        });

        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();
        assert!(
            ics.contains("DTSTART;TZID=Europe/Vienna:20250320T150000"),
            "ICS:\n{}",
            ics
        );
    }

    #[test]
    fn test_extra_directives_are_emitted_verbatim() {
        let mut event = make_test_event();
        event.extra = vec![
            ExtraProperty::new("RRULE", "FREQ=WEEKLY;INTERVAL=1;UNTIL=20240301T000000"),
            ExtraProperty {
                name: "EXDATE".to_string(),
                value: "20240106,20240107".to_string(),
                tzid: Some("Europe/Vienna".to_string()),
            },
            ExtraProperty::new("X-CUSTOM", "hello"),
        ];

        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();
        assert!(
            ics.contains("RRULE:FREQ=WEEKLY;INTERVAL=1;UNTIL=20240301T000000"),
            "ICS:\n{}",
            ics
        );
        assert!(ics.contains("EXDATE;TZID=Europe/Vienna:20240106,20240107"), "ICS:\n{}", ics);
        assert!(ics.contains("X-CUSTOM:hello"), "ICS:\n{}", ics);
    }

    #[test]
    fn test_missing_uid_is_minted() {
        let mut event = make_test_event();
        event.uid = None;
        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();
        let uid_line = ics.lines().find(|l| l.starts_with("UID:")).unwrap();
        assert!(uid_line.ends_with("@yamlcal"), "Got: {}", uid_line);
    }

    #[test]
    fn test_duration_event_emits_duration_property() {
        let mut event = make_test_event();
        event.end = None;
        event.duration = Some(Duration::minutes(90));
        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();
        assert!(ics.contains("DURATION:PT1H30M"), "ICS:\n{}", ics);
    }

    #[test]
    fn test_alarm_is_minimal() {
        let mut event = make_test_event();
        event.alarms = vec![Reminder { minutes: 30 }];

        let ics = generate_calendar(&make_calendar(vec![event], None)).unwrap();
        assert!(ics.contains("BEGIN:VALARM"));
        assert!(ics.contains("ACTION:DISPLAY"));

        let valarm: String = ics
            .split("BEGIN:VALARM")
            .nth(1)
            .unwrap()
            .split("END:VALARM")
            .next()
            .unwrap()
            .to_string();
        assert!(!valarm.contains("UID:"), "VALARM should not have UID:\n{}", valarm);
        assert!(!valarm.contains("DTSTAMP:"), "VALARM should not have DTSTAMP:\n{}", valarm);
    }

    #[test]
    fn test_calscale_is_stripped_and_prodid_stable() {
        let ics = generate_calendar(&make_calendar(vec![make_test_event()], None)).unwrap();
        assert!(!ics.contains("CALSCALE"));
        assert!(ics.contains("PRODID:-//yamlcal//EN\r\n"));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let cal = make_calendar(vec![make_test_event()], Some("Stable"));
        assert_eq!(
            generate_calendar(&cal).unwrap(),
            generate_calendar(&cal).unwrap()
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::minutes(90)), "PT1H30M");
        assert_eq!(format_duration(&Duration::weeks(2)), "P2W");
        assert_eq!(format_duration(&Duration::seconds(0)), "PT0S");
        assert_eq!(
            format_duration(&(Duration::days(1) + Duration::hours(4))),
            "P1DT4H"
        );
    }
}
