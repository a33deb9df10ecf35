//! Calendar aggregation, serialization and timezone normalization.

use std::fmt;

use chrono::TimeZone;
use chrono_tz::Tz;

use crate::error::YamlCalResult;
use crate::event::{Event, EventTime};
use crate::ics::generate_calendar;
use crate::timezone::lookup_timezone;

/// An ordered sequence of events plus an optional display name.
///
/// Events are owned exclusively by the calendar that contains them.
#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    pub events: Vec<Event>,
    pub name: Option<String>,
}

impl Calendar {
    pub fn new(events: Vec<Event>, name: Option<String>) -> Self {
        Calendar { events, name }
    }

    /// Render the calendar as ICS text. Stable ordering makes this
    /// byte-for-byte deterministic for identical input.
    pub fn serialize(&self) -> YamlCalResult<String> {
        generate_calendar(self)
    }

    /// Return a copy of this calendar with every non-all-day event's
    /// displayed time expressed in `tz`. The receiver is never mutated.
    ///
    /// Floating times get the target zone attached; UTC and zoned times
    /// are instant-converted to the target zone's wall time. All-day
    /// events keep their date-only semantics.
    pub fn normalize(&self, tz: &Tz) -> Calendar {
        let mut normalized = self.clone();

        for event in &mut normalized.events {
            if event.all_day {
                continue;
            }
            event.begin = event.begin.take().map(|t| convert_time(t, tz));
            event.end = event.end.take().map(|t| convert_time(t, tz));
            event.timezone = Some(tz.name().to_string());
        }

        normalized
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("(unnamed calendar)"))
    }
}

/// Express one time value in the target zone.
fn convert_time(time: EventTime, tz: &Tz) -> EventTime {
    match time {
        EventTime::Date(d) => EventTime::Date(d),
        EventTime::DateTimeFloating(datetime) => EventTime::DateTimeZoned {
            datetime,
            tzid: tz.name().to_string(),
        },
        EventTime::DateTimeUtc(dt) => EventTime::DateTimeZoned {
            datetime: dt.with_timezone(tz).naive_local(),
            tzid: tz.name().to_string(),
        },
        EventTime::DateTimeZoned { datetime, tzid } => {
            let source = match lookup_timezone(&tzid) {
                Ok(source) => source,
                Err(_) => {
                    log::warn!("Cannot convert from unknown timezone '{}'", tzid);
                    return EventTime::DateTimeZoned { datetime, tzid };
                }
            };
            match source.from_local_datetime(&datetime).earliest() {
                Some(aware) => EventTime::DateTimeZoned {
                    datetime: aware.with_timezone(tz).naive_local(),
                    tzid: tz.name().to_string(),
                },
                // A wall time skipped by a DST transition has no instant
                None => {
                    log::warn!("Nonexistent local time {} in '{}'", datetime, tzid);
                    EventTime::DateTimeZoned { datetime, tzid }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn utc_event(hour: u32) -> Event {
        let mut event = Event::empty();
        event.uid = Some(format!("e{hour}@yamlcal"));
        event.summary = Some("Meeting".to_string());
        event.begin = Some(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
        ));
        event.end = Some(EventTime::DateTimeUtc(
            Utc.with_ymd_and_hms(2024, 1, 15, hour + 1, 0, 0).unwrap(),
        ));
        event.timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        event
    }

    #[test]
    fn test_normalize_converts_utc_to_target_wall_time() {
        let cal = Calendar::new(vec![utc_event(9)], None);
        let vienna = cal.normalize(&chrono_tz::Europe::Vienna);

        // UTC+1 in January
        assert_eq!(
            vienna.events[0].begin,
            Some(EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                tzid: "Europe/Vienna".to_string(),
            })
        );
    }

    #[test]
    fn test_normalize_attaches_zone_to_floating_times() {
        let mut event = utc_event(9);
        event.begin = Some(EventTime::DateTimeFloating(
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        ));
        let cal = Calendar::new(vec![event], None);
        let vienna = cal.normalize(&chrono_tz::Europe::Vienna);

        // Floating wall time is reinterpreted, not shifted
        assert_eq!(
            vienna.events[0].begin,
            Some(EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                tzid: "Europe/Vienna".to_string(),
            })
        );
    }

    #[test]
    fn test_normalize_skips_all_day_events() {
        let mut event = utc_event(9);
        event.all_day = true;
        event.begin = Some(EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
        event.end = None;

        let cal = Calendar::new(vec![event.clone()], None);
        let vienna = cal.normalize(&chrono_tz::Europe::Vienna);
        assert_eq!(vienna.events[0].begin, event.begin);
    }

    #[test]
    fn test_normalize_never_mutates_the_source() {
        let cal = Calendar::new(vec![utc_event(9)], Some("Original".to_string()));
        let before = cal.serialize().unwrap();
        let _ = cal.normalize(&chrono_tz::America::New_York);
        let after = cal.serialize().unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_normalize_converts_between_zones() {
        let mut event = utc_event(9);
        event.begin = Some(EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            tzid: "Europe/Vienna".to_string(),
        });
        let cal = Calendar::new(vec![event], None);
        let ny = cal.normalize(&chrono_tz::America::New_York);

        // Vienna 10:00 is New York 04:00 in January
        assert_eq!(
            ny.events[0].begin,
            Some(EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(4, 0, 0)
                    .unwrap(),
                tzid: "America/New_York".to_string(),
            })
        );
    }
}
