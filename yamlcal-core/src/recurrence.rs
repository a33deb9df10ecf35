//! Recurrence-rule synthesis from `repeat` specifications.
//!
//! A `repeat` key holds an interval mapping with exactly one unit, a
//! mandatory `until` bound and optional `except_on` / `also_on` date
//! lists. Expansion produces the raw RRULE/EXDATE/RDATE directives in
//! that order; open-ended recurrence is rejected, not defaulted.

use serde_yaml::Value;

use crate::error::{YamlCalError, YamlCalResult};
use crate::event::{EventTime, ExtraProperty};

/// The recognized repeat interval units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// Fixed unit table, initialized once and never mutated.
const UNIT_KEYS: [(&str, IntervalUnit); 7] = [
    ("seconds", IntervalUnit::Seconds),
    ("minutes", IntervalUnit::Minutes),
    ("hours", IntervalUnit::Hours),
    ("days", IntervalUnit::Days),
    ("weeks", IntervalUnit::Weeks),
    ("months", IntervalUnit::Months),
    ("years", IntervalUnit::Years),
];

impl IntervalUnit {
    pub fn from_key(key: &str) -> Option<IntervalUnit> {
        UNIT_KEYS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, unit)| *unit)
    }

    /// RFC 5545 FREQ value for this unit.
    pub fn ics_freq(&self) -> &'static str {
        match self {
            IntervalUnit::Seconds => "SECONDLY",
            IntervalUnit::Minutes => "MINUTELY",
            IntervalUnit::Hours => "HOURLY",
            IntervalUnit::Days => "DAILY",
            IntervalUnit::Weeks => "WEEKLY",
            IntervalUnit::Months => "MONTHLY",
            IntervalUnit::Years => "YEARLY",
        }
    }
}

/// A validated repeat specification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceSpec {
    pub unit: IntervalUnit,
    pub multiplier: i64,
    pub until: EventTime,
    pub except_on: Vec<EventTime>,
    pub also_on: Vec<EventTime>,
}

impl RecurrenceSpec {
    /// Parse and validate a raw `repeat` value.
    ///
    /// `context` names the owning file/event for error reporting.
    pub fn from_yaml(value: &Value, context: &str) -> YamlCalResult<RecurrenceSpec> {
        let map = value.as_mapping().ok_or_else(|| YamlCalError::InvalidField {
            field: "repeat".to_string(),
            context: context.to_string(),
            reason: "expected a mapping".to_string(),
        })?;

        let interval = map
            .get("interval")
            .and_then(Value::as_mapping)
            .ok_or_else(|| YamlCalError::InvalidInterval(context.to_string()))?;

        if interval.len() != 1 {
            return Err(YamlCalError::InvalidInterval(context.to_string()));
        }

        let Some((unit_key, multiplier)) = interval.iter().next() else {
            return Err(YamlCalError::InvalidInterval(context.to_string()));
        };
        let unit_key = unit_key.as_str().unwrap_or_default();
        let unit = IntervalUnit::from_key(unit_key).ok_or_else(|| {
            YamlCalError::UnsupportedIntervalUnit {
                unit: unit_key.to_string(),
                context: context.to_string(),
            }
        })?;
        let multiplier = multiplier
            .as_i64()
            .filter(|n| *n > 0)
            .ok_or_else(|| YamlCalError::InvalidField {
                field: format!("repeat.interval.{unit_key}"),
                context: context.to_string(),
                reason: "multiplier must be a positive integer".to_string(),
            })?;

        let until = match map.get("until") {
            Some(v) => parse_time_value(v, "repeat.until", context)?,
            None => return Err(YamlCalError::MissingRecurrenceEnd(context.to_string())),
        };

        let except_on = parse_date_list(map.get("except_on"), "repeat.except_on", context)?;
        let also_on = parse_date_list(map.get("also_on"), "repeat.also_on", context)?;

        Ok(RecurrenceSpec {
            unit,
            multiplier,
            until,
            except_on,
            also_on,
        })
    }

    /// Synthesize the raw directives: the recurrence rule first, then
    /// exception dates, then addition dates. The anchor is carried by
    /// the event's own begin field and never duplicated into the rule.
    pub fn expand(&self, tz: Option<&str>) -> Vec<ExtraProperty> {
        let mut props = vec![ExtraProperty::new(
            "RRULE",
            format!(
                "FREQ={};INTERVAL={};UNTIL={}",
                self.unit.ics_freq(),
                self.multiplier,
                until_stamp(&self.until)
            ),
        )];

        if !self.except_on.is_empty() {
            props.push(date_list_property("EXDATE", &self.except_on, tz));
        }
        if !self.also_on.is_empty() {
            props.push(date_list_property("RDATE", &self.also_on, tz));
        }

        props
    }
}

/// The UNTIL bound must be a DATE-TIME when the anchoring DTSTART is
/// timed; a date-only bound is promoted to midnight.
fn until_stamp(until: &EventTime) -> String {
    match until {
        EventTime::Date(d) => d.format("%Y%m%dT000000").to_string(),
        other => other.to_stamp(),
    }
}

fn date_list_property(name: &str, dates: &[EventTime], tz: Option<&str>) -> ExtraProperty {
    let value = dates
        .iter()
        .map(EventTime::to_stamp)
        .collect::<Vec<_>>()
        .join(",");

    // Z-suffixed stamps and a TZID parameter are mutually exclusive,
    // so a list containing a UTC instant is emitted without one.
    let has_utc = dates
        .iter()
        .any(|d| matches!(d, EventTime::DateTimeUtc(_)));

    ExtraProperty {
        name: name.to_string(),
        value,
        tzid: if has_utc { None } else { tz.map(str::to_string) },
    }
}

fn parse_time_value(value: &Value, field: &str, context: &str) -> YamlCalResult<EventTime> {
    value
        .as_str()
        .and_then(EventTime::parse)
        .ok_or_else(|| YamlCalError::InvalidField {
            field: field.to_string(),
            context: context.to_string(),
            reason: "expected a date or date-time".to_string(),
        })
}

fn parse_date_list(
    value: Option<&Value>,
    field: &str,
    context: &str,
) -> YamlCalResult<Vec<EventTime>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let seq = value
        .as_sequence()
        .ok_or_else(|| YamlCalError::InvalidField {
            field: field.to_string(),
            context: context.to_string(),
            reason: "expected a list of dates".to_string(),
        })?;

    seq.iter()
        .map(|v| parse_time_value(v, field, context))
        .collect()
}
