//! Conversion engine turning declarative YAML event sources into ICS
//! calendars.
//!
//! The pipeline is strictly forward: source references are collected
//! (remote ones fetched into temporary files), each document's events
//! are built into normalized [`Event`]s, recurrence specifications are
//! expanded into raw directives, and everything is assembled into a
//! [`Calendar`] that serializes to RFC 5545-family text. Includes
//! recurse back into collection before being flattened into the parent
//! calendar.

pub mod builder;
pub mod calendar;
pub mod collect;
pub mod error;
pub mod event;
pub mod ics;
pub mod recurrence;
pub mod source;
pub mod timezone;

pub use calendar::Calendar;
pub use error::{YamlCalError, YamlCalResult};
pub use event::{Event, EventTime, ExtraProperty, Reminder};
pub use source::files_to_calendar;
pub use timezone::lookup_timezone;
