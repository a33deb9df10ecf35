//! Error types for the yamlcal conversion engine.

use thiserror::Error;

/// Errors that can occur while converting event sources into a calendar.
///
/// Validation failures (recurrence, custom directives, timezones) are
/// distinct variants from I/O and parse faults so callers can match on
/// them without conflating author mistakes with infrastructure errors.
#[derive(Error, Debug)]
pub enum YamlCalError {
    #[error("Failed to collect '{reference}': {reason}")]
    Collect { reference: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Invalid field '{field}' in {context}: {reason}")]
    InvalidField {
        field: String,
        context: String,
        reason: String,
    },

    #[error(
        "Invalid repeat interval in {0}: must specify exactly one of \
         seconds, minutes, hours, days, weeks, months or years"
    )]
    InvalidInterval(String),

    #[error(
        "Unsupported repeat interval unit '{unit}' in {context}: expected \
         seconds, minutes, hours, days, weeks, months or years"
    )]
    UnsupportedIntervalUnit { unit: String, context: String },

    #[error("Repeating event in {0} must specify an end date (repeat.until)")]
    MissingRecurrenceEnd(String),

    #[error("Invalid custom ICS line (expected `name:value`): {0}")]
    MalformedDirective(String),

    #[error("Unknown timezone identifier: {0}")]
    UnknownTimezone(String),
}

/// Result type alias for yamlcal operations.
pub type YamlCalResult<T> = Result<T, YamlCalError>;
