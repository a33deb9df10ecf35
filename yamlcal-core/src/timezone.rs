//! Timezone identifier resolution.

use chrono_tz::Tz;

use crate::error::{YamlCalError, YamlCalResult};

/// Resolve an IANA zone identifier (e.g. `Europe/Vienna`).
///
/// Unknown identifiers are rejected outright rather than silently
/// treated as "no timezone".
pub fn lookup_timezone(name: &str) -> YamlCalResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| YamlCalError::UnknownTimezone(name.to_string()))
}
