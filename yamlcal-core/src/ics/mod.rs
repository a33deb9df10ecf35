//! ICS serialization and parsing.

mod generate;
mod parse;

pub use generate::generate_calendar;
pub use parse::parse_calendar;
