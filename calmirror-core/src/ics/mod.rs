//! ICS file generation and parsing.
//!
//! Calendar directories hold one VEVENT per `.ics` file. Parsing flattens
//! every RFC 5545 time form to UTC instants plus an all-day flag, which is
//! all the reconciliation engine reasons about.

mod generate;
mod parse;

pub use generate::generate_ics;
pub use parse::parse_event;
