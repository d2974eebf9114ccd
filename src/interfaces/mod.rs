//! Inbound and outbound file formats used by the CLI.

pub mod csv;
pub mod rules;
