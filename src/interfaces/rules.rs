use crate::domain::rule::Rule;
use crate::error::Result;
use std::io::Read;

/// Reads a JSON array of rules.
///
/// Conditions and actions may be given inline as objects or as JSON strings.
pub fn read_rules<R: Read>(source: R) -> Result<Vec<Rule>> {
    Ok(serde_json::from_reader(source)?)
}
