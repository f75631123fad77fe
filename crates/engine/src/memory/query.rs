//! Statement support for the memory engine
//!
//! Only full keyspace scans are understood:
//!
//! ```text
//! SELECT * FROM bucket
//! SELECT * FROM `bucket`.`scope`.`collection`;
//! ```
//!
//! Keywords are case-insensitive. Rows are the raw document contents in key
//! order.

use courier_core::{Error, Keyspace, Result};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Every visible document of a keyspace
    ScanAll(Keyspace),
}

/// Parse a statement.
pub fn parse(statement: &str) -> Result<Statement> {
    let trimmed = statement.trim().trim_end_matches(';');
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    match tokens.as_slice() {
        [select, star, from, keyspace]
            if select.eq_ignore_ascii_case("select")
                && *star == "*"
                && from.eq_ignore_ascii_case("from") =>
        {
            let unquoted: String = keyspace.chars().filter(|c| *c != '`').collect();
            let keyspace = unquoted.parse::<Keyspace>().map_err(|e| Error::Query {
                reason: e.to_string(),
            })?;
            Ok(Statement::ScanAll(keyspace))
        }
        _ => Err(Error::Query {
            reason: format!("unsupported statement: {}", statement.trim()),
        }),
    }
}
