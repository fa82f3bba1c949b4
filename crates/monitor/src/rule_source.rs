//! Rule table loading.
//!
//! Rows come from the record layer, either as a JSON file named by
//! `RULE_TABLE_PATH` or handed over in memory. Rows that fail to decode or
//! validate are logged and skipped; lookups for their keys fall back to
//! broader rows or the global default. Only an unreadable file or one that is
//! not a JSON array is fatal.

use std::path::Path;

use kennel_core::climate::rules::{RuleTable, RuleTableRow};

use crate::error::ConfigError;

/// Build a table from rows, logging each rejected row.
pub fn table_from_rows(rows: Vec<RuleTableRow>) -> RuleTable {
    let total = rows.len();
    let load = RuleTable::from_rows(rows);

    for rejected in &load.rejected {
        tracing::error!(
            species = ?rejected.row.species,
            breed_class = ?rejected.row.breed_class,
            state = ?rejected.row.state,
            error = %rejected.error,
            "Rejected rule table row"
        );
    }

    tracing::info!(
        loaded = load.table.len(),
        rejected = load.rejected.len(),
        total,
        "Rule table built"
    );
    load.table
}

/// Load the rule table from `path`, or the built-in table when `None`.
pub fn load_rule_table(path: Option<&Path>) -> Result<RuleTable, ConfigError> {
    let Some(path) = path else {
        tracing::info!("Using built-in rule table");
        return Ok(RuleTable::builtin());
    };

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RuleFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::RuleFileParse {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!(path = %path.display(), rows = values.len(), "Loading rule table");
    Ok(table_from_rows(parse_rows(values)))
}

/// Decode each row on its own so one malformed row only costs that row.
fn parse_rows(values: Vec<serde_json::Value>) -> Vec<RuleTableRow> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(index, error = %e, "Rejected malformed rule table row");
                None
            }
        })
        .collect()
}
