//! Column lookup helpers layered on top of the query executor.
//!
//! Both helpers compose a SELECT from a table name, target columns and a
//! filter on one column, then delegate to [`SqlRequest`](crate::query::SqlRequest).
//! Table and column names are interpolated (they cannot be bound); the
//! filter value always goes through parameter binding.

use crate::config::{self, Credentials};
use crate::core::{BridgeError, Result};
use crate::query::{Row, SqlRequest, Value};
use tracing::debug;

/// Disambiguation collaborator for [`get_column_values`]: given all
/// candidate rows of a non-unique match, returns the index of the row to
/// use, or `None` to decline.
///
/// An interactive prompt would implement this in an application; the
/// library never assumes a terminal.
pub trait RowPicker {
    fn pick(&self, candidates: &[Row]) -> Option<usize>;
}

/// Trivial picker that always takes the first candidate (table storage
/// order, typically the lowest primary key).
pub struct FirstMatch;

impl RowPicker for FirstMatch {
    fn pick(&self, candidates: &[Row]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Outcome of a uniqueness lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The filter matched no row (and missing rows were not fatal).
    Missing,
    /// Exactly one row matched (or a picker chose one). A tuple of values
    /// in requested-column order, or a mapping of the requested columns
    /// only, per [`LookupOptions::as_tuple`].
    One(Row),
    /// The "unique" column was not actually unique and no picker decided;
    /// all candidate rows surface for the caller to disambiguate.
    Ambiguous(Vec<Row>),
}

/// Options for [`get_column_values`].
pub struct LookupOptions<'a> {
    /// INI profile to resolve credentials from.
    pub profile: Option<&'a str>,
    /// Explicit credentials; mutually exclusive with `profile`.
    pub creds: Option<Credentials>,
    /// Primary key column, selected alongside the requested columns so
    /// ambiguous candidates stay identifiable. Default `"id"`.
    pub primary_key: &'a str,
    /// Treat zero matches as a `NotFound` error instead of `Lookup::Missing`.
    pub error_if_missing: bool,
    /// Shape of a `Lookup::One` result: a positional tuple in
    /// requested-column order (default), or a column-name mapping with
    /// the auto-prepended primary key dropped.
    pub as_tuple: bool,
    /// Collaborator that resolves non-unique matches.
    pub picker: Option<&'a dyn RowPicker>,
}

impl Default for LookupOptions<'_> {
    fn default() -> Self {
        LookupOptions {
            profile: None,
            creds: None,
            primary_key: "id",
            error_if_missing: false,
            as_tuple: true,
            picker: None,
        }
    }
}

/// Fetches the given columns from `table` where `unique_column` equals
/// `unique_value`.
///
/// # Examples
///
/// ```no_run
/// use db_bridge::helpers::{get_column_values, Lookup, LookupOptions};
///
/// let email = get_column_values(
///     &["email"],
///     "users",
///     "username",
///     "alice",
///     &LookupOptions::default(),
/// )?;
/// if let Lookup::One(row) = email {
///     println!("{:?}", row.values());
/// }
/// # Ok::<(), db_bridge::BridgeError>(())
/// ```
pub fn get_column_values(
    columns: &[&str],
    table: &str,
    unique_column: &str,
    unique_value: impl Into<Value>,
    options: &LookupOptions,
) -> Result<Lookup> {
    // Resolve once so the same credentials flow into the executor instead
    // of being re-read from ambient state.
    let creds = config::resolve(options.profile, options.creds.clone())?;

    let select_cols = if columns.contains(&options.primary_key) {
        columns.join(", ")
    } else {
        format!("{}, {}", options.primary_key, columns.join(", "))
    };
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = %s",
        select_cols, table, unique_column
    );

    let rows = SqlRequest::new(&sql)
        .params(vec![unique_value.into()])
        .creds(creds)
        .run()?
        .into_rows();

    if rows.is_empty() {
        if options.error_if_missing {
            return Err(BridgeError::NotFound(format!(
                "no {} row where {} matches the given value",
                table, unique_column
            )));
        }
        return Ok(Lookup::Missing);
    }

    let chosen = if rows.len() == 1 {
        &rows[0]
    } else {
        debug!(candidates = rows.len(), table, unique_column, "non-unique match");
        match options.picker.and_then(|p| p.pick(&rows)) {
            Some(idx) if idx < rows.len() => &rows[idx],
            _ => return Ok(Lookup::Ambiguous(rows)),
        }
    };

    // Only the requested columns come back; the prepended primary key is
    // dropped unless the caller asked for it.
    let row = if options.as_tuple {
        Row::Tuple(
            columns
                .iter()
                .map(|col| chosen.get(col).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    } else {
        Row::Map(
            columns
                .iter()
                .map(|col| {
                    (
                        col.to_string(),
                        chosen.get(col).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect(),
        )
    };
    Ok(Lookup::One(row))
}

/// Options for [`get_column_values_regexp`].
#[derive(Default)]
pub struct RegexpOptions<'a> {
    pub profile: Option<&'a str>,
    pub creds: Option<Credentials>,
    /// Return positional tuples instead of mapped rows.
    pub as_tuples: bool,
}

/// Fetches the given columns from `table` for every row whose
/// `unique_column` matches `pattern` under the driver's regexp operator
/// (`REGEXP` on mysql and sqlite, `~` on postgres).
///
/// No uniqueness assumption: returns all matches in table storage order,
/// or an empty vec when nothing matches.
pub fn get_column_values_regexp(
    columns: &[&str],
    table: &str,
    unique_column: &str,
    pattern: &str,
    options: &RegexpOptions,
) -> Result<Vec<Row>> {
    let creds = config::resolve(options.profile, options.creds.clone())?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} {} %s",
        columns.join(", "),
        table,
        unique_column,
        creds.driver.pattern_operator()
    );

    let mut request = SqlRequest::new(&sql)
        .params(vec![Value::from(pattern)])
        .creds(creds);
    if options.as_tuples {
        request = request.as_tuples();
    }
    Ok(request.run()?.into_rows())
}
