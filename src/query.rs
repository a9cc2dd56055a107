//! Query execution: the `run_sql` primitive and its result model.
//!
//! Each request independently resolves credentials, opens a connection,
//! executes a single statement and closes the connection before returning.
//! Parameter binding is the SQL-injection-safe path; the optional
//! `none_to_null` rewrite is a best-effort text substitution kept only as
//! a convenience for literal SQL.

use crate::bridge::Bridge;
use crate::config::{self, Credentials, Driver};
use crate::core::{BridgeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};

/// An owned SQL value, independent of any driver's native value type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// One fetched row, shaped by the request's `as_dict` flag: an ordered
/// column-name/value mapping, or a positional tuple of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Map(Vec<(String, Value)>),
    Tuple(Vec<Value>),
}

impl Row {
    /// Looks a value up by column name. Always `None` for tuple rows.
    pub fn get(&self, column: &str) -> Option<&Value> {
        match self {
            Row::Map(pairs) => pairs.iter().find(|(name, _)| name == column).map(|(_, v)| v),
            Row::Tuple(_) => None,
        }
    }

    /// The row's values in column order, regardless of shape.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Row::Map(pairs) => pairs.iter().map(|(_, v)| v).collect(),
            Row::Tuple(values) => values.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Map(pairs) => pairs.len(),
            Row::Tuple(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a row from column names and values in column order.
pub(crate) fn shape_row(columns: &[String], values: Vec<Value>, as_dict: bool) -> Row {
    if as_dict {
        Row::Map(columns.iter().cloned().zip(values).collect())
    } else {
        Row::Tuple(values)
    }
}

/// The result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutput {
    /// Fetched rows for SELECT (and other row-producing statements);
    /// empty for DDL and other non-returning statements.
    Rows(Vec<Row>),
    /// Driver-reported identifier of the last inserted row.
    LastInsertId(i64),
    /// Rows affected by an UPDATE or DELETE.
    RowsAffected(u64),
}

impl SqlOutput {
    /// The fetched rows, or an empty slice for write results.
    pub fn rows(&self) -> &[Row] {
        match self {
            SqlOutput::Rows(rows) => rows,
            _ => &[],
        }
    }

    /// Consumes the output, returning the fetched rows (empty for writes).
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            SqlOutput::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }
}

/// Statement classification used to decide how results are read back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Other,
}

// First keyword of the statement, skipping leading `--` comment lines.
static LEADING_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:--[^\n]*\n\s*)*([A-Za-z]+)").unwrap());

impl StatementType {
    /// Classifies a SQL string by its first keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = LEADING_KEYWORD_RE
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_default();

        match keyword.as_str() {
            "SELECT" => StatementType::Select,
            "INSERT" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" => StatementType::Create,
            "DROP" => StatementType::Drop,
            _ => StatementType::Other,
        }
    }
}

// Literal spellings of "no value" that the none_to_null rewrite targets.
static NONE_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'None'|"None"|None"#).unwrap());

static DDL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(CREATE|DROP)\b").unwrap());
static WRITE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(UPDATE|DELETE)\b").unwrap());
static WHERE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());

/// Rewrites literal `'None'`, `"None"` and bare `None` occurrences to the
/// SQL `NULL` literal.
///
/// Best-effort text substitution, not SQL-aware parsing: it can over-match
/// inside string literals. Parameter binding handles NULL correctly on its
/// own, so this is never applied when parameters are supplied.
pub fn replace_none_w_null(sql: &str) -> String {
    NONE_LITERAL_RE.replace_all(sql, "NULL").trim().to_string()
}

/// Statement permission guards: DDL is only allowed on sqlite, and
/// UPDATE/DELETE must carry a WHERE clause.
fn check_permissions(sql: &str, driver: Driver) -> Result<()> {
    if driver != Driver::Sqlite && DDL_RE.is_match(sql) {
        return Err(BridgeError::Permission(format!(
            "disallowed DDL on non-sqlite driver: {sql}"
        )));
    }
    if WRITE_RE.is_match(sql) && !WHERE_RE.is_match(sql) {
        return Err(BridgeError::Permission(format!(
            "UPDATE/DELETE requires WHERE clause: {sql}"
        )));
    }
    Ok(())
}

/// A single SQL execution request.
///
/// Use `%s` placeholders in all drivers; each backend translates them to
/// its native placeholder syntax when parameters are bound.
///
/// # Examples
///
/// ```no_run
/// use db_bridge::query::{SqlRequest, Value};
///
/// let out = SqlRequest::new("SELECT email FROM users WHERE username = %s")
///     .params(vec![Value::from("alice")])
///     .profile("staging")
///     .run()?;
/// # Ok::<(), db_bridge::BridgeError>(())
/// ```
#[derive(Debug)]
pub struct SqlRequest<'a> {
    sql: &'a str,
    params: Option<Vec<Value>>,
    profile: Option<&'a str>,
    creds: Option<Credentials>,
    as_dict: bool,
    none_to_null: bool,
}

impl<'a> SqlRequest<'a> {
    /// Starts a request with the defaults: mapped rows, no parameters, no
    /// NULL rewriting, credentials resolved from environment/profile file.
    pub fn new(sql: &'a str) -> Self {
        SqlRequest {
            sql,
            params: None,
            profile: None,
            creds: None,
            as_dict: true,
            none_to_null: false,
        }
    }

    /// Bind values for `%s` placeholders.
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// INI profile to resolve credentials from. Mutually exclusive with
    /// [`SqlRequest::creds`].
    pub fn profile(mut self, profile: &'a str) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Explicit credentials, skipping environment and file lookup.
    /// Mutually exclusive with [`SqlRequest::profile`].
    pub fn creds(mut self, creds: Credentials) -> Self {
        self.creds = Some(creds);
        self
    }

    /// Return rows as positional tuples instead of name/value mappings.
    pub fn as_tuples(mut self) -> Self {
        self.as_dict = false;
        self
    }

    /// Rewrite literal `None` spellings to `NULL` before execution.
    /// Ignored when parameters are supplied.
    pub fn none_to_null(mut self, enabled: bool) -> Self {
        self.none_to_null = enabled;
        self
    }

    /// Resolves credentials, opens a connection scoped to this call,
    /// executes the statement and returns the result. The connection is
    /// closed on every exit path, including errors.
    pub fn run(self) -> Result<SqlOutput> {
        if self.profile.is_some() && self.creds.is_some() {
            return Err(BridgeError::Config(
                "specify only one of profile or creds, not both".to_string(),
            ));
        }

        let creds = config::resolve(self.profile, self.creds)?;

        let mut raw = self.sql.trim().to_string();
        if self.params.is_none() && self.none_to_null {
            raw = replace_none_w_null(&raw);
        }

        check_permissions(&raw, creds.driver)?;
        let stmt_type = StatementType::from_sql(&raw);

        debug!(driver = %creds.driver, sql = %raw, "executing statement");

        let mut bridge = Bridge::open(&creds)?;
        let result = bridge.execute(&raw, self.params.as_deref(), self.as_dict, stmt_type);

        match &result {
            Ok(SqlOutput::RowsAffected(n)) => info!("{} rows affected.", n),
            Ok(SqlOutput::LastInsertId(id)) => debug!(last_insert_id = id, "insert completed"),
            Ok(SqlOutput::Rows(rows)) => debug!(row_count = rows.len(), "fetch completed"),
            Err(e) => error!("SQL execution failed: {}", e),
        }

        // Bridge is dropped here; all drivers close their connection on Drop.
        result
    }
}

/// Executes a SQL statement with the default options against the
/// environment/profile-resolved database.
pub fn run_sql(sql: &str) -> Result<SqlOutput> {
    SqlRequest::new(sql).run()
}
