//! SQLite backend, using rusqlite with the bundled engine.
//!
//! `creds.database` is the database file path; missing parent directories
//! are created so sqlite can create the file. A `regexp(pattern, text)`
//! scalar function is registered on every connection so the `REGEXP`
//! operator works the same as on mysql.

use crate::config::Credentials;
use crate::core::{BridgeError, Result};
use crate::query::{shape_row, SqlOutput, StatementType, Value};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned((*i).into()),
            Value::Real(f) => ToSqlOutput::Owned((*f).into()),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Opens a file-backed sqlite connection, creating parent directories if
/// needed (file creation itself is driver-default behavior).
pub(crate) fn open(creds: &Credentials) -> Result<Connection> {
    let path = Path::new(&creds.database);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path).map_err(BridgeError::connection)?;
    register_regexp(&conn).map_err(BridgeError::connection)?;
    Ok(conn)
}

/// Registers `regexp(pattern, text)` so `text REGEXP pattern` works.
/// A NULL text never matches.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let text: Option<String> = ctx.get(1)?;
            let re = Regex::new(&pattern)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            Ok(match text {
                Some(text) => re.is_match(&text),
                None => false,
            })
        },
    )
}

pub(crate) fn execute(
    conn: &Connection,
    sql: &str,
    params: Option<&[Value]>,
    as_dict: bool,
    stmt_type: StatementType,
) -> Result<SqlOutput> {
    let sql = match params {
        Some(_) => super::positional_placeholders(sql),
        None => sql.to_string(),
    };

    match stmt_type {
        StatementType::Select => fetch_rows(conn, &sql, params, as_dict),
        StatementType::Insert => {
            run_write(conn, &sql, params)?;
            Ok(SqlOutput::LastInsertId(conn.last_insert_rowid()))
        }
        StatementType::Update | StatementType::Delete => {
            let affected = run_write(conn, &sql, params)?;
            Ok(SqlOutput::RowsAffected(affected as u64))
        }
        _ => {
            match params {
                Some(p) => {
                    conn.execute(&sql, rusqlite::params_from_iter(p.iter()))
                        .map_err(BridgeError::query)?;
                }
                // execute_batch permits multi-statement DDL scripts
                None => conn.execute_batch(&sql).map_err(BridgeError::query)?,
            }
            Ok(SqlOutput::Rows(Vec::new()))
        }
    }
}

fn fetch_rows(
    conn: &Connection,
    sql: &str,
    params: Option<&[Value]>,
    as_dict: bool,
) -> Result<SqlOutput> {
    let mut stmt = conn.prepare(sql).map_err(BridgeError::query)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = columns.len();

    let mut rows = match params {
        Some(p) => stmt.query(rusqlite::params_from_iter(p.iter())),
        None => stmt.query([]),
    }
    .map_err(BridgeError::query)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(BridgeError::query)? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(value_from_sqlite(row.get_ref(i).map_err(BridgeError::query)?));
        }
        out.push(shape_row(&columns, values, as_dict));
    }
    Ok(SqlOutput::Rows(out))
}

fn run_write(conn: &Connection, sql: &str, params: Option<&[Value]>) -> Result<usize> {
    match params {
        Some(p) => conn.execute(sql, rusqlite::params_from_iter(p.iter())),
        None => conn.execute(sql, []),
    }
    .map_err(BridgeError::query)
}

fn value_from_sqlite(value: ValueRef) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Row;
    use tempfile::TempDir;

    fn open_scratch(dir: &TempDir) -> Connection {
        let creds =
            Credentials::sqlite(dir.path().join("scratch.db").to_string_lossy().into_owned());
        open(&creds).unwrap()
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c/scratch.db");
        let creds = Credentials::sqlite(nested.to_string_lossy().into_owned());
        let _conn = open(&creds).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn test_regexp_operator_is_available() {
        let dir = TempDir::new().unwrap();
        let conn = open_scratch(&dir);
        conn.execute_batch(
            "CREATE TABLE names (n TEXT);
             INSERT INTO names VALUES ('alice'), ('bob'), ('amy'), (NULL);",
        )
        .unwrap();

        let out = execute(
            &conn,
            "SELECT n FROM names WHERE n REGEXP %s",
            Some(&[Value::from("^a.*")]),
            false,
            StatementType::Select,
        )
        .unwrap();
        assert_eq!(
            out.rows(),
            &[
                Row::Tuple(vec![Value::from("alice")]),
                Row::Tuple(vec![Value::from("amy")]),
            ]
        );
    }

    #[test]
    fn test_value_round_trip() {
        let dir = TempDir::new().unwrap();
        let conn = open_scratch(&dir);
        conn.execute_batch("CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT)")
            .unwrap();

        execute(
            &conn,
            "INSERT INTO t VALUES (%s, %s, %s, %s, %s)",
            Some(&[
                Value::Integer(42),
                Value::Real(1.5),
                Value::from("hello"),
                Value::Blob(vec![1, 2, 3]),
                Value::Null,
            ]),
            true,
            StatementType::Insert,
        )
        .unwrap();

        let out = execute(&conn, "SELECT * FROM t", None, false, StatementType::Select).unwrap();
        assert_eq!(
            out.rows(),
            &[Row::Tuple(vec![
                Value::Integer(42),
                Value::Real(1.5),
                Value::from("hello"),
                Value::Blob(vec![1, 2, 3]),
                Value::Null,
            ])]
        );
    }

    #[test]
    fn test_multi_statement_batch_without_params() {
        let dir = TempDir::new().unwrap();
        let conn = open_scratch(&dir);
        let out = execute(
            &conn,
            "CREATE TABLE a (x INTEGER); CREATE TABLE b (y INTEGER);",
            None,
            true,
            StatementType::Create,
        );
        // Create goes through the generic path only on sqlite; the guard
        // in the executor never lets DDL reach network drivers.
        assert!(out.is_ok());

        let tables = execute(
            &conn,
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            None,
            false,
            StatementType::Select,
        )
        .unwrap();
        assert_eq!(tables.rows().len(), 2);
    }
}
