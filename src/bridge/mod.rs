//! Connection factory and per-driver execution backends.
//!
//! [`Bridge`] is a closed union over the three live connection types, so
//! driver dispatch is an exhaustive match rather than a runtime string
//! lookup; unknown driver tags are already rejected when credentials are
//! parsed. Each call opens its own connection and the connection closes
//! deterministically when the bridge is dropped. No pooling, no retry.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::config::{Credentials, Driver};
use crate::core::Result;
use crate::query::{SqlOutput, StatementType, Value};

/// An open connection to one of the supported backends.
pub enum Bridge {
    Sqlite(rusqlite::Connection),
    Mysql(::mysql::Conn),
    Postgres(::postgres::Client),
}

impl Bridge {
    /// Opens a connection using the driver named in the credentials.
    ///
    /// # Errors
    ///
    /// `BridgeError::Connection` wrapping the driver error on network,
    /// auth or file failures.
    pub fn open(creds: &Credentials) -> Result<Bridge> {
        match creds.driver {
            Driver::Sqlite => Ok(Bridge::Sqlite(self::sqlite::open(creds)?)),
            Driver::Mysql => Ok(Bridge::Mysql(self::mysql::open(creds)?)),
            Driver::Postgres => Ok(Bridge::Postgres(self::postgres::open(creds)?)),
        }
    }

    /// The driver family this connection belongs to.
    pub fn driver(&self) -> Driver {
        match self {
            Bridge::Sqlite(_) => Driver::Sqlite,
            Bridge::Mysql(_) => Driver::Mysql,
            Bridge::Postgres(_) => Driver::Postgres,
        }
    }

    /// Executes one statement, binding `params` when present, and reads
    /// the result back according to the statement type.
    pub fn execute(
        &mut self,
        sql: &str,
        params: Option<&[Value]>,
        as_dict: bool,
        stmt_type: StatementType,
    ) -> Result<SqlOutput> {
        match self {
            Bridge::Sqlite(conn) => self::sqlite::execute(conn, sql, params, as_dict, stmt_type),
            Bridge::Mysql(conn) => self::mysql::execute(conn, sql, params, as_dict, stmt_type),
            Bridge::Postgres(client) => {
                self::postgres::execute(client, sql, params, as_dict, stmt_type)
            }
        }
    }
}

/// Rewrites `%s` placeholders to the `?` style used by sqlite and mysql.
///
/// Blind text substitution, same caveat as the original contract: a `%s`
/// inside a string literal is rewritten too. Only applied when parameters
/// are actually bound.
pub(crate) fn positional_placeholders(sql: &str) -> String {
    sql.replace("%s", "?")
}

/// Rewrites `%s` placeholders to the numbered `$1..$n` style used by
/// postgres, in left-to-right order.
pub(crate) fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut n = 0usize;
    while let Some(idx) = rest.find("%s") {
        n += 1;
        out.push_str(&rest[..idx]);
        out.push('$');
        out.push_str(&n.to_string());
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Row;
    use tempfile::TempDir;

    #[test]
    fn test_positional_placeholder_translation() {
        assert_eq!(
            positional_placeholders("SELECT a FROM t WHERE b = %s AND c = %s"),
            "SELECT a FROM t WHERE b = ? AND c = ?"
        );
        assert_eq!(positional_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_numbered_placeholder_translation() {
        assert_eq!(
            numbered_placeholders("INSERT INTO t (a, b, c) VALUES (%s, %s, %s)"),
            "INSERT INTO t (a, b, c) VALUES ($1, $2, $3)"
        );
        assert_eq!(numbered_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_open_dispatches_on_driver() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::sqlite(dir.path().join("t.db").to_string_lossy().into_owned());
        let bridge = Bridge::open(&creds).unwrap();
        assert_eq!(bridge.driver(), Driver::Sqlite);
    }

    #[test]
    fn test_execute_round_trip_on_sqlite() {
        let dir = TempDir::new().unwrap();
        let creds = Credentials::sqlite(dir.path().join("t.db").to_string_lossy().into_owned());
        let mut bridge = Bridge::open(&creds).unwrap();

        bridge
            .execute(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
                None,
                true,
                StatementType::Create,
            )
            .unwrap();
        let out = bridge
            .execute(
                "INSERT INTO t (name) VALUES (%s)",
                Some(&[Value::from("alice")]),
                true,
                StatementType::Insert,
            )
            .unwrap();
        assert_eq!(out, SqlOutput::LastInsertId(1));

        let out = bridge
            .execute("SELECT name FROM t", None, true, StatementType::Select)
            .unwrap();
        assert_eq!(
            out.rows(),
            &[Row::Map(vec![("name".to_string(), Value::from("alice"))])]
        );
    }
}
