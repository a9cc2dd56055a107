//! MySQL backend, using the synchronous `mysql` crate.

use crate::config::{Credentials, Driver};
use crate::core::{BridgeError, Result};
use crate::query::{shape_row, Row, SqlOutput, StatementType, Value};
use mysql::prelude::{Protocol, Queryable};
use mysql::{Conn, OptsBuilder, Params};

/// Opens a network connection with host/port/user/password/database.
pub(crate) fn open(creds: &Credentials) -> Result<Conn> {
    let opts = OptsBuilder::new()
        .ip_or_hostname(Some(
            creds.host.clone().unwrap_or_else(|| "localhost".to_string()),
        ))
        .tcp_port(creds.port.unwrap_or_else(|| Driver::Mysql.default_port()))
        .db_name(Some(creds.database.clone()))
        .user(creds.user.clone())
        .pass(creds.password.clone());
    Conn::new(opts).map_err(BridgeError::connection)
}

pub(crate) fn execute(
    conn: &mut Conn,
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
        StatementType::Select => {
            let rows = match params {
                Some(p) => {
                    let result = conn
                        .exec_iter(sql.as_str(), to_params(p))
                        .map_err(BridgeError::query)?;
                    collect_rows(result, as_dict)?
                }
                None => {
                    let result = conn.query_iter(sql.as_str()).map_err(BridgeError::query)?;
                    collect_rows(result, as_dict)?
                }
            };
            Ok(SqlOutput::Rows(rows))
        }
        StatementType::Insert => {
            run_write(conn, &sql, params)?;
            Ok(SqlOutput::LastInsertId(conn.last_insert_id() as i64))
        }
        StatementType::Update | StatementType::Delete => {
            run_write(conn, &sql, params)?;
            Ok(SqlOutput::RowsAffected(conn.affected_rows()))
        }
        _ => {
            run_write(conn, &sql, params)?;
            Ok(SqlOutput::Rows(Vec::new()))
        }
    }
}

fn run_write(conn: &mut Conn, sql: &str, params: Option<&[Value]>) -> Result<()> {
    match params {
        Some(p) => conn.exec_drop(sql, to_params(p)),
        None => conn.query_drop(sql),
    }
    .map_err(BridgeError::query)
}

fn collect_rows<P: Protocol>(
    result: mysql::QueryResult<'_, '_, '_, P>,
    as_dict: bool,
) -> Result<Vec<Row>> {
    let columns: Vec<String> = result
        .columns()
        .as_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect();

    let mut rows = Vec::new();
    for item in result {
        let row = item.map_err(BridgeError::query)?;
        let values: Vec<Value> = row.unwrap().into_iter().map(value_from_mysql).collect();
        rows.push(shape_row(&columns, values, as_dict));
    }
    Ok(rows)
}

fn to_params(values: &[Value]) -> Params {
    Params::Positional(values.iter().map(to_mysql_value).collect())
}

fn to_mysql_value(value: &Value) -> mysql::Value {
    match value {
        Value::Null => mysql::Value::NULL,
        Value::Integer(i) => mysql::Value::Int(*i),
        Value::Real(f) => mysql::Value::Double(*f),
        Value::Text(s) => mysql::Value::Bytes(s.clone().into_bytes()),
        Value::Blob(b) => mysql::Value::Bytes(b.clone()),
    }
}

fn value_from_mysql(value: mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Int(i) => Value::Integer(i),
        mysql::Value::UInt(u) => Value::Integer(u as i64),
        mysql::Value::Float(f) => Value::Real(f as f64),
        mysql::Value::Double(d) => Value::Real(d),
        mysql::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Blob(err.into_bytes()),
        },
        mysql::Value::Date(y, mo, d, h, mi, s, _us) => Value::Text(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            y, mo, d, h, mi, s
        )),
        mysql::Value::Time(neg, days, h, mi, s, _us) => {
            let sign = if neg { "-" } else { "" };
            Value::Text(format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                days * 24 + h as u32,
                mi,
                s
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion_to_mysql() {
        assert_eq!(to_mysql_value(&Value::Null), mysql::Value::NULL);
        assert_eq!(to_mysql_value(&Value::Integer(7)), mysql::Value::Int(7));
        assert_eq!(to_mysql_value(&Value::Real(2.5)), mysql::Value::Double(2.5));
        assert_eq!(
            to_mysql_value(&Value::from("abc")),
            mysql::Value::Bytes(b"abc".to_vec())
        );
    }

    #[test]
    fn test_value_conversion_from_mysql() {
        assert_eq!(value_from_mysql(mysql::Value::NULL), Value::Null);
        assert_eq!(value_from_mysql(mysql::Value::UInt(3)), Value::Integer(3));
        assert_eq!(
            value_from_mysql(mysql::Value::Bytes(b"abc".to_vec())),
            Value::from("abc")
        );
        // Non-UTF8 payloads stay binary
        assert_eq!(
            value_from_mysql(mysql::Value::Bytes(vec![0xff, 0xfe])),
            Value::Blob(vec![0xff, 0xfe])
        );
        assert_eq!(
            value_from_mysql(mysql::Value::Date(2024, 1, 2, 3, 4, 5, 0)),
            Value::from("2024-01-02 03:04:05")
        );
    }
}
