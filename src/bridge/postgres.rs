//! PostgreSQL backend, using the synchronous `postgres` crate.
//!
//! Postgres has no driver-reported last-insert id: an INSERT yields
//! `LastInsertId` only when the statement carries a `RETURNING` clause,
//! otherwise the affected-row count is returned.

use crate::config::{Credentials, Driver};
use crate::core::{BridgeError, Result};
use crate::query::{shape_row, Row, SqlOutput, StatementType, Value};
use bytes::BytesMut;
use once_cell::sync::Lazy;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls};
use regex::Regex;

static RETURNING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRETURNING\b").unwrap());

/// Binds a [`Value`] against whatever parameter type the server inferred
/// for the statement. A typed Rust binding (say `i64`) would be rejected
/// by `to_sql_checked` for any other width, so the dispatch on the target
/// type happens here, mirroring the read side in [`value_from_pg`]. NULL
/// binds as NULL regardless of the parameter type.
impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(i) => {
                if *ty == Type::INT2 {
                    i16::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT8 {
                    i.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*i as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*i as f64).to_sql(ty, out)
                } else if *ty == Type::BOOL {
                    (*i != 0).to_sql(ty, out)
                } else {
                    // Text wire format covers the text family and UNKNOWN
                    i.to_string().to_sql(ty, out)
                }
            }
            Value::Real(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    f.to_sql(ty, out)
                } else {
                    f.to_string().to_sql(ty, out)
                }
            }
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Blob(b) => b.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Opens a network connection with host/port/user/password/database.
pub(crate) fn open(creds: &Credentials) -> Result<Client> {
    let mut config = postgres::Config::new();
    config
        .host(creds.host.as_deref().unwrap_or("localhost"))
        .port(creds.port.unwrap_or_else(|| Driver::Postgres.default_port()))
        .dbname(&creds.database);
    if let Some(user) = &creds.user {
        config.user(user);
    }
    if let Some(password) = &creds.password {
        config.password(password);
    }
    config.connect(NoTls).map_err(BridgeError::connection)
}

pub(crate) fn execute(
    client: &mut Client,
    sql: &str,
    params: Option<&[Value]>,
    as_dict: bool,
    stmt_type: StatementType,
) -> Result<SqlOutput> {
    let sql = match params {
        Some(_) => super::numbered_placeholders(sql),
        None => sql.to_string(),
    };
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .unwrap_or(&[])
        .iter()
        .map(|v| v as &(dyn ToSql + Sync))
        .collect();

    match stmt_type {
        StatementType::Select => {
            let rows = client.query(sql.as_str(), &refs).map_err(BridgeError::query)?;
            Ok(SqlOutput::Rows(convert_rows(&rows, as_dict)?))
        }
        StatementType::Insert => {
            if RETURNING_RE.is_match(&sql) {
                let row = client
                    .query_one(sql.as_str(), &refs)
                    .map_err(BridgeError::query)?;
                let id = row
                    .try_get::<_, i64>(0)
                    .or_else(|_| row.try_get::<_, i32>(0).map(i64::from))
                    .map_err(BridgeError::query)?;
                Ok(SqlOutput::LastInsertId(id))
            } else {
                let affected = client
                    .execute(sql.as_str(), &refs)
                    .map_err(BridgeError::query)?;
                Ok(SqlOutput::RowsAffected(affected))
            }
        }
        StatementType::Update | StatementType::Delete => {
            let affected = client
                .execute(sql.as_str(), &refs)
                .map_err(BridgeError::query)?;
            Ok(SqlOutput::RowsAffected(affected))
        }
        _ => {
            match params {
                Some(_) => {
                    client
                        .execute(sql.as_str(), &refs)
                        .map_err(BridgeError::query)?;
                }
                // batch_execute permits multi-statement scripts
                None => client.batch_execute(&sql).map_err(BridgeError::query)?,
            }
            Ok(SqlOutput::Rows(Vec::new()))
        }
    }
}

fn convert_rows(rows: &[postgres::Row], as_dict: bool) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let mut values = Vec::with_capacity(columns.len());
        for (i, column) in row.columns().iter().enumerate() {
            values.push(value_from_pg(row, i, column.type_())?);
        }
        out.push(shape_row(&columns, values, as_dict));
    }
    Ok(out)
}

/// Reads one column by its declared type. Types outside the common set
/// fall back to a best-effort text read, or NULL when even that fails.
fn value_from_pg(row: &postgres::Row, idx: usize, ty: &Type) -> Result<Value> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)
            .map_err(BridgeError::query)?
            .map(|b| Value::Integer(b as i64))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(BridgeError::query)?
            .map(|i| Value::Integer(i as i64))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(BridgeError::query)?
            .map(|i| Value::Integer(i as i64))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)
            .map_err(BridgeError::query)?
            .map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(BridgeError::query)?
            .map(|f| Value::Real(f as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .map_err(BridgeError::query)?
            .map(Value::Real)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(BridgeError::query)?
            .map(Value::Blob)
    } else if *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
        || *ty == Type::UNKNOWN
    {
        row.try_get::<_, Option<String>>(idx)
            .map_err(BridgeError::query)?
            .map(Value::Text)
    } else {
        row.try_get::<_, Option<String>>(idx)
            .unwrap_or(None)
            .map(Value::Text)
    };

    Ok(value.unwrap_or(Value::Null))
}
