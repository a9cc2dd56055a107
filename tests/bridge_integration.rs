//! End-to-end tests exercising the full path: INI profile file →
//! credential resolution → connection → statement execution → helpers.
//!
//! Only the sqlite backend runs here; the network backends would need a
//! live server. These tests mutate process environment variables, so they
//! run under a shared lock.

use std::io::Write;
use std::sync::Mutex;

use db_bridge::helpers::{get_column_values, Lookup, LookupOptions};
use db_bridge::query::{Row, SqlOutput, SqlRequest, Value};
use db_bridge::{load_config, run_sql, BridgeError, Driver};
use tempfile::{NamedTempFile, TempDir};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn write_profile_config(db_path: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[DEFAULT]\nactive = scratch\n\n[scratch]\ndriver   = sqlite\ndatabase = {}\n",
        db_path
    )
    .unwrap();
    file
}

#[test]
fn profile_file_drives_end_to_end_execution() {
    init_tracing();
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("e2e.db");
    let config = write_profile_config(&db_path.to_string_lossy());
    std::env::set_var("DB_BRIDGE_CONFIG", config.path());
    std::env::remove_var("DB_BRIDGE_PROFILE");
    for var in ["DB_NAME", "DB_USER", "DB_PASS"] {
        std::env::remove_var(var);
    }

    let creds = load_config(None).unwrap();
    assert_eq!(creds.driver, Driver::Sqlite);
    assert_eq!(creds.database, db_path.to_string_lossy());

    run_sql(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT
        )",
    )
    .unwrap();

    let out = SqlRequest::new("INSERT INTO users (username, email) VALUES (%s, %s)")
        .params(vec![Value::from("alice"), Value::from("alice@example.com")])
        .run()
        .unwrap();
    assert_eq!(out, SqlOutput::LastInsertId(1));

    let result = get_column_values(
        &["email"],
        "users",
        "username",
        "alice",
        &LookupOptions::default(),
    )
    .unwrap();
    assert_eq!(
        result,
        Lookup::One(Row::Tuple(vec![Value::from("alice@example.com")]))
    );

    // No connection lingers: under WAL the sidecar files only vanish on a
    // clean close, so their absence after the calls above proves it.
    run_sql("PRAGMA journal_mode = WAL").unwrap();
    SqlRequest::new("INSERT INTO users (username, email) VALUES (%s, %s)")
        .params(vec![Value::from("bob"), Value::from("bob@example.com")])
        .run()
        .unwrap();
    assert!(!dir.path().join("e2e.db-wal").exists());
    assert!(!dir.path().join("e2e.db-shm").exists());

    std::env::remove_var("DB_BRIDGE_CONFIG");
    drop(config);
    std::fs::remove_file(&db_path).unwrap();
}

#[test]
fn failed_query_still_closes_the_connection() {
    init_tracing();
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("fail.db");
    let config = write_profile_config(&db_path.to_string_lossy());
    std::env::set_var("DB_BRIDGE_CONFIG", config.path());
    for var in ["DB_NAME", "DB_USER", "DB_PASS", "DB_BRIDGE_PROFILE"] {
        std::env::remove_var(var);
    }

    run_sql("PRAGMA journal_mode = WAL").unwrap();
    run_sql("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

    let err = run_sql("SELECT * FROM no_such_table").unwrap_err();
    assert!(matches!(err, BridgeError::Query(_)));

    // The failed call dropped its handle too: no WAL sidecars remain and
    // the file is removable.
    assert!(!dir.path().join("fail.db-wal").exists());
    assert!(!dir.path().join("fail.db-shm").exists());
    std::env::remove_var("DB_BRIDGE_CONFIG");
    std::fs::remove_file(&db_path).unwrap();
}
