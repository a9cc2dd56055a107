//! Credential resolution from layered configuration sources.
//!
//! Credentials for a named profile come from, in order of precedence:
//! explicit caller-supplied credentials, environment variables
//! (`DB_NAME`/`DB_USER`/`DB_PASS` plus optional `DB_HOST`/`DB_PORT`), or an
//! INI profile file at `$DB_BRIDGE_CONFIG` (if set and the file exists)
//! falling back to `~/.db_bridge.cfg`. Every call re-reads its sources;
//! nothing is cached process-wide.

use crate::core::{BridgeError, Result};
use ini::Ini;
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming an alternate config file path.
pub const CONFIG_PATH_VAR: &str = "DB_BRIDGE_CONFIG";

/// Environment variable naming the profile to load when no explicit
/// profile argument is given.
pub const PROFILE_VAR: &str = "DB_BRIDGE_PROFILE";

/// Config file name looked up in the user's home directory.
const CONFIG_FILE_NAME: &str = ".db_bridge.cfg";

/// The database engine family. Determines which client library opens the
/// connection and which placeholder/pattern syntax applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Mysql,
    Sqlite,
    Postgres,
}

impl Driver {
    /// Parses a driver tag as it appears in a profile file.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::UnsupportedDriver` for any tag other than
    /// `mysql`, `sqlite` or `postgres` (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "mysql" => Ok(Driver::Mysql),
            "sqlite" => Ok(Driver::Sqlite),
            "postgres" => Ok(Driver::Postgres),
            other => Err(BridgeError::UnsupportedDriver(other.to_string())),
        }
    }

    /// The canonical lowercase tag for this driver.
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
        }
    }

    /// Default TCP port for network drivers. Meaningless for sqlite.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            _ => 3306,
        }
    }

    /// The SQL operator used for regexp matching in this dialect.
    pub fn pattern_operator(&self) -> &'static str {
        match self {
            Driver::Postgres => "~",
            // sqlite gets REGEXP via the scalar function registered at open
            _ => "REGEXP",
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Driver {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Driver::from_name(s)
    }
}

/// A resolved set of parameters sufficient to open one connection.
///
/// `database` is always required: a database name for network drivers, a
/// file path for sqlite. Host, port, user and password only matter for
/// network drivers. Records are built fresh on every call that needs a
/// connection and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub driver: Driver,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Credentials for a file-backed sqlite database.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Credentials {
            driver: Driver::Sqlite,
            host: None,
            port: None,
            database: path.into(),
            user: None,
            password: None,
        }
    }

    /// Credentials for a network driver (mysql or postgres).
    pub fn network(
        driver: Driver,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials {
            driver,
            host: Some(host.into()),
            port: Some(port),
            database: database.into(),
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }
}

/// Resolves credentials with the documented precedence:
///
/// 1. `explicit` credentials, used verbatim with no further lookup.
/// 2. Environment variables, when `DB_NAME`, `DB_USER` and `DB_PASS` are
///    all present (driver assumed mysql; the env mode has no driver field).
/// 3. The INI profile file via [`load_config`].
pub fn resolve(profile: Option<&str>, explicit: Option<Credentials>) -> Result<Credentials> {
    if let Some(creds) = explicit {
        return Ok(creds);
    }
    if let Some(creds) = from_env()? {
        debug!("resolved credentials from environment variables");
        return Ok(creds);
    }
    load_config(profile)
}

/// Builds credentials from `DB_*` environment variables, if the minimum
/// required subset (`DB_NAME`, `DB_USER`, `DB_PASS`) is present.
///
/// Returns `Ok(None)` when the subset is incomplete so resolution can fall
/// through to the profile file.
pub fn from_env() -> Result<Option<Credentials>> {
    let name = env::var("DB_NAME").ok().filter(|v| !v.is_empty());
    let user = env::var("DB_USER").ok().filter(|v| !v.is_empty());
    let pass = env::var("DB_PASS").ok().filter(|v| !v.is_empty());

    let (database, user, password) = match (name, user, pass) {
        (Some(n), Some(u), Some(p)) => (n, u, p),
        _ => return Ok(None),
    };

    let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = match env::var("DB_PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .map_err(|_| BridgeError::Config(format!("invalid DB_PORT value: {raw}")))?,
        Err(_) => Driver::Mysql.default_port(),
    };

    Ok(Some(Credentials::network(
        Driver::Mysql,
        host,
        port,
        database,
        user,
        password,
    )))
}

/// Loads credentials for a profile from the INI config file.
///
/// The file path comes from `$DB_BRIDGE_CONFIG` when that is set and the
/// file exists there, otherwise `~/.db_bridge.cfg`. The profile is chosen
/// from the `profile` argument, then `$DB_BRIDGE_PROFILE`, then the file's
/// `[DEFAULT] active` key, then the first section in the file.
///
/// # Errors
///
/// `BridgeError::Config` when the file is missing, declares no profiles,
/// the resolved profile section does not exist, or a required key is
/// absent. `BridgeError::UnsupportedDriver` for an unknown driver tag.
pub fn load_config(profile: Option<&str>) -> Result<Credentials> {
    let path = config_path();
    if !path.is_file() {
        return Err(BridgeError::Config(format!(
            "no DB config found at {}; create ~/{} or set {} correctly",
            path.display(),
            CONFIG_FILE_NAME,
            CONFIG_PATH_VAR
        )));
    }

    let ini = Ini::load_from_file(&path)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    let env_profile = env::var(PROFILE_VAR).ok().filter(|v| !v.is_empty());
    let active = match profile {
        Some(name) => name.to_string(),
        None => match env_profile {
            Some(name) => name,
            None => match ini
                .section(Some("DEFAULT"))
                .and_then(|sect| sect.get("active"))
            {
                Some(name) => name.to_string(),
                None => first_profile(&ini).ok_or_else(|| {
                    BridgeError::Config(format!("no profiles defined in {}", path.display()))
                })?,
            },
        },
    };

    let sect = ini.section(Some(active.as_str())).ok_or_else(|| {
        BridgeError::Config(format!(
            "profile '{}' not found in {}",
            active,
            path.display()
        ))
    })?;

    debug!(profile = %active, path = %path.display(), "loading DB profile");

    let driver = Driver::from_name(sect.get("driver").unwrap_or("mysql"))?;

    if driver == Driver::Sqlite {
        let raw_path = sect.get("database").or_else(|| sect.get("path")).ok_or_else(|| {
            BridgeError::Config(format!(
                "sqlite profile '{}' requires a 'database = /path/to/file.db'",
                active
            ))
        })?;
        return Ok(Credentials::sqlite(expand_tilde(raw_path)));
    }

    let database = sect
        .get("database")
        .or_else(|| sect.get("name"))
        .ok_or_else(|| missing_key(&active, "database"))?;
    let user = sect.get("user").ok_or_else(|| missing_key(&active, "user"))?;
    let password = sect
        .get("password")
        .ok_or_else(|| missing_key(&active, "password"))?;
    let host = sect.get("host").unwrap_or("localhost");
    let port = match sect.get("port") {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            BridgeError::Config(format!("invalid port '{}' in profile '{}'", raw, active))
        })?,
        None => driver.default_port(),
    };

    Ok(Credentials::network(driver, host, port, database, user, password))
}

fn missing_key(profile: &str, key: &str) -> BridgeError {
    BridgeError::Config(format!("profile '{}' is missing required key '{}'", profile, key))
}

/// The config file path: `$DB_BRIDGE_CONFIG` when set, non-empty and
/// pointing at an existing file, otherwise `~/.db_bridge.cfg`.
pub fn config_path() -> PathBuf {
    if let Ok(raw) = env::var(CONFIG_PATH_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// First non-DEFAULT section name in the file, in declaration order.
fn first_profile(ini: &Ini) -> Option<String> {
    ini.sections()
        .flatten()
        .find(|name| *name != "DEFAULT")
        .map(|name| name.to_string())
}

/// Expands a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().into_owned();
        }
    }
    path.to_string()
}
