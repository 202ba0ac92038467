//! SQL dialect differences between the supported backends.

use crate::error::StoreError;
use rootcause::Report;
use std::fmt;

/// The SQL flavour spoken by the backing database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
    /// MySQL or MariaDB.
    MySql,
}

impl Dialect {
    /// Detects the dialect from a database URL scheme.
    pub fn from_url(url: &str) -> Result<Self, Report<StoreError>> {
        let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::MySql),
            _ => Err(StoreError::UnsupportedBackend {
                scheme: scheme.to_string(),
            }
            .into()),
        }
    }

    /// Returns the dialect name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    /// Quotes an identifier. Callers pass validated identifiers only.
    #[must_use]
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::Postgres | Self::Sqlite => format!("\"{ident}\""),
            Self::MySql => format!("`{ident}`"),
        }
    }

    /// Returns the bind placeholder for the 1-based parameter `n`.
    #[must_use]
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite | Self::MySql => "?".to_string(),
        }
    }

    /// Column type and constraints of the auto-increment identity key.
    #[must_use]
    pub fn identity_definition(&self) -> &'static str {
        match self {
            Self::Postgres => "BIGSERIAL PRIMARY KEY",
            Self::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::MySql => "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
        }
    }

    /// Column type of rule columns.
    #[must_use]
    pub fn string_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    /// Maximum number of bind parameters in one statement.
    #[must_use]
    pub fn max_bind_params(&self) -> usize {
        match self {
            Self::Postgres | Self::MySql => 65_535,
            Self::Sqlite => 32_766,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
