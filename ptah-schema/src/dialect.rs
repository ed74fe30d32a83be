//! SQL dialect families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The SQL dialect family a schema is rendered for.
///
/// Every name that is not a recognised Postgres or MySQL alias maps to
/// [`Dialect::Generic`], which renders portable DDL without substitutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    #[serde(rename = "mysql")]
    MySql,
    /// Portable SQL.
    Generic,
}

impl Dialect {
    /// All dialects, in the order `generate` renders them.
    pub const ALL: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Generic];

    /// Resolve a dialect from a user supplied name.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Self::Postgres,
            "mysql" | "mariadb" => Self::MySql,
            _ => Self::Generic,
        }
    }

    /// Resolve a dialect from a connection string scheme.
    ///
    /// Returns `None` when the scheme has no driver.
    pub fn from_dsn(dsn: &str) -> Option<Self> {
        let (scheme, _) = dsn.trim().split_once("://")?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Generic => "generic",
        }
    }

    /// Names under which `platform.<name>.<key>` overrides apply to this dialect.
    pub fn override_keys(self) -> &'static [&'static str] {
        match self {
            Self::Postgres => &["postgres", "postgresql", "pg"],
            Self::MySql => &["mysql", "mariadb"],
            Self::Generic => &[],
        }
    }

    /// Whether enums are first-class database types.
    pub fn has_native_enums(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(Dialect::from_name("postgres"), Dialect::Postgres);
        assert_eq!(Dialect::from_name("PostgreSQL"), Dialect::Postgres);
        assert_eq!(Dialect::from_name("pg"), Dialect::Postgres);
        assert_eq!(Dialect::from_name("mysql"), Dialect::MySql);
        assert_eq!(Dialect::from_name("MariaDB"), Dialect::MySql);
    }

    #[test]
    fn test_unknown_name_is_generic() {
        assert_eq!(Dialect::from_name("sqlite"), Dialect::Generic);
        assert_eq!(Dialect::from_name(""), Dialect::Generic);
    }

    #[test]
    fn test_from_dsn() {
        assert_eq!(
            Dialect::from_dsn("postgres://u:p@localhost/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(
            Dialect::from_dsn("postgresql://localhost/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(Dialect::from_dsn("mysql://root@db/app"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_dsn("mariadb://root@db/app"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_dsn("sqlite://file.db"), None);
        assert_eq!(Dialect::from_dsn("not a url"), None);
    }

    #[test]
    fn test_display_round_trips_through_from_name() {
        for dialect in Dialect::ALL {
            assert_eq!(Dialect::from_name(&dialect.to_string()), dialect);
        }
    }
}
