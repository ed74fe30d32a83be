//! Per-dialect attribute overrides (`platform.<dialect>.<key>`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// Overrides keyed by platform name, then attribute key.
///
/// Platform names are stored lowercased. The first value set for a
/// platform/key pair wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOverrides {
    entries: IndexMap<String, IndexMap<String, String>>,
}

impl PlatformOverrides {
    /// Create an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an override. Returns `false` if the pair was already set.
    pub fn insert(&mut self, platform: &str, key: &str, value: impl Into<String>) -> bool {
        let keys = self.entries.entry(platform.to_ascii_lowercase()).or_default();
        if keys.contains_key(key) {
            return false;
        }
        keys.insert(key.to_string(), value.into());
        true
    }

    /// Look up an override for a dialect, trying each of its platform aliases.
    pub fn get(&self, dialect: Dialect, key: &str) -> Option<&str> {
        dialect
            .override_keys()
            .iter()
            .filter_map(|platform| self.entries.get(*platform))
            .find_map(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Look up an override by raw platform name.
    pub fn get_platform(&self, platform: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&platform.to_ascii_lowercase())
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Whether no overrides are set.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(IndexMap::is_empty)
    }

    /// Iterate `(platform, key, value)` triples in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.entries.iter().flat_map(|(platform, keys)| {
            keys.iter()
                .map(move |(k, v)| (platform.as_str(), k.as_str(), v.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_alias() {
        let mut o = PlatformOverrides::new();
        o.insert("mariadb", "type", "LONGTEXT");
        o.insert("pg", "ops", "gin_trgm_ops");

        assert_eq!(o.get(Dialect::MySql, "type"), Some("LONGTEXT"));
        assert_eq!(o.get(Dialect::Postgres, "ops"), Some("gin_trgm_ops"));
        assert_eq!(o.get(Dialect::Postgres, "type"), None);
        assert_eq!(o.get(Dialect::Generic, "type"), None);
    }

    #[test]
    fn test_first_value_wins() {
        let mut o = PlatformOverrides::new();
        assert!(o.insert("mysql", "type", "JSON"));
        assert!(!o.insert("MySQL", "type", "TEXT"));
        assert_eq!(o.get_platform("mysql", "type"), Some("JSON"));
    }

    #[test]
    fn test_iter_order() {
        let mut o = PlatformOverrides::new();
        o.insert("postgres", "type", "JSONB");
        o.insert("mysql", "type", "JSON");
        o.insert("mysql", "check", "JSON_VALID(data)");

        let all: Vec<_> = o.iter().collect();
        assert_eq!(
            all,
            vec![
                ("postgres", "type", "JSONB"),
                ("mysql", "type", "JSON"),
                ("mysql", "check", "JSON_VALID(data)"),
            ]
        );
        assert!(!o.is_empty());
        assert!(PlatformOverrides::new().is_empty());
    }
}
