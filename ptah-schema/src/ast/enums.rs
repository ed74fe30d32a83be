//! Enumerated types.

use serde::{Deserialize, Serialize};

/// An enum declared through a field with `type="ENUM"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Name given to the enum backing `table.column`.
    pub fn name_for(table: &str, column: &str) -> String {
        format!("enum_{table}_{column}")
    }

    /// Values rendered as a quoted SQL list: `'a', 'b'`.
    pub fn quoted_values(&self) -> String {
        quote_values(&self.values)
    }
}

/// Render values as a comma separated list of SQL string literals.
pub fn quote_values(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_for() {
        assert_eq!(EnumType::name_for("users", "status"), "enum_users_status");
    }

    #[test]
    fn test_quoted_values_escapes() {
        let e = EnumType::new("enum_t_c", ["active", "it's"]);
        assert_eq!(e.quoted_values(), "'active', 'it''s'");
    }
}
