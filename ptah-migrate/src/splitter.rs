//! Split SQL scripts into individual statements.
//!
//! Semicolons only terminate a statement outside of string literals, quoted
//! identifiers, dollar-quoted bodies and comments. Backslash escapes inside
//! string literals are only honored for MySQL.

use ptah_schema::Dialect;

/// Split a script into trimmed statements without their trailing `;`.
///
/// Fragments that are empty or contain only comments are dropped.
pub fn split_statements(sql: &str, dialect: Dialect) -> Vec<String> {
    let backslash_escapes = dialect == Dialect::MySql;
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    let finish = |from: usize, to: usize, has_code: bool, out: &mut Vec<String>| {
        let text = sql[from..to].trim();
        if has_code && !text.is_empty() {
            out.push(text.to_string());
        }
    };

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                has_code = true;
                i = skip_quoted(bytes, i, backslash_escapes);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
            }
            b'$' => {
                has_code = true;
                match dollar_tag(bytes, i) {
                    Some(tag_len) => {
                        let tag = &bytes[i..i + tag_len];
                        i = find(bytes, i + tag_len, tag).map_or(bytes.len(), |p| p + tag_len);
                    }
                    None => i += 1,
                }
            }
            b';' => {
                finish(start, i, has_code, &mut statements);
                start = i + 1;
                has_code = false;
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                has_code = true;
                i += 1;
            }
        }
    }
    finish(start, bytes.len(), has_code, &mut statements);
    statements
}

/// Index just past the closing quote. Doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], open: usize, backslash_escapes: bool) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if backslash_escapes && quote == b'\'' && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        i += 1;
    }
    bytes.len()
}

/// Length of a `$tag$` opener at `at`, if one starts there.
fn dollar_tag(bytes: &[u8], at: usize) -> Option<usize> {
    let mut i = at + 1;
    if bytes.get(i) == Some(&b'$') {
        return Some(2);
    }
    match bytes.get(i) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    while let Some(&b) = bytes.get(i) {
        if b == b'$' {
            return Some(i - at + 1);
        }
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        i += 1;
    }
    None
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_split() {
        assert_eq!(
            split_statements("CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);", Dialect::Postgres),
            vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]
        );
    }

    #[test]
    fn test_semicolon_in_string() {
        assert_eq!(
            split_statements("INSERT INTO t (s) VALUES ('a;b');", Dialect::Postgres),
            vec!["INSERT INTO t (s) VALUES ('a;b')"]
        );
        assert_eq!(
            split_statements("INSERT INTO t VALUES ('it''s;here'); SELECT 1", Dialect::Postgres),
            vec!["INSERT INTO t VALUES ('it''s;here')", "SELECT 1"]
        );
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(
            split_statements("SELECT \"a;b\" FROM `c;d`; SELECT 2;", Dialect::Postgres),
            vec!["SELECT \"a;b\" FROM `c;d`", "SELECT 2"]
        );
    }

    #[test]
    fn test_comments() {
        let sql = "-- header; not a statement\nSELECT 1; /* block; comment */ SELECT 2;\n-- trailing;";
        assert_eq!(
            split_statements(sql, Dialect::Postgres),
            vec!["-- header; not a statement\nSELECT 1", "/* block; comment */ SELECT 2"]
        );
    }

    #[test]
    fn test_dollar_quoted_body() {
        let sql = r#"
DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'app') THEN
        CREATE ROLE app LOGIN;
    END IF;
END
$$;
CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql;
SELECT $1;
"#;
        let stmts = split_statements(sql, Dialect::Postgres);
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].starts_with("DO $$"));
        assert!(stmts[0].ends_with("$$"));
        assert!(stmts[1].contains("SELECT 1; $body$"));
        assert_eq!(stmts[2], "SELECT $1");
    }

    #[test]
    fn test_backslash_is_literal_in_standard_strings() {
        let sql = "INSERT INTO paths VALUES ('C:\\'); SELECT 1;";
        assert_eq!(
            split_statements(sql, Dialect::Postgres),
            vec!["INSERT INTO paths VALUES ('C:\\')", "SELECT 1"]
        );
        assert_eq!(split_statements(sql, Dialect::Generic).len(), 2);
    }

    #[test]
    fn test_mysql_backslash_escapes() {
        let sql = "INSERT INTO t VALUES ('it\\'s;here'); SELECT 1;";
        assert_eq!(
            split_statements(sql, Dialect::MySql),
            vec!["INSERT INTO t VALUES ('it\\'s;here')", "SELECT 1"]
        );
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert!(split_statements("", Dialect::Postgres).is_empty());
        assert!(split_statements(" ; ;\n;", Dialect::Postgres).is_empty());
        assert!(split_statements("-- only a comment\n/* and another */", Dialect::Postgres).is_empty());
    }

    #[test]
    fn test_unterminated_constructs_do_not_panic() {
        assert_eq!(split_statements("SELECT 'open", Dialect::Postgres), vec!["SELECT 'open"]);
        assert_eq!(split_statements("SELECT 1 /* open", Dialect::Postgres), vec!["SELECT 1 /* open"]);
        assert_eq!(split_statements("DO $$ open", Dialect::Postgres), vec!["DO $$ open"]);
    }
}
