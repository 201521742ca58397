//! Identifier and literal quoting.
//!
//! DDL statements (`CREATE ROLE`, `GRANT`, `ALTER DATABASE`, ...) cannot take
//! bound parameters, so names coming from a manifest are interpolated. They
//! only ever reach SQL text through these functions.
//!
//! [`quote_ident`] follows PostgreSQL's own `quote_ident()`: a name that
//! would survive unquoted (lowercase, no special characters, not a keyword)
//! is emitted bare, anything else is double-quoted.

use crate::error::{Error, Result};

/// Longest identifier PostgreSQL keeps without truncating (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Keywords that cannot appear bare where an identifier is expected.
const KEYWORDS: &[&str] = &[
    // reserved
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "system_user", "table", "then",
    "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
    // type or function names
    "authorization", "binary", "collation", "concurrently", "cross", "current_schema",
    "freeze", "full", "ilike", "inner", "is", "isnull", "join", "left", "like", "natural",
    "notnull", "outer", "overlaps", "right", "similar", "tablesample", "verbose",
    // column names
    "between", "bigint", "bit", "boolean", "char", "character", "coalesce", "dec", "decimal",
    "exists", "extract", "float", "greatest", "grouping", "inout", "int", "integer",
    "interval", "least", "national", "nchar", "none", "normalize", "nullif", "numeric", "out",
    "overlay", "position", "precision", "real", "row", "setof", "smallint", "substring", "time",
    "timestamp", "treat", "trim", "values", "varchar",
];

/// Quote a name for use as an SQL identifier.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentifier`] for empty names, names containing
/// NUL, and names PostgreSQL would truncate.
///
/// # Example
///
/// ```
/// use dataapi::quote_ident;
///
/// assert_eq!(quote_ident("public").unwrap(), "public");
/// assert_eq!(quote_ident("App Users").unwrap(), "\"App Users\"");
/// assert_eq!(quote_ident("user").unwrap(), "\"user\"");
/// assert_eq!(quote_ident("a\"b").unwrap(), "\"a\"\"b\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(invalid(name, "identifier is empty"));
    }
    if name.contains('\0') {
        return Err(invalid(name, "identifier contains a NUL byte"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(name, "identifier is longer than 63 bytes"));
    }

    if is_bare_safe(name) {
        Ok(name.to_string())
    } else {
        Ok(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Quote a value as an SQL string literal.
///
/// Values containing a backslash use the escape-string form so the result
/// does not depend on `standard_conforming_strings`.
///
/// ```
/// use dataapi::quote_literal;
///
/// assert_eq!(quote_literal("secret"), "'secret'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// assert_eq!(quote_literal("a\\b"), "E'a\\\\b'");
/// ```
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

fn is_bare_safe(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !KEYWORDS.contains(&name)
}

fn invalid(name: &str, reason: &'static str) -> Error {
    Error::InvalidIdentifier {
        identifier: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_stay_bare() {
        assert_eq!(quote_ident("app").unwrap(), "app");
        assert_eq!(quote_ident("public").unwrap(), "public");
        assert_eq!(quote_ident("_staging2").unwrap(), "_staging2");
        assert_eq!(quote_ident("app$1").unwrap(), "app$1");
    }

    #[test]
    fn test_names_needing_quotes() {
        assert_eq!(quote_ident("App").unwrap(), "\"App\"");
        assert_eq!(quote_ident("1st").unwrap(), "\"1st\"");
        assert_eq!(quote_ident("my-db").unwrap(), "\"my-db\"");
        assert_eq!(quote_ident("select").unwrap(), "\"select\"");
    }

    #[test]
    fn test_injection_is_contained() {
        let quoted = quote_ident("x\"; DROP DATABASE prod; --").unwrap();
        assert_eq!(quoted, "\"x\"\"; DROP DATABASE prod; --\"");
    }

    #[test]
    fn test_rejects_unquotable_names() {
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a\0b").is_err());
        assert!(quote_ident(&"a".repeat(64)).is_err());
        assert!(quote_ident(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(quote_literal(""), "''");
        assert_eq!(quote_literal("o'clock"), "'o''clock'");
        assert_eq!(quote_literal("c:\\tmp"), "E'c:\\\\tmp'");
    }
}
