//! Privilege convergence by reset-and-reapply.
//!
//! There is no cheap way to diff the privileges currently held on every
//! object of a schema, so convergence revokes everything of the object type
//! and grants the desired set again. The result is the same whatever the
//! starting point; the price is a short window between the two statements
//! in which the role holds nothing, and the revoke reaches every object of
//! that type in the schema.

use super::grant::{GrantConfig, ObjectType};
use crate::error::{ReconcileError, Result, ident};
use dataapi::Statement;

/// Privilege keywords PostgreSQL accepts on tables
pub const TABLE_PRIVILEGES: [&str; 7] = [
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
];

/// Privilege keywords PostgreSQL accepts on sequences
pub const SEQUENCE_PRIVILEGES: [&str; 3] = ["USAGE", "SELECT", "UPDATE"];

/// Every privilege of the object type; `ALL PRIVILEGES` is read as this
pub const ALL: &str = "ALL";

fn accepted(object_type: ObjectType) -> &'static [&'static str] {
    match object_type {
        ObjectType::Table => &TABLE_PRIVILEGES,
        ObjectType::Sequence => &SEQUENCE_PRIVILEGES,
    }
}

const PRIVILEGES_HELD: &str = "\
SELECT pg_class.relname, array_to_string(array_remove(array_agg(privilege_type), NULL), ',') \
FROM pg_catalog.pg_class \
JOIN pg_catalog.pg_namespace ON pg_namespace.oid = pg_class.relnamespace \
LEFT JOIN (\
SELECT acls.* FROM (\
SELECT relname, relnamespace, relkind, (aclexplode(relacl)).* FROM pg_catalog.pg_class c\
) AS acls \
JOIN pg_catalog.pg_roles ON grantee = pg_roles.oid \
WHERE rolname = :role\
) privs USING (relname, relnamespace, relkind) \
WHERE nspname = :schema AND relkind = :relkind \
GROUP BY pg_class.relname";

/// Upper-case, validate against `object_type` and de-duplicate privileges,
/// keeping first occurrence order
///
/// `ALL` stands alone: PostgreSQL does not accept it inside a list.
pub fn normalize(privileges: &[String], object_type: ObjectType) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(privileges.len());
    for privilege in privileges {
        let words: Vec<String> = privilege
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect();
        let upper = match words.as_slice() {
            [all, rest @ ..] if all == ALL && (rest.is_empty() || rest == ["PRIVILEGES"]) => {
                ALL.to_string()
            }
            _ => words.join(" "),
        };
        if upper != ALL && !accepted(object_type).contains(&upper.as_str()) {
            return Err(ReconcileError::validation(
                "privileges",
                format!("privilege {privilege:?} does not apply to {object_type}s"),
            ));
        }
        if !normalized.contains(&upper) {
            normalized.push(upper);
        }
    }
    if normalized.is_empty() {
        return Err(ReconcileError::validation(
            "privileges",
            "at least one privilege is required",
        ));
    }
    if normalized.len() > 1 && normalized.iter().any(|p| p == ALL) {
        return Err(ReconcileError::validation(
            "privileges",
            "ALL cannot be combined with other privileges",
        ));
    }
    Ok(normalized)
}

/// `REVOKE ALL PRIVILEGES ON ALL <TYPE>S IN SCHEMA <schema> FROM <role>`
pub fn revoke_all(object_type: ObjectType, schema: &str, role: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "REVOKE ALL PRIVILEGES ON ALL {}S IN SCHEMA {} FROM {}",
        object_type.keyword(),
        ident("schema", schema)?,
        ident("role", role)?
    )))
}

/// `GRANT <p1,p2> ON ALL <TYPE> IN SCHEMA <schema> TO <role>`
pub fn grant(privileges: &[String], object_type: ObjectType, schema: &str, role: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "GRANT {} ON ALL {} IN SCHEMA {} TO {}",
        normalize(privileges, object_type)?.join(","),
        object_type.keyword(),
        ident("schema", schema)?,
        ident("role", role)?
    )))
}

/// The revoke/grant pair that converges `config` from any prior privilege set
///
/// Everything is validated before a statement is returned, so a caller never
/// starts the pair with an input the second half would refuse.
pub fn reset_and_reapply(config: &GrantConfig) -> Result<[Statement; 2]> {
    Ok([
        revoke_all(config.object_type, &config.schema, &config.role)?,
        grant(&config.privileges, config.object_type, &config.schema, &config.role)?,
    ])
}

/// Per-relation privileges held by the grant's role in its schema
pub fn privileges_held(config: &GrantConfig) -> Statement {
    Statement::new(PRIVILEGES_HELD)
        .bind("role", config.role.as_str())
        .bind("schema", config.schema.as_str())
        .bind("relkind", config.object_type.relkind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::session::testing::handles;
    use dataapi::Cell;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn grant_config(privileges: &[&str]) -> GrantConfig {
        GrantConfig {
            role: "app".into(),
            database: "app".into(),
            schema: "public".into(),
            object_type: ObjectType::Table,
            privileges: strings(privileges),
            handles: handles(),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(&strings(&["select", "Insert", "SELECT"]), ObjectType::Table).unwrap(),
            ["SELECT", "INSERT"]
        );
    }

    #[test]
    fn test_normalize_rejects_unknown_and_empty() {
        let err = normalize(&strings(&["SELECT; DROP TABLE x"]), ObjectType::Table).unwrap_err();
        assert_eq!(err.kind(), FaultKind::Validation);

        let err = normalize(&[], ObjectType::Table).unwrap_err();
        assert_eq!(err.kind(), FaultKind::Validation);
    }

    #[test]
    fn test_all_privileges_spelling() {
        for spelling in ["ALL", "all privileges", "All  Privileges"] {
            assert_eq!(
                normalize(&strings(&[spelling]), ObjectType::Sequence).unwrap(),
                [ALL]
            );
        }
        let err = normalize(&strings(&["ALL", "SELECT"]), ObjectType::Table).unwrap_err();
        assert_eq!(err.kind(), FaultKind::Validation);
        assert!(normalize(&strings(&["ALL TABLES"]), ObjectType::Table).is_err());
    }

    #[test]
    fn test_privileges_checked_per_object_type() {
        assert!(normalize(&strings(&["USAGE"]), ObjectType::Table).is_err());
        assert!(normalize(&strings(&["TRUNCATE"]), ObjectType::Sequence).is_err());
        assert_eq!(
            normalize(&strings(&["usage", "select"]), ObjectType::Sequence).unwrap(),
            ["USAGE", "SELECT"]
        );
    }

    #[test]
    fn test_table_usage_refused_before_revoke() {
        let err = reset_and_reapply(&grant_config(&["SELECT", "USAGE"])).unwrap_err();
        assert_eq!(err.kind(), FaultKind::Validation);
    }

    #[test]
    fn test_reset_and_reapply_statements() {
        let [revoke, grant] = reset_and_reapply(&grant_config(&["SELECT", "INSERT"])).unwrap();
        assert_eq!(
            revoke.sql,
            "REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA public FROM app"
        );
        assert_eq!(
            grant.sql,
            "GRANT SELECT,INSERT ON ALL TABLE IN SCHEMA public TO app"
        );
    }

    #[test]
    fn test_sequence_keyword() {
        let statement = revoke_all(ObjectType::Sequence, "public", "app").unwrap();
        assert_eq!(
            statement.sql,
            "REVOKE ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public FROM app"
        );
    }

    #[test]
    fn test_quoted_role() {
        let statement = revoke_all(ObjectType::Table, "public", "Report Writer").unwrap();
        assert!(statement.sql.ends_with("FROM \"Report Writer\""));
    }

    #[test]
    fn test_privileges_held_binds_parameters() {
        let mut config = grant_config(&["USAGE"]);
        config.object_type = ObjectType::Sequence;
        let statement = privileges_held(&config);

        let bound: Vec<_> = statement
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.value.clone()))
            .collect();
        assert_eq!(
            bound,
            [
                ("role", Cell::from("app")),
                ("schema", Cell::from("public")),
                ("relkind", Cell::from("S")),
            ]
        );
        assert!(!statement.sql.contains("app"));
    }
}
