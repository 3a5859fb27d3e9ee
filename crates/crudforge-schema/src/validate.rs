//! Schema validator.
//!
//! Checks a [`SqlSchema`] for structural errors before code is generated.
//! Errors block generation; warnings describe tables or columns that the
//! generators skip or degrade.

use std::collections::HashSet;

use crate::{SqlSchema, SqlTable, SqlType};

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Whether this blocks generation (`Error`) or is advisory (`Warning`).
    pub severity: Severity,
    /// Location in the schema (`table` or `table.column`).
    pub location: String,
    /// Human-readable description of the problem.
    pub message: String,
}

/// Severity of a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "[{}] {}: {}", tag, self.location, self.message)
    }
}

impl ValidationIssue {
    fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location: location.into(),
            message: message.into(),
        }
    }

    fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Validate a [`SqlSchema`] and return all problems found.
pub fn validate(schema: &SqlSchema) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_tables = HashSet::new();

    for table in &schema.tables {
        if !seen_tables.insert(table.name.to_ascii_lowercase()) {
            issues.push(ValidationIssue::error(
                &table.name,
                format!("duplicate table '{}'", table.name),
            ));
        }
        validate_columns(table, &mut issues);
        validate_primary_key(table, &mut issues);
        validate_foreign_keys(schema, table, &mut issues);
    }

    issues
}

/// Returns `true` if `validate()` produces no `Error`-severity issues.
pub fn is_valid(schema: &SqlSchema) -> bool {
    !validate(schema)
        .iter()
        .any(|i| i.severity == Severity::Error)
}

fn validate_columns(table: &SqlTable, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for column in &table.columns {
        let loc = format!("{}.{}", table.name, column.name);
        if !seen.insert(column.name.to_ascii_lowercase()) {
            issues.push(ValidationIssue::error(
                &loc,
                format!("duplicate column '{}'", column.name),
            ));
        }
        if let SqlType::Other(name) = &column.sql_type {
            issues.push(ValidationIssue::warning(
                &loc,
                format!("unrecognised type '{name}' is generated as a string"),
            ));
        }
    }
}

fn validate_primary_key(table: &SqlTable, issues: &mut Vec<ValidationIssue>) {
    for name in &table.primary_key {
        if table.column(name).is_none() {
            issues.push(ValidationIssue::error(
                format!("{}.{}", table.name, name),
                format!("primary key names unknown column '{name}'"),
            ));
        }
    }

    if table.is_join_table() {
        return;
    }
    match table.primary_key.len() {
        0 => issues.push(ValidationIssue::warning(
            &table.name,
            "table has no primary key and is skipped",
        )),
        1 => {}
        _ => issues.push(ValidationIssue::warning(
            &table.name,
            "composite primary key is not supported and the table is skipped",
        )),
    }
}

fn validate_foreign_keys(schema: &SqlSchema, table: &SqlTable, issues: &mut Vec<ValidationIssue>) {
    for fk in &table.foreign_keys {
        let loc = format!("{}.{}", table.name, fk.columns.join(","));

        for column in &fk.columns {
            if table.column(column).is_none() {
                issues.push(ValidationIssue::error(
                    &loc,
                    format!("foreign key names unknown column '{column}'"),
                ));
            }
        }

        if fk.columns.len() != fk.ref_columns.len() {
            issues.push(ValidationIssue::error(
                &loc,
                format!(
                    "foreign key has {} column(s) but references {}",
                    fk.columns.len(),
                    fk.ref_columns.len()
                ),
            ));
        }

        match schema.table(&fk.ref_table) {
            None => issues.push(ValidationIssue::error(
                &loc,
                format!("foreign key references unknown table '{}'", fk.ref_table),
            )),
            Some(parent) => {
                for column in &fk.ref_columns {
                    if parent.column(column).is_none() {
                        issues.push(ValidationIssue::error(
                            &loc,
                            format!(
                                "foreign key references unknown column '{}.{}'",
                                parent.name, column
                            ),
                        ));
                    }
                }
            }
        }

        if fk.columns.len() > 1 {
            issues.push(ValidationIssue::warning(
                &loc,
                "composite foreign key is not mapped to a relationship",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn errors(schema: &SqlSchema) -> Vec<ValidationIssue> {
        validate(schema)
            .into_iter()
            .filter(|i| i.severity == Severity::Error)
            .collect()
    }

    #[test]
    fn test_valid_schema() {
        let schema = blog();
        assert!(is_valid(&schema));
        assert!(validate(&schema).is_empty());
    }

    #[test]
    fn test_duplicate_table() {
        let mut schema = blog();
        schema.tables.push(table("Users", vec![pk("id")], vec![]));
        let errs = errors(&schema);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("duplicate table"));
        assert!(!is_valid(&schema));
    }

    #[test]
    fn test_duplicate_column() {
        let schema = SqlSchema {
            tables: vec![table(
                "t",
                vec![pk("id"), col("name", SqlType::Text), col("NAME", SqlType::Text)],
                vec![],
            )],
        };
        let errs = errors(&schema);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].location, "t.NAME");
    }

    #[test]
    fn test_unknown_primary_key_column() {
        let mut t = table("t", vec![col("a", SqlType::Text)], vec![]);
        t.primary_key = vec!["missing".to_string()];
        let errs = errors(&SqlSchema { tables: vec![t] });
        assert!(errs[0].message.contains("unknown column 'missing'"));
    }

    #[test]
    fn test_foreign_key_errors() {
        let mut bad_column = fk("ghost_id", "users");
        bad_column.ref_columns = vec!["nope".to_string()];
        let schema = SqlSchema {
            tables: vec![
                table("users", vec![pk("id")], vec![]),
                table(
                    "posts",
                    vec![pk("id"), col("author_id", SqlType::BigInt)],
                    vec![fk("author_id", "authors"), bad_column],
                ),
            ],
        };
        let messages: Vec<String> = errors(&schema).into_iter().map(|i| i.message).collect();
        assert!(messages.iter().any(|m| m.contains("unknown table 'authors'")));
        assert!(messages.iter().any(|m| m.contains("unknown column 'ghost_id'")));
        assert!(messages.iter().any(|m| m.contains("'users.nope'")));
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut mismatched = fk("author_id", "users");
        mismatched.ref_columns.push("email".to_string());
        let schema = SqlSchema {
            tables: vec![
                table("users", vec![pk("id"), col("email", SqlType::Text)], vec![]),
                table(
                    "posts",
                    vec![pk("id"), col("author_id", SqlType::BigInt)],
                    vec![mismatched],
                ),
            ],
        };
        assert!(errors(&schema)
            .iter()
            .any(|i| i.message.contains("1 column(s) but references 2")));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let schema = SqlSchema {
            tables: vec![
                table("logs", vec![col("line", SqlType::Other("xml".into()))], vec![]),
            ],
        };
        let issues = validate(&schema);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert!(is_valid(&schema));
    }

    #[test]
    fn test_composite_primary_key_warning() {
        let mut t = table("t", vec![col("a", SqlType::Integer), col("b", SqlType::Integer)], vec![]);
        t.primary_key = vec!["a".to_string(), "b".to_string()];
        let issues = validate(&SqlSchema { tables: vec![t] });
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("composite primary key"));
    }

    #[test]
    fn test_display() {
        let issue = ValidationIssue::error("users.id", "boom");
        assert_eq!(issue.to_string(), "[ERROR] users.id: boom");
    }
}
