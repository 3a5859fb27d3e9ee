//! Relationship resolution.
//!
//! Relationships are derived from foreign keys in a single pass over the
//! tables in declaration order. Every single-column foreign key yields two
//! relationships (one per side), every join table yields a many-to-many pair.

use crate::inflect::{pluralize, singularize, to_snake_case};
use crate::{ForeignKey, SqlSchema, SqlTable};

/// The cardinality of a relationship, seen from the side that holds the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipKind {
    ManyToOne,
    OneToMany,
    OneToOne,
    ManyToMany,
}

impl RelationshipKind {
    /// Returns true if the property holds a collection.
    pub fn is_collection(&self) -> bool {
        matches!(self, RelationshipKind::OneToMany | RelationshipKind::ManyToMany)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ManyToOne => "many-to-one",
            RelationshipKind::OneToMany => "one-to-many",
            RelationshipKind::OneToOne => "one-to-one",
            RelationshipKind::ManyToMany => "many-to-many",
        }
    }
}

/// One side of a relationship between two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRelationship {
    pub kind: RelationshipKind,
    /// The table that carries the property.
    pub table: String,
    /// The table on the other side.
    pub target_table: String,
    /// The foreign key column. For many-to-many this is the join table column
    /// referencing `table`.
    pub column: String,
    /// The referenced column on the parent side.
    pub target_column: String,
    /// True when `table` physically holds `column`. For many-to-many the
    /// side named by the join table's first foreign key owns the mapping.
    pub owner: bool,
    /// The join table, for many-to-many.
    pub join_table: Option<String>,
    /// The join table column referencing `target_table`, for many-to-many.
    pub inverse_column: Option<String>,
    /// Property name in snake_case.
    pub property: String,
}

/// Strips a trailing `_id`, `_fk` or `Id` from a foreign key column name.
///
/// Returns `None` when nothing would remain.
pub fn strip_key_suffix(column: &str) -> Option<String> {
    let stripped = ["_id", "_fk", "Id", "_ID", "_FK"]
        .iter()
        .find_map(|suffix| column.strip_suffix(suffix))
        .unwrap_or(column);

    if stripped.is_empty()
        || stripped.eq_ignore_ascii_case("id")
        || stripped.eq_ignore_ascii_case("fk")
    {
        return None;
    }
    Some(to_snake_case(stripped))
}

/// Returns the snake_case singular name of a table (`blog_posts` → `blog_post`).
pub fn singular_name(table: &str) -> String {
    singularize(&to_snake_case(table))
}

/// Resolves every relationship in `schema`.
pub fn resolve(schema: &SqlSchema) -> Vec<TableRelationship> {
    let mut out = Vec::new();

    for table in &schema.tables {
        if table.is_join_table() {
            resolve_join_table(schema, table, &mut out);
        } else {
            for fk in &table.foreign_keys {
                if fk.is_single_column() {
                    resolve_foreign_key(schema, table, fk, &mut out);
                }
            }
        }
    }

    out
}

fn resolve_join_table(schema: &SqlSchema, join: &SqlTable, out: &mut Vec<TableRelationship>) {
    let (a, b) = (&join.foreign_keys[0], &join.foreign_keys[1]);
    let (Some(left), Some(right)) = (schema.table(&a.ref_table), schema.table(&b.ref_table)) else {
        return;
    };

    let self_referential = left.name.eq_ignore_ascii_case(&right.name);
    for (side, other, owner) in [(a, b, true), (b, a, false)] {
        let (table, target) = if owner { (left, right) } else { (right, left) };
        // Both sides live on one table, so name each after the column it reads.
        let property = if self_referential {
            let stem = strip_key_suffix(&other.columns[0])
                .unwrap_or_else(|| to_snake_case(&other.columns[0]));
            pluralize(&stem)
        } else {
            pluralize(&singular_name(&target.name))
        };
        out.push(TableRelationship {
            kind: RelationshipKind::ManyToMany,
            table: table.name.clone(),
            target_table: target.name.clone(),
            column: side.columns[0].clone(),
            target_column: other.ref_columns[0].clone(),
            owner,
            join_table: Some(join.name.clone()),
            inverse_column: Some(other.columns[0].clone()),
            property,
        });
    }
}

fn resolve_foreign_key(
    schema: &SqlSchema,
    table: &SqlTable,
    fk: &ForeignKey,
    out: &mut Vec<TableRelationship>,
) {
    let Some(parent) = schema.table(&fk.ref_table) else {
        return;
    };
    let column = &fk.columns[0];
    let target_column = &fk.ref_columns[0];
    let one_to_one = table.is_unique_column(column);
    let stripped = strip_key_suffix(column);

    let child_property = stripped
        .clone()
        .unwrap_or_else(|| singular_name(&parent.name));

    out.push(TableRelationship {
        kind: if one_to_one {
            RelationshipKind::OneToOne
        } else {
            RelationshipKind::ManyToOne
        },
        table: table.name.clone(),
        target_table: parent.name.clone(),
        column: column.clone(),
        target_column: target_column.clone(),
        owner: true,
        join_table: None,
        inverse_column: None,
        property: child_property,
    });

    let child_singular = singular_name(&table.name);
    let base = if one_to_one {
        child_singular
    } else {
        pluralize(&child_singular)
    };
    let fks_to_parent = table
        .foreign_keys
        .iter()
        .filter(|other| other.ref_table.eq_ignore_ascii_case(&parent.name))
        .count();
    let parent_property = match stripped {
        Some(prefix) if fks_to_parent > 1 => format!("{prefix}_{base}"),
        _ => base,
    };

    out.push(TableRelationship {
        kind: if one_to_one {
            RelationshipKind::OneToOne
        } else {
            RelationshipKind::OneToMany
        },
        table: parent.name.clone(),
        target_table: table.name.clone(),
        column: column.clone(),
        target_column: target_column.clone(),
        owner: false,
        join_table: None,
        inverse_column: None,
        property: parent_property,
    });
}
