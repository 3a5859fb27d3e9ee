//! The entity view of a schema that every target renders.
//!
//! Only crud tables become entities. Join tables surface as many-to-many
//! [`Relation`]s on both sides, and relationships pointing at tables that are
//! not entities are dropped.

use crudforge_schema::{
    RelationshipKind, SqlColumn, SqlSchema, SqlTable, SqlType, TableRelationship,
};
use tracing::debug;

use crate::naming::{identifier, to_camel_case, to_pascal_case, EntityNames};
use crate::types::sample_json;

/// A column with its names in each casing.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub column: &'a SqlColumn,
    pub snake: String,
    pub camel: String,
    pub pascal: String,
}

impl<'a> Field<'a> {
    fn new(column: &'a SqlColumn) -> Self {
        let snake = identifier(&column.name, "f");
        Self {
            camel: to_camel_case(&snake),
            pascal: to_pascal_case(&snake),
            snake,
            column,
        }
    }

    /// The column name as declared.
    pub fn name(&self) -> &str {
        &self.column.name
    }
}

/// A relationship property on an entity.
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationshipKind,
    pub snake: String,
    pub camel: String,
    pub pascal: String,
    /// Names of the entity on the other side.
    pub target: EntityNames,
    /// Foreign key column, or the join table column pointing at this entity.
    pub column: String,
    pub target_column: String,
    /// Whether this side holds the foreign key (or owns the join table).
    pub owner: bool,
    pub join_table: Option<String>,
    pub inverse_column: Option<String>,
    /// The property on the other side that maps back to this one, if any.
    pub mapped_by: Option<String>,
}

impl Relation {
    pub fn is_collection(&self) -> bool {
        self.kind.is_collection()
    }

    /// camelCase of [`Relation::mapped_by`].
    pub fn mapped_by_camel(&self) -> Option<String> {
        self.mapped_by.as_deref().map(to_camel_case)
    }

    /// PascalCase of [`Relation::mapped_by`].
    pub fn mapped_by_pascal(&self) -> Option<String> {
        self.mapped_by.as_deref().map(to_pascal_case)
    }
}

/// A crud table with everything the templates need.
#[derive(Debug, Clone)]
pub struct Entity<'a> {
    pub table: &'a SqlTable,
    pub names: EntityNames,
    /// The single primary key column.
    pub id: Field<'a>,
    /// Every column in declaration order, including the primary key.
    pub fields: Vec<Field<'a>>,
    pub relations: Vec<Relation>,
}

impl<'a> Entity<'a> {
    /// Columns accepted in create/update requests.
    pub fn writable(&self) -> impl Iterator<Item = &Field<'a>> {
        self.fields.iter().filter(|f| !f.column.is_generated())
    }

    /// Columns other than the primary key.
    pub fn non_id(&self) -> impl Iterator<Item = &Field<'a>> {
        self.fields.iter().filter(|f| !f.column.primary_key)
    }

    /// The to-one relation that owns `column`, if any.
    pub fn relation_for_column(&self, column: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| {
            r.owner && !r.is_collection() && r.column.eq_ignore_ascii_case(column)
        })
    }

    /// Whether any field uses the given type.
    pub fn has_type(&self, pred: impl Fn(&SqlType) -> bool) -> bool {
        self.fields.iter().any(|f| pred(&f.column.sql_type))
    }

    /// A JSON create payload with every required field, keyed by `key`.
    ///
    /// `None` when a required field is a foreign key, since a valid value
    /// depends on rows that may not exist.
    pub fn sample_payload(&self, key: impl Fn(&Field<'a>) -> String) -> Option<String> {
        let mut pairs = Vec::new();
        for field in self.writable().filter(|f| f.column.is_required()) {
            if self.table.foreign_key_for(&field.column.name).is_some() {
                return None;
            }
            pairs.push(format!(
                "\"{}\": {}",
                key(field),
                sample_json(&field.column.sql_type)
            ));
        }
        Some(format!("{{{}}}", pairs.join(", ")))
    }
}

/// Builds the entity list for a schema, in table declaration order.
pub fn entities(schema: &SqlSchema) -> Vec<Entity<'_>> {
    let relationships = schema.relationships();
    let mut out = Vec::new();

    for table in &schema.tables {
        if table.is_join_table() {
            debug!(table = %table.name, "join table mapped as many-to-many");
            continue;
        }
        let Some(pk) = table.primary_key_column() else {
            continue;
        };

        let relations = relationships
            .iter()
            .filter(|r| r.table.eq_ignore_ascii_case(&table.name))
            .filter(|r| {
                schema
                    .table(&r.target_table)
                    .is_some_and(|t| t.is_crud_table())
            })
            .map(|r| relation(r, &relationships))
            .collect();

        out.push(Entity {
            table,
            names: EntityNames::for_table(table),
            id: Field::new(pk),
            fields: table.columns.iter().map(Field::new).collect(),
            relations,
        });
    }

    out
}

fn relation(rel: &TableRelationship, all: &[TableRelationship]) -> Relation {
    let inverse = all.iter().find(|other| {
        other.table.eq_ignore_ascii_case(&rel.target_table)
            && other.target_table.eq_ignore_ascii_case(&rel.table)
            && match rel.kind {
                RelationshipKind::ManyToMany => {
                    other.join_table == rel.join_table
                        && rel.inverse_column.as_deref() == Some(other.column.as_str())
                }
                _ => {
                    other.kind != RelationshipKind::ManyToMany
                        && other.column == rel.column
                        && other.owner != rel.owner
                }
            }
    });

    let snake = identifier(&rel.property, "r");
    Relation {
        kind: rel.kind,
        camel: to_camel_case(&snake),
        pascal: to_pascal_case(&snake),
        snake,
        target: EntityNames::new(&rel.target_table),
        column: rel.column.clone(),
        target_column: rel.target_column.clone(),
        owner: rel.owner,
        join_table: rel.join_table.clone(),
        inverse_column: rel.inverse_column.clone(),
        mapped_by: inverse.map(|r| identifier(&r.property, "r")),
    }
}

/// Table holding login accounts for targets with authentication enabled.
///
/// Named `auth_accounts` so it cannot collide with a user table.
pub fn accounts_table() -> SqlTable {
    let mut id = SqlColumn::new("id", SqlType::BigInt);
    id.primary_key = true;
    id.nullable = false;
    id.auto_increment = true;
    let mut username = SqlColumn::new("username", SqlType::Varchar(Some(100)));
    username.nullable = false;
    username.unique = true;
    let mut password_hash = SqlColumn::new("password_hash", SqlType::Varchar(Some(255)));
    password_hash.nullable = false;
    let mut created_at = SqlColumn::new("created_at", SqlType::Timestamp);
    created_at.nullable = false;
    created_at.default = Some("CURRENT_TIMESTAMP".to_string());

    let mut table = SqlTable::new(ACCOUNTS_TABLE);
    table.columns = vec![id, username, password_hash, created_at];
    table.primary_key = vec!["id".to_string()];
    table
}

/// Name of the accounts table.
pub const ACCOUNTS_TABLE: &str = "auth_accounts";


#[cfg(test)]
mod tests {
    use super::test_support::blog;
    use super::*;

    #[test]
    fn test_entities_skip_join_and_keyless_tables() {
        let schema = blog();
        let names: Vec<String> = entities(&schema)
            .iter()
            .map(|e| e.names.pascal.clone())
            .collect();
        assert_eq!(names, vec!["User", "Post", "Tag", "Comment"]);
    }

    #[test]
    fn test_writable_fields() {
        let schema = blog();
        let all = entities(&schema);
        let post = &all[1];
        let writable: Vec<&str> = post.writable().map(|f| f.name()).collect();
        assert_eq!(writable, vec!["author_id", "title", "body", "published"]);
        assert_eq!(post.id.name(), "id");
        assert_eq!(post.non_id().count(), 5);
    }

    #[test]
    fn test_relations_are_paired() {
        let schema = blog();
        let all = entities(&schema);
        let post = &all[1];

        let author = post.relation_for_column("author_id").unwrap();
        assert_eq!(author.kind, RelationshipKind::ManyToOne);
        assert_eq!(author.camel, "author");
        assert_eq!(author.target.pascal, "User");
        assert_eq!(author.mapped_by.as_deref(), Some("posts"));

        let tags = post
            .relations
            .iter()
            .find(|r| r.kind == RelationshipKind::ManyToMany)
            .unwrap();
        assert_eq!(tags.snake, "tags");
        assert!(tags.owner);
        assert_eq!(tags.join_table.as_deref(), Some("post_tags"));
        assert_eq!(tags.mapped_by.as_deref(), Some("posts"));

        let user = &all[0];
        let posts = user.relations.iter().find(|r| r.snake == "posts").unwrap();
        assert_eq!(posts.kind, RelationshipKind::OneToMany);
        assert_eq!(posts.mapped_by.as_deref(), Some("author"));
    }

    #[test]
    fn test_sample_payload() {
        let schema = blog();
        let all = entities(&schema);
        assert_eq!(
            all[0].sample_payload(|f| f.camel.clone()).as_deref(),
            Some(r#"{"email": "example"}"#)
        );
        assert_eq!(all[1].sample_payload(|f| f.snake.clone()), None);
        assert_eq!(
            all[2].sample_payload(|f| f.snake.clone()).as_deref(),
            Some(r#"{"name": "example"}"#)
        );
    }
}
