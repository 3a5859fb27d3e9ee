//! Identifier casing and entity naming.
//!
//! The case conversion and inflection rules live in
//! [`crudforge_schema::inflect`] because relationship resolution names
//! properties with them. They are re-exported here for the generators.

pub use crudforge_schema::inflect::{
    pluralize, singularize, split_words, to_camel_case, to_kebab_case, to_pascal_case,
    to_screaming_snake_case, to_snake_case,
};
use crudforge_schema::SqlTable;

/// A snake_case name that is a valid identifier in every target language.
///
/// Characters outside `[A-Za-z0-9_]` become `_`. A name starting with a
/// digit gets `prefix` in front, and a name with nothing left is `prefix`.
pub fn identifier(name: &str, prefix: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let snake = to_snake_case(&cleaned);
    match snake.chars().next() {
        None => prefix.to_string(),
        Some(c) if c.is_ascii_digit() => format!("{prefix}_{snake}"),
        Some(_) => snake,
    }
}

/// Every spelling of a table's entity name that the templates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNames {
    /// The table name as declared.
    pub table: String,
    /// `order_item`
    pub snake: String,
    /// `order_items`
    pub snake_plural: String,
    /// `OrderItem`
    pub pascal: String,
    /// `OrderItems`
    pub pascal_plural: String,
    /// `orderItem`
    pub camel: String,
    /// `orderItems`
    pub camel_plural: String,
    /// `order-item`
    pub kebab: String,
    /// `order-items`, the REST route segment.
    pub route: String,
}

impl EntityNames {
    /// Names for `table`.
    pub fn for_table(table: &SqlTable) -> Self {
        Self::new(&table.name)
    }

    /// Names for a table called `table_name`.
    pub fn new(table_name: &str) -> Self {
        let snake = singularize(&identifier(table_name, "t"));
        let snake_plural = pluralize(&snake);
        Self {
            table: table_name.to_string(),
            pascal: to_pascal_case(&snake),
            pascal_plural: to_pascal_case(&snake_plural),
            camel: to_camel_case(&snake),
            camel_plural: to_camel_case(&snake_plural),
            kebab: to_kebab_case(&snake),
            route: to_kebab_case(&snake_plural),
            snake,
            snake_plural,
        }
    }
}
