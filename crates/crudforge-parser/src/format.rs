//! Canonical DDL printer.

use crudforge_lexer::{lex, Token};
use crudforge_schema::{ForeignKey, SqlColumn, SqlSchema, SqlTable};

/// Renders a schema as canonical `CREATE TABLE` statements.
///
/// Keys are always written as table constraints, so every foreign key
/// (inline, table-level or added by `ALTER TABLE`) ends up inside its table.
pub fn format_schema(schema: &SqlSchema) -> String {
    schema
        .tables
        .iter()
        .map(format_table)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_table(table: &SqlTable) -> String {
    let mut lines: Vec<String> = table.columns.iter().map(format_column).collect();

    if !table.primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", ident_list(&table.primary_key)));
    }
    for unique in &table.unique_constraints {
        lines.push(format!("UNIQUE ({})", ident_list(unique)));
    }
    for fk in &table.foreign_keys {
        lines.push(format_foreign_key(fk));
    }

    let mut out = format!("CREATE TABLE {} (\n", quote_ident(&table.name));
    out.push_str(
        &lines
            .iter()
            .map(|l| format!("    {l}"))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    out.push_str("\n);\n");
    out
}

fn format_column(column: &SqlColumn) -> String {
    let mut out = format!("{} {}", quote_ident(&column.name), column.sql_type);
    if !column.nullable {
        out.push_str(" NOT NULL");
    }
    if column.unique {
        out.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    if column.auto_increment {
        out.push_str(" AUTO_INCREMENT");
    }
    out
}

fn format_foreign_key(fk: &ForeignKey) -> String {
    let mut out = String::new();
    if let Some(name) = &fk.name {
        out.push_str(&format!("CONSTRAINT {} ", quote_ident(name)));
    }
    out.push_str(&format!(
        "FOREIGN KEY ({}) REFERENCES {}",
        ident_list(&fk.columns),
        quote_ident(&fk.ref_table)
    ));
    if !fk.ref_columns.is_empty() {
        out.push_str(&format!(" ({})", ident_list(&fk.ref_columns)));
    }
    if let Some(action) = fk.on_delete {
        out.push_str(&format!(" ON DELETE {}", action.as_str()));
    }
    if let Some(action) = fk.on_update {
        out.push_str(&format!(" ON UPDATE {}", action.as_str()));
    }
    out
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Double-quotes a name unless it lexes as a single plain identifier.
fn quote_ident(name: &str) -> String {
    let plain = matches!(
        lex(name).as_deref(),
        Ok([single]) if matches!(&single.token, Token::Ident(n) if n == name)
    );
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;

    use super::*;

    fn without_spans(mut schema: SqlSchema) -> SqlSchema {
        for table in &mut schema.tables {
            table.span = None;
            for column in &mut table.columns {
                column.span = None;
            }
        }
        schema
    }

    #[test]
    fn test_format_simple_table() {
        let schema = parse("create table users (id serial primary key, email varchar(100) not null unique);")
            .unwrap();
        assert_eq!(
            format_schema(&schema),
            "CREATE TABLE users (\n    id INTEGER NOT NULL AUTO_INCREMENT,\n    email VARCHAR(100) NOT NULL UNIQUE,\n    PRIMARY KEY (id)\n);\n"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("Order Items"), "\"Order Items\"");
        assert_eq!(quote_ident("key"), "\"key\"");
        assert_eq!(quote_ident("table"), "\"table\"");
    }

    #[test]
    fn test_format_round_trip() {
        let source = r#"
            CREATE TYPE mood AS ENUM ('sad', 'happy');
            CREATE TABLE users (
                id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                email VARCHAR(255) NOT NULL,
                mood mood,
                score DOUBLE PRECISION DEFAULT 0.5,
                seen TIMESTAMP WITH TIME ZONE,
                tags TEXT[],
                "key" TEXT,
                UNIQUE (email)
            );
            CREATE TABLE posts (
                id SERIAL PRIMARY KEY,
                author_id BIGINT NOT NULL REFERENCES users ON DELETE CASCADE,
                price NUMERIC(10, 2),
                created_at TIMESTAMP DEFAULT now()
            );
            ALTER TABLE posts ADD CONSTRAINT fk_other FOREIGN KEY (id) REFERENCES users (id) ON UPDATE SET NULL;
        "#;
        let schema = parse(source).unwrap();
        let formatted = format_schema(&schema);
        let reparsed = parse(&formatted).unwrap();
        assert_eq!(without_spans(reparsed), without_spans(schema));
        assert_eq!(format_schema(&parse(&formatted).unwrap()), formatted);
    }
}
