//! SQL dialect helpers for the generated SQLx queries and migrations.

use crudforge_schema::{ForeignKey, SqlColumn, SqlSchema, SqlTable, SqlType};

use crate::options::Database;

/// Bind placeholder number `idx` (1-based).
pub fn placeholder(db: Database, idx: usize) -> String {
    match db {
        Database::Postgres => format!("${idx}"),
        Database::Sqlite => format!("?{idx}"),
        Database::Mysql => "?".to_string(),
    }
}

/// Whether `INSERT ... RETURNING *` is available.
pub fn supports_returning(db: Database) -> bool {
    !matches!(db, Database::Mysql)
}

const RESERVED: &[&str] = &[
    "user", "order", "group", "key", "table", "select", "where", "from", "limit", "offset",
    "default", "check", "column", "index", "references", "primary", "desc", "asc", "to",
];

/// Quotes an identifier when it is not a plain lowercase name or is reserved.
pub fn quote_ident(db: Database, name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED.contains(&name);
    match (plain, db) {
        (true, _) => name.to_string(),
        (false, Database::Mysql) => format!("`{name}`"),
        (false, _) => format!("\"{name}\""),
    }
}

/// Comma-separated quoted column list.
pub fn ident_list(db: Database, names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(db, n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_ddl(db: Database, column: &SqlColumn) -> String {
    let ty = &column.sql_type;
    match db {
        Database::Postgres => match ty {
            SqlType::SmallInt if column.auto_increment => "SMALLSERIAL".to_string(),
            SqlType::Integer if column.auto_increment => "SERIAL".to_string(),
            SqlType::BigInt if column.auto_increment => "BIGSERIAL".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Enum(_) => "TEXT".to_string(),
            other => other.to_string(),
        },
        Database::Mysql => match ty {
            SqlType::TimestampTz => "TIMESTAMP".to_string(),
            SqlType::Binary => "BLOB".to_string(),
            SqlType::Uuid => "CHAR(36)".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Varchar(None) => "TEXT".to_string(),
            other => other.to_string(),
        },
        Database::Sqlite => match ty {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "INTEGER",
            SqlType::Real | SqlType::Double => "REAL",
            SqlType::Decimal { .. } => "NUMERIC",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Binary => "BLOB",
            _ => "TEXT",
        }
        .to_string(),
    }
}

/// SQLite only allows AUTOINCREMENT on an inline `INTEGER PRIMARY KEY`.
fn sqlite_inline_key(db: Database, table: &SqlTable, column: &SqlColumn) -> bool {
    db == Database::Sqlite
        && column.auto_increment
        && column.sql_type.is_integer()
        && table.primary_key.len() == 1
        && column.primary_key
}

fn column_ddl(db: Database, table: &SqlTable, column: &SqlColumn) -> String {
    let mut out = format!("{} {}", quote_ident(db, &column.name), type_ddl(db, column));
    if sqlite_inline_key(db, table, column) {
        out.push_str(" PRIMARY KEY AUTOINCREMENT");
        return out;
    }
    if !column.nullable {
        out.push_str(" NOT NULL");
    }
    if column.unique && !column.primary_key {
        out.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    if column.auto_increment && db == Database::Mysql {
        out.push_str(" AUTO_INCREMENT");
    }
    if let (SqlType::Enum(values), Database::Postgres | Database::Sqlite) = (&column.sql_type, db) {
        let values: Vec<String> = values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect();
        out.push_str(&format!(
            " CHECK ({} IN ({}))",
            quote_ident(db, &column.name),
            values.join(", ")
        ));
    }
    out
}

fn foreign_key_ddl(db: Database, fk: &ForeignKey) -> String {
    let mut out = format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        ident_list(db, &fk.columns),
        quote_ident(db, &fk.ref_table),
        ident_list(db, &fk.ref_columns)
    );
    if let Some(action) = fk.on_delete {
        out.push_str(&format!(" ON DELETE {}", action.as_str()));
    }
    if let Some(action) = fk.on_update {
        out.push_str(&format!(" ON UPDATE {}", action.as_str()));
    }
    out
}

/// `CREATE TABLE` for one table in the given dialect.
pub fn create_table(db: Database, table: &SqlTable) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_ddl(db, table, c))
        .collect();

    let inline_key = table
        .columns
        .iter()
        .any(|c| sqlite_inline_key(db, table, c));
    if !table.primary_key.is_empty() && !inline_key {
        lines.push(format!("PRIMARY KEY ({})", ident_list(db, &table.primary_key)));
    }
    for unique in &table.unique_constraints {
        if unique.len() > 1 {
            lines.push(format!("UNIQUE ({})", ident_list(db, unique)));
        }
    }
    for fk in &table.foreign_keys {
        lines.push(foreign_key_ddl(db, fk));
    }

    let body: Vec<String> = lines.iter().map(|l| format!("    {l}")).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        quote_ident(db, &table.name),
        body.join(",\n")
    )
}

/// The initial migration: every table of the schema in declaration order.
pub fn initial_migration(db: Database, schema: &SqlSchema) -> String {
    let mut out = String::from("-- Generated by crudforge\n");
    for table in &schema.tables {
        out.push('\n');
        out.push_str(&create_table(db, table));
    }
    out
}
