//! SQL type to language type mapping.

use crudforge_schema::{SqlColumn, SqlType};

/// Maps normalized SQL types to one language's type names.
pub trait TypeMapper {
    /// The non-null type for `ty`.
    fn map(&self, ty: &SqlType) -> String;

    /// Wraps a mapped type in the language's nullable form.
    fn nullable(&self, ty: String) -> String;

    /// The type of a column, nullable unless it is NOT NULL or a primary key.
    fn column_type(&self, column: &SqlColumn) -> String {
        let ty = self.map(&column.sql_type);
        if column.nullable && !column.primary_key {
            self.nullable(ty)
        } else {
            ty
        }
    }

    /// The import (or crate, for Rust) a mapped type needs.
    fn import_for(&self, _ty: &SqlType) -> Option<&'static str> {
        None
    }
}

/// Max length for string validation, from `VARCHAR(n)` / `CHAR(n)`.
pub fn max_length(column: &SqlColumn) -> Option<u32> {
    column.sql_type.max_length()
}

/// A JSON literal accepted for the type, used in generated API tests.
pub fn sample_json(ty: &SqlType) -> String {
    match ty {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "1".to_string(),
        SqlType::Decimal { .. } => "\"1.5\"".to_string(),
        SqlType::Real | SqlType::Double => "1.5".to_string(),
        SqlType::Boolean => "true".to_string(),
        SqlType::Char(Some(n)) | SqlType::Varchar(Some(n)) => {
            let text: String = "example".chars().take(*n as usize).collect();
            format!("\"{text}\"")
        }
        SqlType::Date => "\"2024-01-01\"".to_string(),
        SqlType::Time => "\"12:00:00\"".to_string(),
        SqlType::Timestamp => "\"2024-01-01T12:00:00\"".to_string(),
        SqlType::TimestampTz => "\"2024-01-01T12:00:00Z\"".to_string(),
        SqlType::Uuid => "\"7c9e6679-7425-40de-944b-e07fc1f90ae7\"".to_string(),
        SqlType::Json => "{}".to_string(),
        SqlType::Binary => "[1, 2, 3]".to_string(),
        SqlType::Enum(values) => match values.first() {
            Some(v) => format!("\"{}\"", v.replace('"', "\\\"")),
            None => "\"\"".to_string(),
        },
        SqlType::Char(None) | SqlType::Varchar(None) | SqlType::Text | SqlType::Other(_) => {
            "\"example\"".to_string()
        }
    }
}

pub struct JavaTypes;

impl TypeMapper for JavaTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt => "Short",
            SqlType::Integer => "Integer",
            SqlType::BigInt => "Long",
            SqlType::Decimal { .. } => "BigDecimal",
            SqlType::Real => "Float",
            SqlType::Double => "Double",
            SqlType::Boolean => "Boolean",
            SqlType::Date => "LocalDate",
            SqlType::Time => "LocalTime",
            SqlType::Timestamp => "LocalDateTime",
            SqlType::TimestampTz => "OffsetDateTime",
            SqlType::Uuid => "UUID",
            SqlType::Binary => "byte[]",
            SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Json
            | SqlType::Enum(_)
            | SqlType::Other(_) => "String",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        ty
    }

    fn import_for(&self, ty: &SqlType) -> Option<&'static str> {
        match ty {
            SqlType::Decimal { .. } => Some("java.math.BigDecimal"),
            SqlType::Date => Some("java.time.LocalDate"),
            SqlType::Time => Some("java.time.LocalTime"),
            SqlType::Timestamp => Some("java.time.LocalDateTime"),
            SqlType::TimestampTz => Some("java.time.OffsetDateTime"),
            SqlType::Uuid => Some("java.util.UUID"),
            _ => None,
        }
    }
}

pub struct CSharpTypes;

impl TypeMapper for CSharpTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt => "short",
            SqlType::Integer => "int",
            SqlType::BigInt => "long",
            SqlType::Decimal { .. } => "decimal",
            SqlType::Real => "float",
            SqlType::Double => "double",
            SqlType::Boolean => "bool",
            SqlType::Date => "DateOnly",
            SqlType::Time => "TimeOnly",
            SqlType::Timestamp => "DateTime",
            SqlType::TimestampTz => "DateTimeOffset",
            SqlType::Uuid => "Guid",
            SqlType::Binary => "byte[]",
            SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Json
            | SqlType::Enum(_)
            | SqlType::Other(_) => "string",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        format!("{ty}?")
    }
}

pub struct GoTypes;

impl TypeMapper for GoTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt => "int16",
            SqlType::Integer => "int32",
            SqlType::BigInt => "int64",
            SqlType::Decimal { .. } | SqlType::Double => "float64",
            SqlType::Real => "float32",
            SqlType::Boolean => "bool",
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz => {
                "time.Time"
            }
            SqlType::Uuid => "uuid.UUID",
            SqlType::Json => "json.RawMessage",
            SqlType::Binary => "[]byte",
            SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Enum(_)
            | SqlType::Other(_) => "string",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        // Slices already have a nil value.
        if ty.starts_with("[]") || ty == "json.RawMessage" {
            ty
        } else {
            format!("*{ty}")
        }
    }

    fn import_for(&self, ty: &SqlType) -> Option<&'static str> {
        match ty {
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz => {
                Some("time")
            }
            SqlType::Uuid => Some("github.com/google/uuid"),
            SqlType::Json => Some("encoding/json"),
            _ => None,
        }
    }
}

pub struct RustTypes;

impl TypeMapper for RustTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt => "i16",
            SqlType::Integer => "i32",
            SqlType::BigInt => "i64",
            SqlType::Decimal { .. } => "rust_decimal::Decimal",
            SqlType::Real => "f32",
            SqlType::Double => "f64",
            SqlType::Boolean => "bool",
            SqlType::Date => "chrono::NaiveDate",
            SqlType::Time => "chrono::NaiveTime",
            SqlType::Timestamp => "chrono::NaiveDateTime",
            SqlType::TimestampTz => "chrono::DateTime<chrono::Utc>",
            SqlType::Uuid => "uuid::Uuid",
            SqlType::Json => "serde_json::Value",
            SqlType::Binary => "Vec<u8>",
            SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Enum(_)
            | SqlType::Other(_) => "String",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        format!("Option<{ty}>")
    }

    /// The crate a mapped type comes from.
    fn import_for(&self, ty: &SqlType) -> Option<&'static str> {
        match ty {
            SqlType::Decimal { .. } => Some("rust_decimal"),
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz => {
                Some("chrono")
            }
            SqlType::Uuid => Some("uuid"),
            SqlType::Json => Some("serde_json"),
            _ => None,
        }
    }
}

pub struct TypeScriptTypes;

impl TypeMapper for TypeScriptTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt
            | SqlType::Integer
            | SqlType::BigInt
            | SqlType::Real
            | SqlType::Double => "number",
            SqlType::Boolean => "boolean",
            SqlType::Date | SqlType::Timestamp | SqlType::TimestampTz => "Date",
            SqlType::Json => "Record<string, unknown>",
            SqlType::Binary => "Buffer",
            SqlType::Decimal { .. }
            | SqlType::Time
            | SqlType::Uuid
            | SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Enum(_)
            | SqlType::Other(_) => "string",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        format!("{ty} | null")
    }
}

pub struct PhpTypes;

impl TypeMapper for PhpTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "int",
            SqlType::Real | SqlType::Double => "float",
            SqlType::Boolean => "bool",
            SqlType::Json => "array",
            _ => "string",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        format!("?{ty}")
    }
}

pub struct PythonTypes;

impl TypeMapper for PythonTypes {
    fn map(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "int",
            SqlType::Decimal { .. } => "Decimal",
            SqlType::Real | SqlType::Double => "float",
            SqlType::Boolean => "bool",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::Timestamp | SqlType::TimestampTz => "datetime",
            SqlType::Uuid => "UUID",
            SqlType::Json => "dict",
            SqlType::Binary => "bytes",
            SqlType::Char(_)
            | SqlType::Varchar(_)
            | SqlType::Text
            | SqlType::Enum(_)
            | SqlType::Other(_) => "str",
        }
        .to_string()
    }

    fn nullable(&self, ty: String) -> String {
        format!("Optional[{ty}]")
    }

    fn import_for(&self, ty: &SqlType) -> Option<&'static str> {
        match ty {
            SqlType::Decimal { .. } => Some("from decimal import Decimal"),
            SqlType::Date => Some("from datetime import date"),
            SqlType::Time => Some("from datetime import time"),
            SqlType::Timestamp | SqlType::TimestampTz => Some("from datetime import datetime"),
            SqlType::Uuid => Some("from uuid import UUID"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(ty: SqlType, nullable: bool) -> SqlColumn {
        let mut c = SqlColumn::new("c", ty);
        c.nullable = nullable;
        c
    }

    #[test]
    fn test_table_of_mappings() {
        let decimal = SqlType::Decimal {
            precision: Some(10),
            scale: Some(2),
        };
        assert_eq!(JavaTypes.map(&decimal), "BigDecimal");
        assert_eq!(CSharpTypes.map(&decimal), "decimal");
        assert_eq!(GoTypes.map(&decimal), "float64");
        assert_eq!(RustTypes.map(&decimal), "rust_decimal::Decimal");
        assert_eq!(TypeScriptTypes.map(&decimal), "string");
        assert_eq!(PhpTypes.map(&decimal), "string");
        assert_eq!(PythonTypes.map(&decimal), "Decimal");

        assert_eq!(JavaTypes.map(&SqlType::TimestampTz), "OffsetDateTime");
        assert_eq!(CSharpTypes.map(&SqlType::Date), "DateOnly");
        assert_eq!(GoTypes.map(&SqlType::Json), "json.RawMessage");
        assert_eq!(RustTypes.map(&SqlType::TimestampTz), "chrono::DateTime<chrono::Utc>");
        assert_eq!(TypeScriptTypes.map(&SqlType::Json), "Record<string, unknown>");
        assert_eq!(PhpTypes.map(&SqlType::Json), "array");
        assert_eq!(PythonTypes.map(&SqlType::Uuid), "UUID");
    }

    #[test]
    fn test_nullable_forms() {
        let nullable = column(SqlType::Integer, true);
        assert_eq!(JavaTypes.column_type(&nullable), "Integer");
        assert_eq!(CSharpTypes.column_type(&nullable), "int?");
        assert_eq!(GoTypes.column_type(&nullable), "*int32");
        assert_eq!(RustTypes.column_type(&nullable), "Option<i32>");
        assert_eq!(TypeScriptTypes.column_type(&nullable), "number | null");
        assert_eq!(PhpTypes.column_type(&nullable), "?int");
        assert_eq!(PythonTypes.column_type(&nullable), "Optional[int]");

        assert_eq!(GoTypes.column_type(&column(SqlType::Binary, true)), "[]byte");
        assert_eq!(RustTypes.column_type(&column(SqlType::Text, false)), "String");
    }

    #[test]
    fn test_primary_key_is_never_nullable() {
        let mut id = column(SqlType::BigInt, true);
        id.primary_key = true;
        assert_eq!(RustTypes.column_type(&id), "i64");
        assert_eq!(CSharpTypes.column_type(&id), "long");
    }

    #[test]
    fn test_imports() {
        assert_eq!(JavaTypes.import_for(&SqlType::Uuid), Some("java.util.UUID"));
        assert_eq!(GoTypes.import_for(&SqlType::Timestamp), Some("time"));
        assert_eq!(RustTypes.import_for(&SqlType::Date), Some("chrono"));
        assert_eq!(PythonTypes.import_for(&SqlType::TimestampTz), Some("from datetime import datetime"));
        assert_eq!(CSharpTypes.import_for(&SqlType::Uuid), None);
    }

    #[test]
    fn test_validation_helpers() {
        let mut email = column(SqlType::Varchar(Some(255)), false);
        assert_eq!(max_length(&email), Some(255));
        assert!(email.is_required());
        email.nullable = true;
        assert!(!email.is_required());
        assert_eq!(max_length(&column(SqlType::Text, false)), None);
    }
}
