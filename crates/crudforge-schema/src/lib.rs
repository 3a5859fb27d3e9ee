//! Schema model for crudforge.
//!
//! A [`SqlSchema`] is the parsed form of a set of `CREATE TABLE` statements:
//! tables, their columns and constraints. Relationship metadata is derived
//! from the foreign keys on demand (see [`relationship`]).

pub mod inflect;
pub mod relationship;
pub mod validate;

use std::fmt;

pub use relationship::{RelationshipKind, TableRelationship};
pub use validate::{is_valid, validate, Severity, ValidationIssue};

/// Column names treated as audit timestamps.
pub const AUDIT_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// Normalized SQL column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Real,
    Double,
    Boolean,
    Char(Option<u32>),
    Varchar(Option<u32>),
    Text,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Binary,
    /// MySQL-style `ENUM('a', 'b')`.
    Enum(Vec<String>),
    /// Anything not recognised, kept verbatim (lowercased).
    Other(String),
}

impl SqlType {
    /// Maps a type name and its numeric arguments to a normalized type.
    ///
    /// `name` may be a multi-word spelling such as `double precision` or
    /// `timestamp with time zone`; matching ignores case.
    pub fn from_sql(name: &str, args: &[u32]) -> SqlType {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "smallint" | "int2" | "smallserial" | "serial2" => SqlType::SmallInt,
            "tinyint" if args.first() == Some(&1) => SqlType::Boolean,
            "tinyint" => SqlType::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" | "serial4" => SqlType::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => SqlType::BigInt,
            "decimal" | "numeric" | "dec" | "money" | "number" => SqlType::Decimal {
                precision: args.first().copied(),
                scale: args.get(1).copied(),
            },
            "real" | "float4" => SqlType::Real,
            "float" | "float8" | "double" | "double precision" => SqlType::Double,
            "boolean" | "bool" | "bit" => SqlType::Boolean,
            "char" | "character" | "nchar" | "bpchar" => SqlType::Char(args.first().copied()),
            "varchar" | "character varying" | "nvarchar" | "varchar2" | "nvarchar2" => {
                SqlType::Varchar(args.first().copied())
            }
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "ntext" | "citext"
            | "string" => SqlType::Text,
            "date" => SqlType::Date,
            "time" | "time without time zone" | "timetz" | "time with time zone" => SqlType::Time,
            "timestamp" | "datetime" | "datetime2" | "timestamp without time zone"
            | "smalldatetime" => SqlType::Timestamp,
            "timestamptz" | "timestamp with time zone" | "datetimeoffset" => SqlType::TimestampTz,
            "uuid" | "uniqueidentifier" => SqlType::Uuid,
            "json" | "jsonb" => SqlType::Json,
            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary"
            | "image" => SqlType::Binary,
            _ => SqlType::Other(lower),
        }
    }

    /// Returns true if the type name implies an auto-incrementing column.
    pub fn is_serial_alias(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "serial" | "bigserial" | "smallserial" | "serial2" | "serial4" | "serial8"
        )
    }

    /// Returns true if `name` is a type name this module recognises.
    pub fn is_known_name(name: &str) -> bool {
        !matches!(SqlType::from_sql(name, &[]), SqlType::Other(_))
            || name.eq_ignore_ascii_case("enum")
    }

    /// Returns true for integral types.
    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    /// Returns true for character types.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            SqlType::Char(_) | SqlType::Varchar(_) | SqlType::Text | SqlType::Enum(_)
        )
    }

    /// Returns true for date/time types.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::TimestampTz
        )
    }

    /// Returns the maximum length for bounded character types.
    pub fn max_length(&self) -> Option<u32> {
        match self {
            SqlType::Char(len) | SqlType::Varchar(len) => *len,
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "DECIMAL({p}, {s})"),
            SqlType::Decimal {
                precision: Some(p),
                scale: None,
            } => write!(f, "DECIMAL({p})"),
            SqlType::Decimal { .. } => write!(f, "DECIMAL"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Double => write!(f, "DOUBLE PRECISION"),
            SqlType::Boolean => write!(f, "BOOLEAN"),
            SqlType::Char(Some(n)) => write!(f, "CHAR({n})"),
            SqlType::Char(None) => write!(f, "CHAR"),
            SqlType::Varchar(Some(n)) => write!(f, "VARCHAR({n})"),
            SqlType::Varchar(None) => write!(f, "VARCHAR"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Time => write!(f, "TIME"),
            SqlType::Timestamp => write!(f, "TIMESTAMP"),
            SqlType::TimestampTz => write!(f, "TIMESTAMPTZ"),
            SqlType::Uuid => write!(f, "UUID"),
            SqlType::Json => write!(f, "JSON"),
            SqlType::Binary => write!(f, "BYTEA"),
            SqlType::Enum(values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "''")))
                    .collect();
                write!(f, "ENUM({})", quoted.join(", "))
            }
            SqlType::Other(name) => write!(f, "{}", name.to_ascii_uppercase()),
        }
    }
}

/// Action taken on the referencing rows when a referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    /// Returns the DDL spelling of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// A column in a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlColumn {
    /// The column name as written (quotes removed).
    pub name: String,
    /// The normalized column type.
    pub sql_type: SqlType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether the column carries a single-column UNIQUE constraint.
    pub unique: bool,
    /// Whether the database generates values (AUTO_INCREMENT, SERIAL, IDENTITY).
    pub auto_increment: bool,
    /// The raw DEFAULT expression, if any.
    pub default: Option<String>,
    /// Source span for error reporting (start, end).
    pub span: Option<(usize, usize)>,
}

impl SqlColumn {
    /// Creates a nullable column with no constraints.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
            span: None,
        }
    }

    /// Returns true if this is an audit timestamp column (`created_at`, `updated_at`).
    pub fn is_audit(&self) -> bool {
        AUDIT_COLUMNS
            .iter()
            .any(|a| self.name.eq_ignore_ascii_case(a))
    }

    /// Returns true if values for this column are produced by the database.
    pub fn is_generated(&self) -> bool {
        self.auto_increment
            || (self.primary_key && self.default.is_some())
            || (self.is_audit() && self.default.is_some())
    }

    /// Returns true if clients must supply a value on create.
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none() && !self.is_generated()
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// The constraint name, if declared with `CONSTRAINT name`.
    pub name: Option<String>,
    /// The referencing columns.
    pub columns: Vec<String>,
    /// The referenced table.
    pub ref_table: String,
    /// The referenced columns. Empty until resolved when written without a column list.
    pub ref_columns: Vec<String>,
    /// ON DELETE action.
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action.
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKey {
    /// Returns true if this key spans a single column.
    pub fn is_single_column(&self) -> bool {
        self.columns.len() == 1 && self.ref_columns.len() == 1
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlTable {
    /// The table name (without schema qualifier).
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<SqlColumn>,
    /// Primary key column names in key order.
    pub primary_key: Vec<String>,
    /// Foreign keys, column-level and table-level.
    pub foreign_keys: Vec<ForeignKey>,
    /// Multi-column UNIQUE constraints.
    pub unique_constraints: Vec<Vec<String>>,
    /// Source span for error reporting (start, end).
    pub span: Option<(usize, usize)>,
}

impl SqlTable {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Looks up a column by name, ignoring case.
    pub fn column(&self, name: &str) -> Option<&SqlColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a column by name for modification, ignoring case.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut SqlColumn> {
        self.columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the primary key column when the key spans exactly one column.
    pub fn primary_key_column(&self) -> Option<&SqlColumn> {
        match self.primary_key.as_slice() {
            [single] => self.column(single),
            _ => None,
        }
    }

    /// Returns the columns a client may write (everything not generated).
    pub fn writable_columns(&self) -> impl Iterator<Item = &SqlColumn> {
        self.columns.iter().filter(|c| !c.is_generated())
    }

    /// Returns the single-column foreign key whose referencing column is `column`.
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| {
            fk.is_single_column() && fk.columns[0].eq_ignore_ascii_case(column)
        })
    }

    /// Returns true if `column` is unique on its own (UNIQUE or sole primary key).
    pub fn is_unique_column(&self, column: &str) -> bool {
        let column_unique = self.column(column).map(|c| c.unique).unwrap_or(false);
        let sole_pk = self.primary_key.len() == 1 && self.primary_key[0].eq_ignore_ascii_case(column);
        let constraint = self
            .unique_constraints
            .iter()
            .any(|u| u.len() == 1 && u[0].eq_ignore_ascii_case(column));
        column_unique || sole_pk || constraint
    }

    /// Returns true if this table only links two other tables.
    ///
    /// A join table has exactly two single-column foreign keys and no other
    /// columns besides an auto-generated surrogate key and audit timestamps.
    pub fn is_join_table(&self) -> bool {
        if self.foreign_keys.len() != 2 || !self.foreign_keys.iter().all(|fk| fk.is_single_column()) {
            return false;
        }
        let fk_columns: Vec<&str> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.columns[0].as_str())
            .collect();
        if fk_columns[0].eq_ignore_ascii_case(fk_columns[1]) {
            return false;
        }
        self.columns.iter().all(|c| {
            fk_columns.iter().any(|f| c.name.eq_ignore_ascii_case(f))
                || (c.primary_key && c.is_generated())
                || c.is_audit()
        })
    }

    /// Returns true if this table gets CRUD artifacts.
    pub fn is_crud_table(&self) -> bool {
        !self.is_join_table() && self.primary_key_column().is_some()
    }
}

/// The root model representing an entire schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlSchema {
    /// All tables in declaration order.
    pub tables: Vec<SqlTable>,
}

impl SqlSchema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a table by name, ignoring case.
    pub fn table(&self, name: &str) -> Option<&SqlTable> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a table by name for modification, ignoring case.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut SqlTable> {
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Returns the tables that get CRUD artifacts, in declaration order.
    pub fn crud_tables(&self) -> impl Iterator<Item = &SqlTable> {
        self.tables.iter().filter(|t| t.is_crud_table())
    }

    /// Returns the join tables, in declaration order.
    pub fn join_tables(&self) -> impl Iterator<Item = &SqlTable> {
        self.tables.iter().filter(|t| t.is_join_table())
    }

    /// Resolves all relationships in the schema.
    pub fn relationships(&self) -> Vec<TableRelationship> {
        relationship::resolve(self)
    }

    /// Returns the relationships whose property lives on `table`.
    pub fn relationships_for(&self, table: &str) -> Vec<TableRelationship> {
        relationship::resolve(self)
            .into_iter()
            .filter(|r| r.table.eq_ignore_ascii_case(table))
            .collect()
    }
}
