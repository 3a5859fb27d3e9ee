//! Python base pass - SQLAlchemy models, pydantic schemas and the
//! settings/database plumbing.

use crudforge_schema::{RelationshipKind, SqlColumn, SqlSchema, SqlTable, SqlType};

use crate::model::{entities, Entity, Field, Relation};
use crate::naming::to_snake_case;
use crate::pass::{GenerationContext, Pass};
use crate::python::{
    add_requirement, attr, database_url, driver, py_name, render_requirements, Imports,
};
use crate::types::{max_length, PythonTypes, TypeMapper};
use crate::CodegenError;

/// Python base pass that generates `app/models`, `app/schemas`, settings,
/// the database session and project files.
pub struct PythonBasePass;

impl Pass for PythonBasePass {
    fn name(&self) -> &'static str {
        "python-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        for entity in &entities {
            let snake = &entity.names.snake;
            ctx.set_file(format!("app/models/{snake}.py"), generate_model(entity));
            ctx.set_file(format!("app/schemas/{snake}.py"), generate_schemas(entity));
        }

        let join_tables: Vec<&SqlTable> = schema.join_tables().collect();
        if !join_tables.is_empty() {
            ctx.set_file("app/models/associations.py", generate_associations(&join_tables));
        }
        ctx.set_file(
            "app/models/__init__.py",
            generate_models_init(&entities, &join_tables),
        );

        ctx.set_file("app/__init__.py", "");
        ctx.set_file("app/schemas/__init__.py", "");
        ctx.set_file("app/schemas/page.py", PAGE_PY);
        ctx.set_file("app/database.py", DATABASE_PY);
        ctx.set_file(".gitignore", "__pycache__/\n*.pyc\n.venv/\n.env\n*.db\nuploads/\n");
        render_config(ctx);

        add_requirement(ctx, "fastapi", "==0.115.0");
        add_requirement(ctx, "pydantic", "==2.9.2");
        add_requirement(ctx, "pydantic-settings", "==2.5.2");
        add_requirement(ctx, "sqlalchemy", "==2.0.35");
        add_requirement(ctx, "uvicorn[standard]", "==0.30.6");
        if let Some((name, pin)) = driver(ctx.options.database) {
            add_requirement(ctx, name, pin);
        }
        render_requirements(ctx);
        Ok(())
    }
}

const PAGE_PY: &str = r#"from typing import Generic, TypeVar

from pydantic import BaseModel

DEFAULT_PAGE_SIZE = 20
MAX_PAGE_SIZE = 100

T = TypeVar("T")


class Page(BaseModel, Generic[T]):
    items: list[T]
    page: int
    page_size: int
    total: int


def clamp_page(page: int, page_size: int) -> tuple[int, int]:
    """Clamps the page to at least 1 and the size to 1..MAX_PAGE_SIZE."""
    return max(page, 1), min(max(page_size, 1), MAX_PAGE_SIZE)
"#;

const DATABASE_PY: &str = r#"from collections.abc import Iterator

from sqlalchemy import create_engine
from sqlalchemy.orm import DeclarativeBase, Session, sessionmaker

from app.config import get_settings

settings = get_settings()
connect_args = {"check_same_thread": False} if settings.database_url.startswith("sqlite") else {}
engine = create_engine(settings.database_url, pool_pre_ping=True, connect_args=connect_args)
SessionLocal = sessionmaker(bind=engine, autoflush=False, expire_on_commit=False)


class Base(DeclarativeBase):
    pass


def get_db() -> Iterator[Session]:
    with SessionLocal() as session:
        yield session
"#;

/// Renders `app/config.py`. Settings for auth and storage appear once the
/// feature passes set their flags.
pub(crate) fn render_config(ctx: &mut GenerationContext) {
    let mut extra = String::new();
    if ctx.has_metadata("has:auth") {
        extra.push_str("    jwt_secret: str = \"change-me\"\n    jwt_expire_minutes: int = 60 * 24\n");
    }
    if ctx.has_metadata("has:storage") {
        extra.push_str("    upload_dir: str = \"uploads\"\n    max_upload_bytes: int = 10 * 1024 * 1024\n");
    }
    let config = format!(
        r#"from functools import lru_cache

from pydantic_settings import BaseSettings, SettingsConfigDict


class Settings(BaseSettings):
    model_config = SettingsConfigDict(env_file=".env", extra="ignore")

    app_name: str = "{name}"
    database_url: str = "{url}"
    api_prefix: str = "{prefix}"
    log_level: str = "INFO"
{extra}

@lru_cache
def get_settings() -> Settings:
    return Settings()
"#,
        name = ctx.options.pascal_name(),
        url = database_url(&ctx.options),
        prefix = ctx.options.api_prefix,
    );
    ctx.set_file("app/config.py", config);
}

fn sa_type(table: &SqlTable, column: &SqlColumn, imports: &mut Imports) -> String {
    let mut import = |name: &str| imports.add("sqlalchemy", name);
    let auto = column.primary_key && column.auto_increment;
    match &column.sql_type {
        SqlType::SmallInt if auto => {
            import("Integer");
            import("SmallInteger");
            "SmallInteger().with_variant(Integer, \"sqlite\")".to_string()
        }
        SqlType::BigInt if auto => {
            import("Integer");
            import("BigInteger");
            "BigInteger().with_variant(Integer, \"sqlite\")".to_string()
        }
        SqlType::SmallInt => {
            import("SmallInteger");
            "SmallInteger".to_string()
        }
        SqlType::Integer => {
            import("Integer");
            "Integer".to_string()
        }
        SqlType::BigInt => {
            import("BigInteger");
            "BigInteger".to_string()
        }
        SqlType::Decimal { precision, scale } => {
            import("Numeric");
            match (precision, scale) {
                (Some(p), Some(s)) => format!("Numeric({p}, {s})"),
                (Some(p), None) => format!("Numeric({p})"),
                _ => "Numeric".to_string(),
            }
        }
        SqlType::Real => {
            import("Float");
            "Float".to_string()
        }
        SqlType::Double => {
            import("Double");
            "Double".to_string()
        }
        SqlType::Boolean => {
            import("Boolean");
            "Boolean".to_string()
        }
        SqlType::Char(Some(n)) | SqlType::Varchar(Some(n)) => {
            import("String");
            format!("String({n})")
        }
        SqlType::Char(None) | SqlType::Varchar(None) => {
            import("String");
            "String".to_string()
        }
        SqlType::Date => {
            import("Date");
            "Date".to_string()
        }
        SqlType::Time => {
            import("Time");
            "Time".to_string()
        }
        SqlType::Timestamp => {
            import("DateTime");
            "DateTime".to_string()
        }
        SqlType::TimestampTz => {
            import("DateTime");
            "DateTime(timezone=True)".to_string()
        }
        SqlType::Uuid => {
            import("Uuid");
            "Uuid".to_string()
        }
        SqlType::Json => {
            import("JSON");
            "JSON".to_string()
        }
        SqlType::Binary => {
            import("LargeBinary");
            "LargeBinary".to_string()
        }
        SqlType::Enum(values) => {
            import("Enum");
            let values: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
            format!(
                "Enum({}, name=\"{}_{}\")",
                values.join(", "),
                table.name,
                column.name
            )
        }
        SqlType::Text | SqlType::Other(_) => {
            import("Text");
            "Text".to_string()
        }
    }
}

fn python_default(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        return Some("True".to_string());
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some("False".to_string());
    }
    if raw.parse::<f64>().is_ok() {
        return Some(raw.to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(format!("{:?}", raw[1..raw.len() - 1].replace("''", "'")));
    }
    None
}

fn is_now(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("current_timestamp") || raw.eq_ignore_ascii_case("now()")
}

/// Positional and keyword arguments shared by `mapped_column` and `Column`.
fn column_args(table: &SqlTable, column: &SqlColumn, imports: &mut Imports) -> Vec<String> {
    let mut args = vec![sa_type(table, column, imports)];
    if let Some(fk) = table.foreign_key_for(&column.name) {
        imports.add("sqlalchemy", "ForeignKey");
        let target = fk.ref_columns.first().map(String::as_str).unwrap_or("id");
        let mut fk_args = format!("\"{}.{target}\"", fk.ref_table);
        if let Some(action) = fk.on_delete {
            fk_args.push_str(&format!(", ondelete=\"{}\"", action.as_str()));
        }
        args.push(format!("ForeignKey({fk_args})"));
    }
    if column.primary_key {
        args.push("primary_key=True".to_string());
        if column.sql_type.is_integer() && !column.is_generated() {
            args.push("autoincrement=False".to_string());
        }
        if column.sql_type == SqlType::Uuid && column.is_generated() {
            imports.add("uuid", "uuid4");
            args.push("default=uuid4".to_string());
        }
    } else if column.nullable {
        args.push("nullable=True".to_string());
    }
    if column.unique && !column.primary_key {
        args.push("unique=True".to_string());
    }
    if let Some(default) = column.default.as_deref() {
        if is_now(default) {
            imports.add("sqlalchemy", "func");
            args.push("server_default=func.now()".to_string());
        } else if let Some(value) = python_default(default) {
            args.push(format!("default={value}"));
        }
    }
    if column.name.eq_ignore_ascii_case("updated_at") {
        imports.add("sqlalchemy", "func");
        args.push("onupdate=func.now()".to_string());
    }
    args
}

fn relation_attr(rel: &Relation, entity: &Entity<'_>, imports: &mut Imports) -> Option<String> {
    let target = &rel.target.pascal;
    let back = rel
        .mapped_by
        .as_deref()
        .map(|m| format!("back_populates=\"{}\"", py_name(m)));
    let self_ref = rel.target.table.eq_ignore_ascii_case(&entity.names.table);
    let mut args: Vec<String> = Vec::new();

    let annotation = match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => {
            let fk = entity
                .fields
                .iter()
                .find(|f| f.name().eq_ignore_ascii_case(&rel.column))?;
            args.extend(back);
            args.push(format!("foreign_keys=[{}]", attr(fk)));
            if self_ref {
                args.push(format!("remote_side=[{}]", attr(&entity.id)));
            }
            if fk.column.nullable {
                imports.add("typing", "Optional");
                format!("Optional[\"{target}\"]")
            } else {
                format!("\"{target}\"")
            }
        }
        RelationshipKind::ManyToOne => return None,
        RelationshipKind::OneToOne | RelationshipKind::OneToMany => {
            args.push(back?);
            args.push(format!(
                "foreign_keys=\"{target}.{}\"",
                py_name(&to_snake_case(&rel.column))
            ));
            if rel.kind == RelationshipKind::OneToOne {
                imports.add("typing", "Optional");
                format!("Optional[\"{target}\"]")
            } else {
                format!("list[\"{target}\"]")
            }
        }
        RelationshipKind::ManyToMany => {
            args.push(format!("secondary=\"{}\"", rel.join_table.as_deref()?));
            args.extend(back);
            format!("list[\"{target}\"]")
        }
    };
    if !self_ref {
        imports.add("typing", "TYPE_CHECKING");
    }
    Some(format!(
        "    {}: Mapped[{annotation}] = relationship({})\n",
        py_name(&rel.snake),
        args.join(", ")
    ))
}

fn generate_model(entity: &Entity<'_>) -> String {
    let mut imports = Imports::new();
    imports.add("sqlalchemy.orm", "Mapped");
    imports.add("sqlalchemy.orm", "mapped_column");
    imports.add("app.database", "Base");

    let mut columns = String::new();
    for field in &entity.fields {
        let column = field.column;
        let ty = PythonTypes.column_type(column);
        if ty.starts_with("Optional[") {
            imports.add("typing", "Optional");
        }
        if let Some(line) = PythonTypes.import_for(&column.sql_type) {
            imports.add_line(line);
        }
        let mut args = Vec::new();
        let name = attr(field);
        if name != column.name {
            args.push(format!("{:?}", column.name));
        }
        args.extend(column_args(entity.table, column, &mut imports));
        columns.push_str(&format!(
            "    {name}: Mapped[{ty}] = mapped_column({})\n",
            args.join(", ")
        ));
    }

    let mut relations = String::new();
    let mut targets = Vec::new();
    for rel in &entity.relations {
        if let Some(line) = relation_attr(rel, entity, &mut imports) {
            relations.push_str(&line);
            if !rel.target.table.eq_ignore_ascii_case(&entity.names.table) {
                targets.push((rel.target.snake.clone(), rel.target.pascal.clone()));
            }
        }
    }
    if !relations.is_empty() {
        imports.add("sqlalchemy.orm", "relationship");
        relations.insert(0, '\n');
    }
    targets.sort();
    targets.dedup();
    let type_checking = if targets.is_empty() {
        String::new()
    } else {
        let lines: String = targets
            .iter()
            .map(|(snake, pascal)| format!("    from app.models.{snake} import {pascal}\n"))
            .collect();
        format!("\nif TYPE_CHECKING:\n{lines}")
    };

    format!(
        "{imports}{type_checking}\n\nclass {pascal}(Base):\n    __tablename__ = \"{table}\"\n\n{columns}{relations}",
        imports = imports.render(),
        pascal = entity.names.pascal,
        table = entity.names.table,
    )
}

fn generate_associations(tables: &[&SqlTable]) -> String {
    let mut imports = Imports::new();
    imports.add("sqlalchemy", "Column");
    imports.add("sqlalchemy", "Table");
    imports.add("app.database", "Base");

    let mut body = String::new();
    for table in tables {
        let mut columns = String::new();
        for column in &table.columns {
            let args = column_args(table, column, &mut imports);
            columns.push_str(&format!("    Column({:?}, {}),\n", column.name, args.join(", ")));
        }
        body.push_str(&format!(
            "\n\n{} = Table(\n    {:?},\n    Base.metadata,\n{columns})\n",
            py_name(&to_snake_case(&table.name)),
            table.name
        ));
    }
    format!("{}{body}", imports.render())
}

fn generate_models_init(entities: &[Entity<'_>], join_tables: &[&SqlTable]) -> String {
    let mut imports = Imports::new();
    let mut names = Vec::new();
    for table in join_tables {
        let name = py_name(&to_snake_case(&table.name));
        imports.add("app.models.associations", &name);
        names.push(name);
    }
    for entity in entities {
        imports.add(&format!("app.models.{}", entity.names.snake), &entity.names.pascal);
        names.push(entity.names.pascal.clone());
    }
    names.sort();
    let all: String = names.iter().map(|n| format!("    \"{n}\",\n")).collect();
    format!("{}\n__all__ = [\n{all}]\n", imports.render())
}

fn schema_field(field: &Field<'_>, ty: &str, optional: bool) -> String {
    let mut constraints = Vec::new();
    if let Some(max) = max_length(field.column) {
        constraints.push(format!("max_length={max}"));
    }
    let name = attr(field);
    match (optional, constraints.is_empty()) {
        (false, true) => format!("    {name}: {ty}\n"),
        (false, false) => format!("    {name}: {ty} = Field({})\n", constraints.join(", ")),
        (true, true) => format!("    {name}: {ty} = None\n"),
        (true, false) => format!("    {name}: {ty} = Field(default=None, {})\n", constraints.join(", ")),
    }
}

fn generate_schemas(entity: &Entity<'_>) -> String {
    let mut imports = Imports::new();
    imports.add("pydantic", "BaseModel");
    imports.add("pydantic", "ConfigDict");

    let mut create = String::new();
    let mut update = String::new();
    let mut read = String::new();
    for field in &entity.fields {
        let column = field.column;
        if let Some(line) = PythonTypes.import_for(&column.sql_type) {
            imports.add_line(line);
        }
        let base = PythonTypes.map(&column.sql_type);
        let optional = format!("Optional[{base}]");
        read.push_str(&format!("    {}: {}\n", attr(field), PythonTypes.column_type(column)));
        if column.is_generated() {
            continue;
        }
        if column.is_required() {
            create.push_str(&schema_field(field, &base, false));
        } else {
            create.push_str(&schema_field(field, &optional, true));
        }
        update.push_str(&schema_field(field, &optional, true));
    }
    if format!("{create}{update}{read}").contains("Optional[") {
        imports.add("typing", "Optional");
    }
    if format!("{create}{update}").contains("Field(") {
        imports.add("pydantic", "Field");
    }
    let empty = "    pass\n";
    let pascal = &entity.names.pascal;
    format!(
        r#"{imports}

class {pascal}Create(BaseModel):
{create}

class {pascal}Update(BaseModel):
{update}

class {pascal}Read(BaseModel):
    model_config = ConfigDict(from_attributes=True)

{read}"#,
        imports = imports.render(),
        create = if create.is_empty() { empty } else { &create },
        update = if update.is_empty() { empty } else { &update },
    )
}
