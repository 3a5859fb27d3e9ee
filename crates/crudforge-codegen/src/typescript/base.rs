//! TypeScript base pass - project files, TypeORM entities and
//! class-validator DTOs.

use crudforge_schema::{RelationshipKind, SqlColumn, SqlSchema, SqlType};

use crate::model::{entities, Entity, Field, Relation};
use crate::options::Database;
use crate::pass::{GenerationContext, Pass};
use crate::typescript::{add_nest_packages, feature_path, import_line, render_package_json};
use crate::types::{TypeMapper, TypeScriptTypes};
use crate::CodegenError;

/// Writes the npm/Nest project files, `src/common/page.ts`, and per entity
/// the entity class and its create, update and response DTOs.
pub struct TypeScriptBasePass;

impl Pass for TypeScriptBasePass {
    fn name(&self) -> &'static str {
        "typescript-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let database = ctx.options.database;
        for entity in &entities(schema) {
            let kebab = &entity.names.kebab;
            ctx.set_file(
                feature_path(entity, &format!("entities/{kebab}.entity.ts")),
                generate_entity(entity, database),
            );
            ctx.set_file(
                feature_path(entity, &format!("dto/create-{kebab}.dto.ts")),
                generate_create_dto(entity),
            );
            ctx.set_file(
                feature_path(entity, &format!("dto/update-{kebab}.dto.ts")),
                generate_update_dto(entity),
            );
            ctx.set_file(
                feature_path(entity, &format!("dto/{kebab}-response.dto.ts")),
                generate_response_dto(entity),
            );
        }
        ctx.set_file("src/common/page.ts", PAGE_TS);
        ctx.set_file("tsconfig.json", TSCONFIG_JSON);
        ctx.set_file("tsconfig.build.json", TSCONFIG_BUILD_JSON);
        ctx.set_file("nest-cli.json", NEST_CLI_JSON);
        ctx.set_file(".gitignore", "node_modules/\ndist/\n.env\nuploads/\n");

        add_nest_packages(ctx);
        render_package_json(ctx);
        Ok(())
    }
}

const PAGE_TS: &str = r#"import { Expose, Type } from 'class-transformer';
import { IsInt, IsOptional } from 'class-validator';

export const DEFAULT_PAGE_SIZE = 20;
export const MAX_PAGE_SIZE = 100;

export class PageQuery {
  @IsOptional()
  @Type(() => Number)
  @IsInt()
  page?: number;

  @Expose({ name: 'page_size' })
  @IsOptional()
  @Type(() => Number)
  @IsInt()
  pageSize?: number;
}

export interface Page<T> {
  items: T[];
  page: number;
  pageSize: number;
  total: number;
}

/** Normalizes 1-based paging parameters. */
export function clampPage(page?: number, size?: number): { page: number; size: number } {
  const p = page && page > 0 ? page : 1;
  const s = size && size > 0 ? Math.min(size, MAX_PAGE_SIZE) : DEFAULT_PAGE_SIZE;
  return { page: p, size: s };
}
"#;

const TSCONFIG_JSON: &str = r#"{
  "compilerOptions": {
    "module": "commonjs",
    "declaration": true,
    "removeComments": true,
    "emitDecoratorMetadata": true,
    "experimentalDecorators": true,
    "allowSyntheticDefaultImports": true,
    "target": "ES2021",
    "sourceMap": true,
    "outDir": "./dist",
    "baseUrl": "./",
    "incremental": true,
    "skipLibCheck": true,
    "strictNullChecks": false,
    "noImplicitAny": false
  }
}
"#;

const TSCONFIG_BUILD_JSON: &str = r#"{
  "extends": "./tsconfig.json",
  "exclude": ["node_modules", "dist", "**/*spec.ts"]
}
"#;

const NEST_CLI_JSON: &str = r#"{
  "$schema": "https://json.schemastore.org/nest-cli",
  "collection": "@nestjs/schematics",
  "sourceRoot": "src"
}
"#;

/// The TypeORM column type, which depends on the database for a few types.
fn orm_type(ty: &SqlType, database: Database) -> String {
    match ty {
        SqlType::SmallInt => "smallint",
        SqlType::Integer => "int",
        SqlType::BigInt => "bigint",
        SqlType::Decimal { .. } => "decimal",
        SqlType::Real => "real",
        SqlType::Double => match database {
            Database::Postgres => "double precision",
            Database::Mysql | Database::Sqlite => "double",
        },
        SqlType::Boolean => "boolean",
        SqlType::Char(_) => "char",
        SqlType::Varchar(_) => "varchar",
        SqlType::Text => "text",
        SqlType::Date => "date",
        SqlType::Time => "time",
        SqlType::Timestamp => match database {
            Database::Sqlite => "datetime",
            Database::Postgres | Database::Mysql => "timestamp",
        },
        SqlType::TimestampTz => match database {
            Database::Postgres => "timestamptz",
            Database::Mysql => "timestamp",
            Database::Sqlite => "datetime",
        },
        SqlType::Uuid => match database {
            Database::Postgres => "uuid",
            Database::Mysql | Database::Sqlite => "varchar",
        },
        SqlType::Json => match database {
            Database::Postgres => "jsonb",
            Database::Mysql => "json",
            Database::Sqlite => "simple-json",
        },
        SqlType::Binary => match database {
            Database::Postgres => "bytea",
            Database::Mysql | Database::Sqlite => "blob",
        },
        SqlType::Enum(_) => match database {
            Database::Sqlite => "simple-enum",
            Database::Postgres | Database::Mysql => "enum",
        },
        SqlType::Other(_) => "text",
    }
    .to_string()
}

/// A literal default TypeORM can put in the DDL. Function defaults such as
/// `CURRENT_TIMESTAMP` are left to the database.
fn literal_default(column: &SqlColumn) -> Option<String> {
    let raw = column.default.as_deref()?.trim();
    if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        return Some(raw.to_ascii_lowercase());
    }
    if raw.parse::<f64>().is_ok() {
        return Some(raw.to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(raw.to_string());
    }
    None
}

fn column_options(field: &Field<'_>, database: Database) -> String {
    let column = field.column;
    let mut options = vec![
        format!("name: '{}'", column.name),
        format!("type: '{}'", orm_type(&column.sql_type, database)),
    ];
    match &column.sql_type {
        SqlType::Char(Some(n)) | SqlType::Varchar(Some(n)) => options.push(format!("length: {n}")),
        SqlType::Uuid if database != Database::Postgres => options.push("length: 36".to_string()),
        SqlType::Decimal {
            precision: Some(precision),
            scale,
        } => {
            options.push(format!("precision: {precision}"));
            options.push(format!("scale: {}", scale.unwrap_or(0)));
        }
        SqlType::Enum(values) => {
            let values: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
            options.push(format!("enum: [{}]", values.join(", ")));
        }
        _ => {}
    }
    if column.nullable && !column.primary_key {
        options.push("nullable: true".to_string());
    }
    if column.unique && !column.primary_key {
        options.push("unique: true".to_string());
    }
    if let Some(default) = literal_default(column) {
        options.push(format!("default: {default}"));
    }
    format!("{{ {} }}", options.join(", "))
}

/// The decorator line for a column, and the decorator it imports.
fn column_decorator(field: &Field<'_>, database: Database) -> (String, &'static str) {
    let column = field.column;
    if column.primary_key && column.is_generated() {
        if column.sql_type == SqlType::Uuid {
            return (
                format!("@PrimaryGeneratedColumn('uuid', {{ name: '{}' }})", column.name),
                "PrimaryGeneratedColumn",
            );
        }
        return (
            format!(
                "@PrimaryGeneratedColumn({{ name: '{}', type: '{}' }})",
                column.name,
                orm_type(&column.sql_type, database)
            ),
            "PrimaryGeneratedColumn",
        );
    }
    if column.primary_key {
        return (
            format!("@PrimaryColumn({})", column_options(field, database)),
            "PrimaryColumn",
        );
    }
    if column.is_audit() && column.is_generated() {
        let (decorator, import) = if column.name.eq_ignore_ascii_case("updated_at") {
            ("@UpdateDateColumn", "UpdateDateColumn")
        } else {
            ("@CreateDateColumn", "CreateDateColumn")
        };
        return (
            format!(
                "{decorator}({{ name: '{}', type: '{}' }})",
                column.name,
                orm_type(&column.sql_type, database)
            ),
            import,
        );
    }
    (format!("@Column({})", column_options(field, database)), "Column")
}

/// Decorators and property for a relation, plus the decorators it imports.
/// Inverse sides without a known back-reference are skipped.
fn relation_property(rel: &Relation) -> Option<(String, Vec<&'static str>)> {
    let target = &rel.target.pascal;
    let param = &rel.target.camel;
    let back = rel
        .mapped_by_camel()
        .map(|b| format!(", ({param}) => {param}.{b}"));
    let (decorators, ty, imports) = match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => {
            let (decorator, import) = if rel.kind == RelationshipKind::ManyToOne {
                ("ManyToOne", "ManyToOne")
            } else {
                ("OneToOne", "OneToOne")
            };
            (
                format!(
                    "  @{decorator}(() => {target}{})\n  @JoinColumn({{ name: '{}' }})\n",
                    back.unwrap_or_default(),
                    rel.column
                ),
                target.clone(),
                vec![import, "JoinColumn"],
            )
        }
        RelationshipKind::OneToOne => (
            format!("  @OneToOne(() => {target}{})\n", back?),
            target.clone(),
            vec!["OneToOne"],
        ),
        RelationshipKind::OneToMany => (
            format!("  @OneToMany(() => {target}{})\n", back?),
            format!("{target}[]"),
            vec!["OneToMany"],
        ),
        RelationshipKind::ManyToMany if rel.owner => {
            let join = rel.join_table.as_deref()?;
            let inverse = rel.inverse_column.as_deref()?;
            (
                format!(
                    "  @ManyToMany(() => {target}{})\n  @JoinTable({{\n    name: '{join}',\n    joinColumn: {{ name: '{}' }},\n    inverseJoinColumn: {{ name: '{inverse}' }},\n  }})\n",
                    back.unwrap_or_default(),
                    rel.column
                ),
                format!("{target}[]"),
                vec!["ManyToMany", "JoinTable"],
            )
        }
        RelationshipKind::ManyToMany => (
            format!("  @ManyToMany(() => {target}{})\n", back?),
            format!("{target}[]"),
            vec!["ManyToMany"],
        ),
        RelationshipKind::ManyToOne => return None,
    };
    Some((format!("{decorators}  {}: {ty};\n", rel.camel), imports))
}

fn generate_entity(entity: &Entity<'_>, database: Database) -> String {
    let pascal = &entity.names.pascal;
    let mut decorators = vec!["Entity"];
    let mut members = Vec::new();

    for field in &entity.fields {
        let (decorator, import) = column_decorator(field, database);
        decorators.push(import);
        members.push(format!(
            "  {decorator}\n  {}: {};\n",
            field.camel,
            TypeScriptTypes.column_type(field.column)
        ));
    }

    let mut related = Vec::new();
    for rel in &entity.relations {
        if let Some((member, imports)) = relation_property(rel) {
            decorators.extend(imports);
            members.push(member);
            if rel.target.pascal != *pascal {
                related.push(&rel.target);
            }
        }
    }

    let mut out = import_line(&decorators, "typeorm");
    let mut seen = Vec::new();
    for target in related {
        if seen.contains(&target.pascal) {
            continue;
        }
        seen.push(target.pascal.clone());
        out.push_str(&import_line(
            &[&target.pascal],
            &format!("../../{}/entities/{}.entity", target.route, target.kebab),
        ));
    }
    out.push_str(&format!(
        "\n@Entity({{ name: '{}' }})\nexport class {pascal} {{\n{}}}\n",
        entity.names.table,
        members.join("\n")
    ));
    out
}

/// class-validator decorators for a request property.
fn validators(column: &SqlColumn) -> Vec<String> {
    let mut out = Vec::new();
    if !column.is_required() {
        out.push("IsOptional()".to_string());
    }
    match &column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => out.push("IsInt()".to_string()),
        SqlType::Real | SqlType::Double => out.push("IsNumber()".to_string()),
        SqlType::Decimal { .. } => out.push("IsDecimal()".to_string()),
        SqlType::Boolean => out.push("IsBoolean()".to_string()),
        SqlType::Date | SqlType::Timestamp | SqlType::TimestampTz => {
            out.push("Type(() => Date)".to_string());
            out.push("IsDate()".to_string());
        }
        SqlType::Uuid => out.push("IsUUID()".to_string()),
        SqlType::Json => out.push("IsObject()".to_string()),
        SqlType::Enum(values) => {
            let values: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
            out.push(format!("IsIn([{}])", values.join(", ")));
        }
        SqlType::Binary => {}
        SqlType::Char(_) | SqlType::Varchar(_) | SqlType::Text | SqlType::Time | SqlType::Other(_) => {
            out.push("IsString()".to_string())
        }
    }
    if let Some(max) = column.sql_type.max_length() {
        out.push(format!("MaxLength({max})"));
    }
    out
}

fn generate_create_dto(entity: &Entity<'_>) -> String {
    let mut used = Vec::new();
    let mut members = Vec::new();
    let mut needs_type = false;
    for field in entity.writable() {
        let mut member = String::new();
        for validator in validators(field.column) {
            let name = validator.split('(').next().unwrap_or_default().to_string();
            if name == "Type" {
                needs_type = true;
            } else {
                used.push(name);
            }
            member.push_str(&format!("  @{validator}\n"));
        }
        let optional = if field.column.is_required() { "" } else { "?" };
        member.push_str(&format!(
            "  {}{optional}: {};\n",
            field.camel,
            TypeScriptTypes.column_type(field.column)
        ));
        members.push(member);
    }

    let mut out = String::new();
    if needs_type {
        out.push_str(&import_line(&["Type"], "class-transformer"));
    }
    if !used.is_empty() {
        out.push_str(&import_line(&used, "class-validator"));
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!(
        "export class Create{}Dto {{\n{}}}\n",
        entity.names.pascal,
        members.join("\n")
    ));
    out
}

fn generate_update_dto(entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    format!(
        "import {{ PartialType }} from '@nestjs/mapped-types';\nimport {{ Create{pascal}Dto }} from './create-{kebab}.dto';\n\nexport class Update{pascal}Dto extends PartialType(Create{pascal}Dto) {{}}\n",
        kebab = entity.names.kebab
    )
}

fn generate_response_dto(entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let fields: String = entity
        .fields
        .iter()
        .map(|f| format!("  {}: {};\n", f.camel, TypeScriptTypes.column_type(f.column)))
        .collect();
    let assignments: String = entity
        .fields
        .iter()
        .map(|f| format!("    dto.{0} = entity.{0};\n", f.camel))
        .collect();
    format!(
        r#"import {{ {pascal} }} from '../entities/{kebab}.entity';

export class {pascal}ResponseDto {{
{fields}
  static fromEntity(entity: {pascal}): {pascal}ResponseDto {{
    const dto = new {pascal}ResponseDto();
{assignments}    return dto;
  }}
}}
"#,
        kebab = entity.names.kebab,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    fn run() -> GenerationContext {
        let mut ctx = GenerationContext::new();
        TypeScriptBasePass.run(&blog(), &mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_entity() {
        let ctx = run();
        let post = ctx.get_file("src/posts/entities/post.entity.ts").unwrap();
        assert!(post.starts_with("import { Column, CreateDateColumn, Entity, JoinColumn, JoinTable, ManyToMany, ManyToOne, OneToMany, PrimaryGeneratedColumn } from 'typeorm';\n"));
        assert!(post.contains("import { Comment } from '../../comments/entities/comment.entity';\n"));
        assert!(post.contains("import { User } from '../../users/entities/user.entity';\n"));
        assert!(post.contains("@Entity({ name: 'posts' })\nexport class Post {"));
        assert!(post.contains("  @PrimaryGeneratedColumn({ name: 'id', type: 'bigint' })\n  id: number;\n"));
        assert!(post.contains("  @Column({ name: 'title', type: 'varchar', length: 200 })\n  title: string;\n"));
        assert!(post.contains("  @Column({ name: 'body', type: 'text', nullable: true })\n  body: string | null;\n"));
        assert!(post.contains("  @Column({ name: 'published', type: 'boolean', default: false })\n"));
        assert!(post.contains("  @CreateDateColumn({ name: 'created_at', type: 'timestamp' })\n"));
        assert!(post.contains("  @ManyToOne(() => User, (user) => user.posts)\n  @JoinColumn({ name: 'author_id' })\n  author: User;\n"));
        assert!(post.contains("    name: 'post_tags',\n    joinColumn: { name: 'post_id' },\n    inverseJoinColumn: { name: 'tag_id' },\n"));

        let user = ctx.get_file("src/users/entities/user.entity.ts").unwrap();
        assert!(user.contains("  @OneToMany(() => Post, (post) => post.author)\n  posts: Post[];\n"));
    }

    #[test]
    fn test_database_specific_types() {
        let mut ctx = GenerationContext::with_options(crate::options::GeneratorOptions {
            database: Database::Sqlite,
            ..Default::default()
        });
        TypeScriptBasePass.run(&blog(), &mut ctx).unwrap();
        let user = ctx.get_file("src/users/entities/user.entity.ts").unwrap();
        assert!(user.contains("@CreateDateColumn({ name: 'created_at', type: 'datetime' })"));
        assert!(ctx.get_file("package.json").unwrap().contains("\"sqlite3\""));
    }

    #[test]
    fn test_dtos() {
        let ctx = run();
        let create = ctx.get_file("src/posts/dto/create-post.dto.ts").unwrap();
        assert!(create.starts_with(
            "import { IsBoolean, IsInt, IsOptional, IsString, MaxLength } from 'class-validator';\n"
        ));
        assert!(create.contains("  @IsInt()\n  authorId: number;\n"));
        assert!(create.contains("  @IsString()\n  @MaxLength(200)\n  title: string;\n"));
        assert!(create.contains("  @IsOptional()\n  @IsString()\n  body?: string | null;\n"));
        assert!(!create.contains("createdAt"));

        let update = ctx.get_file("src/posts/dto/update-post.dto.ts").unwrap();
        assert!(update.contains("export class UpdatePostDto extends PartialType(CreatePostDto) {}"));

        let response = ctx.get_file("src/posts/dto/post-response.dto.ts").unwrap();
        assert!(response.contains("    dto.createdAt = entity.createdAt;\n"));
        assert!(ctx.has_file("src/common/page.ts"));
        assert!(ctx.has_file("tsconfig.json"));
    }
}
