//! Java base pass - generates JPA entities and DTOs.

use crudforge_schema::{RelationshipKind, SqlSchema, SqlType};

use crate::java::{
    add_driver_deps, add_maven_dep, add_type_imports, java_ident, render_pom, source_path,
};
use crate::model::{entities, Entity, Field, Relation};
use crate::pass::{GenerationContext, Pass};
use crate::types::{max_length, JavaTypes, TypeMapper};
use crate::CodegenError;

/// Java base pass that generates `entity/` and `dto/` plus `pom.xml`.
///
/// Foreign key columns are mapped twice: as a writable scalar (`authorId`)
/// and as a read-only association (`author`) sharing the join column, so
/// request DTOs can carry plain ids.
pub struct JavaBasePass;

impl Pass for JavaBasePass {
    fn name(&self) -> &'static str {
        "java-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let package = ctx.options.package.clone();

        for entity in &entities {
            let pascal = &entity.names.pascal;

            let path = source_path(&ctx.options, "entity", pascal);
            ctx.set_file(&path, generate_entity(&package, entity));
            add_type_imports(ctx, &path, entity);

            let path = source_path(&ctx.options, "dto", &format!("{pascal}Dto"));
            ctx.set_file(&path, generate_response_dto(&package, entity));
            add_type_imports(ctx, &path, entity);

            let path = source_path(&ctx.options, "dto", &format!("{pascal}Request"));
            ctx.set_file(&path, generate_request_dto(&package, entity));
            add_type_imports(ctx, &path, entity);
        }

        for starter in ["web", "data-jpa", "validation"] {
            add_maven_dep(
                ctx,
                &format!("org.springframework.boot:spring-boot-starter-{starter}"),
                "",
                "",
            );
        }
        add_driver_deps(ctx);
        render_pom(ctx);

        Ok(())
    }
}

/// `@Column(...)` for a scalar field.
fn column_annotation(field: &Field<'_>) -> String {
    let column = field.column;
    let mut attrs = vec![format!("name = \"{}\"", column.name)];
    if !column.nullable {
        attrs.push("nullable = false".to_string());
    }
    if column.unique && !column.primary_key {
        attrs.push("unique = true".to_string());
    }
    if let Some(max) = max_length(column) {
        attrs.push(format!("length = {max}"));
    }
    if let SqlType::Decimal {
        precision: Some(precision),
        scale,
    } = &column.sql_type
    {
        attrs.push(format!("precision = {precision}"));
        attrs.push(format!("scale = {}", scale.unwrap_or(0)));
    }
    if column.is_generated() && !column.primary_key && !column.is_audit() {
        attrs.push("insertable = false".to_string());
        attrs.push("updatable = false".to_string());
    }
    format!("@Column({})", attrs.join(", "))
}

fn generate_entity(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let mut fields = String::new();
    let mut accessors = String::new();
    let mut collections = false;

    for field in &entity.fields {
        let ty = JavaTypes.column_type(field.column);
        let name = java_ident(&field.camel);
        let column = field.column;

        if column.primary_key {
            fields.push_str("    @Id\n");
            if column.auto_increment && column.sql_type.is_integer() {
                fields.push_str("    @GeneratedValue(strategy = GenerationType.IDENTITY)\n");
            } else if column.sql_type == SqlType::Uuid && column.default.is_some() {
                fields.push_str("    @GeneratedValue(strategy = GenerationType.UUID)\n");
            }
        } else if column.is_audit() && column.sql_type.is_temporal() {
            if column.name == "created_at" {
                fields.push_str("    @CreationTimestamp\n");
            } else {
                fields.push_str("    @UpdateTimestamp\n");
            }
        }
        if column.sql_type == SqlType::Binary {
            fields.push_str("    @Lob\n");
        }
        fields.push_str(&format!(
            "    {}\n    private {ty} {name};\n\n",
            column_annotation(field)
        ));
        accessors.push_str(&accessor(&ty, &name, &field.pascal));
    }

    for rel in &entity.relations {
        let Some(annotation) = relation_annotation(rel) else {
            continue;
        };
        let name = java_ident(&rel.camel);
        let target = &rel.target.pascal;
        let (ty, init) = match rel.kind {
            RelationshipKind::OneToMany => (format!("List<{target}>"), " = new ArrayList<>()"),
            RelationshipKind::ManyToMany => (format!("Set<{target}>"), " = new HashSet<>()"),
            _ => (target.clone(), ""),
        };
        collections |= rel.is_collection();
        fields.push_str(&format!("{annotation}    private {ty} {name}{init};\n\n"));
        accessors.push_str(&accessor(&ty, &name, &rel.pascal));
    }

    let mut hibernate = String::new();
    if entity
        .fields
        .iter()
        .any(|f| f.column.is_audit() && f.column.sql_type.is_temporal())
    {
        hibernate.push_str("import org.hibernate.annotations.CreationTimestamp;\n");
        hibernate.push_str("import org.hibernate.annotations.UpdateTimestamp;\n");
    }
    // Null fields are left out of INSERTs so column defaults apply.
    let dynamic_insert = entity.writable().any(|f| f.column.default.is_some());
    if dynamic_insert {
        hibernate.insert_str(0, "import org.hibernate.annotations.DynamicInsert;\n");
    }
    let dynamic = if dynamic_insert { "@DynamicInsert\n" } else { "" };
    let util = if collections {
        "import java.util.ArrayList;\nimport java.util.HashSet;\nimport java.util.List;\nimport java.util.Set;\n"
    } else {
        ""
    };

    format!(
        r#"package {package}.entity;

import jakarta.persistence.*;
{hibernate}{util}
@Entity
{dynamic}@Table(name = "{table}")
public class {pascal} {{

{fields}{accessors}}}
"#,
        table = entity.names.table,
        accessors = accessors.trim_end_matches('\n'),
    )
}

fn accessor(ty: &str, name: &str, pascal: &str) -> String {
    format!(
        r#"    public {ty} get{pascal}() {{
        return {name};
    }}

    public void set{pascal}({ty} {name}) {{
        this.{name} = {name};
    }}

"#
    )
}

/// JPA annotations for a relation, or `None` when the mapping would be
/// incomplete (an inverse side without an owner to point at).
fn relation_annotation(rel: &Relation) -> Option<String> {
    let mapped_by = rel.mapped_by_camel().map(|m| java_ident(&m));
    let out = match rel.kind {
        RelationshipKind::ManyToOne => format!(
            "    @ManyToOne(fetch = FetchType.LAZY)\n    @JoinColumn(name = \"{}\", insertable = false, updatable = false)\n",
            rel.column
        ),
        RelationshipKind::OneToOne if rel.owner => format!(
            "    @OneToOne(fetch = FetchType.LAZY)\n    @JoinColumn(name = \"{}\", insertable = false, updatable = false)\n",
            rel.column
        ),
        RelationshipKind::OneToOne => {
            format!("    @OneToOne(mappedBy = \"{}\")\n", mapped_by?)
        }
        RelationshipKind::OneToMany => {
            format!("    @OneToMany(mappedBy = \"{}\")\n", mapped_by?)
        }
        RelationshipKind::ManyToMany if rel.owner => format!(
            "    @ManyToMany\n    @JoinTable(\n        name = \"{}\",\n        joinColumns = @JoinColumn(name = \"{}\"),\n        inverseJoinColumns = @JoinColumn(name = \"{}\")\n    )\n",
            rel.join_table.as_deref()?,
            rel.column,
            rel.inverse_column.as_deref()?
        ),
        RelationshipKind::ManyToMany => {
            format!("    @ManyToMany(mappedBy = \"{}\")\n", mapped_by?)
        }
    };
    Some(out)
}

fn generate_response_dto(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let components: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("{} {}", JavaTypes.column_type(f.column), java_ident(&f.camel)))
        .collect();
    let args: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("entity.get{}()", f.pascal))
        .collect();

    format!(
        r#"package {package}.dto;

import {package}.entity.{pascal};

public record {pascal}Dto(
        {components}) {{

    public static {pascal}Dto from({pascal} entity) {{
        return new {pascal}Dto(
                {args});
    }}
}}
"#,
        components = components.join(",\n        "),
        args = args.join(",\n                "),
    )
}

fn generate_request_dto(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let mut uses = Vec::new();
    let components: Vec<String> = entity
        .writable()
        .map(|f| {
            let ty = JavaTypes.column_type(f.column);
            let mut annotations = String::new();
            if f.column.is_required() {
                if f.column.sql_type.is_textual() {
                    annotations.push_str("@NotBlank ");
                    uses.push("NotBlank");
                } else {
                    annotations.push_str("@NotNull ");
                    uses.push("NotNull");
                }
            }
            if let Some(max) = max_length(f.column) {
                annotations.push_str(&format!("@Size(max = {max}) "));
                uses.push("Size");
            }
            format!("{annotations}{ty} {}", java_ident(&f.camel))
        })
        .collect();
    uses.sort_unstable();
    uses.dedup();
    let imports: String = uses
        .iter()
        .map(|u| format!("import jakarta.validation.constraints.{u};\n"))
        .collect();

    let body = if components.is_empty() {
        String::new()
    } else {
        format!("\n        {}", components.join(",\n        "))
    };
    let imports = if imports.is_empty() {
        String::new()
    } else {
        format!("{imports}\n")
    };

    format!(
        r#"package {package}.dto;

{imports}/**
 * Create and update payload for {pascal}.
 */
public record {pascal}Request({body}) {{
}}
"#
    )
}
