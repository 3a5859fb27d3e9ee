//! C# base pass - generates EF Core models and DTOs.

use crudforge_schema::{RelationshipKind, SqlSchema, SqlType};

use crate::csharp::{add_ef_packages, namespace, render_csproj, src_path};
use crate::model::{entities, Entity, Field, Relation};
use crate::pass::{GenerationContext, Pass};
use crate::types::{max_length, CSharpTypes, TypeMapper};
use crate::CodegenError;

/// C# base pass that generates `Models/`, `Dtos/` and the project file.
pub struct CSharpBasePass;

impl Pass for CSharpBasePass {
    fn name(&self) -> &'static str {
        "csharp-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let namespace = namespace(&ctx.options);

        for entity in &entities(schema) {
            let pascal = &entity.names.pascal;
            let path = src_path(&ctx.options, &format!("Models/{pascal}.cs"));
            ctx.set_file(path, generate_model(&namespace, entity));
            let path = src_path(&ctx.options, &format!("Dtos/{pascal}Dtos.cs"));
            ctx.set_file(path, generate_dtos(&namespace, entity));
        }

        let path = src_path(&ctx.options, "Dtos/PagedResult.cs");
        ctx.set_file(
            path,
            format!(
                "namespace {namespace}.Dtos;\n\npublic record PagedResult<T>(IReadOnlyList<T> Items, int Page, int PageSize, int Total);\n"
            ),
        );

        add_ef_packages(ctx);
        render_csproj(ctx);
        Ok(())
    }
}

fn property_attributes(field: &Field<'_>) -> String {
    let column = field.column;
    let mut out = String::new();
    if column.primary_key {
        out.push_str("    [Key]\n");
        if column.is_generated() {
            out.push_str("    [DatabaseGenerated(DatabaseGeneratedOption.Identity)]\n");
        } else {
            out.push_str("    [DatabaseGenerated(DatabaseGeneratedOption.None)]\n");
        }
    } else if column.is_generated() {
        out.push_str("    [DatabaseGenerated(DatabaseGeneratedOption.Identity)]\n");
    }
    out.push_str(&format!("    [Column(\"{}\")]\n", column.name));
    if !column.nullable && column.sql_type.is_textual() {
        out.push_str("    [Required]\n");
    }
    if let Some(max) = max_length(column) {
        out.push_str(&format!("    [MaxLength({max})]\n"));
    }
    if let SqlType::Decimal {
        precision: Some(precision),
        scale,
    } = &column.sql_type
    {
        out.push_str(&format!("    [Precision({precision}, {})]\n", scale.unwrap_or(0)));
    }
    out
}

fn initializer(ty: &str) -> &'static str {
    match ty {
        "string" => " = string.Empty;",
        t if t.ends_with("[]") => " = Array.Empty<byte>();",
        _ => "",
    }
}

fn navigation(rel: &Relation, entity: &Entity<'_>) -> Option<String> {
    let target = &rel.target.pascal;
    let out = match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => {
            let fk = entity
                .fields
                .iter()
                .find(|f| f.column.name.eq_ignore_ascii_case(&rel.column))?;
            format!(
                "    [ForeignKey(nameof({}))]\n    public {target}? {} {{ get; set; }}\n",
                fk.pascal, rel.pascal
            )
        }
        RelationshipKind::OneToOne => format!(
            "    [InverseProperty(nameof({target}.{}))]\n    public {target}? {} {{ get; set; }}\n",
            rel.mapped_by_pascal()?,
            rel.pascal
        ),
        RelationshipKind::OneToMany => format!(
            "    [InverseProperty(nameof({target}.{}))]\n    public ICollection<{target}> {} {{ get; set; }} = new List<{target}>();\n",
            rel.mapped_by_pascal()?,
            rel.pascal
        ),
        RelationshipKind::ManyToMany => {
            let inverse = match rel.mapped_by_pascal() {
                Some(other) if !rel.owner => format!("    [InverseProperty(nameof({target}.{other}))]\n"),
                _ => String::new(),
            };
            format!(
                "{inverse}    public ICollection<{target}> {} {{ get; set; }} = new List<{target}>();\n",
                rel.pascal
            )
        }
        RelationshipKind::ManyToOne => return None,
    };
    Some(out)
}

fn generate_model(namespace: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let mut members = Vec::new();
    for field in &entity.fields {
        let ty = CSharpTypes.column_type(field.column);
        members.push(format!(
            "{}    public {ty} {} {{ get; set; }}{}\n",
            property_attributes(field),
            field.pascal,
            initializer(&ty)
        ));
    }
    for rel in &entity.relations {
        if let Some(nav) = navigation(rel, entity) {
            members.push(nav);
        }
    }

    let indexes: String = entity
        .fields
        .iter()
        .filter(|f| f.column.unique && !f.column.primary_key)
        .map(|f| format!("[Index(nameof({}), IsUnique = true)]\n", f.pascal))
        .collect();
    let ef_using = if !indexes.is_empty() || entity.has_type(|t| matches!(t, SqlType::Decimal { .. }))
    {
        "using Microsoft.EntityFrameworkCore;\n"
    } else {
        ""
    };

    format!(
        r#"using System.ComponentModel.DataAnnotations;
using System.ComponentModel.DataAnnotations.Schema;
{ef_using}
namespace {namespace}.Models;

{indexes}[Table("{table}")]
public class {pascal}
{{
{members}}}
"#,
        table = entity.names.table,
        members = members.join("\n"),
    )
}

fn generate_dtos(namespace: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let components: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("{} {}", CSharpTypes.column_type(f.column), f.pascal))
        .collect();
    let args: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("entity.{}", f.pascal))
        .collect();

    let mut properties = Vec::new();
    let mut apply = String::new();
    for field in entity.writable() {
        let column = field.column;
        let mut attrs = String::new();
        if column.is_required() {
            attrs.push_str("    [Required]\n");
        }
        if let Some(max) = max_length(column) {
            attrs.push_str(&format!("    [MaxLength({max})]\n"));
        }
        let ty = CSharpTypes.nullable(CSharpTypes.map(&column.sql_type));
        properties.push(format!("{attrs}    public {ty} {} {{ get; set; }}\n", field.pascal));

        if column.primary_key {
            continue;
        }
        let entity_ty = CSharpTypes.column_type(column);
        if entity_ty.ends_with('?') {
            apply.push_str(&format!("        entity.{0} = {0};\n", field.pascal));
        } else {
            apply.push_str(&format!("        entity.{0} = {0} ?? entity.{0};\n", field.pascal));
        }
    }

    format!(
        r#"using System.ComponentModel.DataAnnotations;
using {namespace}.Models;

namespace {namespace}.Dtos;

public record {pascal}Dto(
    {components})
{{
    public static {pascal}Dto From({pascal} entity) => new(
        {args});
}}

public class {pascal}Request
{{
{properties}
    /// <summary>Copies the request onto <paramref name="entity"/>; the key is left alone.</summary>
    public void ApplyTo({pascal} entity)
    {{
{apply}    }}
}}
"#,
        components = components.join(",\n    "),
        args = args.join(",\n        "),
        properties = properties.join("\n"),
    )
}
