//! Go base pass - GORM models, request/response DTOs and `go.mod`.

use crudforge_schema::{RelationshipKind, SqlColumn, SqlSchema, SqlType};

use crate::go::{
    add_gorm, add_require, align, field_name, go_name, imports, module_path, render_go_mod,
    type_imports,
};
use crate::model::{entities, Entity, Relation};
use crate::pass::{GenerationContext, Pass};
use crate::types::{max_length, GoTypes, TypeMapper};
use crate::CodegenError;

/// Writes `internal/models` and `internal/dto`.
pub struct GoBasePass;

impl Pass for GoBasePass {
    fn name(&self) -> &'static str {
        "go-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let module = module_path(&ctx.options);
        let entities = entities(schema);

        for entity in &entities {
            let snake = &entity.names.snake;
            ctx.set_file(
                format!("internal/models/{snake}.go"),
                generate_model(&module, entity),
            );
            ctx.set_file(format!("internal/dto/{snake}.go"), generate_dto(&module, entity));
        }
        ctx.set_file("internal/dto/page.go", PAGE_GO);
        ctx.set_file("internal/dto/validate.go", VALIDATE_GO);

        add_gorm(ctx);
        add_require(ctx, "github.com/go-playground/validator/v10", "v10.22.1");
        if entities
            .iter()
            .any(|e| e.has_type(|t| matches!(t, SqlType::Uuid)))
        {
            add_require(ctx, "github.com/google/uuid", "v1.6.0");
        }
        render_go_mod(ctx);
        Ok(())
    }
}

const PAGE_GO: &str = r#"package dto

const (
	DefaultPageSize = 20
	MaxPageSize     = 100
)

// Page is one page of a listing.
type Page[T any] struct {
	Items    []T   `json:"items"`
	Page     int   `json:"page"`
	PageSize int   `json:"page_size"`
	Total    int64 `json:"total"`
}

// Clamp normalizes 1-based paging parameters.
func Clamp(page, size int) (int, int) {
	if page < 1 {
		page = 1
	}
	if size < 1 {
		size = DefaultPageSize
	}
	if size > MaxPageSize {
		size = MaxPageSize
	}
	return page, size
}
"#;

const VALIDATE_GO: &str = r#"package dto

import "github.com/go-playground/validator/v10"

var validate = validator.New(validator.WithRequiredStructEnabled())

// Validate checks the `validate` tags of a request body.
func Validate(v any) error {
	return validate.Struct(v)
}
"#;

fn gorm_tag(column: &SqlColumn) -> String {
    let mut parts = vec![format!("column:{}", column.name)];
    if column.primary_key {
        parts.push("primaryKey".to_string());
    }
    if column.auto_increment {
        parts.push("autoIncrement".to_string());
    }
    if let Some(max) = column.sql_type.max_length() {
        parts.push(format!("size:{max}"));
    }
    if let SqlType::Decimal {
        precision: Some(precision),
        scale,
    } = &column.sql_type
    {
        parts.push(format!("precision:{precision};scale:{}", scale.unwrap_or(0)));
    }
    if !column.nullable && !column.primary_key {
        parts.push("not null".to_string());
    }
    if column.unique && !column.primary_key {
        parts.push("unique".to_string());
    }
    if column.is_audit() && column.is_generated() {
        if column.name.eq_ignore_ascii_case("updated_at") {
            parts.push("autoUpdateTime".to_string());
        } else {
            parts.push("autoCreateTime".to_string());
        }
    }
    parts.join(";")
}

fn association(rel: &Relation, entity: &Entity<'_>) -> Option<Vec<String>> {
    let target = &rel.target.pascal;
    let (ty, gorm) = match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => {
            let fk = entity
                .fields
                .iter()
                .find(|f| f.column.name.eq_ignore_ascii_case(&rel.column))?;
            (format!("*{target}"), format!("foreignKey:{}", field_name(fk)))
        }
        RelationshipKind::OneToOne => {
            (format!("*{target}"), format!("foreignKey:{}", go_name(&rel.column)))
        }
        RelationshipKind::OneToMany => {
            (format!("[]{target}"), format!("foreignKey:{}", go_name(&rel.column)))
        }
        RelationshipKind::ManyToMany => {
            let join = rel.join_table.as_deref()?;
            let inverse = rel.inverse_column.as_deref()?;
            (
                format!("[]{target}"),
                format!(
                    "many2many:{join};joinForeignKey:{};joinReferences:{}",
                    go_name(&rel.column),
                    go_name(inverse)
                ),
            )
        }
        RelationshipKind::ManyToOne => return None,
    };
    Some(vec![
        go_name(&rel.snake),
        ty,
        format!("`gorm:\"{gorm}\" json:\"{},omitempty\"`", rel.snake),
    ])
}

fn generate_model(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let mut rows = Vec::new();
    for field in &entity.fields {
        rows.push(vec![
            field_name(field),
            GoTypes.column_type(field.column),
            format!("`gorm:\"{}\" json:\"{}\"`", gorm_tag(field.column), field.snake),
        ]);
    }
    for rel in &entity.relations {
        if let Some(row) = association(rel, entity) {
            rows.push(row);
        }
    }

    let uuid_key = entity.id.column.is_generated() && entity.id.column.sql_type == SqlType::Uuid;
    let mut paths = type_imports(entity);
    let mut hook = String::new();
    if uuid_key {
        paths.push("gorm.io/gorm".to_string());
        paths.push("github.com/google/uuid".to_string());
        hook = format!(
            "\n// BeforeCreate assigns a random key when none was set.\nfunc (m *{pascal}) BeforeCreate(*gorm.DB) error {{\n\tif m.{key} == uuid.Nil {{\n\t\tm.{key} = uuid.New()\n\t}}\n\treturn nil\n}}\n",
            key = field_name(&entity.id)
        );
    }
    let import_block = if paths.is_empty() {
        String::new()
    } else {
        format!("{}\n", imports(module, &paths))
    };

    format!(
        "package models\n\n{import_block}// {pascal} maps the {table} table.\ntype {pascal} struct {{\n{fields}}}\n\n// TableName keeps GORM on the declared table name.\nfunc ({pascal}) TableName() string {{\n\treturn \"{table}\"\n}}\n{hook}",
        table = entity.names.table,
        fields = align(&rows, "\t"),
    )
}

fn validate_tag(column: &SqlColumn) -> Option<String> {
    let mut rules = Vec::new();
    if column.is_required() {
        rules.push("required".to_string());
    }
    if let Some(max) = max_length(column) {
        if rules.is_empty() {
            rules.push("omitempty".to_string());
        }
        rules.push(format!("max={max}"));
    }
    if rules.is_empty() {
        None
    } else {
        Some(rules.join(","))
    }
}

fn generate_dto(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;

    let mut request_rows = Vec::new();
    let mut apply = String::new();
    for field in entity.writable() {
        let name = field_name(field);
        let request_ty = GoTypes.nullable(GoTypes.map(&field.column.sql_type));
        let mut tag = format!("json:\"{}\"", field.snake);
        if let Some(rules) = validate_tag(field.column) {
            tag.push_str(&format!(" validate:\"{rules}\""));
        }
        request_rows.push(vec![name.clone(), request_ty.clone(), format!("`{tag}`")]);

        if field.column.primary_key {
            continue;
        }
        let model_ty = GoTypes.column_type(field.column);
        let value = if request_ty.starts_with('*') && !model_ty.starts_with('*') {
            format!("*r.{name}")
        } else {
            format!("r.{name}")
        };
        apply.push_str(&format!(
            "\tif r.{name} != nil {{\n\t\tm.{name} = {value}\n\t}}\n"
        ));
    }

    let response_rows: Vec<Vec<String>> = entity
        .fields
        .iter()
        .map(|f| {
            vec![
                field_name(f),
                GoTypes.column_type(f.column),
                format!("`json:\"{}\"`", f.snake),
            ]
        })
        .collect();
    let literal_rows: Vec<Vec<String>> = entity
        .fields
        .iter()
        .map(|f| {
            let name = field_name(f);
            vec![format!("{name}:"), format!("m.{name},")]
        })
        .collect();

    let mut paths = type_imports(entity);
    paths.push(format!("{module}/internal/models"));

    format!(
        r#"package dto

{imports}
// {pascal}Request is the body of create and update requests.
type {pascal}Request struct {{
{request}}}

// ApplyTo copies the provided fields onto m. The key is left alone.
func (r {pascal}Request) ApplyTo(m *models.{pascal}) {{
{apply}}}

// {pascal}Response is the JSON form of a {snake}.
type {pascal}Response struct {{
{response}}}

// New{pascal}Response builds the response for m.
func New{pascal}Response(m *models.{pascal}) {pascal}Response {{
	return {pascal}Response{{
{literal}	}}
}}
"#,
        imports = imports(module, &paths),
        snake = entity.names.snake.replace('_', " "),
        request = align(&request_rows, "\t"),
        response = align(&response_rows, "\t"),
        literal = align(&literal_rows, "\t\t"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    fn run() -> GenerationContext {
        let mut ctx = GenerationContext::new();
        GoBasePass.run(&blog(), &mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_models() {
        let ctx = run();
        let post = ctx.get_file("internal/models/post.go").unwrap();
        assert!(post.contains("type Post struct {"));
        assert!(post.contains("\tID        int64     `gorm:\"column:id;primaryKey;autoIncrement\" json:\"id\"`"));
        assert!(post.contains("`gorm:\"column:title;size:200;not null\" json:\"title\"`"));
        assert!(post.contains("*string"));
        assert!(post.contains("`gorm:\"column:created_at;not null;autoCreateTime\" json:\"created_at\"`"));
        assert!(post.contains("`gorm:\"foreignKey:AuthorID\" json:\"author,omitempty\"`"));
        assert!(post.contains("many2many:post_tags;joinForeignKey:PostID;joinReferences:TagID"));
        assert!(post.contains("func (Post) TableName() string {\n\treturn \"posts\"\n}"));
        assert!(post.contains("\t\"time\"\n"));

        let user = ctx.get_file("internal/models/user.go").unwrap();
        assert!(user.contains("[]Post"));
        assert!(user.contains("`gorm:\"foreignKey:AuthorID\" json:\"posts,omitempty\"`"));
    }

    #[test]
    fn test_dtos() {
        let ctx = run();
        let dto = ctx.get_file("internal/dto/post.go").unwrap();
        assert!(dto.contains("json:\"title\" validate:\"required,max=200\""));
        assert!(dto.contains("\tif r.Title != nil {\n\t\tm.Title = *r.Title\n\t}"));
        assert!(dto.contains("\tif r.Body != nil {\n\t\tm.Body = r.Body\n\t}"));
        assert!(!dto.contains("m.CreatedAt ="));
        assert!(dto.contains("func NewPostResponse(m *models.Post) PostResponse {"));
        assert!(dto.contains("\"app/internal/models\""));
        assert!(ctx.has_file("internal/dto/page.go"));

        let go_mod = ctx.get_file("go.mod").unwrap();
        assert!(go_mod.contains("github.com/go-playground/validator/v10 v10.22.1"));
        assert!(!go_mod.contains("github.com/google/uuid"));
    }
}
