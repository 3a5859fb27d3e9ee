//! GORM repositories, services and the database package.

use crudforge_schema::SqlSchema;

use crate::go::{driver, field_name, id_type, imports, module_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Generates `internal/repository`, `internal/service` and
/// `internal/database`.
pub struct GoDataPass;

impl Pass for GoDataPass {
    fn name(&self) -> &'static str {
        "go-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let module = module_path(&ctx.options);
        let entities = entities(schema);

        for entity in &entities {
            let snake = &entity.names.snake;
            ctx.set_file(
                format!("internal/repository/{snake}.go"),
                generate_repository(&module, entity),
            );
            ctx.set_file(
                format!("internal/service/{snake}.go"),
                generate_service(&module, entity),
            );
        }
        ctx.set_file("internal/repository/errors.go", REPOSITORY_ERRORS_GO);
        ctx.set_file("internal/service/errors.go", SERVICE_ERRORS_GO);

        render_database(&entities, ctx);
        ctx.set_metadata("has:repositories", "true");
        Ok(())
    }
}

const REPOSITORY_ERRORS_GO: &str = r#"package repository

import "errors"

// ErrNotFound is returned when no row matches the key.
var ErrNotFound = errors.New("record not found")
"#;

const SERVICE_ERRORS_GO: &str = r#"package service

import (
	"errors"
	"fmt"
)

// ErrNotFound is wrapped by every lookup of a missing resource.
var ErrNotFound = errors.New("not found")

func notFound(resource string, id any) error {
	return fmt.Errorf("%s %v: %w", resource, id, ErrNotFound)
}
"#;

/// Renders `internal/database/database.go`: the driver and the
/// `AutoMigrate` list, which includes accounts once auth is enabled.
pub(crate) fn render_database(entities: &[Entity<'_>], ctx: &mut GenerationContext) {
    let module = module_path(&ctx.options);
    let has_auth = ctx.has_metadata("has:auth");
    let (driver_module, _) = driver(ctx.options.database);
    let driver_pkg = driver_module.rsplit('/').next().unwrap_or(driver_module);

    let mut paths = vec![
        format!("{module}/internal/models"),
        driver_module.to_string(),
        "gorm.io/gorm".to_string(),
    ];
    let mut models: Vec<String> = entities
        .iter()
        .map(|e| format!("\t\t&models.{}{{}},\n", e.names.pascal))
        .collect();
    if has_auth {
        paths.push(format!("{module}/internal/auth"));
        models.push("\t\t&auth.Account{},\n".to_string());
    }

    let code = format!(
        r#"package database

{imports}
// Open connects to the database described by dsn.
func Open(dsn string) (*gorm.DB, error) {{
	return gorm.Open({driver_pkg}.Open(dsn), &gorm.Config{{}})
}}

// Migrate creates or updates the table of every model.
func Migrate(db *gorm.DB) error {{
	return db.AutoMigrate(
{models}	)
}}
"#,
        imports = imports(&module, &paths),
        models = models.concat(),
    );
    ctx.set_file("internal/database/database.go", code);
}

fn generate_repository(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let id = id_type(entity);
    let mut paths = vec![
        "context".to_string(),
        "errors".to_string(),
        format!("{module}/internal/models"),
        "gorm.io/gorm".to_string(),
    ];
    if id.starts_with("uuid.") {
        paths.push("github.com/google/uuid".to_string());
    }

    format!(
        r#"package repository

{imports}
// {pascal}Repository persists {plural}.
type {pascal}Repository interface {{
	List(ctx context.Context, offset, limit int) ([]models.{pascal}, int64, error)
	Get(ctx context.Context, id {id}) (*models.{pascal}, error)
	Create(ctx context.Context, m *models.{pascal}) error
	Update(ctx context.Context, m *models.{pascal}) error
	Delete(ctx context.Context, m *models.{pascal}) error
}}

type gorm{pascal}Repository struct {{
	db *gorm.DB
}}

// New{pascal}Repository returns a GORM-backed {pascal}Repository.
func New{pascal}Repository(db *gorm.DB) {pascal}Repository {{
	return &gorm{pascal}Repository{{db: db}}
}}

func (r *gorm{pascal}Repository) List(ctx context.Context, offset, limit int) ([]models.{pascal}, int64, error) {{
	var total int64
	if err := r.db.WithContext(ctx).Model(&models.{pascal}{{}}).Count(&total).Error; err != nil {{
		return nil, 0, err
	}}
	var items []models.{pascal}
	err := r.db.WithContext(ctx).Order("{key}").Offset(offset).Limit(limit).Find(&items).Error
	return items, total, err
}}

func (r *gorm{pascal}Repository) Get(ctx context.Context, id {id}) (*models.{pascal}, error) {{
	var m models.{pascal}
	err := r.db.WithContext(ctx).First(&m, "{key} = ?", id).Error
	if errors.Is(err, gorm.ErrRecordNotFound) {{
		return nil, ErrNotFound
	}}
	if err != nil {{
		return nil, err
	}}
	return &m, nil
}}

func (r *gorm{pascal}Repository) Create(ctx context.Context, m *models.{pascal}) error {{
	return r.db.WithContext(ctx).Create(m).Error
}}

func (r *gorm{pascal}Repository) Update(ctx context.Context, m *models.{pascal}) error {{
	return r.db.WithContext(ctx).Save(m).Error
}}

func (r *gorm{pascal}Repository) Delete(ctx context.Context, m *models.{pascal}) error {{
	return r.db.WithContext(ctx).Delete(m).Error
}}
"#,
        imports = imports(module, &paths),
        plural = entity.names.snake_plural.replace('_', " "),
        key = entity.id.column.name,
    )
}

fn generate_service(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let id = id_type(entity);
    let key = field_name(&entity.id);
    let assign_key = if entity.id.column.is_generated() {
        String::new()
    } else {
        format!("\tif req.{key} != nil {{\n\t\tm.{key} = *req.{key}\n\t}}\n")
    };
    let mut paths = vec![
        "context".to_string(),
        "errors".to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/models"),
        format!("{module}/internal/repository"),
    ];
    if id.starts_with("uuid.") {
        paths.push("github.com/google/uuid".to_string());
    }

    format!(
        r#"package service

{imports}
// {pascal}Service holds the business rules for {plural}.
type {pascal}Service struct {{
	repo repository.{pascal}Repository
}}

func New{pascal}Service(repo repository.{pascal}Repository) *{pascal}Service {{
	return &{pascal}Service{{repo: repo}}
}}

func (s *{pascal}Service) List(ctx context.Context, page, size int) (dto.Page[dto.{pascal}Response], error) {{
	page, size = dto.Clamp(page, size)
	items, total, err := s.repo.List(ctx, (page-1)*size, size)
	if err != nil {{
		return dto.Page[dto.{pascal}Response]{{}}, err
	}}
	out := make([]dto.{pascal}Response, 0, len(items))
	for i := range items {{
		out = append(out, dto.New{pascal}Response(&items[i]))
	}}
	return dto.Page[dto.{pascal}Response]{{Items: out, Page: page, PageSize: size, Total: total}}, nil
}}

func (s *{pascal}Service) Get(ctx context.Context, id {id}) (dto.{pascal}Response, error) {{
	m, err := s.find(ctx, id)
	if err != nil {{
		return dto.{pascal}Response{{}}, err
	}}
	return dto.New{pascal}Response(m), nil
}}

func (s *{pascal}Service) Create(ctx context.Context, req dto.{pascal}Request) (dto.{pascal}Response, error) {{
	var m models.{pascal}
{assign_key}	req.ApplyTo(&m)
	if err := s.repo.Create(ctx, &m); err != nil {{
		return dto.{pascal}Response{{}}, err
	}}
	return dto.New{pascal}Response(&m), nil
}}

func (s *{pascal}Service) Update(ctx context.Context, id {id}, req dto.{pascal}Request) (dto.{pascal}Response, error) {{
	m, err := s.find(ctx, id)
	if err != nil {{
		return dto.{pascal}Response{{}}, err
	}}
	req.ApplyTo(m)
	if err := s.repo.Update(ctx, m); err != nil {{
		return dto.{pascal}Response{{}}, err
	}}
	return dto.New{pascal}Response(m), nil
}}

func (s *{pascal}Service) Delete(ctx context.Context, id {id}) error {{
	m, err := s.find(ctx, id)
	if err != nil {{
		return err
	}}
	return s.repo.Delete(ctx, m)
}}

func (s *{pascal}Service) find(ctx context.Context, id {id}) (*models.{pascal}, error) {{
	m, err := s.repo.Get(ctx, id)
	if errors.Is(err, repository.ErrNotFound) {{
		return nil, notFound("{snake}", id)
	}}
	return m, err
}}
"#,
        imports = imports(module, &paths),
        plural = entity.names.snake_plural.replace('_', " "),
        snake = entity.names.snake,
    )
}
