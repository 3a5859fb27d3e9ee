//! EF Core repositories and services.

use crudforge_schema::SqlSchema;

use crate::csharp::{id_type, namespace, render_db_context, src_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Generates `Repositories/`, `Services/`, `AppDbContext` and the not-found
/// exception.
pub struct CSharpDataPass;

impl Pass for CSharpDataPass {
    fn name(&self) -> &'static str {
        "csharp-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["csharp-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let namespace = namespace(&ctx.options);
        let entities = entities(schema);

        for entity in &entities {
            let pascal = &entity.names.pascal;
            let path = src_path(&ctx.options, &format!("Repositories/{pascal}Repository.cs"));
            ctx.set_file(path, generate_repository(&namespace, entity));
            let path = src_path(&ctx.options, &format!("Services/{pascal}Service.cs"));
            ctx.set_file(path, generate_service(&namespace, entity));
        }

        let path = src_path(&ctx.options, "Exceptions/NotFoundException.cs");
        ctx.set_file(path, generate_not_found(&namespace));

        render_db_context(&entities, ctx);
        ctx.set_metadata("has:repositories", "true");
        Ok(())
    }
}

fn generate_repository(namespace: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    format!(
        r#"using {namespace}.Data;
using {namespace}.Models;
using Microsoft.EntityFrameworkCore;

namespace {namespace}.Repositories;

public interface I{pascal}Repository
{{
    Task<(IReadOnlyList<{pascal}> Items, int Total)> GetPageAsync(int skip, int take, CancellationToken ct = default);
    Task<{pascal}?> GetByIdAsync({id} id, CancellationToken ct = default);
    Task AddAsync({pascal} entity, CancellationToken ct = default);
    Task UpdateAsync({pascal} entity, CancellationToken ct = default);
    Task DeleteAsync({pascal} entity, CancellationToken ct = default);
}}

public class {pascal}Repository : I{pascal}Repository
{{
    private readonly AppDbContext _db;

    public {pascal}Repository(AppDbContext db)
    {{
        _db = db;
    }}

    public async Task<(IReadOnlyList<{pascal}> Items, int Total)> GetPageAsync(int skip, int take, CancellationToken ct = default)
    {{
        var query = _db.{plural}.AsNoTracking().OrderBy(e => e.{key});
        var total = await query.CountAsync(ct);
        var items = await query.Skip(skip).Take(take).ToListAsync(ct);
        return (items, total);
    }}

    public Task<{pascal}?> GetByIdAsync({id} id, CancellationToken ct = default) =>
        _db.{plural}.FirstOrDefaultAsync(e => e.{key} == id, ct);

    public async Task AddAsync({pascal} entity, CancellationToken ct = default)
    {{
        _db.{plural}.Add(entity);
        await _db.SaveChangesAsync(ct);
    }}

    public async Task UpdateAsync({pascal} entity, CancellationToken ct = default)
    {{
        _db.{plural}.Update(entity);
        await _db.SaveChangesAsync(ct);
    }}

    public async Task DeleteAsync({pascal} entity, CancellationToken ct = default)
    {{
        _db.{plural}.Remove(entity);
        await _db.SaveChangesAsync(ct);
    }}
}}
"#,
        id = id_type(entity),
        key = entity.id.pascal,
        plural = entity.names.pascal_plural,
    )
}

fn generate_service(namespace: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let key = &entity.id.pascal;
    let assign_key = if entity.id.column.is_generated() {
        String::new()
    } else {
        format!(
            "        if (request.{key} is {{ }} key)\n        {{\n            entity.{key} = key;\n        }}\n"
        )
    };

    format!(
        r#"using {namespace}.Dtos;
using {namespace}.Exceptions;
using {namespace}.Models;
using {namespace}.Repositories;

namespace {namespace}.Services;

public class {pascal}Service
{{
    public const int MaxPageSize = 100;

    private readonly I{pascal}Repository _repository;

    public {pascal}Service(I{pascal}Repository repository)
    {{
        _repository = repository;
    }}

    public async Task<PagedResult<{pascal}Dto>> ListAsync(int page, int pageSize, CancellationToken ct = default)
    {{
        page = Math.Max(page, 1);
        pageSize = Math.Clamp(pageSize, 1, MaxPageSize);
        var (items, total) = await _repository.GetPageAsync((page - 1) * pageSize, pageSize, ct);
        return new PagedResult<{pascal}Dto>(items.Select({pascal}Dto.From).ToList(), page, pageSize, total);
    }}

    public async Task<{pascal}Dto> GetAsync({id} id, CancellationToken ct = default)
    {{
        var entity = await Find(id, ct);
        return {pascal}Dto.From(entity);
    }}

    public async Task<{pascal}Dto> CreateAsync({pascal}Request request, CancellationToken ct = default)
    {{
        var entity = new {pascal}();
{assign_key}        request.ApplyTo(entity);
        await _repository.AddAsync(entity, ct);
        return {pascal}Dto.From(entity);
    }}

    public async Task<{pascal}Dto> UpdateAsync({id} id, {pascal}Request request, CancellationToken ct = default)
    {{
        var entity = await Find(id, ct);
        request.ApplyTo(entity);
        await _repository.UpdateAsync(entity, ct);
        return {pascal}Dto.From(entity);
    }}

    public async Task DeleteAsync({id} id, CancellationToken ct = default)
    {{
        var entity = await Find(id, ct);
        await _repository.DeleteAsync(entity, ct);
    }}

    private async Task<{pascal}> Find({id} id, CancellationToken ct) =>
        await _repository.GetByIdAsync(id, ct) ?? throw new NotFoundException("{pascal}", id);
}}
"#,
        id = id_type(entity),
    )
}

fn generate_not_found(namespace: &str) -> String {
    format!(
        r#"namespace {namespace}.Exceptions;

public class NotFoundException : Exception
{{
    public NotFoundException(string resource, object id)
        : base($"{{resource}} {{id}} not found")
    {{
        Resource = resource;
    }}

    public string Resource {{ get; }}
}}
"#
    )
}
