//! Local file storage for ASP.NET Core.

use crudforge_schema::SqlSchema;

use crate::csharp::{namespace, src_path};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Adds `FileStorageService` and `FilesController` (`POST /files`,
/// `GET /files/{name}`).
pub struct CSharpStoragePass;

impl Pass for CSharpStoragePass {
    fn name(&self) -> &'static str {
        "csharp-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["csharp-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let namespace = namespace(&ctx.options);
        let route = ctx.options.route("files");
        let authorize = ctx.options.auth;

        let path = src_path(&ctx.options, "Services/FileStorageService.cs");
        ctx.set_file(path, generate_service(&namespace));
        let path = src_path(&ctx.options, "Controllers/FilesController.cs");
        ctx.set_file(
            path,
            generate_controller(&namespace, route.trim_start_matches('/'), authorize),
        );

        ctx.set_metadata("has:storage", "true");
        Ok(())
    }
}

fn generate_service(namespace: &str) -> String {
    format!(
        r#"using {namespace}.Exceptions;

namespace {namespace}.Services;

public record StoredFile(string Name, long Size);

public class FileStorageService
{{
    private readonly string _root;

    public FileStorageService(IConfiguration configuration)
    {{
        _root = Path.GetFullPath(configuration["Storage:Directory"] ?? "uploads");
    }}

    public async Task<StoredFile> SaveAsync(IFormFile file, CancellationToken ct = default)
    {{
        Directory.CreateDirectory(_root);
        var name = Guid.NewGuid().ToString("N") + Path.GetExtension(file.FileName);
        await using var stream = File.Create(Path.Combine(_root, name));
        await file.CopyToAsync(stream, ct);
        return new StoredFile(name, file.Length);
    }}

    public string Resolve(string name)
    {{
        var path = Path.GetFullPath(Path.Combine(_root, name));
        if (!path.StartsWith(_root + Path.DirectorySeparatorChar, StringComparison.Ordinal) || !File.Exists(path))
        {{
            throw new NotFoundException("File", name);
        }}
        return path;
    }}
}}
"#
    )
}

fn generate_controller(namespace: &str, route: &str, authorize: bool) -> String {
    let (auth_using, attribute) = if authorize {
        ("using Microsoft.AspNetCore.Authorization;\n", "[Authorize]\n")
    } else {
        ("", "")
    };
    format!(
        r#"using {namespace}.Services;
{auth_using}using Microsoft.AspNetCore.Mvc;

namespace {namespace}.Controllers;

[ApiController]
[Route("{route}")]
{attribute}public class FilesController : ControllerBase
{{
    private readonly FileStorageService _storage;

    public FilesController(FileStorageService storage)
    {{
        _storage = storage;
    }}

    [HttpPost]
    public async Task<ActionResult<StoredFile>> Upload(IFormFile file, CancellationToken ct)
    {{
        var stored = await _storage.SaveAsync(file, ct);
        return CreatedAtAction(nameof(Download), new {{ name = stored.Name }}, stored);
    }}

    [HttpGet("{{name}}")]
    public IActionResult Download(string name) =>
        PhysicalFile(_storage.Resolve(name), "application/octet-stream");
}}
"#
    )
}
