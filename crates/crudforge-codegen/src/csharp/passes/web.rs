//! ASP.NET Core controllers and application host.

use crudforge_schema::SqlSchema;

use crate::csharp::{id_type, namespace, project, provider_call, src_path};
use crate::model::{entities, Entity};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Generates `Controllers/`, `Program.cs`, `appsettings.json` and the
/// solution README.
pub struct AspNetWebPass;

impl Pass for AspNetWebPass {
    fn name(&self) -> &'static str {
        "aspnet"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["csharp-data", "csharp-auth", "csharp-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let namespace = namespace(&ctx.options);
        let has_auth = ctx.has_metadata("has:auth");
        let has_storage = ctx.has_metadata("has:storage");

        for entity in &entities {
            let path = src_path(
                &ctx.options,
                &format!("Controllers/{}Controller.cs", entity.names.pascal_plural),
            );
            let code = generate_controller(&namespace, &ctx.options, entity, has_auth);
            ctx.set_file(path, code);
        }

        let path = src_path(&ctx.options, "Exceptions/NotFoundExceptionHandler.cs");
        ctx.set_file(path, generate_exception_handler(&namespace));

        let program = generate_program(&namespace, &entities, ctx.options.database, has_auth, has_storage);
        ctx.set_file(src_path(&ctx.options, "Program.cs"), program);

        let settings = generate_appsettings(&ctx.options, has_auth, has_storage);
        ctx.set_file(src_path(&ctx.options, "appsettings.json"), settings);

        let readme = generate_readme(&entities, &ctx.options, has_auth, has_storage);
        ctx.set_file("README.md", readme);

        ctx.set_metadata("has:aspnet", "true");
        Ok(())
    }
}

fn generate_controller(
    namespace: &str,
    options: &GeneratorOptions,
    entity: &Entity<'_>,
    has_auth: bool,
) -> String {
    let pascal = &entity.names.pascal;
    let plural = &entity.names.pascal_plural;
    let route = options.route(&entity.names.route);
    let route = route.trim_start_matches('/');
    let (auth_using, authorize) = if has_auth {
        ("using Microsoft.AspNetCore.Authorization;\n", "[Authorize]\n")
    } else {
        ("", "")
    };

    format!(
        r#"using {namespace}.Dtos;
using {namespace}.Services;
{auth_using}using Microsoft.AspNetCore.Mvc;

namespace {namespace}.Controllers;

[ApiController]
[Route("{route}")]
{authorize}public class {plural}Controller : ControllerBase
{{
    private readonly {pascal}Service _service;

    public {plural}Controller({pascal}Service service)
    {{
        _service = service;
    }}

    [HttpGet]
    public Task<PagedResult<{pascal}Dto>> List([FromQuery] int page = 1, [FromQuery] int pageSize = 20, CancellationToken ct = default) =>
        _service.ListAsync(page, pageSize, ct);

    [HttpGet("{{id}}")]
    public Task<{pascal}Dto> Get({id} id, CancellationToken ct) =>
        _service.GetAsync(id, ct);

    [HttpPost]
    public async Task<ActionResult<{pascal}Dto>> Create({pascal}Request request, CancellationToken ct)
    {{
        var created = await _service.CreateAsync(request, ct);
        return CreatedAtAction(nameof(Get), new {{ id = created.{key} }}, created);
    }}

    [HttpPut("{{id}}")]
    public Task<{pascal}Dto> Update({id} id, {pascal}Request request, CancellationToken ct) =>
        _service.UpdateAsync(id, request, ct);

    [HttpDelete("{{id}}")]
    public async Task<IActionResult> Delete({id} id, CancellationToken ct)
    {{
        await _service.DeleteAsync(id, ct);
        return NoContent();
    }}
}}
"#,
        id = id_type(entity),
        key = entity.id.pascal,
    )
}

fn generate_exception_handler(namespace: &str) -> String {
    format!(
        r#"using Microsoft.AspNetCore.Diagnostics;
using Microsoft.AspNetCore.Mvc;

namespace {namespace}.Exceptions;

public class NotFoundExceptionHandler : IExceptionHandler
{{
    public async ValueTask<bool> TryHandleAsync(HttpContext httpContext, Exception exception, CancellationToken cancellationToken)
    {{
        if (exception is not NotFoundException notFound)
        {{
            return false;
        }}

        httpContext.Response.StatusCode = StatusCodes.Status404NotFound;
        await httpContext.Response.WriteAsJsonAsync(new ProblemDetails
        {{
            Status = StatusCodes.Status404NotFound,
            Title = $"{{notFound.Resource}} not found",
            Detail = notFound.Message,
        }}, cancellationToken);
        return true;
    }}
}}
"#
    )
}

fn generate_program(
    namespace: &str,
    entities: &[Entity<'_>],
    database: Database,
    has_auth: bool,
    has_storage: bool,
) -> String {
    let mut usings = vec![
        format!("using {namespace}.Data;"),
        format!("using {namespace}.Exceptions;"),
        format!("using {namespace}.Repositories;"),
        format!("using {namespace}.Services;"),
        "using Microsoft.EntityFrameworkCore;".to_string(),
    ];
    if has_auth {
        usings.push(format!("using {namespace}.Auth;"));
        usings.push("using Microsoft.AspNetCore.Authentication.JwtBearer;".to_string());
    }

    let mut services = String::new();
    for entity in entities {
        let pascal = &entity.names.pascal;
        services.push_str(&format!(
            "builder.Services.AddScoped<I{pascal}Repository, {pascal}Repository>();\nbuilder.Services.AddScoped<{pascal}Service>();\n"
        ));
    }
    if has_auth {
        services.push_str(
            r#"builder.Services.AddSingleton<TokenService>();
builder.Services
    .AddAuthentication(JwtBearerDefaults.AuthenticationScheme)
    .AddJwtBearer(options => options.TokenValidationParameters = TokenService.ValidationParameters(builder.Configuration));
builder.Services.AddAuthorization();
"#,
        );
    }
    if has_storage {
        services.push_str("builder.Services.AddSingleton<FileStorageService>();\n");
    }

    let middleware = if has_auth {
        "app.UseAuthentication();\napp.UseAuthorization();\n"
    } else {
        ""
    };

    format!(
        r#"{usings}

var builder = WebApplication.CreateBuilder(args);

var connectionString = builder.Configuration.GetConnectionString("Default")
    ?? throw new InvalidOperationException("ConnectionStrings:Default is not configured");
builder.Services.AddDbContext<AppDbContext>(options => {provider});

{services}builder.Services.AddControllers();
builder.Services.AddExceptionHandler<NotFoundExceptionHandler>();
builder.Services.AddProblemDetails();

var app = builder.Build();

using (var scope = app.Services.CreateScope())
{{
    scope.ServiceProvider.GetRequiredService<AppDbContext>().Database.EnsureCreated();
}}

app.UseExceptionHandler();
{middleware}app.MapGet("/health", () => Results.Ok(new {{ status = "ok" }}));
app.MapControllers();

app.Run();

public partial class Program {{ }}
"#,
        usings = usings.join("\n"),
        provider = provider_call(database),
    )
}

fn connection_string(options: &GeneratorOptions) -> String {
    let db = options.snake_name();
    match options.database {
        Database::Postgres => {
            format!("Host=localhost;Port=5432;Database={db};Username=postgres;Password=postgres")
        }
        Database::Mysql => format!("Server=localhost;Port=3306;Database={db};User=root;Password=root"),
        Database::Sqlite => format!("Data Source={db}.db"),
    }
}

fn generate_appsettings(options: &GeneratorOptions, has_auth: bool, has_storage: bool) -> String {
    let mut sections = vec![
        r#"  "Logging": {
    "LogLevel": {
      "Default": "Information",
      "Microsoft.AspNetCore": "Warning"
    }
  }"#
        .to_string(),
        r#"  "AllowedHosts": "*""#.to_string(),
        format!(
            "  \"ConnectionStrings\": {{\n    \"Default\": \"{}\"\n  }}",
            connection_string(options)
        ),
    ];
    if has_auth {
        sections.push(format!(
            "  \"Jwt\": {{\n    \"Secret\": \"change-me-to-a-long-random-secret-value\",\n    \"Issuer\": \"{}\",\n    \"ExpirationMinutes\": 60\n  }}",
            options.project_name
        ));
    }
    if has_storage {
        sections.push("  \"Storage\": {\n    \"Directory\": \"uploads\"\n  }".to_string());
    }
    format!("{{\n{}\n}}\n", sections.join(",\n"))
}

fn generate_readme(
    entities: &[Entity<'_>],
    options: &GeneratorOptions,
    has_auth: bool,
    has_storage: bool,
) -> String {
    let mut out = format!(
        "# {}\n\nASP.NET Core 8 service generated by crudforge ({} database).\n\n## Running\n\n```sh\ndotnet run --project src/{}\n```\n\n## Resources\n\n",
        options.project_name,
        options.database,
        project(options)
    );
    for entity in entities {
        out.push_str(&format!(
            "- `{}` ({})\n",
            options.route(&entity.names.route),
            entity.names.pascal
        ));
    }
    if has_auth {
        out.push_str(&format!(
            "\nRegister or log in at `{}` to obtain a bearer token.\n",
            options.route("auth")
        ));
    }
    if has_storage {
        out.push_str(&format!(
            "\nFiles are uploaded to `{}` and stored under `Storage:Directory`.\n",
            options.route("files")
        ));
    }
    out
}
