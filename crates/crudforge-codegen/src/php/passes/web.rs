//! Laravel HTTP layer: API controllers, `routes/api.php` and the
//! application bootstrap.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, Pass};
use crate::php::{api_prefix, connection, id_constraint, id_type, quote};
use crate::CodegenError;

/// Writes one API controller per entity, the route file, `bootstrap/app.php`
/// and the entry points.
pub struct LaravelWebPass;

impl Pass for LaravelWebPass {
    fn name(&self) -> &'static str {
        "laravel"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["php-data", "php-auth", "php-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        for entity in &entities {
            ctx.set_file(
                format!("app/Http/Controllers/Api/{}Controller.php", entity.names.pascal),
                generate_controller(entity),
            );
        }

        let auth = ctx.has_metadata("has:auth");
        let storage = ctx.has_metadata("has:storage");
        ctx.set_file("routes/api.php", generate_routes(&entities, auth, storage));
        ctx.set_file("bootstrap/app.php", generate_bootstrap(&ctx.options));
        ctx.set_file("app/Http/Controllers/Controller.php", BASE_CONTROLLER_PHP);
        ctx.set_file("artisan", ARTISAN);
        ctx.set_file("public/index.php", INDEX_PHP);
        ctx.set_file(".env.example", generate_env(&ctx.options, auth));
        ctx.set_file("README.md", generate_readme(&entities, &ctx.options, auth, storage));
        Ok(())
    }
}

const BASE_CONTROLLER_PHP: &str = r#"<?php

namespace App\Http\Controllers;

abstract class Controller
{
}
"#;

const ARTISAN: &str = r#"#!/usr/bin/env php
<?php

use Symfony\Component\Console\Input\ArgvInput;

define('LARAVEL_START', microtime(true));

require __DIR__.'/vendor/autoload.php';

$status = (require_once __DIR__.'/bootstrap/app.php')
    ->handleCommand(new ArgvInput);

exit($status);
"#;

const INDEX_PHP: &str = r#"<?php

use Illuminate\Http\Request;

define('LARAVEL_START', microtime(true));

require __DIR__.'/../vendor/autoload.php';

(require_once __DIR__.'/../bootstrap/app.php')
    ->handleRequest(Request::capture());
"#;

fn generate_controller(entity: &Entity<'_>) -> String {
    format!(
        r#"<?php

namespace App\Http\Controllers\Api;

use App\Http\Controllers\Controller;
use App\Http\Requests\Store{pascal}Request;
use App\Http\Requests\Update{pascal}Request;
use App\Http\Resources\{pascal}Resource;
use App\Services\{pascal}Service;
use App\Support\Paging;
use Illuminate\Http\JsonResponse;
use Illuminate\Http\Request;
use Illuminate\Http\Resources\Json\AnonymousResourceCollection;
use Illuminate\Http\Response;

class {pascal}Controller extends Controller
{{
    public function __construct(private readonly {pascal}Service ${plural})
    {{
    }}

    public function index(Request $request): AnonymousResourceCollection
    {{
        return {pascal}Resource::collection($this->{plural}->list(
            $request->integer('page', 1),
            $request->integer('page_size', Paging::DEFAULT_SIZE),
        ));
    }}

    public function show({id} $id): {pascal}Resource
    {{
        return new {pascal}Resource($this->{plural}->get($id));
    }}

    public function store(Store{pascal}Request $request): JsonResponse
    {{
        return (new {pascal}Resource($this->{plural}->create($request->validated())))
            ->response()
            ->setStatusCode(Response::HTTP_CREATED);
    }}

    public function update(Update{pascal}Request $request, {id} $id): {pascal}Resource
    {{
        return new {pascal}Resource($this->{plural}->update($id, $request->validated()));
    }}

    public function destroy({id} $id): Response
    {{
        $this->{plural}->delete($id);

        return response()->noContent();
    }}
}}
"#,
        pascal = entity.names.pascal,
        plural = entity.names.camel_plural,
        id = id_type(entity),
    )
}

fn entity_routes(entity: &Entity<'_>, indent: &str) -> String {
    let constraint = id_constraint(entity).unwrap_or("");
    let mut out = format!(
        "{indent}Route::controller({}Controller::class)->prefix({})->group(function () {{\n",
        entity.names.pascal,
        quote(&entity.names.route)
    );
    for (method, path, action) in [
        ("get", "/", "index"),
        ("post", "/", "store"),
        ("get", "/{id}", "show"),
        ("put", "/{id}", "update"),
        ("delete", "/{id}", "destroy"),
    ] {
        let constraint = if path == "/" { "" } else { constraint };
        out.push_str(&format!(
            "{indent}    Route::{method}('{path}', '{action}'){constraint};\n"
        ));
    }
    out.push_str(&format!("{indent}}});\n"));
    out
}

fn generate_routes(entities: &[Entity<'_>], auth: bool, storage: bool) -> String {
    let mut uses: Vec<String> = entities
        .iter()
        .map(|e| format!("App\\Http\\Controllers\\Api\\{}Controller", e.names.pascal))
        .collect();
    if auth {
        uses.push("App\\Http\\Controllers\\Api\\AuthController".to_string());
    }
    if storage {
        uses.push("App\\Http\\Controllers\\Api\\FileController".to_string());
    }
    uses.push("Illuminate\\Support\\Facades\\Route".to_string());
    uses.sort();
    let uses: String = uses.iter().map(|u| format!("use {u};\n")).collect();

    let indent = if auth { "    " } else { "" };
    let mut groups = Vec::new();
    for entity in entities {
        groups.push(entity_routes(entity, indent));
    }
    if storage {
        groups.push(format!(
            "{indent}Route::post('files', [FileController::class, 'store']);\n{indent}Route::get('files/{{name}}', [FileController::class, 'show']);\n"
        ));
    }
    let protected = groups.join("\n");

    let mut out = format!("<?php\n\n{uses}\n");
    if auth {
        out.push_str("Route::post('auth/register', [AuthController::class, 'register']);\n");
        out.push_str("Route::post('auth/login', [AuthController::class, 'login']);\n");
        if !protected.is_empty() {
            out.push_str(&format!(
                "\nRoute::middleware('auth:api')->group(function () {{\n{protected}}});\n"
            ));
        }
    } else {
        out.push_str(&protected);
    }
    out
}

fn generate_bootstrap(options: &GeneratorOptions) -> String {
    format!(
        r#"<?php

use Illuminate\Foundation\Application;
use Illuminate\Foundation\Configuration\Exceptions;
use Illuminate\Foundation\Configuration\Middleware;
use Illuminate\Http\Request;

return Application::configure(basePath: dirname(__DIR__))
    ->withRouting(
        api: __DIR__.'/../routes/api.php',
        apiPrefix: {prefix},
        health: '/health',
    )
    ->withMiddleware(function (Middleware $middleware) {{
        //
    }})
    ->withExceptions(function (Exceptions $exceptions) {{
        $exceptions->shouldRenderJsonWhen(fn (Request $request) => true);
    }})->create();
"#,
        prefix = quote(api_prefix(options)),
    )
}

fn generate_env(options: &GeneratorOptions, auth: bool) -> String {
    let db = options.snake_name();
    let database = match options.database {
        Database::Postgres => format!(
            "DB_CONNECTION={}\nDB_HOST=127.0.0.1\nDB_PORT=5432\nDB_DATABASE={db}\nDB_USERNAME=postgres\nDB_PASSWORD=postgres\n",
            connection(options.database)
        ),
        Database::Mysql => format!(
            "DB_CONNECTION={}\nDB_HOST=127.0.0.1\nDB_PORT=3306\nDB_DATABASE={db}\nDB_USERNAME=root\nDB_PASSWORD=root\n",
            connection(options.database)
        ),
        Database::Sqlite => format!(
            "DB_CONNECTION={}\nDB_DATABASE=database/database.sqlite\n",
            connection(options.database)
        ),
    };
    let jwt = if auth {
        "\nJWT_SECRET=change-me-to-a-long-random-string\nJWT_TTL=1440\n"
    } else {
        ""
    };
    format!(
        "APP_NAME={}\nAPP_ENV=local\nAPP_KEY=\nAPP_DEBUG=true\nAPP_URL=http://localhost:8000\n\nLOG_CHANNEL=stderr\nLOG_LEVEL=debug\n\n{database}\nSESSION_DRIVER=file\nCACHE_STORE=file\n{jwt}",
        options.pascal_name()
    )
}

fn generate_readme(
    entities: &[Entity<'_>],
    options: &GeneratorOptions,
    auth: bool,
    storage: bool,
) -> String {
    let mut endpoints = String::new();
    if auth {
        endpoints.push_str(&format!(
            "| POST | `{}` | register, returns a token |\n| POST | `{}` | log in, returns a token |\n",
            options.route("auth/register"),
            options.route("auth/login")
        ));
    }
    for entity in entities {
        let route = options.route(&entity.names.route);
        endpoints.push_str(&format!(
            "| GET, POST | `{route}` | list (`page`, `page_size`), create |\n| GET, PUT, DELETE | `{route}/{{id}}` | read, update, delete |\n"
        ));
    }
    if storage {
        endpoints.push_str(&format!(
            "| POST | `{files}` | upload (`file` form field) |\n| GET | `{files}/{{name}}` | download |\n",
            files = options.route("files")
        ));
    }
    let guard_note = if auth {
        "\nEverything except the auth endpoints and `/health` expects an\n`Authorization: Bearer <token>` header.\n"
    } else {
        ""
    };
    format!(
        r#"# {name}

Laravel 11 API backed by Eloquent.

## Running

```sh
composer install
cp .env.example .env
php artisan key:generate
php artisan migrate
php artisan serve
```

## Endpoints

| Method | Path | Notes |
|--------|------|-------|
{endpoints}{guard_note}"#,
        name = options.project_name,
    )
}
