//! FastAPI routers and the application factory.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::options::GeneratorOptions;
use crate::pass::{GenerationContext, Pass};
use crate::python::{database_url, id_type, Imports};
use crate::types::{PythonTypes, TypeMapper};
use crate::CodegenError;

/// Writes one router per entity, `app/main.py` and the project docs.
pub struct FastApiWebPass;

impl Pass for FastApiWebPass {
    fn name(&self) -> &'static str {
        "fastapi"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["python-data", "python-auth", "python-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let auth = ctx.has_metadata("has:auth");
        let storage = ctx.has_metadata("has:storage");
        for entity in &entities {
            ctx.set_file(
                format!("app/routers/{}.py", entity.names.snake_plural),
                generate_router(entity, auth),
            );
        }
        if storage {
            ctx.set_file("app/routers/files.py", generate_files_router(auth));
        }
        ctx.set_file("app/routers/__init__.py", "");
        ctx.set_file("app/main.py", generate_main(&entities, auth, storage));
        ctx.set_file(".env.example", generate_env(&ctx.options, auth, storage));
        ctx.set_file("README.md", generate_readme(&entities, &ctx.options, auth, storage));
        Ok(())
    }
}

fn router_decl(tag: &str, prefix: &str, auth: bool) -> String {
    if auth {
        format!(
            "router = APIRouter(\n    prefix=\"/{prefix}\",\n    tags=[\"{tag}\"],\n    dependencies=[Depends(current_account)],\n)\n"
        )
    } else {
        format!("router = APIRouter(prefix=\"/{prefix}\", tags=[\"{tag}\"])\n")
    }
}

fn generate_router(entity: &Entity<'_>, auth: bool) -> String {
    let snake = &entity.names.snake;
    let plural = &entity.names.snake_plural;
    let p = &entity.names.pascal;
    let mut imports = Imports::new();
    imports.add("typing", "Annotated");
    imports.add("fastapi", "APIRouter");
    imports.add("fastapi", "Depends");
    imports.add("fastapi", "status");
    imports.add("sqlalchemy.orm", "Session");
    imports.add("app.database", "get_db");
    imports.add(&format!("app.repositories.{snake}"), &format!("{p}Repository"));
    imports.add("app.schemas.page", "DEFAULT_PAGE_SIZE");
    imports.add("app.schemas.page", "Page");
    for suffix in ["Create", "Read", "Update"] {
        imports.add(&format!("app.schemas.{snake}"), &format!("{p}{suffix}"));
    }
    imports.add(&format!("app.services.{snake}"), &format!("{p}Service"));
    if auth {
        imports.add("app.auth.security", "current_account");
    }
    if let Some(line) = PythonTypes.import_for(&entity.id.column.sql_type) {
        imports.add_line(line);
    }

    format!(
        r#"{imports}
{router}

def get_service(db: Annotated[Session, Depends(get_db)]) -> {p}Service:
    return {p}Service({p}Repository(db))


Service = Annotated[{p}Service, Depends(get_service)]


@router.get("", response_model=Page[{p}Read])
def list_{plural}(service: Service, page: int = 1, page_size: int = DEFAULT_PAGE_SIZE):
    return service.list_page(page, page_size)


@router.get("/{{item_id}}", response_model={p}Read)
def get_{snake}(item_id: {id_ty}, service: Service):
    return service.get(item_id)


@router.post("", response_model={p}Read, status_code=status.HTTP_201_CREATED)
def create_{snake}(data: {p}Create, service: Service):
    return service.create(data)


@router.put("/{{item_id}}", response_model={p}Read)
def update_{snake}(item_id: {id_ty}, data: {p}Update, service: Service):
    return service.update(item_id, data)


@router.delete("/{{item_id}}", status_code=status.HTTP_204_NO_CONTENT)
def delete_{snake}(item_id: {id_ty}, service: Service) -> None:
    service.delete(item_id)
"#,
        imports = imports.render(),
        router = router_decl(plural, &entity.names.route, auth),
        id_ty = id_type(entity),
    )
}

fn generate_files_router(auth: bool) -> String {
    let mut imports = Imports::new();
    imports.add("typing", "Annotated");
    imports.add("fastapi", "APIRouter");
    imports.add("fastapi", "Depends");
    imports.add("fastapi", "HTTPException");
    imports.add("fastapi", "UploadFile");
    imports.add("fastapi", "status");
    imports.add("fastapi.responses", "FileResponse");
    imports.add("app.storage", "LocalStorage");
    imports.add("app.storage", "TooLargeError");
    imports.add("app.storage", "get_storage");
    if auth {
        imports.add("app.auth.security", "current_account");
    }
    format!(
        r#"{imports}
{router}
Storage = Annotated[LocalStorage, Depends(get_storage)]


@router.post("", status_code=status.HTTP_201_CREATED)
def upload_file(file: UploadFile, storage: Storage) -> dict[str, object]:
    try:
        name, size = storage.save(file)
    except TooLargeError:
        raise HTTPException(
            status_code=status.HTTP_413_REQUEST_ENTITY_TOO_LARGE, detail="file too large"
        ) from None
    return {{"name": name, "size": size}}


@router.get("/{{name}}")
def download_file(name: str, storage: Storage) -> FileResponse:
    path = storage.resolve(name)
    if path is None:
        raise HTTPException(status_code=status.HTTP_404_NOT_FOUND, detail="file not found")
    return FileResponse(path, filename=name)
"#,
        imports = imports.render(),
        router = router_decl("files", "files", auth),
    )
}

fn generate_main(entities: &[Entity<'_>], auth: bool, storage: bool) -> String {
    let mut imports = Imports::new();
    imports.add("collections.abc", "AsyncIterator");
    imports.add("contextlib", "asynccontextmanager");
    imports.add("typing", "Optional");
    imports.add("fastapi", "FastAPI");
    imports.add("fastapi", "Request");
    imports.add("fastapi.responses", "JSONResponse");
    imports.add("sqlalchemy.exc", "IntegrityError");
    imports.add("app", "models");
    imports.add("app.config", "Settings");
    imports.add("app.config", "get_settings");
    imports.add("app.database", "Base");
    imports.add("app.database", "engine");
    imports.add("app.errors", "NotFoundError");

    let mut routers = Vec::new();
    if auth {
        imports.add("app.auth.router", "router as auth_router");
        routers.push("auth_router".to_string());
    }
    for entity in entities {
        imports.add("app.routers", &entity.names.snake_plural);
        routers.push(format!("{}.router", entity.names.snake_plural));
    }
    if storage {
        imports.add("app.routers", "files");
        routers.push("files.router".to_string());
    }
    let includes: String = routers
        .iter()
        .map(|r| format!("    app.include_router({r}, prefix=settings.api_prefix)\n"))
        .collect();

    format!(
        r#"import logging
{imports}
logger = logging.getLogger(__name__)

__all__ = ["app", "create_app", "models"]


@asynccontextmanager
async def lifespan(_app: FastAPI) -> AsyncIterator[None]:
    Base.metadata.create_all(bind=engine)
    yield


def create_app(settings: Optional[Settings] = None) -> FastAPI:
    settings = settings or get_settings()
    logging.basicConfig(level=settings.log_level)
    app = FastAPI(title=settings.app_name, lifespan=lifespan)

    @app.exception_handler(NotFoundError)
    async def not_found(_request: Request, exc: NotFoundError) -> JSONResponse:
        return JSONResponse(status_code=404, content={{"detail": str(exc)}})

    @app.exception_handler(IntegrityError)
    async def conflict(_request: Request, exc: IntegrityError) -> JSONResponse:
        logger.warning("integrity error: %s", exc.orig)
        return JSONResponse(status_code=409, content={{"detail": "conflicts with existing data"}})

    @app.get("/health", tags=["health"])
    def health() -> dict[str, str]:
        return {{"status": "ok"}}

{includes}    return app


app = create_app()
"#,
        imports = imports.render(),
    )
}

fn generate_env(options: &GeneratorOptions, auth: bool, storage: bool) -> String {
    let mut out = format!(
        "DATABASE_URL={}\nAPI_PREFIX={}\nLOG_LEVEL=INFO\n",
        database_url(options),
        options.api_prefix
    );
    if auth {
        out.push_str("JWT_SECRET=change-me-to-a-long-random-string\nJWT_EXPIRE_MINUTES=1440\n");
    }
    if storage {
        out.push_str("UPLOAD_DIR=uploads\n");
    }
    out
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

FastAPI service backed by SQLAlchemy 2.0. Tables are created on startup.

## Running

```sh
python -m venv .venv && . .venv/bin/activate
pip install -r requirements-dev.txt
cp .env.example .env
uvicorn app.main:app --reload
pytest
```

## Endpoints

| Method | Path | Notes |
|--------|------|-------|
{endpoints}{guard_note}"#,
        name = options.project_name,
    )
}
