//! Axum web framework pass for Rust.

use crudforge_schema::SqlSchema;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::rust::{base_type, crate_ident, field_ident, format_rust, render_cargo_toml, DEP_TOKIO};
use crate::CodegenError;

/// Axum pass that generates handlers, routing and the binary entry point.
///
/// It depends on the auth and storage passes so that it can read their
/// `has:auth` / `has:storage` flags and wire the guard and upload routes.
pub struct AxumPass;

impl Pass for AxumPass {
    fn name(&self) -> &'static str {
        "axum"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["rust-data", "rust-auth", "rust-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let has_auth = ctx.has_metadata("has:auth");
        let has_storage = ctx.has_metadata("has:storage");

        for entity in &entities {
            let code = generate_handlers(entity)?;
            ctx.set_file(format!("src/handlers/{}.rs", entity.names.snake), code);
        }
        ctx.set_file("src/handlers/mod.rs", generate_handlers_mod(&entities)?);
        ctx.set_file(
            "src/routes.rs",
            generate_routes(&entities, &ctx.options.api_prefix, has_auth, has_storage)?,
        );
        ctx.set_file("src/config.rs", generate_config(has_auth, has_storage)?);
        ctx.set_file("src/state.rs", generate_state()?);
        ctx.set_file("src/lib.rs", generate_lib(has_auth, has_storage)?);
        let krate = crate_ident(&ctx.options);
        ctx.set_file("src/main.rs", generate_main(&krate)?);
        let env = generate_env(ctx, has_auth, has_storage);
        ctx.set_file(".env.example", env);
        let readme = generate_readme(&entities, ctx, has_auth, has_storage);
        ctx.set_file("README.md", readme);

        let axum = if has_storage {
            r#"{ version = "0.8", features = ["multipart"] }"#
        } else {
            "\"0.8\""
        };
        ctx.set_metadata("cargo:dep:axum", axum);
        ctx.set_metadata("cargo:dep:tokio", DEP_TOKIO);
        ctx.set_metadata(
            "cargo:dep:tower-http",
            r#"{ version = "0.6", features = ["cors", "trace"] }"#,
        );
        ctx.set_metadata(
            "cargo:dep:tracing-subscriber",
            r#"{ version = "0.3", features = ["env-filter"] }"#,
        );
        ctx.set_metadata("cargo:dep:dotenvy", "\"0.15\"");
        render_cargo_toml(ctx);

        ctx.set_metadata("has:axum", "true");

        Ok(())
    }
}

/// Generates the CRUD handlers and router for one entity.
fn generate_handlers(entity: &Entity<'_>) -> Result<String, CodegenError> {
    let pascal = &entity.names.pascal;
    let create_ident = format_ident!("Create{}", pascal);
    let update_ident = format_ident!("Update{}", pascal);
    let response_ident = format_ident!("{}Response", pascal);
    let service_ident = format_ident!("{}Service", pascal);
    let id_ty = base_type(entity.id.column)?;
    let doc = format!("`/{}` endpoints.", entity.names.route);

    format_rust(quote! {
        #![doc = #doc]

        use axum::extract::{Path, Query, State};
        use axum::http::StatusCode;
        use axum::routing::get;
        use axum::{Json, Router};

        use crate::error::AppError;
        use crate::models::{#create_ident, #response_ident, #update_ident, Page, Pagination};
        use crate::services::#service_ident;
        use crate::state::AppState;

        pub fn router() -> Router<AppState> {
            Router::new()
                .route("/", get(list).post(create))
                .route("/{id}", get(show).put(update).delete(remove))
        }

        fn service(state: &AppState) -> #service_ident {
            #service_ident::new(state.pool.clone())
        }

        async fn list(
            State(state): State<AppState>,
            Query(page): Query<Pagination>,
        ) -> Result<Json<Page<#response_ident>>, AppError> {
            let items = service(&state).list(&page).await?;
            Ok(Json(Page {
                items: items.into_iter().map(#response_ident::from).collect(),
                page: page.page,
                per_page: page.per_page,
            }))
        }

        async fn show(
            State(state): State<AppState>,
            Path(id): Path<#id_ty>,
        ) -> Result<Json<#response_ident>, AppError> {
            let entity = service(&state).get(id).await?;
            Ok(Json(entity.into()))
        }

        async fn create(
            State(state): State<AppState>,
            Json(input): Json<#create_ident>,
        ) -> Result<(StatusCode, Json<#response_ident>), AppError> {
            let entity = service(&state).create(input).await?;
            Ok((StatusCode::CREATED, Json(entity.into())))
        }

        async fn update(
            State(state): State<AppState>,
            Path(id): Path<#id_ty>,
            Json(input): Json<#update_ident>,
        ) -> Result<Json<#response_ident>, AppError> {
            let entity = service(&state).update(id, input).await?;
            Ok(Json(entity.into()))
        }

        async fn remove(
            State(state): State<AppState>,
            Path(id): Path<#id_ty>,
        ) -> Result<StatusCode, AppError> {
            service(&state).delete(id).await?;
            Ok(StatusCode::NO_CONTENT)
        }
    })
}

fn generate_handlers_mod(entities: &[Entity<'_>]) -> Result<String, CodegenError> {
    let modules: Vec<TokenStream> = entities
        .iter()
        .map(|e| {
            let module = field_ident(&e.names.snake);
            quote! { pub mod #module; }
        })
        .collect();

    format_rust(quote! {
        //! HTTP handlers, one module per resource.

        #(#modules)*
    })
}

/// Generates the top-level router.
fn generate_routes(
    entities: &[Entity<'_>],
    api_prefix: &str,
    has_auth: bool,
    has_storage: bool,
) -> Result<String, CodegenError> {
    let nests: Vec<TokenStream> = entities
        .iter()
        .map(|e| {
            let module = field_ident(&e.names.snake);
            let path = format!("/{}", e.names.route);
            quote! { .nest(#path, handlers::#module::router()) }
        })
        .collect();

    let storage = if has_storage {
        quote! { let api = api.merge(storage::router()); }
    } else {
        quote! {}
    };
    let (auth_use, auth) = if has_auth {
        (
            quote! { use crate::auth; },
            quote! {
                let api = api
                    .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth))
                    .merge(auth::router());
            },
        )
    } else {
        (quote! {}, quote! {})
    };
    let storage_use = if has_storage {
        quote! { use crate::storage; }
    } else {
        quote! {}
    };
    let middleware_use = if has_auth {
        quote! { use axum::middleware; }
    } else {
        quote! {}
    };
    let mount = if api_prefix.is_empty() {
        quote! { Router::new().merge(api) }
    } else {
        quote! { Router::new().nest(#api_prefix, api) }
    };

    format_rust(quote! {
        //! Route table.

        #middleware_use
        use axum::routing::get;
        use axum::Router;
        use tower_http::cors::CorsLayer;
        use tower_http::trace::TraceLayer;

        #auth_use
        use crate::handlers;
        use crate::state::AppState;
        #storage_use

        /// Builds the application router.
        pub fn router(state: AppState) -> Router {
            let api = Router::new()
                #(#nests)*;
            #storage
            #auth

            #mount
                .route("/health", get(health))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .with_state(state)
        }

        async fn health() -> &'static str {
            "ok"
        }
    })
}

fn generate_config(has_auth: bool, has_storage: bool) -> Result<String, CodegenError> {
    let mut fields = Vec::new();
    let mut init = Vec::new();
    if has_auth {
        fields.push(quote! {
            /// Secret used to sign access tokens.
            pub jwt_secret: String,
        });
        init.push(quote! { jwt_secret: env::var("JWT_SECRET")?, });
    }
    if has_storage {
        fields.push(quote! {
            /// Directory for uploaded files.
            pub upload_dir: String,
        });
        init.push(quote! {
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
        });
    }

    format_rust(quote! {
        //! Runtime configuration from the environment.

        use std::env;

        #[derive(Debug, Clone)]
        pub struct Config {
            pub database_url: String,
            pub bind_addr: String,
            #(#fields)*
        }

        impl Config {
            /// Reads the configuration; `.env` is loaded by `main` beforehand.
            pub fn from_env() -> Result<Self, env::VarError> {
                Ok(Self {
                    database_url: env::var("DATABASE_URL")?,
                    bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
                    #(#init)*
                })
            }
        }
    })
}

fn generate_state() -> Result<String, CodegenError> {
    format_rust(quote! {
        //! Shared application state.

        use std::sync::Arc;

        use crate::config::Config;
        use crate::db::DbPool;

        #[derive(Clone)]
        pub struct AppState {
            pub pool: DbPool,
            pub config: Arc<Config>,
        }

        impl AppState {
            pub fn new(pool: DbPool, config: Config) -> Self {
                Self {
                    pool,
                    config: Arc::new(config),
                }
            }
        }
    })
}

fn generate_lib(has_auth: bool, has_storage: bool) -> Result<String, CodegenError> {
    let auth = if has_auth {
        quote! { pub mod auth; }
    } else {
        quote! {}
    };
    let storage = if has_storage {
        quote! { pub mod storage; }
    } else {
        quote! {}
    };

    format_rust(quote! {
        //! Generated by crudforge.

        #auth
        pub mod config;
        pub mod db;
        pub mod error;
        pub mod handlers;
        pub mod models;
        pub mod repositories;
        pub mod routes;
        pub mod services;
        pub mod state;
        #storage
    })
}

fn generate_main(krate: &Ident) -> Result<String, CodegenError> {
    format_rust(quote! {
        use tracing_subscriber::EnvFilter;

        use #krate::config::Config;
        use #krate::state::AppState;
        use #krate::{db, routes};

        #[tokio::main]
        async fn main() -> Result<(), Box<dyn std::error::Error>> {
            dotenvy::dotenv().ok();
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let config = Config::from_env()?;
            let pool = db::connect(&config.database_url).await?;
            let addr = config.bind_addr.clone();
            let app = routes::router(AppState::new(pool, config));

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app).await?;
            Ok(())
        }
    })
}

fn generate_env(ctx: &GenerationContext, has_auth: bool, has_storage: bool) -> String {
    let mut out = format!(
        "DATABASE_URL={}\nBIND_ADDR=0.0.0.0:3000\nRUST_LOG=info\n",
        ctx.options.database.example_url(&ctx.options.snake_name())
    );
    if has_auth {
        out.push_str("JWT_SECRET=change-me\n");
    }
    if has_storage {
        out.push_str("UPLOAD_DIR=uploads\n");
    }
    out
}

fn generate_readme(
    entities: &[Entity<'_>],
    ctx: &GenerationContext,
    has_auth: bool,
    has_storage: bool,
) -> String {
    let opts = &ctx.options;
    let mut out = format!(
        "# {}\n\nAxum + SQLx service generated by crudforge ({} database).\n\n## Running\n\n```sh\ncp .env.example .env\ncargo run\n```\n\nMigrations in `migrations/` run on startup.\n\n## Endpoints\n\n| Method | Path |\n|--------|------|\n",
        opts.project_name, opts.database
    );
    for entity in entities {
        let route = opts.route(&entity.names.route);
        out.push_str(&format!("| GET | {route} |\n| GET | {route}/{{id}} |\n| POST | {route} |\n| PUT | {route}/{{id}} |\n| DELETE | {route}/{{id}} |\n"));
    }
    if has_auth {
        out.push_str(&format!(
            "| POST | {} |\n| POST | {} |\n",
            opts.route("auth/register"),
            opts.route("auth/login")
        ));
    }
    if has_storage {
        out.push_str(&format!(
            "| POST | {} |\n| GET | {}/{{name}} |\n",
            opts.route("files"),
            opts.route("files")
        ));
    }
    if has_auth {
        out.push_str("\nResource routes require an `Authorization: Bearer <token>` header.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;
    use crate::rust::axum_stack;
    use crate::GeneratorOptions;

    #[test]
    fn test_handlers_use_axum_08_paths() {
        let schema = blog();
        let entities = entities(&schema);
        let code = generate_handlers(&entities[1]).unwrap();
        assert!(code.contains(".route(\"/{id}\", get(show).put(update).delete(remove))"));
        assert!(code.contains("Path(id): Path<i64>"));
        assert!(code.contains("StatusCode::CREATED"));
    }

    #[test]
    fn test_routes_follow_flags() {
        let schema = blog();
        let files = axum_stack(&GeneratorOptions::default()).run(&schema).unwrap();
        let routes = &files.get("src/routes.rs").unwrap().content;
        assert!(routes.contains(".nest(\"/posts\", handlers::post::router())"));
        assert!(routes.contains("auth::require_auth"));
        assert!(routes.contains("storage::router()"));
        assert!(routes.contains(".nest(\"/api\", api)"));
        let cargo = &files.get("Cargo.toml").unwrap().content;
        assert!(cargo.contains("\"multipart\""));

        let mut bare = GeneratorOptions::default();
        bare.auth = false;
        bare.storage = false;
        bare.tests = false;
        bare.api_prefix = String::new();
        let files = axum_stack(&bare).run(&schema).unwrap();
        let routes = &files.get("src/routes.rs").unwrap().content;
        assert!(!routes.contains("auth"));
        assert!(!routes.contains("storage"));
        syn::parse_file(routes).unwrap();
        let compact: String = routes.split_whitespace().collect();
        assert!(compact.contains("Router::new().merge(api)"));
        assert!(files.get("src/auth.rs").is_none());
        assert!(!files.get("src/lib.rs").unwrap().content.contains("pub mod auth;"));
    }
}
