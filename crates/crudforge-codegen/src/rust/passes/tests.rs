//! API test generation pass for Rust.

use crudforge_schema::SqlSchema;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::rust::{crate_ident, format_rust, render_cargo_toml};
use crate::CodegenError;

/// Writes `tests/<plural>_api.rs` for every entity.
///
/// Each file drives the router through `tower::ServiceExt::oneshot` over a
/// lazily connected pool, so the request-rejection tests run without a
/// database. A create/read/delete round trip is emitted as an ignored test
/// for entities whose required fields have no foreign keys.
pub struct RustTestsPass;

impl Pass for RustTestsPass {
    fn name(&self) -> &'static str {
        "rust-tests"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["axum"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let has_auth = ctx.has_metadata("has:auth");
        let has_storage = ctx.has_metadata("has:storage");

        for entity in &entities {
            let code = generate_api_test(entity, ctx, has_auth, has_storage)?;
            ctx.set_file(format!("tests/{}_api.rs", entity.names.snake_plural), code);
        }

        ctx.set_metadata("cargo:dev:tower", r#"{ version = "0.5", features = ["util"] }"#);
        ctx.set_metadata("cargo:dev:http-body-util", "\"0.1\"");
        render_cargo_toml(ctx);
        Ok(())
    }
}

fn generate_api_test(
    entity: &Entity<'_>,
    ctx: &GenerationContext,
    has_auth: bool,
    has_storage: bool,
) -> Result<String, CodegenError> {
    let krate = crate_ident(&ctx.options);
    let base = ctx.options.route(&entity.names.route);
    let plural = &entity.names.snake_plural;
    let snake = &entity.names.snake;
    let lazy_url = ctx.options.database.example_url("unused");

    let mut config_fields = Vec::new();
    if has_auth {
        config_fields.push(quote! { jwt_secret: SECRET.to_string(), });
    }
    if has_storage {
        config_fields.push(quote! {
            upload_dir: std::env::temp_dir().join("uploads").display().to_string(),
        });
    }
    let (secret, authorize) = if has_auth {
        (
            quote! { const SECRET: &str = "test-secret"; },
            quote! {
                fn authorize(builder: axum::http::request::Builder) -> axum::http::request::Builder {
                    let token = #krate::auth::issue_token("tester", SECRET).unwrap();
                    builder.header("authorization", format!("Bearer {token}"))
                }
            },
        )
    } else {
        (
            quote! {},
            quote! {
                fn authorize(builder: axum::http::request::Builder) -> axum::http::request::Builder {
                    builder
                }
            },
        )
    };

    let auth_test = if has_auth {
        let name = format_ident!("list_{}_requires_token", plural);
        quote! {
            #[tokio::test]
            async fn #name() {
                let response = app(lazy_pool())
                    .oneshot(Request::get(#base).body(Body::empty()).unwrap())
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
        }
    } else {
        quote! {}
    };

    let malformed = format_ident!("create_{}_rejects_malformed_json", snake);
    let round_trip = match entity.sample_payload(|f| f.snake.clone()) {
        Some(payload) => round_trip_test(snake, &base, &payload),
        None => quote! {},
    };

    format_rust(quote! {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        use #krate::config::Config;
        use #krate::state::AppState;
        use #krate::{db, routes};

        #secret

        fn config(database_url: String) -> Config {
            Config {
                database_url,
                bind_addr: "127.0.0.1:0".to_string(),
                #(#config_fields)*
            }
        }

        fn lazy_pool() -> db::DbPool {
            db::connect_lazy(#lazy_url).unwrap()
        }

        fn app(pool: db::DbPool) -> axum::Router {
            let url = std::env::var("DATABASE_URL").unwrap_or_default();
            routes::router(AppState::new(pool, config(url)))
        }

        #authorize

        #auth_test

        #[tokio::test]
        async fn #malformed() {
            let request = authorize(Request::post(#base))
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap();
            let response = app(lazy_pool()).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert!(!body.is_empty());
        }

        #round_trip
    })
}

fn round_trip_test(snake: &str, base: &str, payload: &str) -> TokenStream {
    let name = format_ident!("{}_round_trip", snake);
    quote! {
        #[tokio::test]
        #[ignore = "requires DATABASE_URL"]
        async fn #name() {
            let url = std::env::var("DATABASE_URL").unwrap();
            let pool = db::connect(&url).await.unwrap();
            let app = app(pool);

            let request = authorize(Request::post(#base))
                .header("content-type", "application/json")
                .body(Body::from(#payload))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let id = created["id"].to_string();
            let item = format!("{}/{}", #base, id.trim_matches('"'));

            let request = authorize(Request::get(&item)).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let request = authorize(Request::delete(&item)).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);

            let request = authorize(Request::get(&item)).body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;
    use crate::rust::axum_stack;
    use crate::{Database, GeneratorOptions};

    #[test]
    fn test_api_tests_per_entity() {
        let files = axum_stack(&GeneratorOptions::default()).run(&blog()).unwrap();
        let users = &files.get("tests/users_api.rs").unwrap().content;
        assert!(users.contains("async fn list_users_requires_token()"));
        assert!(users.contains("async fn user_round_trip()"));
        assert!(users.contains(r#"{\"email\": \"example\"}"#));
        assert!(users.contains("jwt_secret: SECRET.to_string(),"));

        let posts = &files.get("tests/posts_api.rs").unwrap().content;
        assert!(posts.contains("async fn create_post_rejects_malformed_json()"));
        assert!(!posts.contains("round_trip"));

        let cargo = &files.get("Cargo.toml").unwrap().content;
        assert!(cargo.contains("[dev-dependencies]\nhttp-body-util = \"0.1\"\ntower = "));
    }

    #[test]
    fn test_api_tests_without_auth() {
        let options = GeneratorOptions {
            auth: false,
            database: Database::Sqlite,
            ..GeneratorOptions::default()
        };
        let files = axum_stack(&options).run(&blog()).unwrap();
        let tags = &files.get("tests/tags_api.rs").unwrap().content;
        assert!(!tags.contains("requires_token"));
        assert!(!tags.contains("SECRET"));
        assert!(tags.contains(&Database::Sqlite.example_url("unused")));
    }
}
