//! SQLx data layer pass for Rust.

use crudforge_schema::{RelationshipKind, SqlSchema};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::model::{entities, Entity, Relation};
use crate::naming::to_snake_case;
use crate::options::Database;
use crate::pass::{GenerationContext, Pass};
use crate::rust::base::render_models;
use crate::rust::sql::{placeholder, quote_ident, supports_returning};
use crate::rust::{base_type, field_ident, format_rust, render_cargo_toml};
use crate::CodegenError;

/// SQLx pass that generates repositories, services and the error type.
///
/// Adds `sqlx::FromRow` to every entity and regenerates the models, then
/// writes one repository (plain SQL per dialect) and one service per entity.
pub struct RustDataPass;

impl Pass for RustDataPass {
    fn name(&self) -> &'static str {
        "rust-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["rust-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let db = ctx.options.database;

        for entity in &entities {
            ctx.add_derive(&entity.names.pascal, "sqlx::FromRow");
        }
        render_models(&entities, ctx)?;

        for entity in &entities {
            let repo = generate_repository(entity, db)?;
            ctx.set_file(format!("src/repositories/{}.rs", entity.names.snake), repo);
            let service = generate_service(entity)?;
            ctx.set_file(format!("src/services/{}.rs", entity.names.snake), service);
        }
        ctx.set_file(
            "src/repositories/mod.rs",
            generate_mod(&entities, "Repository", "Database access, one repository per table.")?,
        );
        ctx.set_file(
            "src/services/mod.rs",
            generate_mod(&entities, "Service", "Business logic on top of the repositories.")?,
        );
        ctx.set_file("src/db.rs", generate_db(db)?);
        ctx.set_file("src/error.rs", generate_error()?);

        let mut features = vec!["runtime-tokio", "tls-rustls", "macros", "migrate"];
        features.push(match db {
            Database::Postgres => "postgres",
            Database::Mysql => "mysql",
            Database::Sqlite => "sqlite",
        });
        for (krate, feature) in [
            ("chrono", "chrono"),
            ("uuid", "uuid"),
            ("rust_decimal", "rust_decimal"),
            ("serde_json", "json"),
        ] {
            if krate == "serde_json" || ctx.has_metadata(&format!("cargo:dep:{krate}")) {
                features.push(feature);
            }
        }
        let features: Vec<String> = features.iter().map(|f| format!("\"{f}\"")).collect();
        ctx.set_metadata(
            "cargo:dep:sqlx",
            format!("{{ version = \"0.8\", features = [{}] }}", features.join(", ")),
        );
        ctx.set_metadata("cargo:dep:thiserror", "\"2\"");
        ctx.set_metadata("cargo:dep:tracing", "\"0.1\"");
        ctx.set_metadata("cargo:dep:axum", "\"0.8\"");
        render_cargo_toml(ctx);

        ctx.set_metadata("has:sqlx", "true");

        Ok(())
    }
}

fn generate_mod(entities: &[Entity<'_>], suffix: &str, doc: &str) -> Result<String, CodegenError> {
    let modules: Vec<TokenStream> = entities
        .iter()
        .map(|e| {
            let module = field_ident(&e.names.snake);
            let ty = format_ident!("{}{}", e.names.pascal, suffix);
            quote! {
                pub mod #module;
                pub use #module::#ty;
            }
        })
        .collect();

    format_rust(quote! {
        #![doc = #doc]

        #(#modules)*
    })
}

fn generate_db(db: Database) -> Result<String, CodegenError> {
    let pool = match db {
        Database::Postgres => quote! { sqlx::PgPool },
        Database::Mysql => quote! { sqlx::MySqlPool },
        Database::Sqlite => quote! { sqlx::SqlitePool },
    };

    format_rust(quote! {
        //! Connection pool setup.

        use std::time::Duration;

        pub type DbPool = #pool;

        /// Connects to `url` and applies pending migrations.
        pub async fn connect(url: &str) -> Result<DbPool, sqlx::Error> {
            let pool = sqlx::pool::PoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(5))
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Ok(pool)
        }

        /// A pool that connects on first use.
        pub fn connect_lazy(url: &str) -> Result<DbPool, sqlx::Error> {
            sqlx::pool::PoolOptions::new().max_connections(10).connect_lazy(url)
        }
    })
}

fn generate_error() -> Result<String, CodegenError> {
    format_rust(quote! {
        //! Application error type.

        use axum::http::StatusCode;
        use axum::response::{IntoResponse, Response};
        use axum::Json;

        #[derive(Debug, thiserror::Error)]
        pub enum AppError {
            #[error("{0}")]
            NotFound(String),

            #[error(transparent)]
            Validation(#[from] validator::ValidationErrors),

            #[error("{0}")]
            BadRequest(String),

            #[error("unauthorized")]
            Unauthorized,

            #[error(transparent)]
            Database(#[from] sqlx::Error),

            #[error("{0}")]
            Internal(String),
        }

        impl AppError {
            pub fn status(&self) -> StatusCode {
                match self {
                    AppError::NotFound(_) => StatusCode::NOT_FOUND,
                    AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
                    AppError::Unauthorized => StatusCode::UNAUTHORIZED,
                    AppError::Database(_) | AppError::Internal(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                }
            }
        }

        impl IntoResponse for AppError {
            fn into_response(self) -> Response {
                let status = self.status();
                let message = if status.is_server_error() {
                    tracing::error!(error = %self, "request failed");
                    "internal server error".to_string()
                } else {
                    self.to_string()
                };
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
        }
    })
}

struct Queries {
    list: String,
    get: String,
    insert: String,
    update: Option<String>,
    delete: String,
}

fn queries(entity: &Entity<'_>, db: Database) -> Queries {
    let table = quote_ident(db, &entity.names.table);
    let id = quote_ident(db, entity.id.name());
    let writable: Vec<_> = entity.writable().collect();
    let returning = if supports_returning(db) { " RETURNING *" } else { "" };

    let insert = if writable.is_empty() {
        match db {
            Database::Mysql => format!("INSERT INTO {table} () VALUES ()"),
            _ => format!("INSERT INTO {table} DEFAULT VALUES{returning}"),
        }
    } else {
        let columns: Vec<String> = writable.iter().map(|f| quote_ident(db, f.name())).collect();
        let values: Vec<String> = writable
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let param = placeholder(db, i + 1);
                match (&f.column.default, f.column.is_required()) {
                    (Some(default), false) if !f.column.nullable => {
                        format!("COALESCE({param}, {default})")
                    }
                    _ => param,
                }
            })
            .collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({}){returning}",
            columns.join(", "),
            values.join(", ")
        )
    };

    // Postgres and SQLite bind the id first, MySQL binds positionally after the fields.
    let update = if writable.is_empty() {
        None
    } else {
        let id_first = supports_returning(db);
        let sets: Vec<String> = writable
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let col = quote_ident(db, f.name());
                let idx = if id_first { i + 2 } else { i + 1 };
                format!("{col} = COALESCE({}, {col})", placeholder(db, idx))
            })
            .collect();
        let id_param = if id_first {
            placeholder(db, 1)
        } else {
            placeholder(db, writable.len() + 1)
        };
        Some(format!(
            "UPDATE {table} SET {} WHERE {id} = {id_param}{returning}",
            sets.join(", ")
        ))
    };

    Queries {
        list: format!(
            "SELECT * FROM {table} ORDER BY {id} LIMIT {} OFFSET {}",
            placeholder(db, 1),
            placeholder(db, 2)
        ),
        get: format!("SELECT * FROM {table} WHERE {id} = {}", placeholder(db, 1)),
        insert,
        update,
        delete: format!("DELETE FROM {table} WHERE {id} = {}", placeholder(db, 1)),
    }
}

fn generate_repository(entity: &Entity<'_>, db: Database) -> Result<String, CodegenError> {
    let entity_ident = format_ident!("{}", entity.names.pascal);
    let create_ident = format_ident!("Create{}", entity.names.pascal);
    let update_ident = format_ident!("Update{}", entity.names.pascal);
    let repo_ident = format_ident!("{}Repository", entity.names.pascal);
    let id_ty = base_type(entity.id.column)?;
    let q = queries(entity, db);
    let (list_sql, get_sql, insert_sql, delete_sql) = (&q.list, &q.get, &q.insert, &q.delete);

    let binds: Vec<TokenStream> = entity
        .writable()
        .map(|f| {
            let ident = field_ident(&f.snake);
            quote! { .bind(&input.#ident) }
        })
        .collect();

    let create_body = if supports_returning(db) {
        quote! {
            sqlx::query_as::<_, #entity_ident>(#insert_sql)
                #(#binds)*
                .fetch_one(&self.pool)
                .await
        }
    } else {
        let id_expr = mysql_inserted_id(entity)?;
        quote! {
            let result = sqlx::query(#insert_sql)
                #(#binds)*
                .execute(&self.pool)
                .await?;
            #id_expr
            self.find_by_id(id).await?.ok_or(sqlx::Error::RowNotFound)
        }
    };

    let update_body = match (&q.update, supports_returning(db)) {
        (None, _) => quote! {
            let _ = input;
            self.find_by_id(id).await
        },
        (Some(sql), true) => quote! {
            sqlx::query_as::<_, #entity_ident>(#sql)
                .bind(&id)
                #(#binds)*
                .fetch_optional(&self.pool)
                .await
        },
        (Some(sql), false) => quote! {
            sqlx::query(#sql)
                #(#binds)*
                .bind(&id)
                .execute(&self.pool)
                .await?;
            self.find_by_id(id).await
        },
    };

    let mut model_imports = vec![
        quote! { #entity_ident },
        quote! { #create_ident },
        quote! { #update_ident },
    ];
    let mut seen = vec![entity.names.pascal.clone()];
    for rel in &entity.relations {
        if !seen.contains(&rel.target.pascal) {
            seen.push(rel.target.pascal.clone());
            let target = format_ident!("{}", rel.target.pascal);
            model_imports.push(quote! { #target });
        }
    }

    let loaders: Vec<TokenStream> = entity
        .relations
        .iter()
        .map(|rel| generate_loader(entity, rel, db))
        .collect();

    let doc = format!("Queries against `{}`.", entity.names.table);

    format_rust(quote! {
        use crate::db::DbPool;
        use crate::models::{Pagination, #(#model_imports),*};

        #[doc = #doc]
        #[derive(Clone)]
        pub struct #repo_ident {
            pool: DbPool,
        }

        impl #repo_ident {
            pub fn new(pool: DbPool) -> Self {
                Self { pool }
            }

            pub async fn find_all(&self, page: &Pagination) -> Result<Vec<#entity_ident>, sqlx::Error> {
                sqlx::query_as::<_, #entity_ident>(#list_sql)
                    .bind(page.limit())
                    .bind(page.offset())
                    .fetch_all(&self.pool)
                    .await
            }

            pub async fn find_by_id(&self, id: #id_ty) -> Result<Option<#entity_ident>, sqlx::Error> {
                sqlx::query_as::<_, #entity_ident>(#get_sql)
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await
            }

            pub async fn create(&self, input: &#create_ident) -> Result<#entity_ident, sqlx::Error> {
                #create_body
            }

            pub async fn update(
                &self,
                id: #id_ty,
                input: &#update_ident,
            ) -> Result<Option<#entity_ident>, sqlx::Error> {
                #update_body
            }

            /// Returns `false` when no row matched.
            pub async fn delete(&self, id: #id_ty) -> Result<bool, sqlx::Error> {
                let result = sqlx::query(#delete_sql)
                    .bind(&id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            #(#loaders)*
        }
    })
}

/// How the MySQL repository recovers the id of an inserted row.
fn mysql_inserted_id(entity: &Entity<'_>) -> Result<TokenStream, CodegenError> {
    let id_ty = base_type(entity.id.column)?;
    let id_field = field_ident(&entity.id.snake);
    let column = &entity.id.column;
    if column.auto_increment && column.sql_type.is_integer() {
        Ok(quote! { let id = result.last_insert_id() as #id_ty; })
    } else if !column.is_generated() {
        Ok(quote! {
            let _ = result;
            let id = input.#id_field.clone();
        })
    } else {
        Err(CodegenError::Custom(format!(
            "table '{}': MySQL cannot return a generated non-integer primary key",
            entity.names.table
        )))
    }
}

fn generate_loader(entity: &Entity<'_>, rel: &Relation, db: Database) -> TokenStream {
    let entity_ident = format_ident!("{}", entity.names.pascal);
    let target = format_ident!("{}", rel.target.pascal);
    let method = format_ident!("find_{}", rel.snake);
    let target_table = quote_ident(db, &rel.target.table);
    let p1 = placeholder(db, 1);
    let owned_field = |column: &str| field_ident(&to_snake_case(column));

    match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => {
            let sql = format!(
                "SELECT * FROM {target_table} WHERE {} = {p1}",
                quote_ident(db, &rel.target_column)
            );
            let fk = owned_field(&rel.column);
            quote! {
                pub async fn #method(&self, entity: &#entity_ident) -> Result<Option<#target>, sqlx::Error> {
                    sqlx::query_as::<_, #target>(#sql)
                        .bind(&entity.#fk)
                        .fetch_optional(&self.pool)
                        .await
                }
            }
        }
        RelationshipKind::OneToOne | RelationshipKind::ManyToOne => {
            let sql = format!(
                "SELECT * FROM {target_table} WHERE {} = {p1}",
                quote_ident(db, &rel.column)
            );
            let key = owned_field(&rel.target_column);
            quote! {
                pub async fn #method(&self, entity: &#entity_ident) -> Result<Option<#target>, sqlx::Error> {
                    sqlx::query_as::<_, #target>(#sql)
                        .bind(&entity.#key)
                        .fetch_optional(&self.pool)
                        .await
                }
            }
        }
        RelationshipKind::OneToMany => {
            let sql = format!(
                "SELECT * FROM {target_table} WHERE {} = {p1}",
                quote_ident(db, &rel.column)
            );
            let key = owned_field(&rel.target_column);
            quote! {
                pub async fn #method(&self, entity: &#entity_ident) -> Result<Vec<#target>, sqlx::Error> {
                    sqlx::query_as::<_, #target>(#sql)
                        .bind(&entity.#key)
                        .fetch_all(&self.pool)
                        .await
                }
            }
        }
        RelationshipKind::ManyToMany => {
            let join = quote_ident(db, rel.join_table.as_deref().unwrap_or_default());
            let inverse = quote_ident(db, rel.inverse_column.as_deref().unwrap_or_default());
            let sql = format!(
                "SELECT t.* FROM {target_table} t JOIN {join} j ON j.{inverse} = t.{} WHERE j.{} = {p1}",
                quote_ident(db, &rel.target_column),
                quote_ident(db, &rel.column)
            );
            let id = field_ident(&entity.id.snake);
            quote! {
                pub async fn #method(&self, entity: &#entity_ident) -> Result<Vec<#target>, sqlx::Error> {
                    sqlx::query_as::<_, #target>(#sql)
                        .bind(&entity.#id)
                        .fetch_all(&self.pool)
                        .await
                }
            }
        }
    }
}

fn generate_service(entity: &Entity<'_>) -> Result<String, CodegenError> {
    let entity_ident = format_ident!("{}", entity.names.pascal);
    let create_ident = format_ident!("Create{}", entity.names.pascal);
    let update_ident = format_ident!("Update{}", entity.names.pascal);
    let repo_ident = format_ident!("{}Repository", entity.names.pascal);
    let service_ident = format_ident!("{}Service", entity.names.pascal);
    let id_ty = base_type(entity.id.column)?;
    let label = entity.names.snake.replace('_', " ");
    let not_found = format!("{label} {{id}} not found");

    let loads: Vec<TokenStream> = entity
        .relations
        .iter()
        .map(|rel| {
            let field = field_ident(&rel.snake);
            let method = format_ident!("find_{}", rel.snake);
            if rel.is_collection() {
                quote! { entity.#field = self.repo.#method(entity).await?; }
            } else {
                quote! { entity.#field = self.repo.#method(entity).await?.map(Box::new); }
            }
        })
        .collect();

    let doc = format!("CRUD operations for {}.", entity.names.pascal_plural);

    format_rust(quote! {
        use validator::Validate;

        use crate::db::DbPool;
        use crate::error::AppError;
        use crate::models::{Pagination, #entity_ident, #create_ident, #update_ident};
        use crate::repositories::#repo_ident;

        #[doc = #doc]
        #[derive(Clone)]
        pub struct #service_ident {
            repo: #repo_ident,
        }

        impl #service_ident {
            pub fn new(pool: DbPool) -> Self {
                Self {
                    repo: #repo_ident::new(pool),
                }
            }

            pub async fn list(&self, page: &Pagination) -> Result<Vec<#entity_ident>, AppError> {
                Ok(self.repo.find_all(page).await?)
            }

            /// Fetches one row with its relations loaded.
            pub async fn get(&self, id: #id_ty) -> Result<#entity_ident, AppError> {
                let mut entity = self
                    .repo
                    .find_by_id(id.clone())
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!(#not_found)))?;
                self.load_relations(&mut entity).await?;
                Ok(entity)
            }

            pub async fn create(&self, input: #create_ident) -> Result<#entity_ident, AppError> {
                input.validate()?;
                Ok(self.repo.create(&input).await?)
            }

            pub async fn update(&self, id: #id_ty, input: #update_ident) -> Result<#entity_ident, AppError> {
                input.validate()?;
                self.repo
                    .update(id.clone(), &input)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!(#not_found)))
            }

            pub async fn delete(&self, id: #id_ty) -> Result<(), AppError> {
                if self.repo.delete(id.clone()).await? {
                    Ok(())
                } else {
                    Err(AppError::NotFound(format!(#not_found)))
                }
            }

            async fn load_relations(&self, entity: &mut #entity_ident) -> Result<(), AppError> {
                #(#loads)*
                let _ = entity;
                Ok(())
            }
        }
    })
}
