//! Rust base pass - generates models, request payloads and migrations.

use crudforge_schema::SqlSchema;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::rust::{
    base_type, column_type, derives_for, field_ident, format_rust, render_cargo_toml, sql,
    DEP_CHRONO, DEP_SERDE, DEP_UUID,
};
use crate::types::{max_length, RustTypes, TypeMapper};
use crate::CodegenError;

/// Rust base pass that generates `src/models`.
///
/// Each crud table gets an entity struct, `Create*`/`Update*` request
/// payloads with `validator` rules and a `*Response` DTO. Only `Debug` and
/// `Clone` (plus serde on the DTOs) are derived here; the data pass adds
/// `sqlx::FromRow` and regenerates the models.
pub struct RustBasePass;

impl Pass for RustBasePass {
    fn name(&self) -> &'static str {
        "rust-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);

        for entity in &entities {
            let name = &entity.names.pascal;
            ctx.add_derive(name, "Debug");
            ctx.add_derive(name, "Clone");

            for dto in [format!("Create{name}"), format!("Update{name}")] {
                ctx.add_derive(&dto, "Debug");
                ctx.add_derive(&dto, "Clone");
                ctx.add_derive(&dto, "serde::Deserialize");
                ctx.add_derive(&dto, "validator::Validate");
            }

            let response = format!("{name}Response");
            ctx.add_derive(&response, "Debug");
            ctx.add_derive(&response, "Clone");
            ctx.add_derive(&response, "serde::Serialize");

            for field in &entity.fields {
                if let Some(krate) = RustTypes.import_for(&field.column.sql_type) {
                    let version = match krate {
                        "chrono" => DEP_CHRONO,
                        "uuid" => DEP_UUID,
                        "rust_decimal" => r#"{ version = "1", features = ["serde-with-str"] }"#,
                        _ => "\"1\"",
                    };
                    ctx.set_metadata(format!("cargo:dep:{krate}"), version);
                }
            }
        }

        render_models(&entities, ctx)?;

        ctx.set_file(
            "migrations/0001_init.sql",
            sql::initial_migration(ctx.options.database, schema),
        );

        ctx.set_metadata("cargo:dep:serde", DEP_SERDE);
        ctx.set_metadata("cargo:dep:serde_json", "\"1\"");
        ctx.set_metadata(
            "cargo:dep:validator",
            r#"{ version = "0.19", features = ["derive"] }"#,
        );
        render_cargo_toml(ctx);

        Ok(())
    }
}

/// Writes `src/models/mod.rs` and one module per entity, using the derives
/// currently registered in the context.
pub(crate) fn render_models(
    entities: &[Entity<'_>],
    ctx: &mut GenerationContext,
) -> Result<(), CodegenError> {
    for entity in entities {
        let code = generate_model(entity, ctx)?;
        ctx.set_file(format!("src/models/{}.rs", entity.names.snake), code);
    }
    ctx.set_file("src/models/mod.rs", generate_models_mod(entities)?);
    Ok(())
}

fn generate_models_mod(entities: &[Entity<'_>]) -> Result<String, CodegenError> {
    let modules: Vec<TokenStream> = entities
        .iter()
        .map(|e| {
            let module = field_ident(&e.names.snake);
            quote! {
                mod #module;
                pub use #module::*;
            }
        })
        .collect();

    let tokens = quote! {
        //! Entities and request/response payloads.

        use serde::{Deserialize, Serialize};

        #(#modules)*

        /// Query parameters for list endpoints.
        #[derive(Debug, Clone, Copy, Deserialize)]
        pub struct Pagination {
            #[serde(default = "default_page")]
            pub page: u32,
            #[serde(default = "default_per_page")]
            pub per_page: u32,
        }

        fn default_page() -> u32 {
            1
        }

        fn default_per_page() -> u32 {
            20
        }

        impl Default for Pagination {
            fn default() -> Self {
                Self {
                    page: default_page(),
                    per_page: default_per_page(),
                }
            }
        }

        impl Pagination {
            pub fn limit(&self) -> i64 {
                i64::from(self.per_page.clamp(1, 100))
            }

            pub fn offset(&self) -> i64 {
                (i64::from(self.page.max(1)) - 1) * self.limit()
            }
        }

        /// One page of a list endpoint.
        #[derive(Debug, Clone, Serialize)]
        pub struct Page<T> {
            pub items: Vec<T>,
            pub page: u32,
            pub per_page: u32,
        }
    };

    format_rust(tokens)
}

fn generate_model(entity: &Entity<'_>, ctx: &GenerationContext) -> Result<String, CodegenError> {
    let name = &entity.names.pascal;
    let entity_ident = format_ident!("{}", name);
    let create_ident = format_ident!("Create{}", name);
    let update_ident = format_ident!("Update{}", name);
    let response_ident = format_ident!("{}Response", name);
    let from_row = ctx
        .get_derives(name)
        .is_some_and(|d| d.iter().any(|d| d == "sqlx::FromRow"));

    let entity_derives = derives_for(ctx, name);
    let create_derives = derives_for(ctx, &format!("Create{name}"));
    let update_derives = derives_for(ctx, &format!("Update{name}"));
    let response_derives = derives_for(ctx, &format!("{name}Response"));

    let mut entity_fields = Vec::new();
    let mut response_fields = Vec::new();
    let mut response_init = Vec::new();
    for field in &entity.fields {
        let ident = field_ident(&field.snake);
        let ty = column_type(field.column)?;
        let rename = if from_row && field.snake != field.column.name {
            let column = &field.column.name;
            quote! { #[sqlx(rename = #column)] }
        } else {
            quote! {}
        };
        entity_fields.push(quote! {
            #rename
            pub #ident: #ty,
        });
        response_fields.push(quote! { pub #ident: #ty, });
        response_init.push(quote! { #ident: entity.#ident, });
    }

    for rel in &entity.relations {
        let ident = field_ident(&rel.snake);
        let target = format_ident!("{}", rel.target.pascal);
        let target_response = format_ident!("{}Response", rel.target.pascal);
        let skip = if from_row {
            quote! { #[sqlx(skip)] }
        } else {
            quote! {}
        };
        let table = &rel.target.table;
        let doc = format!("Loaded on demand from `{table}`.");
        if rel.is_collection() {
            entity_fields.push(quote! {
                #[doc = #doc]
                #skip
                pub #ident: Vec<#target>,
            });
            response_fields.push(quote! {
                #[serde(skip_serializing_if = "Vec::is_empty")]
                pub #ident: Vec<#target_response>,
            });
            response_init.push(quote! {
                #ident: entity.#ident.into_iter().map(#target_response::from).collect(),
            });
        } else {
            entity_fields.push(quote! {
                #[doc = #doc]
                #skip
                pub #ident: Option<Box<#target>>,
            });
            response_fields.push(quote! {
                #[serde(skip_serializing_if = "Option::is_none")]
                pub #ident: Option<Box<#target_response>>,
            });
            response_init.push(quote! {
                #ident: entity.#ident.map(|e| Box::new(#target_response::from(*e))),
            });
        }
    }

    let mut create_fields = Vec::new();
    let mut update_fields = Vec::new();
    for field in entity.writable() {
        let ident = field_ident(&field.snake);
        let base = base_type(field.column)?;
        let validate = match max_length(field.column) {
            Some(max) => {
                let max = Literal::u32_unsuffixed(max);
                quote! { #[validate(length(max = #max))] }
            }
            None => quote! {},
        };
        let create_ty = if field.column.is_required() {
            base.clone()
        } else {
            quote! { Option<#base> }
        };
        create_fields.push(quote! {
            #validate
            pub #ident: #create_ty,
        });
        update_fields.push(quote! {
            #validate
            pub #ident: Option<#base>,
        });
    }

    let table = &entity.names.table;
    let entity_doc = format!("A row of the `{table}` table.");
    let create_doc = format!("Payload for creating a {}.", entity.names.snake.replace('_', " "));
    let update_doc = format!(
        "Payload for updating a {}. Absent fields keep their value.",
        entity.names.snake.replace('_', " ")
    );
    let has_relations = !entity.relations.is_empty();
    let imports = if has_relations {
        let targets: Vec<TokenStream> = unique_targets(entity)
            .into_iter()
            .filter(|t| t != name)
            .map(|t| {
                let ident = format_ident!("{}", t);
                let response = format_ident!("{}Response", t);
                quote! { use super::{#ident, #response}; }
            })
            .collect();
        quote! { #(#targets)* }
    } else {
        quote! {}
    };

    let tokens = quote! {
        #imports

        #[doc = #entity_doc]
        #[derive(#(#entity_derives),*)]
        pub struct #entity_ident {
            #(#entity_fields)*
        }

        #[doc = #create_doc]
        #[derive(#(#create_derives),*)]
        pub struct #create_ident {
            #(#create_fields)*
        }

        #[doc = #update_doc]
        #[derive(#(#update_derives),*)]
        pub struct #update_ident {
            #(#update_fields)*
        }

        #[derive(#(#response_derives),*)]
        pub struct #response_ident {
            #(#response_fields)*
        }

        impl From<#entity_ident> for #response_ident {
            fn from(entity: #entity_ident) -> Self {
                Self {
                    #(#response_init)*
                }
            }
        }
    };

    format_rust(tokens)
}

/// Target entity names of the relations, deduplicated in order.
fn unique_targets(entity: &Entity<'_>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rel in &entity.relations {
        if !out.contains(&rel.target.pascal) {
            out.push(rel.target.pascal.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_base_pass_emits_models() {
        let schema = blog();
        let mut ctx = GenerationContext::new();
        RustBasePass.run(&schema, &mut ctx).unwrap();

        let post = ctx.get_file("src/models/post.rs").unwrap();
        assert!(post.contains("pub struct Post {"));
        assert!(post.contains("pub struct CreatePost {"));
        assert!(post.contains("#[validate(length(max = 200))]"));
        assert!(post.contains("pub title: String,"));
        assert!(post.contains("pub body: Option<String>,"));
        assert!(post.contains("pub published: Option<bool>,"));
        assert!(post.contains("pub author: Option<Box<User>>,"));
        assert!(post.contains("pub tags: Vec<Tag>,"));
        assert!(!post.contains("sqlx"));

        let models = ctx.get_file("src/models/mod.rs").unwrap();
        assert!(models.contains("mod post;"));
        assert!(models.contains("pub struct Pagination"));

        assert!(ctx.has_file("migrations/0001_init.sql"));
        let cargo = ctx.get_file("Cargo.toml").unwrap();
        assert!(cargo.contains("validator = "));
        assert!(cargo.contains("serde = "));
        assert!(cargo.contains("chrono = "));
    }

    #[test]
    fn test_type_crates_become_dependencies() {
        let schema = crudforge_parser::parse(
            "CREATE TABLE events (id UUID PRIMARY KEY, at TIMESTAMPTZ NOT NULL, price NUMERIC(8, 2));",
        )
        .unwrap();
        let mut ctx = GenerationContext::new();
        RustBasePass.run(&schema, &mut ctx).unwrap();
        let cargo = ctx.get_file("Cargo.toml").unwrap();
        assert!(cargo.contains("chrono = "));
        assert!(cargo.contains("uuid = "));
        assert!(cargo.contains("rust_decimal = "));
    }
}
