//! Rust code generation passes.
//!
//! Emits an Axum + SQLx service. Rust sources are built as token streams with
//! `quote!` and pretty-printed, so every emitted `.rs` file is known to parse.
//! Struct derives are collected in the context, letting later passes add
//! derives (such as `sqlx::FromRow`) and regenerate the models. Passes record
//! the crates they need as `cargo:dep:<name>` metadata and re-render
//! `Cargo.toml` from it.
//!
//! # Example
//!
//! ```ignore
//! use crudforge_codegen::rust::axum_stack;
//!
//! let files = axum_stack(&options).run(&schema)?;
//! ```

pub mod base;
pub mod passes;
pub mod sql;

pub use base::RustBasePass;

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crudforge_schema::SqlColumn;

use crate::options::GeneratorOptions;
use crate::naming::identifier;
use crate::pass::{GenerationContext, PassManager};
use crate::types::{RustTypes, TypeMapper};
use crate::CodegenError;

pub(crate) fn format_rust(tokens: TokenStream) -> Result<String, CodegenError> {
    let file = syn::parse2::<syn::File>(tokens)
        .map_err(|e| CodegenError::Custom(format!("generated invalid Rust code: {e}")))?;
    Ok(prettyplease::unparse(&file))
}

/// Creates a PassManager with the full Axum + SQLx stack.
///
/// Auth, storage and test passes are added when the options enable them.
pub fn axum_stack(options: &GeneratorOptions) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(RustBasePass);
    pm.add(passes::RustDataPass);
    pm.add(passes::AxumPass);
    if options.auth {
        pm.add(passes::RustAuthPass);
    }
    if options.storage {
        pm.add(passes::RustStoragePass);
    }
    if options.tests {
        pm.add(passes::RustTestsPass);
    }
    pm
}

pub(crate) const DEP_SERDE: &str = r#"{ version = "1", features = ["derive"] }"#;
pub(crate) const DEP_UUID: &str = r#"{ version = "1", features = ["serde", "v4"] }"#;
pub(crate) const DEP_CHRONO: &str = r#"{ version = "0.4", features = ["serde"] }"#;
pub(crate) const DEP_TOKIO: &str = r#"{ version = "1", features = ["full"] }"#;

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "typeof", "unsized", "virtual", "yield", "try", "gen",
];

/// A field identifier, raw when the name is a keyword.
pub fn field_ident(snake: &str) -> Ident {
    let name = identifier(snake, "f");
    match name.as_str() {
        "self" | "super" | "crate" => format_ident!("{}_", name),
        keyword if RUST_KEYWORDS.contains(&keyword) => format_ident!("r#{}", keyword),
        _ => format_ident!("{}", name),
    }
}

/// The Rust type of a column as tokens.
pub fn column_type(column: &SqlColumn) -> Result<TokenStream, CodegenError> {
    parse_type(&RustTypes.column_type(column))
}

/// The non-null Rust type of a column as tokens.
pub fn base_type(column: &SqlColumn) -> Result<TokenStream, CodegenError> {
    parse_type(&RustTypes.map(&column.sql_type))
}

fn parse_type(ty: &str) -> Result<TokenStream, CodegenError> {
    syn::parse_str::<syn::Type>(ty)
        .map(|t| quote! { #t })
        .map_err(|_| CodegenError::UnknownType(ty.to_string()))
}

/// The derives registered for `name`, as paths.
pub(crate) fn derives_for(ctx: &GenerationContext, name: &str) -> Vec<TokenStream> {
    ctx.get_derives(name)
        .unwrap_or(&[])
        .iter()
        .map(|d| {
            d.parse().unwrap_or_else(|_| {
                let ident = format_ident!("{}", d);
                quote! { #ident }
            })
        })
        .collect()
}

/// The generated crate's name as an identifier.
pub(crate) fn crate_ident(options: &GeneratorOptions) -> Ident {
    field_ident(&options.snake_name())
}

/// Renders `Cargo.toml` from the `cargo:dep:` and `cargo:dev:` metadata.
pub(crate) fn render_cargo_toml(ctx: &mut GenerationContext) {
    let mut out = format!(
        "[package]\nname = \"{}\"\nversion = \"{}\"\nedition = \"2021\"\n\n[dependencies]\n",
        ctx.options.project_name, ctx.options.version
    );
    for (name, version) in ctx.metadata_with_prefix("cargo:dep:") {
        out.push_str(&format!("{name} = {version}\n"));
    }

    let dev: Vec<String> = ctx
        .metadata_with_prefix("cargo:dev:")
        .map(|(name, version)| format!("{name} = {version}\n"))
        .collect();
    if !dev.is_empty() {
        out.push_str("\n[dev-dependencies]\n");
        out.extend(dev);
    }

    ctx.set_file("Cargo.toml", out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudforge_schema::SqlType;

    #[test]
    fn test_field_ident() {
        assert_eq!(field_ident("title").to_string(), "title");
        assert_eq!(field_ident("type").to_string(), "r#type");
        assert_eq!(field_ident("self").to_string(), "self_");
        assert_eq!(field_ident("2fa_enabled").to_string(), "f_2fa_enabled");
        assert_eq!(field_ident("price$usd").to_string(), "price_usd");
    }

    #[test]
    fn test_column_type_tokens() {
        let mut column = SqlColumn::new("at", SqlType::TimestampTz);
        assert_eq!(
            column_type(&column).unwrap().to_string(),
            "Option < chrono :: DateTime < chrono :: Utc > >"
        );
        column.nullable = false;
        assert_eq!(base_type(&column).unwrap().to_string(), "chrono :: DateTime < chrono :: Utc >");
    }

    #[test]
    fn test_render_cargo_toml() {
        let mut ctx = GenerationContext::new();
        ctx.set_metadata("cargo:dep:tokio", DEP_TOKIO);
        ctx.set_metadata("cargo:dep:axum", "\"0.8\"");
        ctx.set_metadata("cargo:dev:tower", "\"0.5\"");
        render_cargo_toml(&mut ctx);
        let toml = ctx.get_file("Cargo.toml").unwrap();
        assert!(toml.starts_with("[package]\nname = \"app\"\nversion = \"0.1.0\""));
        assert!(toml.contains("[dependencies]\naxum = \"0.8\"\ntokio = {"));
        assert!(toml.ends_with("[dev-dependencies]\ntower = \"0.5\"\n"));
    }

    #[test]
    fn test_format_rust_rejects_invalid_tokens() {
        let err = format_rust(quote! { fn }).unwrap_err();
        assert!(matches!(err, CodegenError::Custom(_)));
    }
}
