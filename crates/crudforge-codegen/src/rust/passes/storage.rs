//! File storage pass for Rust.

use crudforge_schema::SqlSchema;
use quote::quote;

use crate::pass::{GenerationContext, Pass};
use crate::rust::{format_rust, render_cargo_toml, DEP_UUID};
use crate::CodegenError;

/// Adds `src/storage.rs`: multipart upload and download of files kept in a
/// local directory.
pub struct RustStoragePass;

impl Pass for RustStoragePass {
    fn name(&self) -> &'static str {
        "rust-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["rust-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("src/storage.rs", generate_storage()?);
        ctx.set_metadata("cargo:dep:uuid", DEP_UUID);
        render_cargo_toml(ctx);
        ctx.set_metadata("has:storage", "true");
        Ok(())
    }
}

fn generate_storage() -> Result<String, CodegenError> {
    format_rust(quote! {
        //! Local-disk file storage.

        use std::io::ErrorKind;
        use std::path::{Path, PathBuf};

        use axum::body::Body;
        use axum::extract::{Multipart, Path as UrlPath, State};
        use axum::http::{header, StatusCode};
        use axum::response::Response;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde::Serialize;
        use tokio::fs;

        use crate::error::AppError;
        use crate::state::AppState;

        #[derive(Debug, Clone)]
        pub struct LocalStorage {
            root: PathBuf,
        }

        impl LocalStorage {
            pub fn new(root: impl Into<PathBuf>) -> Self {
                Self { root: root.into() }
            }

            /// Stores `bytes` under a fresh name that keeps the original extension.
            pub async fn save(&self, original: &str, bytes: &[u8]) -> Result<String, AppError> {
                fs::create_dir_all(&self.root).await.map_err(internal)?;
                let extension = Path::new(original)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_default();
                let name = format!("{}{}", uuid::Uuid::new_v4(), extension);
                fs::write(self.root.join(&name), bytes).await.map_err(internal)?;
                Ok(name)
            }

            pub async fn load(&self, name: &str) -> Result<Vec<u8>, AppError> {
                if name.contains(['/', '\\']) || name.starts_with('.') {
                    return Err(AppError::BadRequest("invalid file name".to_string()));
                }
                fs::read(self.root.join(name)).await.map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        AppError::NotFound(format!("file {name} not found"))
                    } else {
                        internal(e)
                    }
                })
            }
        }

        fn internal(e: std::io::Error) -> AppError {
            AppError::Internal(e.to_string())
        }

        #[derive(Debug, Serialize)]
        pub struct StoredFile {
            pub name: String,
            pub size: usize,
        }

        pub fn router() -> Router<AppState> {
            Router::new()
                .route("/files", post(upload))
                .route("/files/{name}", get(download))
        }

        fn storage(state: &AppState) -> LocalStorage {
            LocalStorage::new(&state.config.upload_dir)
        }

        async fn upload(
            State(state): State<AppState>,
            mut multipart: Multipart,
        ) -> Result<(StatusCode, Json<StoredFile>), AppError> {
            let field = multipart
                .next_field()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?
                .ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;
            let original = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let name = storage(&state).save(&original, &bytes).await?;
            tracing::info!(%name, size = bytes.len(), "file stored");
            Ok((
                StatusCode::CREATED,
                Json(StoredFile {
                    name,
                    size: bytes.len(),
                }),
            ))
        }

        async fn download(
            State(state): State<AppState>,
            UrlPath(name): UrlPath<String>,
        ) -> Result<Response, AppError> {
            let bytes = storage(&state).load(&name).await?;
            Response::builder()
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Body::from(bytes))
                .map_err(|e| AppError::Internal(e.to_string()))
        }

    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_pass_outputs() {
        let schema = SqlSchema::new();
        let mut ctx = GenerationContext::new();
        RustStoragePass.run(&schema, &mut ctx).unwrap();
        let code = ctx.get_file("src/storage.rs").unwrap();
        assert!(code.contains("pub struct LocalStorage"));
        assert!(code.contains(".route(\"/files/{name}\", get(download))"));
        assert!(ctx.has_metadata("has:storage"));
        assert!(ctx.get_file("Cargo.toml").unwrap().contains("uuid = "));
    }
}
