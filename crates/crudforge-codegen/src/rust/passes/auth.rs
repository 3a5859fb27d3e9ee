//! JWT authentication pass for Rust.

use crudforge_schema::SqlSchema;
use quote::quote;

use crate::model::{accounts_table, ACCOUNTS_TABLE};
use crate::options::Database;
use crate::pass::{GenerationContext, Pass};
use crate::rust::sql::{create_table, placeholder};
use crate::rust::{format_rust, render_cargo_toml};
use crate::CodegenError;

/// Adds `src/auth.rs`: register/login endpoints backed by an accounts table,
/// argon2 password hashes and a bearer-token middleware.
pub struct RustAuthPass;

impl Pass for RustAuthPass {
    fn name(&self) -> &'static str {
        "rust-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["rust-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let db = ctx.options.database;
        ctx.set_file("src/auth.rs", generate_auth(db)?);
        ctx.set_file(
            "migrations/0002_auth_accounts.sql",
            format!(
                "-- Generated by crudforge\n\n{}",
                create_table(db, &accounts_table())
            ),
        );

        ctx.set_metadata("cargo:dep:jsonwebtoken", "\"9\"");
        ctx.set_metadata("cargo:dep:argon2", "\"0.5\"");
        render_cargo_toml(ctx);

        ctx.set_metadata("has:auth", "true");
        Ok(())
    }
}

fn generate_auth(db: Database) -> Result<String, CodegenError> {
    let insert = format!(
        "INSERT INTO {ACCOUNTS_TABLE} (username, password_hash) VALUES ({}, {})",
        placeholder(db, 1),
        placeholder(db, 2)
    );
    let select = format!(
        "SELECT password_hash FROM {ACCOUNTS_TABLE} WHERE username = {}",
        placeholder(db, 1)
    );

    format_rust(quote! {
        //! Account registration, login and the bearer-token guard.

        use argon2::password_hash::rand_core::OsRng;
        use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
        use argon2::Argon2;
        use axum::extract::{Request, State};
        use axum::http::{header, StatusCode};
        use axum::middleware::Next;
        use axum::response::Response;
        use axum::routing::post;
        use axum::{Json, Router};
        use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
        use serde::{Deserialize, Serialize};
        use validator::Validate;

        use crate::error::AppError;
        use crate::state::AppState;

        /// Access tokens are valid for a day.
        const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

        #[derive(Debug, Serialize, Deserialize)]
        pub struct Claims {
            pub sub: String,
            pub exp: u64,
        }

        #[derive(Debug, Deserialize, Validate)]
        pub struct Credentials {
            #[validate(length(min = 3, max = 100))]
            pub username: String,
            #[validate(length(min = 8))]
            pub password: String,
        }

        #[derive(Debug, Serialize)]
        pub struct TokenResponse {
            pub access_token: String,
            pub token_type: &'static str,
        }

        impl TokenResponse {
            fn bearer(access_token: String) -> Self {
                Self {
                    access_token,
                    token_type: "Bearer",
                }
            }
        }

        /// The authenticated caller, stored in request extensions.
        #[derive(Debug, Clone)]
        pub struct AuthUser {
            pub username: String,
        }

        pub fn hash_password(password: &str) -> Result<String, AppError> {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AppError::Internal(e.to_string()))
        }

        pub fn verify_password(password: &str, hash: &str) -> bool {
            PasswordHash::new(hash)
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(password.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false)
        }

        pub fn issue_token(username: &str, secret: &str) -> Result<String, AppError> {
            let claims = Claims {
                sub: username.to_string(),
                exp: jsonwebtoken::get_current_timestamp() + TOKEN_TTL_SECS,
            };
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(secret.as_bytes()),
            )
            .map_err(|e| AppError::Internal(e.to_string()))
        }

        pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
            decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &Validation::default(),
            )
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
        }

        /// Rejects requests without a valid `Authorization: Bearer` token.
        pub async fn require_auth(
            State(state): State<AppState>,
            mut request: Request,
            next: Next,
        ) -> Result<Response, AppError> {
            let token = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or(AppError::Unauthorized)?;
            let claims = decode_token(token, &state.config.jwt_secret)?;
            request.extensions_mut().insert(AuthUser {
                username: claims.sub,
            });
            Ok(next.run(request).await)
        }

        pub fn router() -> Router<AppState> {
            Router::new()
                .route("/auth/register", post(register))
                .route("/auth/login", post(login))
        }

        async fn register(
            State(state): State<AppState>,
            Json(input): Json<Credentials>,
        ) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
            input.validate()?;
            let hash = hash_password(&input.password)?;
            let result = sqlx::query(#insert)
                .bind(&input.username)
                .bind(&hash)
                .execute(&state.pool)
                .await;
            match result {
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    return Err(AppError::BadRequest("username already taken".to_string()));
                }
                other => {
                    other?;
                }
            }
            tracing::info!(username = %input.username, "account registered");
            let token = issue_token(&input.username, &state.config.jwt_secret)?;
            Ok((StatusCode::CREATED, Json(TokenResponse::bearer(token))))
        }

        async fn login(
            State(state): State<AppState>,
            Json(input): Json<Credentials>,
        ) -> Result<Json<TokenResponse>, AppError> {
            let row: Option<(String,)> = sqlx::query_as(#select)
                .bind(&input.username)
                .fetch_optional(&state.pool)
                .await?;
            let (hash,) = row.ok_or(AppError::Unauthorized)?;
            if !verify_password(&input.password, &hash) {
                return Err(AppError::Unauthorized);
            }
            let token = issue_token(&input.username, &state.config.jwt_secret)?;
            Ok(Json(TokenResponse::bearer(token)))
        }

        #[cfg(test)]
        mod tests {
            use super::*;

            #[test]
            fn passwords_round_trip() {
                let hash = hash_password("correct horse").unwrap();
                assert!(verify_password("correct horse", &hash));
                assert!(!verify_password("wrong horse", &hash));
            }

            #[test]
            fn tokens_are_bound_to_the_secret() {
                let token = issue_token("alice", "secret").unwrap();
                assert_eq!(decode_token(&token, "secret").unwrap().sub, "alice");
                assert!(decode_token(&token, "other").is_err());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_auth_pass_outputs() {
        let mut ctx = GenerationContext::new();
        RustAuthPass.run(&blog(), &mut ctx).unwrap();

        let auth = ctx.get_file("src/auth.rs").unwrap();
        assert!(auth.contains("pub async fn require_auth("));
        assert!(auth.contains("INSERT INTO auth_accounts (username, password_hash) VALUES ($1, $2)"));
        let migration = ctx.get_file("migrations/0002_auth_accounts.sql").unwrap();
        assert!(migration.contains("CREATE TABLE IF NOT EXISTS auth_accounts"));
        assert!(ctx.has_metadata("has:auth"));
        assert!(ctx.get_file("Cargo.toml").unwrap().contains("jsonwebtoken = \"9\""));
    }

    #[test]
    fn test_auth_queries_follow_dialect() {
        let code = generate_auth(Database::Mysql).unwrap();
        assert!(code.contains("WHERE username = ?"));
    }
}
