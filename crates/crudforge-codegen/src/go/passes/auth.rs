//! JWT authentication with bcrypt-hashed accounts.
//!
//! The `internal/auth` package is framework-neutral. The Gin or Chi pass adds
//! the handlers and middleware on top of it.

use crudforge_schema::SqlSchema;

use crate::go::passes::data::render_database;
use crate::go::{add_require, render_go_mod};
use crate::model::{entities, ACCOUNTS_TABLE};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Writes `internal/auth`: the account model, password hashing, tokens and
/// the register/login service.
pub struct GoAuthPass;

impl Pass for GoAuthPass {
    fn name(&self) -> &'static str {
        "go-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-data"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("internal/auth/account.go", generate_account());
        ctx.set_file("internal/auth/password.go", PASSWORD_GO);
        ctx.set_file("internal/auth/token.go", TOKEN_GO);
        ctx.set_file("internal/auth/service.go", SERVICE_GO);

        ctx.set_metadata("has:auth", "true");
        add_require(ctx, "github.com/golang-jwt/jwt/v5", "v5.2.1");
        add_require(ctx, "golang.org/x/crypto", "v0.27.0");
        render_go_mod(ctx);
        render_database(&entities(schema), ctx);
        Ok(())
    }
}

fn generate_account() -> String {
    format!(
        r#"package auth

import "time"

// Account is a login identity.
type Account struct {{
	ID           int64     `gorm:"column:id;primaryKey;autoIncrement"`
	Username     string    `gorm:"column:username;size:100;not null;unique"`
	PasswordHash string    `gorm:"column:password_hash;size:255;not null"`
	CreatedAt    time.Time `gorm:"column:created_at;not null;autoCreateTime"`
}}

// TableName keeps accounts apart from any users table in the schema.
func (Account) TableName() string {{
	return "{ACCOUNTS_TABLE}"
}}
"#
    )
}

const PASSWORD_GO: &str = r#"package auth

import "golang.org/x/crypto/bcrypt"

// HashPassword returns the bcrypt hash of password.
func HashPassword(password string) (string, error) {
	hash, err := bcrypt.GenerateFromPassword([]byte(password), bcrypt.DefaultCost)
	return string(hash), err
}

// CheckPassword reports whether password matches hash.
func CheckPassword(hash, password string) bool {
	return bcrypt.CompareHashAndPassword([]byte(hash), []byte(password)) == nil
}
"#;

const TOKEN_GO: &str = r#"package auth

import (
	"time"

	"github.com/golang-jwt/jwt/v5"
)

// Tokens issues and verifies HS256 bearer tokens.
type Tokens struct {
	secret []byte
	ttl    time.Duration
}

func NewTokens(secret string, ttl time.Duration) *Tokens {
	return &Tokens{secret: []byte(secret), ttl: ttl}
}

// Issue signs a token for username.
func (t *Tokens) Issue(username string) (string, error) {
	now := time.Now()
	claims := jwt.RegisteredClaims{
		Subject:   username,
		IssuedAt:  jwt.NewNumericDate(now),
		ExpiresAt: jwt.NewNumericDate(now.Add(t.ttl)),
	}
	return jwt.NewWithClaims(jwt.SigningMethodHS256, claims).SignedString(t.secret)
}

// Parse verifies token and returns its subject.
func (t *Tokens) Parse(token string) (string, error) {
	claims := &jwt.RegisteredClaims{}
	_, err := jwt.ParseWithClaims(token, claims, func(*jwt.Token) (any, error) {
		return t.secret, nil
	}, jwt.WithValidMethods([]string{jwt.SigningMethodHS256.Alg()}))
	if err != nil {
		return "", err
	}
	return claims.Subject, nil
}
"#;

const SERVICE_GO: &str = r#"package auth

import (
	"context"
	"errors"

	"gorm.io/gorm"
)

var (
	ErrUsernameTaken      = errors.New("username already taken")
	ErrInvalidCredentials = errors.New("invalid credentials")
)

// Credentials is the body of register and login requests.
type Credentials struct {
	Username string `json:"username" validate:"required,min=3,max=100"`
	Password string `json:"password" validate:"required,min=8"`
}

// TokenResponse is returned by register and login.
type TokenResponse struct {
	AccessToken string `json:"access_token"`
	TokenType   string `json:"token_type"`
}

// Service registers accounts and logs them in.
type Service struct {
	db     *gorm.DB
	tokens *Tokens
}

func NewService(db *gorm.DB, tokens *Tokens) *Service {
	return &Service{db: db, tokens: tokens}
}

func (s *Service) Register(ctx context.Context, c Credentials) (TokenResponse, error) {
	var count int64
	if err := s.db.WithContext(ctx).Model(&Account{}).Where("username = ?", c.Username).Count(&count).Error; err != nil {
		return TokenResponse{}, err
	}
	if count > 0 {
		return TokenResponse{}, ErrUsernameTaken
	}
	hash, err := HashPassword(c.Password)
	if err != nil {
		return TokenResponse{}, err
	}
	account := Account{Username: c.Username, PasswordHash: hash}
	if err := s.db.WithContext(ctx).Create(&account).Error; err != nil {
		return TokenResponse{}, err
	}
	return s.issue(account.Username)
}

func (s *Service) Login(ctx context.Context, c Credentials) (TokenResponse, error) {
	var account Account
	err := s.db.WithContext(ctx).First(&account, "username = ?", c.Username).Error
	if errors.Is(err, gorm.ErrRecordNotFound) {
		return TokenResponse{}, ErrInvalidCredentials
	}
	if err != nil {
		return TokenResponse{}, err
	}
	if !CheckPassword(account.PasswordHash, c.Password) {
		return TokenResponse{}, ErrInvalidCredentials
	}
	return s.issue(account.Username)
}

// Authenticate returns the username a bearer token was issued for.
func (s *Service) Authenticate(token string) (string, error) {
	return s.tokens.Parse(token)
}

func (s *Service) issue(username string) (TokenResponse, error) {
	token, err := s.tokens.Issue(username)
	if err != nil {
		return TokenResponse{}, err
	}
	return TokenResponse{AccessToken: token, TokenType: "Bearer"}, nil
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::passes::GoDataPass;
    use crate::model::test_support::blog;

    #[test]
    fn test_auth_package() {
        let schema = blog();
        let mut ctx = GenerationContext::new();
        GoDataPass.run(&schema, &mut ctx).unwrap();
        GoAuthPass.run(&schema, &mut ctx).unwrap();

        let account = ctx.get_file("internal/auth/account.go").unwrap();
        assert!(account.contains("return \"auth_accounts\""));
        assert!(ctx.has_file("internal/auth/token.go"));

        let db = ctx.get_file("internal/database/database.go").unwrap();
        assert!(db.contains("\t\t&auth.Account{},\n"));
        assert!(db.contains("\"app/internal/auth\""));
        let go_mod = ctx.get_file("go.mod").unwrap();
        assert!(go_mod.contains("github.com/golang-jwt/jwt/v5 v5.2.1"));
        assert!(ctx.has_metadata("has:auth"));
    }
}
