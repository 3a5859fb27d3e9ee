//! `go test` suites: services against in-memory repositories, plus the auth
//! and storage packages when present.

use crudforge_schema::{SqlSchema, SqlType};

use crate::go::{field_name, id_literal, id_type, imports, module_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Writes `_test.go` files next to the code they cover.
pub struct GoTestsPass;

impl Pass for GoTestsPass {
    fn name(&self) -> &'static str {
        "go-tests"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-data", "go-auth", "go-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let module = module_path(&ctx.options);
        for entity in &entities(schema) {
            ctx.set_file(
                format!("internal/service/{}_test.go", entity.names.snake),
                generate_service_test(&module, entity),
            );
        }
        if ctx.has_metadata("has:auth") {
            ctx.set_file("internal/auth/auth_test.go", AUTH_TEST_GO);
        }
        if ctx.has_metadata("has:storage") {
            ctx.set_file("internal/storage/local_test.go", STORAGE_TEST_GO);
        }
        Ok(())
    }
}

/// The fake's `Create` assigns a key the way the database would.
fn assign_key(entity: &Entity<'_>, key: &str, id: &str) -> String {
    if !entity.id.column.is_generated() {
        return String::new();
    }
    match &entity.id.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => {
            format!("\tif m.{key} == 0 {{\n\t\tm.{key} = {id}(len(f.items) + 1)\n\t}}\n")
        }
        SqlType::Uuid => format!("\tif m.{key} == uuid.Nil {{\n\t\tm.{key} = uuid.New()\n\t}}\n"),
        _ => String::new(),
    }
}

fn generate_service_test(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let id = id_type(entity);
    let key = field_name(&entity.id);
    let sample = id_literal(entity);
    let mut paths = vec![
        "context".to_string(),
        "errors".to_string(),
        "testing".to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/models"),
        format!("{module}/internal/repository"),
    ];
    if entity.id.column.sql_type == SqlType::Uuid {
        paths.push("github.com/google/uuid".to_string());
    }

    format!(
        r#"package service

{imports}
type fake{pascal}Repository struct {{
	items      map[{id}]*models.{pascal}
	lastOffset int
	lastLimit  int
}}

func newFake{pascal}Repository() *fake{pascal}Repository {{
	return &fake{pascal}Repository{{items: map[{id}]*models.{pascal}{{}}}}
}}

func (f *fake{pascal}Repository) List(_ context.Context, offset, limit int) ([]models.{pascal}, int64, error) {{
	f.lastOffset, f.lastLimit = offset, limit
	out := make([]models.{pascal}, 0, len(f.items))
	for _, m := range f.items {{
		out = append(out, *m)
	}}
	return out, int64(len(f.items)), nil
}}

func (f *fake{pascal}Repository) Get(_ context.Context, id {id}) (*models.{pascal}, error) {{
	m, ok := f.items[id]
	if !ok {{
		return nil, repository.ErrNotFound
	}}
	return m, nil
}}

func (f *fake{pascal}Repository) Create(_ context.Context, m *models.{pascal}) error {{
{assign}	f.items[m.{key}] = m
	return nil
}}

func (f *fake{pascal}Repository) Update(_ context.Context, m *models.{pascal}) error {{
	f.items[m.{key}] = m
	return nil
}}

func (f *fake{pascal}Repository) Delete(_ context.Context, m *models.{pascal}) error {{
	delete(f.items, m.{key})
	return nil
}}

func Test{pascal}ServiceGetMissing(t *testing.T) {{
	svc := New{pascal}Service(newFake{pascal}Repository())
	_, err := svc.Get(context.Background(), {sample})
	if !errors.Is(err, ErrNotFound) {{
		t.Fatalf("expected ErrNotFound, got %v", err)
	}}
}}

func Test{pascal}ServiceGetAndDelete(t *testing.T) {{
	ctx := context.Background()
	repo := newFake{pascal}Repository()
	repo.items[{sample}] = &models.{pascal}{{{key}: {sample}}}
	svc := New{pascal}Service(repo)

	got, err := svc.Get(ctx, {sample})
	if err != nil {{
		t.Fatal(err)
	}}
	if got.{key} != {sample} {{
		t.Fatalf("unexpected key %v", got.{key})
	}}
	if err := svc.Delete(ctx, {sample}); err != nil {{
		t.Fatal(err)
	}}
	if _, err := svc.Get(ctx, {sample}); !errors.Is(err, ErrNotFound) {{
		t.Fatalf("expected ErrNotFound after delete, got %v", err)
	}}
}}

func Test{pascal}ServiceCreate(t *testing.T) {{
	repo := newFake{pascal}Repository()
	if _, err := New{pascal}Service(repo).Create(context.Background(), dto.{pascal}Request{{}}); err != nil {{
		t.Fatal(err)
	}}
	if len(repo.items) != 1 {{
		t.Fatalf("expected one stored {snake}, got %d", len(repo.items))
	}}
}}

func Test{pascal}ServiceListClampsPageSize(t *testing.T) {{
	repo := newFake{pascal}Repository()
	page, err := New{pascal}Service(repo).List(context.Background(), 0, 1000)
	if err != nil {{
		t.Fatal(err)
	}}
	if page.Page != 1 || page.PageSize != dto.MaxPageSize {{
		t.Fatalf("unexpected paging %d/%d", page.Page, page.PageSize)
	}}
	if repo.lastOffset != 0 || repo.lastLimit != dto.MaxPageSize {{
		t.Fatalf("unexpected window %d/%d", repo.lastOffset, repo.lastLimit)
	}}
}}
"#,
        imports = imports(module, &paths),
        assign = assign_key(entity, &key, &id),
        snake = entity.names.snake.replace('_', " "),
    )
}

const AUTH_TEST_GO: &str = r#"package auth

import (
	"testing"
	"time"
)

func TestTokenRoundTrip(t *testing.T) {
	tokens := NewTokens("secret", time.Hour)
	token, err := tokens.Issue("alice")
	if err != nil {
		t.Fatal(err)
	}
	got, err := tokens.Parse(token)
	if err != nil {
		t.Fatal(err)
	}
	if got != "alice" {
		t.Fatalf("expected alice, got %q", got)
	}
}

func TestTokenRejectsOtherSecret(t *testing.T) {
	token, err := NewTokens("one", time.Hour).Issue("alice")
	if err != nil {
		t.Fatal(err)
	}
	if _, err := NewTokens("two", time.Hour).Parse(token); err == nil {
		t.Fatal("expected a signature error")
	}
}

func TestTokenRejectsExpired(t *testing.T) {
	tokens := NewTokens("secret", -time.Minute)
	token, err := tokens.Issue("alice")
	if err != nil {
		t.Fatal(err)
	}
	if _, err := tokens.Parse(token); err == nil {
		t.Fatal("expected an expiry error")
	}
}

func TestPasswordHash(t *testing.T) {
	hash, err := HashPassword("correct horse")
	if err != nil {
		t.Fatal(err)
	}
	if !CheckPassword(hash, "correct horse") {
		t.Fatal("password should match its hash")
	}
	if CheckPassword(hash, "wrong horse") {
		t.Fatal("wrong password accepted")
	}
}
"#;

const STORAGE_TEST_GO: &str = r#"package storage

import (
	"errors"
	"strings"
	"testing"
)

func TestSaveAndResolve(t *testing.T) {
	store, err := NewLocal(t.TempDir())
	if err != nil {
		t.Fatal(err)
	}
	stored, err := store.Save(strings.NewReader("hello"), "Note.TXT")
	if err != nil {
		t.Fatal(err)
	}
	if stored.Size != 5 || !strings.HasSuffix(stored.Name, ".txt") {
		t.Fatalf("unexpected stored file %+v", stored)
	}
	if _, err := store.Path(stored.Name); err != nil {
		t.Fatal(err)
	}
}

func TestPathRejectsUnsafeNames(t *testing.T) {
	store, err := NewLocal(t.TempDir())
	if err != nil {
		t.Fatal(err)
	}
	for _, name := range []string{"", "../secret", ".env", "a/b", "missing.txt"} {
		if _, err := store.Path(name); !errors.Is(err, ErrNotFound) {
			t.Errorf("%q: expected ErrNotFound, got %v", name, err)
		}
	}
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::passes::{GoAuthPass, GoDataPass, GoStoragePass};
    use crate::model::test_support::blog;

    #[test]
    fn test_service_suites() {
        let schema = blog();
        let mut ctx = GenerationContext::new();
        GoDataPass.run(&schema, &mut ctx).unwrap();
        GoTestsPass.run(&schema, &mut ctx).unwrap();

        let test = ctx.get_file("internal/service/tag_test.go").unwrap();
        assert!(test.contains("items      map[int32]*models.Tag"));
        assert!(test.contains("\tif m.ID == 0 {\n\t\tm.ID = int32(len(f.items) + 1)\n\t}\n"));
        assert!(test.contains("func TestTagServiceListClampsPageSize(t *testing.T) {"));
        assert!(test.contains("repo.items[1] = &models.Tag{ID: 1}"));
        assert!(!ctx.has_file("internal/auth/auth_test.go"));
    }

    #[test]
    fn test_feature_suites() {
        let schema = blog();
        let mut ctx = GenerationContext::new();
        GoDataPass.run(&schema, &mut ctx).unwrap();
        GoAuthPass.run(&schema, &mut ctx).unwrap();
        GoStoragePass.run(&schema, &mut ctx).unwrap();
        GoTestsPass.run(&schema, &mut ctx).unwrap();
        assert!(ctx.has_file("internal/auth/auth_test.go"));
        assert!(ctx
            .get_file("internal/storage/local_test.go")
            .unwrap()
            .contains("TestPathRejectsUnsafeNames"));
    }
}
