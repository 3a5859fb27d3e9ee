//! Local-disk file storage.

use crudforge_schema::SqlSchema;

use crate::go::{add_require, render_go_mod};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Writes `internal/storage`. Upload and download routes are added by the
/// web pass.
pub struct GoStoragePass;

impl Pass for GoStoragePass {
    fn name(&self) -> &'static str {
        "go-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("internal/storage/local.go", LOCAL_GO);
        ctx.set_metadata("has:storage", "true");
        add_require(ctx, "github.com/google/uuid", "v1.6.0");
        render_go_mod(ctx);
        Ok(())
    }
}

const LOCAL_GO: &str = r#"package storage

import (
	"errors"
	"io"
	"os"
	"path/filepath"
	"strings"

	"github.com/google/uuid"
)

// ErrNotFound is returned for unknown or unsafe file names.
var ErrNotFound = errors.New("file not found")

// StoredFile describes a saved upload.
type StoredFile struct {
	Name string `json:"name"`
	Size int64  `json:"size"`
}

// Local stores files in one directory under random names.
type Local struct {
	root string
}

func NewLocal(root string) (*Local, error) {
	abs, err := filepath.Abs(root)
	if err != nil {
		return nil, err
	}
	if err := os.MkdirAll(abs, 0o755); err != nil {
		return nil, err
	}
	return &Local{root: abs}, nil
}

// Save copies r to a new file, keeping the extension of original.
func (l *Local) Save(r io.Reader, original string) (StoredFile, error) {
	name := uuid.NewString() + strings.ToLower(filepath.Ext(original))
	f, err := os.Create(filepath.Join(l.root, name))
	if err != nil {
		return StoredFile{}, err
	}
	defer f.Close()
	size, err := io.Copy(f, r)
	if err != nil {
		return StoredFile{}, err
	}
	return StoredFile{Name: name, Size: size}, nil
}

// Path resolves a stored file name. Names with separators or a leading dot
// are rejected.
func (l *Local) Path(name string) (string, error) {
	if name == "" || strings.ContainsAny(name, `/\`) || strings.HasPrefix(name, ".") {
		return "", ErrNotFound
	}
	path := filepath.Join(l.root, name)
	if _, err := os.Stat(path); err != nil {
		return "", ErrNotFound
	}
	return path, nil
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_package() {
        let mut ctx = GenerationContext::new();
        GoStoragePass.run(&SqlSchema::new(), &mut ctx).unwrap();
        let local = ctx.get_file("internal/storage/local.go").unwrap();
        assert!(local.contains("func (l *Local) Path(name string) (string, error)"));
        assert!(ctx.get_file("go.mod").unwrap().contains("github.com/google/uuid v1.6.0"));
        assert!(ctx.has_metadata("has:storage"));
    }
}
