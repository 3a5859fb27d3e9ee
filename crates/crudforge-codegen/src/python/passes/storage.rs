//! Local-directory uploads.

use crudforge_schema::SqlSchema;

use crate::pass::{GenerationContext, Pass};
use crate::python::base::render_config;
use crate::python::{add_requirement, render_requirements};
use crate::CodegenError;

/// Writes `app/storage.py`. The files router is written by the web pass.
pub struct PythonStoragePass;

impl Pass for PythonStoragePass {
    fn name(&self) -> &'static str {
        "python-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["python-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("app/storage.py", STORAGE_PY);
        ctx.set_metadata("has:storage", "true");
        render_config(ctx);

        add_requirement(ctx, "python-multipart", "==0.0.12");
        render_requirements(ctx);
        Ok(())
    }
}

const STORAGE_PY: &str = r#"from pathlib import Path
from typing import Annotated, Optional
from uuid import uuid4

from fastapi import Depends, UploadFile

from app.config import Settings, get_settings


class TooLargeError(Exception):
    pass


class LocalStorage:
    """Stores uploads under one directory with generated names."""

    def __init__(self, root: Path, max_bytes: int) -> None:
        self.root = root
        self.max_bytes = max_bytes

    def save(self, upload: UploadFile) -> tuple[str, int]:
        data = upload.file.read(self.max_bytes + 1)
        if len(data) > self.max_bytes:
            raise TooLargeError(upload.filename)
        self.root.mkdir(parents=True, exist_ok=True)
        name = f"{uuid4()}{Path(upload.filename or '').suffix.lower()}"
        (self.root / name).write_bytes(data)
        return name, len(data)

    def resolve(self, name: str) -> Optional[Path]:
        """Names with separators or a leading dot never resolve."""
        if not name or name.startswith(".") or "/" in name or "\\" in name:
            return None
        path = self.root / name
        return path if path.is_file() else None


def get_storage(settings: Annotated[Settings, Depends(get_settings)]) -> LocalStorage:
    return LocalStorage(Path(settings.upload_dir), settings.max_upload_bytes)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_module() {
        let mut ctx = GenerationContext::new();
        PythonStoragePass.run(&SqlSchema::new(), &mut ctx).unwrap();

        let storage = ctx.get_file("app/storage.py").unwrap();
        assert!(storage.contains("class LocalStorage:"));
        assert!(storage.contains("name.startswith(\".\")"));
        assert!(ctx.get_file("app/config.py").unwrap().contains("    upload_dir: str = \"uploads\"\n"));
        assert!(ctx
            .get_file("requirements.txt")
            .unwrap()
            .contains("python-multipart==0.0.12\n"));
        assert!(ctx.has_metadata("has:storage"));
    }
}
