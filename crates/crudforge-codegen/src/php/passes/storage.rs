//! Local-disk uploads on the `local` filesystem disk.

use crudforge_schema::SqlSchema;

use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Writes the file controller. Routes are added by the web pass.
pub struct PhpStoragePass;

impl Pass for PhpStoragePass {
    fn name(&self) -> &'static str {
        "php-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["php-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("app/Http/Controllers/Api/FileController.php", FILE_CONTROLLER_PHP);
        ctx.set_metadata("has:storage", "true");
        Ok(())
    }
}

const FILE_CONTROLLER_PHP: &str = r#"<?php

namespace App\Http\Controllers\Api;

use App\Http\Controllers\Controller;
use Illuminate\Http\JsonResponse;
use Illuminate\Http\Request;
use Illuminate\Http\Response;
use Illuminate\Support\Facades\Storage;
use Illuminate\Support\Str;
use Symfony\Component\HttpFoundation\StreamedResponse;

class FileController extends Controller
{
    private const DIRECTORY = 'uploads';

    public function store(Request $request): JsonResponse
    {
        $request->validate(['file' => ['required', 'file', 'max:10240']]);

        $file = $request->file('file');
        $extension = strtolower($file->getClientOriginalExtension());
        $name = (string) Str::uuid().($extension === '' ? '' : '.'.$extension);
        $file->storeAs(self::DIRECTORY, $name, 'local');

        return response()->json(['name' => $name, 'size' => $file->getSize()], Response::HTTP_CREATED);
    }

    /**
     * Names with separators or a leading dot are rejected.
     */
    public function show(string $name): StreamedResponse
    {
        $path = self::DIRECTORY.'/'.$name;
        abort_if(
            $name === '' || str_starts_with($name, '.') || preg_match('#[\\\\/]#', $name) === 1,
            Response::HTTP_NOT_FOUND,
            'file not found',
        );
        abort_unless(Storage::disk('local')->exists($path), Response::HTTP_NOT_FOUND, 'file not found');

        return Storage::disk('local')->download($path, $name);
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_controller() {
        let mut ctx = GenerationContext::new();
        PhpStoragePass.run(&SqlSchema::new(), &mut ctx).unwrap();
        let controller = ctx.get_file("app/Http/Controllers/Api/FileController.php").unwrap();
        assert!(controller.contains("$file->storeAs(self::DIRECTORY, $name, 'local');"));
        assert!(controller.contains("Storage::disk('local')->download($path, $name)"));
        assert!(ctx.has_metadata("has:storage"));
    }
}
