//! Local-disk file storage with multer uploads.

use crudforge_schema::SqlSchema;

use crate::pass::{GenerationContext, Pass};
use crate::typescript::{add_dev_dependency, render_package_json};
use crate::CodegenError;

/// Writes `src/storage`. The controller is guarded when auth is enabled.
pub struct TypeScriptStoragePass;

impl Pass for TypeScriptStoragePass {
    fn name(&self) -> &'static str {
        "typescript-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["typescript-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("src/storage/storage.service.ts", STORAGE_SERVICE_TS);
        ctx.set_file(
            "src/storage/storage.controller.ts",
            generate_controller(ctx.options.auth),
        );
        ctx.set_file("src/storage/storage.module.ts", STORAGE_MODULE_TS);
        ctx.set_metadata("has:storage", "true");

        add_dev_dependency(ctx, "@types/multer", "^1.4.12");
        render_package_json(ctx);
        Ok(())
    }
}

const STORAGE_SERVICE_TS: &str = r#"import { Injectable, NotFoundException } from '@nestjs/common';
import { ConfigService } from '@nestjs/config';
import { randomUUID } from 'crypto';
import { promises as fs } from 'fs';
import { extname, join, resolve } from 'path';

export interface StoredFile {
  name: string;
  size: number;
}

/** Stores uploads in one directory under random names. */
@Injectable()
export class StorageService {
  private readonly root: string;

  constructor(config: ConfigService) {
    this.root = resolve(config.get<string>('UPLOAD_DIR', 'uploads'));
  }

  async save(data: Buffer, originalName: string): Promise<StoredFile> {
    await fs.mkdir(this.root, { recursive: true });
    const name = randomUUID() + extname(originalName).toLowerCase();
    await fs.writeFile(join(this.root, name), data);
    return { name, size: data.length };
  }

  /** Resolves a stored name. Names with separators or a leading dot are rejected. */
  async locate(name: string): Promise<string> {
    if (!name || /[\\/]/.test(name) || name.startsWith('.')) {
      throw new NotFoundException('file not found');
    }
    const path = join(this.root, name);
    try {
      await fs.access(path);
    } catch {
      throw new NotFoundException('file not found');
    }
    return path;
  }
}
"#;

const STORAGE_MODULE_TS: &str = r#"import { Module } from '@nestjs/common';
import { StorageController } from './storage.controller';
import { StorageService } from './storage.service';

@Module({
  controllers: [StorageController],
  providers: [StorageService],
  exports: [StorageService],
})
export class StorageModule {}
"#;

fn generate_controller(guarded: bool) -> String {
    let (guard_import, guard, use_guards) = if guarded {
        (
            "import { JwtAuthGuard } from '../auth/jwt-auth.guard';\n",
            "@UseGuards(JwtAuthGuard)\n",
            "\n  UseGuards,",
        )
    } else {
        ("", "", "")
    };
    format!(
        r#"import {{
  BadRequestException,
  Controller,
  Get,
  Param,
  Post,
  Res,
  UploadedFile,
  UseInterceptors,{use_guards}
}} from '@nestjs/common';
import {{ FileInterceptor }} from '@nestjs/platform-express';
import {{ Response }} from 'express';
{guard_import}import {{ StorageService, StoredFile }} from './storage.service';

@Controller('files')
{guard}export class StorageController {{
  constructor(private readonly storage: StorageService) {{}}

  @Post()
  @UseInterceptors(FileInterceptor('file'))
  upload(@UploadedFile() file: Express.Multer.File): Promise<StoredFile> {{
    if (!file) {{
      throw new BadRequestException('missing file field');
    }}
    return this.storage.save(file.buffer, file.originalname);
  }}

  @Get(':name')
  async download(@Param('name') name: string, @Res() res: Response): Promise<void> {{
    res.sendFile(await this.storage.locate(name));
  }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::GeneratorOptions;

    #[test]
    fn test_storage_module() {
        let mut ctx = GenerationContext::new();
        TypeScriptStoragePass.run(&SqlSchema::new(), &mut ctx).unwrap();
        let controller = ctx.get_file("src/storage/storage.controller.ts").unwrap();
        assert!(controller.contains("@Controller('files')\n@UseGuards(JwtAuthGuard)\n"));
        assert!(controller.contains("  UseInterceptors,\n  UseGuards,\n}"));
        assert!(ctx.has_metadata("has:storage"));
    }

    #[test]
    fn test_unguarded_without_auth() {
        let options = GeneratorOptions {
            auth: false,
            ..GeneratorOptions::default()
        };
        let mut ctx = GenerationContext::with_options(options);
        TypeScriptStoragePass.run(&SqlSchema::new(), &mut ctx).unwrap();
        let controller = ctx.get_file("src/storage/storage.controller.ts").unwrap();
        assert!(!controller.contains("JwtAuthGuard"));
    }
}
