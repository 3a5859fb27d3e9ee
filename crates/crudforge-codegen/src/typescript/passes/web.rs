//! Controllers, feature modules and the application bootstrap.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, Pass};
use crate::typescript::{feature_path, global_prefix, id_pipe, id_type, import_line};
use crate::CodegenError;

/// Wires each entity into a module with a REST controller and writes
/// `app.module.ts` and `main.ts`. Guards and the auth/storage modules are
/// added when those passes ran first.
pub struct NestWebPass;

impl Pass for NestWebPass {
    fn name(&self) -> &'static str {
        "nestjs"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["typescript-data", "typescript-auth", "typescript-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let has_auth = ctx.has_metadata("has:auth");
        let has_storage = ctx.has_metadata("has:storage");

        for entity in &entities {
            let route = &entity.names.route;
            ctx.set_file(
                feature_path(entity, &format!("{route}.controller.ts")),
                generate_controller(entity, has_auth),
            );
            ctx.set_file(
                feature_path(entity, &format!("{route}.module.ts")),
                generate_module(entity),
            );
        }
        ctx.set_file("src/health.controller.ts", HEALTH_CONTROLLER_TS);
        let app_module = generate_app_module(&entities, ctx.options.database, has_auth, has_storage);
        ctx.set_file("src/app.module.ts", app_module);
        ctx.set_file("src/main.ts", generate_main(&ctx.options));
        ctx.set_file(".env.example", generate_env(&ctx.options, has_auth, has_storage));
        let readme = generate_readme(&entities, &ctx.options, has_auth, has_storage);
        ctx.set_file("README.md", readme);
        Ok(())
    }
}

const HEALTH_CONTROLLER_TS: &str = r#"import { Controller, Get } from '@nestjs/common';

@Controller('health')
export class HealthController {
  @Get()
  check(): { status: string } {
    return { status: 'ok' };
  }
}
"#;

fn generate_controller(entity: &Entity<'_>, has_auth: bool) -> String {
    let pascal = &entity.names.pascal;
    let plural = &entity.names.pascal_plural;
    let kebab = &entity.names.kebab;
    let id = id_type(entity);

    let mut common = vec![
        "Body", "Controller", "Delete", "Get", "HttpCode", "HttpStatus", "Param", "Post", "Put",
        "Query",
    ];
    let param = match id_pipe(entity) {
        Some(pipe) => {
            common.push(pipe);
            format!("@Param('id', {pipe}) id: {id}")
        }
        None => format!("@Param('id') id: {id}"),
    };
    let mut guard = String::new();
    if has_auth {
        common.push("UseGuards");
        guard = "@UseGuards(JwtAuthGuard)\n".to_string();
    }

    let mut out = import_line(&common, "@nestjs/common");
    if has_auth {
        out.push_str(&import_line(&["JwtAuthGuard"], "../auth/jwt-auth.guard"));
    }
    out.push_str(&import_line(&["Page", "PageQuery"], "../common/page"));
    out.push_str(&import_line(&[format!("Create{pascal}Dto")], &format!("./dto/create-{kebab}.dto")));
    out.push_str(&import_line(&[format!("{pascal}ResponseDto")], &format!("./dto/{kebab}-response.dto")));
    out.push_str(&import_line(&[format!("Update{pascal}Dto")], &format!("./dto/update-{kebab}.dto")));
    out.push_str(&import_line(
        &[format!("{plural}Service")],
        &format!("./{}.service", entity.names.route),
    ));

    out.push_str(&format!(
        r#"
@Controller('{route}')
{guard}export class {plural}Controller {{
  constructor(private readonly service: {plural}Service) {{}}

  @Get()
  list(@Query() query: PageQuery): Promise<Page<{pascal}ResponseDto>> {{
    return this.service.list(query.page, query.pageSize);
  }}

  @Get(':id')
  get({param}): Promise<{pascal}ResponseDto> {{
    return this.service.get(id);
  }}

  @Post()
  create(@Body() dto: Create{pascal}Dto): Promise<{pascal}ResponseDto> {{
    return this.service.create(dto);
  }}

  @Put(':id')
  update({param}, @Body() dto: Update{pascal}Dto): Promise<{pascal}ResponseDto> {{
    return this.service.update(id, dto);
  }}

  @Delete(':id')
  @HttpCode(HttpStatus.NO_CONTENT)
  remove({param}): Promise<void> {{
    return this.service.remove(id);
  }}
}}
"#,
        route = entity.names.route,
    ));
    out
}

fn generate_module(entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let plural = &entity.names.pascal_plural;
    let route = &entity.names.route;
    format!(
        r#"import {{ Module }} from '@nestjs/common';
import {{ TypeOrmModule }} from '@nestjs/typeorm';
import {{ {pascal} }} from './entities/{kebab}.entity';
import {{ {plural}Controller }} from './{route}.controller';
import {{ {plural}Repository }} from './{route}.repository';
import {{ {plural}Service }} from './{route}.service';

@Module({{
  imports: [TypeOrmModule.forFeature([{pascal}])],
  controllers: [{plural}Controller],
  providers: [{plural}Repository, {plural}Service],
  exports: [{plural}Service],
}})
export class {plural}Module {{}}
"#,
        kebab = entity.names.kebab,
    )
}

/// The `TypeOrmModule` connection options for the database.
fn connection(database: Database) -> &'static str {
    match database {
        Database::Postgres => "type: 'postgres',\n        url: config.getOrThrow<string>('DATABASE_URL'),",
        Database::Mysql => "type: 'mysql',\n        url: config.getOrThrow<string>('DATABASE_URL'),",
        Database::Sqlite => "type: 'sqlite',\n        database: config.get<string>('DATABASE_PATH', 'app.db'),",
    }
}

fn generate_app_module(
    entities: &[Entity<'_>],
    database: Database,
    has_auth: bool,
    has_storage: bool,
) -> String {
    let mut out = String::from(
        "import { Module } from '@nestjs/common';\nimport { ConfigModule, ConfigService } from '@nestjs/config';\nimport { TypeOrmModule } from '@nestjs/typeorm';\n",
    );
    let mut modules = Vec::new();
    if has_auth {
        out.push_str("import { AuthModule } from './auth/auth.module';\n");
        modules.push("AuthModule".to_string());
    }
    out.push_str("import { HealthController } from './health.controller';\n");
    if has_storage {
        out.push_str("import { StorageModule } from './storage/storage.module';\n");
        modules.push("StorageModule".to_string());
    }
    for entity in entities {
        let plural = &entity.names.pascal_plural;
        let route = &entity.names.route;
        out.push_str(&format!(
            "import {{ {plural}Module }} from './{route}/{route}.module';\n"
        ));
        modules.push(format!("{plural}Module"));
    }
    let modules: String = modules.iter().map(|m| format!("    {m},\n")).collect();

    out.push_str(&format!(
        r#"
@Module({{
  imports: [
    ConfigModule.forRoot({{ isGlobal: true }}),
    TypeOrmModule.forRootAsync({{
      inject: [ConfigService],
      useFactory: (config: ConfigService) => ({{
        {connection}
        autoLoadEntities: true,
        synchronize: config.get<string>('DB_SYNCHRONIZE', 'true') === 'true',
      }}),
    }}),
{modules}  ],
  controllers: [HealthController],
}})
export class AppModule {{}}
"#,
        connection = connection(database),
    ));
    out
}

fn generate_main(options: &GeneratorOptions) -> String {
    let prefix = match global_prefix(options) {
        Some(prefix) => format!("  app.setGlobalPrefix('{prefix}', {{ exclude: ['health'] }});\n"),
        None => String::new(),
    };
    format!(
        r#"import {{ Logger, ValidationPipe }} from '@nestjs/common';
import {{ NestFactory }} from '@nestjs/core';
import {{ AppModule }} from './app.module';

async function bootstrap(): Promise<void> {{
  const app = await NestFactory.create(AppModule);
{prefix}  app.useGlobalPipes(new ValidationPipe({{ whitelist: true, transform: true }}));
  const port = Number(process.env.PORT ?? 3000);
  await app.listen(port);
  Logger.log(`listening on port ${{port}}`, 'Bootstrap');
}}

void bootstrap();
"#
    )
}

fn generate_env(options: &GeneratorOptions, has_auth: bool, has_storage: bool) -> String {
    let mut out = String::from("PORT=3000\n");
    match options.database {
        Database::Sqlite => out.push_str(&format!("DATABASE_PATH={}.db\n", options.snake_name())),
        db => out.push_str(&format!("DATABASE_URL={}\n", db.example_url(&options.snake_name()))),
    }
    out.push_str("DB_SYNCHRONIZE=true\n");
    if has_auth {
        out.push_str("JWT_SECRET=change-me\n");
    }
    if has_storage {
        out.push_str("UPLOAD_DIR=uploads\n");
    }
    out
}

fn generate_readme(
    entities: &[Entity<'_>],
    options: &GeneratorOptions,
    has_auth: bool,
    has_storage: bool,
) -> String {
    let mut out = format!(
        "# {}\n\nNestJS service generated by crudforge ({} database, TypeORM).\n\n## Running\n\n```sh\ncp .env.example .env\nnpm install\nnpm run start:dev\n```\n\n`DB_SYNCHRONIZE=true` lets TypeORM create the tables. Turn it off once\nthe schema is managed by migrations.\n\n## Resources\n\n",
        options.project_name, options.database
    );
    for entity in entities {
        out.push_str(&format!(
            "- `{}` ({})\n",
            options.route(&entity.names.route),
            entity.names.pascal
        ));
    }
    if has_auth {
        out.push_str(&format!(
            "\nRegister or log in at `{}` to obtain a bearer token.\n",
            options.route("auth")
        ));
    }
    if has_storage {
        out.push_str(&format!(
            "\nFiles are uploaded to `{}` and stored under `UPLOAD_DIR`.\n",
            options.route("files")
        ));
    }
    out
}
