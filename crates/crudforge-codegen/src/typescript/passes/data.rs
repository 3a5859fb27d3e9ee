//! TypeORM-backed repositories and services.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::typescript::{feature_path, id_type};
use crate::CodegenError;

/// Writes `<route>.repository.ts` and `<route>.service.ts` per entity.
pub struct TypeScriptDataPass;

impl Pass for TypeScriptDataPass {
    fn name(&self) -> &'static str {
        "typescript-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["typescript-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        for entity in &entities(schema) {
            let route = &entity.names.route;
            ctx.set_file(
                feature_path(entity, &format!("{route}.repository.ts")),
                generate_repository(entity),
            );
            ctx.set_file(
                feature_path(entity, &format!("{route}.service.ts")),
                generate_service(entity),
            );
        }
        ctx.set_metadata("has:repositories", "true");
        Ok(())
    }
}

fn generate_repository(entity: &Entity<'_>) -> String {
    format!(
        r#"import {{ Injectable }} from '@nestjs/common';
import {{ InjectRepository }} from '@nestjs/typeorm';
import {{ Repository }} from 'typeorm';
import {{ {pascal} }} from './entities/{kebab}.entity';

@Injectable()
export class {plural}Repository {{
  constructor(@InjectRepository({pascal}) private readonly repo: Repository<{pascal}>) {{}}

  findPage(skip: number, take: number): Promise<[{pascal}[], number]> {{
    return this.repo.findAndCount({{ order: {{ {key}: 'ASC' }}, skip, take }});
  }}

  findById(id: {id}): Promise<{pascal} | null> {{
    return this.repo.findOneBy({{ {key}: id }});
  }}

  create(data: Partial<{pascal}>): Promise<{pascal}> {{
    return this.repo.save(this.repo.create(data));
  }}

  save(entity: {pascal}): Promise<{pascal}> {{
    return this.repo.save(entity);
  }}

  async remove(entity: {pascal}): Promise<void> {{
    await this.repo.remove(entity);
  }}
}}
"#,
        pascal = entity.names.pascal,
        plural = entity.names.pascal_plural,
        kebab = entity.names.kebab,
        key = entity.id.camel,
        id = id_type(entity),
    )
}

fn generate_service(entity: &Entity<'_>) -> String {
    format!(
        r#"import {{ Injectable, NotFoundException }} from '@nestjs/common';
import {{ clampPage, Page }} from '../common/page';
import {{ Create{pascal}Dto }} from './dto/create-{kebab}.dto';
import {{ {pascal}ResponseDto }} from './dto/{kebab}-response.dto';
import {{ Update{pascal}Dto }} from './dto/update-{kebab}.dto';
import {{ {pascal} }} from './entities/{kebab}.entity';
import {{ {plural}Repository }} from './{route}.repository';

@Injectable()
export class {plural}Service {{
  constructor(private readonly repository: {plural}Repository) {{}}

  async list(page?: number, size?: number): Promise<Page<{pascal}ResponseDto>> {{
    const window = clampPage(page, size);
    const [items, total] = await this.repository.findPage((window.page - 1) * window.size, window.size);
    return {{
      items: items.map((item) => {pascal}ResponseDto.fromEntity(item)),
      page: window.page,
      pageSize: window.size,
      total,
    }};
  }}

  async get(id: {id}): Promise<{pascal}ResponseDto> {{
    return {pascal}ResponseDto.fromEntity(await this.find(id));
  }}

  async create(dto: Create{pascal}Dto): Promise<{pascal}ResponseDto> {{
    return {pascal}ResponseDto.fromEntity(await this.repository.create({{ ...dto }}));
  }}

  async update(id: {id}, dto: Update{pascal}Dto): Promise<{pascal}ResponseDto> {{
    const entity = await this.find(id);
    Object.assign(entity, dto);
    return {pascal}ResponseDto.fromEntity(await this.repository.save(entity));
  }}

  async remove(id: {id}): Promise<void> {{
    await this.repository.remove(await this.find(id));
  }}

  private async find(id: {id}): Promise<{pascal}> {{
    const entity = await this.repository.findById(id);
    if (!entity) {{
      throw new NotFoundException(`{label} ${{id}} not found`);
    }}
    return entity;
  }}
}}
"#,
        pascal = entity.names.pascal,
        plural = entity.names.pascal_plural,
        kebab = entity.names.kebab,
        route = entity.names.route,
        id = id_type(entity),
        label = entity.names.snake.replace('_', " "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_repository_and_service() {
        let mut ctx = GenerationContext::new();
        TypeScriptDataPass.run(&blog(), &mut ctx).unwrap();

        let repo = ctx.get_file("src/tags/tags.repository.ts").unwrap();
        assert!(repo.contains("export class TagsRepository {"));
        assert!(repo.contains("@InjectRepository(Tag) private readonly repo: Repository<Tag>"));
        assert!(repo.contains("return this.repo.findOneBy({ id: id });"));

        let service = ctx.get_file("src/posts/posts.service.ts").unwrap();
        assert!(service.contains("import { PostsRepository } from './posts.repository';"));
        assert!(service.contains("throw new NotFoundException(`post ${id} not found`);"));
        assert!(service.contains("async update(id: number, dto: UpdatePostDto)"));
    }
}
