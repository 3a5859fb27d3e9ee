//! Eloquent repositories and the services wrapping them.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::php::{id_type, quote};
use crate::CodegenError;

/// Writes `app/Repositories` and `app/Services`.
pub struct PhpDataPass;

impl Pass for PhpDataPass {
    fn name(&self) -> &'static str {
        "php-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["php-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        for entity in &entities(schema) {
            let pascal = &entity.names.pascal;
            ctx.set_file(
                format!("app/Repositories/{pascal}Repository.php"),
                generate_repository(entity),
            );
            ctx.set_file(
                format!("app/Services/{pascal}Service.php"),
                generate_service(entity),
            );
        }
        ctx.set_metadata("has:repositories", "true");
        Ok(())
    }
}

fn generate_repository(entity: &Entity<'_>) -> String {
    format!(
        r#"<?php

namespace App\Repositories;

use App\Models\{pascal};
use Illuminate\Contracts\Pagination\LengthAwarePaginator;

class {pascal}Repository
{{
    public function paginate(int $page, int $size): LengthAwarePaginator
    {{
        return {pascal}::query()->orderBy({key})->paginate($size, ['*'], 'page', $page);
    }}

    public function find({id} $id): ?{pascal}
    {{
        return {pascal}::query()->find($id);
    }}

    public function create(array $attributes): {pascal}
    {{
        return {pascal}::query()->create($attributes)->refresh();
    }}

    public function update({pascal} ${camel}, array $attributes): {pascal}
    {{
        ${camel}->update($attributes);

        return ${camel}->refresh();
    }}

    public function delete({pascal} ${camel}): void
    {{
        ${camel}->delete();
    }}
}}
"#,
        pascal = entity.names.pascal,
        camel = entity.names.camel,
        key = quote(entity.id.name()),
        id = id_type(entity),
    )
}

fn generate_service(entity: &Entity<'_>) -> String {
    format!(
        r#"<?php

namespace App\Services;

use App\Models\{pascal};
use App\Repositories\{pascal}Repository;
use App\Support\Paging;
use Illuminate\Contracts\Pagination\LengthAwarePaginator;
use Illuminate\Database\Eloquent\ModelNotFoundException;

class {pascal}Service
{{
    public function __construct(private readonly {pascal}Repository $repository)
    {{
    }}

    public function list(int $page, int $size): LengthAwarePaginator
    {{
        [$page, $size] = Paging::clamp($page, $size);

        return $this->repository->paginate($page, $size);
    }}

    /**
     * @throws ModelNotFoundException when no {label} has the key
     */
    public function get({id} $id): {pascal}
    {{
        return $this->repository->find($id)
            ?? throw (new ModelNotFoundException())->setModel({pascal}::class, [$id]);
    }}

    public function create(array $attributes): {pascal}
    {{
        return $this->repository->create($attributes);
    }}

    public function update({id} $id, array $attributes): {pascal}
    {{
        return $this->repository->update($this->get($id), $attributes);
    }}

    public function delete({id} $id): void
    {{
        $this->repository->delete($this->get($id));
    }}
}}
"#,
        pascal = entity.names.pascal,
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
        PhpDataPass.run(&blog(), &mut ctx).unwrap();

        let repo = ctx.get_file("app/Repositories/TagRepository.php").unwrap();
        assert!(repo.contains("return Tag::query()->orderBy('id')->paginate($size, ['*'], 'page', $page);"));
        assert!(repo.contains("public function find(int $id): ?Tag"));
        assert!(repo.contains("public function update(Tag $tag, array $attributes): Tag"));

        let service = ctx.get_file("app/Services/PostService.php").unwrap();
        assert!(service.contains("[$page, $size] = Paging::clamp($page, $size);"));
        assert!(service.contains("?? throw (new ModelNotFoundException())->setModel(Post::class, [$id]);"));
        assert!(service.contains("public function delete(int $id): void"));
    }
}
