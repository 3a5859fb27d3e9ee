//! Repositories over a SQLAlchemy session and the services the routers call.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::python::{attr, id_type, Imports};
use crate::types::{PythonTypes, TypeMapper};
use crate::CodegenError;

/// Writes `app/repositories`, `app/services` and `app/errors.py`.
pub struct PythonDataPass;

impl Pass for PythonDataPass {
    fn name(&self) -> &'static str {
        "python-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["python-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        for entity in &entities(schema) {
            let snake = &entity.names.snake;
            ctx.set_file(format!("app/repositories/{snake}.py"), generate_repository(entity));
            ctx.set_file(format!("app/services/{snake}.py"), generate_service(entity));
        }
        ctx.set_file("app/repositories/__init__.py", "");
        ctx.set_file("app/services/__init__.py", "");
        ctx.set_file("app/errors.py", ERRORS_PY);
        Ok(())
    }
}

const ERRORS_PY: &str = r#"class NotFoundError(Exception):
    """Raised by services when a row does not exist."""

    def __init__(self, resource: str, key: object) -> None:
        super().__init__(f"{resource} {key} not found")
        self.resource = resource
        self.key = key
"#;

fn id_imports(entity: &Entity<'_>, imports: &mut Imports) {
    if let Some(line) = PythonTypes.import_for(&entity.id.column.sql_type) {
        imports.add_line(line);
    }
}

fn generate_repository(entity: &Entity<'_>) -> String {
    let mut imports = Imports::new();
    imports.add("typing", "Any");
    imports.add("typing", "Optional");
    imports.add("sqlalchemy", "func");
    imports.add("sqlalchemy", "select");
    imports.add("sqlalchemy.orm", "Session");
    imports.add(&format!("app.models.{}", entity.names.snake), &entity.names.pascal);
    id_imports(entity, &mut imports);

    format!(
        r#"{imports}

class {p}Repository:
    def __init__(self, session: Session) -> None:
        self.session = session

    def find_page(self, offset: int, limit: int) -> tuple[list[{p}], int]:
        total = self.session.scalar(select(func.count()).select_from({p})) or 0
        query = select({p}).order_by({p}.{id}).offset(offset).limit(limit)
        return list(self.session.scalars(query)), total

    def get(self, item_id: {id_ty}) -> Optional[{p}]:
        return self.session.get({p}, item_id)

    def create(self, values: dict[str, Any]) -> {p}:
        item = {p}(**values)
        self.session.add(item)
        self.session.commit()
        self.session.refresh(item)
        return item

    def update(self, item: {p}, values: dict[str, Any]) -> {p}:
        for key, value in values.items():
            setattr(item, key, value)
        self.session.commit()
        self.session.refresh(item)
        return item

    def delete(self, item: {p}) -> None:
        self.session.delete(item)
        self.session.commit()
"#,
        imports = imports.render(),
        p = entity.names.pascal,
        id = attr(&entity.id),
        id_ty = id_type(entity),
    )
}

fn generate_service(entity: &Entity<'_>) -> String {
    let snake = &entity.names.snake;
    let pascal = &entity.names.pascal;
    let mut imports = Imports::new();
    imports.add("app.errors", "NotFoundError");
    imports.add(&format!("app.models.{snake}"), pascal);
    imports.add(&format!("app.repositories.{snake}"), &format!("{pascal}Repository"));
    imports.add("app.schemas.page", "Page");
    imports.add("app.schemas.page", "clamp_page");
    for suffix in ["Create", "Read", "Update"] {
        imports.add(&format!("app.schemas.{snake}"), &format!("{pascal}{suffix}"));
    }
    id_imports(entity, &mut imports);

    format!(
        r#"{imports}

class {p}Service:
    def __init__(self, repository: {p}Repository) -> None:
        self.repository = repository

    def list_page(self, page: int, page_size: int) -> Page[{p}Read]:
        page, page_size = clamp_page(page, page_size)
        items, total = self.repository.find_page((page - 1) * page_size, page_size)
        return Page[{p}Read](
            items=[{p}Read.model_validate(item) for item in items],
            page=page,
            page_size=page_size,
            total=total,
        )

    def get(self, item_id: {id_ty}) -> {p}:
        item = self.repository.get(item_id)
        if item is None:
            raise NotFoundError("{p}", item_id)
        return item

    def create(self, data: {p}Create) -> {p}:
        return self.repository.create(data.model_dump(exclude_unset=True))

    def update(self, item_id: {id_ty}, data: {p}Update) -> {p}:
        return self.repository.update(self.get(item_id), data.model_dump(exclude_unset=True))

    def delete(self, item_id: {id_ty}) -> None:
        self.repository.delete(self.get(item_id))
"#,
        imports = imports.render(),
        p = pascal,
        id_ty = id_type(entity),
    )
}
