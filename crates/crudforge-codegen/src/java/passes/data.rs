//! Spring Data repositories and services.

use crudforge_schema::SqlSchema;

use crate::java::{add_id_import, id_type, java_ident, source_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Generates `repository/`, `service/` and the not-found exception.
pub struct JavaDataPass;

impl Pass for JavaDataPass {
    fn name(&self) -> &'static str {
        "java-data"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["java-base"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let package = ctx.options.package.clone();

        for entity in &entities(schema) {
            let pascal = &entity.names.pascal;
            let path = source_path(&ctx.options, "repository", &format!("{pascal}Repository"));
            ctx.set_file(&path, generate_repository(&package, entity));
            add_id_import(ctx, &path, entity);

            let path = source_path(&ctx.options, "service", &format!("{pascal}Service"));
            ctx.set_file(&path, generate_service(&package, entity));
            add_id_import(ctx, &path, entity);
        }

        let path = source_path(&ctx.options, "exception", "ResourceNotFoundException");
        ctx.set_file(path, generate_not_found(&package));

        ctx.set_metadata("has:repositories", "true");
        Ok(())
    }
}

fn generate_repository(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    format!(
        r#"package {package}.repository;

import {package}.entity.{pascal};
import org.springframework.data.jpa.repository.JpaRepository;
import org.springframework.stereotype.Repository;

@Repository
public interface {pascal}Repository extends JpaRepository<{pascal}, {id}> {{
}}
"#,
        id = id_type(entity),
    )
}

/// Copies the request onto the entity. The key is only assigned on create.
fn apply_lines(entity: &Entity<'_>) -> String {
    entity
        .writable()
        .filter(|f| !f.column.primary_key)
        .map(|f| {
            format!(
                "        entity.set{}(request.{}());\n",
                f.pascal,
                java_ident(&f.camel)
            )
        })
        .collect()
}

fn generate_service(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let id = id_type(entity);
    let assign_key = if entity.writable().any(|f| f.column.primary_key) {
        format!(
            "        entity.set{}(request.{}());\n",
            entity.id.pascal,
            java_ident(&entity.id.camel)
        )
    } else {
        String::new()
    };

    format!(
        r#"package {package}.service;

import {package}.dto.{pascal}Dto;
import {package}.dto.{pascal}Request;
import {package}.entity.{pascal};
import {package}.exception.ResourceNotFoundException;
import {package}.repository.{pascal}Repository;
import org.springframework.data.domain.Page;
import org.springframework.data.domain.Pageable;
import org.springframework.stereotype.Service;
import org.springframework.transaction.annotation.Transactional;

@Service
@Transactional
public class {pascal}Service {{

    private final {pascal}Repository repository;

    public {pascal}Service({pascal}Repository repository) {{
        this.repository = repository;
    }}

    @Transactional(readOnly = true)
    public Page<{pascal}Dto> findAll(Pageable pageable) {{
        return repository.findAll(pageable).map({pascal}Dto::from);
    }}

    @Transactional(readOnly = true)
    public {pascal}Dto findById({id} id) {{
        return {pascal}Dto.from(getEntity(id));
    }}

    public {pascal}Dto create({pascal}Request request) {{
        {pascal} entity = new {pascal}();
{assign_key}        apply(entity, request);
        return {pascal}Dto.from(repository.save(entity));
    }}

    public {pascal}Dto update({id} id, {pascal}Request request) {{
        {pascal} entity = getEntity(id);
        apply(entity, request);
        return {pascal}Dto.from(repository.save(entity));
    }}

    public void delete({id} id) {{
        if (!repository.existsById(id)) {{
            throw new ResourceNotFoundException("{pascal}", id);
        }}
        repository.deleteById(id);
    }}

    private {pascal} getEntity({id} id) {{
        return repository.findById(id)
                .orElseThrow(() -> new ResourceNotFoundException("{pascal}", id));
    }}

    private void apply({pascal} entity, {pascal}Request request) {{
{apply}    }}
}}
"#,
        apply = apply_lines(entity),
    )
}

fn generate_not_found(package: &str) -> String {
    format!(
        r#"package {package}.exception;

public class ResourceNotFoundException extends RuntimeException {{

    public ResourceNotFoundException(String resource, Object id) {{
        super(resource + " " + id + " not found");
    }}
}}
"#
    )
}
