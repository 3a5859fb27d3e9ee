//! JUnit 5 + Mockito service tests.

use crudforge_schema::{SqlSchema, SqlType};

use crate::java::{add_id_import, add_maven_dep, id_type, java_ident, render_pom, test_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Writes one `*ServiceTest` per entity with the repository mocked.
pub struct JavaTestsPass;

impl Pass for JavaTestsPass {
    fn name(&self) -> &'static str {
        "java-tests"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["java-data"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let package = ctx.options.package.clone();
        for entity in &entities(schema) {
            let class = format!("{}ServiceTest", entity.names.pascal);
            let path = test_path(&ctx.options, "service", &class);
            ctx.set_file(&path, generate_service_test(&package, entity));
            add_id_import(ctx, &path, entity);
        }

        add_maven_dep(ctx, "org.springframework.boot:spring-boot-starter-test", "", "test");
        if ctx.has_metadata("has:auth") {
            add_maven_dep(ctx, "org.springframework.security:spring-security-test", "", "test");
        }
        render_pom(ctx);
        Ok(())
    }
}

/// A Java expression for a sample key value.
fn id_literal(entity: &Entity<'_>) -> String {
    match &entity.id.column.sql_type {
        SqlType::SmallInt => "(short) 1".to_string(),
        SqlType::Integer => "1".to_string(),
        SqlType::BigInt => "1L".to_string(),
        SqlType::Uuid => "UUID.fromString(\"7c9e6679-7425-40de-944b-e07fc1f90ae7\")".to_string(),
        _ => "\"1\"".to_string(),
    }
}

fn generate_service_test(package: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let nulls = vec!["null"; entity.writable().count()].join(", ");
    let id_ty = id_type(entity);

    format!(
        r#"package {package}.service;

import static org.assertj.core.api.Assertions.assertThat;
import static org.assertj.core.api.Assertions.assertThatThrownBy;
import static org.mockito.ArgumentMatchers.any;
import static org.mockito.Mockito.never;
import static org.mockito.Mockito.verify;
import static org.mockito.Mockito.when;

import {package}.dto.{pascal}Dto;
import {package}.dto.{pascal}Request;
import {package}.entity.{pascal};
import {package}.exception.ResourceNotFoundException;
import {package}.repository.{pascal}Repository;
import java.util.Optional;
import org.junit.jupiter.api.Test;
import org.junit.jupiter.api.extension.ExtendWith;
import org.mockito.InjectMocks;
import org.mockito.Mock;
import org.mockito.junit.jupiter.MockitoExtension;

@ExtendWith(MockitoExtension.class)
class {pascal}ServiceTest {{

    private static final {id_ty} ID = {id};

    @Mock
    private {pascal}Repository repository;

    @InjectMocks
    private {pascal}Service service;

    @Test
    void findByIdReturnsDto() {{
        {pascal} entity = new {pascal}();
        entity.set{id_pascal}(ID);
        when(repository.findById(ID)).thenReturn(Optional.of(entity));

        {pascal}Dto dto = service.findById(ID);

        assertThat(dto.{id_camel}()).isEqualTo(ID);
    }}

    @Test
    void findByIdThrowsWhenMissing() {{
        when(repository.findById(ID)).thenReturn(Optional.empty());

        assertThatThrownBy(() -> service.findById(ID))
                .isInstanceOf(ResourceNotFoundException.class);
    }}

    @Test
    void createSavesEntity() {{
        when(repository.save(any({pascal}.class))).thenAnswer(invocation -> invocation.getArgument(0));

        service.create(new {pascal}Request({nulls}));

        verify(repository).save(any({pascal}.class));
    }}

    @Test
    void deleteThrowsWhenMissing() {{
        when(repository.existsById(ID)).thenReturn(false);

        assertThatThrownBy(() -> service.delete(ID))
                .isInstanceOf(ResourceNotFoundException.class);
        verify(repository, never()).deleteById(any());
    }}
}}
"#,
        id = id_literal(entity),
        id_pascal = entity.id.pascal,
        id_camel = java_ident(&entity.id.camel),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_service_tests() {
        let mut ctx = GenerationContext::new();
        JavaTestsPass.run(&blog(), &mut ctx).unwrap();
        let test = ctx
            .get_file("src/test/java/com/example/app/service/PostServiceTest.java")
            .unwrap();
        assert!(test.contains("private static final Long ID = 1L;"));
        assert!(test.contains("service.create(new PostRequest(null, null, null, null));"));
        let tag = ctx
            .get_file("src/test/java/com/example/app/service/TagServiceTest.java")
            .unwrap();
        assert!(tag.contains("private static final Integer ID = 1;"));
        assert!(ctx.get_file("pom.xml").unwrap().contains("<scope>test</scope>"));
    }
}
