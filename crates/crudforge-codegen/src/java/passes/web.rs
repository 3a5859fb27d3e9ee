//! Spring MVC controllers, application entry point and configuration.

use crudforge_schema::SqlSchema;

use crate::java::{add_id_import, id_type, source_path};
use crate::model::{entities, Entity};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Generates REST controllers, the error handler, `Application.java`,
/// `application.yml` and the README.
pub struct SpringWebPass;

impl Pass for SpringWebPass {
    fn name(&self) -> &'static str {
        "spring-web"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["java-data", "java-auth", "java-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let entities = entities(schema);
        let package = ctx.options.package.clone();
        let has_auth = ctx.has_metadata("has:auth");
        let has_storage = ctx.has_metadata("has:storage");

        for entity in &entities {
            let path = source_path(
                &ctx.options,
                "controller",
                &format!("{}Controller", entity.names.pascal),
            );
            let code = generate_controller(&package, &ctx.options, entity);
            ctx.set_file(&path, code);
            add_id_import(ctx, &path, entity);
        }

        let path = source_path(&ctx.options, "exception", "GlobalExceptionHandler");
        ctx.set_file(path, generate_exception_handler(&package));

        let application = format!("{}Application", ctx.options.pascal_name());
        let path = source_path(&ctx.options, "", &application);
        ctx.set_file(path, generate_application(&package, &application));

        let yml = generate_application_yml(&ctx.options, has_auth, has_storage);
        ctx.set_file("src/main/resources/application.yml", yml);

        let readme = generate_readme(&entities, &ctx.options, has_auth, has_storage);
        ctx.set_file("README.md", readme);

        ctx.set_metadata("has:spring-web", "true");
        Ok(())
    }
}

fn generate_controller(package: &str, options: &GeneratorOptions, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    format!(
        r#"package {package}.controller;

import {package}.dto.{pascal}Dto;
import {package}.dto.{pascal}Request;
import {package}.service.{pascal}Service;
import jakarta.validation.Valid;
import org.springframework.data.domain.Page;
import org.springframework.data.domain.Pageable;
import org.springframework.http.HttpStatus;
import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("{route}")
public class {pascal}Controller {{

    private final {pascal}Service service;

    public {pascal}Controller({pascal}Service service) {{
        this.service = service;
    }}

    @GetMapping
    public Page<{pascal}Dto> list(Pageable pageable) {{
        return service.findAll(pageable);
    }}

    @GetMapping("/{{id}}")
    public {pascal}Dto get(@PathVariable {id} id) {{
        return service.findById(id);
    }}

    @PostMapping
    @ResponseStatus(HttpStatus.CREATED)
    public {pascal}Dto create(@Valid @RequestBody {pascal}Request request) {{
        return service.create(request);
    }}

    @PutMapping("/{{id}}")
    public {pascal}Dto update(@PathVariable {id} id, @Valid @RequestBody {pascal}Request request) {{
        return service.update(id, request);
    }}

    @DeleteMapping("/{{id}}")
    @ResponseStatus(HttpStatus.NO_CONTENT)
    public void delete(@PathVariable {id} id) {{
        service.delete(id);
    }}
}}
"#,
        route = options.route(&entity.names.route),
        id = id_type(entity),
    )
}

fn generate_exception_handler(package: &str) -> String {
    format!(
        r#"package {package}.exception;

import java.util.LinkedHashMap;
import java.util.Map;
import org.springframework.http.HttpStatus;
import org.springframework.http.ProblemDetail;
import org.springframework.web.bind.MethodArgumentNotValidException;
import org.springframework.web.bind.annotation.ExceptionHandler;
import org.springframework.web.bind.annotation.RestControllerAdvice;

@RestControllerAdvice
public class GlobalExceptionHandler {{

    @ExceptionHandler(ResourceNotFoundException.class)
    public ProblemDetail handleNotFound(ResourceNotFoundException ex) {{
        return ProblemDetail.forStatusAndDetail(HttpStatus.NOT_FOUND, ex.getMessage());
    }}

    @ExceptionHandler(MethodArgumentNotValidException.class)
    public ProblemDetail handleValidation(MethodArgumentNotValidException ex) {{
        ProblemDetail problem = ProblemDetail.forStatusAndDetail(HttpStatus.BAD_REQUEST, "Validation failed");
        Map<String, String> errors = new LinkedHashMap<>();
        ex.getBindingResult().getFieldErrors()
                .forEach(error -> errors.put(error.getField(), error.getDefaultMessage()));
        problem.setProperty("errors", errors);
        return problem;
    }}
}}
"#
    )
}

fn generate_application(package: &str, class: &str) -> String {
    format!(
        r#"package {package};

import org.springframework.boot.SpringApplication;
import org.springframework.boot.autoconfigure.SpringBootApplication;

@SpringBootApplication
public class {class} {{

    public static void main(String[] args) {{
        SpringApplication.run({class}.class, args);
    }}
}}
"#
    )
}

fn datasource(options: &GeneratorOptions) -> String {
    let db = options.snake_name();
    match options.database {
        Database::Postgres => format!(
            "    url: ${{DATABASE_URL:jdbc:postgresql://localhost:5432/{db}}}\n    username: ${{DATABASE_USER:postgres}}\n    password: ${{DATABASE_PASSWORD:postgres}}\n"
        ),
        Database::Mysql => format!(
            "    url: ${{DATABASE_URL:jdbc:mysql://localhost:3306/{db}}}\n    username: ${{DATABASE_USER:root}}\n    password: ${{DATABASE_PASSWORD:root}}\n"
        ),
        Database::Sqlite => format!(
            "    url: ${{DATABASE_URL:jdbc:sqlite:{db}.db}}\n    driver-class-name: org.sqlite.JDBC\n"
        ),
    }
}

fn generate_application_yml(options: &GeneratorOptions, has_auth: bool, has_storage: bool) -> String {
    let dialect = if options.database == Database::Sqlite {
        "    database-platform: org.hibernate.community.dialect.SQLiteDialect\n"
    } else {
        ""
    };
    let mut out = format!(
        r#"spring:
  application:
    name: {name}
  datasource:
{datasource}  jpa:
{dialect}    hibernate:
      ddl-auto: update
    open-in-view: false
"#,
        name = options.project_name,
        datasource = datasource(options),
    );
    if has_storage {
        out.push_str("  servlet:\n    multipart:\n      max-file-size: 10MB\n");
    }
    if has_auth || has_storage {
        out.push_str("\napp:\n");
    }
    if has_auth {
        out.push_str("  jwt:\n    secret: ${JWT_SECRET:change-me-to-a-long-random-secret-of-32-bytes}\n    expiration-minutes: 1440\n");
    }
    if has_storage {
        out.push_str("  storage:\n    dir: ${UPLOAD_DIR:uploads}\n");
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
        "# {}\n\nSpring Boot 3 service generated by crudforge ({} database).\n\n## Running\n\n```sh\nmvn spring-boot:run\n```\n\n## Resources\n\n",
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
            "\nFiles are uploaded to `{}` and stored under `app.storage.dir`.\n",
            options.route("files")
        ));
    }
    out
}
