//! Local file storage for Spring.

use crudforge_schema::SqlSchema;

use crate::java::source_path;
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Adds `StorageService` and `FileController` (`POST /files`,
/// `GET /files/{name}`).
pub struct JavaStoragePass;

impl Pass for JavaStoragePass {
    fn name(&self) -> &'static str {
        "java-storage"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["java-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let package = ctx.options.package.clone();
        let route = ctx.options.route("files");

        let path = source_path(&ctx.options, "service", "StorageService");
        ctx.set_file(path, generate_storage_service(&package));
        let path = source_path(&ctx.options, "controller", "FileController");
        ctx.set_file(path, generate_file_controller(&package, &route));

        ctx.set_metadata("has:storage", "true");
        Ok(())
    }
}

fn generate_storage_service(package: &str) -> String {
    format!(
        r#"package {package}.service;

import {package}.exception.ResourceNotFoundException;
import java.io.IOException;
import java.io.UncheckedIOException;
import java.nio.file.Files;
import java.nio.file.Path;
import java.nio.file.Paths;
import java.util.UUID;
import org.springframework.beans.factory.annotation.Value;
import org.springframework.core.io.PathResource;
import org.springframework.core.io.Resource;
import org.springframework.stereotype.Service;
import org.springframework.util.StringUtils;
import org.springframework.web.multipart.MultipartFile;

@Service
public class StorageService {{

    private final Path root;

    public StorageService(@Value("${{app.storage.dir}}") String dir) {{
        this.root = Paths.get(dir).toAbsolutePath().normalize();
    }}

    public String store(MultipartFile file) {{
        String extension = StringUtils.getFilenameExtension(file.getOriginalFilename());
        String name = UUID.randomUUID() + (extension == null ? "" : "." + extension);
        try {{
            Files.createDirectories(root);
            file.transferTo(root.resolve(name));
        }} catch (IOException ex) {{
            throw new UncheckedIOException("failed to store " + name, ex);
        }}
        return name;
    }}

    public Resource load(String name) {{
        Path path = root.resolve(name).normalize();
        if (!path.startsWith(root) || !Files.exists(path)) {{
            throw new ResourceNotFoundException("File", name);
        }}
        return new PathResource(path);
    }}
}}
"#
    )
}

fn generate_file_controller(package: &str, route: &str) -> String {
    format!(
        r#"package {package}.controller;

import {package}.service.StorageService;
import java.util.Map;
import org.springframework.core.io.Resource;
import org.springframework.http.HttpStatus;
import org.springframework.http.MediaType;
import org.springframework.http.ResponseEntity;
import org.springframework.web.bind.annotation.*;
import org.springframework.web.multipart.MultipartFile;

@RestController
@RequestMapping("{route}")
public class FileController {{

    private final StorageService storage;

    public FileController(StorageService storage) {{
        this.storage = storage;
    }}

    @PostMapping(consumes = MediaType.MULTIPART_FORM_DATA_VALUE)
    @ResponseStatus(HttpStatus.CREATED)
    public Map<String, Object> upload(@RequestParam("file") MultipartFile file) {{
        String name = storage.store(file);
        return Map.of("name", name, "size", file.getSize());
    }}

    @GetMapping("/{{name}}")
    public ResponseEntity<Resource> download(@PathVariable String name) {{
        return ResponseEntity.ok()
                .contentType(MediaType.APPLICATION_OCTET_STREAM)
                .body(storage.load(name));
    }}
}}
"#
    )
}
