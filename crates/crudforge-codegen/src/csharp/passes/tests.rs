//! xUnit + Moq service tests.

use crudforge_schema::{SqlSchema, SqlType};

use crate::csharp::{id_type, namespace, project, test_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

const TEST_PACKAGES: &[(&str, &str)] = &[
    ("Microsoft.NET.Test.Sdk", "17.11.0"),
    ("Moq", "4.20.70"),
    ("xunit", "2.9.0"),
    ("xunit.runner.visualstudio", "2.8.2"),
];

/// Writes the test project and one `*ServiceTests` class per entity.
pub struct CSharpTestsPass;

impl Pass for CSharpTestsPass {
    fn name(&self) -> &'static str {
        "csharp-tests"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["csharp-data"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let namespace = namespace(&ctx.options);
        let project = project(&ctx.options);

        for entity in &entities(schema) {
            let path = test_path(
                &ctx.options,
                &format!("Services/{}ServiceTests.cs", entity.names.pascal),
            );
            ctx.set_file(path, generate_service_tests(&namespace, entity));
        }

        let path = test_path(&ctx.options, &format!("{project}.Tests.csproj"));
        ctx.set_file(path, generate_csproj(&project));
        Ok(())
    }
}

fn generate_csproj(project: &str) -> String {
    let packages: String = TEST_PACKAGES
        .iter()
        .map(|(id, version)| format!("    <PackageReference Include=\"{id}\" Version=\"{version}\" />\n"))
        .collect();
    format!(
        r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Nullable>enable</Nullable>
    <ImplicitUsings>enable</ImplicitUsings>
    <IsPackable>false</IsPackable>
  </PropertyGroup>

  <ItemGroup>
{packages}  </ItemGroup>

  <ItemGroup>
    <ProjectReference Include="..\..\src\{project}\{project}.csproj" />
  </ItemGroup>

</Project>
"#
    )
}

/// A C# expression for a sample key value.
fn id_literal(entity: &Entity<'_>) -> &'static str {
    match &entity.id.column.sql_type {
        SqlType::SmallInt => "(short)1",
        SqlType::Integer => "1",
        SqlType::BigInt => "1L",
        SqlType::Uuid => "Guid.Parse(\"7c9e6679-7425-40de-944b-e07fc1f90ae7\")",
        _ => "\"1\"",
    }
}

fn generate_service_tests(namespace: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    format!(
        r#"using {namespace}.Dtos;
using {namespace}.Exceptions;
using {namespace}.Models;
using {namespace}.Repositories;
using {namespace}.Services;
using Moq;
using Xunit;

namespace {namespace}.Tests.Services;

public class {pascal}ServiceTests
{{
    private static readonly {id_ty} SampleId = {id};

    private readonly Mock<I{pascal}Repository> _repository = new();
    private readonly {pascal}Service _service;

    public {pascal}ServiceTests()
    {{
        _service = new {pascal}Service(_repository.Object);
    }}

    [Fact]
    public async Task GetAsync_ReturnsDto()
    {{
        _repository
            .Setup(r => r.GetByIdAsync(SampleId, It.IsAny<CancellationToken>()))
            .ReturnsAsync(new {pascal} {{ {key} = SampleId }});

        var dto = await _service.GetAsync(SampleId);

        Assert.Equal(SampleId, dto.{key});
    }}

    [Fact]
    public async Task GetAsync_ThrowsWhenMissing()
    {{
        _repository
            .Setup(r => r.GetByIdAsync(SampleId, It.IsAny<CancellationToken>()))
            .ReturnsAsync(({pascal}?)null);

        await Assert.ThrowsAsync<NotFoundException>(() => _service.GetAsync(SampleId));
    }}

    [Fact]
    public async Task CreateAsync_AddsEntity()
    {{
        await _service.CreateAsync(new {pascal}Request());

        _repository.Verify(r => r.AddAsync(It.IsAny<{pascal}>(), It.IsAny<CancellationToken>()), Times.Once);
    }}

    [Fact]
    public async Task ListAsync_ClampsPaging()
    {{
        _repository
            .Setup(r => r.GetPageAsync(0, {pascal}Service.MaxPageSize, It.IsAny<CancellationToken>()))
            .ReturnsAsync((new List<{pascal}>(), 0));

        var page = await _service.ListAsync(0, 1000);

        Assert.Equal(1, page.Page);
        Assert.Equal({pascal}Service.MaxPageSize, page.PageSize);
        Assert.Empty(page.Items);
    }}

    [Fact]
    public async Task DeleteAsync_ThrowsWhenMissing()
    {{
        _repository
            .Setup(r => r.GetByIdAsync(SampleId, It.IsAny<CancellationToken>()))
            .ReturnsAsync(({pascal}?)null);

        await Assert.ThrowsAsync<NotFoundException>(() => _service.DeleteAsync(SampleId));
        _repository.Verify(r => r.DeleteAsync(It.IsAny<{pascal}>(), It.IsAny<CancellationToken>()), Times.Never);
    }}
}}
"#,
        id_ty = id_type(entity),
        id = id_literal(entity),
        key = entity.id.pascal,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_service_tests() {
        let mut ctx = GenerationContext::new();
        CSharpTestsPass.run(&blog(), &mut ctx).unwrap();

        let tests = ctx
            .get_file("tests/App.Tests/Services/PostServiceTests.cs")
            .unwrap();
        assert!(tests.contains("private static readonly long SampleId = 1L;"));
        assert!(tests.contains("Mock<IPostRepository>"));
        let tag = ctx.get_file("tests/App.Tests/Services/TagServiceTests.cs").unwrap();
        assert!(tag.contains("private static readonly int SampleId = 1;"));

        let csproj = ctx.get_file("tests/App.Tests/App.Tests.csproj").unwrap();
        assert!(csproj.contains("<PackageReference Include=\"xunit\" Version=\"2.9.0\" />"));
        assert!(csproj.contains(r#"<ProjectReference Include="..\..\src\App\App.csproj" />"#));
    }
}
