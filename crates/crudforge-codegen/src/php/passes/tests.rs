//! PHPUnit feature tests against an in-memory SQLite database.

use crudforge_schema::SqlSchema;

use crate::model::{entities, Entity};
use crate::options::GeneratorOptions;
use crate::pass::{GenerationContext, Pass};
use crate::php::{add_dev_require, missing_id, render_composer_json, sample_array};
use crate::CodegenError;

/// Writes `phpunit.xml`, the base test case and one API test per entity.
pub struct PhpTestsPass;

impl Pass for PhpTestsPass {
    fn name(&self) -> &'static str {
        "php-tests"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["php-data", "php-auth", "php-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let auth = ctx.has_metadata("has:auth");
        for entity in &entities(schema) {
            ctx.set_file(
                format!("tests/Feature/{}ApiTest.php", entity.names.pascal),
                generate_api_test(entity, &ctx.options, auth),
            );
        }
        if auth {
            ctx.set_file("tests/Feature/AuthTest.php", generate_auth_test(&ctx.options));
        }
        if ctx.has_metadata("has:storage") {
            ctx.set_file("tests/Feature/FileApiTest.php", generate_file_test(&ctx.options, auth));
        }
        ctx.set_file("tests/TestCase.php", generate_test_case(auth));
        ctx.set_file("phpunit.xml", generate_phpunit_xml(auth));

        add_dev_require(ctx, "phpunit/phpunit", "^11.0");
        render_composer_json(ctx);
        Ok(())
    }
}

fn generate_test_case(auth: bool) -> String {
    let (uses, body) = if auth {
        (
            "use App\\Models\\Account;\nuse Illuminate\\Support\\Facades\\Hash;\n",
            r#"
    protected function authenticate(): Account
    {
        $account = Account::query()->create([
            'username' => 'tester',
            'password_hash' => Hash::make('password1'),
        ]);
        $this->actingAs($account, 'api');

        return $account;
    }
"#,
        )
    } else {
        ("", "")
    };
    format!(
        r#"<?php

namespace Tests;

{uses}use Illuminate\Foundation\Testing\TestCase as BaseTestCase;

abstract class TestCase extends BaseTestCase
{{{body}}}
"#
    )
}

fn generate_phpunit_xml(auth: bool) -> String {
    let jwt = if auth {
        "        <env name=\"JWT_SECRET\" value=\"testing-secret-with-enough-length-for-hs256\"/>\n"
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<phpunit xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:noNamespaceSchemaLocation="vendor/phpunit/phpunit/phpunit.xsd"
         bootstrap="vendor/autoload.php"
         colors="true">
    <testsuites>
        <testsuite name="Feature">
            <directory>tests/Feature</directory>
        </testsuite>
    </testsuites>
    <source>
        <include>
            <directory>app</directory>
        </include>
    </source>
    <php>
        <env name="APP_ENV" value="testing"/>
        <env name="APP_KEY" value="base64:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="/>
        <env name="CACHE_STORE" value="array"/>
        <env name="DB_CONNECTION" value="sqlite"/>
        <env name="DB_DATABASE" value=":memory:"/>
        <env name="SESSION_DRIVER" value="array"/>
{jwt}    </php>
</phpunit>
"#
    )
}

fn set_up(auth: bool) -> &'static str {
    if auth {
        r#"
    protected function setUp(): void
    {
        parent::setUp();
        $this->authenticate();
    }
"#
    } else {
        ""
    }
}

fn generate_api_test(entity: &Entity<'_>, options: &GeneratorOptions, auth: bool) -> String {
    let pascal = &entity.names.pascal;
    let url = options.route(&entity.names.route);
    let snake = &entity.names.snake;
    let round_trip = match sample_array(entity) {
        Some(payload) => format!(
            r#"
    public function test_created_{snake}_can_be_read_and_deleted(): void
    {{
        $id = $this->postJson('{url}', {payload})
            ->assertCreated()
            ->json('data.{key}');

        $this->getJson("{url}/{{$id}}")->assertOk()->assertJsonPath('data.{key}', $id);
        $this->deleteJson("{url}/{{$id}}")->assertNoContent();
        $this->getJson("{url}/{{$id}}")->assertNotFound();
    }}
"#,
            key = entity.id.snake,
        ),
        None => String::new(),
    };
    let invalid = if entity.writable().any(|f| f.column.is_required()) {
        format!(
            r#"
    public function test_invalid_payload_is_rejected(): void
    {{
        $this->postJson('{url}', [])->assertUnprocessable();
    }}
"#
        )
    } else {
        String::new()
    };
    format!(
        r#"<?php

namespace Tests\Feature;

use Illuminate\Foundation\Testing\RefreshDatabase;
use Tests\TestCase;

class {pascal}ApiTest extends TestCase
{{
    use RefreshDatabase;
{set_up}
    public function test_index_returns_an_empty_page(): void
    {{
        $this->getJson('{url}?page_size=500')
            ->assertOk()
            ->assertJsonPath('meta.per_page', 100)
            ->assertJsonPath('meta.total', 0);
    }}

    public function test_missing_{snake}_returns_404(): void
    {{
        $this->getJson('{url}/{missing}')->assertNotFound();
    }}
{invalid}{round_trip}}}
"#,
        set_up = set_up(auth),
        missing = missing_id(entity),
    )
}

fn generate_auth_test(options: &GeneratorOptions) -> String {
    format!(
        r#"<?php

namespace Tests\Feature;

use Illuminate\Foundation\Testing\RefreshDatabase;
use Tests\TestCase;

class AuthTest extends TestCase
{{
    use RefreshDatabase;

    public function test_register_returns_a_token(): void
    {{
        $this->postJson('{register}', ['username' => 'alice', 'password' => 'password1'])
            ->assertCreated()
            ->assertJsonPath('token_type', 'Bearer')
            ->assertJsonStructure(['access_token', 'expires_in']);
    }}

    public function test_register_rejects_a_taken_username(): void
    {{
        $credentials = ['username' => 'alice', 'password' => 'password1'];
        $this->postJson('{register}', $credentials)->assertCreated();
        $this->postJson('{register}', $credentials)->assertConflict();
    }}

    public function test_login_rejects_a_wrong_password(): void
    {{
        $this->postJson('{register}', ['username' => 'alice', 'password' => 'password1'])->assertCreated();
        $this->postJson('{login}', ['username' => 'alice', 'password' => 'password2'])->assertUnauthorized();
    }}

    public function test_login_returns_a_token(): void
    {{
        $this->postJson('{register}', ['username' => 'alice', 'password' => 'password1'])->assertCreated();
        $this->postJson('{login}', ['username' => 'alice', 'password' => 'password1'])
            ->assertOk()
            ->assertJsonStructure(['access_token']);
    }}
}}
"#,
        register = options.route("auth/register"),
        login = options.route("auth/login"),
    )
}

fn generate_file_test(options: &GeneratorOptions, auth: bool) -> String {
    let url = options.route("files");
    let unauthenticated = if auth {
        format!(
            r#"
    public function test_upload_requires_a_token(): void
    {{
        $this->app['auth']->forgetGuards();
        $this->postJson('{url}', [])->assertUnauthorized();
    }}
"#
        )
    } else {
        String::new()
    };
    format!(
        r#"<?php

namespace Tests\Feature;

use Illuminate\Foundation\Testing\RefreshDatabase;
use Illuminate\Http\UploadedFile;
use Illuminate\Support\Facades\Storage;
use Tests\TestCase;

class FileApiTest extends TestCase
{{
    use RefreshDatabase;

    protected function setUp(): void
    {{
        parent::setUp();
        Storage::fake('local');{authenticate}
    }}

    public function test_uploaded_file_can_be_downloaded(): void
    {{
        $name = $this->post('{url}', ['file' => UploadedFile::fake()->create('notes.txt', 1)])
            ->assertCreated()
            ->json('name');

        $this->assertStringEndsWith('.txt', $name);
        $this->get("{url}/{{$name}}")->assertOk();
    }}

    public function test_unknown_file_returns_404(): void
    {{
        $this->getJson('{url}/nothing.txt')->assertNotFound();
        $this->getJson('{url}/.env')->assertNotFound();
    }}
{unauthenticated}}}
"#,
        authenticate = if auth { "\n        $this->authenticate();" } else { "" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_api_tests_per_entity() {
        let mut ctx = GenerationContext::new();
        PhpTestsPass.run(&blog(), &mut ctx).unwrap();

        let tags = ctx.get_file("tests/Feature/TagApiTest.php").unwrap();
        assert!(tags.contains("class TagApiTest extends TestCase"));
        assert!(tags.contains("$this->getJson('/api/tags/999')->assertNotFound();"));
        assert!(tags.contains("$id = $this->postJson('/api/tags', ['name' => 'example'])"));
        assert!(tags.contains("$this->deleteJson(\"/api/tags/{$id}\")->assertNoContent();"));
        assert!(!tags.contains("authenticate"));

        let posts = ctx.get_file("tests/Feature/PostApiTest.php").unwrap();
        assert!(!posts.contains("test_created_post"));

        assert!(!ctx.has_file("tests/Feature/AuthTest.php"));
        assert!(ctx.get_file("phpunit.xml").unwrap().contains("<env name=\"DB_DATABASE\" value=\":memory:\"/>"));
        assert!(ctx.get_file("composer.json").unwrap().contains("\"test\": \"phpunit\""));
    }

    #[test]
    fn test_feature_flags_add_tests() {
        let mut ctx = GenerationContext::new();
        ctx.set_metadata("has:auth", "true");
        ctx.set_metadata("has:storage", "true");
        PhpTestsPass.run(&blog(), &mut ctx).unwrap();

        let tags = ctx.get_file("tests/Feature/TagApiTest.php").unwrap();
        assert!(tags.contains("        $this->authenticate();\n"));
        assert!(ctx.get_file("tests/TestCase.php").unwrap().contains("$this->actingAs($account, 'api');"));
        assert!(ctx.get_file("tests/Feature/AuthTest.php").unwrap().contains("->assertConflict();"));
        assert!(ctx.get_file("tests/Feature/FileApiTest.php").unwrap().contains("Storage::fake('local');\n        $this->authenticate();"));
        assert!(ctx.get_file("phpunit.xml").unwrap().contains("JWT_SECRET"));
    }
}
