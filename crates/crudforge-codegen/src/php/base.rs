//! PHP base pass - Eloquent models, form requests, API resources and
//! migrations.

use crudforge_schema::{RelationshipKind, SqlColumn, SqlSchema, SqlTable, SqlType};

use crate::model::{entities, Entity, Field, Relation};
use crate::pass::{GenerationContext, Pass};
use crate::php::{add_require, quote, render_composer_json};
use crate::CodegenError;

/// PHP base pass that generates `app/Models`, `app/Http/Requests`,
/// `app/Http/Resources`, `database/migrations` and the project skeleton.
pub struct PhpBasePass;

impl Pass for PhpBasePass {
    fn name(&self) -> &'static str {
        "php-base"
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        for entity in &entities(schema) {
            let pascal = &entity.names.pascal;
            ctx.set_file(format!("app/Models/{pascal}.php"), generate_model(entity));
            ctx.set_file(
                format!("app/Http/Requests/Store{pascal}Request.php"),
                generate_request(entity, false),
            );
            ctx.set_file(
                format!("app/Http/Requests/Update{pascal}Request.php"),
                generate_request(entity, true),
            );
            ctx.set_file(
                format!("app/Http/Resources/{pascal}Resource.php"),
                generate_resource(entity),
            );
        }

        for (index, table) in schema.tables.iter().enumerate() {
            ctx.set_file(migration_path(index + 1, &table.name), generate_migration(table));
        }

        ctx.set_file("app/Support/Paging.php", PAGING_PHP);
        ctx.set_file(".gitignore", GITIGNORE);
        for dir in WRITABLE_DIRS {
            ctx.set_file(format!("{dir}/.gitignore"), "*\n!.gitignore\n");
        }

        add_require(ctx, "laravel/framework", "^11.0");
        render_composer_json(ctx);
        Ok(())
    }
}

const WRITABLE_DIRS: &[&str] = &[
    "bootstrap/cache",
    "storage/app",
    "storage/framework/cache",
    "storage/framework/sessions",
    "storage/framework/views",
    "storage/logs",
];

const GITIGNORE: &str = "/vendor\n/node_modules\n.env\n.phpunit.result.cache\n";

const PAGING_PHP: &str = r#"<?php

namespace App\Support;

final class Paging
{
    public const DEFAULT_SIZE = 20;

    public const MAX_SIZE = 100;

    /**
     * Clamps a requested page to at least 1 and a page size to 1..MAX_SIZE.
     *
     * @return array{int, int}
     */
    public static function clamp(int $page, int $size): array
    {
        return [max($page, 1), min(max($size, 1), self::MAX_SIZE)];
    }
}
"#;

/// `database/migrations/2024_01_01_00000N_create_<table>_table.php`
pub(crate) fn migration_path(index: usize, table: &str) -> String {
    format!("database/migrations/2024_01_01_{index:06}_create_{table}_table.php")
}

fn cast(column: &SqlColumn) -> Option<String> {
    let cast = match &column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "integer".to_string(),
        SqlType::Real | SqlType::Double => "float".to_string(),
        SqlType::Decimal { scale, .. } => format!("decimal:{}", scale.unwrap_or(2)),
        SqlType::Boolean => "boolean".to_string(),
        SqlType::Json => "array".to_string(),
        SqlType::Date => "date:Y-m-d".to_string(),
        SqlType::Timestamp | SqlType::TimestampTz => "datetime".to_string(),
        _ => return None,
    };
    Some(cast)
}

fn relation_method(rel: &Relation) -> Option<(String, &'static str)> {
    let target = &rel.target.pascal;
    let (call, ty) = match rel.kind {
        RelationshipKind::ManyToOne | RelationshipKind::OneToOne if rel.owner => (
            format!(
                "$this->belongsTo({target}::class, {}, {})",
                quote(&rel.column),
                quote(&rel.target_column)
            ),
            "BelongsTo",
        ),
        RelationshipKind::OneToOne => (
            format!(
                "$this->hasOne({target}::class, {}, {})",
                quote(&rel.column),
                quote(&rel.target_column)
            ),
            "HasOne",
        ),
        RelationshipKind::OneToMany => (
            format!(
                "$this->hasMany({target}::class, {}, {})",
                quote(&rel.column),
                quote(&rel.target_column)
            ),
            "HasMany",
        ),
        RelationshipKind::ManyToMany => (
            format!(
                "$this->belongsToMany({target}::class, {}, {}, {})",
                quote(rel.join_table.as_deref()?),
                quote(&rel.column),
                quote(rel.inverse_column.as_deref()?)
            ),
            "BelongsToMany",
        ),
        RelationshipKind::ManyToOne => return None,
    };
    let method = format!(
        "    public function {}(): {ty}\n    {{\n        return {call};\n    }}\n",
        rel.camel
    );
    Some((method, ty))
}

fn has_column(entity: &Entity<'_>, name: &str) -> bool {
    entity.fields.iter().any(|f| f.name().eq_ignore_ascii_case(name))
}

fn generate_model(entity: &Entity<'_>) -> String {
    let id = entity.id.column;
    let mut uses = vec!["Illuminate\\Database\\Eloquent\\Model".to_string()];
    let mut body = Vec::new();
    let mut traits = String::new();

    match &id.sql_type {
        SqlType::Uuid => {
            uses.push("Illuminate\\Database\\Eloquent\\Concerns\\HasUuids".to_string());
            traits.push_str("    use HasUuids;\n\n");
        }
        _ if !id.is_generated() => {
            let mut props = "    public $incrementing = false;\n".to_string();
            if !id.sql_type.is_integer() {
                props.push_str("\n    protected $keyType = 'string';\n");
            }
            body.push(props);
        }
        _ => {}
    }

    let mut header = format!("    protected $table = {};\n", quote(&entity.names.table));
    if id.name != "id" {
        header.push_str(&format!("\n    protected $primaryKey = {};\n", quote(&id.name)));
    }
    body.insert(0, header);

    if !(has_column(entity, "created_at") && has_column(entity, "updated_at")) {
        body.push("    public $timestamps = false;\n".to_string());
    }

    let fillable: String = entity
        .writable()
        .filter(|f| !f.column.primary_key)
        .map(|f| format!("        {},\n", quote(f.name())))
        .collect();
    body.push(format!("    protected $fillable = [\n{fillable}    ];\n"));

    let casts: String = entity
        .non_id()
        .filter_map(|f| Some(format!("            {} => {},\n", quote(f.name()), quote(&cast(f.column)?))))
        .collect();
    if !casts.is_empty() {
        body.push(format!(
            "    protected function casts(): array\n    {{\n        return [\n{casts}        ];\n    }}\n"
        ));
    }

    for rel in &entity.relations {
        if let Some((method, ty)) = relation_method(rel) {
            uses.push(format!("Illuminate\\Database\\Eloquent\\Relations\\{ty}"));
            body.push(method);
        }
    }

    uses.sort();
    uses.dedup();
    let uses: String = uses.iter().map(|u| format!("use {u};\n")).collect();

    format!(
        "<?php\n\nnamespace App\\Models;\n\n{uses}\nclass {} extends Model\n{{\n{traits}{}}}\n",
        entity.names.pascal,
        body.join("\n")
    )
}

fn type_rules(field: &Field<'_>, rules: &mut Vec<String>) {
    match &field.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => rules.push(quote("integer")),
        SqlType::Decimal { .. } | SqlType::Real | SqlType::Double => rules.push(quote("numeric")),
        SqlType::Boolean => rules.push(quote("boolean")),
        SqlType::Date => rules.push(quote("date_format:Y-m-d")),
        SqlType::Time => rules.push(quote("date_format:H:i:s")),
        SqlType::Timestamp | SqlType::TimestampTz => rules.push(quote("date")),
        SqlType::Uuid => rules.push(quote("uuid")),
        SqlType::Json => rules.push(quote("array")),
        SqlType::Enum(values) => rules.push(quote(&format!("in:{}", values.join(",")))),
        _ => {
            rules.push(quote("string"));
            if let Some(max) = field.column.sql_type.max_length() {
                rules.push(quote(&format!("max:{max}")));
            }
        }
    }
}

fn rules_for(entity: &Entity<'_>, field: &Field<'_>, update: bool) -> String {
    let column = field.column;
    let mut rules = Vec::new();
    if update {
        rules.push(quote("sometimes"));
    }
    if column.is_required() || (update && !column.nullable) {
        rules.push(quote("required"));
    } else if column.nullable {
        rules.push(quote("nullable"));
    } else {
        rules.push(quote("sometimes"));
    }
    type_rules(field, &mut rules);

    if let Some(fk) = entity.table.foreign_key_for(field.name()) {
        let target = fk
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(field.name()))
            .and_then(|i| fk.ref_columns.get(i));
        if let Some(target) = target {
            rules.push(quote(&format!("exists:{},{target}", fk.ref_table)));
        }
    }
    if entity.table.is_unique_column(field.name()) {
        if update {
            rules.push(format!(
                "Rule::unique({}, {})->ignore($this->route('id'), {})",
                quote(&entity.names.table),
                quote(field.name()),
                quote(entity.id.name())
            ));
        } else {
            rules.push(quote(&format!("unique:{},{}", entity.names.table, field.name())));
        }
    }
    format!("            {} => [{}],\n", quote(field.name()), rules.join(", "))
}

fn generate_request(entity: &Entity<'_>, update: bool) -> String {
    let rules: String = entity
        .writable()
        .map(|field| rules_for(entity, field, update))
        .collect();
    let prefix = if update { "Update" } else { "Store" };
    let rule_use = if update && rules.contains("Rule::unique") {
        "use Illuminate\\Validation\\Rule;\n"
    } else {
        ""
    };
    format!(
        r#"<?php

namespace App\Http\Requests;

use Illuminate\Foundation\Http\FormRequest;
{rule_use}
class {prefix}{pascal}Request extends FormRequest
{{
    public function authorize(): bool
    {{
        return true;
    }}

    /**
     * @return array<string, mixed>
     */
    public function rules(): array
    {{
        return [
{rules}        ];
    }}
}}
"#,
        pascal = entity.names.pascal,
    )
}

fn generate_resource(entity: &Entity<'_>) -> String {
    let fields: String = entity
        .fields
        .iter()
        .map(|f| {
            let value = if f.column.sql_type == SqlType::Binary {
                format!("$this->{name} === null ? null : base64_encode($this->{name})", name = f.name())
            } else {
                format!("$this->{}", f.name())
            };
            format!("            {} => {value},\n", quote(&f.snake))
        })
        .collect();
    format!(
        r#"<?php

namespace App\Http\Resources;

use Illuminate\Http\Request;
use Illuminate\Http\Resources\Json\JsonResource;

/**
 * @mixin \App\Models\{pascal}
 */
class {pascal}Resource extends JsonResource
{{
    /**
     * @return array<string, mixed>
     */
    public function toArray(Request $request): array
    {{
        return [
{fields}        ];
    }}
}}
"#,
        pascal = entity.names.pascal,
    )
}

fn literal_default(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        return Some(raw.to_ascii_lowercase());
    }
    if raw.parse::<f64>().is_ok() {
        return Some(raw.to_string());
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Some(quote(&raw[1..raw.len() - 1].replace("''", "'")));
    }
    None
}

fn blueprint_call(table: &SqlTable, column: &SqlColumn) -> String {
    let name = quote(&column.name);
    let sole_pk = column.primary_key && table.primary_key.len() == 1;
    if sole_pk && column.auto_increment {
        return match column.sql_type {
            SqlType::SmallInt => format!("$table->smallIncrements({name})"),
            SqlType::Integer => format!("$table->increments({name})"),
            _ if column.name == "id" => "$table->id()".to_string(),
            _ => format!("$table->bigIncrements({name})"),
        };
    }

    let mut call = match &column.sql_type {
        SqlType::SmallInt => format!("$table->smallInteger({name})"),
        SqlType::Integer => format!("$table->integer({name})"),
        SqlType::BigInt => format!("$table->bigInteger({name})"),
        SqlType::Decimal { precision, scale } => format!(
            "$table->decimal({name}, {}, {})",
            precision.unwrap_or(8),
            scale.unwrap_or(2)
        ),
        SqlType::Real => format!("$table->float({name})"),
        SqlType::Double => format!("$table->double({name})"),
        SqlType::Boolean => format!("$table->boolean({name})"),
        SqlType::Char(Some(n)) => format!("$table->char({name}, {n})"),
        SqlType::Char(None) => format!("$table->char({name})"),
        SqlType::Varchar(Some(n)) => format!("$table->string({name}, {n})"),
        SqlType::Varchar(None) => format!("$table->string({name})"),
        SqlType::Date => format!("$table->date({name})"),
        SqlType::Time => format!("$table->time({name})"),
        SqlType::Timestamp => format!("$table->timestamp({name})"),
        SqlType::TimestampTz => format!("$table->timestampTz({name})"),
        SqlType::Uuid => format!("$table->uuid({name})"),
        SqlType::Json => format!("$table->json({name})"),
        SqlType::Binary => format!("$table->binary({name})"),
        SqlType::Enum(values) => format!(
            "$table->enum({name}, [{}])",
            values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
        ),
        SqlType::Text | SqlType::Other(_) => format!("$table->text({name})"),
    };

    if sole_pk {
        call.push_str("->primary()");
    }
    if column.nullable && !column.primary_key {
        call.push_str("->nullable()");
    }
    if column.unique && !column.primary_key {
        call.push_str("->unique()");
    }
    if let Some(default) = column.default.as_deref() {
        if default.trim().eq_ignore_ascii_case("current_timestamp")
            || default.trim().eq_ignore_ascii_case("now()")
        {
            call.push_str("->useCurrent()");
        } else if let Some(value) = literal_default(default) {
            call.push_str(&format!("->default({value})"));
        }
    }
    call
}

fn column_list(columns: &[String]) -> String {
    match columns {
        [single] => quote(single),
        many => format!(
            "[{}]",
            many.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn generate_migration(table: &SqlTable) -> String {
    let mut lines = Vec::new();
    for column in &table.columns {
        lines.push(format!("            {};\n", blueprint_call(table, column)));
    }
    if table.primary_key.len() > 1 {
        lines.push(format!(
            "            $table->primary({});\n",
            column_list(&table.primary_key)
        ));
    }
    for unique in table.unique_constraints.iter().filter(|u| u.len() > 1) {
        lines.push(format!("            $table->unique({});\n", column_list(unique)));
    }
    for fk in &table.foreign_keys {
        let mut line = format!(
            "            $table->foreign({})->references({})->on({})",
            column_list(&fk.columns),
            column_list(&fk.ref_columns),
            quote(&fk.ref_table)
        );
        if let Some(action) = fk.on_delete {
            line.push_str(&format!("->onDelete({})", quote(&action.as_str().to_ascii_lowercase())));
        }
        if let Some(action) = fk.on_update {
            line.push_str(&format!("->onUpdate({})", quote(&action.as_str().to_ascii_lowercase())));
        }
        line.push_str(";\n");
        lines.push(line);
    }

    format!(
        r#"<?php

use Illuminate\Database\Migrations\Migration;
use Illuminate\Database\Schema\Blueprint;
use Illuminate\Support\Facades\Schema;

return new class extends Migration
{{
    public function up(): void
    {{
        Schema::create({name}, function (Blueprint $table) {{
{lines}        }});
    }}

    public function down(): void
    {{
        Schema::dropIfExists({name});
    }}
}};
"#,
        name = quote(&table.name),
        lines = lines.concat(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    fn run() -> GenerationContext {
        let mut ctx = GenerationContext::new();
        PhpBasePass.run(&blog(), &mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_model_relations() {
        let ctx = run();
        let post = ctx.get_file("app/Models/Post.php").unwrap();
        assert!(post.contains("use Illuminate\\Database\\Eloquent\\Relations\\BelongsTo;"));
        assert!(post.contains("return $this->belongsTo(User::class, 'author_id', 'id');"));
        assert!(post.contains("return $this->belongsToMany(Tag::class, 'post_tags', 'post_id', 'tag_id');"));
        assert!(post.contains("    public $timestamps = false;\n"));
        assert!(post.contains("            'published' => 'boolean',\n"));
        assert!(post.contains("        'title',\n"));
        assert!(!post.contains("        'created_at',\n"));

        let user = ctx.get_file("app/Models/User.php").unwrap();
        assert!(user.contains("public function posts(): HasMany"));
        assert!(user.contains("return $this->hasMany(Post::class, 'author_id', 'id');"));
    }

    #[test]
    fn test_form_requests() {
        let ctx = run();
        let store = ctx.get_file("app/Http/Requests/StoreUserRequest.php").unwrap();
        assert!(store.contains(
            "'email' => ['required', 'string', 'max:255', 'unique:users,email'],"
        ));
        assert!(store.contains("'display_name' => ['nullable', 'string', 'max:100'],"));

        let update = ctx.get_file("app/Http/Requests/UpdateUserRequest.php").unwrap();
        assert!(update.contains("use Illuminate\\Validation\\Rule;"));
        assert!(update.contains(
            "'email' => ['sometimes', 'required', 'string', 'max:255', Rule::unique('users', 'email')->ignore($this->route('id'), 'id')],"
        ));

        let comment = ctx.get_file("app/Http/Requests/StoreCommentRequest.php").unwrap();
        assert!(comment.contains("'post_id' => ['required', 'integer', 'exists:posts,id'],"));
        assert!(comment.contains("'rating' => ['nullable', 'numeric'],"));
    }

    #[test]
    fn test_migrations_cover_every_table() {
        let ctx = run();
        let users = ctx
            .get_file("database/migrations/2024_01_01_000001_create_users_table.php")
            .unwrap();
        assert!(users.contains("            $table->id();\n"));
        assert!(users.contains("$table->string('email', 255)->unique();"));
        assert!(users.contains("$table->timestamp('created_at')->useCurrent();"));

        let posts = ctx
            .get_file("database/migrations/2024_01_01_000002_create_posts_table.php")
            .unwrap();
        assert!(posts.contains("$table->boolean('published')->default(false);"));
        assert!(posts.contains(
            "$table->foreign('author_id')->references('id')->on('users')->onDelete('cascade');"
        ));

        let tags = ctx
            .get_file("database/migrations/2024_01_01_000003_create_tags_table.php")
            .unwrap();
        assert!(tags.contains("$table->increments('id');"));

        let post_tags = ctx
            .get_file("database/migrations/2024_01_01_000004_create_post_tags_table.php")
            .unwrap();
        assert!(post_tags.contains("$table->primary(['post_id', 'tag_id']);"));
        assert!(ctx.has_file("database/migrations/2024_01_01_000006_create_audit_log_table.php"));
    }

    #[test]
    fn test_resource_and_skeleton() {
        let ctx = run();
        let resource = ctx.get_file("app/Http/Resources/CommentResource.php").unwrap();
        assert!(resource.contains("            'post_id' => $this->post_id,\n"));
        assert!(ctx.has_file("storage/framework/views/.gitignore"));
        assert!(ctx
            .get_file("composer.json")
            .unwrap()
            .contains("\"laravel/framework\": \"^11.0\""));
    }
}
