//! JWT authentication through tymon/jwt-auth.

use crudforge_schema::SqlSchema;

use crate::model::ACCOUNTS_TABLE;
use crate::pass::{GenerationContext, Pass};
use crate::php::base::migration_path;
use crate::php::{add_require, render_composer_json};
use crate::CodegenError;

/// Writes the `Account` model, its migration, the auth controller and the
/// `api` guard configuration.
pub struct PhpAuthPass;

impl Pass for PhpAuthPass {
    fn name(&self) -> &'static str {
        "php-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["php-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("app/Models/Account.php", generate_account());
        ctx.set_file(migration_path(0, ACCOUNTS_TABLE), generate_migration());
        ctx.set_file("app/Http/Requests/CredentialsRequest.php", CREDENTIALS_REQUEST_PHP);
        ctx.set_file("app/Http/Controllers/Api/AuthController.php", AUTH_CONTROLLER_PHP);
        ctx.set_file("config/auth.php", AUTH_CONFIG_PHP);
        ctx.set_metadata("has:auth", "true");

        add_require(ctx, "tymon/jwt-auth", "^2.1");
        render_composer_json(ctx);
        Ok(())
    }
}

fn generate_account() -> String {
    format!(
        r#"<?php

namespace App\Models;

use Illuminate\Foundation\Auth\User as Authenticatable;
use Tymon\JWTAuth\Contracts\JWTSubject;

class Account extends Authenticatable implements JWTSubject
{{
    public const UPDATED_AT = null;

    protected $table = '{ACCOUNTS_TABLE}';

    protected $fillable = [
        'username',
        'password_hash',
    ];

    protected $hidden = [
        'password_hash',
    ];

    public function getAuthPasswordName(): string
    {{
        return 'password_hash';
    }}

    public function getJWTIdentifier(): mixed
    {{
        return $this->getKey();
    }}

    public function getJWTCustomClaims(): array
    {{
        return ['username' => $this->username];
    }}
}}
"#
    )
}

fn generate_migration() -> String {
    format!(
        r#"<?php

use Illuminate\Database\Migrations\Migration;
use Illuminate\Database\Schema\Blueprint;
use Illuminate\Support\Facades\Schema;

return new class extends Migration
{{
    public function up(): void
    {{
        Schema::create('{ACCOUNTS_TABLE}', function (Blueprint $table) {{
            $table->id();
            $table->string('username', 100)->unique();
            $table->string('password_hash', 255);
            $table->timestamp('created_at')->useCurrent();
        }});
    }}

    public function down(): void
    {{
        Schema::dropIfExists('{ACCOUNTS_TABLE}');
    }}
}};
"#
    )
}

const CREDENTIALS_REQUEST_PHP: &str = r#"<?php

namespace App\Http\Requests;

use Illuminate\Foundation\Http\FormRequest;

class CredentialsRequest extends FormRequest
{
    public function authorize(): bool
    {
        return true;
    }

    /**
     * @return array<string, mixed>
     */
    public function rules(): array
    {
        return [
            'username' => ['required', 'string', 'min:3', 'max:100'],
            'password' => ['required', 'string', 'min:8'],
        ];
    }
}
"#;

const AUTH_CONTROLLER_PHP: &str = r#"<?php

namespace App\Http\Controllers\Api;

use App\Http\Controllers\Controller;
use App\Http\Requests\CredentialsRequest;
use App\Models\Account;
use Illuminate\Http\JsonResponse;
use Illuminate\Http\Response;
use Illuminate\Support\Facades\Hash;

class AuthController extends Controller
{
    public function register(CredentialsRequest $request): JsonResponse
    {
        $credentials = $request->validated();
        if (Account::query()->where('username', $credentials['username'])->exists()) {
            return response()->json(['message' => 'username already taken'], Response::HTTP_CONFLICT);
        }

        $account = Account::query()->create([
            'username' => $credentials['username'],
            'password_hash' => Hash::make($credentials['password']),
        ]);

        return $this->token(auth('api')->login($account), Response::HTTP_CREATED);
    }

    public function login(CredentialsRequest $request): JsonResponse
    {
        $token = auth('api')->attempt($request->validated());
        if (! $token) {
            return response()->json(['message' => 'invalid credentials'], Response::HTTP_UNAUTHORIZED);
        }

        return $this->token($token);
    }

    private function token(string $token, int $status = Response::HTTP_OK): JsonResponse
    {
        return response()->json([
            'access_token' => $token,
            'token_type' => 'Bearer',
            'expires_in' => auth('api')->factory()->getTTL() * 60,
        ], $status);
    }
}
"#;

const AUTH_CONFIG_PHP: &str = r#"<?php

return [

    'defaults' => [
        'guard' => 'api',
    ],

    'guards' => [
        'api' => [
            'driver' => 'jwt',
            'provider' => 'accounts',
        ],
    ],

    'providers' => [
        'accounts' => [
            'driver' => 'eloquent',
            'model' => App\Models\Account::class,
        ],
    ],

];
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_files() {
        let mut ctx = GenerationContext::new();
        PhpAuthPass.run(&SqlSchema::new(), &mut ctx).unwrap();

        let account = ctx.get_file("app/Models/Account.php").unwrap();
        assert!(account.contains("protected $table = 'auth_accounts';"));
        assert!(account.contains("class Account extends Authenticatable implements JWTSubject"));
        assert!(ctx.has_file("database/migrations/2024_01_01_000000_create_auth_accounts_table.php"));
        assert!(ctx
            .get_file("config/auth.php")
            .unwrap()
            .contains("'driver' => 'jwt',"));
        assert!(ctx.has_metadata("has:auth"));
        assert!(ctx
            .get_file("composer.json")
            .unwrap()
            .contains("\"tymon/jwt-auth\": \"^2.1\""));
    }
}
