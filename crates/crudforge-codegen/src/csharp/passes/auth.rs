//! JWT bearer authentication with BCrypt-hashed accounts.

use crudforge_schema::SqlSchema;

use crate::csharp::{add_package, namespace, render_csproj, render_db_context, src_path};
use crate::model::{entities, ACCOUNTS_TABLE};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Adds the `Auth/` folder, the account model and `/auth` endpoints.
pub struct CSharpAuthPass;

impl Pass for CSharpAuthPass {
    fn name(&self) -> &'static str {
        "csharp-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["csharp-data"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let namespace = namespace(&ctx.options);
        let auth_route = ctx.options.route("auth");
        let auth_route = auth_route.trim_start_matches('/');

        let files = [
            ("Models/Account.cs", generate_account(&namespace)),
            ("Auth/AuthDtos.cs", generate_dtos(&namespace)),
            ("Auth/TokenService.cs", generate_token_service(&namespace)),
            ("Controllers/AuthController.cs", generate_controller(&namespace, auth_route)),
        ];
        for (rel, code) in files {
            let path = src_path(&ctx.options, rel);
            ctx.set_file(path, code);
        }

        ctx.set_metadata("has:auth", "true");
        add_package(ctx, "Microsoft.AspNetCore.Authentication.JwtBearer", "8.0.8");
        add_package(ctx, "BCrypt.Net-Next", "4.0.3");
        render_csproj(ctx);
        render_db_context(&entities(schema), ctx);
        Ok(())
    }
}

fn generate_account(namespace: &str) -> String {
    format!(
        r#"using System.ComponentModel.DataAnnotations;
using System.ComponentModel.DataAnnotations.Schema;
using Microsoft.EntityFrameworkCore;

namespace {namespace}.Models;

[Index(nameof(Username), IsUnique = true)]
[Table("{ACCOUNTS_TABLE}")]
public class Account
{{
    [Key]
    [DatabaseGenerated(DatabaseGeneratedOption.Identity)]
    [Column("id")]
    public long Id {{ get; set; }}

    [Column("username")]
    [Required]
    [MaxLength(100)]
    public string Username {{ get; set; }} = string.Empty;

    [Column("password_hash")]
    [Required]
    [MaxLength(255)]
    public string PasswordHash {{ get; set; }} = string.Empty;

    [Column("created_at")]
    public DateTime CreatedAt {{ get; set; }} = DateTime.UtcNow;
}}
"#
    )
}

fn generate_dtos(namespace: &str) -> String {
    format!(
        r#"using System.ComponentModel.DataAnnotations;

namespace {namespace}.Auth;

public class AuthRequest
{{
    [Required]
    [MinLength(3)]
    [MaxLength(100)]
    public string Username {{ get; set; }} = string.Empty;

    [Required]
    [MinLength(8)]
    public string Password {{ get; set; }} = string.Empty;
}}

public record TokenResponse(string AccessToken, string TokenType)
{{
    public static TokenResponse Bearer(string token) => new(token, "Bearer");
}}
"#
    )
}

fn generate_token_service(namespace: &str) -> String {
    format!(
        r#"using System.IdentityModel.Tokens.Jwt;
using System.Security.Claims;
using System.Text;
using Microsoft.IdentityModel.Tokens;

namespace {namespace}.Auth;

public class TokenService
{{
    private readonly SymmetricSecurityKey _key;
    private readonly string _issuer;
    private readonly TimeSpan _lifetime;

    public TokenService(IConfiguration configuration)
    {{
        _key = SigningKey(configuration);
        _issuer = configuration["Jwt:Issuer"] ?? "{namespace}";
        _lifetime = TimeSpan.FromMinutes(configuration.GetValue("Jwt:ExpirationMinutes", 60));
    }}

    public string Issue(string username)
    {{
        var token = new JwtSecurityToken(
            issuer: _issuer,
            audience: _issuer,
            claims: new[] {{ new Claim(JwtRegisteredClaimNames.Sub, username) }},
            expires: DateTime.UtcNow.Add(_lifetime),
            signingCredentials: new SigningCredentials(_key, SecurityAlgorithms.HmacSha256));
        return new JwtSecurityTokenHandler().WriteToken(token);
    }}

    public static TokenValidationParameters ValidationParameters(IConfiguration configuration)
    {{
        var issuer = configuration["Jwt:Issuer"] ?? "{namespace}";
        return new TokenValidationParameters
        {{
            ValidateIssuer = true,
            ValidIssuer = issuer,
            ValidateAudience = true,
            ValidAudience = issuer,
            ValidateLifetime = true,
            IssuerSigningKey = SigningKey(configuration),
        }};
    }}

    private static SymmetricSecurityKey SigningKey(IConfiguration configuration)
    {{
        var secret = configuration["Jwt:Secret"]
            ?? throw new InvalidOperationException("Jwt:Secret is not configured");
        return new SymmetricSecurityKey(Encoding.UTF8.GetBytes(secret));
    }}
}}
"#
    )
}

fn generate_controller(namespace: &str, auth_route: &str) -> String {
    format!(
        r#"using {namespace}.Auth;
using {namespace}.Data;
using {namespace}.Models;
using Microsoft.AspNetCore.Mvc;
using Microsoft.EntityFrameworkCore;

namespace {namespace}.Controllers;

[ApiController]
[Route("{auth_route}")]
public class AuthController : ControllerBase
{{
    private readonly AppDbContext _db;
    private readonly TokenService _tokens;

    public AuthController(AppDbContext db, TokenService tokens)
    {{
        _db = db;
        _tokens = tokens;
    }}

    [HttpPost("register")]
    public async Task<ActionResult<TokenResponse>> Register(AuthRequest request, CancellationToken ct)
    {{
        if (await _db.Accounts.AnyAsync(a => a.Username == request.Username, ct))
        {{
            return Conflict(new ProblemDetails {{ Title = "username already taken" }});
        }}

        var account = new Account
        {{
            Username = request.Username,
            PasswordHash = BCrypt.Net.BCrypt.HashPassword(request.Password),
        }};
        _db.Accounts.Add(account);
        await _db.SaveChangesAsync(ct);
        return StatusCode(StatusCodes.Status201Created, TokenResponse.Bearer(_tokens.Issue(account.Username)));
    }}

    [HttpPost("login")]
    public async Task<ActionResult<TokenResponse>> Login(AuthRequest request, CancellationToken ct)
    {{
        var account = await _db.Accounts.FirstOrDefaultAsync(a => a.Username == request.Username, ct);
        if (account is null || !BCrypt.Net.BCrypt.Verify(request.Password, account.PasswordHash))
        {{
            return Unauthorized();
        }}
        return TokenResponse.Bearer(_tokens.Issue(account.Username));
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csharp::CSharpBasePass;
    use crate::model::test_support::blog;

    #[test]
    fn test_auth_files() {
        let schema = blog();
        let mut ctx = GenerationContext::new();
        CSharpBasePass.run(&schema, &mut ctx).unwrap();
        CSharpAuthPass.run(&schema, &mut ctx).unwrap();

        let controller = ctx.get_file("src/App/Controllers/AuthController.cs").unwrap();
        assert!(controller.contains("[Route(\"api/auth\")]"));
        assert!(controller.contains("BCrypt.Net.BCrypt.Verify"));
        let account = ctx.get_file("src/App/Models/Account.cs").unwrap();
        assert!(account.contains("[Table(\"auth_accounts\")]"));

        let db = ctx.get_file("src/App/Data/AppDbContext.cs").unwrap();
        assert!(db.contains("public DbSet<Account> Accounts => Set<Account>();"));
        let csproj = ctx.get_file("src/App/App.csproj").unwrap();
        assert!(csproj.contains("Microsoft.AspNetCore.Authentication.JwtBearer"));
        assert!(csproj.contains("Npgsql.EntityFrameworkCore.PostgreSQL"));
    }
}
