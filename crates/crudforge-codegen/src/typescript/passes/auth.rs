//! JWT authentication with Passport and bcrypt.

use crudforge_schema::SqlSchema;

use crate::model::ACCOUNTS_TABLE;
use crate::pass::{GenerationContext, Pass};
use crate::typescript::{add_dependency, add_dev_dependency, render_package_json};
use crate::CodegenError;

/// Writes `src/auth`: the account entity, register/login endpoints, the JWT
/// strategy and the guard the controllers use.
pub struct TypeScriptAuthPass;

impl Pass for TypeScriptAuthPass {
    fn name(&self) -> &'static str {
        "typescript-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["typescript-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        ctx.set_file("src/auth/account.entity.ts", generate_account());
        ctx.set_file("src/auth/credentials.dto.ts", CREDENTIALS_DTO_TS);
        ctx.set_file("src/auth/auth.service.ts", AUTH_SERVICE_TS);
        ctx.set_file("src/auth/auth.controller.ts", AUTH_CONTROLLER_TS);
        ctx.set_file("src/auth/jwt.strategy.ts", JWT_STRATEGY_TS);
        ctx.set_file("src/auth/jwt-auth.guard.ts", JWT_GUARD_TS);
        ctx.set_file("src/auth/auth.module.ts", AUTH_MODULE_TS);
        ctx.set_metadata("has:auth", "true");

        add_dependency(ctx, "@nestjs/jwt", "^10.2.0");
        add_dependency(ctx, "@nestjs/passport", "^10.0.3");
        add_dependency(ctx, "bcrypt", "^5.1.1");
        add_dependency(ctx, "passport", "^0.7.0");
        add_dependency(ctx, "passport-jwt", "^4.0.1");
        add_dev_dependency(ctx, "@types/bcrypt", "^5.0.2");
        add_dev_dependency(ctx, "@types/passport-jwt", "^4.0.1");
        render_package_json(ctx);
        Ok(())
    }
}

fn generate_account() -> String {
    format!(
        r#"import {{ Column, CreateDateColumn, Entity, PrimaryGeneratedColumn }} from 'typeorm';

@Entity({{ name: '{ACCOUNTS_TABLE}' }})
export class Account {{
  @PrimaryGeneratedColumn({{ name: 'id', type: 'bigint' }})
  id: number;

  @Column({{ name: 'username', type: 'varchar', length: 100, unique: true }})
  username: string;

  @Column({{ name: 'password_hash', type: 'varchar', length: 255 }})
  passwordHash: string;

  @CreateDateColumn({{ name: 'created_at' }})
  createdAt: Date;
}}
"#
    )
}

const CREDENTIALS_DTO_TS: &str = r#"import { IsString, Length, MinLength } from 'class-validator';

export class CredentialsDto {
  @IsString()
  @Length(3, 100)
  username: string;

  @IsString()
  @MinLength(8)
  password: string;
}

export interface TokenResponse {
  accessToken: string;
  tokenType: string;
}
"#;

const AUTH_SERVICE_TS: &str = r#"import { ConflictException, Injectable, UnauthorizedException } from '@nestjs/common';
import { JwtService } from '@nestjs/jwt';
import { InjectRepository } from '@nestjs/typeorm';
import * as bcrypt from 'bcrypt';
import { Repository } from 'typeorm';
import { Account } from './account.entity';
import { CredentialsDto, TokenResponse } from './credentials.dto';

const BCRYPT_ROUNDS = 10;

@Injectable()
export class AuthService {
  constructor(
    @InjectRepository(Account) private readonly accounts: Repository<Account>,
    private readonly jwt: JwtService,
  ) {}

  async register(credentials: CredentialsDto): Promise<TokenResponse> {
    if (await this.accounts.existsBy({ username: credentials.username })) {
      throw new ConflictException('username already taken');
    }
    const passwordHash = await bcrypt.hash(credentials.password, BCRYPT_ROUNDS);
    const account = await this.accounts.save(
      this.accounts.create({ username: credentials.username, passwordHash }),
    );
    return this.issue(account);
  }

  async login(credentials: CredentialsDto): Promise<TokenResponse> {
    const account = await this.accounts.findOneBy({ username: credentials.username });
    if (!account || !(await bcrypt.compare(credentials.password, account.passwordHash))) {
      throw new UnauthorizedException('invalid credentials');
    }
    return this.issue(account);
  }

  private async issue(account: Account): Promise<TokenResponse> {
    const accessToken = await this.jwt.signAsync({ sub: account.username });
    return { accessToken, tokenType: 'Bearer' };
  }
}
"#;

const AUTH_CONTROLLER_TS: &str = r#"import { Body, Controller, HttpCode, HttpStatus, Post } from '@nestjs/common';
import { AuthService } from './auth.service';
import { CredentialsDto, TokenResponse } from './credentials.dto';

@Controller('auth')
export class AuthController {
  constructor(private readonly auth: AuthService) {}

  @Post('register')
  register(@Body() credentials: CredentialsDto): Promise<TokenResponse> {
    return this.auth.register(credentials);
  }

  @Post('login')
  @HttpCode(HttpStatus.OK)
  login(@Body() credentials: CredentialsDto): Promise<TokenResponse> {
    return this.auth.login(credentials);
  }
}
"#;

const JWT_STRATEGY_TS: &str = r#"import { Injectable } from '@nestjs/common';
import { ConfigService } from '@nestjs/config';
import { PassportStrategy } from '@nestjs/passport';
import { ExtractJwt, Strategy } from 'passport-jwt';

@Injectable()
export class JwtStrategy extends PassportStrategy(Strategy) {
  constructor(config: ConfigService) {
    super({
      jwtFromRequest: ExtractJwt.fromAuthHeaderAsBearerToken(),
      ignoreExpiration: false,
      secretOrKey: config.getOrThrow<string>('JWT_SECRET'),
    });
  }

  validate(payload: { sub: string }): { username: string } {
    return { username: payload.sub };
  }
}
"#;

const JWT_GUARD_TS: &str = r#"import { Injectable } from '@nestjs/common';
import { AuthGuard } from '@nestjs/passport';

@Injectable()
export class JwtAuthGuard extends AuthGuard('jwt') {}
"#;

const AUTH_MODULE_TS: &str = r#"import { Module } from '@nestjs/common';
import { ConfigService } from '@nestjs/config';
import { JwtModule } from '@nestjs/jwt';
import { PassportModule } from '@nestjs/passport';
import { TypeOrmModule } from '@nestjs/typeorm';
import { Account } from './account.entity';
import { AuthController } from './auth.controller';
import { AuthService } from './auth.service';
import { JwtStrategy } from './jwt.strategy';

@Module({
  imports: [
    TypeOrmModule.forFeature([Account]),
    PassportModule,
    JwtModule.registerAsync({
      inject: [ConfigService],
      useFactory: (config: ConfigService) => ({
        secret: config.getOrThrow<string>('JWT_SECRET'),
        signOptions: { expiresIn: '24h' },
      }),
    }),
  ],
  controllers: [AuthController],
  providers: [AuthService, JwtStrategy],
})
export class AuthModule {}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_module() {
        let mut ctx = GenerationContext::new();
        TypeScriptAuthPass.run(&SqlSchema::new(), &mut ctx).unwrap();

        let account = ctx.get_file("src/auth/account.entity.ts").unwrap();
        assert!(account.contains("@Entity({ name: 'auth_accounts' })"));
        assert!(ctx.has_file("src/auth/jwt-auth.guard.ts"));
        assert!(ctx.has_metadata("has:auth"));

        let package = ctx.get_file("package.json").unwrap();
        assert!(package.contains("\"passport-jwt\": \"^4.0.1\""));
        assert!(package.contains("\"@types/bcrypt\": \"^5.0.2\""));
    }
}
