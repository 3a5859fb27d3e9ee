//! Spring Security with stateless JWT authentication.

use crudforge_schema::SqlSchema;

use crate::java::{add_maven_dep, render_pom, source_path};
use crate::model::ACCOUNTS_TABLE;
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

const JJWT_VERSION: &str = "0.12.6";

/// Adds the `security/` package, the account entity and `/auth` endpoints.
pub struct JavaAuthPass;

impl Pass for JavaAuthPass {
    fn name(&self) -> &'static str {
        "java-auth"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["java-data"]
    }

    fn run(&self, _schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let package = ctx.options.package.clone();
        let auth_route = ctx.options.route("auth");

        let files = [
            ("entity", "Account", generate_account(&package)),
            ("repository", "AccountRepository", generate_account_repository(&package)),
            ("dto", "AuthRequest", generate_auth_request(&package)),
            ("dto", "TokenResponse", generate_token_response(&package)),
            ("security", "JwtService", generate_jwt_service(&package)),
            ("security", "JwtAuthenticationFilter", generate_filter(&package)),
            ("security", "SecurityConfig", generate_security_config(&package, &auth_route)),
            ("controller", "AuthController", generate_auth_controller(&package, &auth_route)),
        ];
        for (sub, class, code) in files {
            let path = source_path(&ctx.options, sub, class);
            ctx.set_file(path, code);
        }

        add_maven_dep(ctx, "org.springframework.boot:spring-boot-starter-security", "", "");
        add_maven_dep(ctx, "io.jsonwebtoken:jjwt-api", JJWT_VERSION, "");
        add_maven_dep(ctx, "io.jsonwebtoken:jjwt-impl", JJWT_VERSION, "runtime");
        add_maven_dep(ctx, "io.jsonwebtoken:jjwt-jackson", JJWT_VERSION, "runtime");
        render_pom(ctx);

        ctx.set_metadata("has:auth", "true");
        Ok(())
    }
}

fn generate_account(package: &str) -> String {
    format!(
        r#"package {package}.entity;

import jakarta.persistence.*;

@Entity
@Table(name = "{ACCOUNTS_TABLE}")
public class Account {{

    @Id
    @GeneratedValue(strategy = GenerationType.IDENTITY)
    private Long id;

    @Column(name = "username", nullable = false, unique = true, length = 100)
    private String username;

    @Column(name = "password_hash", nullable = false)
    private String passwordHash;

    public Long getId() {{
        return id;
    }}

    public String getUsername() {{
        return username;
    }}

    public void setUsername(String username) {{
        this.username = username;
    }}

    public String getPasswordHash() {{
        return passwordHash;
    }}

    public void setPasswordHash(String passwordHash) {{
        this.passwordHash = passwordHash;
    }}
}}
"#
    )
}

fn generate_account_repository(package: &str) -> String {
    format!(
        r#"package {package}.repository;

import {package}.entity.Account;
import java.util.Optional;
import org.springframework.data.jpa.repository.JpaRepository;

public interface AccountRepository extends JpaRepository<Account, Long> {{

    Optional<Account> findByUsername(String username);

    boolean existsByUsername(String username);
}}
"#
    )
}

fn generate_auth_request(package: &str) -> String {
    format!(
        r#"package {package}.dto;

import jakarta.validation.constraints.NotBlank;
import jakarta.validation.constraints.Size;

public record AuthRequest(
        @NotBlank @Size(min = 3, max = 100) String username,
        @NotBlank @Size(min = 8) String password) {{
}}
"#
    )
}

fn generate_token_response(package: &str) -> String {
    format!(
        r#"package {package}.dto;

public record TokenResponse(String accessToken, String tokenType) {{

    public static TokenResponse bearer(String token) {{
        return new TokenResponse(token, "Bearer");
    }}
}}
"#
    )
}

fn generate_jwt_service(package: &str) -> String {
    format!(
        r#"package {package}.security;

import io.jsonwebtoken.JwtException;
import io.jsonwebtoken.Jwts;
import io.jsonwebtoken.security.Keys;
import java.nio.charset.StandardCharsets;
import java.time.Instant;
import java.time.temporal.ChronoUnit;
import java.util.Date;
import java.util.Optional;
import javax.crypto.SecretKey;
import org.springframework.beans.factory.annotation.Value;
import org.springframework.stereotype.Service;

@Service
public class JwtService {{

    private final SecretKey key;
    private final long expirationMinutes;

    public JwtService(
            @Value("${{app.jwt.secret}}") String secret,
            @Value("${{app.jwt.expiration-minutes}}") long expirationMinutes) {{
        this.key = Keys.hmacShaKeyFor(secret.getBytes(StandardCharsets.UTF_8));
        this.expirationMinutes = expirationMinutes;
    }}

    public String issue(String username) {{
        Instant now = Instant.now();
        return Jwts.builder()
                .subject(username)
                .issuedAt(Date.from(now))
                .expiration(Date.from(now.plus(expirationMinutes, ChronoUnit.MINUTES)))
                .signWith(key)
                .compact();
    }}

    public Optional<String> verify(String token) {{
        try {{
            return Optional.of(Jwts.parser()
                    .verifyWith(key)
                    .build()
                    .parseSignedClaims(token)
                    .getPayload()
                    .getSubject());
        }} catch (JwtException | IllegalArgumentException ex) {{
            return Optional.empty();
        }}
    }}
}}
"#
    )
}

fn generate_filter(package: &str) -> String {
    format!(
        r#"package {package}.security;

import jakarta.servlet.FilterChain;
import jakarta.servlet.ServletException;
import jakarta.servlet.http.HttpServletRequest;
import jakarta.servlet.http.HttpServletResponse;
import java.io.IOException;
import java.util.List;
import org.springframework.http.HttpHeaders;
import org.springframework.security.authentication.UsernamePasswordAuthenticationToken;
import org.springframework.security.core.context.SecurityContextHolder;
import org.springframework.stereotype.Component;
import org.springframework.web.filter.OncePerRequestFilter;

@Component
public class JwtAuthenticationFilter extends OncePerRequestFilter {{

    private final JwtService jwtService;

    public JwtAuthenticationFilter(JwtService jwtService) {{
        this.jwtService = jwtService;
    }}

    @Override
    protected void doFilterInternal(HttpServletRequest request, HttpServletResponse response, FilterChain chain)
            throws ServletException, IOException {{
        String header = request.getHeader(HttpHeaders.AUTHORIZATION);
        if (header != null && header.startsWith("Bearer ")) {{
            jwtService.verify(header.substring(7)).ifPresent(username -> {{
                var authentication = new UsernamePasswordAuthenticationToken(username, null, List.of());
                SecurityContextHolder.getContext().setAuthentication(authentication);
            }});
        }}
        chain.doFilter(request, response);
    }}
}}
"#
    )
}

fn generate_security_config(package: &str, auth_route: &str) -> String {
    format!(
        r#"package {package}.security;

import org.springframework.context.annotation.Bean;
import org.springframework.context.annotation.Configuration;
import org.springframework.http.HttpStatus;
import org.springframework.security.config.annotation.web.builders.HttpSecurity;
import org.springframework.security.config.http.SessionCreationPolicy;
import org.springframework.security.crypto.bcrypt.BCryptPasswordEncoder;
import org.springframework.security.crypto.password.PasswordEncoder;
import org.springframework.security.web.SecurityFilterChain;
import org.springframework.security.web.authentication.HttpStatusEntryPoint;
import org.springframework.security.web.authentication.UsernamePasswordAuthenticationFilter;

@Configuration
public class SecurityConfig {{

    @Bean
    public SecurityFilterChain securityFilterChain(HttpSecurity http, JwtAuthenticationFilter jwtFilter)
            throws Exception {{
        return http
                .csrf(csrf -> csrf.disable())
                .sessionManagement(session -> session.sessionCreationPolicy(SessionCreationPolicy.STATELESS))
                .authorizeHttpRequests(auth -> auth
                        .requestMatchers("{auth_route}/**").permitAll()
                        .anyRequest().authenticated())
                .exceptionHandling(ex -> ex.authenticationEntryPoint(new HttpStatusEntryPoint(HttpStatus.UNAUTHORIZED)))
                .addFilterBefore(jwtFilter, UsernamePasswordAuthenticationFilter.class)
                .build();
    }}

    @Bean
    public PasswordEncoder passwordEncoder() {{
        return new BCryptPasswordEncoder();
    }}
}}
"#
    )
}

fn generate_auth_controller(package: &str, auth_route: &str) -> String {
    format!(
        r#"package {package}.controller;

import {package}.dto.AuthRequest;
import {package}.dto.TokenResponse;
import {package}.entity.Account;
import {package}.repository.AccountRepository;
import {package}.security.JwtService;
import jakarta.validation.Valid;
import org.springframework.http.HttpStatus;
import org.springframework.security.crypto.password.PasswordEncoder;
import org.springframework.web.bind.annotation.*;
import org.springframework.web.server.ResponseStatusException;

@RestController
@RequestMapping("{auth_route}")
public class AuthController {{

    private final AccountRepository accounts;
    private final PasswordEncoder passwordEncoder;
    private final JwtService jwtService;

    public AuthController(AccountRepository accounts, PasswordEncoder passwordEncoder, JwtService jwtService) {{
        this.accounts = accounts;
        this.passwordEncoder = passwordEncoder;
        this.jwtService = jwtService;
    }}

    @PostMapping("/register")
    @ResponseStatus(HttpStatus.CREATED)
    public TokenResponse register(@Valid @RequestBody AuthRequest request) {{
        if (accounts.existsByUsername(request.username())) {{
            throw new ResponseStatusException(HttpStatus.CONFLICT, "username already taken");
        }}
        Account account = new Account();
        account.setUsername(request.username());
        account.setPasswordHash(passwordEncoder.encode(request.password()));
        accounts.save(account);
        return TokenResponse.bearer(jwtService.issue(account.getUsername()));
    }}

    @PostMapping("/login")
    public TokenResponse login(@Valid @RequestBody AuthRequest request) {{
        return accounts.findByUsername(request.username())
                .filter(account -> passwordEncoder.matches(request.password(), account.getPasswordHash()))
                .map(account -> TokenResponse.bearer(jwtService.issue(account.getUsername())))
                .orElseThrow(() -> new ResponseStatusException(HttpStatus.UNAUTHORIZED, "invalid credentials"));
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blog;

    #[test]
    fn test_auth_files() {
        let mut ctx = GenerationContext::new();
        JavaAuthPass.run(&blog(), &mut ctx).unwrap();

        let config = ctx
            .get_file("src/main/java/com/example/app/security/SecurityConfig.java")
            .unwrap();
        assert!(config.contains(".requestMatchers(\"/api/auth/**\").permitAll()"));
        let account = ctx
            .get_file("src/main/java/com/example/app/entity/Account.java")
            .unwrap();
        assert!(account.contains("@Table(name = \"auth_accounts\")"));
        let pom = ctx.get_file("pom.xml").unwrap();
        assert!(pom.contains("<artifactId>jjwt-api</artifactId>\n            <version>0.12.6</version>"));
        assert!(ctx.has_metadata("has:auth"));
    }
}
