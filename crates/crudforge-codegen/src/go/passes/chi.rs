//! Chi handlers and router, in plain `net/http` style.

use crudforge_schema::SqlSchema;

use crate::go::passes::web::{api_prefix, parse_id, write_common, Features, Framework};
use crate::go::{imports, module_path};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

/// Serves the services over Chi.
pub struct ChiPass;

impl Pass for ChiPass {
    fn name(&self) -> &'static str {
        "go-chi"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-data", "go-auth", "go-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let module = module_path(&ctx.options);
        let entities = entities(schema);
        let features = Features::from_context(ctx);
        let chi = Framework::Chi.import();

        for entity in &entities {
            ctx.set_file(
                format!("internal/handlers/{}.go", entity.names.snake),
                generate_handler(&module, chi, entity),
            );
        }
        ctx.set_file("internal/handlers/respond.go", generate_respond(&module));
        if features.auth {
            ctx.set_file("internal/handlers/auth.go", generate_auth(&module, chi));
        }
        if features.storage {
            ctx.set_file("internal/handlers/files.go", generate_files(&module, chi));
        }
        let router = generate_router(chi, &entities, api_prefix(&ctx.options), features);
        ctx.set_file("internal/handlers/router.go", router);

        write_common(&entities, ctx, Framework::Chi, features);
        Ok(())
    }
}

fn generate_handler(module: &str, chi: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let (parse, parse_import) = parse_id(entity);
    let paths = [
        "net/http".to_string(),
        parse_import.to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/service"),
        chi.to_string(),
    ];

    format!(
        r#"package handlers

{imports}
// {pascal}Handler serves /{route}.
type {pascal}Handler struct {{
	svc *service.{pascal}Service
}}

func New{pascal}Handler(svc *service.{pascal}Service) *{pascal}Handler {{
	return &{pascal}Handler{{svc: svc}}
}}

// Register mounts the {snake} routes on r.
func (h *{pascal}Handler) Register(r chi.Router) {{
	r.Route("/{route}", func(r chi.Router) {{
		r.Get("/", h.list)
		r.Post("/", h.create)
		r.Get("/{{id}}", h.get)
		r.Put("/{{id}}", h.update)
		r.Delete("/{{id}}", h.delete)
	}})
}}

func (h *{pascal}Handler) list(w http.ResponseWriter, r *http.Request) {{
	page, size := pageParams(r)
	result, err := h.svc.List(r.Context(), page, size)
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusOK, result)
}}

func (h *{pascal}Handler) get(w http.ResponseWriter, r *http.Request) {{
	id, err := parse{pascal}ID(chi.URLParam(r, "id"))
	if err != nil {{
		writeError(w, http.StatusBadRequest, "invalid id")
		return
	}}
	result, err := h.svc.Get(r.Context(), id)
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusOK, result)
}}

func (h *{pascal}Handler) create(w http.ResponseWriter, r *http.Request) {{
	var req dto.{pascal}Request
	if !bind(w, r, &req) {{
		return
	}}
	result, err := h.svc.Create(r.Context(), req)
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusCreated, result)
}}

func (h *{pascal}Handler) update(w http.ResponseWriter, r *http.Request) {{
	id, err := parse{pascal}ID(chi.URLParam(r, "id"))
	if err != nil {{
		writeError(w, http.StatusBadRequest, "invalid id")
		return
	}}
	var req dto.{pascal}Request
	if !bind(w, r, &req) {{
		return
	}}
	result, err := h.svc.Update(r.Context(), id, req)
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusOK, result)
}}

func (h *{pascal}Handler) delete(w http.ResponseWriter, r *http.Request) {{
	id, err := parse{pascal}ID(chi.URLParam(r, "id"))
	if err != nil {{
		writeError(w, http.StatusBadRequest, "invalid id")
		return
	}}
	if err := h.svc.Delete(r.Context(), id); err != nil {{
		fail(w, r, err)
		return
	}}
	w.WriteHeader(http.StatusNoContent)
}}

{parse}"#,
        imports = imports(module, &paths),
        route = entity.names.route,
        snake = entity.names.snake.replace('_', " "),
    )
}

fn generate_respond(module: &str) -> String {
    let paths = [
        "encoding/json".to_string(),
        "errors".to_string(),
        "log/slog".to_string(),
        "net/http".to_string(),
        "strconv".to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/service"),
    ];
    format!(
        r#"package handlers

{imports}
func writeJSON(w http.ResponseWriter, status int, v any) {{
	w.Header().Set("Content-Type", "application/json")
	w.WriteHeader(status)
	if err := json.NewEncoder(w).Encode(v); err != nil {{
		slog.Error("encode response", "err", err)
	}}
}}

func writeError(w http.ResponseWriter, status int, message string) {{
	writeJSON(w, status, map[string]string{{"error": message}})
}}

// fail answers with the status matching err. Unknown errors are logged.
func fail(w http.ResponseWriter, r *http.Request, err error) {{
	if errors.Is(err, service.ErrNotFound) {{
		writeError(w, http.StatusNotFound, err.Error())
		return
	}}
	slog.Error("request failed", "method", r.Method, "path", r.URL.Path, "err", err)
	writeError(w, http.StatusInternalServerError, "internal error")
}}

// bind decodes and validates the JSON body. It answers 400 and returns false
// when either step fails.
func bind(w http.ResponseWriter, r *http.Request, v any) bool {{
	if err := json.NewDecoder(r.Body).Decode(v); err != nil {{
		writeError(w, http.StatusBadRequest, err.Error())
		return false
	}}
	if err := dto.Validate(v); err != nil {{
		writeError(w, http.StatusBadRequest, err.Error())
		return false
	}}
	return true
}}

func pageParams(r *http.Request) (int, int) {{
	q := r.URL.Query()
	page, _ := strconv.Atoi(q.Get("page"))
	size, _ := strconv.Atoi(q.Get("page_size"))
	return dto.Clamp(page, size)
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_auth(module: &str, chi: &str) -> String {
    let paths = [
        "context".to_string(),
        "errors".to_string(),
        "net/http".to_string(),
        "strings".to_string(),
        format!("{module}/internal/auth"),
        chi.to_string(),
    ];
    format!(
        r#"package handlers

{imports}
type contextKey string

const usernameKey contextKey = "username"

// AuthHandler serves registration and login.
type AuthHandler struct {{
	svc *auth.Service
}}

func NewAuthHandler(svc *auth.Service) *AuthHandler {{
	return &AuthHandler{{svc: svc}}
}}

// Register mounts the public auth routes on r.
func (h *AuthHandler) Register(r chi.Router) {{
	r.Post("/auth/register", h.register)
	r.Post("/auth/login", h.login)
}}

func (h *AuthHandler) register(w http.ResponseWriter, r *http.Request) {{
	var req auth.Credentials
	if !bind(w, r, &req) {{
		return
	}}
	token, err := h.svc.Register(r.Context(), req)
	if errors.Is(err, auth.ErrUsernameTaken) {{
		writeError(w, http.StatusConflict, err.Error())
		return
	}}
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusCreated, token)
}}

func (h *AuthHandler) login(w http.ResponseWriter, r *http.Request) {{
	var req auth.Credentials
	if !bind(w, r, &req) {{
		return
	}}
	token, err := h.svc.Login(r.Context(), req)
	if errors.Is(err, auth.ErrInvalidCredentials) {{
		writeError(w, http.StatusUnauthorized, err.Error())
		return
	}}
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusOK, token)
}}

// RequireAuth rejects requests without a valid bearer token.
func RequireAuth(svc *auth.Service) func(http.Handler) http.Handler {{
	return func(next http.Handler) http.Handler {{
		return http.HandlerFunc(func(w http.ResponseWriter, r *http.Request) {{
			token, ok := strings.CutPrefix(r.Header.Get("Authorization"), "Bearer ")
			if !ok {{
				writeError(w, http.StatusUnauthorized, "missing bearer token")
				return
			}}
			username, err := svc.Authenticate(token)
			if err != nil {{
				writeError(w, http.StatusUnauthorized, "invalid token")
				return
			}}
			next.ServeHTTP(w, r.WithContext(context.WithValue(r.Context(), usernameKey, username)))
		}})
	}}
}}

// Username returns the user RequireAuth admitted, or "".
func Username(ctx context.Context) string {{
	username, _ := ctx.Value(usernameKey).(string)
	return username
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_files(module: &str, chi: &str) -> String {
    let paths = [
        "net/http".to_string(),
        format!("{module}/internal/storage"),
        chi.to_string(),
    ];
    format!(
        r#"package handlers

{imports}
// FileHandler serves uploads and downloads.
type FileHandler struct {{
	store *storage.Local
}}

func NewFileHandler(store *storage.Local) *FileHandler {{
	return &FileHandler{{store: store}}
}}

// Register mounts the file routes on r.
func (h *FileHandler) Register(r chi.Router) {{
	r.Post("/files", h.upload)
	r.Get("/files/{{name}}", h.download)
}}

func (h *FileHandler) upload(w http.ResponseWriter, r *http.Request) {{
	f, header, err := r.FormFile("file")
	if err != nil {{
		writeError(w, http.StatusBadRequest, "missing file field")
		return
	}}
	defer f.Close()
	stored, err := h.store.Save(f, header.Filename)
	if err != nil {{
		fail(w, r, err)
		return
	}}
	writeJSON(w, http.StatusCreated, stored)
}}

func (h *FileHandler) download(w http.ResponseWriter, r *http.Request) {{
	path, err := h.store.Path(chi.URLParam(r, "name"))
	if err != nil {{
		writeError(w, http.StatusNotFound, err.Error())
		return
	}}
	http.ServeFile(w, r, path)
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_router(
    chi: &str,
    entities: &[Entity<'_>],
    prefix: Option<&str>,
    features: Features,
) -> String {
    let mut protected: Vec<String> = entities
        .iter()
        .map(|e| format!("New{}Handler(deps.{})", e.names.pascal, e.names.pascal_plural))
        .collect();
    if features.storage {
        protected.push("NewFileHandler(deps.Files)".to_string());
    }

    let mut inner = String::new();
    if features.auth {
        inner.push_str("\t\tNewAuthHandler(deps.Auth).Register(api)\n");
        if !protected.is_empty() {
            inner.push_str("\t\tapi.Group(func(protected chi.Router) {\n");
            inner.push_str("\t\t\tprotected.Use(RequireAuth(deps.Auth))\n");
            for handler in &protected {
                inner.push_str(&format!("\t\t\t{handler}.Register(protected)\n"));
            }
            inner.push_str("\t\t})\n");
        }
    } else {
        for handler in &protected {
            inner.push_str(&format!("\t\t{handler}.Register(api)\n"));
        }
    }
    let mount = match (inner.is_empty(), prefix) {
        (true, _) => String::new(),
        (false, Some(prefix)) => format!("\tr.Route(\"{prefix}\", func(api chi.Router) {{\n{inner}\t}})\n"),
        (false, None) => format!("\tr.Group(func(api chi.Router) {{\n{inner}\t}})\n"),
    };

    format!(
        r#"package handlers

import (
	"net/http"

	"{chi}"
	"{chi}/middleware"
)

// NewRouter mounts every handler under the API prefix.
func NewRouter(deps Deps) http.Handler {{
	r := chi.NewRouter()
	r.Use(middleware.RequestID, middleware.RealIP, middleware.Logger, middleware.Recoverer)
	r.Get("/health", func(w http.ResponseWriter, _ *http.Request) {{
		writeJSON(w, http.StatusOK, map[string]string{{"status": "ok"}})
	}})
{mount}	return r
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::passes::{GoAuthPass, GoDataPass, GoStoragePass};
    use crate::go::GoBasePass;
    use crate::model::test_support::blog;
    use crate::options::GeneratorOptions;

    fn run(options: GeneratorOptions) -> GenerationContext {
        let schema = blog();
        let mut ctx = GenerationContext::with_options(options.clone());
        GoBasePass.run(&schema, &mut ctx).unwrap();
        GoDataPass.run(&schema, &mut ctx).unwrap();
        if options.auth {
            GoAuthPass.run(&schema, &mut ctx).unwrap();
        }
        if options.storage {
            GoStoragePass.run(&schema, &mut ctx).unwrap();
        }
        ChiPass.run(&schema, &mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_entity_handler() {
        let ctx = run(GeneratorOptions::default());
        let handler = ctx.get_file("internal/handlers/comment.go").unwrap();
        assert!(handler.contains("r.Route(\"/comments\", func(r chi.Router) {"));
        assert!(handler.contains("r.Put(\"/{id}\", h.update)"));
        assert!(handler.contains("parseCommentID(chi.URLParam(r, \"id\"))"));
        assert!(handler.contains("\t\"github.com/go-chi/chi/v5\"\n"));
    }

    #[test]
    fn test_router_groups_protected_routes() {
        let ctx = run(GeneratorOptions::default());
        let router = ctx.get_file("internal/handlers/router.go").unwrap();
        assert!(router.contains("r.Route(\"/api\", func(api chi.Router) {"));
        assert!(router.contains("\t\t\tprotected.Use(RequireAuth(deps.Auth))\n"));
        assert!(router.contains("\t\t\tNewUserHandler(deps.Users).Register(protected)\n"));
        assert!(router.contains("\t\"github.com/go-chi/chi/v5/middleware\"\n"));
        let go_mod = ctx.get_file("go.mod").unwrap();
        assert!(go_mod.contains("github.com/go-chi/chi/v5 v5.1.0"));
        assert!(!go_mod.contains("gin-gonic"));
    }

    #[test]
    fn test_empty_prefix_uses_group() {
        let options = GeneratorOptions {
            api_prefix: String::new(),
            auth: false,
            ..GeneratorOptions::default()
        };
        let ctx = run(options);
        let router = ctx.get_file("internal/handlers/router.go").unwrap();
        assert!(router.contains("\tr.Group(func(api chi.Router) {\n"));
        assert!(router.contains("\t\tNewFileHandler(deps.Files).Register(api)\n"));
        assert!(!router.contains("RequireAuth"));
    }
}
