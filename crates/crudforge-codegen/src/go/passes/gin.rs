//! Gin handlers and router.

use crudforge_schema::SqlSchema;

use crate::go::imports;
use crate::go::module_path;
use crate::go::passes::web::{api_prefix, parse_id, write_common, Features, Framework};
use crate::model::{entities, Entity};
use crate::pass::{GenerationContext, Pass};
use crate::CodegenError;

const GIN: &str = "github.com/gin-gonic/gin";

/// Serves the services over Gin.
pub struct GinPass;

impl Pass for GinPass {
    fn name(&self) -> &'static str {
        "go-gin"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["go-data", "go-auth", "go-storage"]
    }

    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError> {
        let module = module_path(&ctx.options);
        let entities = entities(schema);
        let features = Features::from_context(ctx);

        for entity in &entities {
            ctx.set_file(
                format!("internal/handlers/{}.go", entity.names.snake),
                generate_handler(&module, entity),
            );
        }
        ctx.set_file("internal/handlers/respond.go", generate_respond(&module));
        if features.auth {
            ctx.set_file("internal/handlers/auth.go", generate_auth(&module));
        }
        if features.storage {
            ctx.set_file("internal/handlers/files.go", generate_files(&module));
        }
        let router = generate_router(&entities, api_prefix(&ctx.options), features);
        ctx.set_file("internal/handlers/router.go", router);

        write_common(&entities, ctx, Framework::Gin, features);
        Ok(())
    }
}

fn generate_handler(module: &str, entity: &Entity<'_>) -> String {
    let pascal = &entity.names.pascal;
    let (parse, parse_import) = parse_id(entity);
    let paths = [
        "net/http".to_string(),
        parse_import.to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/service"),
        GIN.to_string(),
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
func (h *{pascal}Handler) Register(r gin.IRouter) {{
	g := r.Group("/{route}")
	g.GET("", h.list)
	g.GET("/:id", h.get)
	g.POST("", h.create)
	g.PUT("/:id", h.update)
	g.DELETE("/:id", h.delete)
}}

func (h *{pascal}Handler) list(c *gin.Context) {{
	page, size := pageParams(c.Query("page"), c.Query("page_size"))
	result, err := h.svc.List(c.Request.Context(), page, size)
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusOK, result)
}}

func (h *{pascal}Handler) get(c *gin.Context) {{
	id, err := parse{pascal}ID(c.Param("id"))
	if err != nil {{
		c.JSON(http.StatusBadRequest, errorBody("invalid id"))
		return
	}}
	result, err := h.svc.Get(c.Request.Context(), id)
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusOK, result)
}}

func (h *{pascal}Handler) create(c *gin.Context) {{
	var req dto.{pascal}Request
	if !bind(c, &req) {{
		return
	}}
	result, err := h.svc.Create(c.Request.Context(), req)
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusCreated, result)
}}

func (h *{pascal}Handler) update(c *gin.Context) {{
	id, err := parse{pascal}ID(c.Param("id"))
	if err != nil {{
		c.JSON(http.StatusBadRequest, errorBody("invalid id"))
		return
	}}
	var req dto.{pascal}Request
	if !bind(c, &req) {{
		return
	}}
	result, err := h.svc.Update(c.Request.Context(), id, req)
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusOK, result)
}}

func (h *{pascal}Handler) delete(c *gin.Context) {{
	id, err := parse{pascal}ID(c.Param("id"))
	if err != nil {{
		c.JSON(http.StatusBadRequest, errorBody("invalid id"))
		return
	}}
	if err := h.svc.Delete(c.Request.Context(), id); err != nil {{
		fail(c, err)
		return
	}}
	c.Status(http.StatusNoContent)
}}

{parse}"#,
        imports = imports(module, &paths),
        route = entity.names.route,
        snake = entity.names.snake.replace('_', " "),
    )
}

fn generate_respond(module: &str) -> String {
    let paths = [
        "errors".to_string(),
        "log/slog".to_string(),
        "net/http".to_string(),
        "strconv".to_string(),
        format!("{module}/internal/dto"),
        format!("{module}/internal/service"),
        GIN.to_string(),
    ];
    format!(
        r#"package handlers

{imports}
func errorBody(message string) gin.H {{
	return gin.H{{"error": message}}
}}

// fail answers with the status matching err. Unknown errors are logged.
func fail(c *gin.Context, err error) {{
	if errors.Is(err, service.ErrNotFound) {{
		c.JSON(http.StatusNotFound, errorBody(err.Error()))
		return
	}}
	slog.Error("request failed", "method", c.Request.Method, "path", c.FullPath(), "err", err)
	c.JSON(http.StatusInternalServerError, errorBody("internal error"))
}}

// bind decodes and validates the JSON body. It answers 400 and returns false
// when either step fails.
func bind(c *gin.Context, v any) bool {{
	if err := c.ShouldBindJSON(v); err != nil {{
		c.JSON(http.StatusBadRequest, errorBody(err.Error()))
		return false
	}}
	if err := dto.Validate(v); err != nil {{
		c.JSON(http.StatusBadRequest, errorBody(err.Error()))
		return false
	}}
	return true
}}

func pageParams(page, size string) (int, int) {{
	p, _ := strconv.Atoi(page)
	s, _ := strconv.Atoi(size)
	return dto.Clamp(p, s)
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_auth(module: &str) -> String {
    let paths = [
        "errors".to_string(),
        "net/http".to_string(),
        "strings".to_string(),
        format!("{module}/internal/auth"),
        GIN.to_string(),
    ];
    format!(
        r#"package handlers

{imports}
// AuthHandler serves registration and login.
type AuthHandler struct {{
	svc *auth.Service
}}

func NewAuthHandler(svc *auth.Service) *AuthHandler {{
	return &AuthHandler{{svc: svc}}
}}

// Register mounts the public auth routes on r.
func (h *AuthHandler) Register(r gin.IRouter) {{
	g := r.Group("/auth")
	g.POST("/register", h.register)
	g.POST("/login", h.login)
}}

func (h *AuthHandler) register(c *gin.Context) {{
	var req auth.Credentials
	if !bind(c, &req) {{
		return
	}}
	token, err := h.svc.Register(c.Request.Context(), req)
	if errors.Is(err, auth.ErrUsernameTaken) {{
		c.JSON(http.StatusConflict, errorBody(err.Error()))
		return
	}}
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusCreated, token)
}}

func (h *AuthHandler) login(c *gin.Context) {{
	var req auth.Credentials
	if !bind(c, &req) {{
		return
	}}
	token, err := h.svc.Login(c.Request.Context(), req)
	if errors.Is(err, auth.ErrInvalidCredentials) {{
		c.JSON(http.StatusUnauthorized, errorBody(err.Error()))
		return
	}}
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusOK, token)
}}

// RequireAuth rejects requests without a valid bearer token and stores the
// username under "username".
func RequireAuth(svc *auth.Service) gin.HandlerFunc {{
	return func(c *gin.Context) {{
		token, ok := strings.CutPrefix(c.GetHeader("Authorization"), "Bearer ")
		if !ok {{
			c.AbortWithStatusJSON(http.StatusUnauthorized, errorBody("missing bearer token"))
			return
		}}
		username, err := svc.Authenticate(token)
		if err != nil {{
			c.AbortWithStatusJSON(http.StatusUnauthorized, errorBody("invalid token"))
			return
		}}
		c.Set("username", username)
		c.Next()
	}}
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_files(module: &str) -> String {
    let paths = [
        "net/http".to_string(),
        format!("{module}/internal/storage"),
        GIN.to_string(),
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
func (h *FileHandler) Register(r gin.IRouter) {{
	g := r.Group("/files")
	g.POST("", h.upload)
	g.GET("/:name", h.download)
}}

func (h *FileHandler) upload(c *gin.Context) {{
	header, err := c.FormFile("file")
	if err != nil {{
		c.JSON(http.StatusBadRequest, errorBody("missing file field"))
		return
	}}
	f, err := header.Open()
	if err != nil {{
		fail(c, err)
		return
	}}
	defer f.Close()
	stored, err := h.store.Save(f, header.Filename)
	if err != nil {{
		fail(c, err)
		return
	}}
	c.JSON(http.StatusCreated, stored)
}}

func (h *FileHandler) download(c *gin.Context) {{
	path, err := h.store.Path(c.Param("name"))
	if err != nil {{
		c.JSON(http.StatusNotFound, errorBody(err.Error()))
		return
	}}
	c.File(path)
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_router(entities: &[Entity<'_>], prefix: Option<&str>, features: Features) -> String {
    let mut protected: Vec<String> = entities
        .iter()
        .map(|e| format!("New{}Handler(deps.{})", e.names.pascal, e.names.pascal_plural))
        .collect();
    if features.storage {
        protected.push("NewFileHandler(deps.Files)".to_string());
    }

    let mut body = String::new();
    let has_routes = features.auth || !protected.is_empty();
    if has_routes {
        body.push_str(&format!("\n\tapi := r.Group(\"{}\")\n", prefix.unwrap_or("")));
        let mut target = "api";
        if features.auth {
            body.push_str("\tNewAuthHandler(deps.Auth).Register(api)\n");
            if !protected.is_empty() {
                body.push_str("\tprotected := api.Group(\"\", RequireAuth(deps.Auth))\n");
                target = "protected";
            }
        }
        for handler in &protected {
            body.push_str(&format!("\t{handler}.Register({target})\n"));
        }
    }

    format!(
        r#"package handlers

import (
	"net/http"

	"{GIN}"
)

// NewRouter mounts every handler under the API prefix.
func NewRouter(deps Deps) *gin.Engine {{
	r := gin.New()
	r.Use(gin.Logger(), gin.Recovery())
	r.GET("/health", func(c *gin.Context) {{
		c.JSON(http.StatusOK, gin.H{{"status": "ok"}})
	}})
{body}	return r
}}
"#
    )
}
