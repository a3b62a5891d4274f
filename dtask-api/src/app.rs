/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use dtask_api::{app::AppState, config::Config};
/// use dtask_shared::store::memory::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = dtask_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use dtask_shared::{
    auth::jwt::TokenIssuer,
    services::{accounts::AccountService, marketplace::MarketplaceService},
    store::Store,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is reference-counted internally.
#[derive(Clone)]
pub struct AppState {
    /// Backing store
    pub store: Arc<dyn Store>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Registration, login and token verification
    pub accounts: AccountService,

    /// Tasks and applications
    pub marketplace: MarketplaceService,
}

impl AppState {
    /// Creates new application state over `store`
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let accounts = AccountService::new(
            store.clone(),
            TokenIssuer::new(config.jwt.secret.clone()),
            config.password,
        );
        let marketplace = MarketplaceService::new(store.clone(), accounts.clone());

        Self {
            store,
            config: Arc::new(config),
            accounts,
            marketplace,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /                                  # Banner (public)
/// ├── GET /health                            # Health check (public)
/// ├── /uploads/:file                         # Stored attachments (public)
/// └── /api/
///     ├── /users/
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /users/login              # alias of /login
///     │   ├── GET  /profile                  # authenticated
///     │   └── GET  /me                       # authenticated
///     └── /tasks/
///         ├── GET    /
///         ├── GET    /:id
///         ├── POST   /                       # authenticated, Client
///         ├── DELETE /:id                    # authenticated, owner
///         ├── POST   /:id/apply              # authenticated, Freelancer
///         ├── POST   /:id/applicants/:freelancer_id/accept
///         ├── POST   /:id/applicants/:freelancer_id/reject
///         ├── GET    /client-applicants      # authenticated, Client
///         └── POST   /update-applicant-status
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Body size limit
/// 5. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{health, tasks, users};

    let auth = axum::middleware::from_fn_with_state(state.clone(), auth_layer);

    let public_user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        // Older clients post to /api/users/users/login
        .route("/users/login", post(users::login));

    let protected_user_routes = Router::new()
        .route("/profile", get(users::profile))
        .route("/me", get(users::me))
        .layer(auth.clone());

    let public_task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/:id", get(tasks::get_task));

    // Static segments take priority over `/:id`
    let protected_task_routes = Router::new()
        .route("/", post(tasks::create_task))
        .route("/client-applicants", get(tasks::client_applicants))
        .route("/update-applicant-status", post(tasks::update_applicant_status))
        .route("/:id", delete(tasks::delete_task))
        .route("/:id/apply", post(tasks::apply_to_task))
        .route(
            "/:id/applicants/:freelancer_id/accept",
            post(tasks::accept_applicant),
        )
        .route(
            "/:id/applicants/:freelancer_id/reject",
            post(tasks::reject_applicant),
        )
        .layer(auth);

    let api_routes = Router::new()
        .nest("/users", public_user_routes.merge(protected_user_routes))
        .nest("/tasks", public_task_routes.merge(protected_task_routes));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/", get(health::banner))
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.uploads.dir))
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(state.config.uploads.max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Bearer token from an `Authorization` header value
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// JWT authentication middleware layer
///
/// Verifies the bearer token, re-resolves the account it names, then
/// injects [`AuthContext`](dtask_shared::auth::context::AuthContext) into
/// request extensions.
async fn auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let auth_context = state.accounts.verify_token(token).await?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
