/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use rentdesk_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, None);
/// let app = rentdesk_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::middleware::security::security_headers;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use rentdesk_shared::auth::principal::{jwt_auth_middleware, AuthError};
use rentdesk_worker::notifiers::Notifier;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Reminder channels; `None` when no channel is configured
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.secrets.jwt_secret
    }

    pub fn cookie_secret(&self) -> &str {
        &self.config.secrets.cookie_secret
    }

    /// Whether cookies get the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                 # Health check (public)
/// ├── /api/                                   # Scheduled jobs (cron secret)
/// │   ├── GET  /cron                          # Reminder dispatch
/// │   ├── GET  /cron/generate-monthly-rentals # Monthly rent records
/// │   └── POST /reset-reminders               # Reset reminder flags
/// └── /v1/
///     ├── /teams/          (JWT)              # Team context and membership
///     ├── /permissions/    (JWT)              # Temporary grants and requests
///     ├── /activation/     (JWT)              # Onboarding stage
///     ├── /payments/       (JWT)              # Payment confirmation
///     └── /tenant/                            # Tenant portal (magic links)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Cron routes check the cron secret themselves
    let cron_routes = Router::new()
        .route("/cron", get(routes::cron::run_reminders))
        .route(
            "/cron/generate-monthly-rentals",
            get(routes::cron::generate_monthly_rentals),
        )
        .route("/reset-reminders", post(routes::cron::reset_reminders));

    let jwt_layer = middleware::from_fn_with_state(state.clone(), jwt_auth_layer);

    let team_routes = Router::new()
        .route("/", get(routes::teams::list_user_teams))
        .route("/current", get(routes::teams::current_team))
        .route("/switch", post(routes::teams::switch_team))
        .route("/personal", post(routes::teams::create_personal_team))
        .route("/members", get(routes::teams::list_members))
        .route("/members/:id/role", patch(routes::teams::change_member_role))
        .route("/members/:id", delete(routes::teams::remove_member))
        .route("/leave", post(routes::teams::leave_team))
        .route("/audit", get(routes::teams::list_audit_log))
        .layer(jwt_layer.clone());

    let permission_routes = Router::new()
        .route("/me", get(routes::permissions::my_permissions))
        .route(
            "/",
            get(routes::permissions::list_grants).post(routes::permissions::grant_permission),
        )
        .route("/:id", delete(routes::permissions::revoke_permission))
        .route(
            "/requests",
            get(routes::permissions::list_access_requests)
                .post(routes::permissions::request_access),
        )
        .route(
            "/requests/:id/review",
            post(routes::permissions::review_access_request),
        )
        .layer(jwt_layer.clone());

    let activation_routes = Router::new()
        .route("/", get(routes::activation::get_status))
        .route("/complete", post(routes::activation::complete))
        .route("/milestones", post(routes::activation::record))
        .route("/modules/:module", get(routes::activation::check_module))
        .layer(jwt_layer.clone());

    let payment_routes = Router::new()
        .route("/:id/confirm", post(routes::payments::confirm_payment))
        .layer(jwt_layer.clone());

    let tenant_admin_routes = Router::new()
        .route(
            "/leases/:id/magic-link",
            post(routes::tenant::create_magic_link).delete(routes::tenant::revoke_magic_link),
        )
        .layer(jwt_layer);

    let tenant_portal_routes = Router::new()
        .route(
            "/session",
            post(routes::tenant::create_session)
                .get(routes::tenant::get_session)
                .delete(routes::tenant::end_session),
        )
        .route("/verify", post(routes::tenant::verify_identity));

    let v1_routes = Router::new()
        .nest("/teams", team_routes)
        .nest("/permissions", permission_routes)
        .nest("/activation", activation_routes)
        .nest("/payments", payment_routes)
        .nest("/tenant", tenant_admin_routes.merge(tenant_portal_routes));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
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
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/api", cron_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(middleware::from_fn_with_state(production, security_headers))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects the principal into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.jwt_secret().to_string(), req, next).await
}
