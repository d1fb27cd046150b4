use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{
    optional_auth_middleware, require_admin_middleware, require_auth_middleware, require_main_domain_middleware,
    resolve_tenant_middleware,
};
use crate::state::AppState;

/// Full HTTP surface. `/` and `/health` skip tenant resolution; everything
/// else resolves the tenant from the host first.
pub fn app(state: AppState) -> Router {
    let tenant_routes = public_routes(&state)
        .merge(protected_routes(&state))
        .merge(elevated_routes(&state))
        .layer(from_fn_with_state(state.clone(), resolve_tenant_middleware));

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(tenant_routes);

    let router = match cors_layer(&state.config.security) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn public_routes(state: &AppState) -> Router<AppState> {
    use public::auth;

    let branding = Router::new()
        .route("/api/tenant", get(public::current_tenant))
        .route_layer(from_fn_with_state(state.clone(), optional_auth_middleware));

    Router::new()
        .merge(branding)
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
        .route("/auth/refresh", post(auth::refresh_post))
        .route("/auth/forgot-password", post(auth::forgot_password_post))
        .route("/auth/reset-password", post(auth::reset_password_post))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{auth, todos};

    Router::new()
        .route("/api/auth/me", get(auth::me_get).patch(auth::me_patch))
        .route("/api/auth/password", put(auth::password_put))
        .route("/api/todos", get(todos::todos_get).post(todos::todos_post))
        .route("/api/todos/upcoming", get(todos::todos_upcoming))
        .route("/api/todos/overdue", get(todos::todos_overdue))
        .route("/api/todos/stats", get(todos::todos_stats))
        .route(
            "/api/todos/:id",
            get(todos::todo_get).patch(todos::todo_patch).delete(todos::todo_delete),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth_middleware))
}

fn elevated_routes(state: &AppState) -> Router<AppState> {
    use elevated::root::{tenant, user};

    // Layers run outermost first: authenticate, check the role, then the host
    let tenants = Router::new()
        .route("/api/root/tenants", get(tenant::tenant_list).post(tenant::tenant_create))
        .route("/api/root/tenants/:id", get(tenant::tenant_show).patch(tenant::tenant_update))
        .route("/api/root/tenants/:id/deactivate", post(tenant::tenant_deactivate))
        .route("/api/root/tenants/:id/activate", post(tenant::tenant_activate))
        .route("/api/root/tenants/:id/stats", get(tenant::tenant_stats))
        .route_layer(from_fn(require_main_domain_middleware));

    let users = Router::new()
        .route("/api/root/users", get(user::user_list))
        .route("/api/root/users/:id/status", patch(user::user_status_patch))
        .route("/api/root/users/:id/role", patch(user::user_role_patch));

    tenants
        .merge(users)
        .route_layer(from_fn(require_admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), require_auth_middleware))
}

/// `None` when CORS is disabled. An empty origin list allows any origin.
fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() { AllowOrigin::any() } else { AllowOrigin::list(origins) };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any),
    )
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Tenant To-Do API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "tenant": "/api/tenant (public)",
                "auth": "/auth/register, /auth/login, /auth/refresh, /auth/forgot-password, /auth/reset-password (public)",
                "account": "/api/auth/me, /api/auth/password (protected)",
                "todos": "/api/todos[/:id], /api/todos/upcoming, /api/todos/overdue, /api/todos/stats (protected)",
                "root": "/api/root/tenants/* (ADMIN, main domain), /api/root/users/* (ADMIN)"
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": backend }
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": { "code": "SERVICE_UNAVAILABLE", "message": "Database unavailable" },
                    "data": { "status": "degraded", "timestamp": now, "database": backend }
                })),
            )
        }
    }
}
