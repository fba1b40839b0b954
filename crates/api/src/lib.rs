pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod uploads;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if allowed.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let organization_routes = Router::new()
        .route("/register", post(routes::organization::register))
        .route("/login", post(routes::organization::login))
        .route("/", get(routes::organization::list))
        .route(
            "/{id}",
            get(routes::organization::get)
                .put(routes::organization::update)
                .delete(routes::organization::delete),
        )
        .route("/{id}/members", get(routes::organization::members))
        .route(
            "/{id}/members/{user_id}/role",
            put(routes::organization::change_user_role),
        );

    let user_routes = Router::new()
        .route("/register", post(routes::user::register))
        .route("/login", post(routes::user::login))
        .route("/logout", post(routes::user::logout))
        .route("/", get(routes::user::list))
        .route("/me", get(routes::user::me))
        .route("/{id}", get(routes::user::get));

    let team_routes = Router::new()
        .route(
            "/",
            post(routes::team::create).get(routes::team::list_mine),
        )
        .route("/all", get(routes::team::list_all))
        .route(
            "/{id}",
            get(routes::team::get).delete(routes::team::delete),
        )
        .route("/{id}/members", post(routes::team::add_member))
        .route(
            "/{id}/members/{user_id}",
            axum::routing::delete(routes::team::remove_member),
        )
        .route(
            "/{id}/members/{user_id}/role",
            patch(routes::team::change_member_role),
        )
        .route(
            "/{id}/members/{user_id}/access",
            patch(routes::team::change_access_level),
        );

    let project_routes = Router::new()
        .route(
            "/",
            post(routes::project::create).get(routes::project::list),
        )
        .route(
            "/{id}",
            get(routes::project::get)
                .patch(routes::project::update)
                .delete(routes::project::delete),
        )
        .route(
            "/{id}/datasets",
            post(routes::project::upload_datasets).get(routes::project::list_datasets),
        );

    let chat_routes = Router::new()
        .route("/", post(routes::chat::submit_turn))
        .route("/ai", post(routes::chat::ai_reply))
        .route("/create", post(routes::chat::create_thread))
        .route("/{project_id}/{chat_id}", get(routes::chat::history));

    let api = Router::new()
        .nest("/organizations", organization_routes)
        .nest("/users", user_routes)
        .nest("/teams", team_routes)
        .nest("/projects", project_routes)
        .nest("/chat", chat_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .nest_service("/uploads", ServeDir::new(&state.settings.uploads.dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
