//! # Folio
//!
//! Portfolio content service: the public site reads content through a
//! TTL'd cache, the admin panel edits it through a shared save pipeline,
//! and both talk to this one axum server.
//!
//! # Surfaces
//!
//! - `/api/*`: public reads, subscribe, contact, and the about/footer
//!   revalidation pair
//! - `/api/admin/*`: the bearer-gated editors
//! - `/files/*`: uploaded blobs straight off the blob root
//!
//! # Stores
//!
//! Redis holds the documents (one hash per collection); uploads land on
//! disk under the blob root. Without a `REDIS_URL` the server runs on the
//! in-memory store, which is enough for local editing sessions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use auth::require_admin;
use routes::{admin, public};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/hero", get(admin::get_hero).put(admin::put_hero))
        .route("/about", get(admin::get_about).put(admin::put_about))
        .route("/footer", get(admin::get_footer).put(admin::put_footer))
        .route(
            "/projects",
            get(admin::list_projects).post(admin::create_project),
        )
        .route(
            "/projects/{id}",
            put(admin::update_project).delete(admin::delete_project),
        )
        .route("/projects/{id}/featured", post(admin::toggle_featured))
        .route("/blog", get(admin::list_posts).post(admin::create_post))
        .route(
            "/blog/{id}",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route(
            "/resources",
            get(admin::list_resources).post(admin::create_category),
        )
        .route("/resources/order", put(admin::reorder_categories))
        .route(
            "/resources/{id}",
            put(admin::update_category).delete(admin::delete_category),
        )
        .route("/upload", post(admin::upload))
        .route("/subscribers", get(admin::list_subscribers))
        .route("/subscribers/{id}", axum::routing::delete(admin::delete_subscriber))
        .route("/activity", get(admin::recent_activity))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api = Router::new()
        .route("/hero", get(public::hero))
        .route("/about", get(public::about).post(public::revalidate_about))
        .route(
            "/footer",
            get(public::footer).post(public::revalidate_footer),
        )
        .route("/projects", get(public::list_projects))
        .route("/projects/featured", get(public::featured_projects))
        .route("/blog", get(public::list_blog))
        .route("/blog/{id}", get(public::blog_post))
        .route("/resources", get(public::list_resources))
        .route("/subscribe", post(public::subscribe))
        .route("/contact", post(public::contact))
        .nest("/admin", admin_routes);

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .nest("/api", api)
        .nest_service("/files", ServeDir::new(&state.config.blob_root))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
