use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing,
};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use bookloft_storeservice::{
    api::{
        checkout::StripeCheckout,
        identity::{HttpTokenVerifier, TokenVerifier},
    },
    core::{app_state::AppState, bootstrap, config, db, swagger},
    routes,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let http_client = reqwest::Client::new();
    let verifier: Arc<dyn TokenVerifier> = Arc::new(HttpTokenVerifier::new(
        http_client.clone(),
        config.identity.verify_url.clone(),
    ));

    let state = AppState {
        db_pool: db::connect(&config.database.url).await?,
        checkout: Arc::new(StripeCheckout::new(http_client, config.checkout.clone())),
        verifier: verifier.clone(),
    };

    let routes = routes::payments::routes_with_openapi()
        .merge(routes::orders::routes_with_openapi())
        .merge(routes::books::routes_with_openapi(verifier.clone()))
        .merge(routes::users::routes_with_openapi(verifier));

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("BookLoft StoreService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let cors = CorsLayer::new()
        .allow_origin(config.server.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .route("/", routing::get(routes::root))
        .merge(routes)
        .merge(swagger_ui)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    bootstrap::serve("StoreService", app, config.server.port).await
}
