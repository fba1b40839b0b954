use atelier_api::{build_router, state::AppState};
use atelier_config::Settings;
use atelier_db::{connect, indexes::ensure_indexes};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "atelier_api=debug,atelier_services=debug,atelier_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting Atelier API on {}:{}", settings.app.host, settings.app.port);
    info!(
        endpoint = %settings.completion.endpoint,
        model = %settings.completion.model,
        timeout_secs = settings.completion.timeout_secs,
        api_key_set = settings.completion.api_key.is_some(),
        "Completion config"
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    tokio::fs::create_dir_all(&settings.uploads.dir).await?;

    let app_state = AppState::new(db, settings.clone())?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
