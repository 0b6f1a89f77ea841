use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classroom_runtime::{
    config::Config,
    db,
    kv::{KeyValueStore, MemoryKv, PgKv},
    routes, seed,
    store::{CourseStore, MemoryCourseStore, PgCourseStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "classroom_runtime=info,axum=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (store, kv): (Arc<dyn CourseStore>, Arc<dyn KeyValueStore>) = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, config.database_max_connections).await?;
            tracing::info!("using postgres backend");
            let store: Arc<dyn CourseStore> = Arc::new(PgCourseStore::new(pool.clone()));
            let kv: Arc<dyn KeyValueStore> = Arc::new(PgKv::new(pool));
            (store, kv)
        }
        None => {
            tracing::info!("DATABASE_URL not set, keeping courses and learner state in memory");
            let store: Arc<dyn CourseStore> = Arc::new(MemoryCourseStore::new());
            let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
            (store, kv)
        }
    };

    if config.seed_demo {
        seed::seed_if_empty(store.as_ref()).await?;
    }
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin endpoints accept any caller");
    }

    let state = routes::AppState::new(store, kv, config.admin_token.clone());
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        // cover images and lesson attachments
        .nest_service("/assets", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = config.addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
