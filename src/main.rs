//! classpulse-back binary entrypoint wiring REST, WebSocket, SSE and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classpulse_back::{
    config::{AppConfig, StorageBackend},
    dao::activity_store::memory::MemoryActivityStore,
    routes,
    services::recovery,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let directory = Arc::new(config.directory());
    info!(users = directory.user_count(), "identity directory seeded");

    let app_state = AppState::new(config, directory);
    install_storage(&app_state, StorageBackend::from_env()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured activity store. MongoDB is supervised in the
/// background; the service stays degraded until the first connection.
async fn install_storage(state: &SharedState, backend: StorageBackend) {
    match backend {
        StorageBackend::MongoDb => {
            #[cfg(feature = "mongo-store")]
            {
                spawn_mongo_supervisor(state.clone());
                return;
            }
            #[cfg(not(feature = "mongo-store"))]
            warn!("built without the `mongo-store` feature; using the in-memory store");
        }
        StorageBackend::Memory => {}
    }

    info!("using in-memory activity store");
    state
        .set_activity_store(Arc::new(MemoryActivityStore::new()))
        .await;
    if let Err(err) = recovery::rearm_running(state).await {
        warn!(error = %err, "failed to re-arm expiry timers");
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) {
    use classpulse_back::dao::{
        activity_store::{
            ActivityStore,
            mongodb::{MongoActivityStore, MongoConfig},
        },
        storage::StorageError,
    };
    use classpulse_back::services::storage_supervisor;

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();
    info!(uri = %mongo_uri, "using MongoDB activity store");

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = mongo_uri.clone();
        let db_name = mongo_db.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoActivityStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn ActivityStore>)
        }
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
