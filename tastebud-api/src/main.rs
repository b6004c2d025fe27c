use std::sync::Arc;

use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;

use tastebud_api::config::AppConfig;
use tastebud_api::{build_router, realtime, AppState};
use tastebud_shared::clients::db::create_pool;
use tastebud_shared::clients::redis::RedisClient;
use tastebud_shared::clients::storage::ObjectStore;
use tastebud_shared::middleware::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("tastebud-api");
    let metrics_handle = init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.database_pool_size)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let storage = ObjectStore::new(
        &config.minio_endpoint,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.minio_bucket,
        &config.minio_public_url,
    )
    .await;

    // REST handlers emit through `io`, so it lives in the state
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState {
        db,
        config,
        redis,
        storage,
        io: io.clone(),
        metrics_handle,
    });

    io.ns("/", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                realtime::handlers::on_connect_with_state(socket, state).await;
            }
        }
    });

    let app = build_router(state).layer(sio_layer);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "tastebud-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
