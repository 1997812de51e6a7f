use anyhow::{Context, Result};
use std::{io::ErrorKind, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;
use video_store::{
    config::{AppConfig, StorageBackend},
    db,
    services::{
        local_store::LocalObjectStore, media_probe::FfprobeProber, object_store::ObjectStore,
        remux::FfmpegRemuxer, s3_store::S3ObjectStore, upload_pipeline::PipelineSettings,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-store with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }
    db::run_migrations(&db).await?;

    // --- Ensure the staging directory exists ---
    fs::create_dir_all(&cfg.staging_dir)
        .await
        .with_context(|| format!("creating staging directory {}", cfg.staging_dir.display()))?;

    // --- Object store ---
    let mut local = None;
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        StorageBackend::Local => {
            fs::create_dir_all(&cfg.storage_dir).await.with_context(|| {
                format!("creating storage directory {}", cfg.storage_dir.display())
            })?;
            let store = Arc::new(LocalObjectStore::new(
                db.clone(),
                cfg.storage_dir.clone(),
                cfg.public_base_url.clone(),
                cfg.url_signing_secret.as_bytes(),
            ));
            local = Some(store.clone());
            store
        }
        StorageBackend::S3 => Arc::new(
            S3ObjectStore::connect(&cfg.region, cfg.s3_endpoint.as_deref(), &cfg.bucket).await,
        ),
    };

    // --- Initialize core services ---
    let settings = PipelineSettings {
        bucket: cfg.bucket.clone(),
        staging_dir: cfg.staging_dir.clone(),
        max_upload_bytes: cfg.max_upload_bytes,
        jwt_secret: cfg.jwt_secret.clone(),
    };
    let mut state = AppState::new(
        db,
        store,
        Arc::new(FfprobeProber::new(cfg.ffprobe_path.clone(), cfg.tool_timeout)),
        Arc::new(FfmpegRemuxer::new(cfg.ffmpeg_path.clone(), cfg.tool_timeout)),
        settings,
        cfg.presign_ttl,
    );
    if let Some(local) = local {
        state = state.with_local_store(local);
    }

    // --- Build router ---
    let app = video_store::app(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
