//! Anicast - airing anime schedule service
//!
//! Serves cached Bangumi catalog queries over HTTP and runs the daily poster,
//! cleanup and push jobs.

use anicast_server::catalog::Catalog;
use anicast_server::config::Config;
use anicast_server::error::Result;
use anicast_server::jobs::{CleanupJob, PosterJob, PushJob, CLEANUP_JOB, POSTER_JOB, PUSH_JOB};
use anicast_server::poster::PosterService;
use anicast_server::push::WebhookNotifier;
use anicast_server::render::{HttpRenderer, Renderer};
use anicast_server::server::{start_server, ServerState};
use artifact_cache::ArtifactCache;
use bangumi_api::BangumiClient;
use catalog_clock::{Clock, SystemClock};
use catalog_filter::Blacklist;
use category_cache::CategoryCache;
use daily_scheduler::Scheduler;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("anicast_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Anicast server...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Data directory: {}", config.data_dir.display());
    info!("Bangumi API: {}", config.bangumi.base_url);

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let blacklist = Arc::new(Blacklist::load_or_init(
        config.blacklist_path(),
        config.filter_seed.clone(),
    )?);
    let upstream = Arc::new(BangumiClient::new(config.bangumi.clone())?);
    let catalog = Arc::new(Catalog::new(
        CategoryCache::with_clock(config.cache.clone(), Arc::clone(&clock)),
        upstream,
        blacklist,
    ));

    let artifacts = Arc::new(ArtifactCache::with_clock(
        config.artifacts_dir(),
        Arc::clone(&clock),
    ));
    artifacts.init().await?;

    let renderer: Option<Arc<dyn Renderer>> = match &config.render {
        Some(render) => {
            info!("Renderer: {}", render.url);
            Some(Arc::new(HttpRenderer::new(render.url.clone(), render.timeout)?))
        }
        None => {
            info!("No RENDER_URL configured, posters degrade to text");
            None
        }
    };
    let posters = Arc::new(PosterService::new(
        Arc::clone(&catalog),
        Arc::clone(&artifacts),
        renderer,
        Arc::clone(&clock),
        config.scheduler.utc_offset,
    ));

    let scheduler = Scheduler::with_clock(config.scheduler.clone(), Arc::clone(&clock))?;
    scheduler.register(
        POSTER_JOB,
        config.poster_time,
        Arc::new(PosterJob {
            posters: Arc::clone(&posters),
        }),
    )?;
    scheduler.register(
        CLEANUP_JOB,
        config.cleanup_time,
        Arc::new(CleanupJob {
            artifacts: Arc::clone(&artifacts),
            catalog: Arc::clone(&catalog),
            max_age_days: config.artifact_max_age_days,
        }),
    )?;
    if config.push.enabled {
        if let Some(url) = &config.push.webhook_url {
            scheduler.register(
                PUSH_JOB,
                config.push_time,
                Arc::new(PushJob {
                    catalog: Arc::clone(&catalog),
                    notifier: Arc::new(WebhookNotifier::new(url.clone())?),
                    chat_ids: config.push.chat_ids.clone(),
                    clock: Arc::clone(&clock),
                    utc_offset: config.scheduler.utc_offset,
                }),
            )?;
            info!("Push enabled for {} chats", config.push.chat_ids.len());
        }
    }

    // Spawn the scheduler clock loop
    let shutdown = Arc::new(Notify::new());
    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    let state = Arc::new(ServerState::new(
        catalog,
        artifacts,
        posters,
        scheduler,
        clock,
    ));

    tokio::select! {
        result = start_server(state, config.port) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    shutdown.notify_one();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task failed: {}", e);
    }

    Ok(())
}
