use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debridarr_core::audit::create_audit_system;
use debridarr_core::config::LogFormat;
use debridarr_core::debrid::{CacheCheckContext, PhalanxClient};
use debridarr_core::notifications::{
    create_notification_buffer, create_notifiers, Dispatcher, OverseerrTrigger,
    SqliteNotificationStore,
};
use debridarr_core::scheduler::{LoadRegulator, PauseWindow, SysinfoSampler};
use debridarr_core::scraper::JackettScraper;
use debridarr_core::{
    create_content_sources, AuditEvent, AuditStore, Clock, Config, DebridProvider, FsLibrary,
    MediaStore, NotificationCategory, NotificationStore, PauseController, ProgramRunner,
    QueueDeps, QueueManager, RealDebridProvider, Scraper, ScraperSet, SqliteAuditStore,
    SqliteMediaStore, SqliteTrackingStore, SystemClock, TrackingStore,
};

use debridarr_server::api::create_router;
use debridarr_server::settings::load_settings;
use debridarr_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    let config = match load_settings() {
        Ok(config) => config,
        Err(e) => {
            init_logging(LogFormat::Pretty);
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.logging.format);

    if let Err(e) = run(config).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Set up notifications first so any later startup failure can be reported.
async fn run(config: Config) -> Result<()> {
    info!("Configuration loaded successfully");

    std::fs::create_dir_all(&config.database.state_dir).with_context(|| {
        format!(
            "Failed to create state directory {:?}",
            config.database.state_dir
        )
    })?;
    info!("Database path: {:?}", config.database.db_path());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notification_store: Arc<dyn NotificationStore> = Arc::new(
        SqliteNotificationStore::new(&config.database.db_path())
            .context("Failed to create notification store")?
            .with_clock(Arc::clone(&clock)),
    );

    let overseerr = OverseerrTrigger::new(
        &config.overseerr,
        Duration::from_secs(config.notifications.overseerr_delay_secs),
        Duration::from_secs(config.notifications.timeout_secs),
    )
    .context("Failed to set up Overseerr trigger")?;
    let dispatcher = Arc::new(Dispatcher::new(
        create_notifiers(&config.notifications),
        Some(Arc::clone(&notification_store)),
        (!overseerr.is_empty()).then_some(overseerr),
        config.notifications.condense_threshold,
    ));
    info!(
        targets = dispatcher.target_count(),
        "Notification dispatcher initialized"
    );

    match serve(config, clock, Arc::clone(&dispatcher), notification_store).await {
        Ok(()) => Ok(()),
        Err(e) => {
            dispatcher
                .send_category_blocking(NotificationCategory::ProgramCrash, &format!("{:#}", e));
            Err(e)
        }
    }
}

async fn serve(
    config: Config,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher>,
    notification_store: Arc<dyn NotificationStore>,
) -> Result<()> {
    let db_path = config.database.db_path();

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let media: Arc<dyn MediaStore> = Arc::new(
        SqliteMediaStore::new(&db_path)
            .context("Failed to create media store")?
            .with_clock(Arc::clone(&clock)),
    );
    let tracking: Arc<dyn TrackingStore> = Arc::new(
        SqliteTrackingStore::new(&db_path)
            .context("Failed to create tracking store")?
            .with_clock(Arc::clone(&clock)),
    );
    let audit_store: Arc<dyn AuditStore> =
        Arc::new(SqliteAuditStore::new(&db_path).context("Failed to create audit store")?);
    info!("Stores initialized");

    // Create audit system
    let (audit_handle, audit_writer) =
        create_audit_system(Arc::clone(&audit_store), Arc::clone(&clock), AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    audit_handle
        .emit(AuditEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    let (notifications, flusher) =
        create_notification_buffer(Arc::clone(&dispatcher), &config.notifications);
    let flusher_handle = tokio::spawn(flusher.run());

    // Debrid provider
    let phalanx = PhalanxClient::from_config(&config.phalanx, "real_debrid");
    if phalanx.is_some() {
        info!(url = %config.phalanx.url, port = config.phalanx.port, "Mesh cache enabled");
    }
    let provider: Arc<dyn DebridProvider> = Arc::new(
        RealDebridProvider::new(
            &config.debrid,
            CacheCheckContext {
                phalanx,
                media: Arc::clone(&media),
                tracking: Arc::clone(&tracking),
            },
        )
        .context("Failed to create debrid provider")?,
    );
    info!("Using debrid provider: {}", provider.name());

    // Scrapers
    let mut scrapers: Vec<Arc<dyn Scraper>> = Vec::new();
    match &config.scraping.jackett {
        Some(jackett_config) => {
            info!("Initializing Jackett scraper at {}", jackett_config.url);
            scrapers.push(Arc::new(
                JackettScraper::new(jackett_config.clone())
                    .context("Failed to create Jackett scraper")?,
            ));
        }
        None => warn!("No scraper configured; items will not find releases"),
    }

    let manager = Arc::new(
        QueueManager::new(QueueDeps {
            config: Arc::new(config.clone()),
            media,
            tracking,
            provider,
            scrapers: ScraperSet::new(scrapers, config.scraping.max_concurrent_scrapers),
            library: Arc::new(FsLibrary::new(&config.library)),
            clock: Arc::clone(&clock),
            audit: Some(audit_handle.clone()),
            notifications: Some(notifications.clone()),
        })
        .context("Failed to create queue manager")?,
    );

    let rehydrated = manager
        .rehydrate()
        .await
        .context("Failed to load queue contents")?;
    info!(items = rehydrated, "Queues rehydrated");
    if let Err(e) = manager.load_timing(&config.database.queue_timing_path()) {
        warn!(error = %e, "Ignoring unreadable queue timing data");
    }

    let window = PauseWindow::from_config(&config.scheduler.pause_schedule)
        .context("Invalid pause schedule")?;
    let pause = Arc::new(PauseController::new(
        window,
        clock,
        Some(audit_handle.clone()),
        Some(notifications.clone()),
    ));
    let regulator = LoadRegulator::new(
        config.scheduler.regulation.clone(),
        Box::new(SysinfoSampler::new()),
    );
    let sources =
        create_content_sources(&config.content_sources).context("Failed to load content sources")?;
    info!(count = sources.len(), "Content sources loaded");

    let runner = Arc::new(ProgramRunner::new(
        Arc::clone(&manager),
        pause,
        regulator,
        sources,
        Some(audit_handle.clone()),
    ));
    let mut runner_handle = runner
        .start()
        .context("Program runner was already running")?;

    // Create app state and router
    let state = Arc::new(AppState::new(
        Arc::clone(&runner),
        audit_store,
        notification_store,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    notifications
        .send_category(NotificationCategory::ProgramStart, VERSION)
        .await;

    // Run until a signal arrives or the scheduler dies.
    let runner_failure = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut runner_handle => Some(match result {
            Err(e) if e.is_panic() => format!("scheduler task panicked: {}", e),
            Err(e) => format!("scheduler task failed: {}", e),
            Ok(()) => "scheduler task exited unexpectedly".to_string(),
        }),
    };

    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Server error"),
        Err(e) => error!(error = %e, "Server task failed"),
    }

    let reason = match &runner_failure {
        None => {
            info!("Server shutting down...");
            if !runner.stop(runner_handle).await {
                warn!("Program runner did not stop cleanly");
            }
            dispatcher
                .send_category(NotificationCategory::ProgramStop, "")
                .await;
            "graceful_shutdown"
        }
        Some(message) => {
            error!("{}", message);
            "crash"
        }
    };

    audit_handle
        .emit(AuditEvent::ServiceStopped {
            reason: reason.to_string(),
        })
        .await;

    // Deliver anything still buffered, then close the channels.
    notifications.flush().await;
    drop(notifications);
    drop(runner);
    drop(manager);
    drop(audit_handle);
    flusher_handle.abort();

    // Wait for writer to finish processing remaining events
    if tokio::time::timeout(Duration::from_secs(5), writer_handle)
        .await
        .is_err()
    {
        warn!("Audit writer did not finish in time");
    }
    info!("Audit writer stopped");

    match runner_failure {
        None => Ok(()),
        Some(message) => Err(anyhow::anyhow!(message)),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
