pub mod audit;
pub mod clock;
pub mod config;
pub mod content;
pub mod debrid;
pub mod library;
pub mod media;
pub mod metrics;
pub mod notifications;
pub mod processor;
pub mod queues;
pub mod scheduler;
pub mod scraper;
pub mod testing;
pub mod tracking;

pub use audit::{AuditEvent, AuditHandle, AuditStore, AuditWriter, SqliteAuditStore};
pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use content::{create_content_sources, ingest_wanted, ContentSource, WantedEntry};
pub use debrid::{DebridError, DebridProvider, RealDebridProvider};
pub use library::{FsLibrary, LibraryManager};
pub use media::{ItemState, MediaError, MediaFilter, MediaItem, MediaStore, SqliteMediaStore};
pub use notifications::{NotificationBuffer, NotificationCategory, NotificationStore};
pub use processor::TorrentProcessor;
pub use queues::{QueueDeps, QueueError, QueueManager};
pub use scheduler::{PauseController, PauseKind, ProgramRunner, RunnerStatus, SchedulerError};
pub use scraper::{ScrapeResult, Scraper, ScraperSet};
pub use tracking::{SqliteTrackingStore, TrackingStore};
