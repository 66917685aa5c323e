use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

use super::versions::VersionConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub debrid: DebridConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub phalanx: PhalanxConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub queues: QueuesConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub content_sources: Vec<ContentSourceConfig>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub overseerr: Vec<OverseerrConfig>,
    /// Deprecated. Parsed and reported, drives nothing.
    #[serde(default)]
    pub sync_deletions: bool,
}

impl Config {
    /// Look up a version by name.
    pub fn version(&self, name: &str) -> Option<&VersionConfig> {
        self.versions.get(name)
    }

    /// Wake limit for a version, falling back to the global limit.
    pub fn wake_limit_for(&self, version: Option<&str>) -> u32 {
        version
            .and_then(|v| self.versions.get(v))
            .and_then(|v| v.wake_count)
            .unwrap_or(self.queues.wake_limit)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Location of persisted state. `USER_DB_CONTENT` overrides `state_dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl DatabaseConfig {
    pub fn db_path(&self) -> PathBuf {
        self.state_dir.join("media.db")
    }

    pub fn queue_timing_path(&self) -> PathBuf {
        self.state_dir.join("queue_timing_data.json")
    }

    pub fn library_size_path(&self) -> PathBuf {
        self.state_dir.join("library_size_cache.json")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("db_content")
}

/// Supported debrid services
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebridProviderKind {
    #[default]
    RealDebrid,
}

/// Debrid provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridConfig {
    #[serde(default)]
    pub provider: DebridProviderKind,
    pub api_key: String,
    #[serde(default = "default_debrid_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connectivity_timeout")]
    pub connectivity_timeout_secs: u64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Fraction of the provider-reported download limit that is actually used.
    #[serde(default = "default_download_limit_ratio")]
    pub download_limit_ratio: f64,
    /// Upper bound for waiting on a freshly added torrent to start.
    #[serde(default = "default_add_poll_timeout")]
    pub add_poll_timeout_secs: u64,
    #[serde(default = "default_add_poll_interval_ms")]
    pub add_poll_interval_ms: u64,
}

fn default_debrid_base_url() -> String {
    "https://api.real-debrid.com/rest/1.0".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connectivity_timeout() -> u64 {
    15
}

fn default_download_limit_ratio() -> f64 {
    0.75
}

fn default_add_poll_timeout() -> u64 {
    30
}

fn default_add_poll_interval_ms() -> u64 {
    1000
}

/// Per-service request gate knobs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: f64,
    #[serde(default = "default_widen_factor")]
    pub widen_factor: f64,
    #[serde(default = "default_shrink_factor")]
    pub shrink_factor: f64,
}

fn default_min_interval() -> f64 {
    0.5
}

fn default_max_interval() -> f64 {
    5.0
}

fn default_widen_factor() -> f64 {
    2.0
}

fn default_shrink_factor() -> f64 {
    0.95
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
            widen_factor: default_widen_factor(),
            shrink_factor: default_shrink_factor(),
        }
    }
}

/// Retry wrapper knobs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    4.0
}

fn default_max_delay() -> f64 {
    10.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

/// Optional mesh-cache store shared between instances.
///
/// `CLI_DEBRID_PHALANX_URL` / `CLI_DEBRID_PHALANX_PORT` override these at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhalanxConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_phalanx_url")]
    pub url: String,
    #[serde(default = "default_phalanx_port")]
    pub port: u16,
}

fn default_phalanx_url() -> String {
    "http://localhost".to_string()
}

fn default_phalanx_port() -> u16 {
    8888
}

impl Default for PhalanxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_phalanx_url(),
            port: default_phalanx_port(),
        }
    }
}

/// Scheduler cadence, pause window and load regulation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_main_loop_sleep")]
    pub main_loop_sleep_secs: f64,
    #[serde(default)]
    pub item_process_delay_secs: f64,
    #[serde(default)]
    pub intervals: TaskIntervals,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    #[serde(default)]
    pub pause_schedule: PauseScheduleConfig,
    #[serde(default)]
    pub regulation: RegulationConfig,
}

fn default_main_loop_sleep() -> f64 {
    1.0
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            main_loop_sleep_secs: default_main_loop_sleep(),
            item_process_delay_secs: 0.0,
            intervals: TaskIntervals::default(),
            shutdown_grace_secs: default_shutdown_grace(),
            pause_schedule: PauseScheduleConfig::default(),
            regulation: RegulationConfig::default(),
        }
    }
}

/// Task cadences in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskIntervals {
    #[serde(default = "default_wanted_interval")]
    pub wanted: u64,
    #[serde(default = "default_fast_interval")]
    pub scraping: u64,
    #[serde(default = "default_fast_interval")]
    pub adding: u64,
    #[serde(default = "default_checking_interval")]
    pub checking: u64,
    #[serde(default = "default_sleeping_interval")]
    pub sleeping: u64,
    #[serde(default = "default_hourly")]
    pub upgrading: u64,
    #[serde(default = "default_hourly")]
    pub unreleased: u64,
    #[serde(default = "default_hourly")]
    pub pre_release: u64,
    #[serde(default = "default_final_check_interval")]
    pub final_check: u64,
    #[serde(default = "default_hourly")]
    pub blacklisted: u64,
    #[serde(default = "default_pending_uncached_interval")]
    pub pending_uncached: u64,
    #[serde(default = "default_timing_save_interval")]
    pub timing_save: u64,
    #[serde(default = "default_sleeping_interval")]
    pub content_sources: u64,
    #[serde(default = "default_hourly")]
    pub drift_check: u64,
    #[serde(default = "default_library_size_interval")]
    pub library_size: u64,
}

fn default_wanted_interval() -> u64 {
    300
}

fn default_fast_interval() -> u64 {
    5
}

fn default_checking_interval() -> u64 {
    10
}

fn default_sleeping_interval() -> u64 {
    60
}

fn default_hourly() -> u64 {
    3600
}

fn default_final_check_interval() -> u64 {
    900
}

fn default_pending_uncached_interval() -> u64 {
    300
}

fn default_timing_save_interval() -> u64 {
    300
}

fn default_library_size_interval() -> u64 {
    43200
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            wanted: default_wanted_interval(),
            scraping: default_fast_interval(),
            adding: default_fast_interval(),
            checking: default_checking_interval(),
            sleeping: default_sleeping_interval(),
            upgrading: default_hourly(),
            unreleased: default_hourly(),
            pre_release: default_hourly(),
            final_check: default_final_check_interval(),
            blacklisted: default_hourly(),
            pending_uncached: default_pending_uncached_interval(),
            timing_save: default_timing_save_interval(),
            content_sources: default_sleeping_interval(),
            drift_check: default_hourly(),
            library_size: default_library_size_interval(),
        }
    }
}

/// Daily window during which queue processing is skipped.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PauseScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "HH:MM"
    #[serde(default)]
    pub start: String,
    /// "HH:MM"; an end before the start wraps past midnight.
    #[serde(default)]
    pub end: String,
    /// Fixed offset like "+02:00". Unset means the host's local timezone.
    #[serde(default)]
    pub utc_offset: Option<String>,
}

/// Auto-throttle thresholds (percent) and steps (seconds).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegulationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_load_threshold")]
    pub cpu_threshold: f32,
    #[serde(default = "default_load_threshold")]
    pub memory_threshold: f32,
    #[serde(default = "default_increase_step")]
    pub increase_step_secs: f64,
    #[serde(default = "default_decrease_step")]
    pub decrease_step_secs: f64,
    #[serde(default = "default_max_regulation_sleep")]
    pub max_sleep_secs: f64,
}

fn default_true() -> bool {
    true
}

fn default_load_threshold() -> f32 {
    90.0
}

fn default_increase_step() -> f64 {
    1.0
}

fn default_decrease_step() -> f64 {
    0.5
}

fn default_max_regulation_sleep() -> f64 {
    30.0
}

impl Default for RegulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_threshold: default_load_threshold(),
            memory_threshold: default_load_threshold(),
            increase_step_secs: default_increase_step(),
            decrease_step_secs: default_decrease_step(),
            max_sleep_secs: default_max_regulation_sleep(),
        }
    }
}

/// Queue behaviour knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueuesConfig {
    #[serde(default = "default_wake_limit")]
    pub wake_limit: u32,
    #[serde(default = "default_sleep_duration")]
    pub sleep_duration_minutes: u64,
    #[serde(default = "default_checking_timeout")]
    pub checking_timeout_minutes: u64,
    #[serde(default = "default_final_check_delay")]
    pub final_check_delay_hours: u64,
    #[serde(default = "default_pre_release_window")]
    pub pre_release_window_days: i64,
    #[serde(default = "default_movie_airtime_offset")]
    pub movie_airtime_offset_hours: f64,
    #[serde(default)]
    pub episode_airtime_offset_hours: f64,
    #[serde(default = "default_airtime")]
    pub default_airtime: NaiveTime,
    #[serde(default)]
    pub use_alternate_scrape_time_strategy: bool,
    #[serde(default = "default_alternate_scrape_time")]
    pub alternate_scrape_time: NaiveTime,
    #[serde(default)]
    pub wanted_throttle: WantedThrottleConfig,
    #[serde(default)]
    pub enable_reverse_order_scraping: bool,
    /// Content-source names in priority order; overrides release-date ordering.
    #[serde(default)]
    pub content_source_priority: Vec<String>,
    /// Days after which blacklisted items return to Wanted. 0 disables.
    #[serde(default)]
    pub auto_unblacklist_days: u32,
    /// Items blacklisted before this date are never auto-unblacklisted.
    #[serde(default)]
    pub auto_unblacklist_cutoff: Option<NaiveDate>,
    #[serde(default = "default_upgrade_window")]
    pub upgrade_window_hours: u64,
    #[serde(default = "default_upgrade_threshold")]
    pub upgrading_percentage_threshold: f64,
    #[serde(default)]
    pub sort_by_uncached_status: bool,
}

fn default_wake_limit() -> u32 {
    24
}

fn default_sleep_duration() -> u64 {
    30
}

fn default_checking_timeout() -> u64 {
    180
}

fn default_final_check_delay() -> u64 {
    6
}

fn default_pre_release_window() -> i64 {
    7
}

fn default_movie_airtime_offset() -> f64 {
    19.0
}

fn default_airtime() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default()
}

fn default_alternate_scrape_time() -> NaiveTime {
    NaiveTime::MIN
}

fn default_upgrade_window() -> u64 {
    24
}

fn default_upgrade_threshold() -> f64 {
    0.1
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            wake_limit: default_wake_limit(),
            sleep_duration_minutes: default_sleep_duration(),
            checking_timeout_minutes: default_checking_timeout(),
            final_check_delay_hours: default_final_check_delay(),
            pre_release_window_days: default_pre_release_window(),
            movie_airtime_offset_hours: default_movie_airtime_offset(),
            episode_airtime_offset_hours: 0.0,
            default_airtime: default_airtime(),
            use_alternate_scrape_time_strategy: false,
            alternate_scrape_time: default_alternate_scrape_time(),
            wanted_throttle: WantedThrottleConfig::default(),
            enable_reverse_order_scraping: false,
            content_source_priority: Vec::new(),
            auto_unblacklist_days: 0,
            auto_unblacklist_cutoff: None,
            upgrade_window_hours: default_upgrade_window(),
            upgrading_percentage_threshold: default_upgrade_threshold(),
            sort_by_uncached_status: false,
        }
    }
}

/// Caps how many Wanted items may enter Scraping per tick.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WantedThrottleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scraping_cap")]
    pub scraping_cap: usize,
}

fn default_scraping_cap() -> usize {
    5
}

impl Default for WantedThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scraping_cap: default_scraping_cap(),
        }
    }
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapingConfig {
    #[serde(default = "default_max_concurrent_scrapers")]
    pub max_concurrent_scrapers: usize,
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
}

fn default_max_concurrent_scrapers() -> usize {
    4
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scrapers: default_max_concurrent_scrapers(),
            jackett: None,
        }
    }
}

/// Jackett scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    pub api_key: String,
    /// Indexer ids to query; empty means the aggregate "all" indexer.
    #[serde(default)]
    pub indexers: Vec<String>,
    #[serde(default = "default_jackett_timeout")]
    pub timeout_secs: u32,
}

fn default_jackett_timeout() -> u32 {
    30
}

/// Library roots searched for collected files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_search_depth")]
    pub max_search_depth: usize,
}

fn default_search_depth() -> usize {
    3
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_search_depth: default_search_depth(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentSourceKind {
    JsonFile,
}

/// A wanted-list producer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentSourceConfig {
    pub name: String,
    pub kind: ContentSourceKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Versions each yielded entry is wanted in (unless the entry names its own).
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default = "default_check_period")]
    pub check_period_minutes: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_check_period() -> u64 {
    60
}

/// Notification buffering and targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_short_timeout")]
    pub short_timeout_secs: u64,
    #[serde(default = "default_safety_timeout")]
    pub safety_timeout_secs: u64,
    /// Episode groups larger than this collapse to "first + N others". 0 disables.
    #[serde(default = "default_condense_threshold")]
    pub condense_threshold: usize,
    #[serde(default = "default_overseerr_delay")]
    pub overseerr_delay_secs: u64,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub targets: Vec<NotificationTargetConfig>,
}

fn default_short_timeout() -> u64 {
    10
}

fn default_safety_timeout() -> u64 {
    60
}

fn default_condense_threshold() -> usize {
    5
}

fn default_overseerr_delay() -> u64 {
    30
}

fn default_notify_timeout() -> u64 {
    15
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            short_timeout_secs: default_short_timeout(),
            safety_timeout_secs: default_safety_timeout(),
            condense_threshold: default_condense_threshold(),
            overseerr_delay_secs: default_overseerr_delay(),
            timeout_secs: default_notify_timeout(),
            targets: Vec::new(),
        }
    }
}

/// Available notification transports
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Discord,
    Email,
    Telegram,
    Ntfy,
}

impl NotifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierKind::Discord => "discord",
            NotifierKind::Email => "email",
            NotifierKind::Telegram => "telegram",
            NotifierKind::Ntfy => "ntfy",
        }
    }
}

/// One outbound notification channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationTargetConfig {
    pub name: String,
    pub kind: NotifierKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-state / per-category switches. Missing keys use the category default.
    #[serde(default)]
    pub notify_on: BTreeMap<String, bool>,
    /// Content sources this target reports on. Empty means all.
    #[serde(default)]
    pub content_sources: Vec<String>,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub ntfy: Option<NtfyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_address: String,
    pub to_address: String,
    #[serde(default = "default_true")]
    pub use_starttls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NtfyConfig {
    #[serde(default = "default_ntfy_host")]
    pub host: String,
    pub topic: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

fn default_ntfy_host() -> String {
    "https://ntfy.sh".to_string()
}

/// An Overseerr-type instance whose "recently added" scan is triggered on collection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverseerrConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub debrid: SanitizedDebridConfig,
    pub phalanx: PhalanxConfig,
    pub scheduler: SchedulerConfig,
    pub queues: QueuesConfig,
    pub versions: BTreeMap<String, VersionConfig>,
    pub content_sources: Vec<String>,
    pub notification_targets: Vec<SanitizedTargetConfig>,
    pub overseerr: Vec<String>,
    pub jackett_configured: bool,
    pub sync_deletions: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDebridConfig {
    pub provider: DebridProviderKind,
    pub base_url: String,
    pub api_key_configured: bool,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTargetConfig {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            debrid: SanitizedDebridConfig {
                provider: config.debrid.provider,
                base_url: config.debrid.base_url.clone(),
                api_key_configured: !config.debrid.api_key.is_empty(),
                rate_limit: config.debrid.rate_limit.clone(),
                retry: config.debrid.retry.clone(),
            },
            phalanx: config.phalanx.clone(),
            scheduler: config.scheduler.clone(),
            queues: config.queues.clone(),
            versions: config.versions.clone(),
            content_sources: config
                .content_sources
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            notification_targets: config
                .notifications
                .targets
                .iter()
                .map(|t| SanitizedTargetConfig {
                    name: t.name.clone(),
                    kind: t.kind.as_str().to_string(),
                    enabled: t.enabled,
                })
                .collect(),
            overseerr: config.overseerr.iter().map(|o| o.name.clone()).collect(),
            jackett_configured: config.scraping.jackett.is_some(),
            sync_deletions: config.sync_deletions,
        }
    }
}
