use std::collections::HashSet;

use chrono::NaiveTime;

use super::{types::Config, ConfigError, NotifierKind};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Debrid API key and rate-limit bounds
/// - Pause window times
/// - Version references and fallback chains
/// - Notification targets carry the settings for their kind
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.debrid.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "debrid.api_key cannot be empty".to_string(),
        ));
    }

    let rate = &config.debrid.rate_limit;
    if rate.min_interval_secs <= 0.0 || rate.max_interval_secs < rate.min_interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "debrid.rate_limit: need 0 < min_interval_secs ({}) <= max_interval_secs ({})",
            rate.min_interval_secs, rate.max_interval_secs
        )));
    }

    if config.debrid.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "debrid.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    let schedule = &config.scheduler.pause_schedule;
    if schedule.enabled {
        for (field, value) in [("start", &schedule.start), ("end", &schedule.end)] {
            if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "scheduler.pause_schedule.{} must be HH:MM, got {:?}",
                    field, value
                )));
            }
        }
    }

    for source in &config.content_sources {
        for version in &source.versions {
            if !config.versions.contains_key(version) {
                return Err(ConfigError::ValidationError(format!(
                    "content source {:?} references unknown version {:?}",
                    source.name, version
                )));
            }
        }
    }

    for (name, version) in &config.versions {
        let mut seen = HashSet::new();
        seen.insert(name.as_str());
        let mut next = version.fallback_version.as_deref();
        while let Some(fallback) = next {
            let Some(target) = config.versions.get(fallback) else {
                return Err(ConfigError::ValidationError(format!(
                    "version {:?} falls back to unknown version {:?}",
                    name, fallback
                )));
            };
            if !seen.insert(fallback) {
                return Err(ConfigError::ValidationError(format!(
                    "version {:?} has a fallback cycle through {:?}",
                    name, fallback
                )));
            }
            next = target.fallback_version.as_deref();
        }
    }

    for target in &config.notifications.targets {
        let configured = match target.kind {
            NotifierKind::Discord => target.discord.is_some(),
            NotifierKind::Email => target.email.is_some(),
            NotifierKind::Telegram => target.telegram.is_some(),
            NotifierKind::Ntfy => target.ntfy.is_some(),
        };
        if !configured {
            return Err(ConfigError::ValidationError(format!(
                "notification target {:?} is {} but has no [{}] settings",
                target.name,
                target.kind.as_str(),
                target.kind.as_str()
            )));
        }
    }

    Ok(())
}
