//! Startup settings: where the config lives and which environment
//! variables override it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use debridarr_core::{load_config, validate_config, Config};

/// Config file path.
pub const CONFIG_ENV: &str = "USER_CONFIG";
/// Writable state directory.
pub const DB_CONTENT_ENV: &str = "USER_DB_CONTENT";
/// Mesh cache service URL; enables the cache when set.
pub const PHALANX_URL_ENV: &str = "CLI_DEBRID_PHALANX_URL";
pub const PHALANX_PORT_ENV: &str = "CLI_DEBRID_PHALANX_PORT";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Resolve the config file path from the environment.
pub fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(CONFIG_ENV)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Apply the process-level overrides on top of the loaded file.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(dir) = lookup(DB_CONTENT_ENV).filter(|v| !v.trim().is_empty()) {
        config.database.state_dir = PathBuf::from(dir);
    }

    if let Some(url) = lookup(PHALANX_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.phalanx.url = url;
        config.phalanx.enabled = true;
    }

    if let Some(raw) = lookup(PHALANX_PORT_ENV).filter(|v| !v.trim().is_empty()) {
        let port: u16 = raw
            .trim()
            .parse()
            .with_context(|| format!("{} is not a valid port: {:?}", PHALANX_PORT_ENV, raw))?;
        if port == 0 {
            bail!("{} must not be 0", PHALANX_PORT_ENV);
        }
        config.phalanx.port = port;
    }

    Ok(())
}

/// Load, override and validate the configuration from the process environment.
///
/// Runs before logging is set up, so failures are reported by the caller.
pub fn load_settings() -> Result<Config> {
    let env = |key: &str| std::env::var(key).ok();
    let path = config_path(env);

    let mut config =
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?;
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).context("Configuration validation failed")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use debridarr_core::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str("[debrid]\napi_key = \"k\"\n").unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_path_defaults_to_local_file() {
        assert_eq!(config_path(lookup(&[])), PathBuf::from("config.toml"));
        assert_eq!(
            config_path(lookup(&[(CONFIG_ENV, "/etc/debridarr.toml")])),
            PathBuf::from("/etc/debridarr.toml")
        );
    }

    #[test]
    fn test_state_dir_override() {
        let mut config = base_config();
        apply_env_overrides(&mut config, lookup(&[(DB_CONTENT_ENV, "/data/state")])).unwrap();
        assert_eq!(config.database.state_dir, PathBuf::from("/data/state"));
        assert_eq!(
            config.database.db_path(),
            PathBuf::from("/data/state/media.db")
        );
    }

    #[test]
    fn test_phalanx_override_enables_cache() {
        let mut config = base_config();
        assert!(!config.phalanx.enabled);

        apply_env_overrides(
            &mut config,
            lookup(&[
                (PHALANX_URL_ENV, "http://mesh.local"),
                (PHALANX_PORT_ENV, "8888"),
            ]),
        )
        .unwrap();

        assert!(config.phalanx.enabled);
        assert_eq!(config.phalanx.url, "http://mesh.local");
        assert_eq!(config.phalanx.port, 8888);
    }

    #[test]
    fn test_invalid_phalanx_port_is_rejected() {
        let mut config = base_config();
        assert!(apply_env_overrides(&mut config, lookup(&[(PHALANX_PORT_ENV, "eighty")])).is_err());
        assert!(apply_env_overrides(&mut config, lookup(&[(PHALANX_PORT_ENV, "0")])).is_err());
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut config = base_config();
        let before = config.database.state_dir.clone();
        apply_env_overrides(&mut config, lookup(&[(DB_CONTENT_ENV, "  ")])).unwrap();
        assert_eq!(config.database.state_dir, before);
    }
}
