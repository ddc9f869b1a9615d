use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4500;
const DEFAULT_SLOW_QUERY_MS: u64 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST API port (default: 4500).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,missiond=trace" (default: "info").
    log: Option<String>,
    /// Bind address for the REST server (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    slow_query_threshold_ms: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Bind address for the REST server (MISSIOND_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Slow-query log threshold in milliseconds (0 = disabled).
    pub slow_query_threshold_ms: u64,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("MISSIOND_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("MISSIOND_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let slow_query_threshold_ms = toml
            .slow_query_threshold_ms
            .unwrap_or(DEFAULT_SLOW_QUERY_MS);

        Self {
            port,
            data_dir,
            log,
            bind_address,
            log_format,
            slow_query_threshold_ms,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/missiond
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("missiond");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/missiond or ~/.local/share/missiond
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("missiond");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("missiond");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\missiond
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("missiond");
        }
    }
    // Fallback
    PathBuf::from(".missiond")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log, "info");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.slow_query_threshold_ms, DEFAULT_SLOW_QUERY_MS);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 9000\nlog = \"debug\"\n",
        )
        .unwrap();
        let config = DaemonConfig::new(
            Some(9100),
            Some(dir.path().to_path_buf()),
            None,
            None,
        );
        // CLI beats TOML for port; TOML beats default for log
        assert_eq!(config.port, 9100);
        assert_eq!(config.log, "debug");
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = \"not a number").unwrap();
        let config = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
