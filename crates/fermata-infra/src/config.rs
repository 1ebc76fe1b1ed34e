//! Global configuration loader for Fermata.
//!
//! Reads `config.toml` from the data directory (`~/.fermata/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Process-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Public base URL used to build approve/resume links.
    pub base_url: String,
    /// Database URL override. Defaults to `{data_dir}/fermata.db`.
    pub database_url: Option<String>,
    /// How often the schedule sweeper checks for due pauses, in seconds.
    pub schedule_sweep_interval_secs: u64,
    /// HTTP listen address.
    pub listen_addr: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3100".to_string(),
            database_url: None,
            schedule_sweep_interval_secs: 10,
            listen_addr: "127.0.0.1:3100".to_string(),
        }
    }
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Default data directory: `FERMATA_DATA_DIR` or `~/.fermata`.
pub fn default_data_dir() -> std::path::PathBuf {
    match std::env::var("FERMATA_DATA_DIR") {
        Ok(dir) => std::path::PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            std::path::PathBuf::from(home).join(".fermata")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.base_url, "http://localhost:3100");
        assert_eq!(config.schedule_sweep_interval_secs, 10);
    }

    #[tokio::test]
    async fn valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
base_url = "https://flows.example.com"
schedule_sweep_interval_secs = 30
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.base_url, "https://flows.example.com");
        assert_eq!(config.schedule_sweep_interval_secs, 30);
        // Unspecified fields keep their defaults.
        assert_eq!(config.listen_addr, "127.0.0.1:3100");
    }

    #[tokio::test]
    async fn malformed_toml_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "base_url = [not toml")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.base_url, "http://localhost:3100");
    }
}
