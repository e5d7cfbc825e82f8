use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider: "anthropic" or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Provider base URL. Defaults per provider when unset.
    pub base_url: Option<String>,
    /// Path to the Google service-account JSON key file.
    pub service_account_path: PathBuf,
    /// Directory where GA4 report exports are written.
    pub reports_dir: PathBuf,
    /// Gateway bind address.
    pub bind: String,
    /// Gateway port.
    pub port: u16,
    /// Headless browser settings.
    pub chrome: ChromeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromeConfig {
    /// Explicit Chrome/Chromium binary. Auto-detected when unset.
    pub executable: Option<PathBuf>,
    /// User agent presented by automated page loads.
    pub user_agent: String,
    /// Fixed page-load timeout in seconds.
    pub page_load_timeout_secs: u64,
    /// Extra command-line switches appended at launch.
    pub extra_args: Vec<String>,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            page_load_timeout_secs: 60,
            extra_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let settings_dir = home_dir.join(".tagwright");
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            service_account_path: settings_dir.join("service-account.json"),
            reports_dir: PathBuf::from("ga4_reports"),
            bind: "0.0.0.0".to_string(),
            port: 8080,
            chrome: ChromeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when absent.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(".tagwright").join("config.toml")
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(|| {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(".tagwright").join("config.toml")
        });

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Resolved provider base URL.
    pub fn resolved_base_url(&self) -> &str {
        if let Some(ref url) = self.base_url {
            return url;
        }
        match self.provider.as_str() {
            "anthropic" => "https://api.anthropic.com",
            "openai" => "https://api.openai.com/v1",
            _ => "http://localhost:11434/v1",
        }
    }

    /// Provider API key from the conventional environment variable.
    pub fn api_key(&self) -> Option<String> {
        let var = match self.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => "LLM_API_KEY",
        };
        std::env::var(var).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.chrome.page_load_timeout_secs, 60);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.model = "claude-opus-4-20250514".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = Config::load(Some(path)).unwrap();
        assert_eq!(loaded.model, "claude-opus-4-20250514");
        assert_eq!(loaded.bind, "0.0.0.0");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let loaded = Config::load(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(loaded.provider, "anthropic");
    }

    #[test]
    fn test_resolved_base_url() {
        let mut config = Config::default();
        assert_eq!(config.resolved_base_url(), "https://api.anthropic.com");
        config.base_url = Some("http://localhost:1234/v1".to_string());
        assert_eq!(config.resolved_base_url(), "http://localhost:1234/v1");
    }
}
