use anyhow::{bail, Context};
use directories::BaseDirs;
use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::warn;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OllamaFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub models_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub chat_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: Option<String>,
    pub connect_timeout: Duration,
    pub models_timeout: Duration,
    pub probe_timeout: Duration,
    pub chat_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: None,
            connect_timeout: Duration::from_secs(10),
            models_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            chat_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl OllamaConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        let mut cfg = OllamaConfig::default();

        if let Some(path) = Self::config_path() {
            if path.exists() {
                match fs::read_to_string(&path) {
                    Ok(text) => cfg.apply_file_text(&text, &path.display().to_string()),
                    Err(e) => {
                        warn!(target:"providers::ollama","cannot read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        if let Ok(host) = env::var("OLLAMA_HOST") {
            cfg.base_url = normalize_base_url(&host).context("OLLAMA_HOST")?;
        }
        if let Ok(model) = env::var("OLAMA_MODEL") {
            if !model.trim().is_empty() {
                cfg.model = Some(model.trim().to_string());
            }
        }

        Ok(cfg)
    }

    /// Parses a config file body and merges it. Problems are logged and the
    /// affected values keep their previous settings.
    fn apply_file_text(&mut self, text: &str, origin: &str) {
        match toml::from_str::<OllamaFileConfig>(text) {
            Ok(file_cfg) => {
                if let Err(e) = self.merge_file(file_cfg) {
                    warn!(target:"providers::ollama","ignoring base_url in {}: {:#}", origin, e);
                }
            }
            Err(e) => {
                warn!(target:"providers::ollama","ignoring malformed config {}: {}", origin, e)
            }
        }
    }

    /// Applies every value from `file_cfg`. An invalid `base_url` is reported
    /// after the other values are in place and leaves the current URL alone.
    pub fn merge_file(&mut self, file_cfg: OllamaFileConfig) -> anyhow::Result<()> {
        if let Some(m) = file_cfg.model {
            self.model = Some(m);
        }
        if let Some(t) = file_cfg.connect_timeout_ms {
            self.connect_timeout = Duration::from_millis(t);
        }
        if let Some(t) = file_cfg.models_timeout_ms {
            self.models_timeout = Duration::from_millis(t);
        }
        if let Some(t) = file_cfg.probe_timeout_ms {
            self.probe_timeout = Duration::from_millis(t);
        }
        if let Some(t) = file_cfg.chat_timeout_ms {
            self.chat_timeout = Duration::from_millis(t);
        }
        if let Some(u) = file_cfg.base_url {
            self.base_url = normalize_base_url(&u).context("config base_url")?;
        }
        Ok(())
    }

    pub fn with_base_url(mut self, raw: &str) -> anyhow::Result<Self> {
        self.base_url = normalize_base_url(raw)?;
        Ok(self)
    }

    fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let p = if cfg!(target_os = "windows") {
            base.home_dir().join(".olama").join("config.toml")
        } else {
            base.config_dir().join("olama").join("config.toml")
        };
        Some(p)
    }
}

/// Cleans up a user supplied endpoint: `host:port` gains `http://` and
/// trailing slashes are removed so paths can be appended with `format!`.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("base URL cannot be empty");
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let parsed = Url::parse(&with_scheme).with_context(|| format!("invalid base URL: {trimmed}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported scheme in base URL: {}", parsed.scheme());
    }
    if parsed.host_str().is_none() {
        bail!("base URL has no host: {trimmed}");
    }
    Ok(with_scheme.trim_end_matches('/').to_string())
}
