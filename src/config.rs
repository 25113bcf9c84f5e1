use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::llm::{ProviderKind, ProviderSettings};

pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_DATASET_PATH: &str = "titanic.csv";
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

const CONFIG_DIR_NAME: &str = "titanic-chat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub dataset_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    provider: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f64>,
    dataset_path: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    request_timeout_ms: Option<u64>,
}

impl AppConfig {
    /// Environment beats the config file, which beats the defaults. An
    /// explicit `path` must exist; the discovered path may be absent.
    pub fn load_with_path(path: Option<&Path>) -> Result<Self> {
        let (config_path, file_config) = match path {
            Some(path) => {
                let file = load_file_config(path)?.ok_or_else(|| {
                    anyhow!(
                        "Failed to load config {}: file does not exist",
                        path.display()
                    )
                })?;
                (path.to_path_buf(), file)
            }
            None => {
                let path = discover_config_path()?;
                let file = load_file_config(&path)?.unwrap_or_default();
                (path, file)
            }
        };

        dotenvy::dotenv().ok();

        Self::resolve(config_path, file_config)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            temperature: self.temperature,
        }
    }

    fn resolve(config_path: PathBuf, file: RawFileConfig) -> Result<Self> {
        let provider = match env_non_empty("LLM_PROVIDER") {
            Some(value) => ProviderKind::from_str(&value)
                .map_err(|reason| env_error("LLM_PROVIDER", &reason))?,
            None => match file.provider.as_deref().and_then(non_empty) {
                Some(value) => ProviderKind::from_str(value)
                    .map_err(|reason| config_error(&config_path, "provider", &reason))?,
                None => ProviderKind::default(),
            },
        };
        let prefix = provider.env_prefix();

        let api_key =
            env_non_empty(&format!("{prefix}_API_KEY")).or_else(|| file_string(&file.api_key));
        let model = env_non_empty(&format!("{prefix}_MODEL"))
            .or_else(|| file_string(&file.model))
            .unwrap_or_else(|| provider.default_model().to_string());
        let base_url = env_non_empty(&format!("{prefix}_BASE_URL"))
            .or_else(|| file_string(&file.base_url))
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let temperature = match env_non_empty("LLM_TEMPERATURE") {
            Some(value) => {
                let parsed = value
                    .parse::<f64>()
                    .map_err(|err| env_error("LLM_TEMPERATURE", &err.to_string()))?;
                validate_temperature(parsed).map_err(|reason| env_error("LLM_TEMPERATURE", &reason))?
            }
            None => match file.temperature {
                Some(value) => validate_temperature(value)
                    .map_err(|reason| config_error(&config_path, "temperature", &reason))?,
                None => DEFAULT_TEMPERATURE,
            },
        };

        let dataset_path = env_non_empty("TITANIC_CSV_PATH")
            .or_else(|| file_string(&file.dataset_path))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));

        let host = match env_non_empty("BACKEND_HOST") {
            Some(value) => parse_host(&value).map_err(|reason| env_error("BACKEND_HOST", &reason))?,
            None => match file_string(&file.host) {
                Some(value) => parse_host(&value)
                    .map_err(|reason| config_error(&config_path, "host", &reason))?,
                None => DEFAULT_HOST,
            },
        };

        let port = match env_non_empty("BACKEND_PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|err| env_error("BACKEND_PORT", &err.to_string()))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let request_timeout_ms = match env_non_empty("REQUEST_TIMEOUT_MS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|err| env_error("REQUEST_TIMEOUT_MS", &err.to_string()))?,
            None => file.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        };
        if request_timeout_ms == 0 {
            bail!(
                "Failed to load config {}: request_timeout_ms: must be greater than zero",
                config_path.display()
            );
        }

        Ok(Self {
            config_path,
            provider,
            api_key,
            model,
            base_url,
            temperature,
            dataset_path,
            host,
            port,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        anyhow!("Failed to resolve config path: HOME directory is unavailable")
    })?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn validate_temperature(value: f64) -> std::result::Result<f64, String> {
    if value.is_finite() && (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0 and 2, got {value}"))
    }
}

fn parse_host(value: &str) -> std::result::Result<IpAddr, String> {
    if value.eq_ignore_ascii_case("localhost") {
        return Ok(DEFAULT_HOST);
    }
    value
        .parse::<IpAddr>()
        .map_err(|_| format!("invalid IP address '{value}'"))
}

fn file_string(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty).map(ToOwned::to_owned)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

fn env_error(key: &str, reason: &str) -> anyhow::Error {
    anyhow!("Failed to load config from environment: {key}: {reason}")
}
