//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! Settings come from a JSON secrets file first, then environment variables, then
//! built-in defaults. The `.env` file is used for local development.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use study_kit_core::{generation::GenerationBudget, StudySettings};
use tracing::Level;

const DEFAULT_SPREADSHEET_NAME: &str = "AutoStudy Feedback";
const DEFAULT_LLM_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Could not read secrets from {0}: {1}")]
    Secrets(PathBuf, String),
}

/// The secrets store: a JSON object on disk, e.g.
/// `{"GOOGLE_API_KEY": "...", "SPREADSHEET_NAME": "...", "gcp_service_account": {...}}`.
#[derive(Debug, Default, Deserialize)]
pub struct Secrets {
    #[serde(rename = "GOOGLE_API_KEY")]
    pub google_api_key: Option<String>,
    #[serde(rename = "SPREADSHEET_NAME")]
    pub spreadsheet_name: Option<String>,
    pub gcp_service_account: Option<serde_json::Value>,
}

impl Secrets {
    /// Reads the secrets file. A missing file is an empty store, not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Secrets(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Secrets(path.to_path_buf(), e.to_string()))
    }
}

/// Holds all configuration loaded at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// `None` means the key must be entered per request.
    pub llm_api_key: Option<SecretString>,
    pub llm_api_base: String,
    pub llm_model: String,
    pub study_kit_char_budget: usize,
    pub concept_char_budget: usize,
    pub chat_excerpt_chars: usize,
    pub transcript_languages: Vec<String>,
    pub spreadsheet_name: String,
    /// Service-account key JSON; feedback persistence is disabled without it.
    pub service_account_json: Option<SecretString>,
    pub session_idle_minutes: i64,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from the secrets file and environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let secrets_path = std::env::var("SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".secrets.json"));
        let secrets = Secrets::load(&secrets_path)?;

        Self::from_sources(secrets, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from an already-loaded secrets store and an
    /// environment lookup.
    pub fn from_sources(
        secrets: Secrets,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // --- Server Settings ---
        let bind_address_str = env("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8501".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = env("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- LLM Settings (secrets store, then environment) ---
        let llm_api_key = non_blank(secrets.google_api_key)
            .or_else(|| non_blank(env("GOOGLE_API_KEY")))
            .map(SecretString::from);
        let llm_api_base = env("LLM_API_BASE").unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string());
        let llm_model = env("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        // --- Pipeline Settings ---
        let defaults = StudySettings::default();
        let study_kit_char_budget = parse_or(&env, "STUDY_KIT_CHAR_BUDGET", defaults.budget.study_kit_chars)?;
        let concept_char_budget = parse_or(&env, "CONCEPT_CHAR_BUDGET", defaults.budget.concept_chars)?;
        let chat_excerpt_chars = parse_or(&env, "CHAT_EXCERPT_CHARS", defaults.chat_excerpt_chars)?;
        let transcript_languages = env("TRANSCRIPT_LANGUAGES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|codes| !codes.is_empty())
            .unwrap_or(defaults.transcript_languages);

        // --- Feedback Store (secrets store, then environment, then fallback) ---
        let spreadsheet_name = non_blank(secrets.spreadsheet_name)
            .or_else(|| non_blank(env("SPREADSHEET_NAME")))
            .unwrap_or_else(|| DEFAULT_SPREADSHEET_NAME.to_string());

        let service_account_json = match secrets.gcp_service_account {
            Some(value) => Some(SecretString::from(value.to_string())),
            None => {
                let path = env("GOOGLE_APPLICATION_CREDENTIALS")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("credentials.json"));
                read_credentials_file(&path)?
            }
        };

        let session_idle_minutes = parse_or(&env, "SESSION_IDLE_MINUTES", 120)?;
        let max_upload_bytes = parse_or(&env, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?;

        Ok(Self {
            bind_address,
            log_level,
            llm_api_key,
            llm_api_base,
            llm_model,
            study_kit_char_budget,
            concept_char_budget,
            chat_excerpt_chars,
            transcript_languages,
            spreadsheet_name,
            service_account_json,
            session_idle_minutes,
            max_upload_bytes,
        })
    }

    pub fn study_settings(&self) -> StudySettings {
        StudySettings {
            budget: GenerationBudget {
                study_kit_chars: self.study_kit_char_budget,
                concept_chars: self.concept_char_budget,
            },
            chat_excerpt_chars: self.chat_excerpt_chars,
            transcript_languages: self.transcript_languages.clone(),
        }
    }
}

/// Blank values count as unset so they fall through to the next source.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn read_credentials_file(path: &Path) -> Result<Option<SecretString>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(|raw| Some(SecretString::from(raw)))
        .map_err(|e| ConfigError::Secrets(path.to_path_buf(), e.to_string()))
}
