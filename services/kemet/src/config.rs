//! Application Configuration Module
//!
//! Centralizes the configuration for the kemet service. Settings are loaded
//! from environment variables once at startup and passed explicitly to the
//! components that need them.

use std::env;
use tracing::Level;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub chat_model: String,
    /// BCP-47 locale for speech recognition.
    pub speech_locale: String,
    /// Optional override for the recognition endpoint's API key.
    pub speech_api_key: Option<String>,
    /// Language code for speech synthesis.
    pub tts_lang: String,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Your secret key for the Gemini API. Required.
    // *   `CHAT_MODEL`: (Optional) The Gemini model to query. Defaults to "gemini-2.5-flash".
    // *   `SPEECH_LOCALE`: (Optional) Recognition locale. Defaults to "ar-SA".
    // *   `SPEECH_API_KEY`: (Optional) Key for the recognition endpoint; a public default is built in.
    // *   `TTS_LANG`: (Optional) Synthesis language. Defaults to "ar".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ConfigError::MissingVar(
                "GEMINI_API_KEY must be set (export it or add it to a .env file)".to_string(),
            )
        })?;

        let chat_model = env::var("CHAT_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let speech_locale = env::var("SPEECH_LOCALE").unwrap_or_else(|_| "ar-SA".to_string());
        let speech_api_key = env::var("SPEECH_API_KEY").ok();
        let tts_lang = env::var("TTS_LANG").unwrap_or_else(|_| "ar".to_string());

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            chat_model,
            speech_locale,
            speech_api_key,
            tts_lang,
            log_level,
        })
    }
}
