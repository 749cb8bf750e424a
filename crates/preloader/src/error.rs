use thiserror::Error;

/// Errors surfaced to callers of the preloader handle.
///
/// Sniff and overlay failures never appear here: they degrade to the ordinary
/// image path and are only logged.
#[derive(Debug, Error)]
pub enum PreloaderError {
    #[error("Preloader actor is not running")]
    ActorStopped,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{operation} '{path}': {source}")]
    Io {
        operation: &'static str,
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] sniffer::SniffError),
}

pub type Result<T> = std::result::Result<T, PreloaderError>;
