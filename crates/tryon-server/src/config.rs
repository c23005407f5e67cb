//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. Synthesis stays disabled until a
//! model API key is provided.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tryon_shared::constants::{DEFAULT_HTTP_PORT, MAX_IMAGE_SIZE};

/// idm-vton on the hosted model API.
const DEFAULT_MODEL_VERSION: &str =
    "c871bb9b046607b680449ecbae55fd8c6d945e0a1948644bf2361b3d021d3ff4";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Directory where images are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./public/images`
    pub blob_storage_path: PathBuf,

    /// Maximum decoded image size in bytes.
    /// Env: `MAX_BLOB_SIZE`
    /// Default: 10 MiB
    pub max_blob_size: usize,

    /// Externally reachable base URL of this server. The model fetches its
    /// inputs from `{public_base_url}/images/{name}`.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:3000`
    pub public_base_url: String,

    // -- Synthesis model --

    /// Env: `REPLICATE_API_KEY`
    /// Default: none (synthesis requests fail with 502).
    pub replicate_api_key: Option<String>,

    /// Env: `REPLICATE_API_URL`
    pub replicate_api_url: String,

    /// Env: `REPLICATE_MODEL_VERSION`
    pub model_version: String,

    /// Upper bound on one synthesis call.
    /// Env: `SYNTHESIS_TIMEOUT_SECS`
    /// Default: 300
    pub synthesis_timeout: Duration,

    /// Delay between prediction status polls.
    /// Env: `SYNTHESIS_POLL_INTERVAL_MS`
    /// Default: 1000
    pub poll_interval: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("blob_storage_path", &self.blob_storage_path)
            .field("max_blob_size", &self.max_blob_size)
            .field("public_base_url", &self.public_base_url)
            .field("replicate_api_key", &self.replicate_api_key.as_ref().map(|_| "<redacted>"))
            .field("replicate_api_url", &self.replicate_api_url)
            .field("model_version", &self.model_version)
            .field("synthesis_timeout", &self.synthesis_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            blob_storage_path: PathBuf::from("./public/images"),
            max_blob_size: MAX_IMAGE_SIZE,
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            replicate_api_key: None,
            replicate_api_url: "https://api.replicate.com/v1".to_string(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            synthesis_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_BLOB_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_blob_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BLOB_SIZE, using default"),
            }
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(key) = lookup("REPLICATE_API_KEY") {
            if !key.is_empty() {
                config.replicate_api_key = Some(key);
            }
        }

        if let Some(url) = lookup("REPLICATE_API_URL") {
            config.replicate_api_url = url.trim_end_matches('/').to_string();
        }

        if let Some(version) = lookup("REPLICATE_MODEL_VERSION") {
            if !version.is_empty() {
                config.model_version = version;
            }
        }

        if let Some(val) = lookup("SYNTHESIS_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(n) if n > 0 => config.synthesis_timeout = Duration::from_secs(n),
                _ => tracing::warn!(value = %val, "Invalid SYNTHESIS_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = lookup("SYNTHESIS_POLL_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(n) => config.poll_interval = Duration::from_millis(n),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid SYNTHESIS_POLL_INTERVAL_MS, using default")
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Largest request body accepted: a base64 data URI of a maximal image
    /// plus room for the JSON envelope.
    pub fn max_request_body(&self) -> usize {
        self.max_blob_size / 3 * 4 + 4 + 64 * 1024
    }

    /// URL at which the model can fetch a stored image.
    pub fn public_image_url(&self, name: &str) -> String {
        format!(
            "{}{}/{name}",
            self.public_base_url,
            tryon_shared::constants::IMAGE_ROUTE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert!(config.replicate_api_key.is_none());
        assert_eq!(config.synthesis_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("PUBLIC_BASE_URL", "https://tryon.example/"),
            ("REPLICATE_API_KEY", "r8_secret"),
            ("SYNTHESIS_TIMEOUT_SECS", "42"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.public_base_url, "https://tryon.example");
        assert_eq!(config.replicate_api_key.as_deref(), Some("r8_secret"));
        assert_eq!(config.synthesis_timeout, Duration::from_secs(42));
        assert_eq!(
            config.public_image_url("user_a-body1.jpg"),
            "https://tryon.example/images/user_a-body1.jpg"
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("MAX_BLOB_SIZE", "0"),
            ("SYNTHESIS_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.max_blob_size, MAX_IMAGE_SIZE);
        assert_eq!(config.synthesis_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config_from(&[("REPLICATE_API_KEY", "r8_secret")]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("r8_secret"));
        assert!(printed.contains("<redacted>"));
    }
}
