//! Compile-time configuration of the reverse geocoding service.
//!
//! The service is defined in `services/nominatim.toml`, embedded at
//! compile time. [`reverse_service`] parses it and applies environment
//! overrides:
//!
//! - `OSM_ADDRESS_NOMINATIM_URL` replaces `base_url`
//! - `OSM_ADDRESS_USER_AGENT` replaces `user_agent`

use std::time::Duration;

use serde::Deserialize;

use crate::GeocodeError;

/// Environment variable overriding the reverse endpoint URL.
pub const BASE_URL_ENV: &str = "OSM_ADDRESS_NOMINATIM_URL";

/// Environment variable overriding the client identifier header.
pub const USER_AGENT_ENV: &str = "OSM_ADDRESS_USER_AGENT";

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// A reverse geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseService {
    /// Unique identifier (e.g. `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Full URL of the `/reverse` endpoint.
    pub base_url: String,
    /// `User-Agent` sent with every request. The public Nominatim
    /// instance rejects anonymous clients.
    pub user_agent: String,
    /// Level of detail requested (18 = building).
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_zoom() -> u8 {
    18
}

const fn default_timeout_secs() -> u64 {
    30
}

impl ReverseService {
    /// Pause to observe between successive requests.
    #[must_use]
    pub const fn request_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            log::debug!("Using reverse geocoding endpoint from {BASE_URL_ENV}: {url}");
            self.base_url = url;
        }
        if let Some(agent) = lookup(USER_AGENT_ENV).filter(|v| !v.trim().is_empty()) {
            self.user_agent = agent;
        }
        self
    }
}

fn parse_service(toml_str: &str) -> Result<ReverseService, GeocodeError> {
    toml::de::from_str(toml_str).map_err(|e| GeocodeError::Config {
        message: format!("Failed to parse reverse geocoding service: {e}"),
    })
}

/// Returns the embedded reverse geocoding service with environment
/// overrides applied.
///
/// # Errors
///
/// Returns [`GeocodeError::Config`] if the embedded TOML is malformed.
pub fn reverse_service() -> Result<ReverseService, GeocodeError> {
    Ok(parse_service(NOMINATIM_TOML)?.apply_overrides(|key| std::env::var(key).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_service() {
        let svc = parse_service(NOMINATIM_TOML).unwrap();
        assert_eq!(svc.id, "nominatim");
        assert!(!svc.name.is_empty());
        assert!(svc.base_url.ends_with("/reverse"));
        assert!(!svc.user_agent.is_empty());
        assert_eq!(svc.zoom, 18);
        assert_eq!(svc.request_interval(), Duration::from_millis(1100));
    }

    #[test]
    fn environment_overrides_url_and_agent() {
        let svc = parse_service(NOMINATIM_TOML)
            .unwrap()
            .apply_overrides(|key| match key {
                BASE_URL_ENV => Some("http://localhost:8080/reverse".to_string()),
                USER_AGENT_ENV => Some("test-agent".to_string()),
                _ => None,
            });

        assert_eq!(svc.base_url, "http://localhost:8080/reverse");
        assert_eq!(svc.user_agent, "test-agent");
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let svc = parse_service(NOMINATIM_TOML)
            .unwrap()
            .apply_overrides(|_| Some("  ".to_string()));
        assert!(svc.base_url.starts_with("https://"));
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let svc = parse_service(
            r#"
            id = "local"
            name = "Local"
            base_url = "http://localhost/reverse"
            user_agent = "x"
            rate_limit_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(svc.zoom, 18);
        assert_eq!(svc.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn malformed_service_is_config_error() {
        assert!(matches!(
            parse_service("id = "),
            Err(GeocodeError::Config { .. })
        ));
    }
}
