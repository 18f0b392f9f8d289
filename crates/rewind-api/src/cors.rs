// CORS configuration
//
// Three modes: disabled (same-origin only), any origin, or an explicit
// origin list. A single configured origin is just a one-element list.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, AllowOrigin, CorsLayer};

/// Cross-origin policy for the API server
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// No CORS headers; browsers only allow same-origin requests
    #[default]
    Disabled,
    /// Any origin may call the API (no credentials)
    Any,
    /// Only the listed origins may call the API
    Origins(Vec<HeaderValue>),
}

impl CorsConfig {
    /// Read `CORS_ORIGINS` from the environment
    ///
    /// Unset or empty disables CORS; `*` allows any origin; otherwise the
    /// value is a comma-separated origin list.
    pub fn from_env() -> Self {
        let raw = std::env::var("CORS_ORIGINS").unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Disabled;
        }
        if raw == "*" {
            return Self::Any;
        }
        let origins: Vec<HeaderValue> = raw
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        if origins.is_empty() {
            Self::Disabled
        } else {
            Self::Origins(origins)
        }
    }

    /// Build the tower-http layer, if this config enables CORS at all
    pub fn layer(&self) -> Option<CorsLayer> {
        let methods = [Method::GET, Method::POST, Method::OPTIONS];
        let headers = [header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL];
        match self {
            Self::Disabled => None,
            Self::Any => Some(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(methods)
                    .allow_headers(headers),
            ),
            Self::Origins(origins) => Some(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins.clone()))
                    .allow_methods(methods)
                    .allow_headers(headers),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_presence_follows_mode() {
        assert!(CorsConfig::Disabled.layer().is_none());
        assert!(CorsConfig::Any.layer().is_some());

        let origins = vec![HeaderValue::from_static("https://app.example.com")];
        assert!(CorsConfig::Origins(origins).layer().is_some());
    }
}
