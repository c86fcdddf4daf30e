//! Middleware configuration.

use axum::http::HeaderName;

use crate::error::ConfigError;

/// Default number of body bytes retained per captured body.
pub const DEFAULT_MAX_BODY_LOG: usize = 4096;

/// Conventional header carrying a client-supplied request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const ENV_MAX_BODY_LOG: &str = "HTTPLOG_MAX_BODY_LOG";
const ENV_REQUEST_ID_HEADER: &str = "HTTPLOG_REQUEST_ID_HEADER";

/// Configuration for the request logging middleware.
///
/// Read-only once handed to [`RequestLoggerLayer`](crate::RequestLoggerLayer); every service
/// the layer produces shares the same values.
///
/// # Examples
///
/// ```rust
/// use httplog::RequestLoggerConfig;
///
/// // Default configuration
/// let config = RequestLoggerConfig::default();
/// assert_eq!(config.max_body_log, 4096);
///
/// // Negative caps degrade to "retain nothing"
/// let config = RequestLoggerConfig::default().with_max_body_log(-5);
/// assert_eq!(config.max_body_log, 0);
/// ```
#[derive(Clone, Debug)]
pub struct RequestLoggerConfig {
    /// Maximum number of bytes retained verbatim from each captured body
    pub max_body_log: usize,
    /// Header whose value is mirrored into the record's `request_id` field
    pub request_id_header: HeaderName,
}

impl Default for RequestLoggerConfig {
    fn default() -> Self {
        Self {
            max_body_log: DEFAULT_MAX_BODY_LOG,
            request_id_header: REQUEST_ID_HEADER,
        }
    }
}

impl RequestLoggerConfig {
    /// Set the body capture cap. Negative values are treated as a cap of zero.
    pub fn with_max_body_log(mut self, limit: i64) -> Self {
        self.max_body_log = clamp_limit(limit);
        self
    }

    /// Set the request-id header name.
    pub fn with_request_id_header(mut self, header: HeaderName) -> Self {
        self.request_id_header = header;
        self
    }

    /// Load configuration from `HTTPLOG_MAX_BODY_LOG` and `HTTPLOG_REQUEST_ID_HEADER`,
    /// falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_BODY_LOG) {
            let limit = value
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidInteger {
                    key: ENV_MAX_BODY_LOG,
                    value: value.clone(),
                })?;
            config.max_body_log = clamp_limit(limit);
        }

        if let Some(value) = lookup(ENV_REQUEST_ID_HEADER) {
            config.request_id_header = HeaderName::try_from(value.trim()).map_err(|source| {
                ConfigError::InvalidHeaderName {
                    key: ENV_REQUEST_ID_HEADER,
                    value: value.clone(),
                    source,
                }
            })?;
        }

        Ok(config)
    }
}

fn clamp_limit(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}
