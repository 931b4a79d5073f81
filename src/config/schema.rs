use crate::endpoint::Endpoint;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExporterConfig {
    /// Address the exporter's own HTTP server binds to
    #[serde(default = "default_listen_addr")]
    #[validate(length(min = 1))]
    pub listen_addr: String,

    /// Prefix for every exported metric name; may be empty
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_http_endpoint")]
    #[validate(length(min = 1))]
    pub http_endpoint: String,

    /// When set, takes precedence over `http_endpoint`
    #[serde(default)]
    pub fastcgi_endpoint: Option<String>,

    /// Attached to every metric. `pool` is reserved for the worker summaries.
    #[serde(default)]
    #[validate(custom = "validate_const_labels")]
    pub const_labels: HashMap<String, String>,

    /// Value of the `pool` label on the worker summaries
    #[serde(default = "default_pool_label")]
    #[validate(length(min = 1))]
    pub pool_label: String,

    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl ExporterConfig {
    /// Resolves the single endpoint a collector polls. FastCGI wins when configured.
    pub fn endpoint(&self) -> Result<Endpoint> {
        match self.fastcgi_endpoint.as_deref().filter(|s| !s.is_empty()) {
            Some(fastcgi) => Endpoint::fastcgi(fastcgi),
            None => Endpoint::http(&self.http_endpoint),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            namespace: default_namespace(),
            http_endpoint: default_http_endpoint(),
            fastcgi_endpoint: None,
            const_labels: HashMap::new(),
            pool_label: default_pool_label(),
            timeout_ms: default_timeout_ms(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn validate_const_labels(
    labels: &HashMap<String, String>,
) -> std::result::Result<(), ValidationError> {
    if labels.contains_key("pool") {
        return Err(ValidationError::new("reserved_label_pool"));
    }
    Ok(())
}

fn default_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_namespace() -> String {
    "php_fpm".to_string()
}

fn default_http_endpoint() -> String {
    "http://127.0.0.1/status?full".to_string()
}

fn default_pool_label() -> String {
    "www".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_shutdown_timeout() -> u64 {
    10
}
