//! Builder configuration.

use crate::constants::DEFAULT_HOST_BIND_IP;
use serde::Deserialize;
use std::collections::HashMap;

/// Namespace-level configuration for a [`crate::Builder`].
///
/// The namespace partitions resource ownership so multiple independent test
/// sessions can share one container runtime without collision.
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    /// Namespace scoping every resource created by this builder.
    pub namespace: String,
    /// Default base image deployed for instances without an override.
    pub base_image: String,
    /// Per-instance-name base image overrides, keyed by instance name.
    #[serde(default)]
    pub base_image_overrides: HashMap<String, String>,
    /// Blueprint names whose images survive garbage collection.
    #[serde(default)]
    pub keep_blueprints: Vec<String>,
    /// Host IP that published ports are resolved against.
    #[serde(default = "default_host_bind_ip")]
    pub host_bind_ip: String,
}

fn default_host_bind_ip() -> String {
    DEFAULT_HOST_BIND_IP.to_string()
}

impl BuilderConfig {
    /// Creates a config with the given namespace and default base image.
    pub fn new(namespace: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            base_image: base_image.into(),
            base_image_overrides: HashMap::new(),
            keep_blueprints: Vec::new(),
            host_bind_ip: default_host_bind_ip(),
        }
    }
}
