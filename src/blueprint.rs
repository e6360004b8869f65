//! Blueprint specification types.
//!
//! A blueprint is a named template describing one or more server instances to
//! provision and the setup each must undergo before being frozen into a
//! reusable image. Blueprints are immutable once submitted for construction;
//! the blueprint *name* is the cache key within a namespace.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;

/// Named template for a set of pre-provisioned server instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    /// Blueprint name, unique within a namespace.
    pub name: String,
    /// Ordered list of instances to construct.
    pub instances: Vec<InstanceSpec>,
    /// Identities whose captured credentials are retained on committed images.
    /// An empty list retains all captured credentials (default-permissive).
    #[serde(default)]
    pub keep_credentials_for: Vec<String>,
}

impl Blueprint {
    /// Creates a blueprint with the given name and instances.
    pub fn new(name: impl Into<String>, instances: Vec<InstanceSpec>) -> Self {
        Self {
            name: name.into(),
            instances,
            keep_credentials_for: Vec::new(),
        }
    }

    /// Validates the blueprint before construction.
    ///
    /// # Errors
    ///
    /// - Empty blueprint name
    /// - No instances
    /// - Duplicate instance names
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidBlueprint(
                "blueprint name cannot be empty".to_string(),
            ));
        }
        if self.instances.is_empty() {
            return Err(Error::InvalidBlueprint(format!(
                "blueprint '{}' has no instances",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for instance in &self.instances {
            if instance.name.is_empty() {
                return Err(Error::InvalidBlueprint(format!(
                    "blueprint '{}' has an instance with an empty name",
                    self.name
                )));
            }
            if !seen.insert(instance.name.as_str()) {
                return Err(Error::InvalidBlueprint(format!(
                    "blueprint '{}' has duplicate instance name '{}'",
                    self.name, instance.name
                )));
            }
        }
        Ok(())
    }
}

/// One server instance within a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Instance name, unique within its blueprint.
    pub name: String,
    /// Base image override for this instance. Falls back to the namespace
    /// configuration when absent.
    #[serde(default)]
    pub base_image: Option<String>,
    /// Ordered setup steps, opaque to this crate and delegated to the
    /// external setup executor.
    #[serde(default)]
    pub setup: Vec<SetupStep>,
    /// Application services registered against this instance.
    #[serde(default)]
    pub app_services: Vec<AppServiceSpec>,
}

impl InstanceSpec {
    /// Creates an instance spec with no setup steps.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_image: None,
            setup: Vec::new(),
            app_services: Vec::new(),
        }
    }
}

/// One opaque setup step, interpreted by the external setup executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupStep {
    /// Action identifier understood by the executor.
    pub action: String,
    /// Free-form parameters for the action.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Application service registered against an instance.
///
/// Used only to generate a registration descriptor attached as image
/// metadata; the service itself runs outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppServiceSpec {
    /// Service identifier.
    pub id: String,
    /// Token the server uses when calling the service.
    pub inbound_token: String,
    /// Token the service uses when calling the server.
    pub outbound_token: String,
    /// Callback URL the server pushes events to.
    pub url: String,
    /// Identity fragment the service sends as.
    pub sender: String,
    /// Whether the service's requests are rate limited.
    #[serde(default)]
    pub rate_limited: bool,
    /// Whether ephemeral events are pushed to the service.
    #[serde(default)]
    pub send_ephemeral: bool,
    /// Whether the service supports end-to-end encryption.
    #[serde(default)]
    pub enable_encryption: bool,
}
