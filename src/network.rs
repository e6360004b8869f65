//! Network provisioning for blueprint builds.
//!
//! Each (namespace, blueprint) pair gets exactly one isolated network for the
//! duration of its build. Provisioning re-checks-and-reuses rather than
//! blindly creating, so repeated builds of the same blueprint never stack up
//! duplicate networks.

use crate::constants::CONTAINER_NAME_PREFIX;
use crate::error::{Error, Result};
use crate::labels::{network_labels, LabelFilter};
use crate::runtime::ContainerRuntime;
use tracing::warn;

/// A provisioned (or reused) blueprint network.
#[derive(Debug, Clone)]
pub struct ProvisionedNetwork {
    /// Runtime network identifier.
    pub id: String,
    /// Network name; instances join and address each other through it.
    pub name: String,
}

/// Deterministic network name for a (namespace, blueprint) pair.
fn network_name(namespace: &str, blueprint: &str) -> String {
    format!("{CONTAINER_NAME_PREFIX}{namespace}_{blueprint}")
}

/// Ensures exactly one network exists for the (namespace, blueprint) pair,
/// reusing an existing one when found.
///
/// More than one existing match is an anomaly: it is warned about and the
/// first match is reused rather than treated as fatal. A creation warning is
/// tolerated only when the runtime still returned a valid identifier.
///
/// # Errors
///
/// - Listing networks failed
/// - Creation failed, or returned an empty identifier
pub async fn ensure_network(
    runtime: &dyn ContainerRuntime,
    namespace: &str,
    blueprint: &str,
) -> Result<ProvisionedNetwork> {
    let filter = LabelFilter::blueprint_scoped(namespace, blueprint);
    let existing = runtime
        .list_networks(&filter)
        .await
        .map_err(|e| Error::NetworkList {
            blueprint: blueprint.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(network) = existing.first() {
        if existing.len() > 1 {
            warn!(
                namespace = %namespace,
                blueprint = %blueprint,
                count = existing.len(),
                "found more than one network for blueprint, reusing the first"
            );
        }
        return Ok(ProvisionedNetwork {
            id: network.id.clone(),
            name: network.name.clone(),
        });
    }

    let name = network_name(namespace, blueprint);
    let created = runtime
        .create_network(&name, network_labels(namespace, blueprint))
        .await
        .map_err(|e| Error::NetworkCreate {
            blueprint: blueprint.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(warning) = &created.warning {
        if created.id.is_empty() {
            return Err(Error::NetworkCreateWarning {
                blueprint: blueprint.to_string(),
                warning: warning.clone(),
            });
        }
        warn!(network = %name, warning = %warning, "network created with warning");
    }
    if created.id.is_empty() {
        return Err(Error::NetworkEmptyId {
            blueprint: blueprint.to_string(),
        });
    }

    Ok(ProvisionedNetwork {
        id: created.id,
        name,
    })
}
