//! Resource catalog and garbage collection.
//!
//! The catalog wraps the runtime's list/remove calls behind the label-based
//! ownership model. Garbage collection reclaims everything a namespace owns
//! in three independent best-effort passes; a failure in one pass never
//! blocks the others, and no cleanup failure is allowed to mask a build
//! result.

use crate::constants::BLUEPRINT_LABEL;
use crate::error::Result;
use crate::labels::{is_locally_tagged, LabelFilter};
use crate::runtime::{ContainerRuntime, ImageSummary};
use std::sync::Arc;
use tracing::{debug, warn};

/// Label-indexed view over the resources a namespace owns.
#[derive(Clone)]
pub struct Catalog {
    runtime: Arc<dyn ContainerRuntime>,
}

impl Catalog {
    /// Creates a catalog over the given runtime client.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Cached images for one blueprint within a namespace. An empty result
    /// means the blueprint has never been successfully built here.
    pub async fn blueprint_images(
        &self,
        namespace: &str,
        blueprint: &str,
    ) -> Result<Vec<ImageSummary>> {
        self.runtime
            .list_images(&LabelFilter::blueprint_scoped(namespace, blueprint))
            .await
    }

    /// All networks owned by the namespace.
    pub async fn owned_networks(&self, namespace: &str) -> Result<Vec<crate::NetworkSummary>> {
        self.runtime.list_networks(&LabelFilter::owned(namespace)).await
    }

    /// All containers owned by the namespace, regardless of state.
    pub async fn owned_containers(&self, namespace: &str) -> Result<Vec<crate::ContainerSummary>> {
        self.runtime
            .list_containers(&LabelFilter::owned(namespace))
            .await
    }

    /// All images owned by the namespace.
    pub async fn owned_images(&self, namespace: &str) -> Result<Vec<ImageSummary>> {
        self.runtime.list_images(&LabelFilter::owned(namespace)).await
    }

    /// Removes everything the namespace owns: containers, networks, and
    /// non-retained locally-tagged images.
    ///
    /// Each of the three passes is independent and best-effort; failures are
    /// logged and never raised. Invoking cleanup on an already-clean
    /// namespace is a no-op.
    pub async fn cleanup(&self, namespace: &str, keep_blueprints: &[String]) {
        self.remove_containers(namespace).await;
        self.remove_images(namespace, keep_blueprints).await;
        self.remove_networks(namespace).await;
    }

    /// Force-removes all containers owned by the namespace.
    pub async fn remove_containers(&self, namespace: &str) {
        let containers = match self.owned_containers(namespace).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "cleanup: failed to list containers");
                return;
            }
        };
        for container in containers {
            if let Err(e) = self.runtime.remove_container(&container.id).await {
                warn!(
                    namespace = %namespace,
                    container = %container.id,
                    error = %e,
                    "cleanup: failed to remove container"
                );
            }
        }
    }

    /// Removes all networks owned by the namespace. Also invoked mid-build
    /// once committed images are visible, since a network cannot be removed
    /// while containers remain attached.
    pub async fn remove_networks(&self, namespace: &str) {
        let networks = match self.owned_networks(namespace).await {
            Ok(networks) => networks,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "cleanup: failed to list networks");
                return;
            }
        };
        for network in networks {
            if let Err(e) = self.runtime.remove_network(&network.id).await {
                warn!(
                    namespace = %namespace,
                    network = %network.name,
                    error = %e,
                    "cleanup: failed to remove network"
                );
            }
        }
    }

    /// Logs the host port bindings of every container the namespace owns.
    /// Diagnostic aid for deployment failures; best-effort.
    pub async fn log_port_bindings(&self, namespace: &str) {
        let containers = match self.owned_containers(namespace).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "failed to list containers for port dump");
                return;
            }
        };
        for container in containers {
            let ports = match self.runtime.port_map(&container.id).await {
                Ok(ports) => ports,
                Err(e) => {
                    warn!(container = %container.id, error = %e, "failed to inspect port bindings");
                    continue;
                }
            };
            for (port, bindings) in &ports {
                let hosts = bindings
                    .iter()
                    .map(|b| b.address())
                    .collect::<Vec<_>>()
                    .join(", ");
                debug!(
                    container = %container.id,
                    names = ?container.names,
                    port = %port,
                    bindings = %hosts,
                    "container port binding"
                );
            }
        }
    }

    /// Removes owned images, skipping any image with a foreign name tag and
    /// any image built from a retained blueprint.
    pub async fn remove_images(&self, namespace: &str, keep_blueprints: &[String]) {
        let images = match self.owned_images(namespace).await {
            Ok(images) => images,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "cleanup: failed to list images");
                return;
            }
        };
        for image in images {
            // A single non-local tag marks the image as shared with something
            // we did not create; images can carry multiple tags.
            if !is_locally_tagged(&image.name_tags) {
                debug!(
                    image = %image.id,
                    tags = ?image.name_tags,
                    "cleanup: not removing image with foreign tags"
                );
                continue;
            }
            if let Some(blueprint) = image.labels.get(BLUEPRINT_LABEL) {
                if keep_blueprints.iter().any(|keep| keep == blueprint) {
                    debug!(
                        image = %image.id,
                        blueprint = %blueprint,
                        "cleanup: keeping image from retained blueprint"
                    );
                    continue;
                }
            }
            if let Err(e) = self.runtime.remove_image(&image.id).await {
                warn!(
                    namespace = %namespace,
                    image = %image.id,
                    error = %e,
                    "cleanup: failed to remove image"
                );
            }
        }
    }
}
