//! Container runtime client contract.
//!
//! Everything the construction engine needs from the runtime daemon is
//! captured in the [`ContainerRuntime`] trait: label-filtered enumeration and
//! removal of networks, images, and containers, stop/kill/commit for the
//! commit pipeline, and log/state inspection for diagnostics. Implementations
//! exist for a local Docker-compatible daemon ([`crate::DockerRuntime`]) and
//! for tests (an in-memory double).

use crate::error::Result;
use crate::labels::LabelFilter;
use crate::ports::PortMap;
use async_trait::async_trait;
use std::collections::HashMap;

/// A network as enumerated by the runtime.
#[derive(Debug, Clone)]
pub struct NetworkSummary {
    /// Runtime network identifier.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Labels attached at creation.
    pub labels: HashMap<String, String>,
}

/// Outcome of a network creation call.
///
/// Runtimes may report a non-fatal warning alongside a valid identifier;
/// callers must treat an empty identifier as failure regardless of warnings.
#[derive(Debug, Clone)]
pub struct NetworkCreated {
    /// Runtime network identifier. May be empty on anomalous responses.
    pub id: String,
    /// Non-fatal warning reported by the runtime, if any.
    pub warning: Option<String>,
}

/// An image as enumerated by the runtime.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    /// Runtime image identifier.
    pub id: String,
    /// Repository name tags attached to the image.
    pub name_tags: Vec<String>,
    /// Labels baked into the image.
    pub labels: HashMap<String, String>,
}

/// A container as enumerated by the runtime, in any state.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Runtime container identifier.
    pub id: String,
    /// Container names.
    pub names: Vec<String>,
    /// Labels attached at creation.
    pub labels: HashMap<String, String>,
}

/// Options for freezing a stopped container into an image.
#[derive(Debug, Clone)]
pub struct CommitOptions {
    /// Repository reference for the new image (`repo:tag`).
    pub reference: String,
    /// Pause the container for the duration of the commit.
    pub pause: bool,
    /// Change directives applied to the committed image (`LABEL "k"="v"`).
    pub changes: Vec<String>,
    /// Author recorded on the image.
    pub author: String,
}

/// Client for a single local container runtime daemon.
///
/// All list operations filter by exact-match label terms, ANDed across the
/// supplied filter. Removal operations are forceful where the runtime
/// distinguishes; state is never required to be `running` first.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    // =========================================================================
    // Networks
    // =========================================================================

    /// Lists networks matching the label filter.
    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>>;

    /// Creates a named network carrying the given labels.
    async fn create_network(
        &self,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<NetworkCreated>;

    /// Removes a network. Fails while containers remain attached.
    async fn remove_network(&self, id: &str) -> Result<()>;

    // =========================================================================
    // Images
    // =========================================================================

    /// Lists images matching the label filter.
    async fn list_images(&self, filter: &LabelFilter) -> Result<Vec<ImageSummary>>;

    /// Force-removes an image.
    async fn remove_image(&self, id: &str) -> Result<()>;

    // =========================================================================
    // Containers
    // =========================================================================

    /// Lists containers matching the label filter, regardless of state.
    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>>;

    /// Force-removes a container, running or not.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Gracefully stops a container, waiting up to `timeout_secs` before the
    /// runtime escalates.
    async fn stop_container(&self, id: &str, timeout_secs: u32) -> Result<()>;

    /// Sends SIGKILL to a running container.
    async fn kill_container(&self, id: &str) -> Result<()>;

    /// Commits a container to a new image and returns the image identifier,
    /// normalized without a digest-algorithm prefix.
    async fn commit_container(&self, id: &str, options: CommitOptions) -> Result<String>;

    /// Returns whether the container's main process is currently running.
    async fn is_running(&self, id: &str) -> Result<bool>;

    /// Retrieves the container's stdout and stderr, non-following.
    async fn container_logs(&self, id: &str) -> Result<String>;

    /// Returns the container's published port bindings.
    async fn port_map(&self, id: &str) -> Result<PortMap>;
}
