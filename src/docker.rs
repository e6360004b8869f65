//! Docker-compatible implementation of [`ContainerRuntime`] via bollard.
//!
//! Targets a single local daemon (Docker or a compatibility API such as
//! Podman's). The connection is assumed reliable for the duration of a build.

use crate::error::{Error, Result};
use crate::labels::LabelFilter;
use crate::ports::{PortBinding, PortMap};
use crate::runtime::{
    CommitOptions, ContainerRuntime, ContainerSummary, ImageSummary, NetworkCreated,
    NetworkSummary,
};
use async_trait::async_trait;
use bollard::container::{
    Config, KillContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::image::{CommitContainerOptions, ListImagesOptions, RemoveImageOptions};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::fmt::Display;
use tracing::info;

fn runtime_err(op: &str, e: impl Display) -> Error {
    Error::Runtime(format!("{op}: {e}"))
}

/// Renders a [`LabelFilter`] as the daemon's `label` filter map.
fn label_filters(filter: &LabelFilter) -> HashMap<String, Vec<String>> {
    HashMap::from([("label".to_string(), filter.to_runtime_terms())])
}

/// [`ContainerRuntime`] backed by a local Docker-compatible daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the local daemon and verifies it responds.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| runtime_err("failed to connect to container daemon", e))?;
        docker
            .ping()
            .await
            .map_err(|e| runtime_err("container daemon did not answer ping", e))?;
        info!("connected to container daemon");
        Ok(Self { docker })
    }

    /// Wraps an already-connected bollard client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>> {
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions {
                filters: label_filters(filter),
            }))
            .await
            .map_err(|e| runtime_err("failed to list networks", e))?;
        Ok(networks
            .into_iter()
            .map(|n| NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
                labels: n.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_network(
        &self,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<NetworkCreated> {
        let response = self
            .docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                labels,
                ..Default::default()
            })
            .await
            .map_err(|e| runtime_err("failed to create network", e))?;
        Ok(NetworkCreated {
            id: response.id.unwrap_or_default(),
            warning: response.warning.filter(|w| !w.is_empty()),
        })
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker
            .remove_network(id)
            .await
            .map_err(|e| runtime_err("failed to remove network", e))
    }

    async fn list_images(&self, filter: &LabelFilter) -> Result<Vec<ImageSummary>> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions {
                all: false,
                filters: label_filters(filter),
                ..Default::default()
            }))
            .await
            .map_err(|e| runtime_err("failed to list images", e))?;
        Ok(images
            .into_iter()
            .map(|i| ImageSummary {
                id: i.id,
                name_tags: i.repo_tags,
                labels: i.labels,
            })
            .collect())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        self.docker
            .remove_image(
                id,
                Some(RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await
            .map_err(|e| runtime_err("failed to remove image", e))?;
        Ok(())
    }

    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: label_filters(filter),
                ..Default::default()
            }))
            .await
            .map_err(|e| runtime_err("failed to list containers", e))?;
        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| runtime_err("failed to remove container", e))
    }

    async fn stop_container(&self, id: &str, timeout_secs: u32) -> Result<()> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: i64::from(timeout_secs),
                }),
            )
            .await
            .map_err(|e| runtime_err("failed to stop container", e))
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        self.docker
            .kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
            .map_err(|e| runtime_err("failed to kill container", e))
    }

    async fn commit_container(&self, id: &str, options: CommitOptions) -> Result<String> {
        let (repo, tag) = options
            .reference
            .rsplit_once(':')
            .map(|(repo, tag)| (repo.to_string(), tag.to_string()))
            .unwrap_or_else(|| (options.reference.clone(), "latest".to_string()));
        let commit = self
            .docker
            .commit_container(
                CommitContainerOptions {
                    container: id.to_string(),
                    repo,
                    tag,
                    comment: String::new(),
                    author: options.author,
                    pause: options.pause,
                    changes: Some(options.changes.join("\n")),
                },
                // Some compatibility APIs reject an entirely empty request
                // body, so always supply a (possibly empty) config payload.
                Config::<String>::default(),
            )
            .await
            .map_err(|e| runtime_err("failed to commit container", e))?;
        let image_id = commit.id.unwrap_or_default();
        Ok(image_id.strip_prefix("sha256:").unwrap_or(&image_id).to_string())
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| runtime_err("failed to inspect container", e))?;
        Ok(inspect
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let mut stream = self.docker.logs(
            id,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: false,
                ..Default::default()
            }),
        );
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(|e| runtime_err("failed to read container logs", e))?;
            buf.extend_from_slice(&output.into_bytes());
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn port_map(&self, id: &str) -> Result<PortMap> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| runtime_err("failed to inspect container", e))?;
        let ports = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();
        Ok(ports
            .into_iter()
            .map(|(port, bindings)| {
                (
                    port,
                    bindings
                        .unwrap_or_default()
                        .into_iter()
                        .map(|b| PortBinding {
                            host_ip: b.host_ip.unwrap_or_default(),
                            host_port: b.host_port.unwrap_or_default(),
                        })
                        .collect(),
                )
            })
            .collect())
    }
}
