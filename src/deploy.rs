//! External collaborator contracts.
//!
//! Deploying one container from a base image and running protocol-level setup
//! against it are thin call/response concerns owned by the embedding test
//! harness. The builder only needs the contracts below.

use crate::blueprint::InstanceSpec;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Request to deploy one base image as a running instance on a network.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Effective base image reference after override resolution.
    pub base_image: String,
    /// Container name to assign.
    pub container_name: String,
    /// Owning namespace; the deployer must stamp ownership labels.
    pub namespace: String,
    /// Owning blueprint name.
    pub blueprint: String,
    /// Instance name within the blueprint.
    pub instance: String,
    /// Application-service registration descriptors, keyed by service id.
    pub registrations: HashMap<String, String>,
    /// Network the container joins.
    pub network: String,
}

/// A successfully deployed, reachable instance.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Runtime container identifier.
    pub container_id: String,
    /// Base URL at which the instance accepts setup calls.
    pub base_url: String,
}

/// Deployment failure, retaining whatever container identifier the attempt
/// produced so the caller can capture diagnostic logs.
#[derive(Debug)]
pub struct DeployError {
    /// Container identifier, when a container was created before the failure.
    pub container_id: Option<String>,
    /// Human-readable failure description.
    pub reason: String,
}

/// Deploys one base image as a running container and waits for it to become
/// reachable.
#[async_trait]
pub trait ImageDeployer: Send + Sync {
    /// Starts a container per the request and returns its identifier and
    /// reachable base URL.
    ///
    /// On failure, implementations must still report the container identifier
    /// if one was produced, so its logs can be captured.
    async fn deploy(&self, request: DeployRequest) -> std::result::Result<Deployment, DeployError>;
}

/// Runs an instance's setup steps and exposes the state they produced.
///
/// Opaque to the construction engine: a black box that mutates the running
/// instance and is queried post-hoc for captured credentials and device
/// identifiers.
#[async_trait]
pub trait SetupRunner: Send + Sync {
    /// Executes the instance's setup steps against its base URL.
    async fn run(&self, instance: &InstanceSpec, base_url: &str) -> Result<()>;

    /// Credentials captured while setting up the named instance, keyed by
    /// identity.
    fn credentials(&self, instance_name: &str) -> HashMap<String, String>;

    /// Device identifiers captured while setting up the named instance,
    /// keyed by identity.
    fn device_ids(&self, instance_name: &str) -> HashMap<String, String>;
}
