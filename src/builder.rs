//! Blueprint construction orchestration.
//!
//! The builder sequences the whole lifecycle of one build: provision the
//! blueprint network, construct each instance in order, freeze the survivors
//! into labeled images, reclaim every ephemeral resource, and verify the
//! expected image set actually materialized.
//!
//! Instances are constructed strictly sequentially; the first failure aborts
//! the remainder. Commits, by contrast, never abort siblings. Every
//! successfully constructed container is pushed onto a kill stack that is
//! released in reverse registration order once commit attempts complete, so
//! no instance container outlives the build regardless of commit outcome.

use crate::blueprint::{Blueprint, InstanceSpec};
use crate::catalog::Catalog;
use crate::config::BuilderConfig;
use crate::constants::{
    COMMIT_AUTHOR, CONTAINER_NAME_PREFIX, IMAGE_VISIBILITY_BUDGET, IMAGE_VISIBILITY_INTERVAL,
    STOP_BEFORE_COMMIT_TIMEOUT_SECS,
};
use crate::deploy::{DeployRequest, ImageDeployer, SetupRunner};
use crate::error::{Error, Result};
use crate::labels::{image_labels, image_reference, registration_descriptor, to_changes};
use crate::network::ensure_network;
use crate::ports::resolve_port;
use crate::runtime::{CommitOptions, ContainerRuntime};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

/// Per-instance construction outcome.
///
/// The container identifier is present even on failure when a container was
/// produced, so its logs can be captured before removal.
#[derive(Debug)]
pub struct ConstructionResult {
    /// Success, or the deployment/setup error that stopped this instance.
    pub outcome: Result<()>,
    /// Runtime container identifier; empty when no container was created.
    pub container_id: String,
    /// Human-readable context label (`namespace.blueprint.instance`).
    pub context: String,
    /// The instance spec this result belongs to.
    pub instance: InstanceSpec,
}

/// Builds blueprints into cached images against one container runtime.
pub struct Builder {
    config: BuilderConfig,
    runtime: Arc<dyn ContainerRuntime>,
    deployer: Arc<dyn ImageDeployer>,
    catalog: Catalog,
}

impl Builder {
    /// Creates a builder over the given runtime and deployment collaborator.
    pub fn new(
        config: BuilderConfig,
        runtime: Arc<dyn ContainerRuntime>,
        deployer: Arc<dyn ImageDeployer>,
    ) -> Self {
        let catalog = Catalog::new(runtime.clone());
        Self {
            config,
            runtime,
            deployer,
            catalog,
        }
    }

    /// Returns the catalog view over this builder's runtime.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Removes every resource this builder's namespace owns, honoring the
    /// configured keep-list. Best-effort; failures are logged, never raised.
    pub async fn cleanup(&self) {
        self.catalog
            .cleanup(&self.config.namespace, &self.config.keep_blueprints)
            .await;
    }

    /// Resolves a published port of a container to a reachable base URL,
    /// using the configured host bind IP.
    ///
    /// # Errors
    ///
    /// Inspection failures, or no binding reachable at the configured IP.
    pub async fn endpoint(&self, container_id: &str, port: u16) -> Result<String> {
        let ports = self.runtime.port_map(container_id).await?;
        let binding = resolve_port(&ports, &self.config.host_bind_ip, port)?;
        Ok(format!("http://{}", binding.address()))
    }

    /// Constructs the blueprint unless a cached image already exists for its
    /// name in this namespace.
    ///
    /// Idempotent at the granularity of "an image exists for this name" -
    /// the cache is keyed by name, not content. Two differently-specified
    /// blueprints sharing a name will never both be built; the second
    /// submission silently reuses the first's artifact.
    pub async fn construct_if_not_exist(
        &self,
        runner: &dyn SetupRunner,
        blueprint: &Blueprint,
    ) -> Result<()> {
        blueprint.validate()?;
        let images = self
            .catalog
            .blueprint_images(&self.config.namespace, &blueprint.name)
            .await?;
        if images.is_empty() {
            self.construct(runner, blueprint).await?;
        } else {
            debug!(
                blueprint = %blueprint.name,
                namespace = %self.config.namespace,
                "blueprint already built, reusing cached images"
            );
        }
        Ok(())
    }

    /// Constructs every instance of the blueprint and freezes each into a
    /// labeled image.
    ///
    /// # Errors
    ///
    /// Returns the ordered error set collected during the build. A build
    /// where committed images never became enumerable within the visibility
    /// window fails even when every individual commit reported success; no
    /// partial blueprint is ever reported as success.
    pub async fn construct(&self, runner: &dyn SetupRunner, blueprint: &Blueprint) -> Result<()> {
        blueprint.validate()?;
        let errors = self.construct_all(runner, blueprint).await;
        if !errors.is_empty() {
            for e in &errors {
                debug!(blueprint = %blueprint.name, error = %e, "could not construct blueprint");
            }
            return Err(Error::Construction {
                blueprint: blueprint.name.clone(),
                errors,
            });
        }

        // The runtime may lag between commit and list-visibility; wait a
        // bounded window for the expected image count to become enumerable.
        let expected = blueprint.instances.len();
        let start = Instant::now();
        let mut visible;
        let mut found = false;
        loop {
            let images = self
                .catalog
                .blueprint_images(&self.config.namespace, &blueprint.name)
                .await?;
            visible = images.len();
            if visible >= expected {
                debug!(
                    blueprint = %blueprint.name,
                    images = ?images.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
                    "constructed blueprint"
                );
                found = true;
                break;
            }
            if start.elapsed() >= IMAGE_VISIBILITY_BUDGET {
                break;
            }
            sleep(IMAGE_VISIBILITY_INTERVAL).await;
        }

        // Deferred until after the visibility poll: a network cannot be
        // removed while its containers still reference it.
        self.catalog.remove_networks(&self.config.namespace).await;

        if !found {
            return Err(Error::VisibilityTimeout {
                blueprint: blueprint.name.clone(),
                expected,
                found: visible,
            });
        }
        Ok(())
    }

    /// Constructs all instances sequentially, then commits the survivors.
    /// Returns the ordered errors collected along the way.
    async fn construct_all(&self, runner: &dyn SetupRunner, blueprint: &Blueprint) -> Vec<Error> {
        debug!(blueprint = %blueprint.name, "constructing blueprint");
        let mut errors = Vec::new();

        let network = match ensure_network(
            self.runtime.as_ref(),
            &self.config.namespace,
            &blueprint.name,
        )
        .await
        {
            Ok(network) => network,
            Err(e) => return vec![e],
        };

        // Stack of containers to kill once commit attempts complete, released
        // in reverse registration order on every path out of this function.
        let mut kill_stack: Vec<(String, String)> = Vec::new();
        let mut successes: Vec<ConstructionResult> = Vec::new();

        for instance in &blueprint.instances {
            let result = self
                .construct_instance(runner, &blueprint.name, instance, &network.name)
                .await;
            match result.outcome {
                Err(e) => {
                    if !result.container_id.is_empty() {
                        // Something went wrong, but the container may hold
                        // interesting logs.
                        self.dump_logs(&result.container_id, &result.context).await;
                        self.catalog
                            .log_port_bindings(&self.config.namespace)
                            .await;
                        if let Err(remove_err) =
                            self.runtime.remove_container(&result.container_id).await
                        {
                            warn!(
                                context = %result.context,
                                error = %remove_err,
                                "failed to remove container which failed to deploy"
                            );
                        }
                    }
                    errors.push(e);
                    // Little point constructing the remaining instances.
                    break;
                }
                Ok(()) => {
                    kill_stack.push((result.container_id.clone(), result.context.clone()));
                    successes.push(result);
                }
            }
        }

        if errors.is_empty() {
            for result in &successes {
                if let Err(e) = self.commit_instance(runner, blueprint, result).await {
                    errors.push(e);
                }
            }
        }

        self.release_kills(kill_stack).await;
        errors
    }

    /// Constructs one instance: deploys its base image onto the network and
    /// runs its setup steps.
    ///
    /// A setup failure does not prevent the container from being returned
    /// for diagnostic log capture, but does prevent commit.
    async fn construct_instance(
        &self,
        runner: &dyn SetupRunner,
        blueprint_name: &str,
        instance: &InstanceSpec,
        network_name: &str,
    ) -> ConstructionResult {
        let context = format!(
            "{}.{}.{}",
            self.config.namespace, blueprint_name, instance.name
        );
        debug!(context = %context, "constructing instance");

        let base_image = self.effective_base_image(instance);
        let request = DeployRequest {
            base_image: base_image.clone(),
            container_name: format!("{CONTAINER_NAME_PREFIX}{context}"),
            namespace: self.config.namespace.clone(),
            blueprint: blueprint_name.to_string(),
            instance: instance.name.clone(),
            registrations: instance
                .app_services
                .iter()
                .map(|svc| (svc.id.clone(), registration_descriptor(svc)))
                .collect(),
            network: network_name.to_string(),
        };

        let deployment = match self.deployer.deploy(request).await {
            Ok(deployment) => deployment,
            Err(deploy_err) => {
                error!(
                    context = %context,
                    image = %base_image,
                    reason = %deploy_err.reason,
                    "failed to deploy base image"
                );
                return ConstructionResult {
                    outcome: Err(Error::Deploy {
                        context: context.clone(),
                        image: base_image,
                        reason: deploy_err.reason,
                    }),
                    container_id: deploy_err.container_id.unwrap_or_default(),
                    context,
                    instance: instance.clone(),
                };
            }
        };
        debug!(
            context = %context,
            base_url = %deployment.base_url,
            container = %deployment.container_id,
            "deployed base image"
        );

        let outcome = match runner.run(instance, &deployment.base_url).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(context = %context, error = %e, "failed to run setup steps");
                Err(Error::Setup {
                    context: context.clone(),
                    reason: e.to_string(),
                })
            }
        };
        ConstructionResult {
            outcome,
            container_id: deployment.container_id,
            context,
            instance: instance.clone(),
        }
    }

    /// Freezes one successfully constructed instance into a labeled image.
    async fn commit_instance(
        &self,
        runner: &dyn SetupRunner,
        blueprint: &Blueprint,
        result: &ConstructionResult,
    ) -> Result<()> {
        let labels = image_labels(
            blueprint,
            &result.instance,
            &runner.credentials(&result.instance.name),
            &runner.device_ids(&result.instance.name),
        );

        // Stop before committing so the instance shuts down gracefully; a
        // transactional store committed live can come back corrupt and incur
        // a slow recovery when the image is later deployed.
        debug!(context = %result.context, container = %result.container_id, "stopping container");
        self.runtime
            .stop_container(&result.container_id, STOP_BEFORE_COMMIT_TIMEOUT_SECS)
            .await
            .map_err(|e| Error::Commit {
                context: result.context.clone(),
                reason: format!("failed to stop container: {e}"),
            })?;
        debug!(context = %result.context, container = %result.container_id, "stopped container");

        let image_id = self
            .runtime
            .commit_container(
                &result.container_id,
                CommitOptions {
                    reference: image_reference(&result.context),
                    pause: true,
                    changes: to_changes(&labels),
                    author: COMMIT_AUTHOR.to_string(),
                },
            )
            .await
            .map_err(|e| Error::Commit {
                context: result.context.clone(),
                reason: e.to_string(),
            })?;
        debug!(context = %result.context, image = %image_id, "created image");
        Ok(())
    }

    /// Kills deferred containers in reverse registration order. Best-effort:
    /// failures are logged, and containers that already exited are skipped.
    async fn release_kills(&self, mut kill_stack: Vec<(String, String)>) {
        while let Some((container_id, context)) = kill_stack.pop() {
            match self.runtime.is_running(&container_id).await {
                Err(e) => {
                    warn!(
                        context = %context,
                        container = %container_id,
                        error = %e,
                        "can't get container status, skipping kill"
                    );
                }
                Ok(false) => {}
                Ok(true) => {
                    if let Err(e) = self.runtime.kill_container(&container_id).await {
                        warn!(
                            context = %context,
                            container = %container_id,
                            error = %e,
                            "failed to kill container"
                        );
                    }
                }
            }
        }
    }

    /// Best-effort capture of a failed instance's container logs.
    async fn dump_logs(&self, container_id: &str, context: &str) {
        match self.runtime.container_logs(container_id).await {
            Ok(logs) => {
                error!(context = %context, logs = %logs, "captured logs from failed instance");
            }
            Err(e) => {
                warn!(context = %context, error = %e, "failed to extract container logs");
            }
        }
    }

    /// Resolves the effective base image for an instance: instance override,
    /// then per-instance-name configuration override, then the namespace
    /// default.
    fn effective_base_image(&self, instance: &InstanceSpec) -> String {
        if let Some(image) = &instance.base_image {
            return image.clone();
        }
        if let Some(image) = self.config.base_image_overrides.get(&instance.name) {
            return image.clone();
        }
        self.config.base_image.clone()
    }
}
