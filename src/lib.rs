//! # fixtureforge
//!
//! Builds and caches reusable container images ("blueprints") representing
//! pre-provisioned server instances for use as test fixtures.
//!
//! A [`Blueprint`] names one or more server instances, each with opaque setup
//! steps to execute against it before it is frozen into an image. The
//! [`Builder`] deterministically constructs the multi-container environment,
//! hands each running instance to an external [`SetupRunner`], captures the
//! emergent state setup produced (credentials, device identifiers), freezes
//! each instance into a cacheable image labeled with that state, and reclaims
//! every ephemeral resource - tolerating partial failure without leaving the
//! container runtime leaking resources.
//!
//! # Architecture
//!
//! ```text
//! Builder::construct
//!    │
//!    ├─► ensure_network            one isolated network per (namespace, blueprint)
//!    │
//!    ├─► construct_instance × N    strictly sequential; first failure aborts the rest
//!    │      │                      (ImageDeployer + SetupRunner collaborators)
//!    │      └─► kill stack         deferred SIGKILL, reverse registration order
//!    │
//!    ├─► commit pipeline           stop(10s) → commit(paused, labeled) per survivor;
//!    │                             per-instance errors never abort siblings
//!    │
//!    ├─► visibility poll           bounded wait (5s/100ms) for images to enumerate
//!    │
//!    └─► Catalog::remove_networks  deferred until containers have detached
//! ```
//!
//! # Resource identity
//!
//! Labels on runtime-managed resources are the sole persisted state: every
//! network, image, and container carries an ownership marker plus namespace
//! (and blueprint) labels, and committed images carry the captured setup
//! state as metadata labels. See [`labels`] for the query model and
//! [`Catalog`] for garbage collection, including the foreign-tag and
//! keep-list retention rules.
//!
//! # Concurrency model
//!
//! Construction is single-threaded and sequential by design: predictable log
//! ordering and no partial-network races, at the cost of build latency
//! scaling linearly with instance count. There is no locking around the
//! network cache-check; callers sharing a namespace must serialize builds.
//! Cancellation mid-build is not supported.
//!
//! # Example
//!
//! ```rust,ignore
//! use fixtureforge::{Blueprint, Builder, BuilderConfig, DockerRuntime, InstanceSpec};
//! use std::sync::Arc;
//!
//! # async fn run(deployer: Arc<dyn fixtureforge::ImageDeployer>,
//! #              runner: &dyn fixtureforge::SetupRunner) -> fixtureforge::Result<()> {
//! let runtime = Arc::new(DockerRuntime::connect().await?);
//! let config = BuilderConfig::new("mytests", "localhost/server-base:latest");
//! let builder = Builder::new(config, runtime, deployer);
//!
//! let blueprint = Blueprint::new("federation", vec![
//!     InstanceSpec::new("hs1"),
//!     InstanceSpec::new("hs2"),
//! ]);
//! builder.construct_if_not_exist(runner, &blueprint).await?;
//! // ... deploy the cached images, run tests ...
//! builder.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod blueprint;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod docker;
pub mod error;
pub mod labels;
pub mod network;
pub mod ports;
pub mod runtime;

// Re-exports
pub use blueprint::{AppServiceSpec, Blueprint, InstanceSpec, SetupStep};
pub use builder::{Builder, ConstructionResult};
pub use catalog::Catalog;
pub use config::BuilderConfig;
pub use constants::*;
pub use deploy::{DeployError, DeployRequest, Deployment, ImageDeployer, SetupRunner};
pub use docker::DockerRuntime;
pub use error::{Error, Result};
pub use labels::LabelFilter;
pub use network::{ensure_network, ProvisionedNetwork};
pub use ports::{resolve_port, PortBinding, PortMap};
pub use runtime::{
    CommitOptions, ContainerRuntime, ContainerSummary, ImageSummary, NetworkCreated,
    NetworkSummary,
};
