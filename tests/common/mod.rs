//! Shared test doubles: an in-memory container runtime plus scripted
//! deployment and setup collaborators.
//!
//! The in-memory runtime models resources as label-indexed records with the
//! same exact-match AND query semantics the real daemon applies, so catalog
//! and builder behavior is testable without a daemon.

#![allow(dead_code)]

use async_trait::async_trait;
use fixtureforge::{
    CommitOptions, ContainerRuntime, ContainerSummary, DeployError, DeployRequest, Deployment,
    Error, ImageDeployer, ImageSummary, InstanceSpec, LabelFilter, NetworkCreated, NetworkSummary,
    PortMap, Result, SetupRunner, BLUEPRINT_LABEL, NAMESPACE_LABEL, OWNERSHIP_LABEL,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

static TRACING: Once = Once::new();

/// Routes test logs through an env-filtered subscriber, once per binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// =============================================================================
// In-Memory Runtime
// =============================================================================

#[derive(Debug, Clone)]
struct NetworkRecord {
    id: String,
    name: String,
    labels: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct ContainerRecord {
    id: String,
    name: String,
    labels: HashMap<String, String>,
    running: bool,
    logs: String,
    ports: PortMap,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    id: String,
    name_tags: Vec<String>,
    labels: HashMap<String, String>,
    hidden: bool,
}

#[derive(Default)]
struct State {
    networks: Vec<NetworkRecord>,
    containers: Vec<ContainerRecord>,
    images: Vec<ImageRecord>,
    next_id: u64,
    kill_order: Vec<String>,
    // Behavior toggles.
    hide_new_images: bool,
    fail_network_remove: bool,
    fail_commit_matching: Option<String>,
    scripted_network_create: Option<(String, Option<String>)>,
}

/// Label-indexed in-memory [`ContainerRuntime`].
#[derive(Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{:04}", state.next_id)
    }

    /// Seeds a network record, returning its id.
    pub fn add_network(&self, name: &str, labels: HashMap<String, String>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "net");
        state.networks.push(NetworkRecord {
            id: id.clone(),
            name: name.to_string(),
            labels,
        });
        id
    }

    /// Seeds a container record, returning its id.
    pub fn add_container(
        &self,
        name: &str,
        labels: HashMap<String, String>,
        running: bool,
        logs: &str,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "ctr");
        state.containers.push(ContainerRecord {
            id: id.clone(),
            name: name.to_string(),
            labels,
            running,
            logs: logs.to_string(),
            ports: PortMap::new(),
        });
        id
    }

    /// Seeds an image record, returning its id.
    pub fn add_image(&self, name_tags: Vec<String>, labels: HashMap<String, String>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "img");
        state.images.push(ImageRecord {
            id: id.clone(),
            name_tags,
            labels,
            hidden: false,
        });
        id
    }

    /// Newly committed images stay invisible to `list_images`, emulating a
    /// runtime that never reaches list-visibility.
    pub fn hide_new_images(&self) {
        self.state.lock().unwrap().hide_new_images = true;
    }

    /// All network removals fail from now on.
    pub fn fail_network_remove(&self) {
        self.state.lock().unwrap().fail_network_remove = true;
    }

    /// Commits whose image reference contains the needle fail.
    pub fn fail_commit_matching(&self, needle: &str) {
        self.state.lock().unwrap().fail_commit_matching = Some(needle.to_string());
    }

    /// The next network creation returns the given id and warning instead of
    /// allocating normally. A non-empty id is still recorded as a network.
    pub fn script_network_create(&self, id: &str, warning: Option<&str>) {
        self.state.lock().unwrap().scripted_network_create =
            Some((id.to_string(), warning.map(|w| w.to_string())));
    }

    /// Replaces the published port bindings reported for a container.
    pub fn set_container_ports(&self, id: &str, ports: PortMap) {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
            container.ports = ports;
        }
    }

    /// Container ids in the order they were killed.
    pub fn kill_order(&self) -> Vec<String> {
        self.state.lock().unwrap().kill_order.clone()
    }

    pub fn container_id_by_name(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
    }

    pub fn container_exists(&self, id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .any(|c| c.id == id)
    }

    pub fn running_container_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .filter(|c| c.running)
            .count()
    }
}

/// Parses `LABEL "k"="v"` change directives back into a label map.
fn labels_from_changes(changes: &[String]) -> HashMap<String, String> {
    changes
        .iter()
        .filter_map(|change| {
            let rest = change.strip_prefix("LABEL \"")?;
            let (key, rest) = rest.split_once("\"=\"")?;
            let value = rest.strip_suffix('"')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn list_networks(&self, filter: &LabelFilter) -> Result<Vec<NetworkSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .filter(|n| filter.matches(&n.labels))
            .map(|n| NetworkSummary {
                id: n.id.clone(),
                name: n.name.clone(),
                labels: n.labels.clone(),
            })
            .collect())
    }

    async fn create_network(
        &self,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<NetworkCreated> {
        let scripted = self.state.lock().unwrap().scripted_network_create.take();
        if let Some((id, warning)) = scripted {
            if !id.is_empty() {
                let mut state = self.state.lock().unwrap();
                state.networks.push(NetworkRecord {
                    id: id.clone(),
                    name: name.to_string(),
                    labels,
                });
            }
            return Ok(NetworkCreated { id, warning });
        }
        let id = self.add_network(name, labels);
        Ok(NetworkCreated { id, warning: None })
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network_remove {
            return Err(Error::Runtime("network removal disabled".to_string()));
        }
        let before = state.networks.len();
        state.networks.retain(|n| n.id != id);
        if state.networks.len() == before {
            return Err(Error::Runtime(format!("no such network: {id}")));
        }
        Ok(())
    }

    async fn list_images(&self, filter: &LabelFilter) -> Result<Vec<ImageSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .filter(|i| !i.hidden && filter.matches(&i.labels))
            .map(|i| ImageSummary {
                id: i.id.clone(),
                name_tags: i.name_tags.clone(),
                labels: i.labels.clone(),
            })
            .collect())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.images.len();
        state.images.retain(|i| i.id != id);
        if state.images.len() == before {
            return Err(Error::Runtime(format!("no such image: {id}")));
        }
        Ok(())
    }

    async fn list_containers(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| filter.matches(&c.labels))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![c.name.clone()],
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(Error::Runtime(format!("no such container: {id}")));
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout_secs: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))?;
        container.running = false;
        Ok(())
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))?;
        container.running = false;
        let id = id.to_string();
        state.kill_order.push(id);
        Ok(())
    }

    async fn commit_container(&self, id: &str, options: CommitOptions) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(needle) = &state.fail_commit_matching {
            if options.reference.contains(needle.as_str()) {
                return Err(Error::Runtime("commit rejected by test".to_string()));
            }
        }
        let container = state
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))?;
        // Committed images inherit the container's labels; change directives
        // layer the captured-state labels on top.
        let mut labels = container.labels.clone();
        labels.extend(labels_from_changes(&options.changes));
        let hidden = state.hide_new_images;
        let image_id = Self::next_id(&mut state, "img");
        state.images.push(ImageRecord {
            id: image_id.clone(),
            name_tags: vec![options.reference],
            labels,
            hidden,
        });
        Ok(image_id)
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.running)
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.logs.clone())
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))
    }

    async fn port_map(&self, id: &str) -> Result<PortMap> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.ports.clone())
            .ok_or_else(|| Error::Runtime(format!("no such container: {id}")))
    }
}

// =============================================================================
// Scripted Deployer
// =============================================================================

/// [`ImageDeployer`] that registers containers in the in-memory runtime,
/// stamping the ownership labels the real deploy primitive applies.
pub struct FakeDeployer {
    runtime: std::sync::Arc<InMemoryRuntime>,
    deploy_count: AtomicUsize,
    requests: Mutex<Vec<DeployRequest>>,
    fail_instances: Mutex<HashSet<String>>,
    fail_without_container: Mutex<HashSet<String>>,
}

impl FakeDeployer {
    pub fn new(runtime: std::sync::Arc<InMemoryRuntime>) -> Self {
        Self {
            runtime,
            deploy_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            fail_instances: Mutex::new(HashSet::new()),
            fail_without_container: Mutex::new(HashSet::new()),
        }
    }

    /// Deployment of the named instance fails after a container was created.
    pub fn fail_instance(&self, instance: &str) {
        self.fail_instances
            .lock()
            .unwrap()
            .insert(instance.to_string());
    }

    /// Deployment of the named instance fails before any container exists.
    pub fn fail_instance_without_container(&self, instance: &str) {
        self.fail_without_container
            .lock()
            .unwrap()
            .insert(instance.to_string());
    }

    pub fn deploy_count(&self) -> usize {
        self.deploy_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DeployRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageDeployer for FakeDeployer {
    async fn deploy(&self, request: DeployRequest) -> std::result::Result<Deployment, DeployError> {
        self.deploy_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if self
            .fail_without_container
            .lock()
            .unwrap()
            .contains(&request.instance)
        {
            return Err(DeployError {
                container_id: None,
                reason: "image pull failed".to_string(),
            });
        }

        let labels = HashMap::from([
            (OWNERSHIP_LABEL.to_string(), request.blueprint.clone()),
            (NAMESPACE_LABEL.to_string(), request.namespace.clone()),
            (BLUEPRINT_LABEL.to_string(), request.blueprint.clone()),
        ]);

        if self
            .fail_instances
            .lock()
            .unwrap()
            .contains(&request.instance)
        {
            let id = self
                .runtime
                .add_container(&request.container_name, labels, false, "boot failure\n");
            return Err(DeployError {
                container_id: Some(id),
                reason: "container never became reachable".to_string(),
            });
        }

        let id = self
            .runtime
            .add_container(&request.container_name, labels, true, "started ok\n");
        Ok(Deployment {
            container_id: id,
            base_url: format!("http://127.0.0.1:8008/{}", request.instance),
        })
    }
}

// =============================================================================
// Scripted Setup Runner
// =============================================================================

/// [`SetupRunner`] with pre-scripted outcomes and captured state.
#[derive(Default)]
pub struct ScriptedRunner {
    fail_instances: HashSet<String>,
    credentials: HashMap<String, HashMap<String, String>>,
    device_ids: HashMap<String, HashMap<String, String>>,
    run_count: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_instance(mut self, instance: &str) -> Self {
        self.fail_instances.insert(instance.to_string());
        self
    }

    pub fn with_credential(mut self, instance: &str, identity: &str, secret: &str) -> Self {
        self.credentials
            .entry(instance.to_string())
            .or_default()
            .insert(identity.to_string(), secret.to_string());
        self
    }

    pub fn with_device_id(mut self, instance: &str, identity: &str, device_id: &str) -> Self {
        self.device_ids
            .entry(instance.to_string())
            .or_default()
            .insert(identity.to_string(), device_id.to_string());
        self
    }

    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SetupRunner for ScriptedRunner {
    async fn run(&self, instance: &InstanceSpec, _base_url: &str) -> Result<()> {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_instances.contains(&instance.name) {
            return Err(Error::Runtime("scripted setup failure".to_string()));
        }
        Ok(())
    }

    fn credentials(&self, instance_name: &str) -> HashMap<String, String> {
        self.credentials
            .get(instance_name)
            .cloned()
            .unwrap_or_default()
    }

    fn device_ids(&self, instance_name: &str) -> HashMap<String, String> {
        self.device_ids
            .get(instance_name)
            .cloned()
            .unwrap_or_default()
    }
}
