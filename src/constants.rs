//! Shared constants: label keys, image naming, and timing bounds.

use std::time::Duration;

// =============================================================================
// Resource Labels
// =============================================================================

/// Ownership marker attached to every network, image, and container this crate
/// creates. Presence of the key (any value) marks a resource as ours.
pub const OWNERSHIP_LABEL: &str = "fixtureforge_context";

/// Label carrying the caller-supplied namespace partition.
pub const NAMESPACE_LABEL: &str = "fixtureforge_namespace";

/// Label carrying the blueprint name for blueprint-scoped resources.
pub const BLUEPRINT_LABEL: &str = "fixtureforge_blueprint";

/// Prefix for retained-credential labels on committed images
/// (`credential_<identity> = <secret>`).
pub const CREDENTIAL_LABEL_PREFIX: &str = "credential_";

/// Prefix for captured device identifier labels on committed images.
pub const DEVICE_ID_LABEL_PREFIX: &str = "device_id_";

/// Prefix for application-service registration descriptor labels.
pub const APP_SERVICE_LABEL_PREFIX: &str = "app_service_";

// =============================================================================
// Image Naming
// =============================================================================

/// Repository prefix for every image this crate commits. Garbage collection
/// refuses to remove an image carrying any name tag outside this prefix, since
/// a foreign tag marks the image as not exclusively ours.
pub const LOCAL_IMAGE_PREFIX: &str = "localhost/fixtureforge";

/// Prefix for ephemeral container names created during a build.
pub const CONTAINER_NAME_PREFIX: &str = "fixtureforge_";

/// Author recorded on committed images.
pub const COMMIT_AUTHOR: &str = "fixtureforge";

// =============================================================================
// Timing Bounds
// =============================================================================

/// Total budget for waiting until freshly committed images become enumerable.
/// The runtime may lag between commit and list-visibility.
pub const IMAGE_VISIBILITY_BUDGET: Duration = Duration::from_secs(5);

/// Poll interval within [`IMAGE_VISIBILITY_BUDGET`].
pub const IMAGE_VISIBILITY_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period for stopping an instance before committing it. Committing a
/// live container risks data-directory corruption for transactional stores,
/// so stop-then-commit is mandatory.
pub const STOP_BEFORE_COMMIT_TIMEOUT_SECS: u32 = 10;

/// Default host IP used when resolving published ports to reachable addresses.
pub const DEFAULT_HOST_BIND_IP: &str = "127.0.0.1";
