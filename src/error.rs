//! Error types for the blueprint construction engine.

/// Result type alias for blueprint construction operations.
pub type Result<T> = std::result::Result<T, Error>;

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while constructing or reclaiming blueprints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Blueprint Validation Errors
    // =========================================================================
    /// Blueprint failed validation before construction started.
    #[error("invalid blueprint: {0}")]
    InvalidBlueprint(String),

    // =========================================================================
    // Network Provisioning Errors
    // =========================================================================
    /// Listing networks for a blueprint failed.
    #[error("{blueprint}: failed to list networks: {reason}")]
    NetworkList { blueprint: String, reason: String },

    /// Network creation failed outright.
    #[error("{blueprint}: failed to create network: {reason}")]
    NetworkCreate { blueprint: String, reason: String },

    /// Network creation reported a warning and no usable identifier.
    #[error("{blueprint}: fatal warning while creating network: {warning}")]
    NetworkCreateWarning { blueprint: String, warning: String },

    /// Network creation returned an empty identifier.
    #[error("{blueprint}: unexpected empty network id from runtime")]
    NetworkEmptyId { blueprint: String },

    // =========================================================================
    // Instance Construction Errors
    // =========================================================================
    /// The base image failed to deploy or become reachable.
    #[error("{context}: failed to deploy base image '{image}': {reason}")]
    Deploy {
        context: String,
        image: String,
        reason: String,
    },

    /// The external setup executor failed against a running instance.
    #[error("{context}: failed to run setup steps: {reason}")]
    Setup { context: String, reason: String },

    /// Stopping or committing an instance failed.
    #[error("{context}: failed to commit: {reason}")]
    Commit { context: String, reason: String },

    /// Committed images never became enumerable within the poll window.
    #[error(
        "blueprint '{blueprint}': found {found} of {expected} committed images \
         before the visibility window elapsed: did they all build ok?"
    )]
    VisibilityTimeout {
        blueprint: String,
        expected: usize,
        found: usize,
    },

    /// Aggregate of the ordered errors collected during one build.
    #[error("errors whilst constructing blueprint '{blueprint}': {}", join_errors(.errors))]
    Construction {
        blueprint: String,
        errors: Vec<Error>,
    },

    // =========================================================================
    // Port Resolution Errors
    // =========================================================================
    /// The requested container port is not published at all.
    #[error("port {port} not exposed - exposed ports: {published}")]
    PortNotExposed { port: String, published: String },

    /// The port is published but carries no host bindings.
    #[error("port {port} exposed with no mapped host binding")]
    PortUnbound { port: String },

    /// No binding matched the requested host IP, directly or via fallback.
    #[error("unable to find matching port binding for {host_ip} {port}: {bindings}")]
    PortNoMatch {
        host_ip: String,
        port: String,
        bindings: String,
    },

    // =========================================================================
    // Runtime Client Errors
    // =========================================================================
    /// A call to the container runtime failed.
    #[error("container runtime error: {0}")]
    Runtime(String),
}
