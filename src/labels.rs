//! Label-based resource identity.
//!
//! The container runtime's label facility is the sole index for what this
//! crate owns; there is no separate database. Every network, image, and
//! container carries the ownership marker plus namespace (and, where scoped,
//! blueprint) labels, and committed images additionally carry the captured
//! setup state as labels. Queries are exact-match and ANDed across terms.

use crate::blueprint::{AppServiceSpec, Blueprint, InstanceSpec};
use crate::constants::{
    APP_SERVICE_LABEL_PREFIX, BLUEPRINT_LABEL, CREDENTIAL_LABEL_PREFIX, DEVICE_ID_LABEL_PREFIX,
    LOCAL_IMAGE_PREFIX, NAMESPACE_LABEL, OWNERSHIP_LABEL,
};
use std::collections::HashMap;

// =============================================================================
// Label Queries
// =============================================================================

/// One term of a label query.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelTerm {
    /// The key must be present, with any value.
    Present(String),
    /// The key must be present with exactly this value.
    Equals(String, String),
}

/// Exact-match, ANDed label query over runtime resources.
#[derive(Debug, Clone, Default)]
pub struct LabelFilter {
    terms: Vec<LabelTerm>,
}

impl LabelFilter {
    /// Creates an empty filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the key to be present with any value.
    #[must_use]
    pub fn has(mut self, key: impl Into<String>) -> Self {
        self.terms.push(LabelTerm::Present(key.into()));
        self
    }

    /// Requires the key to carry exactly this value.
    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms
            .push(LabelTerm::Equals(key.into(), value.into()));
        self
    }

    /// Filter for all resources owned by a namespace.
    #[must_use]
    pub fn owned(namespace: &str) -> Self {
        Self::new()
            .has(OWNERSHIP_LABEL)
            .eq(NAMESPACE_LABEL, namespace)
    }

    /// Filter for resources scoped to one blueprint within a namespace.
    #[must_use]
    pub fn blueprint_scoped(namespace: &str, blueprint: &str) -> Self {
        Self::owned(namespace).eq(BLUEPRINT_LABEL, blueprint)
    }

    /// Returns true when every term matches the given label set.
    #[must_use]
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.terms.iter().all(|term| match term {
            LabelTerm::Present(key) => labels.contains_key(key),
            LabelTerm::Equals(key, value) => labels.get(key) == Some(value),
        })
    }

    /// Renders the terms in the runtime's `key` / `key=value` filter syntax.
    #[must_use]
    pub fn to_runtime_terms(&self) -> Vec<String> {
        self.terms
            .iter()
            .map(|term| match term {
                LabelTerm::Present(key) => key.clone(),
                LabelTerm::Equals(key, value) => format!("{key}={value}"),
            })
            .collect()
    }
}

// =============================================================================
// Label Assembly
// =============================================================================

/// Ownership labels stamped on a network provisioned for a blueprint.
#[must_use]
pub fn network_labels(namespace: &str, blueprint: &str) -> HashMap<String, String> {
    HashMap::from([
        (OWNERSHIP_LABEL.to_string(), blueprint.to_string()),
        (NAMESPACE_LABEL.to_string(), namespace.to_string()),
        (BLUEPRINT_LABEL.to_string(), blueprint.to_string()),
    ])
}

/// Assembles the metadata labels for one committed image.
///
/// Credential retention follows the blueprint's allow-list: a non-empty
/// `keep_credentials_for` keeps only the listed identities' credentials, an
/// empty list keeps everything that was captured.
#[must_use]
pub fn image_labels(
    blueprint: &Blueprint,
    instance: &InstanceSpec,
    credentials: &HashMap<String, String>,
    device_ids: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut labels = HashMap::new();

    if blueprint.keep_credentials_for.is_empty() {
        for (identity, secret) in credentials {
            labels.insert(format!("{CREDENTIAL_LABEL_PREFIX}{identity}"), secret.clone());
        }
    } else {
        for identity in &blueprint.keep_credentials_for {
            if let Some(secret) = credentials.get(identity) {
                labels.insert(format!("{CREDENTIAL_LABEL_PREFIX}{identity}"), secret.clone());
            }
        }
    }

    for (identity, device_id) in device_ids {
        labels.insert(format!("{DEVICE_ID_LABEL_PREFIX}{identity}"), device_id.clone());
    }

    labels.extend(app_service_labels(instance));
    labels
}

/// One registration descriptor label per application service on the instance.
#[must_use]
pub fn app_service_labels(instance: &InstanceSpec) -> HashMap<String, String> {
    instance
        .app_services
        .iter()
        .map(|svc| {
            (
                format!("{APP_SERVICE_LABEL_PREFIX}{}", svc.id),
                registration_descriptor(svc),
            )
        })
        .collect()
}

/// Renders the registration descriptor for an application service.
///
/// Multi-line label values are unsupported by the runtime's commit-changes
/// syntax, so line breaks are inlined as literal `\n` escapes.
#[must_use]
pub fn registration_descriptor(svc: &AppServiceSpec) -> String {
    format!("id: {}\\n", svc.id)
        + &format!("inbound_token: {}\\n", svc.inbound_token)
        + &format!("outbound_token: {}\\n", svc.outbound_token)
        + &format!("url: '{}'\\n", svc.url)
        + &format!("sender: {}\\n", svc.sender)
        + &format!("rate_limited: {}\\n", svc.rate_limited)
        + &format!("push_ephemeral: {}\\n", svc.send_ephemeral)
        + &format!("enable_encryption: {}\\n", svc.enable_encryption)
        + "namespaces:\\n"
        + "  users:\\n"
        + "    - exclusive: false\\n"
        + "      regex: .*\\n"
        + "  rooms: []\\n"
        + "  aliases: []\\n"
}

/// Converts labels into commit change directives (`LABEL "k"="v"`).
///
/// Keys and values must not contain line breaks or unescaped `"` characters.
#[must_use]
pub fn to_changes(labels: &HashMap<String, String>) -> Vec<String> {
    labels
        .iter()
        .map(|(k, v)| format!("LABEL \"{k}\"=\"{v}\""))
        .collect()
}

/// Returns true when every name tag of an image begins with the local image
/// prefix. An image with any externally-obtained tag is presumed foreign and
/// must never be garbage collected, even if it carries the ownership label.
#[must_use]
pub fn is_locally_tagged(name_tags: &[String]) -> bool {
    name_tags.iter().all(|tag| tag.starts_with(LOCAL_IMAGE_PREFIX))
}

/// Deterministic image reference for a committed instance.
#[must_use]
pub fn image_reference(context: &str) -> String {
    format!("{LOCAL_IMAGE_PREFIX}:{context}")
}
