//! Listener reconciliation, keyed by port.
//!
//! Default actions are not compared here: they are reconciled as the
//! listener's default rule by [`super::reconcile::reconcile_rules`].

use super::types::{Certificate, Listener, ListenerProtocol};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Attribute changes for an existing listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerModification {
    pub listener_arn: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ListenerProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<Certificate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpn_policy: Option<Vec<String>>,
}

impl ListenerModification {
    fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.ssl_policy.is_none()
            && self.certificates.is_none()
            && self.alpn_policy.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListenerChanges {
    pub listeners_to_add: Vec<Listener>,
    pub listeners_to_modify: Vec<ListenerModification>,
    /// ARNs of live listeners on ports that are no longer declared
    pub listeners_to_delete: Vec<String>,
}

impl ListenerChanges {
    pub fn has_changes(&self, purge_listeners: bool) -> bool {
        !self.listeners_to_add.is_empty()
            || !self.listeners_to_modify.is_empty()
            || (purge_listeners && !self.listeners_to_delete.is_empty())
    }
}

/// Compare one live listener with the declared listener on the same port
pub fn compare_listener(current: &Listener, declared: &Listener) -> Option<ListenerModification> {
    let mut modification = ListenerModification {
        listener_arn: current.listener_arn.clone().unwrap_or_default(),
        port: declared.port,
        protocol: None,
        ssl_policy: None,
        certificates: None,
        alpn_policy: None,
    };

    if current.protocol != declared.protocol {
        modification.protocol = Some(declared.protocol);
    }

    if declared.protocol.requires_certificate() {
        if declared.ssl_policy.is_some() && current.ssl_policy != declared.ssl_policy {
            modification.ssl_policy = declared.ssl_policy.clone();
        }

        // Only the default certificate is managed on the listener itself
        let current_cert = current.certificates.first().map(|c| &c.certificate_arn);
        let declared_cert = declared.certificates.first().map(|c| &c.certificate_arn);
        if declared_cert.is_some() && current_cert != declared_cert {
            modification.certificates = Some(declared.certificates[..1].to_vec());
        }
    }

    if !declared.alpn_policy.is_empty() && current.alpn_policy != declared.alpn_policy {
        modification.alpn_policy = Some(declared.alpn_policy.clone());
    }

    if modification.is_empty() {
        None
    } else {
        Some(modification)
    }
}

/// Reconcile declared listeners against the live listeners of a load balancer
pub fn compare_listeners(current: &[Listener], declared: &[Listener]) -> ListenerChanges {
    let mut changes = ListenerChanges::default();
    let mut by_port: IndexMap<u16, &Listener> =
        current.iter().map(|listener| (listener.port, listener)).collect();

    for wanted in declared {
        match by_port.shift_remove(&wanted.port) {
            Some(live) => {
                if let Some(modification) = compare_listener(live, wanted) {
                    tracing::debug!(port = wanted.port, "listener attributes differ");
                    changes.listeners_to_modify.push(modification);
                }
            }
            None => changes.listeners_to_add.push(wanted.clone()),
        }
    }

    changes.listeners_to_delete = by_port
        .into_values()
        .filter_map(|listener| listener.listener_arn.clone())
        .collect();

    changes
}
