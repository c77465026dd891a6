//! Process-wide client registry.
//!
//! One connected peer is reused per distinct `(application id, transport)`
//! binding, with a single default peer for documents that specify none. The
//! registry is an explicit value rather than ambient global state, so tests
//! build a fresh one per case while applications share clones of one handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{RpcPeer, RpcTransport};
use crate::presence::{PresenceInput, RichPresence};

/// Transport configuration name used when callers specify none.
pub const DEFAULT_TRANSPORT: &str = "ipc";

/// A non-default client binding carried by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    pub application_id: String,
    pub transport: String,
}

type Connector = Box<dyn Fn(&str) -> Box<dyn RpcTransport> + Send + Sync>;

/// Cheap-clone handle; clones share the same peer map.
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    default_application_id: String,
    default_transport: String,
    connector: Connector,
    default_peer: Arc<RpcPeer>,
    peers: Mutex<HashMap<(String, String), Arc<RpcPeer>>>,
    pid_source: Mutex<fn() -> u32>,
}

fn process_id() -> u32 {
    std::process::id()
}

impl ClientRegistry {
    /// Registry over the default transport configuration.
    pub fn new(
        default_application_id: impl Into<String>,
        connector: impl Fn(&str) -> Box<dyn RpcTransport> + Send + Sync + 'static,
    ) -> Self {
        Self::with_transport(default_application_id, DEFAULT_TRANSPORT, connector)
    }

    pub fn with_transport(
        default_application_id: impl Into<String>,
        default_transport: impl Into<String>,
        connector: impl Fn(&str) -> Box<dyn RpcTransport> + Send + Sync + 'static,
    ) -> Self {
        let connector: Connector = Box::new(connector);
        let default_transport = default_transport.into();
        let default_peer = Arc::new(RpcPeer::new(connector(&default_transport)));

        Self {
            inner: Arc::new(RegistryInner {
                default_application_id: default_application_id.into(),
                default_transport,
                connector,
                default_peer,
                peers: Mutex::new(HashMap::new()),
                pid_source: Mutex::new(process_id),
            }),
        }
    }

    /// Override where submissions read the current process id from.
    pub fn set_pid_source(&self, pid_source: fn() -> u32) {
        *self.inner.pid_source.lock() = pid_source;
    }

    pub fn default_application_id(&self) -> &str {
        &self.inner.default_application_id
    }

    pub fn default_transport(&self) -> &str {
        &self.inner.default_transport
    }

    pub(crate) fn pid(&self) -> u32 {
        let pid_source = *self.inner.pid_source.lock();
        pid_source()
    }

    /// Build a presence document from loose input. Accepts the typed
    /// [`PresenceInput`] or raw `serde_json::Value`; construction never
    /// fails.
    pub fn presence(&self, input: impl Into<PresenceInput>) -> RichPresence {
        let input = input.into();
        let binding = self.binding_for(&input);
        RichPresence::from_parts(self.clone(), binding, input)
    }

    /// A binding is only non-default when the input names an application id
    /// or transport differing from the registry defaults.
    fn binding_for(&self, input: &PresenceInput) -> Option<ClientBinding> {
        let differing_id = input
            .client_id
            .as_deref()
            .is_some_and(|id| id != self.inner.default_application_id);
        let differing_transport = input
            .transport
            .as_deref()
            .is_some_and(|transport| transport != self.inner.default_transport);

        if differing_id || differing_transport {
            Some(ClientBinding {
                application_id: input
                    .client_id
                    .clone()
                    .unwrap_or_else(|| self.inner.default_application_id.clone()),
                transport: input
                    .transport
                    .clone()
                    .unwrap_or_else(|| self.inner.default_transport.clone()),
            })
        } else {
            None
        }
    }

    /// The peer a document submits through, plus the application id to
    /// connect under. Bound peers are created on first use and reused.
    pub(crate) fn peer_for(&self, binding: Option<&ClientBinding>) -> (Arc<RpcPeer>, String) {
        match binding {
            None => (
                Arc::clone(&self.inner.default_peer),
                self.inner.default_application_id.clone(),
            ),
            Some(binding) => {
                let key = (binding.application_id.clone(), binding.transport.clone());
                let mut peers = self.inner.peers.lock();
                let peer = peers.entry(key).or_insert_with(|| {
                    tracing::debug!(
                        "Creating RPC peer for {} over {}",
                        binding.application_id,
                        binding.transport
                    );
                    Arc::new(RpcPeer::new((self.inner.connector)(&binding.transport)))
                });
                (Arc::clone(peer), binding.application_id.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::mock_registry;
    use serde_json::json;

    #[test]
    fn default_peer_is_reused() {
        let (registry, _mock) = mock_registry();
        let (first, id) = registry.peer_for(None);
        let (second, _) = registry.peer_for(None);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(id, registry.default_application_id());
    }

    #[test]
    fn bound_peers_are_keyed_by_application_and_transport() {
        let (registry, _mock) = mock_registry();
        let ipc = ClientBinding {
            application_id: "999".to_owned(),
            transport: "ipc".to_owned(),
        };
        let websocket = ClientBinding {
            application_id: "999".to_owned(),
            transport: "websocket".to_owned(),
        };

        let (first, _) = registry.peer_for(Some(&ipc));
        let (again, _) = registry.peer_for(Some(&ipc));
        let (other, _) = registry.peer_for(Some(&websocket));

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn matching_defaults_produce_no_binding() {
        let (registry, _mock) = mock_registry();

        let unbound = registry.presence(json!({
            "clientID": registry.default_application_id(),
            "transport": registry.default_transport(),
        }));
        assert_eq!(unbound.application_id(), registry.default_application_id());

        let bound = registry.presence(json!({ "clientID": "999" }));
        assert_eq!(bound.application_id(), "999");
    }

    #[test]
    fn registry_clones_share_the_peer_map() {
        let (registry, _mock) = mock_registry();
        let clone = registry.clone();
        let binding = ClientBinding {
            application_id: "999".to_owned(),
            transport: "ipc".to_owned(),
        };

        let (first, _) = registry.peer_for(Some(&binding));
        let (second, _) = clone.peer_for(Some(&binding));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
