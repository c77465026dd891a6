//! The RPC collaborator seam.
//!
//! Wire transport, handshake and request framing live behind [`RpcTransport`];
//! this layer only tracks the connected identity per peer and shapes the
//! `SET_ACTIVITY` request. Peers are shared process-wide through the
//! [`registry`](crate::ClientRegistry) and outlive any single document; they
//! are never closed here.

pub mod registry;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BoxError, PresenceError};
use crate::presence::Activity;

const SET_ACTIVITY_COMMAND: &str = "SET_ACTIVITY";

/// The external RPC client collaborator. Implementations own the socket or
/// pipe, the handshake, and request multiplexing.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Establish an identity with the local peer.
    async fn connect(&self, application_id: &str) -> Result<(), BoxError>;

    /// Issue a command and return the peer's acknowledgement payload.
    async fn request(&self, command: &str, args: Value) -> Result<Value, BoxError>;
}

#[derive(Serialize)]
struct SetActivityArgs<'a> {
    pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity: Option<&'a Activity>,
}

/// A transport plus the application id it is currently connected under.
pub struct RpcPeer {
    transport: Box<dyn RpcTransport>,
    connected: Mutex<Option<String>>,
}

impl RpcPeer {
    pub fn new(transport: Box<dyn RpcTransport>) -> Self {
        Self {
            transport,
            connected: Mutex::new(None),
        }
    }

    /// The application id this peer connected under, if any.
    pub fn connected_application_id(&self) -> Option<String> {
        self.connected.lock().clone()
    }

    /// Connect unless an identity is already established. On failure the
    /// marker is reset so a later submission attempts a fresh connect.
    pub(crate) async fn ensure_connected(
        &self,
        application_id: &str,
    ) -> Result<(), PresenceError> {
        if self.connected.lock().is_some() {
            return Ok(());
        }

        match self.transport.connect(application_id).await {
            Ok(()) => {
                *self.connected.lock() = Some(application_id.to_owned());
                tracing::info!("Connected to RPC peer as {}", application_id);
                Ok(())
            }
            Err(error) => {
                *self.connected.lock() = None;
                tracing::warn!("Failed to connect to RPC peer: {}", error);
                Err(PresenceError::Connection {
                    application_id: application_id.to_owned(),
                    message: error.to_string(),
                })
            }
        }
    }

    /// Send the activity update (or the clear signal when `activity` is
    /// absent) for the given process id.
    pub(crate) async fn set_activity(
        &self,
        pid: u32,
        activity: Option<&Activity>,
    ) -> Result<Value, PresenceError> {
        let args = serde_json::to_value(SetActivityArgs { pid, activity })
            .map_err(|error| PresenceError::Request(error.to_string()))?;
        self.transport
            .request(SET_ACTIVITY_COMMAND, args)
            .await
            .map_err(|error| PresenceError::Request(error.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::Value;

    use super::registry::ClientRegistry;
    use super::{BoxError, RpcTransport};

    /// In-memory transport recording every call; shared by the test suites.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        pub(crate) state: Arc<MockState>,
    }

    #[derive(Default)]
    pub(crate) struct MockState {
        pub(crate) connects: Mutex<Vec<String>>,
        pub(crate) requests: Mutex<Vec<(String, Value)>>,
        pub(crate) fail_connect: AtomicBool,
        pub(crate) fail_request: AtomicBool,
    }

    #[async_trait::async_trait]
    impl RpcTransport for MockTransport {
        async fn connect(&self, application_id: &str) -> Result<(), BoxError> {
            if self.state.fail_connect.load(Ordering::SeqCst) {
                return Err("peer unavailable".into());
            }
            self.state.connects.lock().push(application_id.to_owned());
            Ok(())
        }

        async fn request(&self, command: &str, args: Value) -> Result<Value, BoxError> {
            if self.state.fail_request.load(Ordering::SeqCst) {
                return Err("peer rejected the request".into());
            }
            let ack = args.get("activity").cloned().unwrap_or(Value::Null);
            self.state
                .requests
                .lock()
                .push((command.to_owned(), args));
            // The peer acknowledges by echoing the activity back.
            Ok(ack)
        }
    }

    impl MockTransport {
        pub(crate) fn request_count(&self) -> usize {
            self.state.requests.lock().len()
        }

        pub(crate) fn last_args(&self) -> Option<Value> {
            self.state
                .requests
                .lock()
                .last()
                .map(|(_, args)| args.clone())
        }
    }

    pub(crate) fn mock_registry() -> (ClientRegistry, MockTransport) {
        let mock = MockTransport::default();
        let transport = mock.clone();
        let registry = ClientRegistry::new("100000000000000000", move |_| {
            Box::new(transport.clone()) as Box<dyn RpcTransport>
        });
        registry.set_pid_source(|| 4242);
        (registry, mock)
    }
}
