//! Error types for presence submission.

/// Boxed error returned by [`RpcTransport`](crate::RpcTransport) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The transport failed to establish an identity with the local peer.
    /// The peer's connected marker is reset, so a later attempt reconnects.
    #[error("Failed to connect to the RPC peer as {application_id}: {message}")]
    Connection {
        application_id: String,
        message: String,
    },

    /// The peer rejected or failed to process the activity update.
    #[error("Activity update request failed: {0}")]
    Request(String),
}
