//! Fluent builder for rich-presence activity payloads.
//!
//! A [`RichPresence`] document collects state text, details, timestamps,
//! image keys and buttons, each either a literal or a deferred producer
//! resolved freshly on every submission, and submits the normalized payload
//! to a local peer through an injected [`RpcTransport`]. Documents come from
//! a [`ClientRegistry`], which owns one shared peer per application binding;
//! [`RichPresence::repeat`] re-submits on a timer so deferred fields can vary
//! over time.

mod error;
mod presence;
mod rpc;
mod value;

pub use error::{BoxError, PresenceError};
pub use presence::{
    Activity, ActivityAssets, ActivityButton, ActivityTimestamps, AssetsInput, ButtonInput,
    MetadataInput, PresenceInput, RichPresence, TimestampsInput, DEFAULT_BUTTON_URL,
    DEFAULT_INTERVAL,
};
pub use rpc::registry::{ClientBinding, ClientRegistry, DEFAULT_TRANSPORT};
pub use rpc::{RpcPeer, RpcTransport};
pub use value::{Seconds, TextValue, TimeValue};
