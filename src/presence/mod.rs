mod document;
mod input;
mod payload;

pub use document::{RichPresence, DEFAULT_BUTTON_URL, DEFAULT_INTERVAL};
pub use input::{AssetsInput, ButtonInput, MetadataInput, PresenceInput, TimestampsInput};
pub use payload::{Activity, ActivityAssets, ActivityButton, ActivityTimestamps};
