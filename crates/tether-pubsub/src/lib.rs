//! At-least-once event streams for tether.
//!
//! A [`PubSub`] delivers every published [`Message`] to each subscriber of
//! its topic. A subscriber settles a message with [`Message::ack`] or
//! [`Message::nack`]; a nacked or unsettled message is redelivered until
//! the redelivery budget is spent, after which it is published to
//! [`UNDELIVERABLE_TOPIC`].

pub mod error;
pub mod memory;
pub mod message;
pub mod traits;

pub use error::{PubSubError, PubSubResult};
pub use memory::{MemPubSub, PubSubConfig};
pub use message::{Message, ORIGINAL_TOPIC_KEY};
pub use traits::{PubSub, Subscription};

/// Topic carrying serialized anchor references.
pub const ANCHOR_TOPIC: &str = "anchor";

/// Topic carrying `<contentAddress>:<suffix>` DID events.
pub const DID_TOPIC: &str = "did";

/// Topic receiving messages whose redelivery budget is exhausted.
pub const UNDELIVERABLE_TOPIC: &str = "undeliverable";
