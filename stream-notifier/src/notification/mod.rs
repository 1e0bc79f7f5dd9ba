//! Notification delivery.
//!
//! Turns a detected transition into outbound messages:
//! - [`MessageComposer`] renders the announcement text per privilege tier
//! - [`DeliveryFanout`] resolves destinations and dispatches sends/deletes
//! - [`MessagingGateway`] is the transport seam, implemented for Telegram by
//!   [`channels::TelegramGateway`]

pub mod channels;
pub mod fanout;
pub mod gateway;
pub mod message;

pub use channels::{TelegramConfig, TelegramGateway};
pub use fanout::{DeliveryFanout, FanoutConfig};
pub use gateway::{DeliveryError, MessagingGateway};
pub use message::{DEFAULT_PROMO_FOOTER, MessageComposer, escape_markdown};
