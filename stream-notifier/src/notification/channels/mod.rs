//! Messaging platform gateways.

mod telegram;

pub use telegram::{DEFAULT_API_URL as DEFAULT_TELEGRAM_API_URL, TelegramConfig, TelegramGateway};
