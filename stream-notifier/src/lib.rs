//! stream-notifier: watches Twitch broadcasters and announces when they go
//! live to subscribed Telegram chats, retracting the announcement when the
//! broadcast ends.

pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
