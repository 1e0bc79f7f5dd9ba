//! Twitch Helix client.
//!
//! Only the small part of the Helix API needed to answer "is this channel live
//! right now, and what is it streaming?" is implemented here:
//!
//! - [`HelixClient::get_stream`] queries `GET /streams?user_login=...`
//! - [`HelixStream`] mirrors the fields of a stream entry we care about
//! - [`HelixError`] classifies transport, parse and API failures
//!
//! Credentials are consumed as-is; obtaining or refreshing the app access
//! token is the caller's concern.

pub mod client;
pub mod error;
pub mod models;

pub use client::{DEFAULT_BASE_URL, HelixClient};
pub use error::HelixError;
pub use models::{HelixStream, StreamsResponse};
