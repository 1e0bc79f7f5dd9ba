//! Repository layer for database access.
//!
//! Each repository is an object-safe async trait with a sqlx implementation,
//! so the monitor can be driven by in-memory fakes in tests.

pub mod liveness;
pub mod subscription;
pub mod user;

pub use liveness::*;
pub use subscription::*;
pub use user::*;
