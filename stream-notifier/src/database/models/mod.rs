//! Row models.
//!
//! These map directly onto the schema in `migrations/`; conversion into the
//! domain types happens here so repositories stay thin.

pub mod liveness;
pub mod subscription;
pub mod user;

pub use liveness::*;
pub use subscription::*;
pub use user::*;
