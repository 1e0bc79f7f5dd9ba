//! Domain types shared by the monitor, the store and the delivery layer.

pub mod handle;
pub mod liveness;
pub mod stream;
pub mod subscription;

pub use handle::BroadcasterHandle;
pub use liveness::{LivenessRecord, LivenessState, Transition};
pub use stream::StreamSnapshot;
pub use subscription::{Destination, Privilege, Subscription};
