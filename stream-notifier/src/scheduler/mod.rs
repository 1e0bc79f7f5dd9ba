//! Poll scheduler.
//!
//! Drives the monitor on a fixed interval: every tick enumerates the
//! subscribed broadcasters and checks each one in its own task.

mod service;

pub use service::{Scheduler, SchedulerConfig, TickReport};
