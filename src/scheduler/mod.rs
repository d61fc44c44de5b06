// file: src/scheduler/mod.rs
// description: scheduled release gate module exports
// reference: internal module structure

mod push;
mod window;

pub use push::{GateOutcome, PushScheduler, PushTask, TICK_INTERVAL};
pub use window::TimeWindow;
