//! The cooperative monitoring loop and its session lifecycle.

mod controller;
mod loop_worker;
mod session;

pub use controller::MonitorController;
pub use loop_worker::{monitor_loop, MonitorEvent, SignalSuite};
pub use session::SessionContext;
