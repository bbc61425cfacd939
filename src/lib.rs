//! Real-time webcam affect monitoring.
//!
//! Two independent per-frame signals, facial emotion classification and
//! eye-closure fatigue detection, are fused into a stabilized, debounced
//! event stream that can proactively open a wellness conversation once per
//! session. The ML models, the capture device, and the chat backend are
//! external collaborators; this crate owns the temporal stabilization
//! pipeline and the durable session state.

pub mod chat;
pub mod config;
pub mod emotion;
pub mod fatigue;
pub mod monitor;
pub mod signal;
pub mod store;
pub mod trigger;

pub use config::MonitorConfig;
pub use monitor::{MonitorController, MonitorEvent, SignalSuite};
