//! Rendering subsystem.
//!
//! - [`protocol`]: tokens, tickets, commands and snapshots shared across the subsystem
//! - [`state`]: the clock-free reveal controller
//! - [`scheduler`]: cancellable batch tasks that emit timed reveal steps
//! - [`service`]: the task that owns a controller, plus its handle
//! - [`ui`]: ratatui preview of the revealed buffers

pub mod protocol;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod ui;

pub use protocol::{ActiveSource, CycleToken, Producer, RenderSnapshot, RevealState};
pub use service::{spawn_render_service, RenderHandle};
pub use state::RevealController;
