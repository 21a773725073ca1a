//! # answer-reveal - Streaming Answer Render Controller
//!
//! Progressively reveals assistant answers character by character. Two producers feed
//! it: a one-shot direct answer and an incremental agent log stream. Every query starts
//! a render cycle, and any reveal step that belongs to an older cycle is discarded, so
//! aborts and restarts never leak stale text onto the screen.
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - TOML configuration for pacing, markers and session limits
//! - [`markdown`] - Minimal markdown-to-markup transform
//! - [`render`] - Reveal controller, step scheduler, render service and terminal preview
//! - [`session`] - Research chat session: threads, wire events, outgoing requests
//! - [`app`] - Transcript replay orchestration

pub mod error;
pub mod config;
pub mod markdown;

pub mod render;
pub mod session;

pub mod app;

// Re-export commonly used types for convenience
pub use error::{Result, RevealError};

// Public API surface for external usage
pub use app::{Application, ReplayOptions, ReplayReport};
pub use config::Config;
pub use markdown::{ChunkPolicy, MarkupMarkers};
pub use render::{ActiveSource, CycleToken, RenderHandle, RenderSnapshot, RevealController};
pub use session::ResearchSession;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
