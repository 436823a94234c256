//! Host Error Types

use thiserror::Error;

use super::types::{SurfaceControl, WindowId};

/// Errors reported by host implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Layer handle no longer refers to a live layer
    #[error("Invalid surface control: {0}")]
    InvalidSurface(SurfaceControl),

    /// Window handle is unknown to the window system
    #[error("Unknown window: {0}")]
    UnknownWindow(WindowId),

    /// Window system refused to add the window
    #[error("Window rejected: {0}")]
    WindowRejected(String),

    /// Host callbacks can no longer be delivered
    #[error("Host worker unavailable")]
    WorkerUnavailable,
}
