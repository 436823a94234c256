//! # builtin-broker
//!
//! Platform action broker with a virtual display lifecycle controller.
//!
//! Trusted processes ask the broker to perform named, privileged operations
//! on pluggable controllers. The one controller shipped here manages an
//! off-screen virtual display: it creates the device on a hidden overlay
//! surface, mirrors that surface into a caller's layer tree, rebinds the
//! device output, and tears everything down in a safe order.
//!
//! # Architecture
//!
//! ```text
//! builtin-broker
//!   ├─> ControlServer (Unix socket, JSON lines, peer credentials)
//!   ├─> BuiltInService
//!   │     └─> ActionDispatcher ── "vdisplay" ──> VirtualDisplayController
//!   │                                              ├─> WindowSystem (overlay window)
//!   │                                              ├─> DisplayManager (virtual display)
//!   │                                              └─> Compositor (mirror transactions)
//!   └─> UiWorker (serializes transactions and host callbacks)
//! ```
//!
//! # Data Flow
//!
//! **Action Path:** Client → ControlServer → ActionDispatcher → Controller → Host
//!
//! **Event Path:** Host → DisplayListener → CallbackList → ControlServer → Client

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Broker configuration
pub mod config;

/// Controller capability contract and action arguments
pub mod controller;

/// Host platform seams and the headless host
pub mod host;

/// Control socket server
pub mod server;

/// Broker service, dispatcher and subscriber list
pub mod service;

/// Utility functions
pub mod utils;

/// Virtual display lifecycle controller
pub mod vdisplay;

/// Serializing UI worker
pub mod worker;
