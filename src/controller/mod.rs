//! Controller Capability Contract
//!
//! Every pluggable feature behind the dispatcher implements [`Controller`]:
//! it declares the action names it understands, applies a named action with
//! an [`ActionArgs`] bundle, and receives lifecycle signals.
//!
//! `apply` returns a plain `bool`. `false` means the operation failed (bad
//! precondition, host refusal); it is not an error of the control call
//! itself. Routing failures live in
//! [`ActionError`](crate::service::ActionError).

mod args;

pub use args::{ActionArgs, ArgValue};

use serde::{Deserialize, Serialize};
use std::fmt;

/// User session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl UserId {
    /// The primary (system) user
    pub const SYSTEM: UserId = UserId(0);
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Pluggable feature behind the dispatcher
#[cfg_attr(test, mockall::automock)]
pub trait Controller: Send + Sync {
    /// Action names this controller understands
    fn supported_actions(&self) -> &'static [&'static str];

    /// True if `action` is in [`supported_actions`](Self::supported_actions)
    fn supports_action(&self, action: &str) -> bool {
        self.supported_actions().contains(&action)
    }

    /// Apply a supported action
    fn apply(&self, action: &str, args: &ActionArgs) -> bool;

    /// Service bring-up finished
    fn on_start(&self);

    /// A user session was unlocked
    fn on_user_started(&self, _user: UserId) {}

    /// A user session stopped
    fn on_user_stopped(&self, _user: UserId) {}
}
