//! Virtual display action vocabulary

use std::fmt;
use std::str::FromStr;

/// Controller name the virtual display controller registers under
pub const CONTROLLER_ID: &str = "vdisplay";

/// Layer handle (ATTACH) or output surface (REPARENT) argument
pub const ARG_PARENT_SURFACE: &str = "PARENT_SURFACE";

/// Display the ATTACH parent lives on; defaults to the primary display
pub const ARG_DISPLAY_ID: &str = "DISPLAY_ID";

/// Actions understood by the virtual display controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualDisplayAction {
    /// Create the device on the host surface
    Create,
    /// Release the device
    Destroy,
    /// Mirror the host surface under a caller layer
    Attach,
    /// Remove the mirror
    Detach,
    /// Rebind the device output to a caller surface
    Reparent,
    /// Rebind the device output to the host surface
    Reset,
}

impl VirtualDisplayAction {
    /// Every action, in declaration order
    pub const ALL: [VirtualDisplayAction; 6] = [
        VirtualDisplayAction::Create,
        VirtualDisplayAction::Destroy,
        VirtualDisplayAction::Attach,
        VirtualDisplayAction::Detach,
        VirtualDisplayAction::Reparent,
        VirtualDisplayAction::Reset,
    ];

    /// Wire names of [`ALL`](Self::ALL)
    pub const NAMES: &'static [&'static str] =
        &["CREATE", "DESTROY", "ATTACH", "DETACH", "REPARENT", "RESET"];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            VirtualDisplayAction::Create => "CREATE",
            VirtualDisplayAction::Destroy => "DESTROY",
            VirtualDisplayAction::Attach => "ATTACH",
            VirtualDisplayAction::Detach => "DETACH",
            VirtualDisplayAction::Reparent => "REPARENT",
            VirtualDisplayAction::Reset => "RESET",
        }
    }
}

impl fmt::Display for VirtualDisplayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized action name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl FromStr for VirtualDisplayAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VirtualDisplayAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
