//! Ambient caller identity
//!
//! The transport marks the current thread with the identity of the peer it
//! is serving. The dispatcher clears it before delegating to a controller so
//! controllers always run as the service itself.

use nix::unistd::{getpid, getuid};
use std::cell::Cell;
use std::fmt;

/// Who the current thread is acting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerIdentity {
    /// The broker's own process
    Service,
    /// A connected peer process
    Peer {
        /// Peer user id
        uid: u32,
        /// Peer process id, if the transport knows it
        pid: Option<i32>,
    },
}

impl CallerIdentity {
    /// Effective uid of the identity
    pub fn uid(&self) -> u32 {
        match self {
            CallerIdentity::Service => getuid().as_raw(),
            CallerIdentity::Peer { uid, .. } => *uid,
        }
    }

    /// Process id of the identity, if known
    pub fn pid(&self) -> Option<i32> {
        match self {
            CallerIdentity::Service => Some(getpid().as_raw()),
            CallerIdentity::Peer { pid, .. } => *pid,
        }
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerIdentity::Service => write!(f, "service(uid={})", self.uid()),
            CallerIdentity::Peer { uid, pid: Some(pid) } => write!(f, "peer(uid={uid}, pid={pid})"),
            CallerIdentity::Peer { uid, pid: None } => write!(f, "peer(uid={uid})"),
        }
    }
}

thread_local! {
    static CURRENT: Cell<CallerIdentity> = const { Cell::new(CallerIdentity::Service) };
}

/// Identity the current thread is acting for
pub fn calling_identity() -> CallerIdentity {
    CURRENT.with(Cell::get)
}

/// Run `f` on behalf of `identity`, restoring the previous one afterwards
pub fn with_calling_identity<R>(identity: CallerIdentity, f: impl FnOnce() -> R) -> R {
    let _guard = IdentityGuard {
        previous: CURRENT.with(|c| c.replace(identity)),
    };
    f()
}

/// Reset to the service identity until the guard drops
#[must_use = "the previous identity is restored when the guard drops"]
pub fn clear_calling_identity() -> IdentityGuard {
    IdentityGuard {
        previous: CURRENT.with(|c| c.replace(CallerIdentity::Service)),
    }
}

/// Restores the previous identity on drop
pub struct IdentityGuard {
    previous: CallerIdentity,
}

impl IdentityGuard {
    /// Identity that was active before the guard was taken
    pub fn previous(&self) -> CallerIdentity {
        self.previous
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: CallerIdentity = CallerIdentity::Peer {
        uid: 10_042,
        pid: Some(311),
    };

    #[test]
    fn test_default_is_service() {
        assert_eq!(calling_identity(), CallerIdentity::Service);
    }

    #[test]
    fn test_with_calling_identity_restores() {
        let inside = with_calling_identity(PEER, calling_identity);
        assert_eq!(inside, PEER);
        assert_eq!(calling_identity(), CallerIdentity::Service);
    }

    #[test]
    fn test_clear_inside_peer_scope() {
        with_calling_identity(PEER, || {
            {
                let guard = clear_calling_identity();
                assert_eq!(guard.previous(), PEER);
                assert_eq!(calling_identity(), CallerIdentity::Service);
            }
            assert_eq!(calling_identity(), PEER);
        });
    }

    #[test]
    fn test_identity_is_per_thread() {
        with_calling_identity(PEER, || {
            let other = std::thread::spawn(calling_identity).join().unwrap();
            assert_eq!(other, CallerIdentity::Service);
        });
    }

    #[test]
    fn test_display() {
        assert_eq!(PEER.to_string(), "peer(uid=10042, pid=311)");
        assert_eq!(PEER.uid(), 10_042);
        assert_eq!(PEER.pid(), Some(311));
    }
}
