//! Session state types.
//!
//! The full connection lifecycle, from before the transport exists to
//! after it is torn down:
//!
//! ```text
//! Disconnected → Connecting → NotAuthenticated → Authenticated ⇄ Selected
//!                                   │                    │
//!                                   └────── Logout ←─────┘
//!                                             │
//!                                          Closed
//! ```
//!
//! A PREAUTH greeting jumps straight to Authenticated; BYE forces Closed
//! from any state.

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport being established; greeting not yet consumed.
    Connecting,
    /// Greeting consumed; waiting for credentials.
    NotAuthenticated,
    /// Logged in; no mailbox selected.
    Authenticated,
    /// A mailbox is open.
    Selected(SelectedState),
    /// LOGOUT issued; waiting for the final BYE and tagged OK.
    Logout,
    /// Connection is finished; no more commands can be sent.
    Closed,
}

impl SessionState {
    /// Returns true if authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns true if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns true if the session can still issue commands.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !matches!(self, Self::Disconnected | Self::Closed)
    }

    /// The selected mailbox name, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns true if the selected mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }
}

/// State carried while a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Full name of the selected mailbox.
    pub mailbox: String,
    /// Whether the mailbox is read-only (EXAMINE, or denied write access).
    pub read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn usability() {
        assert!(!SessionState::Disconnected.is_usable());
        assert!(!SessionState::Closed.is_usable());
        assert!(SessionState::Connecting.is_usable());
        assert!(SessionState::NotAuthenticated.is_usable());
        assert!(SessionState::Authenticated.is_usable());
        assert!(SessionState::Logout.is_usable());
    }

    #[test]
    fn selected_accessors() {
        let state = SessionState::Selected(SelectedState {
            mailbox: "Drafts".to_string(),
            read_only: true,
        });
        assert!(state.is_authenticated());
        assert!(state.is_selected());
        assert_eq!(state.selected_mailbox(), Some("Drafts"));
        assert!(state.is_read_only());
    }

    #[test]
    fn authenticated_is_not_selected() {
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(!SessionState::Authenticated.is_selected());
        assert_eq!(SessionState::Authenticated.selected_mailbox(), None);
    }
}
