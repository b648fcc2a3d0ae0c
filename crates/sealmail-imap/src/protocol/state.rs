//! Connection state types.
//!
//! The four RFC 3501 states plus `Connecting`, the state before the server
//! greeting has arrived.

/// Connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Socket is being opened, no greeting yet.
    #[default]
    Connecting,

    /// Not authenticated - waiting for credentials.
    ///
    /// In this state, only these commands are valid:
    /// - CAPABILITY
    /// - NOOP
    /// - LOGOUT
    /// - STARTTLS (if available)
    /// - AUTHENTICATE
    /// - LOGIN
    NotAuthenticated,

    /// Authenticated - user has logged in (or the greeting was PREAUTH).
    Authenticated,

    /// Selected - a mailbox is currently open.
    Selected(SelectedState),

    /// Logout - the connection is closing or closed. Terminal.
    Logout,
}

impl ConnectionState {
    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns the selected mailbox name, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the selected mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }
}

/// State information when a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the selected mailbox.
    pub mailbox: String,
    /// Whether the mailbox is read-only (EXAMINE vs SELECT).
    pub read_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(mailbox: &str, read_only: bool) -> ConnectionState {
        ConnectionState::Selected(SelectedState {
            mailbox: mailbox.to_string(),
            read_only,
        })
    }

    #[test]
    fn test_default_is_connecting() {
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!ConnectionState::Connecting.is_authenticated());
        assert!(!ConnectionState::NotAuthenticated.is_authenticated());
        assert!(ConnectionState::Authenticated.is_authenticated());
        assert!(selected("INBOX", false).is_authenticated());
        assert!(!ConnectionState::Logout.is_authenticated());
    }

    #[test]
    fn test_selected_mailbox() {
        assert_eq!(ConnectionState::Authenticated.selected_mailbox(), None);
        assert_eq!(selected("Drafts", true).selected_mailbox(), Some("Drafts"));
        assert!(selected("Drafts", true).is_read_only());
        assert!(!selected("INBOX", false).is_read_only());
    }
}
