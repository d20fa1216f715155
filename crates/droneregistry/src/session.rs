//! Wallet session tracking.
//!
//! The session only records which account is connected. Account-change
//! notifications from the wallet update it through
//! [`Session::on_accounts_changed`]; registry state is never touched from
//! here. Writes check [`Session::is_authenticated`] before reaching the
//! ledger.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// The connected account, shared between the wallet callback and the
/// registry.
#[derive(Debug, Clone)]
pub struct Session {
    account: Arc<watch::Sender<Option<String>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a disconnected session.
    #[must_use]
    pub fn new() -> Self {
        let (account, _) = watch::channel(None);
        Self {
            account: Arc::new(account),
        }
    }

    /// Create a session already connected to `account`.
    #[must_use]
    pub fn connected(account: impl Into<String>) -> Self {
        let session = Self::new();
        session.connect(account);
        session
    }

    /// Connect `account`. An empty string disconnects.
    pub fn connect(&self, account: impl Into<String>) {
        let account = account.into();
        let next = (!account.is_empty()).then_some(account);
        self.account.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!(account = next.as_deref().unwrap_or(""), "Session account changed");
            current.clone_from(&next);
            true
        });
    }

    /// Drop the connected account.
    pub fn disconnect(&self) {
        self.connect(String::new());
    }

    /// Handle a wallet account-change notification.
    ///
    /// The first account becomes current; an empty list disconnects.
    pub fn on_accounts_changed(&self, accounts: &[String]) {
        self.connect(accounts.first().cloned().unwrap_or_default());
    }

    /// The connected account, if any.
    #[must_use]
    pub fn account(&self) -> Option<String> {
        self.account.borrow().clone()
    }

    /// Check whether an account is connected.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.account.borrow().is_some()
    }

    /// Watch account changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.account.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_disconnected() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert!(session.account().is_none());
    }

    #[test]
    fn test_connect_and_disconnect() {
        let session = Session::connected("0xabc");
        assert_eq!(session.account().as_deref(), Some("0xabc"));

        session.disconnect();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_empty_account_disconnects() {
        let session = Session::connected("0xabc");
        session.connect("");
        assert!(session.account().is_none());
    }

    #[test]
    fn test_accounts_changed_takes_first() {
        let session = Session::new();
        session.on_accounts_changed(&["0x1".to_string(), "0x2".to_string()]);
        assert_eq!(session.account().as_deref(), Some("0x1"));

        session.on_accounts_changed(&[]);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new();
        let wallet_side = session.clone();
        wallet_side.connect("0xfeed");
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let session = Session::new();
        let mut rx = session.subscribe();

        session.connect("0x1");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("0x1"));

        session.connect("0x1");
        assert!(!rx.has_changed().unwrap());
    }
}
