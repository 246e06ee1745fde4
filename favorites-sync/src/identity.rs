//! Identity boundary.
//!
//! The authentication subsystem owns sessions; the engine only needs to
//! know who is signed in right now and to hear about changes.

use favorites_types::UserId;
use tokio::sync::watch;
use tracing::info;

/// Source of the current user identity.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    /// A receiver that observes every login, logout and user switch.
    fn watch(&self) -> watch::Receiver<Option<UserId>>;
}

/// Identity provider backed by a watch channel.
///
/// The authentication layer calls [`login`](Self::login) and
/// [`logout`](Self::logout); engines bound through
/// `FavoritesEngine::follow_identity` react to every change.
#[derive(Debug)]
pub struct SessionIdentity {
    tx: watch::Sender<Option<UserId>>,
}

impl SessionIdentity {
    /// Creates a session with nobody signed in.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Creates a session that starts signed in as `user`.
    pub fn signed_in(user: UserId) -> Self {
        let (tx, _rx) = watch::channel(Some(user));
        Self { tx }
    }

    /// Signs `user` in, replacing any previous user.
    pub fn login(&self, user: UserId) {
        info!("Session signed in as {}", user);
        self.tx.send_replace(Some(user));
    }

    /// Signs the current user out.
    pub fn logout(&self) {
        info!("Session signed out");
        self.tx.send_replace(None);
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}
