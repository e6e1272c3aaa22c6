use async_trait::async_trait;
use tokio::sync::watch;

use super::IdentityProvider;
use crate::common::Identity;
use crate::error::ChatError;

/// In-process identity provider. Holds the signed-in identity in a watch
/// channel so every subscriber sees sign-in, sign-out and verification.
pub struct LocalIdentity {
    sender: watch::Sender<Option<Identity>>,
}

impl LocalIdentity {
    pub fn new(initial: Option<Identity>) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self { sender }
    }

    pub fn sign_in(&self, identity: Identity) {
        log::info!(
            "Signed in as {} (verified: {})",
            identity.email,
            identity.verified
        );
        self.sender.send_replace(Some(identity));
    }

    /// Flags the current identity as verified. No-op when signed out.
    pub fn mark_verified(&self) {
        self.sender.send_if_modified(|current| match current {
            Some(identity) if !identity.verified => {
                identity.verified = true;
                true
            }
            _ => false,
        });
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.sender.subscribe()
    }

    async fn sign_out(&self) -> Result<(), ChatError> {
        if let Some(previous) = self.sender.send_replace(None) {
            log::info!("Signed out {}", previous.email);
        }
        Ok(())
    }
}

/// Returns the identity if it is signed in and verified.
pub fn require_verified(identity: Option<&Identity>) -> Result<&Identity, ChatError> {
    match identity {
        Some(identity) if identity.verified => Ok(identity),
        Some(identity) => Err(ChatError::Auth(format!(
            "{} has not verified their email",
            identity.email
        ))),
        None => Err(ChatError::Auth("not signed in".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(verified: bool) -> Identity {
        Identity {
            id: "alice".to_string(),
            email: "alice@example.com".to_string(),
            verified,
            display_name: None,
        }
    }

    #[tokio::test]
    async fn watchers_observe_verification_and_sign_out() {
        let provider = LocalIdentity::new(None);
        let mut watcher = provider.watch();

        provider.sign_in(identity(false));
        watcher.changed().await.unwrap();
        assert!(!watcher.borrow_and_update().as_ref().unwrap().verified);

        provider.mark_verified();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().as_ref().unwrap().verified);

        provider.sign_out().await.unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().is_none());
        assert!(provider.current_identity().is_none());
    }

    #[test]
    fn mark_verified_without_identity_does_nothing() {
        let provider = LocalIdentity::new(None);
        let watcher = provider.watch();
        provider.mark_verified();
        assert!(!watcher.has_changed().unwrap());
    }

    #[test]
    fn require_verified_rejects_unverified_and_signed_out() {
        assert!(require_verified(Some(&identity(true))).is_ok());
        assert!(matches!(
            require_verified(Some(&identity(false))),
            Err(ChatError::Auth(_))
        ));
        assert!(matches!(require_verified(None), Err(ChatError::Auth(_))));
    }
}
