//! Authentication context consumed by the connection manager.
//!
//! Token issuance and storage live outside this crate. The manager only
//! needs three things from the login context: the current bearer token,
//! the local participant id, and a way to refresh the token once.
//!
//! [`AuthContext`] is constructed on login and invalidated by
//! [`AuthContext::logout`]; sessions borrow it through an `Arc`.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::protocol::ParticipantId;

/// Source of credentials for a room session.
pub trait AuthProvider: Send + Sync + 'static {
    /// Token to present on the next connect, if logged in.
    fn current_token(&self) -> Option<String>;

    /// Identity of the local participant, used to recognise echoes.
    fn participant_id(&self) -> Option<ParticipantId>;

    /// Obtain a fresh token from the issuer.
    fn refresh_token(&self) -> impl Future<Output = Result<String, AuthError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("token refresh rejected: {0}")]
    Rejected(String),
    #[error("token refresh unavailable")]
    Unavailable,
    #[error("logged out")]
    LoggedOut,
}

type RefreshFn = Box<dyn Fn() -> BoxFuture<'static, Result<String, AuthError>> + Send + Sync>;

/// Login-scoped credentials.
pub struct AuthContext {
    participant: ParticipantId,
    token: RwLock<Option<String>>,
    refresher: RefreshFn,
}

impl AuthContext {
    /// Create a context for a logged-in participant.
    ///
    /// `refresher` is invoked on [`AuthProvider::refresh_token`]; a
    /// successful result replaces the stored token.
    pub fn new<F>(participant: ParticipantId, token: impl Into<String>, refresher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<String, AuthError>> + Send + Sync + 'static,
    {
        Self {
            participant,
            token: RwLock::new(Some(token.into())),
            refresher: Box::new(refresher),
        }
    }

    /// Context whose token can never be refreshed.
    pub fn without_refresh(participant: ParticipantId, token: impl Into<String>) -> Self {
        Self::new(participant, token, || {
            async { Err::<String, _>(AuthError::Unavailable) }.boxed()
        })
    }

    /// Drop the token. Later connects and refreshes fail.
    pub fn logout(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl AuthProvider for AuthContext {
    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn participant_id(&self) -> Option<ParticipantId> {
        if self.is_logged_in() {
            Some(self.participant.clone())
        } else {
            None
        }
    }

    async fn refresh_token(&self) -> Result<String, AuthError> {
        if !self.is_logged_in() {
            return Err(AuthError::LoggedOut);
        }
        let token = (self.refresher)().await?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_context(calls: Arc<AtomicUsize>) -> AuthContext {
        AuthContext::new(ParticipantId::new("u1"), "old", move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, AuthError>(format!("fresh-{n}")) }.boxed()
        })
    }

    #[test]
    fn test_current_token_and_participant() {
        let ctx = AuthContext::without_refresh(ParticipantId::new("u1"), "tok");
        assert_eq!(ctx.current_token().as_deref(), Some("tok"));
        assert_eq!(ctx.participant_id(), Some(ParticipantId::new("u1")));
    }

    #[tokio::test]
    async fn test_refresh_replaces_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = counting_context(calls.clone());

        assert_eq!(ctx.refresh_token().await.unwrap(), "fresh-0");
        assert_eq!(ctx.current_token().as_deref(), Some("fresh-0"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_unavailable_keeps_token() {
        let ctx = AuthContext::without_refresh(ParticipantId::new("u1"), "tok");
        assert_eq!(ctx.refresh_token().await, Err(AuthError::Unavailable));
        assert_eq!(ctx.current_token().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_logout_invalidates_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = counting_context(calls.clone());
        ctx.logout();

        assert!(ctx.current_token().is_none());
        assert!(ctx.participant_id().is_none());
        assert_eq!(ctx.refresh_token().await, Err(AuthError::LoggedOut));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
