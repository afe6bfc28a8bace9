//! Sign-in, password reset and sign-out flows.
//!
//! [`AuthService`] drives the provider the way the login, reset-password and navbar pages do:
//! it raises the toasts and performs the navigation. Provider errors are passed through to the
//! user unchanged and never retried.

use crate::error::AuthError;
use crate::notify::{Notifier, Toast};
use crate::ports::AuthProvider;
use crate::routes::{Navigator, Route};
use crate::session::Identity;
use healthrec_types::EmailAddress;
use std::sync::Arc;

/// Where a successful sign-in lands.
pub const POST_LOGIN_ROUTE: Route = Route::Dashboard;

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            provider,
            navigator,
            notifier,
        }
    }

    /// Email/password sign-in.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError`, after showing it as a destructive toast. A malformed
    /// email address is reported the same way without contacting the provider.
    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let email = match EmailAddress::parse(email) {
            Ok(email) => email,
            Err(e) => return Err(self.report(AuthError::InvalidEmail(e.to_string()))),
        };

        match self.provider.sign_in_with_email(&email, password).await {
            Ok(identity) => Ok(self.signed_in(identity)),
            Err(e) => Err(self.report(e)),
        }
    }

    /// Federated (Google) sign-in.
    pub async fn sign_in_with_google(&self) -> Result<Identity, AuthError> {
        match self.provider.sign_in_with_google().await {
            Ok(identity) => Ok(self.signed_in(identity)),
            Err(e) => Err(self.report(e)),
        }
    }

    /// Requests a password reset email.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = match EmailAddress::parse(email) {
            Ok(email) => email,
            Err(e) => return Err(self.report(AuthError::InvalidEmail(e.to_string()))),
        };

        match self.provider.send_password_reset(&email).await {
            Ok(()) => {
                self.notifier.notify(Toast::success("Password reset email sent"));
                Ok(())
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Signs out. Failures are logged, not shown.
    pub async fn sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::error!("Error signing out: {}", e);
        }
    }

    fn signed_in(&self, identity: Identity) -> Identity {
        tracing::info!(user = %identity.id, "signed in");
        self.notifier.notify(Toast::success("Logged in successfully"));
        self.navigator.navigate(POST_LOGIN_ROUTE);
        identity
    }

    fn report(&self, error: AuthError) -> AuthError {
        tracing::warn!("sign-in flow failed: {}", error);
        self.notifier.notify(Toast::error(error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::local_auth::{LocalAccount, LocalAuthProvider};
    use crate::notify::{CollectingNotifier, ToastVariant};
    use crate::routes::HistoryNavigator;

    struct Fixture {
        service: AuthService,
        navigator: Arc<HistoryNavigator>,
        notifier: Arc<CollectingNotifier>,
    }

    fn fixture() -> Fixture {
        let account =
            LocalAccount::new("u-jane", "jane@example.com", Some("Jane Doe"), "secret").unwrap();
        let provider = Arc::new(LocalAuthProvider::in_memory(vec![account]));
        let navigator = Arc::new(HistoryNavigator::new());
        let notifier = Arc::new(CollectingNotifier::new());
        Fixture {
            service: AuthService::new(provider, navigator.clone(), notifier.clone()),
            navigator,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_sign_in_success_toasts_and_navigates() {
        let f = fixture();

        let identity = f
            .service
            .sign_in_with_email("Jane@Example.com", "secret")
            .await
            .unwrap();

        assert_eq!(identity.id.as_str(), "u-jane");
        assert_eq!(f.navigator.history(), vec![Route::Dashboard]);
        let toasts = f.notifier.drain();
        assert_eq!(toasts, vec![Toast::success("Logged in successfully")]);
    }

    #[tokio::test]
    async fn test_sign_in_failure_surfaces_provider_message() {
        let f = fixture();

        let err = f
            .service
            .sign_in_with_email("jane@example.com", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(f.navigator.history().is_empty());
        let toasts = f.notifier.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].variant, ToastVariant::Destructive);
        assert_eq!(toasts[0].title, AuthError::InvalidCredentials.to_string());
    }

    #[tokio::test]
    async fn test_malformed_email_rejected_locally() {
        let f = fixture();
        let err = f.service.sign_in_with_email("jane", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn test_google_unavailable_locally() {
        let f = fixture();
        let err = f.service.sign_in_with_google().await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedMethod(_)));
        assert_eq!(f.notifier.drain()[0].title, "Google sign-in is not available");
    }

    #[tokio::test]
    async fn test_password_reset_toasts() {
        let f = fixture();

        f.service.send_password_reset("jane@example.com").await.unwrap();
        assert_eq!(
            f.notifier.drain(),
            vec![Toast::success("Password reset email sent")]
        );

        let err = f
            .service
            .send_password_reset("nobody@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownAccount(_)));
    }
}
