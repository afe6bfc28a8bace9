//! File-backed auth provider.
//!
//! Accounts live in `accounts.yaml`:
//!
//! ```yaml
//! accounts:
//!   - id: u-jane
//!     email: jane@example.com
//!     display_name: Jane Doe
//!     password_sha256: 2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b
//! ```
//!
//! The signed-in identity is persisted to `session.json` so that separate CLI invocations share
//! one session. Password reset "emails" are appended to an outbox file.

use crate::constants::{ACCOUNTS_FILENAME, RESET_OUTBOX_FILENAME, SESSION_FILENAME};
use crate::error::AuthError;
use crate::ports::{AuthProvider, AuthSubscription};
use crate::session::Identity;
use async_trait::async_trait;
use healthrec_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Hex SHA-256 digest of a password, as stored in `accounts.yaml`.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// One entry of `accounts.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: NonEmptyText,
    pub email: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub password_sha256: String,
}

impl LocalAccount {
    /// Builds an account from plain values, hashing the password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed email and `AuthError::Provider` for an
    /// empty id.
    pub fn new(
        id: &str,
        email: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<Self, AuthError> {
        let id = NonEmptyText::new(id)
            .map_err(|e| AuthError::Provider(format!("invalid account id: {}", e)))?;
        let email = EmailAddress::parse(email).map_err(|e| AuthError::InvalidEmail(e.to_string()))?;

        Ok(Self {
            id,
            email,
            display_name: display_name.map(str::to_owned),
            password_sha256: password_digest(password),
        })
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }

    fn verify(&self, password: &str) -> bool {
        self.password_sha256.eq_ignore_ascii_case(&password_digest(password))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<LocalAccount>,
}

/// Auth provider backed by local files, or purely in memory.
#[derive(Debug)]
pub struct LocalAuthProvider {
    accounts: Vec<LocalAccount>,
    state_dir: Option<PathBuf>,
    current: Mutex<Option<Identity>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Option<Identity>>>>,
}

impl LocalAuthProvider {
    /// A provider with fixed accounts and nothing persisted.
    pub fn in_memory(accounts: Vec<LocalAccount>) -> Self {
        Self {
            accounts,
            state_dir: None,
            current: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Loads accounts and any persisted session from `dir`.
    ///
    /// A missing accounts file means no accounts. A persisted session for an account that no
    /// longer exists is ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if a file exists but cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self, AuthError> {
        let accounts = read_accounts(&dir.join(ACCOUNTS_FILENAME))?;

        let session_path = dir.join(SESSION_FILENAME);
        let current = match std::fs::read_to_string(&session_path) {
            Ok(contents) => {
                let identity: Identity = serde_json::from_str(&contents)
                    .map_err(|e| AuthError::Storage(format!("{}: {}", session_path.display(), e)))?;
                if accounts.iter().any(|a| a.id == identity.id) {
                    Some(identity)
                } else {
                    tracing::warn!(user = %identity.id, "ignoring session for unknown account");
                    None
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };

        tracing::debug!(accounts = accounts.len(), dir = %dir.display(), "local accounts loaded");

        Ok(Self {
            accounts,
            state_dir: Some(dir.to_path_buf()),
            current: Mutex::new(current),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Adds an account to `accounts.yaml` in `dir`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if the id or email is already taken and
    /// `AuthError::Storage` if the file cannot be read or written.
    pub fn add_account(dir: &Path, account: LocalAccount) -> Result<(), AuthError> {
        let path = dir.join(ACCOUNTS_FILENAME);
        let mut file = AccountsFile {
            accounts: read_accounts(&path)?,
        };

        if file
            .accounts
            .iter()
            .any(|a| a.id == account.id || a.email == account.email)
        {
            return Err(AuthError::Provider(format!(
                "an account already exists for {}",
                account.email
            )));
        }

        tracing::info!(user = %account.id, "local account added");
        file.accounts.push(account);

        let yaml = serde_yaml::to_string(&file).map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::create_dir_all(dir).map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::write(&path, yaml).map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Reads `accounts.yaml` in `dir` afresh and returns the display name for `id`.
    ///
    /// For long-running readers such as the processing service, which must see accounts added
    /// after they started.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the file exists but cannot be read or parsed.
    pub fn lookup_display_name(dir: &Path, id: &str) -> Result<Option<String>, AuthError> {
        let accounts = read_accounts(&dir.join(ACCOUNTS_FILENAME))?;
        Ok(accounts
            .into_iter()
            .find(|a| a.id.as_str() == id)
            .and_then(|a| a.display_name))
    }

    /// Display name for an account id, if the account has one.
    pub fn account_display_name(&self, id: &str) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.id.as_str() == id)
            .and_then(|a| a.display_name.as_deref())
    }

    fn current(&self) -> Option<Identity> {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Records the new state and tells every live subscriber.
    fn publish(&self, identity: Option<Identity>) {
        match self.current.lock() {
            Ok(mut current) => *current = identity.clone(),
            Err(poisoned) => *poisoned.into_inner() = identity.clone(),
        }

        let mut subscribers = match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(identity.clone()).is_ok());
    }

    async fn persist_session(&self, identity: Option<&Identity>) -> Result<(), AuthError> {
        let Some(dir) = &self.state_dir else {
            return Ok(());
        };
        let path = dir.join(SESSION_FILENAME);

        match identity {
            Some(identity) => {
                let json = serde_json::to_string_pretty(identity)
                    .map_err(|e| AuthError::Storage(e.to_string()))?;
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| AuthError::Storage(e.to_string()))?;
                tokio::fs::write(&path, json)
                    .await
                    .map_err(|e| AuthError::Storage(e.to_string()))
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AuthError::Storage(e.to_string())),
            },
        }
    }
}

fn read_accounts(path: &Path) -> Result<Vec<LocalAccount>, AuthError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let file: AccountsFile = serde_yaml::from_str(&contents)
                .map_err(|e| AuthError::Storage(format!("{}: {}", path.display(), e)))?;
            Ok(file.accounts)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(AuthError::Storage(e.to_string())),
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in_with_email(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let account = self
            .accounts
            .iter()
            .find(|a| &a.email == email && a.verify(password))
            .ok_or(AuthError::InvalidCredentials)?;

        let identity = account.identity();
        self.persist_session(Some(&identity)).await?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_google(&self) -> Result<Identity, AuthError> {
        Err(AuthError::UnsupportedMethod("Google".into()))
    }

    async fn send_password_reset(&self, email: &EmailAddress) -> Result<(), AuthError> {
        if !self.accounts.iter().any(|a| &a.email == email) {
            return Err(AuthError::UnknownAccount(email.to_string()));
        }

        let Some(dir) = &self.state_dir else {
            tracing::info!(email = %email, "password reset requested");
            return Ok(());
        };

        let line = format!("{}\t{}\n", chrono::Utc::now().to_rfc3339(), email);
        let mut outbox = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(RESET_OUTBOX_FILENAME))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        outbox
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        // tokio files write on a blocking thread; the line must be on disk before Ok.
        outbox
            .flush()
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        outbox
            .sync_all()
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        tracing::info!(email = %email, "password reset queued");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.persist_session(None).await?;
        self.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still alive here, so this send cannot fail.
        let _ = tx.send(self.current());

        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn jane() -> LocalAccount {
        LocalAccount::new("u-jane", "jane@example.com", Some("Jane Doe"), "secret").unwrap()
    }

    fn email(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    #[test]
    fn test_password_digest_is_sha256_hex() {
        assert_eq!(
            password_digest("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn test_account_rejects_bad_input() {
        assert!(matches!(
            LocalAccount::new("u-1", "not-an-email", None, "pw"),
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            LocalAccount::new("  ", "a@example.com", None, "pw"),
            Err(AuthError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_sends_current_state_then_changes() {
        let provider = LocalAuthProvider::in_memory(vec![jane()]);
        let mut rx = provider.subscribe();
        assert_eq!(rx.recv().await, Some(None));

        provider
            .sign_in_with_email(&email("jane@example.com"), "secret")
            .await
            .unwrap();
        let signed_in = rx.recv().await.unwrap().unwrap();
        assert_eq!(signed_in.label(), "Jane Doe");

        provider.sign_out().await.unwrap();
        assert_eq!(rx.recv().await, Some(None));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let provider = LocalAuthProvider::in_memory(vec![jane()]);
        let err = provider
            .sign_in_with_email(&email("jane@example.com"), "nope")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        let err = provider
            .sign_in_with_email(&email("sam@example.com"), "secret")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_session_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        LocalAuthProvider::add_account(temp.path(), jane()).unwrap();

        let provider = LocalAuthProvider::open(temp.path()).unwrap();
        provider
            .sign_in_with_email(&email("jane@example.com"), "secret")
            .await
            .unwrap();

        let reopened = LocalAuthProvider::open(temp.path()).unwrap();
        let mut rx = reopened.subscribe();
        let restored = rx.recv().await.unwrap().unwrap();
        assert_eq!(restored.id.as_str(), "u-jane");

        reopened.sign_out().await.unwrap();
        assert!(!temp.path().join(SESSION_FILENAME).exists());
        let again = LocalAuthProvider::open(temp.path()).unwrap();
        assert_eq!(again.current(), None);
    }

    #[test]
    fn test_add_account_refuses_duplicates() {
        let temp = TempDir::new().unwrap();
        LocalAuthProvider::add_account(temp.path(), jane()).unwrap();

        let err = LocalAuthProvider::add_account(temp.path(), jane()).unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));

        let provider = LocalAuthProvider::open(temp.path()).unwrap();
        assert_eq!(provider.account_display_name("u-jane"), Some("Jane Doe"));
        assert_eq!(provider.account_display_name("u-sam"), None);
    }

    #[test]
    fn test_lookup_display_name_sees_accounts_added_later() {
        let temp = TempDir::new().unwrap();
        let provider = LocalAuthProvider::open(temp.path()).unwrap();

        LocalAuthProvider::add_account(temp.path(), jane()).unwrap();

        assert_eq!(provider.account_display_name("u-jane"), None);
        assert_eq!(
            LocalAuthProvider::lookup_display_name(temp.path(), "u-jane").unwrap(),
            Some("Jane Doe".to_owned())
        );
        assert_eq!(
            LocalAuthProvider::lookup_display_name(temp.path(), "u-sam").unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_password_reset_lines_are_on_disk_on_return() {
        let temp = TempDir::new().unwrap();
        LocalAuthProvider::add_account(temp.path(), jane()).unwrap();
        let provider = LocalAuthProvider::open(temp.path()).unwrap();
        let outbox = temp.path().join(RESET_OUTBOX_FILENAME);

        for expected in 1..=3 {
            provider
                .send_password_reset(&email("jane@example.com"))
                .await
                .unwrap();
            let contents = std::fs::read_to_string(&outbox).unwrap();
            assert_eq!(contents.lines().count(), expected);
        }
    }

    #[tokio::test]
    async fn test_password_reset_writes_outbox() {
        let temp = TempDir::new().unwrap();
        LocalAuthProvider::add_account(temp.path(), jane()).unwrap();
        let provider = LocalAuthProvider::open(temp.path()).unwrap();

        provider
            .send_password_reset(&email("jane@example.com"))
            .await
            .unwrap();
        let err = provider
            .send_password_reset(&email("sam@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UnknownAccount(_)));
        let outbox = std::fs::read_to_string(temp.path().join(RESET_OUTBOX_FILENAME)).unwrap();
        assert_eq!(outbox.lines().count(), 1);
        assert!(outbox.trim_end().ends_with("jane@example.com"));
    }

    #[test]
    fn test_missing_files_mean_empty_provider() {
        let temp = TempDir::new().unwrap();
        let provider = LocalAuthProvider::open(temp.path()).unwrap();
        assert!(provider.accounts.is_empty());
        assert_eq!(provider.current(), None);
    }
}
