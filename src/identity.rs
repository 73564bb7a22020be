//! Sign-up, sign-in and the current identity.
//!
//! [`IdentityService`] owns the signed-in user for the process. Attempts are
//! attributed to whoever is signed in when an analysis completes.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::storage::{AuthSession, Storage, User};

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_SIZE: usize = 16;
const KEY_SIZE: usize = 32;
const HASH_SCHEME: &str = "pbkdf2-sha256";

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Every password-policy rule the password breaks, in a fixed order.
pub fn password_violations(password: &str) -> Vec<String> {
    let rules: [(bool, &str); 5] = [
        (
            password.chars().count() >= MIN_PASSWORD_LEN,
            "Password must be at least 8 characters long",
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "Password must contain at least one uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "Password must contain at least one lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Password must contain at least one number",
        ),
        (
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
            "Password must contain at least one special character",
        ),
    ];

    rules
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, message)| message.to_string())
        .collect()
}

/// Reject a sign-up whose confirmation does not repeat the password.
pub fn confirm_password(password: &str, confirmation: &str) -> AuthResult<()> {
    if password == confirmation {
        Ok(())
    } else {
        Err(AuthError::PasswordMismatch)
    }
}

fn validate_email(email: &str) -> AuthResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

/// Derive a storable digest for a password with a fresh random salt.
///
/// Format: `pbkdf2-sha256$<iterations>$<salt hex>$<key hex>`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    encode_hash(password, &salt, PBKDF2_ITERATIONS)
}

/// Check a password against a digest produced by [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(key), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(key)) else {
        return false;
    };
    if expected.len() != KEY_SIZE {
        return false;
    }

    let derived = derive_key(password, &salt, iterations);
    derived.as_slice().ct_eq(expected.as_slice()).into()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: &str) -> AuthResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await?)
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: &str, stored: &str) -> AuthResult<bool> {
    let (password, stored) = (password.to_owned(), stored.to_owned());
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?)
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn encode_hash(password: &str, salt: &[u8], iterations: u32) -> String {
    let key = derive_key(password, salt, iterations);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(key)
    )
}

struct SignedIn {
    session: AuthSession,
    user: User,
}

/// Identity operations and the current sign-in.
pub struct IdentityService {
    storage: Arc<dyn Storage>,
    current: Option<SignedIn>,
    notifier: watch::Sender<Option<User>>,
}

impl IdentityService {
    /// Create a service with nobody signed in.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let (notifier, _) = watch::channel(None);
        Self {
            storage,
            current: None,
            notifier,
        }
    }

    /// Register a new user and sign them in.
    ///
    /// All password-policy violations are reported together.
    pub async fn sign_up(&mut self, email: &str, password: &str, name: &str) -> AuthResult<User> {
        let email = email.trim();
        let name = name.trim();

        validate_email(email)?;
        let violations = password_violations(password);
        if !violations.is_empty() {
            return Err(AuthError::WeakPassword { violations });
        }
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }

        if self.storage.get_user_by_email(email).await?.is_some() {
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = hash_password_blocking(password).await?;
        let user = User::new(email.to_lowercase(), name, password_hash);
        self.storage.create_user(&user).await?;
        info!(user_id = %user.id, "User registered");

        self.open_session(user).await
    }

    /// Sign in with an email and password.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> AuthResult<User> {
        let user = self.storage.get_user_by_email(email.trim()).await?;
        let verified = match &user {
            Some(user) => verify_password_blocking(password, &user.password_hash).await?,
            None => false,
        };
        let user = user.filter(|_| verified).ok_or_else(|| {
            warn!("Rejected sign-in attempt");
            AuthError::InvalidCredentials
        })?;

        self.open_session(user).await
    }

    /// Sign out the current user. Signing out when nobody is signed in is a no-op.
    pub async fn sign_out(&mut self) -> AuthResult<()> {
        let Some(signed_in) = self.current.take() else {
            return Ok(());
        };

        self.notifier.send_replace(None);
        self.storage
            .delete_auth_session(&signed_in.session.token)
            .await?;
        info!(user_id = %signed_in.user.id, "User signed out");
        Ok(())
    }

    /// The signed-in user, if any.
    pub fn current(&self) -> Option<&User> {
        self.current.as_ref().map(|s| &s.user)
    }

    /// The current sign-in session, if any.
    pub fn session(&self) -> Option<&AuthSession> {
        self.current.as_ref().map(|s| &s.session)
    }

    /// The signed-in user, or [`AuthError::NotAuthenticated`].
    pub fn require(&self) -> AuthResult<&User> {
        self.current().ok_or(AuthError::NotAuthenticated)
    }

    /// Subscribe to sign-in changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.notifier.subscribe()
    }

    async fn open_session(&mut self, user: User) -> AuthResult<User> {
        // One identity per process; a new sign-in replaces the previous one
        if self.current.is_some() {
            self.sign_out().await?;
        }

        let session = AuthSession::new(&user.id);
        self.storage.create_auth_session(&session).await?;
        info!(user_id = %user.id, "User signed in");

        self.notifier.send_replace(Some(user.clone()));
        self.current = Some(SignedIn {
            session,
            user: user.clone(),
        });
        Ok(user)
    }
}
