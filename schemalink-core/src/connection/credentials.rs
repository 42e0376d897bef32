//! Credential container with automatic memory zeroing.
//!
//! Passwords never pass through a connection template; they are applied to
//! the driver's connect options after the connection string is built.

use zeroize::{Zeroize, Zeroizing};

/// Username and optional password, zeroed on drop.
///
/// # Example
///
/// ```rust
/// use schemalink_core::connection::Credentials;
///
/// let creds = Credentials::new("admin".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "admin");
/// assert!(creds.has_password());
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Wraps a username and optional password.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// The database user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether a password was supplied.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Exposes the password to a driver's connect options.
    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}
