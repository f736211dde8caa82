//! Entry field values
//!
//! Entry fields are either plain text or protected. Protected values live in a
//! [`SecureString`] shared behind an `Arc`, so cloning a field (for history or
//! for a tree snapshot) never copies the secret itself.

use std::sync::Arc;

use crate::crypto::SecureString;

/// Well-known field holding the login name
pub const USERNAME_FIELD: &str = "UserName";

/// Well-known field holding the password
pub const PASSWORD_FIELD: &str = "Password";

/// Well-known field holding the URL
pub const URL_FIELD: &str = "URL";

/// Value of a single entry field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Ordinary text
    Plain(String),
    /// Secret text, never held in the clear
    Protected(Arc<SecureString>),
}

impl FieldValue {
    /// Plain text value
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    /// Protected value
    pub fn protected(value: impl Into<SecureString>) -> Self {
        Self::Protected(Arc::new(value.into()))
    }

    /// Whether the value is protected
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected(_))
    }

    /// The text of a plain value
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(s) => Some(s),
            Self::Protected(_) => None,
        }
    }

    /// Convert a plain value into a protected one; the plain buffer is zeroed
    pub fn into_protected(self) -> Self {
        match self {
            Self::Plain(s) => Self::Protected(Arc::new(SecureString::from_string(s))),
            protected => protected,
        }
    }

    /// Release the protected value, if any
    pub fn release(&self) {
        if let Self::Protected(secret) = self {
            secret.release();
        }
    }
}
