//! API keys for the OpenAI and Pinecone clients.
//!
//! Keys live in a zeroize-on-drop box and print as `[REDACTED]`, so a
//! client struct can derive or log `Debug` freely.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

use crate::error::{PipelineError, Result};

/// An API key. Read it with [`SecretString::expose`] when setting a header.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// True for a blank key, e.g. an env var set to "" or spaces.
    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Read an API key from the environment variable `var`.
///
/// Unset and blank values are both config errors.
pub fn secret_from_env(var: &str) -> Result<SecretString> {
    let secret = std::env::var(var)
        .map(SecretString::from)
        .map_err(|_| PipelineError::Config(format!("{var} not set")))?;
    if secret.is_empty() {
        return Err(PipelineError::Config(format!("{var} is empty")));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_not_in_debug_or_display() {
        let secret = SecretString::new("sk-super-secret-key");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_expose_and_clone() {
        let secret = SecretString::from("pc-key");
        assert_eq!(secret.clone().expose(), "pc-key");
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_secret_from_env_rejects_missing_and_blank() {
        std::env::set_var("NEWSDESK_TEST_BLANK_KEY", "  ");
        std::env::set_var("NEWSDESK_TEST_SET_KEY", "sk-live");

        assert!(matches!(
            secret_from_env("NEWSDESK_TEST_UNSET_KEY"),
            Err(PipelineError::Config(msg)) if msg.contains("not set")
        ));
        assert!(matches!(
            secret_from_env("NEWSDESK_TEST_BLANK_KEY"),
            Err(PipelineError::Config(msg)) if msg.contains("is empty")
        ));
        assert_eq!(secret_from_env("NEWSDESK_TEST_SET_KEY").unwrap().expose(), "sk-live");
    }
}
