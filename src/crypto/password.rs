//! Password handling.

use zeroize::Zeroizing;

/// A password for entry or central directory encryption.
///
/// The text is wiped from memory when the value is dropped. All three ZIP
/// encryption schemes consume the password as UTF-8 bytes.
#[derive(Clone)]
pub struct Password {
    inner: Zeroizing<String>,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Creates a password from a character array.
    pub fn from_chars(chars: &[char]) -> Self {
        let mut text = String::with_capacity(chars.len());
        text.extend(chars);
        Self::new(text)
    }

    /// The bytes fed to key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns the password as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password").finish_non_exhaustive()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&[char]> for Password {
    fn from(chars: &[char]) -> Self {
        Self::from_chars(chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_bytes_are_utf8() {
        let password = Password::new("pässword");
        assert_eq!(password.as_bytes(), "pässword".as_bytes());
        assert_eq!(password.len(), 8);
    }

    #[test]
    fn test_password_debug() {
        let password = Password::new("secret");
        let debug = format!("{:?}", password);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_password_from_chars() {
        let chars = ['a', 'b', 'c'];
        let password: Password = chars.as_slice().into();
        assert_eq!(password.as_str(), "abc");
    }

    #[test]
    fn test_password_len() {
        let empty = Password::new("");
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }
}
