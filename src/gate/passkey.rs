use secrecy::{ExposeSecret, SecretString};

/// Shared admin passkey. Compared byte-for-byte: no trimming, no hashing.
#[derive(Clone)]
pub struct Passkey(SecretString);

impl Passkey {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self(secret)
    }

    #[must_use]
    pub fn matches(&self, entered: &str) -> bool {
        self.0.expose_secret().as_bytes() == entered.as_bytes()
    }
}

impl std::fmt::Debug for Passkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passkey(***)")
    }
}
