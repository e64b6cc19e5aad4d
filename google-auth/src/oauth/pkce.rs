//! PKCE (Proof Key for Code Exchange), RFC 7636.
//!
//! Binds the authorization code to the session that started the flow: the challenge goes
//! out with the authorization URL, the verifier goes with the token exchange.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// The only challenge method this crate sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier (random string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generate a new random verifier, 43 characters of base64url.
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Wrap a verifier recovered from session storage.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Derive the S256 code challenge.
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge: base64url(SHA-256(verifier)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let hash = Sha256::digest(verifier.as_str().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_verifier_length() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 43);
    }

    #[test]
    fn test_generated_verifiers_differ() {
        assert_ne!(PkceVerifier::generate(), PkceVerifier::generate());
    }

    #[test]
    fn test_challenge_matches_rfc7636_vector() {
        let verifier =
            PkceVerifier::from_string("dBjftJeZ4CVP-mJ92ZXbVk6K9fUzyEGeQ0aGkeSlGYc".to_string());
        assert_eq!(
            verifier.challenge().as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}
