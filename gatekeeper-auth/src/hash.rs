//! PIN hashing and verification.
//!
//! PIN records store only salted hashes, so resolving a PIN means verifying
//! the presented code against each stored hash in turn.

use crate::error::{AuthError, AuthResult};
use std::sync::Arc;

/// Verifies plaintext against stored hashes and produces new hashes.
pub trait HashVerifier: Send + Sync {
    /// Check a plaintext against a stored hash. A malformed hash never verifies.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;

    /// Produce a fresh salted hash of a plaintext.
    fn hash(&self, plaintext: &str) -> AuthResult<String>;
}

/// Hash a plaintext on the blocking pool.
pub async fn hash_blocking(verifier: Arc<dyn HashVerifier>, plaintext: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || verifier.hash(&plaintext))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
}

#[cfg(feature = "argon2")]
pub use self::argon2_impl::Argon2Verifier;

#[cfg(feature = "argon2")]
mod argon2_impl {
    use super::HashVerifier;
    use crate::error::{AuthError, AuthResult};
    use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
    use argon2::Argon2;
    use rand::rngs::OsRng;

    /// Argon2id hasher producing PHC strings (`$argon2id$v=19$...`).
    ///
    /// Verification reads algorithm parameters from the stored hash, so
    /// hashes produced with other parameters keep verifying.
    #[derive(Default, Clone)]
    pub struct Argon2Verifier {
        argon2: Argon2<'static>,
    }

    impl std::fmt::Debug for Argon2Verifier {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Argon2Verifier").finish_non_exhaustive()
        }
    }

    impl Argon2Verifier {
        /// Create a verifier with the default Argon2id parameters.
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl HashVerifier for Argon2Verifier {
        fn verify(&self, plaintext: &str, hash: &str) -> bool {
            match PasswordHash::new(hash) {
                Ok(parsed) => self
                    .argon2
                    .verify_password(plaintext.as_bytes(), &parsed)
                    .is_ok(),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored PIN hash is not a PHC string");
                    false
                }
            }
        }

        fn hash(&self, plaintext: &str) -> AuthResult<String> {
            let salt = SaltString::generate(&mut OsRng);
            self.argon2
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::Hashing(e.to_string()))
        }
    }
}

#[cfg(all(test, feature = "argon2"))]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let verifier = Argon2Verifier::new();
        let hash = verifier.hash("4321").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, "4321");
        assert!(verifier.verify("4321", &hash));
        assert!(!verifier.verify("1234", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let verifier = Argon2Verifier::new();
        let a = verifier.hash("4321").unwrap();
        let b = verifier.hash("4321").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let verifier = Argon2Verifier::new();
        assert!(!verifier.verify("4321", "4321"));
        assert!(!verifier.verify("4321", ""));
    }

    #[tokio::test]
    async fn test_hash_blocking() {
        let verifier: Arc<dyn HashVerifier> = Arc::new(Argon2Verifier::new());
        let hash = hash_blocking(verifier.clone(), "0000".to_string()).await.unwrap();
        assert!(verifier.verify("0000", &hash));
    }
}
