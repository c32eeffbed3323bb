//! Opaque one-time tokens gating email verification.

use rand::{distributions::Alphanumeric, Rng};

use crate::constants::VERIFICATION_TOKEN_LENGTH;

/// Issues and checks bearer tokens. Holding the exact value is the proof.
pub struct VerificationToken;

impl VerificationToken {
    /// Fresh random token drawn from the thread-local CSPRNG.
    pub fn issue() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFICATION_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Compare a presented token with the stored one without short-circuiting
    /// on the first differing byte.
    pub fn matches(candidate: &str, stored: &str) -> bool {
        let (a, b) = (candidate.as_bytes(), stored.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}
