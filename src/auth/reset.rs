use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Length of the raw reset secret handed to the caller.
const RESET_TOKEN_LEN: usize = 48;

/// High-entropy single-use secret for password recovery. Only its digest is
/// persisted; the raw value exists in the response (or, in a real
/// deployment, an email) and nowhere else.
pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Digest stored in `password_reset_token_hash` and used for lookup at
/// consumption time.
pub fn hash_reset_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_alphanumeric() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }

    #[test]
    fn digest_is_deterministic_and_hex() {
        let token = "abc123";
        let a = hash_reset_token(token);
        let b = hash_reset_token(token);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_differs_from_raw_value() {
        let token = generate_reset_token();
        assert_ne!(hash_reset_token(&token), token);
    }

    #[test]
    fn different_tokens_different_digests() {
        assert_ne!(hash_reset_token("token-a"), hash_reset_token("token-b"));
    }
}
