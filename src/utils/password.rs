use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const REFRESH_TOKEN_LEN: usize = 64;
const RESET_TOKEN_LEN: usize = 32;

/// Derive a PBKDF2-HMAC-SHA256 hash over a fresh random salt.
///
/// Returns `(hash, salt)`, both base64-encoded for storage.
pub fn hash_password(password: &str, iterations: u32) -> (String, String) {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let hash = derive(password.as_bytes(), &salt, iterations);
    (STANDARD.encode(hash), STANDARD.encode(salt))
}

/// Recompute the hash with the stored salt and compare in constant time.
///
/// Malformed stored values count as a verification failure, never an error.
pub fn verify_password(password: &str, stored_hash: &str, stored_salt: &str, iterations: u32) -> bool {
    let Ok(salt) = STANDARD.decode(stored_salt) else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(stored_hash) else {
        return false;
    };
    let actual = derive(password.as_bytes(), &salt, iterations);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// Opaque refresh token: 64 random bytes, base64-encoded. Carries no claims;
/// uniqueness is enforced by the store, not the generator.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_LEN];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Password-reset token, URL-safe so it survives embedding in a mail link.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_LEN];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERATIONS: u32 = 1_000;

    #[test]
    fn verify_accepts_matching_password() {
        let (hash, salt) = hash_password("correct horse battery staple", ITERATIONS);
        assert!(verify_password(
            "correct horse battery staple",
            &hash,
            &salt,
            ITERATIONS
        ));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let (hash, salt) = hash_password("hunter2", ITERATIONS);
        assert!(!verify_password("hunter3", &hash, &salt, ITERATIONS));
    }

    #[test]
    fn verify_rejects_wrong_iteration_count() {
        let (hash, salt) = hash_password("hunter2", ITERATIONS);
        assert!(!verify_password("hunter2", &hash, &salt, ITERATIONS + 1));
    }

    #[test]
    fn salt_is_fresh_per_hash() {
        let (hash_a, salt_a) = hash_password("same password", ITERATIONS);
        let (hash_b, salt_b) = hash_password("same password", ITERATIONS);
        assert_ne!(salt_a, salt_b);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn malformed_stored_values_fail_closed() {
        let (hash, salt) = hash_password("hunter2", ITERATIONS);
        assert!(!verify_password("hunter2", "not base64!!", &salt, ITERATIONS));
        assert!(!verify_password("hunter2", &hash, "not base64!!", ITERATIONS));
        assert!(!verify_password("hunter2", "", "", ITERATIONS));
    }

    #[test]
    fn opaque_tokens_are_distinct_and_sized() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        // 64 bytes of standard base64 with padding.
        assert_eq!(a.len(), 88);
    }
}
