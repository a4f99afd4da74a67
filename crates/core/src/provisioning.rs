use rand::Rng;
use sha2::{Digest, Sha256};

/// Characters allowed in generated temporary passwords. Visually ambiguous
/// glyphs (0/O/o, 1/I/l/i) are excluded because customers retype these from
/// a welcome email.
const UNAMBIGUOUS_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

pub const TEMP_PASSWORD_LEN: usize = 8;

/// Generates a one-time password for a freshly provisioned account.
pub fn temp_password() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..UNAMBIGUOUS_ALPHABET.len());
            UNAMBIGUOUS_ALPHABET[idx] as char
        })
        .collect()
}

/// Splits a free-form contact name into (first, rest). A single token maps
/// to an empty last name; everything after the first token is the last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// Password hashing seam. The production implementation is deterministic so
/// the login path can hash-and-compare.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
}

/// SHA-256 over a fixed application salt, hex-encoded.
#[derive(Clone, Debug, Default)]
pub struct Sha256PasswordHasher;

const PASSWORD_SALT: &str = "aquaflow-credentials-v1";

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(PASSWORD_SALT.as_bytes());
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}
