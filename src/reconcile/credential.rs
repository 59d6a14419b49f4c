//! Random credential generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Bytes of entropy in a generated credential (256 bits).
pub const CREDENTIAL_BYTES: usize = 32;

/// Generate a credential from the OS CSPRNG, rendered as lowercase hex.
pub fn generate_credential() -> String {
    let mut bytes = [0u8; CREDENTIAL_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
