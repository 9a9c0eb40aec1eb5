use rand::{rngs::OsRng, RngCore};

/// Bytes of entropy in a reset token.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Mint a password-reset token: 256 bits from the OS CSPRNG as 64 lowercase
/// hex characters. Binding it to a user, storing it and expiring it is the
/// caller's job.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
