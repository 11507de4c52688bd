//! Credential generation for provisioned tenant databases.

use rand::distr::{Alphanumeric, Distribution as _};
use secrecy::SecretString;

/// Length of generated tenant database passwords.
pub const DATABASE_PASSWORD_LENGTH: usize = 12;

/// Generates a random alphanumeric password (mixed-case letters and digits).
///
/// Drawn from the thread-local CSPRNG.
#[must_use]
pub fn generate_password(length: usize) -> SecretString {
    let password: String = Alphanumeric
        .sample_iter(rand::rng())
        .take(length)
        .map(char::from)
        .collect();
    SecretString::from(password)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    #[test]
    fn password_has_requested_length_and_alphabet() {
        let password = generate_password(DATABASE_PASSWORD_LENGTH);
        let exposed = password.expose_secret();
        assert_eq!(exposed.len(), DATABASE_PASSWORD_LENGTH);
        assert!(
            exposed.chars().all(|c| c.is_ascii_alphanumeric()),
            "unexpected character in {exposed}"
        );
    }

    #[test]
    fn passwords_differ() {
        let first = generate_password(DATABASE_PASSWORD_LENGTH);
        let second = generate_password(DATABASE_PASSWORD_LENGTH);
        assert_ne!(first.expose_secret(), second.expose_secret());
    }
}
