//! Admin token command implementation.

use super::CliError;
use sysdb_server::{AdminAuth, AuthConfig};

/// Mints a hex admin token for `principal`.
pub fn run(secret: &str, principal: &str) -> Result<String, CliError> {
    let auth = AdminAuth::new(AuthConfig::new(secret.as_bytes().to_vec()));
    Ok(auth.create_token(principal)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_verifies_with_same_secret() {
        let token = run("s3cret", "ops").unwrap();
        let auth = AdminAuth::new(AuthConfig::new(b"s3cret".to_vec()));
        assert_eq!(auth.verify(&token).unwrap().principal(), "ops");
    }
}
