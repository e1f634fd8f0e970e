//! Admin token authentication.
//!
//! Destructive operations need an [`AdminCapability`], and the server only
//! mints one after validating an HMAC-SHA256 admin token.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 2 bytes: principal length (big-endian)
//! - N bytes: principal (UTF-8)
//! - 8 bytes: issue timestamp (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 signature over everything before it
//!
//! The whole token is hex-encoded for transport.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sysdb_core::AdminCapability;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;
const MAX_PRINCIPAL_LEN: usize = 256;

/// Admin token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token lifetime.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(60 * 60), // 1 hour
        }
    }

    /// Sets the token lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

/// Issues and validates admin tokens.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    config: AuthConfig,
}

impl AdminAuth {
    /// Creates a new authenticator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a hex-encoded admin token for `principal`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the principal is empty or too long.
    pub fn create_token(&self, principal: &str) -> ServerResult<String> {
        self.create_token_at(principal, now_ms())
    }

    fn create_token_at(&self, principal: &str, issued_at_ms: u64) -> ServerResult<String> {
        if principal.is_empty() || principal.len() > MAX_PRINCIPAL_LEN {
            return Err(ServerError::InvalidRequest(format!(
                "principal must be 1-{MAX_PRINCIPAL_LEN} bytes"
            )));
        }
        let len = u16::try_from(principal.len())
            .map_err(|_| ServerError::InvalidRequest("principal too long".into()))?;

        let mut token = Vec::with_capacity(2 + principal.len() + 8 + SIGNATURE_LEN);
        token.extend_from_slice(&len.to_be_bytes());
        token.extend_from_slice(principal.as_bytes());
        token.extend_from_slice(&issued_at_ms.to_be_bytes());
        let signature = self.mac(&token)?.finalize().into_bytes();
        token.extend_from_slice(&signature);
        Ok(hex::encode(token))
    }

    /// Validates a token and mints the capability it proves.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthorized` if the token is malformed, forged or expired.
    pub fn verify(&self, token: &str) -> ServerResult<AdminCapability> {
        let bytes = hex::decode(token.trim())
            .map_err(|_| ServerError::NotAuthorized("token is not hex".into()))?;
        if bytes.len() < 2 + 8 + SIGNATURE_LEN {
            return Err(ServerError::NotAuthorized("invalid token length".into()));
        }

        let principal_len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        let signed_len = 2 + principal_len + 8;
        if bytes.len() != signed_len + SIGNATURE_LEN {
            return Err(ServerError::NotAuthorized("invalid token length".into()));
        }
        let (signed, signature) = bytes.split_at(signed_len);

        self.mac(signed)?
            .verify_slice(signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let principal = std::str::from_utf8(&signed[2..2 + principal_len])
            .map_err(|_| ServerError::NotAuthorized("principal is not UTF-8".into()))?;
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&signed[2 + principal_len..]);
        let issued_at = u64::from_be_bytes(ts);

        let expiry_ms = u64::try_from(self.config.token_expiry.as_millis()).unwrap_or(u64::MAX);
        if now_ms() > issued_at.saturating_add(expiry_ms) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        Ok(AdminCapability::grant(principal))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
