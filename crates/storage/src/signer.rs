//! HMAC-based signing for artifact download URLs.
//!
//! Download URLs embed an expiry timestamp and an HMAC-SHA256 signature
//! over the object key and expiry. The gateway redirects artifact requests
//! to these URLs so that clients can fetch objects without holding a
//! session, and the signature prevents key enumeration.

use crate::error::{StorageError, StorageResult};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use relay_core::config::SigningSecretConfig;
use sha2::Sha256;
use std::time::Duration;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies artifact download URLs.
pub struct UrlSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for UrlSigner {
    // The secret never appears in logs or test output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// A signed reference to a stored object.
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub key: String,
    /// Unix timestamp after which the signature is rejected.
    pub expires: i64,
    /// Base64url-encoded HMAC-SHA256 signature.
    pub signature: String,
}

impl SignedUrl {
    /// Render as a server-relative path suitable for a redirect Location.
    pub fn to_path(&self) -> String {
        format!(
            "/v1/objects/{}?expires={}&sig={}",
            self.key, self.expires, self.signature
        )
    }
}

impl UrlSigner {
    /// Create a signer with the given secret and URL lifetime.
    pub fn new(secret: Vec<u8>, ttl: Duration) -> StorageResult<Self> {
        if secret.len() < 16 {
            return Err(StorageError::Config(
                "signing secret must be at least 16 bytes".to_string(),
            ));
        }
        Ok(Self { secret, ttl })
    }

    /// Create a signer by resolving the configured secret source.
    pub fn from_config(config: &SigningSecretConfig, ttl: Duration) -> StorageResult<Self> {
        let secret = match config {
            SigningSecretConfig::File { path } => std::fs::read(path).map_err(|e| {
                StorageError::Config(format!("failed to read signing secret file: {e}"))
            })?,
            SigningSecretConfig::Env { var } => std::env::var(var)
                .map_err(|_| {
                    StorageError::Config(format!("signing secret env var {var} not set"))
                })?
                .into_bytes(),
            SigningSecretConfig::Value { key } => key.clone().into_bytes(),
            SigningSecretConfig::Generate => {
                tracing::warn!(
                    "generating ephemeral signing secret; issued URLs will not survive a restart"
                );
                let mut secret = vec![0u8; 32];
                rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut secret);
                secret
            }
        };
        Self::new(secret, ttl)
    }

    /// Issue a signed URL for an object key, valid for the configured TTL.
    pub fn sign(&self, key: &str) -> SignedUrl {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = OffsetDateTime::now_utc().unix_timestamp().saturating_add(ttl);
        SignedUrl {
            key: key.to_string(),
            expires,
            signature: self.compute(key, expires),
        }
    }

    /// Verify a presented signature for an object key.
    ///
    /// Expiry is checked first so callers can distinguish stale links from
    /// forged ones. Signature comparison is constant-time.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> StorageResult<()> {
        if OffsetDateTime::now_utc().unix_timestamp() > expires {
            return Err(StorageError::SignatureExpired(expires));
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StorageError::InvalidSignature)?;

        let mut mac = self.mac();
        mac.update(Self::message(key, expires).as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| StorageError::InvalidSignature)
    }

    fn compute(&self, key: &str, expires: i64) -> String {
        let mut mac = self.mac();
        mac.update(Self::message(key, expires).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("HMAC key of any length is valid")
    }

    fn message(key: &str, expires: i64) -> String {
        format!("{key}\n{expires}")
    }
}
