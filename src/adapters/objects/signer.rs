//! Time-bounded download URL signing
//!
//! A signed URL carries its expiry and a SHA-256 digest over the signing
//! key, the object key and the expiry, encoded as unpadded base64url.

use crate::config::SecretString;
use crate::domain::{ReportFlowError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use url::Url;

/// Issues and verifies download URLs
#[derive(Clone)]
pub struct UrlSigner {
    base_url: Url,
    key: SecretString,
}

impl UrlSigner {
    /// Creates a signer issuing URLs under `base_url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, key: SecretString) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            ReportFlowError::Configuration(format!("Invalid download base URL '{base}': {e}"))
        })?;
        Ok(Self { base_url, key })
    }

    fn signature(&self, object_key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.key.expose_secret().as_bytes());
        hasher.update(b"\n");
        hasher.update(object_key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Signed URL for `object_key`, valid until `expires_at`
    pub fn sign(&self, object_key: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let expires = expires_at.timestamp();
        let mut url = self.base_url.join(object_key).map_err(|e| {
            ReportFlowError::ObjectStore(format!("Invalid object key '{object_key}': {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(object_key, expires));
        Ok(url.to_string())
    }

    /// Checks a URL issued by [`UrlSigner::sign`]
    ///
    /// Returns the object key when the signature matches and the URL has
    /// not expired at `now`.
    pub fn verify(&self, signed_url: &str, now: DateTime<Utc>) -> Option<String> {
        let url = Url::parse(signed_url).ok()?;
        let object_key = url.path().strip_prefix(self.base_url.path())?.to_string();

        let mut expires = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "expires" => expires = value.parse::<i64>().ok(),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let expires = expires?;
        if now.timestamp() > expires || signature? != self.signature(&object_key, expires) {
            return None;
        }
        Some(object_key)
    }
}
