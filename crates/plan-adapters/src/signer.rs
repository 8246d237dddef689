//! Firma de URLs de storage con vencimiento.
//!
//! `signature = hex(hmac_sha256(secret, object_ref \n expires))`.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use plan_core::{CollaboratorError, UrlSigner};

type HmacSha256 = Hmac<Sha256>;

pub struct StorageUrlSigner {
    base_url: String,
    secret: String,
    ttl: Duration,
}

impl StorageUrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>, ttl: Duration) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(),
               secret: secret.into(),
               ttl }
    }

    fn mac(&self, object_ref: &str, expires: i64) -> Result<HmacSha256, CollaboratorError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CollaboratorError::InvalidRequest(format!("signing key: {e}")))?;
        mac.update(object_ref.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    pub fn sign_at(&self, object_ref: &str, now: DateTime<Utc>) -> Result<String, CollaboratorError> {
        let object_ref = object_ref.trim().trim_start_matches('/');
        if object_ref.is_empty() {
            return Err(CollaboratorError::InvalidRequest("empty storage reference".into()));
        }
        let expires = now.timestamp() + self.ttl.as_secs() as i64;
        let signature = hex::encode(self.mac(object_ref, expires)?.finalize().into_bytes());
        Ok(format!("{}/{}?expires={}&signature={}",
                   self.base_url,
                   object_ref,
                   expires,
                   signature))
    }

    /// Verifica firma (comparación en tiempo constante) y vencimiento.
    pub fn verify(&self, object_ref: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        self.mac(object_ref, expires)
            .map(|mac| mac.verify_slice(&raw).is_ok())
            .unwrap_or(false)
    }
}

impl UrlSigner for StorageUrlSigner {
    fn sign(&self, object_ref: &str) -> Result<String, CollaboratorError> {
        self.sign_at(object_ref, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> StorageUrlSigner {
        StorageUrlSigner::new("https://cdn.local/", "s3cret", Duration::from_secs(3600))
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let url = signer().sign_at("/renders/a.png", now).unwrap();
        let expires = now.timestamp() + 3600;
        assert!(url.starts_with("https://cdn.local/renders/a.png?expires="));
        let sig = url.rsplit("signature=").next().unwrap();
        assert_eq!(sig.len(), 64);
        assert!(signer().verify("renders/a.png", expires, sig, now));
        assert!(!signer().verify("renders/b.png", expires, sig, now));
        let later = now + chrono::Duration::seconds(3601);
        assert!(!signer().verify("renders/a.png", expires, sig, later));
    }

    #[test]
    fn extended_reference_does_not_reuse_a_signature() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let url = signer().sign_at("renders/a.png", now).unwrap();
        let expires = now.timestamp() + 3600;
        let sig = url.rsplit("signature=").next().unwrap();
        // mover el vencimiento original dentro de la referencia no valida
        let shifted = format!("renders/a.png\n{expires}");
        assert!(!signer().verify(&shifted, expires + 86_400, sig, now));
        assert!(!signer().verify("renders/a.png", expires, "not-hex", now));
        assert!(!signer().verify("renders/a.png", expires, &sig[..32], now));
    }

    #[test]
    fn known_hmac_vector() {
        // RFC 4231, caso 2
        let mac = {
            let mut m = HmacSha256::new_from_slice(b"Jefe").unwrap();
            m.update(b"what do ya want for nothing?");
            hex::encode(m.finalize().into_bytes())
        };
        assert_eq!(mac, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!(signer().sign("  ").is_err());
    }
}
