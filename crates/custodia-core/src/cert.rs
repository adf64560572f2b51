//! Party credentials for delegation chains.
//!
//! The chain engine needs, per party: a subject DN, an issuer DN, a validity
//! window, an ed25519 verifying key, order-sensitive equality, and a cheap
//! fingerprint. [`Certificate`] carries exactly that; full X.509 *path*
//! trust stays behind the [`CertPathValidator`](crate::validate::CertPathValidator)
//! oracle, so a DER/X.509 engine can be plugged in without touching the core.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Certificate material errors (encoding, key decode, canonicalization).
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("failed to encode public key as SPKI DER: {0}")]
    SpkiEncode(String),

    #[error("failed to decode SPKI public key: {0}")]
    SpkiDecode(String),

    #[error("invalid base64 in certificate: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid signature bytes: {0}")]
    SignatureBytes(#[source] ed25519_dalek::SignatureError),

    #[error("certificate canonicalization failed: {0}")]
    Canonicalize(#[source] serde_json::Error),
}

/// A `sha256:<lowercase-hex>` digest, used both as the custodian hashcode
/// binding and as the key of trusted-issuer stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest arbitrary bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("sha256:{:x}", Sha256::digest(bytes)))
    }

    /// Accept an existing `sha256:<64 hex>` rendering.
    pub fn parse(s: &str) -> Option<Self> {
        let hex_part = s.strip_prefix("sha256:")?;
        if hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(format!("sha256:{}", hex_part.to_ascii_lowercase())))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use crate::dn::Dn;

/// The to-be-signed body of a [`Certificate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TbsCertificate {
    pub serial: u64,
    pub subject: Dn,
    pub issuer: Dn,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Base64 SPKI DER of the subject's ed25519 verifying key.
    pub spki: String,
}

/// An ed25519 party certificate: a signed [`TbsCertificate`].
///
/// Equality is derived field equality; chains (`Vec<Certificate>`) compare
/// by length and element-wise order-sensitive equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub tbs: TbsCertificate,
    /// Base64 ed25519 signature over the JCS bytes of `tbs`.
    pub signature: String,
}

fn key_to_spki_der(key: &VerifyingKey) -> Result<Vec<u8>, CertificateError> {
    use pkcs8::EncodePublicKey;
    let doc = key
        .to_public_key_der()
        .map_err(|e| CertificateError::SpkiEncode(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

fn sign_tbs(tbs: &TbsCertificate, key: &SigningKey) -> Result<String, CertificateError> {
    let canonical = serde_jcs::to_vec(tbs).map_err(CertificateError::Canonicalize)?;
    let signature: Signature = key.sign(&canonical);
    Ok(BASE64.encode(signature.to_bytes()))
}

impl Certificate {
    /// A self-signed certificate: subject == issuer, signed by `key`.
    pub fn self_signed(subject: Dn, key: &SigningKey, days: i64) -> Result<Self, CertificateError> {
        let spki = key_to_spki_der(&key.verifying_key())?;
        let now = Utc::now();
        let tbs = TbsCertificate {
            serial: rand::random(),
            issuer: subject.clone(),
            subject,
            not_before: now,
            not_after: now + Duration::days(days),
            spki: BASE64.encode(spki),
        };
        let signature = sign_tbs(&tbs, key)?;
        Ok(Self { tbs, signature })
    }

    /// A certificate for `subject_key`, issued and signed by `issuer_key`
    /// under `issuer_cert`'s subject name.
    pub fn issue(
        subject: Dn,
        subject_key: &VerifyingKey,
        issuer_cert: &Certificate,
        issuer_key: &SigningKey,
        days: i64,
    ) -> Result<Self, CertificateError> {
        let spki = key_to_spki_der(subject_key)?;
        let now = Utc::now();
        let tbs = TbsCertificate {
            serial: rand::random(),
            subject,
            issuer: issuer_cert.tbs.subject.clone(),
            not_before: now,
            not_after: now + Duration::days(days),
            spki: BASE64.encode(spki),
        };
        let signature = sign_tbs(&tbs, issuer_key)?;
        Ok(Self { tbs, signature })
    }

    /// Decode the subject's verifying key from the embedded SPKI.
    pub fn verifying_key(&self) -> Result<VerifyingKey, CertificateError> {
        use pkcs8::DecodePublicKey;
        let der = BASE64.decode(&self.tbs.spki)?;
        VerifyingKey::from_public_key_der(&der)
            .map_err(|e| CertificateError::SpkiDecode(e.to_string()))
    }

    /// `sha256:<hex>` over the JCS bytes of the whole certificate.
    pub fn fingerprint(&self) -> Result<Fingerprint, CertificateError> {
        let canonical = serde_jcs::to_vec(self).map_err(CertificateError::Canonicalize)?;
        Ok(Fingerprint::of_bytes(&canonical))
    }

    /// X.509-style inclusive validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.tbs.not_before <= now && now <= self.tbs.not_after
    }

    /// Verify this certificate's signature against `issuer_cert`'s key.
    pub fn verify_signed_by(&self, issuer_cert: &Certificate) -> Result<bool, CertificateError> {
        let key = issuer_cert.verifying_key()?;
        let canonical = serde_jcs::to_vec(&self.tbs).map_err(CertificateError::Canonicalize)?;
        let bytes = BASE64.decode(&self.signature)?;
        let signature = Signature::from_slice(&bytes).map_err(CertificateError::SignatureBytes)?;
        Ok(key.verify(&canonical, &signature).is_ok())
    }
}
