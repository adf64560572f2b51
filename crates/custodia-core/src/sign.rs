//! Assertion signing and verification.
//!
//! [`SignatureEngine`] is an explicitly constructed, stateless context
//! passed by reference into issuance and validation; there is no hidden
//! process-wide signature factory. Signing covers the JCS (RFC 8785) bytes
//! of the document with all signature children removed, and the resulting
//! block is inserted at the enveloped position (before the first `Subject`
//! child).
//!
//! `verify` keeps the valid/invalid distinction in its `Ok` value:
//! `Ok(false)` is a bad signature, `Err` is reserved for malformed input or
//! infrastructure failure.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::cert::Certificate;
use crate::document::{AssertionDocument, SignatureBlock};

/// Signature algorithm identifier recorded in every signature block.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// Signing/verification infrastructure errors. These are fatal to the
/// operation and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("document is already signed")]
    AlreadySigned,

    #[error("document is not signed")]
    Unsigned,

    #[error("unsupported signature algorithm: {algorithm:?}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("canonicalization failed: {0}")]
    Canonicalize(#[source] serde_json::Error),

    #[error("invalid base64 signature value: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid signature bytes: {0}")]
    SignatureBytes(#[source] ed25519_dalek::SignatureError),
}

/// Stateless signer/verifier context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine;

impl SignatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Sign `doc` with `key`, embedding `key_info` (the signer's
    /// certificate chain, leaf first) in the signature block. Returns a new
    /// signed document; the input is not modified.
    pub fn sign(
        &self,
        doc: &AssertionDocument,
        key: &SigningKey,
        key_info: &[Certificate],
    ) -> Result<AssertionDocument, SignatureError> {
        if doc.signature().is_some() {
            return Err(SignatureError::AlreadySigned);
        }
        let canonical =
            serde_jcs::to_vec(&doc.without_signature()).map_err(SignatureError::Canonicalize)?;
        let signature: Signature = key.sign(&canonical);

        let mut signed = doc.clone();
        signed.insert_signature(SignatureBlock {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            value: BASE64.encode(signature.to_bytes()),
            key_info: key_info.to_vec(),
        });
        Ok(signed)
    }

    /// Verify the embedded signature against `key`.
    pub fn verify(
        &self,
        doc: &AssertionDocument,
        key: &VerifyingKey,
    ) -> Result<bool, SignatureError> {
        let block = doc.signature().ok_or(SignatureError::Unsigned)?;
        if block.algorithm != SIGNATURE_ALGORITHM {
            return Err(SignatureError::UnsupportedAlgorithm {
                algorithm: block.algorithm.clone(),
            });
        }
        let canonical =
            serde_jcs::to_vec(&doc.without_signature()).map_err(SignatureError::Canonicalize)?;
        let bytes = BASE64.decode(&block.value)?;
        let signature = Signature::from_slice(&bytes).map_err(SignatureError::SignatureBytes)?;
        Ok(key.verify(&canonical, &signature).is_ok())
    }

    /// The signer's certificate chain from the signature's key-info.
    /// `None` when the document is unsigned or the key-info is empty.
    pub fn signer_certificates<'a>(&self, doc: &'a AssertionDocument) -> Option<&'a [Certificate]> {
        doc.signature()
            .map(|block| block.key_info.as_slice())
            .filter(|certs| !certs.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::Dn;
    use crate::document::{AssertionChild, NameId, Subject};

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn doc() -> AssertionDocument {
        let mut doc = AssertionDocument::new(NameId::x509("CN=issuer"));
        doc.children.push(AssertionChild::Subject(Subject {
            name: NameId::x509("CN=receiver"),
            confirmation: None,
        }));
        doc
    }

    #[test]
    fn test_sign_then_verify() {
        let engine = SignatureEngine::new();
        let k = key(1);
        let signed = engine.sign(&doc(), &k, &[]).unwrap();
        assert!(engine.verify(&signed, &k.verifying_key()).unwrap());
    }

    #[test]
    fn test_signature_placed_before_subject() {
        let engine = SignatureEngine::new();
        let signed = engine.sign(&doc(), &key(1), &[]).unwrap();
        assert!(matches!(signed.children[0], AssertionChild::Signature(_)));
        assert!(matches!(signed.children[1], AssertionChild::Subject(_)));
    }

    #[test]
    fn test_wrong_key_is_ok_false_not_err() {
        let engine = SignatureEngine::new();
        let signed = engine.sign(&doc(), &key(1), &[]).unwrap();
        assert!(!engine.verify(&signed, &key(2).verifying_key()).unwrap());
    }

    #[test]
    fn test_tampered_document_fails() {
        let engine = SignatureEngine::new();
        let k = key(1);
        let mut signed = engine.sign(&doc(), &k, &[]).unwrap();
        signed.issuer = NameId::x509("CN=mallory");
        assert!(!engine.verify(&signed, &k.verifying_key()).unwrap());
    }

    #[test]
    fn test_double_signing_rejected() {
        let engine = SignatureEngine::new();
        let k = key(1);
        let signed = engine.sign(&doc(), &k, &[]).unwrap();
        assert!(matches!(
            engine.sign(&signed, &k, &[]),
            Err(SignatureError::AlreadySigned)
        ));
    }

    #[test]
    fn test_unsigned_verify_is_err() {
        let engine = SignatureEngine::new();
        assert!(matches!(
            engine.verify(&doc(), &key(1).verifying_key()),
            Err(SignatureError::Unsigned)
        ));
    }

    #[test]
    fn test_signer_certificates_empty_key_info_is_none() {
        let engine = SignatureEngine::new();
        let cert = Certificate::self_signed(Dn::parse("CN=issuer").unwrap(), &key(1), 30).unwrap();

        let bare = engine.sign(&doc(), &key(1), &[]).unwrap();
        assert!(engine.signer_certificates(&bare).is_none());

        let with_certs = engine.sign(&doc(), &key(1), &[cert.clone()]).unwrap();
        assert_eq!(engine.signer_certificates(&with_certs), Some(&[cert][..]));
    }

    #[test]
    fn test_verify_survives_serde_round_trip() {
        let engine = SignatureEngine::new();
        let k = key(3);
        let signed = engine.sign(&doc(), &k, &[]).unwrap();
        let json = serde_json::to_string(&signed).unwrap();
        let back: AssertionDocument = serde_json::from_str(&json).unwrap();
        assert!(engine.verify(&back, &k.verifying_key()).unwrap());
    }
}
