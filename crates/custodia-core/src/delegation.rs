//! A single trust-delegation hop: a signed assertion document plus parsed
//! views of its custodian, issuer, receiver, and restrictions.
//!
//! Values are only built by the generation functions in
//! [`chain`](crate::chain) or by [`TrustDelegation::from_document`]; once
//! signed there is no mutating API, so a hop is frozen for its lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cert::{Certificate, Fingerprint};
use crate::dn::Dn;
use crate::document::{
    AssertionDocument, NameId, ParseError, CUSTODIAN_ATTRIBUTE, CUSTODIAN_DN_FORMAT,
    CUSTODIAN_HASH_FORMAT,
};
use crate::identity::{Custodian, IdentityMode};

/// One delegation hop. Serde round-trips through the raw document and
/// re-runs the parse on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AssertionDocument", into = "AssertionDocument")]
pub struct TrustDelegation {
    document: AssertionDocument,
    custodian: Custodian,
    receiver_dn: Dn,
    receiver_certificates: Vec<Certificate>,
}

impl TrustDelegation {
    /// Parse a signed document into a hop, validating the pieces every
    /// later check relies on: a subject with a non-empty DN-shaped name and
    /// the custodian attribute.
    pub fn from_document(document: AssertionDocument) -> Result<Self, ParseError> {
        let subject = document.subject().ok_or(ParseError::MissingSubject)?;
        if subject.name.value.trim().is_empty() {
            return Err(ParseError::EmptySubjectName);
        }
        let receiver_dn = Dn::parse(&subject.name.value).map_err(ParseError::SubjectDn)?;
        let receiver_certificates = subject
            .confirmation
            .as_ref()
            .map(|c| c.certificates.clone())
            .unwrap_or_default();

        let custodian_dn = document
            .attribute_value(CUSTODIAN_ATTRIBUTE, CUSTODIAN_DN_FORMAT)
            .ok_or(ParseError::MissingCustodianAttribute)?;
        let custodian_dn = Dn::parse(custodian_dn).map_err(ParseError::CustodianDn)?;

        let custodian = match document.attribute_value(CUSTODIAN_ATTRIBUTE, CUSTODIAN_HASH_FORMAT)
        {
            Some(raw) => {
                let fingerprint =
                    Fingerprint::parse(raw).ok_or_else(|| ParseError::MalformedFingerprint {
                        value: raw.to_string(),
                    })?;
                Custodian::Certificate {
                    dn: custodian_dn,
                    fingerprint,
                }
            }
            None => Custodian::Dn { dn: custodian_dn },
        };

        Ok(Self {
            document,
            custodian,
            receiver_dn,
            receiver_certificates,
        })
    }

    /// The underlying signed document.
    pub fn document(&self) -> &AssertionDocument {
        &self.document
    }

    /// The root-custodian claim this hop carries.
    pub fn custodian(&self) -> &Custodian {
        &self.custodian
    }

    /// DN mode or certificate mode, per the custodian record.
    pub fn mode(&self) -> IdentityMode {
        self.custodian.mode()
    }

    /// The signer identity recorded in the document header.
    pub fn issuer(&self) -> &NameId {
        &self.document.issuer
    }

    /// The receiver's subject DN.
    pub fn receiver_dn(&self) -> &Dn {
        &self.receiver_dn
    }

    /// The receiver's certificate chain from the holder-of-key
    /// confirmation, `None` when the hop carries no certificates.
    pub fn receiver_certificates(&self) -> Option<&[Certificate]> {
        if self.receiver_certificates.is_empty() {
            None
        } else {
            Some(&self.receiver_certificates)
        }
    }

    /// The signer's certificate chain from the signature key-info.
    pub fn signer_certificates(&self) -> Option<&[Certificate]> {
        self.document
            .signature()
            .map(|block| block.key_info.as_slice())
            .filter(|certs| !certs.is_empty())
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.document.conditions().and_then(|c| c.not_before)
    }

    pub fn not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.document.conditions().and_then(|c| c.not_on_or_after)
    }

    /// The hop's own proxy limit; non-positive means unrestricted.
    pub fn max_proxy_count(&self) -> i32 {
        self.document
            .conditions()
            .and_then(|c| c.proxy_restriction)
            .unwrap_or(-1)
    }

    /// Opaque custom conditions embedded at issuance.
    pub fn custom_conditions(&self) -> &[serde_json::Value] {
        self.document
            .conditions()
            .map(|c| c.custom.as_slice())
            .unwrap_or(&[])
    }
}

impl TryFrom<AssertionDocument> for TrustDelegation {
    type Error = ParseError;

    fn try_from(document: AssertionDocument) -> Result<Self, Self::Error> {
        Self::from_document(document)
    }
}

impl From<TrustDelegation> for AssertionDocument {
    fn from(delegation: TrustDelegation) -> Self {
        delegation.document
    }
}
