//! The signed-assertion document model.
//!
//! A structured stand-in for a SAML2 assertion. Two details are bit-exact
//! interoperability requirements and must never change:
//!
//! - the custodian attribute name/format pairs (`TrustDelegationOfUser`
//!   under `urn:unicore:trust-delegation:dn` and
//!   `urn:unicore:trust-delegation:hashcode`);
//! - the enveloped-signature placement: the signature element is inserted
//!   immediately before the first `Subject` child of the document root, or
//!   appended when no such child exists.
//!
//! Children serialize as an ordered, internally tagged array, so the
//! insertion point survives serialization round-trips.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cert::Certificate;

/// Attribute carrying the custodian claim.
pub const CUSTODIAN_ATTRIBUTE: &str = "TrustDelegationOfUser";
/// Format of the custodian DN attribute value.
pub const CUSTODIAN_DN_FORMAT: &str = "urn:unicore:trust-delegation:dn";
/// Format of the custodian certificate-fingerprint attribute value.
pub const CUSTODIAN_HASH_FORMAT: &str = "urn:unicore:trust-delegation:hashcode";

/// SAML NameID format for X.509 subject names.
pub const NAMEID_FORMAT_X509: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName";
/// SAML NameID format for opaque entity identifiers (bootstrap issuers).
pub const NAMEID_FORMAT_ENTITY: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";
/// Holder-of-key subject confirmation method.
pub const CONFIRMATION_HOLDER_OF_KEY: &str = "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key";

/// Assertion version, fixed at SAML 2.0.
pub const ASSERTION_VERSION: &str = "2.0";

/// Malformed-document errors, raised during parsing before any
/// `ValidationResult` workflow is possible.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("assertion has no subject element")]
    MissingSubject,

    #[error("assertion subject name is empty")]
    EmptySubjectName,

    #[error("assertion subject name is not a distinguished name: {0}")]
    SubjectDn(#[source] crate::dn::DnError),

    #[error("assertion custodian DN is malformed: {0}")]
    CustodianDn(#[source] crate::dn::DnError),

    #[error("assertion carries no custodian attribute")]
    MissingCustodianAttribute,

    #[error("malformed custodian fingerprint: {value:?}")]
    MalformedFingerprint { value: String },

    #[error("malformed assertion document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A SAML-style name with an explicit format URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    pub value: String,
    pub format: String,
}

impl NameId {
    pub fn x509(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: NAMEID_FORMAT_X509.to_string(),
        }
    }

    pub fn entity(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: NAMEID_FORMAT_ENTITY.to_string(),
        }
    }
}

/// Holder-of-key confirmation binding the receiver to its certificates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    pub method: String,
    pub certificates: Vec<Certificate>,
}

/// The receiver of a delegation hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: NameId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<SubjectConfirmation>,
}

/// Assertion conditions: validity window, proxy restriction, custom blobs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_restriction: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<serde_json::Value>,
}

/// A named, formatted attribute in the attribute statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub name_format: String,
    pub values: Vec<String>,
}

/// The detached signature element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub algorithm: String,
    /// Base64 signature over the JCS bytes of the unsigned document.
    pub value: String,
    /// The signer's certificate chain (leaf first), may be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_info: Vec<Certificate>,
}

/// One ordered child of the assertion root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element")]
pub enum AssertionChild {
    Signature(SignatureBlock),
    Subject(Subject),
    Conditions(Conditions),
    AttributeStatement { attributes: Vec<Attribute> },
}

/// An assertion document: header fields plus ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionDocument {
    pub id: String,
    pub version: String,
    pub issue_instant: DateTime<Utc>,
    pub issuer: NameId,
    pub children: Vec<AssertionChild>,
}

impl AssertionDocument {
    /// A fresh unsigned document with a SAML-shaped `_`-prefixed ID.
    pub fn new(issuer: NameId) -> Self {
        Self {
            id: format!("_{}", Uuid::new_v4().simple()),
            version: ASSERTION_VERSION.to_string(),
            issue_instant: Utc::now(),
            issuer,
            children: Vec::new(),
        }
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.children.iter().find_map(|c| match c {
            AssertionChild::Subject(s) => Some(s),
            _ => None,
        })
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.children.iter().find_map(|c| match c {
            AssertionChild::Conditions(c) => Some(c),
            _ => None,
        })
    }

    pub fn attributes(&self) -> &[Attribute] {
        self.children
            .iter()
            .find_map(|c| match c {
                AssertionChild::AttributeStatement { attributes } => {
                    Some(attributes.as_slice())
                }
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn signature(&self) -> Option<&SignatureBlock> {
        self.children.iter().find_map(|c| match c {
            AssertionChild::Signature(s) => Some(s),
            _ => None,
        })
    }

    /// First value of the attribute with the given name and format.
    pub fn attribute_value(&self, name: &str, format: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|a| a.name == name && a.name_format == format)
            .and_then(|a| a.values.first())
            .map(String::as_str)
    }

    /// Insert the signature at the enveloped position: immediately before
    /// the first `Subject` child, or appended when none exists.
    pub fn insert_signature(&mut self, block: SignatureBlock) {
        let position = self
            .children
            .iter()
            .position(|c| matches!(c, AssertionChild::Subject(_)))
            .unwrap_or(self.children.len());
        self.children
            .insert(position, AssertionChild::Signature(block));
    }

    /// A copy with all signature children removed: the canonicalization
    /// input for signing and verification.
    pub fn without_signature(&self) -> AssertionDocument {
        let mut doc = self.clone();
        doc.children
            .retain(|c| !matches!(c, AssertionChild::Signature(_)));
        doc
    }
}
