//! Identity representations of delegation parties.
//!
//! Both unions are closed on purpose: every comparison site matches
//! exhaustively on the mode, so a certificate-mode check can never be
//! silently skipped on a DN-mode value or vice versa. Cross-kind comparison
//! is always "not equal".

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cert::{Certificate, CertificateError, Fingerprint};
use crate::dn::Dn;

/// Which identity world a chain lives in. Fixed by the first assertion and
/// enforced across every later hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    Dn,
    Certificate,
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMode::Dn => f.write_str("dn"),
            IdentityMode::Certificate => f.write_str("certificate"),
        }
    }
}

/// The root-custodian claim recorded inside every assertion of a chain.
///
/// The fingerprint is what distinguishes certificate-mode chains: it binds
/// the custodian claim to the custodian's actual certificate without
/// re-verifying a full path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Custodian {
    Dn { dn: Dn },
    Certificate { dn: Dn, fingerprint: Fingerprint },
}

impl Custodian {
    /// Build a certificate-mode custodian record from the custodian's
    /// certificate.
    pub fn from_certificate(cert: &Certificate) -> Result<Self, CertificateError> {
        Ok(Self::Certificate {
            dn: cert.tbs.subject.clone(),
            fingerprint: cert.fingerprint()?,
        })
    }

    pub fn mode(&self) -> IdentityMode {
        match self {
            Custodian::Dn { .. } => IdentityMode::Dn,
            Custodian::Certificate { .. } => IdentityMode::Certificate,
        }
    }

    /// The custodian DN, present in both modes.
    pub fn dn(&self) -> &Dn {
        match self {
            Custodian::Dn { dn } => dn,
            Custodian::Certificate { dn, .. } => dn,
        }
    }

    /// DN-mode match: record must be DN-shaped and name-equal.
    pub fn matches_dn(&self, expected: &Dn) -> bool {
        match self {
            Custodian::Dn { dn } => dn == expected,
            Custodian::Certificate { .. } => false,
        }
    }

    /// Certificate-mode match: DN equality AND fingerprint equality, both
    /// required.
    pub fn matches_certificate(&self, expected: &Certificate) -> bool {
        match self {
            Custodian::Dn { .. } => false,
            Custodian::Certificate { dn, fingerprint } => {
                if dn != &expected.tbs.subject {
                    return false;
                }
                match expected.fingerprint() {
                    Ok(expected_fp) => fingerprint == &expected_fp,
                    Err(_) => false,
                }
            }
        }
    }
}

impl fmt::Display for Custodian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Custodian::Dn { dn } => write!(f, "{dn}"),
            Custodian::Certificate { dn, fingerprint } => write!(f, "{dn} [{fingerprint}]"),
        }
    }
}

/// A delegation party as supplied by callers: a bare DN or a certificate
/// chain (leaf first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Dn(Dn),
    Certificates(Vec<Certificate>),
}

impl Identity {
    pub fn mode(&self) -> IdentityMode {
        match self {
            Identity::Dn(_) => IdentityMode::Dn,
            Identity::Certificates(_) => IdentityMode::Certificate,
        }
    }

    /// The party's subject DN: the DN itself, or the leaf certificate's
    /// subject. `None` for an empty certificate chain.
    pub fn subject_dn(&self) -> Option<&Dn> {
        match self {
            Identity::Dn(dn) => Some(dn),
            Identity::Certificates(chain) => chain.first().map(|c| &c.tbs.subject),
        }
    }
}
