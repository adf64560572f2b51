//! Trust material supplied by callers: the bootstrap issuer set and
//! certificate-path validators.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cert::{Certificate, CertificateError, Fingerprint};
use crate::validate::{CertPathValidator, PathValidation};

/// Trust-store loading errors.
#[derive(Debug, thiserror::Error)]
pub enum TrustStoreError {
    #[error("failed to read trust policy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse trust policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse certificate {path}: {source}")]
    CertificateFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// YAML trust-policy file: a list of certificate files.
///
/// ```yaml
/// trusted_issuers:
///   - path: certs/idp.json
///     name: site identity provider
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TrustPolicyFile {
    #[serde(default)]
    trusted_issuers: Vec<TrustedIssuerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrustedIssuerEntry {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// The caller-supplied set of certificates allowed to sign bootstrap
/// delegations. Membership is by certificate fingerprint.
#[derive(Debug, Clone, Default)]
pub struct TrustedIssuerStore {
    // BTreeMap keeps names() deterministic for failure messages.
    by_fingerprint: BTreeMap<String, Certificate>,
}

impl TrustedIssuerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted issuer certificate.
    pub fn add(&mut self, cert: Certificate) -> Result<(), CertificateError> {
        let fingerprint = cert.fingerprint()?;
        self.by_fingerprint
            .insert(fingerprint.as_str().to_string(), cert);
        Ok(())
    }

    /// Membership check by fingerprint. A certificate whose fingerprint
    /// cannot be computed is never a member.
    pub fn contains(&self, cert: &Certificate) -> bool {
        cert.fingerprint()
            .map(|fp| self.by_fingerprint.contains_key(fp.as_str()))
            .unwrap_or(false)
    }

    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.by_fingerprint.contains_key(fingerprint.as_str())
    }

    /// Subject DNs of all members, for diagnostics.
    pub fn names(&self) -> Vec<String> {
        self.by_fingerprint
            .values()
            .map(|c| c.tbs.subject.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }

    /// Load a YAML trust policy listing certificate files (JSON). Paths are
    /// resolved relative to the policy file's directory.
    pub fn from_file(path: &Path) -> Result<Self, TrustStoreError> {
        let content = fs::read_to_string(path).map_err(|source| TrustStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let policy: TrustPolicyFile = serde_yaml::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut store = Self::new();
        for entry in policy.trusted_issuers {
            let cert_path = base.join(&entry.path);
            let raw = fs::read_to_string(&cert_path).map_err(|source| TrustStoreError::Io {
                path: cert_path.clone(),
                source,
            })?;
            let cert: Certificate =
                serde_json::from_str(&raw).map_err(|source| TrustStoreError::CertificateFile {
                    path: cert_path,
                    source,
                })?;
            store.add(cert)?;
        }
        Ok(store)
    }
}

/// A path validator anchored on an explicit certificate set: walks issuer
/// links from the leaf, checking each certificate's signature and validity
/// window, and succeeds when an anchor is reached.
#[derive(Debug, Clone, Default)]
pub struct AnchoredPathValidator {
    anchors: TrustedIssuerStore,
}

impl AnchoredPathValidator {
    pub fn new(anchors: TrustedIssuerStore) -> Self {
        Self { anchors }
    }
}

impl CertPathValidator for AnchoredPathValidator {
    fn validate(&self, chain: &[Certificate]) -> PathValidation {
        if chain.is_empty() {
            return PathValidation::invalid("certificate chain is empty");
        }
        let now = Utc::now();
        for (i, cert) in chain.iter().enumerate() {
            if !cert.is_valid_at(now) {
                return PathValidation::invalid(format!(
                    "certificate {} at position {i} is outside its validity window",
                    cert.tbs.subject
                ));
            }
            if self.anchors.contains(cert) {
                return PathValidation::valid(format!("anchored at {}", cert.tbs.subject));
            }
            match chain.get(i + 1) {
                Some(issuer) => match cert.verify_signed_by(issuer) {
                    Ok(true) => {}
                    Ok(false) => {
                        return PathValidation::invalid(format!(
                            "certificate {} at position {i} is not signed by {}",
                            cert.tbs.subject, issuer.tbs.subject
                        ))
                    }
                    Err(e) => {
                        return PathValidation::invalid(format!(
                            "certificate {} at position {i} could not be checked: {e}",
                            cert.tbs.subject
                        ))
                    }
                },
                None => {
                    return PathValidation::invalid(format!(
                        "no trust anchor reached for {}",
                        chain[0].tbs.subject
                    ))
                }
            }
        }
        // Unreachable: the loop always returns on the last element.
        PathValidation::invalid("no trust anchor reached")
    }
}

/// Accepts any chain. Development and testing only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePathValidator;

impl CertPathValidator for PermissivePathValidator {
    fn validate(&self, _chain: &[Certificate]) -> PathValidation {
        PathValidation::valid("path validation disabled")
    }
}
