//! The delegation-chain validation engine.
//!
//! Security-validation outcomes are values, never errors: every check
//! returns a [`ValidationResult`] whose reason can be shown to operators
//! and fed to audit logs. The `Err` channel of the chain validator is
//! reserved for structural misuse (empty chain, mixed identity modes), per
//! the error taxonomy of this crate.
//!
//! Both the single-assertion validator and the chain walk come in a DN
//! variant and a certificate variant: structurally identical algorithms
//! over different equality primitives, kept as two explicit code paths so
//! each mode's checks are exhaustive and visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::cert::Certificate;
use crate::chain::{ChainError, DelegationChain};
use crate::delegation::TrustDelegation;
use crate::dn::Dn;
use crate::document::{NameId, NAMEID_FORMAT_X509};
use crate::identity::{Custodian, IdentityMode};
use crate::sign::SignatureEngine;
use crate::trust::TrustedIssuerStore;

/// The outcome of a verification operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            f.write_str("valid")
        } else {
            write!(f, "invalid: {}", self.reason.as_deref().unwrap_or("unknown"))
        }
    }
}

/// Verdict of the external certificate-path oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathValidation {
    pub valid: bool,
    pub summary: String,
}

impl PathValidation {
    pub fn valid(summary: impl Into<String>) -> Self {
        Self {
            valid: true,
            summary: summary.into(),
        }
    }

    pub fn invalid(summary: impl Into<String>) -> Self {
        Self {
            valid: false,
            summary: summary.into(),
        }
    }
}

/// The X.509 path-trust oracle. Implementations may block on network I/O
/// (OCSP, CRL); the engine imposes no timeout of its own.
pub trait CertPathValidator {
    fn validate(&self, chain: &[Certificate]) -> PathValidation;
}

/// Parse a NameID as a DN where that is meaningful.
fn name_id_dn(name: &NameId) -> Option<Dn> {
    Dn::parse(&name.value).ok()
}

fn same_name(a: &NameId, b: &NameId) -> bool {
    if a.format != b.format {
        return false;
    }
    if a.format == NAMEID_FORMAT_X509 {
        match (name_id_dn(a), name_id_dn(b)) {
            (Some(da), Some(db)) => da == db,
            _ => a.value == b.value,
        }
    } else {
        a.value == b.value
    }
}

/// Validate one DN-mode assertion against expectations, at the current
/// instant.
pub fn validate_assertion_dn(
    engine: &SignatureEngine,
    assertion: &TrustDelegation,
    expected_custodian: &Dn,
    expected_issuer: &NameId,
    expected_receiver: &Dn,
    path_validator: &dyn CertPathValidator,
) -> ValidationResult {
    validate_assertion_dn_at(
        engine,
        assertion,
        expected_custodian,
        expected_issuer,
        expected_receiver,
        path_validator,
        Utc::now(),
    )
}

/// DN-mode single-assertion validator with an explicit clock.
///
/// Checks run in a fixed order and short-circuit on the first failure.
pub fn validate_assertion_dn_at(
    engine: &SignatureEngine,
    assertion: &TrustDelegation,
    expected_custodian: &Dn,
    expected_issuer: &NameId,
    expected_receiver: &Dn,
    path_validator: &dyn CertPathValidator,
    now: DateTime<Utc>,
) -> ValidationResult {
    // 1. Issuer identity.
    if !same_name(assertion.issuer(), expected_issuer) {
        return ValidationResult::invalid("Wrong issuer");
    }

    // 2. Receiver identity.
    if assertion.receiver_dn() != expected_receiver {
        return ValidationResult::invalid("Wrong receiver");
    }

    // 3. Issuer certificate, from the assertion's own signature key-info.
    let signer_chain = match assertion.signer_certificates() {
        Some(chain) => chain,
        None => return ValidationResult::invalid("Lack of issuer certificate"),
    };
    let issuer_cert = &signer_chain[0];

    // 4. Custodian claim.
    if !assertion.custodian().matches_dn(expected_custodian) {
        return ValidationResult::invalid(format!(
            "Wrong custodian: got {}, expected {}",
            assertion.custodian(),
            expected_custodian
        ));
    }

    finish_assertion_checks(engine, assertion, issuer_cert, signer_chain, path_validator, now)
}

/// Validate one certificate-mode assertion, at the current instant.
pub fn validate_assertion_certs(
    engine: &SignatureEngine,
    assertion: &TrustDelegation,
    expected_custodian: &Certificate,
    expected_issuer: &[Certificate],
    expected_receiver: &[Certificate],
    path_validator: &dyn CertPathValidator,
) -> ValidationResult {
    validate_assertion_certs_at(
        engine,
        assertion,
        expected_custodian,
        expected_issuer,
        expected_receiver,
        path_validator,
        Utc::now(),
    )
}

/// Certificate-mode single-assertion validator with an explicit clock.
pub fn validate_assertion_certs_at(
    engine: &SignatureEngine,
    assertion: &TrustDelegation,
    expected_custodian: &Certificate,
    expected_issuer: &[Certificate],
    expected_receiver: &[Certificate],
    path_validator: &dyn CertPathValidator,
    now: DateTime<Utc>,
) -> ValidationResult {
    // 1. Issuer identity: the signer chain recorded in the signature.
    let recorded_issuer = assertion.signer_certificates().unwrap_or(&[]);
    if recorded_issuer != expected_issuer {
        return ValidationResult::invalid("Wrong issuer");
    }

    // 2. Receiver identity: chain length and order-sensitive element
    // equality. The message differs from DN mode on purpose; receiver
    // certificate mismatches are diagnostically different.
    let recorded_receiver = assertion.receiver_certificates().unwrap_or(&[]);
    if recorded_receiver != expected_receiver {
        return ValidationResult::invalid("Wrong delegation receiver");
    }

    // 3. Issuer certificate, directly from the expected issuer chain.
    let issuer_cert = match expected_issuer.first() {
        Some(cert) => cert,
        None => return ValidationResult::invalid("Lack of issuer certificate"),
    };

    // 4. Custodian claim: DN equality AND fingerprint equality.
    if !assertion.custodian().matches_certificate(expected_custodian) {
        let expected_fp = expected_custodian
            .fingerprint()
            .map(|fp| fp.to_string())
            .unwrap_or_else(|_| "?".to_string());
        return ValidationResult::invalid(format!(
            "Wrong custodian: got {}, expected {} [{}]",
            assertion.custodian(),
            expected_custodian.tbs.subject,
            expected_fp
        ));
    }

    finish_assertion_checks(
        engine,
        assertion,
        issuer_cert,
        expected_issuer,
        path_validator,
        now,
    )
}

/// Checks 5-7, shared by both modes: issuer-certificate acceptability,
/// signature, delegation window.
fn finish_assertion_checks(
    engine: &SignatureEngine,
    assertion: &TrustDelegation,
    issuer_cert: &Certificate,
    issuer_chain: &[Certificate],
    path_validator: &dyn CertPathValidator,
    now: DateTime<Utc>,
) -> ValidationResult {
    // 5. Issuer certificate validity: its own X.509 window, independent of
    // the delegation's SAML window, then the caller's path oracle.
    if !issuer_cert.is_valid_at(now) {
        return ValidationResult::invalid("Issuer certificate is not valid");
    }
    let path = path_validator.validate(issuer_chain);
    if !path.valid {
        return ValidationResult::invalid(format!(
            "Issuer certificate is not valid: {}",
            path.summary
        ));
    }

    // 6. Cryptographic signature against the issuer certificate's key.
    let key = match issuer_cert.verifying_key() {
        Ok(key) => key,
        Err(e) => return ValidationResult::invalid(format!("Signature is incorrect: {e}")),
    };
    match engine.verify(assertion.document(), &key) {
        Ok(true) => {}
        Ok(false) => return ValidationResult::invalid("Signature is incorrect"),
        Err(e) => return ValidationResult::invalid(format!("Signature is incorrect: {e}")),
    }

    // 7. Delegation window, half-open: not_before inclusive,
    // not_on_or_after exclusive.
    if let Some(not_before) = assertion.not_before() {
        if now < not_before {
            return ValidationResult::invalid("Delegation is not yet valid");
        }
    }
    if let Some(not_on_or_after) = assertion.not_on_or_after() {
        if now >= not_on_or_after {
            return ValidationResult::invalid("Delegation is no more valid");
        }
    }

    ValidationResult::valid()
}

/// The chain validation engine: signer/verifier context, path oracle, and
/// the bootstrap issuer set, bundled for repeated use.
pub struct ChainValidator<'a> {
    engine: &'a SignatureEngine,
    path_validator: &'a dyn CertPathValidator,
    trusted_issuers: &'a TrustedIssuerStore,
}

impl<'a> ChainValidator<'a> {
    pub fn new(
        engine: &'a SignatureEngine,
        path_validator: &'a dyn CertPathValidator,
        trusted_issuers: &'a TrustedIssuerStore,
    ) -> Self {
        Self {
            engine,
            path_validator,
            trusted_issuers,
        }
    }

    /// Is `subject` a legitimate delegate of `user` through this DN-mode
    /// chain, now?
    pub fn validate_dn(
        &self,
        chain: &DelegationChain,
        subject: &Dn,
        user: &Dn,
    ) -> Result<ValidationResult, ChainError> {
        self.validate_dn_at(chain, subject, user, Utc::now())
    }

    /// DN-mode chain validation with an explicit clock.
    pub fn validate_dn_at(
        &self,
        chain: &DelegationChain,
        subject: &Dn,
        user: &Dn,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, ChainError> {
        let assertions = chain.assertions();
        let first = assertions.first().ok_or(ChainError::Empty)?;

        // Trust-root resolution.
        let custodian_dn = match first.custodian() {
            Custodian::Dn { dn } => dn,
            Custodian::Certificate { .. } => {
                return Err(ChainError::ModeMismatch {
                    chain: IdentityMode::Certificate,
                    requested: IdentityMode::Dn,
                })
            }
        };
        if custodian_dn != user {
            return Ok(self.reject("Wrong user"));
        }
        let self_issued = name_id_dn(first.issuer()).is_some_and(|dn| &dn == custodian_dn);
        if !self_issued {
            let vouched = first
                .signer_certificates()
                .is_some_and(|certs| self.trusted_issuers.contains(&certs[0]));
            if !vouched {
                return Ok(self.reject(format!(
                    "Initial trust delegation is not consistent with the declared \
                     assertion issuer certificate and it is not among [{}]",
                    self.trusted_issuers.names().join(", ")
                )));
            }
        }

        // Walk the chain until the claimed subject is found.
        let n = assertions.len();
        let mut limits = Vec::with_capacity(n);
        let mut found = None;
        for (i, assertion) in assertions.iter().enumerate() {
            let next_issuer_dn = if i + 1 < n {
                match name_id_dn(assertions[i + 1].issuer()) {
                    Some(dn) if &dn == assertion.receiver_dn() => Some(dn),
                    _ => {
                        return Ok(self.reject(format!("Chain is inconsistent at position {i}")))
                    }
                }
            } else {
                // Last hop: a receiver other than the claimed subject means
                // the subject is simply not on this chain.
                if assertion.receiver_dn() != subject {
                    break;
                }
                None
            };
            let expected_receiver = next_issuer_dn.as_ref().unwrap_or(subject);

            let hop = validate_assertion_dn_at(
                self.engine,
                assertion,
                custodian_dn,
                assertion.issuer(),
                expected_receiver,
                self.path_validator,
                now,
            );
            if !hop.is_valid() {
                return Ok(self.reject(format!(
                    "Chain has invalid entry at position {i}: {}",
                    hop.reason().unwrap_or("unknown")
                )));
            }
            debug!(position = i, receiver = %assertion.receiver_dn(), "delegation hop validated");

            limits.push(assertion.max_proxy_count());
            if assertion.receiver_dn() == subject {
                found = Some(i);
                break;
            }
        }

        self.conclude(found, &limits)
    }

    /// Is the party holding `subject_chain` a legitimate delegate of the
    /// party holding `user_chain` through this certificate-mode chain, now?
    pub fn validate_certs(
        &self,
        chain: &DelegationChain,
        subject_chain: &[Certificate],
        user_chain: &[Certificate],
    ) -> Result<ValidationResult, ChainError> {
        self.validate_certs_at(chain, subject_chain, user_chain, Utc::now())
    }

    /// Certificate-mode chain validation with an explicit clock. The same
    /// walk as the DN variant, with certificate-chain equality substituted
    /// at every identity comparison.
    pub fn validate_certs_at(
        &self,
        chain: &DelegationChain,
        subject_chain: &[Certificate],
        user_chain: &[Certificate],
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, ChainError> {
        let assertions = chain.assertions();
        let first = assertions.first().ok_or(ChainError::Empty)?;
        if subject_chain.is_empty() {
            return Err(ChainError::EmptyArgument { name: "subject certificate chain" });
        }
        let user_leaf = user_chain
            .first()
            .ok_or(ChainError::EmptyArgument { name: "user certificate chain" })?;

        // Trust-root resolution.
        if first.custodian().mode() != IdentityMode::Certificate {
            return Err(ChainError::ModeMismatch {
                chain: IdentityMode::Dn,
                requested: IdentityMode::Certificate,
            });
        }
        if !first.custodian().matches_certificate(user_leaf) {
            return Ok(self.reject("Wrong user"));
        }
        let first_signer = first.signer_certificates().unwrap_or(&[]);
        let self_issued = first_signer.first() == Some(user_leaf);
        if !self_issued {
            let vouched = first_signer
                .first()
                .is_some_and(|leaf| self.trusted_issuers.contains(leaf));
            if !vouched {
                return Ok(self.reject(format!(
                    "Initial trust delegation is not consistent with the declared \
                     assertion issuer certificate and it is not among [{}]",
                    self.trusted_issuers.names().join(", ")
                )));
            }
        }

        let n = assertions.len();
        let mut limits = Vec::with_capacity(n);
        let mut found = None;
        for (i, assertion) in assertions.iter().enumerate() {
            let recorded_receiver = assertion.receiver_certificates().unwrap_or(&[]);
            let expected_receiver = if i + 1 < n {
                let next_signer = assertions[i + 1].signer_certificates().unwrap_or(&[]);
                if recorded_receiver != next_signer {
                    return Ok(self.reject(format!("Chain is inconsistent at position {i}")));
                }
                next_signer
            } else {
                if recorded_receiver != subject_chain {
                    break;
                }
                subject_chain
            };

            let hop = validate_assertion_certs_at(
                self.engine,
                assertion,
                user_leaf,
                assertion.signer_certificates().unwrap_or(&[]),
                expected_receiver,
                self.path_validator,
                now,
            );
            if !hop.is_valid() {
                return Ok(self.reject(format!(
                    "Chain has invalid entry at position {i}: {}",
                    hop.reason().unwrap_or("unknown")
                )));
            }
            debug!(position = i, receiver = %assertion.receiver_dn(), "delegation hop validated");

            limits.push(assertion.max_proxy_count());
            if recorded_receiver == subject_chain {
                found = Some(i);
                break;
            }
        }

        self.conclude(found, &limits)
    }

    /// Subject location plus the cumulative proxy-depth check over the
    /// validated prefix.
    fn conclude(
        &self,
        found: Option<usize>,
        limits: &[i32],
    ) -> Result<ValidationResult, ChainError> {
        let found = match found {
            Some(i) => i,
            None => return Ok(self.reject("Wrong subject")),
        };
        for (j, &limit) in limits.iter().enumerate().take(found + 1) {
            // Non-positive limits do not restrict.
            if limit > 0 && (found - j + 1) as i32 > limit {
                return Ok(self.reject(format!(
                    "Chain length exceeds maximum proxy restriction of assertion at position {j}"
                )));
            }
        }
        debug!(subject_position = found, "delegation chain accepted");
        Ok(ValidationResult::valid())
    }

    fn reject(&self, reason: impl Into<String>) -> ValidationResult {
        let result = ValidationResult::invalid(reason);
        warn!(reason = result.reason().unwrap_or(""), "delegation chain rejected");
        result
    }
}
