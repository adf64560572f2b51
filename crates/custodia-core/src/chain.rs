//! Delegation chains and their issuance.
//!
//! A chain is an ordered sequence of signed hops, index 0 issued directly
//! by or for the root custodian. Issuance never mutates: [`DelegationChain::extended`]
//! returns a new chain value, so issued chains can be shared across threads
//! as immutable snapshots.

use serde::{Deserialize, Serialize};
use tracing::debug;

use ed25519_dalek::SigningKey;

use crate::cert::{Certificate, CertificateError};
use crate::delegation::TrustDelegation;
use crate::dn::Dn;
use crate::document::{
    AssertionChild, AssertionDocument, Attribute, Conditions, NameId, ParseError, Subject,
    SubjectConfirmation, CONFIRMATION_HOLDER_OF_KEY, CUSTODIAN_ATTRIBUTE, CUSTODIAN_DN_FORMAT,
    CUSTODIAN_HASH_FORMAT,
};
use crate::identity::{Custodian, Identity, IdentityMode};
use crate::restrictions::DelegationRestrictions;
use crate::sign::{SignatureEngine, SignatureError};

/// Structural misuse of the issuance API. These indicate programmer error,
/// not untrusted input, and are raised before any signing occurs.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("delegation chain is empty")]
    Empty,

    #[error("empty {name} argument")]
    EmptyArgument { name: &'static str },

    #[error("chain identity mode is {chain} but the new hop uses {requested}")]
    ModeMismatch {
        chain: IdentityMode,
        requested: IdentityMode,
    },

    #[error("initial assertion signature carries no signer certificate")]
    MissingInitialSignerCertificate,

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// An ordered, immutable sequence of delegation hops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationChain {
    assertions: Vec<TrustDelegation>,
}

impl DelegationChain {
    /// A one-hop chain.
    pub fn new(first: TrustDelegation) -> Self {
        Self {
            assertions: vec![first],
        }
    }

    pub fn assertions(&self) -> &[TrustDelegation] {
        &self.assertions
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// The chain's identity mode, fixed by the first hop's custodian record.
    pub fn mode(&self) -> Option<IdentityMode> {
        self.assertions.first().map(|a| a.mode())
    }

    /// Append a hop delegating from this chain's current receiver to
    /// `receiver`, signed with `issuer_key` / `issuer_chain`. Returns a new
    /// chain; the existing one is untouched.
    ///
    /// Certificate mode re-derives the custodian certificate from the first
    /// hop's *signature* key-info (the actual root signer), never from the
    /// caller, so a caller cannot silently rewrite the custodian mid-chain.
    pub fn extended(
        &self,
        engine: &SignatureEngine,
        issuer_chain: &[Certificate],
        issuer_key: &SigningKey,
        receiver: &Identity,
        restrictions: Option<DelegationRestrictions>,
    ) -> Result<DelegationChain, ChainError> {
        let first = self.assertions.first().ok_or(ChainError::Empty)?;
        let chain_mode = first.mode();
        if chain_mode != receiver.mode() {
            return Err(ChainError::ModeMismatch {
                chain: chain_mode,
                requested: receiver.mode(),
            });
        }

        let custodian = match chain_mode {
            IdentityMode::Dn => first.custodian().clone(),
            IdentityMode::Certificate => {
                let signer = first
                    .signer_certificates()
                    .ok_or(ChainError::MissingInitialSignerCertificate)?;
                Custodian::from_certificate(&signer[0])?
            }
        };

        // The new hop's issuer is the previous hop's receiver. Non-empty
        // was established above.
        let last = &self.assertions[self.assertions.len() - 1];
        let issuer_name = NameId::x509(last.receiver_dn().to_string());

        let hop = generate(
            engine,
            custodian,
            issuer_name,
            issuer_key,
            issuer_chain,
            receiver,
            restrictions,
        )?;

        debug!(
            position = self.assertions.len(),
            receiver = %hop.receiver_dn(),
            "chain extended"
        );

        let mut assertions = self.assertions.clone();
        assertions.push(hop);
        Ok(DelegationChain { assertions })
    }
}

/// First hop of a DN-mode chain, self-issued by the custodian.
pub fn generate_dn(
    engine: &SignatureEngine,
    custodian_dn: &Dn,
    issuer_key: &SigningKey,
    issuer_certificates: &[Certificate],
    receiver: &Dn,
    restrictions: Option<DelegationRestrictions>,
) -> Result<TrustDelegation, ChainError> {
    generate(
        engine,
        Custodian::Dn {
            dn: custodian_dn.clone(),
        },
        NameId::x509(custodian_dn.to_string()),
        issuer_key,
        issuer_certificates,
        &Identity::Dn(receiver.clone()),
        restrictions,
    )
}

/// First hop of a certificate-mode chain: custodian DN plus fingerprint
/// attributes, receiver bound by holder-of-key confirmation.
pub fn generate_cert(
    engine: &SignatureEngine,
    custodian_cert: &Certificate,
    issuer_key: &SigningKey,
    issuer_chain: &[Certificate],
    receiver_chain: &[Certificate],
    restrictions: Option<DelegationRestrictions>,
) -> Result<TrustDelegation, ChainError> {
    generate(
        engine,
        Custodian::from_certificate(custodian_cert)?,
        NameId::x509(custodian_cert.tbs.subject.to_string()),
        issuer_key,
        issuer_chain,
        &Identity::Certificates(receiver_chain.to_vec()),
        restrictions,
    )
}

/// First hop whose signing issuer differs from the custodian (an identity
/// provider issuing on behalf of a user with no signing keys). The issuer
/// identity may use any NameID format; whether the issuer is trusted is
/// decided entirely at validation time by trust-root resolution.
#[allow(clippy::too_many_arguments)]
pub fn generate_bootstrap(
    engine: &SignatureEngine,
    custodian_dn: &Dn,
    issuer_key: &SigningKey,
    issuer_chain: &[Certificate],
    issuer_name: &str,
    issuer_format: &str,
    receiver: &Dn,
    restrictions: Option<DelegationRestrictions>,
) -> Result<TrustDelegation, ChainError> {
    generate(
        engine,
        Custodian::Dn {
            dn: custodian_dn.clone(),
        },
        NameId {
            value: issuer_name.to_string(),
            format: issuer_format.to_string(),
        },
        issuer_key,
        issuer_chain,
        &Identity::Dn(receiver.clone()),
        restrictions,
    )
}

/// Build, sign, and re-parse one hop.
pub(crate) fn generate(
    engine: &SignatureEngine,
    custodian: Custodian,
    issuer_name: NameId,
    issuer_key: &SigningKey,
    issuer_chain: &[Certificate],
    receiver: &Identity,
    restrictions: Option<DelegationRestrictions>,
) -> Result<TrustDelegation, ChainError> {
    let restrictions = restrictions.unwrap_or_else(DelegationRestrictions::standard);

    let subject = match receiver {
        Identity::Dn(dn) => Subject {
            name: NameId::x509(dn.to_string()),
            confirmation: None,
        },
        Identity::Certificates(chain) => {
            let leaf = chain.first().ok_or(ParseError::EmptySubjectName)?;
            Subject {
                name: NameId::x509(leaf.tbs.subject.to_string()),
                confirmation: Some(SubjectConfirmation {
                    method: CONFIRMATION_HOLDER_OF_KEY.to_string(),
                    certificates: chain.clone(),
                }),
            }
        }
    };

    let mut attributes = vec![Attribute {
        name: CUSTODIAN_ATTRIBUTE.to_string(),
        name_format: CUSTODIAN_DN_FORMAT.to_string(),
        values: vec![custodian.dn().to_string()],
    }];
    if let Custodian::Certificate { fingerprint, .. } = &custodian {
        attributes.push(Attribute {
            name: CUSTODIAN_ATTRIBUTE.to_string(),
            name_format: CUSTODIAN_HASH_FORMAT.to_string(),
            values: vec![fingerprint.to_string()],
        });
    }

    let mut doc = AssertionDocument::new(issuer_name);
    doc.children.push(AssertionChild::Conditions(Conditions {
        not_before: restrictions.not_before,
        not_on_or_after: restrictions.not_on_or_after,
        proxy_restriction: restrictions
            .restricts_proxy_depth()
            .then_some(restrictions.max_proxy_count),
        custom: restrictions.custom_conditions,
    }));
    doc.children.push(AssertionChild::Subject(subject));
    doc.children
        .push(AssertionChild::AttributeStatement { attributes });

    let signed = engine.sign(&doc, issuer_key, issuer_chain)?;
    Ok(TrustDelegation::from_document(signed)?)
}
