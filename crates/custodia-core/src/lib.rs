//! SAML2-style extended trust delegation (ETD).
//!
//! A custodian delegates restricted authority to a receiver, who may
//! re-delegate in turn, forming a chain of signed assertions. Any relying
//! party can later check, offline, that a claimed subject legitimately
//! holds authority delegated transitively from a claimed root custodian.
//!
//! The crate is organized leaves-first:
//!
//! - [`dn`]: canonical distinguished names;
//! - [`cert`]: ed25519 party certificates and fingerprints;
//! - [`identity`]: the DN / certificate identity unions;
//! - [`restrictions`]: validity windows and proxy limits;
//! - [`document`] and [`sign`]: the signed-assertion model and the
//!   signer/verifier context;
//! - [`delegation`] and [`chain`]: single hops and chain issuance;
//! - [`validate`]: the single-assertion and chain validators;
//! - [`trust`]: bootstrap issuer stores and path-validator oracles.
//!
//! All operations are pure, synchronous and CPU-bound; chains are values
//! and issuance returns new snapshots, so distinct chains can be processed
//! concurrently without synchronization.

pub mod cert;
pub mod chain;
pub mod delegation;
pub mod dn;
pub mod document;
pub mod identity;
pub mod restrictions;
pub mod sign;
pub mod trust;
pub mod validate;

pub use cert::{Certificate, CertificateError, Fingerprint, TbsCertificate};
pub use chain::{
    generate_bootstrap, generate_cert, generate_dn, ChainError, DelegationChain,
};
pub use delegation::TrustDelegation;
pub use dn::{Dn, DnError};
pub use document::{AssertionDocument, NameId, ParseError};
pub use identity::{Custodian, Identity, IdentityMode};
pub use restrictions::{DelegationRestrictions, RestrictionsError};
pub use sign::{SignatureEngine, SignatureError};
pub use trust::{
    AnchoredPathValidator, PermissivePathValidator, TrustStoreError, TrustedIssuerStore,
};
pub use validate::{
    validate_assertion_certs, validate_assertion_certs_at, validate_assertion_dn,
    validate_assertion_dn_at, CertPathValidator, ChainValidator, PathValidation,
    ValidationResult,
};
