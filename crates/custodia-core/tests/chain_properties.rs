//! End-to-end properties of delegation-chain issuance and validation,
//! exercised over deterministic fixed-seed keys.

use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;

use custodia_core::{
    generate_bootstrap, generate_cert, generate_dn, validate_assertion_certs, AssertionDocument,
    Certificate, ChainValidator, DelegationChain, DelegationRestrictions, Dn, Identity,
    PermissivePathValidator, SignatureEngine, TrustDelegation, TrustedIssuerStore,
};

fn key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

fn self_cert(name: &str, seed: u8) -> Certificate {
    Certificate::self_signed(dn(name), &key(seed), 30).unwrap()
}

/// A -> B -> C -> D, DN mode, with a given proxy limit on the first hop.
fn three_hop_chain(engine: &SignatureEngine, first_hop_proxy: i32) -> DelegationChain {
    let restrictions = |proxy| {
        Some(
            DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, proxy)
                .unwrap(),
        )
    };

    let first = generate_dn(
        engine,
        &dn("CN=a"),
        &key(1),
        &[self_cert("CN=a", 1)],
        &dn("CN=b"),
        restrictions(first_hop_proxy),
    )
    .unwrap();
    DelegationChain::new(first)
        .extended(
            engine,
            &[self_cert("CN=b", 2)],
            &key(2),
            &Identity::Dn(dn("CN=c")),
            restrictions(-1),
        )
        .unwrap()
        .extended(
            engine,
            &[self_cert("CN=c", 3)],
            &key(3),
            &Identity::Dn(dn("CN=d")),
            restrictions(-1),
        )
        .unwrap()
}

fn validator<'a>(
    engine: &'a SignatureEngine,
    store: &'a TrustedIssuerStore,
) -> ChainValidator<'a> {
    ChainValidator::new(engine, &PermissivePathValidator, store)
}

#[test]
fn full_dn_chain_validates() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let chain = three_hop_chain(&engine, -1);
    let result = validator(&engine, &store)
        .validate_dn(&chain, &dn("CN=d"), &dn("CN=a"))
        .unwrap();
    assert!(result.is_valid(), "{result}");
}

#[test]
fn signed_assertion_round_trips_through_serialization() {
    let engine = SignatureEngine::new();
    let alice = self_cert("CN=alice,O=acme", 1);
    let hop = generate_dn(
        &engine,
        &dn("CN=Alice, O=ACME"),
        &key(1),
        std::slice::from_ref(&alice),
        &dn("CN=bob"),
        Some(DelegationRestrictions::valid_for_days(Utc::now(), 7, 2).unwrap()),
    )
    .unwrap();

    let wire = serde_json::to_string(hop.document()).unwrap();
    let parsed =
        TrustDelegation::from_document(serde_json::from_str::<AssertionDocument>(&wire).unwrap())
            .unwrap();

    assert_eq!(parsed.custodian(), hop.custodian());
    assert_eq!(parsed.issuer(), hop.issuer());
    assert_eq!(parsed.receiver_dn(), hop.receiver_dn());
    assert_eq!(parsed.not_before(), hop.not_before());
    assert_eq!(parsed.not_on_or_after(), hop.not_on_or_after());
    assert_eq!(parsed.max_proxy_count(), 2);
    // The signature still verifies against the original signer's key.
    assert!(engine
        .verify(parsed.document(), &key(1).verifying_key())
        .unwrap());
}

#[test]
fn validity_window_is_half_open_through_chain_validation() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    // Both bounds inside the issuer certificate's own validity period, so
    // only the delegation window decides the outcome.
    let nb = Utc::now() + Duration::hours(1);
    let na = Utc::now() + Duration::hours(2);
    let first = generate_dn(
        &engine,
        &dn("CN=a"),
        &key(1),
        &[self_cert("CN=a", 1)],
        &dn("CN=b"),
        Some(DelegationRestrictions::new(Some(nb), Some(na), -1).unwrap()),
    )
    .unwrap();
    let chain = DelegationChain::new(first);
    let v = validator(&engine, &store);

    let at = |t| v.validate_dn_at(&chain, &dn("CN=b"), &dn("CN=a"), t).unwrap();
    assert!(at(nb).is_valid());
    assert!(at(na - Duration::nanoseconds(1)).is_valid());

    let exactly_at_end = at(na);
    assert!(!exactly_at_end.is_valid());
    assert!(exactly_at_end.reason().unwrap().contains("no more valid"));

    let too_early = at(nb - Duration::seconds(1));
    assert!(too_early.reason().unwrap().contains("not yet valid"));
}

#[test]
fn broken_linkage_cites_the_position() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();

    // Two independent chains spliced together: [A->B, X->C].
    let a_to_b = generate_dn(
        &engine,
        &dn("CN=a"),
        &key(1),
        &[self_cert("CN=a", 1)],
        &dn("CN=b"),
        None,
    )
    .unwrap();
    let x_to_c = generate_dn(
        &engine,
        &dn("CN=a"),
        &key(9),
        &[self_cert("CN=x", 9)],
        &dn("CN=c"),
        None,
    )
    .unwrap();
    // Splice via serde to bypass issuance checks.
    let spliced: DelegationChain = serde_json::from_value(serde_json::json!({
        "assertions": [
            serde_json::to_value(a_to_b.document()).unwrap(),
            serde_json::to_value(x_to_c.document()).unwrap(),
        ]
    }))
    .unwrap();

    let result = validator(&engine, &store)
        .validate_dn(&spliced, &dn("CN=c"), &dn("CN=a"))
        .unwrap();
    assert_eq!(result.reason(), Some("Chain is inconsistent at position 0"));
}

#[test]
fn proxy_restriction_of_one_blocks_two_hop_delegation() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let restrictions = |proxy| {
        Some(DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, proxy).unwrap())
    };

    let build = |first_proxy| {
        let first = generate_dn(
            &engine,
            &dn("CN=a"),
            &key(1),
            &[self_cert("CN=a", 1)],
            &dn("CN=b"),
            restrictions(first_proxy),
        )
        .unwrap();
        DelegationChain::new(first)
            .extended(
                &engine,
                &[self_cert("CN=b", 2)],
                &key(2),
                &Identity::Dn(dn("CN=c")),
                restrictions(-1),
            )
            .unwrap()
    };
    let v = validator(&engine, &store);

    // [A->B (max=1), B->C]: sub-chain length 2 exceeds the limit at 0.
    let result = v.validate_dn(&build(1), &dn("CN=c"), &dn("CN=a")).unwrap();
    assert_eq!(
        result.reason(),
        Some("Chain length exceeds maximum proxy restriction of assertion at position 0")
    );

    // [A->B (max=2), B->C]: within the limit.
    assert!(v.validate_dn(&build(2), &dn("CN=c"), &dn("CN=a")).unwrap().is_valid());
}

#[test]
fn intermediate_receiver_ignores_later_hops() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let chain = three_hop_chain(&engine, -1);

    // Corrupt the last hop's signature; validating subject = B stops at
    // hop 0 and never examines it.
    let mut docs: Vec<serde_json::Value> = chain
        .assertions()
        .iter()
        .map(|a| serde_json::to_value(a.document()).unwrap())
        .collect();
    // children[0] is Conditions; the signature sits at index 1, enveloped
    // before the Subject child.
    docs[2]["children"][1]["value"] = serde_json::Value::String("AAAA".repeat(16));
    let tampered: DelegationChain =
        serde_json::from_value(serde_json::json!({ "assertions": docs })).unwrap();

    let v = validator(&engine, &store);
    assert!(v
        .validate_dn(&tampered, &dn("CN=b"), &dn("CN=a"))
        .unwrap()
        .is_valid());
    // The same tampered chain fails for the full-depth subject.
    assert!(!v
        .validate_dn(&tampered, &dn("CN=d"), &dn("CN=a"))
        .unwrap()
        .is_valid());
}

#[test]
fn unknown_subject_reports_wrong_subject() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let chain = three_hop_chain(&engine, -1);
    let result = validator(&engine, &store)
        .validate_dn(&chain, &dn("CN=nobody"), &dn("CN=a"))
        .unwrap();
    assert_eq!(result.reason(), Some("Wrong subject"));
}

#[test]
fn bootstrap_chain_accepted_only_via_trusted_issuer_set() {
    let engine = SignatureEngine::new();
    let idp_cert = self_cert("CN=idp,O=site", 9);
    let first = generate_bootstrap(
        &engine,
        &dn("CN=fake"),
        &key(9),
        std::slice::from_ref(&idp_cert),
        "https://idp.example.org",
        custodia_core::document::NAMEID_FORMAT_ENTITY,
        &dn("CN=b"),
        Some(DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, -1).unwrap()),
    )
    .unwrap();
    let chain = DelegationChain::new(first);

    // Signer vouched for: the declared custodian is trusted as root.
    let mut trusted = TrustedIssuerStore::new();
    trusted.add(idp_cert.clone()).unwrap();
    let result = validator(&engine, &trusted)
        .validate_dn(&chain, &dn("CN=b"), &dn("CN=fake"))
        .unwrap();
    assert!(result.is_valid(), "{result}");

    // Claimed user set to the issuer's DN instead of the custodian: the
    // root claim no longer matches.
    let result = validator(&engine, &trusted)
        .validate_dn(&chain, &dn("CN=b"), &dn("CN=idp,O=site"))
        .unwrap();
    assert_eq!(result.reason(), Some("Wrong user"));

    // Empty trusted set: the signer is not vouched for.
    let empty = TrustedIssuerStore::new();
    let result = validator(&engine, &empty)
        .validate_dn(&chain, &dn("CN=b"), &dn("CN=fake"))
        .unwrap();
    assert!(result
        .reason()
        .unwrap()
        .contains("not consistent with the declared assertion issuer certificate"));
}

#[test]
fn resigning_with_a_different_key_is_detected() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let alice_cert = self_cert("CN=a", 1);

    let hop = generate_dn(
        &engine,
        &dn("CN=a"),
        &key(1),
        std::slice::from_ref(&alice_cert),
        &dn("CN=b"),
        Some(DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, -1).unwrap()),
    )
    .unwrap();

    // Strip the signature and re-sign with a different private key than
    // the one whose certificate sits in the key-info.
    let resigned_doc = engine
        .sign(
            &hop.document().without_signature(),
            &key(13),
            std::slice::from_ref(&alice_cert),
        )
        .unwrap();
    let forged = DelegationChain::new(TrustDelegation::from_document(resigned_doc).unwrap());

    let result = validator(&engine, &store)
        .validate_dn(&forged, &dn("CN=b"), &dn("CN=a"))
        .unwrap();
    assert!(
        result.reason().unwrap().contains("Signature is incorrect"),
        "{result}"
    );
}

#[test]
fn certificate_mode_chain_validates_and_detects_wrong_user() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let alice_cert = self_cert("CN=alice", 1);
    let bob_cert = self_cert("CN=bob", 2);
    let carol_cert = self_cert("CN=carol", 3);
    let window =
        DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, -1).unwrap();

    let first = generate_cert(
        &engine,
        &alice_cert,
        &key(1),
        std::slice::from_ref(&alice_cert),
        std::slice::from_ref(&bob_cert),
        Some(window.clone()),
    )
    .unwrap();
    let chain = DelegationChain::new(first)
        .extended(
            &engine,
            std::slice::from_ref(&bob_cert),
            &key(2),
            &Identity::Certificates(vec![carol_cert.clone()]),
            Some(window),
        )
        .unwrap();

    let v = validator(&engine, &store);
    let result = v
        .validate_certs(
            &chain,
            std::slice::from_ref(&carol_cert),
            std::slice::from_ref(&alice_cert),
        )
        .unwrap();
    assert!(result.is_valid(), "{result}");

    // A same-DN certificate with different key material is a different user.
    let impostor = self_cert("CN=alice", 7);
    let result = v
        .validate_certs(
            &chain,
            std::slice::from_ref(&carol_cert),
            std::slice::from_ref(&impostor),
        )
        .unwrap();
    assert_eq!(result.reason(), Some("Wrong user"));
}

#[test]
fn unknown_subject_in_certificate_mode_reports_wrong_subject() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let alice_cert = self_cert("CN=alice", 1);
    let bob_cert = self_cert("CN=bob", 2);
    let carol_cert = self_cert("CN=carol", 3);
    let window =
        DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, -1).unwrap();

    let chain = DelegationChain::new(
        generate_cert(
            &engine,
            &alice_cert,
            &key(1),
            std::slice::from_ref(&alice_cert),
            std::slice::from_ref(&bob_cert),
            Some(window.clone()),
        )
        .unwrap(),
    )
    .extended(
        &engine,
        std::slice::from_ref(&bob_cert),
        &key(2),
        &Identity::Certificates(vec![carol_cert]),
        Some(window),
    )
    .unwrap();

    // No hop delegates to this certificate.
    let stranger = self_cert("CN=dave", 4);
    let result = validator(&engine, &store)
        .validate_certs(
            &chain,
            std::slice::from_ref(&stranger),
            std::slice::from_ref(&alice_cert),
        )
        .unwrap();
    assert_eq!(result.reason(), Some("Wrong subject"));
}

#[test]
fn wrong_receiver_chain_in_certificate_mode() {
    let engine = SignatureEngine::new();
    let alice_cert = self_cert("CN=alice", 1);
    let bob_cert = self_cert("CN=bob", 2);
    let carol_cert = self_cert("CN=carol", 3);

    let hop = generate_cert(
        &engine,
        &alice_cert,
        &key(1),
        std::slice::from_ref(&alice_cert),
        std::slice::from_ref(&bob_cert),
        None,
    )
    .unwrap();

    let result = validate_assertion_certs(
        &engine,
        &hop,
        &alice_cert,
        std::slice::from_ref(&alice_cert),
        std::slice::from_ref(&carol_cert),
        &PermissivePathValidator,
    );
    assert_eq!(result.reason(), Some("Wrong delegation receiver"));
}

#[test]
fn cert_mode_broken_linkage_cites_the_position() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let alice_cert = self_cert("CN=alice", 1);
    let bob_cert = self_cert("CN=bob", 2);
    let carol_cert = self_cert("CN=carol", 3);
    let dave_cert = self_cert("CN=dave", 4);

    // [alice->bob] followed by a hop signed by carol, who was never
    // delegated to.
    let first = generate_cert(
        &engine,
        &alice_cert,
        &key(1),
        std::slice::from_ref(&alice_cert),
        std::slice::from_ref(&bob_cert),
        None,
    )
    .unwrap();
    let detached = generate_cert(
        &engine,
        &alice_cert,
        &key(3),
        std::slice::from_ref(&carol_cert),
        std::slice::from_ref(&dave_cert),
        None,
    )
    .unwrap();
    // Splice via serde to bypass issuance checks.
    let spliced: DelegationChain = serde_json::from_value(serde_json::json!({
        "assertions": [
            serde_json::to_value(first.document()).unwrap(),
            serde_json::to_value(detached.document()).unwrap(),
        ]
    }))
    .unwrap();

    let result = validator(&engine, &store)
        .validate_certs(
            &spliced,
            std::slice::from_ref(&dave_cert),
            std::slice::from_ref(&alice_cert),
        )
        .unwrap();
    assert_eq!(result.reason(), Some("Chain is inconsistent at position 0"));
}

#[test]
fn intermediate_receiver_shortcut_in_certificate_mode() {
    let engine = SignatureEngine::new();
    let store = TrustedIssuerStore::new();
    let alice_cert = self_cert("CN=alice", 1);
    let bob_cert = self_cert("CN=bob", 2);
    let carol_cert = self_cert("CN=carol", 3);
    let window =
        DelegationRestrictions::valid_for_days(Utc::now() - Duration::hours(1), 7, -1).unwrap();

    let chain = DelegationChain::new(
        generate_cert(
            &engine,
            &alice_cert,
            &key(1),
            std::slice::from_ref(&alice_cert),
            std::slice::from_ref(&bob_cert),
            Some(window.clone()),
        )
        .unwrap(),
    )
    .extended(
        &engine,
        std::slice::from_ref(&bob_cert),
        &key(2),
        &Identity::Certificates(vec![carol_cert]),
        Some(window),
    )
    .unwrap();

    let result = validator(&engine, &store)
        .validate_certs(
            &chain,
            std::slice::from_ref(&bob_cert),
            std::slice::from_ref(&alice_cert),
        )
        .unwrap();
    assert!(result.is_valid(), "{result}");
}
