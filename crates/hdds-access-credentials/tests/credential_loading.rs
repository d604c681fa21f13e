// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::doc_markdown)] // Test documentation
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::needless_pass_by_value)] // Test functions

//! End-to-end credential loading against real S/MIME fixtures.
//!
//! See `tests/fixtures/README.md` for how the fixtures were produced.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hdds_access_credentials::{
    keys, AccessCredentials, Artifact, Certificate, CertificateLoader, DocumentVerifier,
    GovernanceRules, KeyStore, LoadError, LoadState, PermissionsGrants, PropertyList,
    SecurityProperties, SignedDocumentLoader, SmimeDocumentVerifier, VerifiedContent, VerifyError,
};
use tempfile::NamedTempFile;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn file_uri(name: &str) -> String {
    format!("file:{}", fixture_path(name).display())
}

fn valid_props() -> PropertyList {
    SecurityProperties::builder()
        .identity_ca(file_uri("other_ca.pem"))
        .permissions_ca(file_uri("permissions_ca.pem"))
        .governance(file_uri("governance.p7s"))
        .permissions(file_uri("permissions.p7s"))
        .build()
}

/// S/MIME verifier that counts how often it is asked to verify.
#[derive(Clone, Default)]
struct CountingVerifier {
    calls: Arc<AtomicUsize>,
}

impl CountingVerifier {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentVerifier for CountingVerifier {
    fn verify(&self, envelope: &[u8], trust_anchor: &Certificate) -> Result<VerifiedContent, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SmimeDocumentVerifier.verify(envelope, trust_anchor)
    }
}

fn load(props: &PropertyList) -> (AccessCredentials, CountingVerifier) {
    let verifier = CountingVerifier::default();
    let mut credentials = AccessCredentials::builder()
        .document_verifier(verifier.clone())
        .build();
    let _ = credentials.load(props);
    (credentials, verifier)
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_all_artifacts_loaded() {
    let (credentials, verifier) = load(&valid_props());

    assert_eq!(credentials.state(), LoadState::Loaded);
    assert!(credentials.failure().is_none());
    assert_eq!(verifier.calls(), 2);

    let anchor = credentials.trust_anchor().unwrap();
    assert_eq!(anchor.subject_name(), "C=FR, O=HDDS Test, CN=HDDS Permissions CA");

    let governance = credentials.governance_document().unwrap();
    let permissions = credentials.permissions_document().unwrap();
    assert!(!governance.content().is_empty());
    assert!(!permissions.content().is_empty());
    assert_eq!(governance.trust_anchor_subject(), anchor.subject_name());
    assert_eq!(permissions.signer_subject(), anchor.subject_name());

    let rules = GovernanceRules::from_document(governance).unwrap();
    assert!(rules.rule_for_domain(0).is_some());
    let grants = PermissionsGrants::from_document(permissions).unwrap();
    assert_eq!(grants.grants[0].name, "ShapesPermission");
}

#[test]
fn test_scenario_missing_governance_key() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("permissions_ca.pem"))
        .permissions(file_uri("permissions.p7s"))
        .build();
    let (credentials, verifier) = load(&props);

    let failure = credentials.failure().unwrap();
    assert_eq!(failure.artifact(), Artifact::Governance);
    assert_eq!(failure.error(), &LoadError::MissingProperty("governance"));
    assert_eq!(verifier.calls(), 0);

    // The CA was parsed, but is not exposed after the failure
    assert!(credentials.trust_anchor().is_err());
    assert!(credentials.governance_document().is_err());
    assert!(credentials.permissions_document().is_err());
}

#[test]
fn test_scenario_corrupt_anchor_short_circuits() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("corrupt_ca.pem"))
        .governance(file_uri("governance.p7s"))
        .permissions(file_uri("permissions.p7s"))
        .build();
    let (credentials, verifier) = load(&props);

    let failure = credentials.failure().unwrap();
    assert_eq!(failure.artifact(), Artifact::TrustAnchor);
    assert!(matches!(failure.error(), LoadError::MalformedCertificate(_)));
    assert_eq!(verifier.calls(), 0);
    assert_eq!(credentials.exception().minor_code, Artifact::TrustAnchor.minor_code());
}

#[test]
fn test_two_instances_are_content_equal() {
    let (first, _) = load(&valid_props());
    let (second, _) = load(&valid_props());

    let (a, b) = (first.trust_anchor().unwrap(), second.trust_anchor().unwrap());
    assert_eq!(a, b);
    assert!(!std::ptr::eq(a, b));

    assert_eq!(
        first.governance_document().unwrap(),
        second.governance_document().unwrap()
    );
    assert_eq!(
        first.permissions_document().unwrap(),
        second.permissions_document().unwrap()
    );
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[test]
fn test_missing_anchor_file_is_not_found() {
    let reference = hdds_access_credentials::resolve(&file_uri("does_not_exist.pem"));
    let err = CertificateLoader::default()
        .load_trust_anchor(&reference)
        .unwrap_err();
    assert!(matches!(err, LoadError::NotFound(_)));
}

#[test]
fn test_directory_anchor_is_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let props = PropertyList::new()
        .with(keys::PERMISSIONS_CA, dir.path().display().to_string())
        .with(keys::GOVERNANCE, file_uri("governance.p7s"))
        .with(keys::PERMISSIONS, file_uri("permissions.p7s"));
    let (credentials, _) = load(&props);

    assert!(matches!(
        credentials.failure().unwrap().error(),
        LoadError::ReadFailure { .. }
    ));
}

#[test]
fn test_document_signed_by_other_ca() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("permissions_ca.pem"))
        .governance(file_uri("governance_rogue.p7s"))
        .permissions(file_uri("permissions.p7s"))
        .build();
    let (credentials, verifier) = load(&props);

    let failure = credentials.failure().unwrap();
    assert_eq!(failure.artifact(), Artifact::Governance);
    assert!(matches!(failure.error(), LoadError::SignatureVerificationFailed(_)));
    assert_eq!(verifier.calls(), 1);
}

#[test]
fn test_anchor_mismatch_on_valid_documents() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("other_ca.pem"))
        .governance(file_uri("governance.p7s"))
        .permissions(file_uri("permissions.p7s"))
        .build();
    let (credentials, _) = load(&props);

    assert!(matches!(
        credentials.failure().unwrap().error(),
        LoadError::SignatureVerificationFailed(_)
    ));
}

#[test]
fn test_unsigned_governance_is_malformed() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("permissions_ca.pem"))
        .governance(file_uri("governance.xml"))
        .permissions(file_uri("permissions.p7s"))
        .build();
    let (credentials, _) = load(&props);

    let failure = credentials.failure().unwrap();
    assert_eq!(failure.artifact(), Artifact::Governance);
    assert!(matches!(failure.error(), LoadError::MalformedDocument(_)));
}

#[test]
fn test_tampered_governance_fails_verification() {
    let anchor = CertificateLoader::default()
        .load_trust_anchor(&hdds_access_credentials::resolve(&file_uri("permissions_ca.pem")))
        .unwrap();
    let err = SignedDocumentLoader::default()
        .load_and_verify(
            &hdds_access_credentials::resolve(&file_uri("governance_tampered.p7s")),
            &anchor,
        )
        .unwrap_err();
    assert!(matches!(err, LoadError::SignatureVerificationFailed(_)));
}

#[test]
fn test_permissions_failure_reports_permissions_artifact() {
    let props = SecurityProperties::builder()
        .permissions_ca(file_uri("permissions_ca.pem"))
        .governance(file_uri("governance.p7s"))
        .permissions(file_uri("permissions_expired_signer.p7s"))
        .build();
    let (credentials, verifier) = load(&props);

    let exception = credentials.exception();
    assert_eq!(exception.minor_code, Artifact::Permissions.minor_code());
    assert_eq!(exception.code, LoadError::SignatureVerificationFailed(String::new()).code());
    assert!(exception.message.contains("expired"));
    assert_eq!(verifier.calls(), 2);
}

// ---------------------------------------------------------------------------
// Reference forms
// ---------------------------------------------------------------------------

#[test]
fn test_chained_signer_and_bare_paths() {
    let props = PropertyList::new()
        .with(keys::PERMISSIONS_CA, fixture_path("permissions_ca.der").display().to_string())
        .with(keys::GOVERNANCE, fixture_path("governance.p7s").display().to_string())
        .with(keys::PERMISSIONS, file_uri("permissions_chained.p7s"));
    let (credentials, _) = load(&props);

    assert!(credentials.is_loaded(), "{:?}", credentials.failure());
    assert_eq!(
        credentials.permissions_document().unwrap().signer_subject(),
        "C=FR, O=HDDS Test, CN=HDDS Document Signer"
    );
}

#[test]
fn test_inline_anchor_and_last_value_wins() {
    let ca_pem = std::fs::read_to_string(fixture_path("permissions_ca.pem")).unwrap();
    let props = valid_props()
        .with(keys::PERMISSIONS_CA, format!("data:,{}", ca_pem))
        .with(keys::GOVERNANCE, "file:/nonexistent/governance.p7s")
        .with(keys::GOVERNANCE, file_uri("governance.p7s"));
    let (credentials, _) = load(&props);

    assert!(credentials.is_loaded(), "{:?}", credentials.failure());
    assert_eq!(
        credentials.trust_anchor().unwrap().der(),
        std::fs::read(fixture_path("permissions_ca.der")).unwrap()
    );
}

#[test]
fn test_pkcs11_anchor_through_key_store() {
    struct FixtureKeyStore;

    impl KeyStore for FixtureKeyStore {
        fn fetch(&self, token: &str) -> Result<Vec<u8>, String> {
            match token {
                "object=permissions_ca;type=cert" => {
                    std::fs::read(fixture_path("permissions_ca.der")).map_err(|e| e.to_string())
                }
                other => Err(format!("unknown object {}", other)),
            }
        }
    }

    let props = valid_props().with(keys::PERMISSIONS_CA, "pkcs11:object=permissions_ca;type=cert");

    let (without_store, _) = load(&props);
    assert!(matches!(
        without_store.failure().unwrap().error(),
        LoadError::UnsupportedReference(_)
    ));

    let mut with_store = AccessCredentials::builder()
        .key_store(FixtureKeyStore)
        .build();
    with_store.load(&props).unwrap();
    assert!(with_store.trust_anchor().unwrap().is_ca());
}

#[test]
fn test_yaml_property_file() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "dds.sec.auth.identity_ca: {}", file_uri("other_ca.pem")).unwrap();
    writeln!(file, "dds.sec.access.permissions_ca: {}", file_uri("permissions_ca.pem")).unwrap();
    writeln!(file, "dds.sec.access.governance: {}", file_uri("governance.p7s")).unwrap();
    writeln!(file, "dds.sec.access.permissions: {}", file_uri("permissions.p7s")).unwrap();
    file.flush().unwrap();

    let props = PropertyList::from_yaml_file(file.path()).unwrap();
    let mut credentials = AccessCredentials::new();
    credentials.load(&props).unwrap();

    let shared = credentials.into_shared();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.governance_document().map(|d| d.content().len()))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().unwrap() > 0);
    }
    assert_eq!(Arc::strong_count(&shared), 1);
}
