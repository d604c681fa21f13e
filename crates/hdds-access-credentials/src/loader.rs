// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Certificate and signed-document loaders.
//!
//! Both loaders materialize a [`CredentialReference`] through
//! [`read_reference`] and hand the bytes to their collaborator. Neither
//! caches: every call reads the resource again.

use std::sync::Arc;

use crate::certificate::{Certificate, CertificateParser, X509CertificateParser};
use crate::error::LoadError;
use crate::signed_document::{DocumentVerifier, SignedDocument, SmimeDocumentVerifier, VerifyError};
use crate::source::{read_reference, KeyStore};
use crate::uri::CredentialReference;

/// Loads the permissions CA (trust anchor).
#[derive(Clone)]
pub struct CertificateLoader {
    parser: Arc<dyn CertificateParser>,
    key_store: Option<Arc<dyn KeyStore>>,
}

impl CertificateLoader {
    pub fn new(parser: Arc<dyn CertificateParser>, key_store: Option<Arc<dyn KeyStore>>) -> Self {
        Self { parser, key_store }
    }

    /// Read and parse the trust anchor designated by `reference`.
    pub fn load_trust_anchor(&self, reference: &CredentialReference) -> Result<Certificate, LoadError> {
        log::debug!("[security] Loading trust anchor from {}", reference);

        let bytes = read_reference(reference, self.key_store.as_deref())?;
        let certificate = self
            .parser
            .parse(&bytes)
            .map_err(|e| LoadError::MalformedCertificate(e.to_string()))?;

        log::debug!(
            "[security] Trust anchor '{}' (serial {})",
            certificate.subject_name(),
            certificate.serial_hex()
        );
        Ok(certificate)
    }
}

impl Default for CertificateLoader {
    fn default() -> Self {
        Self::new(Arc::new(X509CertificateParser), None)
    }
}

/// Loads a signed governance or permissions document and verifies it.
#[derive(Clone)]
pub struct SignedDocumentLoader {
    verifier: Arc<dyn DocumentVerifier>,
    key_store: Option<Arc<dyn KeyStore>>,
}

impl SignedDocumentLoader {
    pub fn new(verifier: Arc<dyn DocumentVerifier>, key_store: Option<Arc<dyn KeyStore>>) -> Self {
        Self { verifier, key_store }
    }

    /// Read the envelope designated by `reference` and verify it against
    /// `trust_anchor`. Only verified, well-formed XML content is returned.
    pub fn load_and_verify(
        &self,
        reference: &CredentialReference,
        trust_anchor: &Certificate,
    ) -> Result<SignedDocument, LoadError> {
        log::debug!(
            "[security] Loading signed document from {} (anchor '{}')",
            reference,
            trust_anchor.subject_name()
        );

        let envelope = read_reference(reference, self.key_store.as_deref())?;
        let verified = self
            .verifier
            .verify(&envelope, trust_anchor)
            .map_err(|e| match e {
                VerifyError::Malformed(msg) => LoadError::MalformedDocument(msg),
                VerifyError::Untrusted(msg) => LoadError::SignatureVerificationFailed(msg),
            })?;

        check_well_formed(&verified.content)?;

        Ok(SignedDocument::new(envelope.into_owned(), verified, trust_anchor))
    }
}

impl Default for SignedDocumentLoader {
    fn default() -> Self {
        Self::new(Arc::new(SmimeDocumentVerifier), None)
    }
}

/// Verified payload must be a UTF-8 XML document.
fn check_well_formed(content: &[u8]) -> Result<(), LoadError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| LoadError::MalformedDocument(format!("Content is not UTF-8: {}", e)))?;
    roxmltree::Document::parse(text)
        .map_err(|e| LoadError::MalformedDocument(format!("Content is not well-formed XML: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signed_document::VerifiedContent;
    use crate::uri::resolve;
    use std::path::PathBuf;

    fn fixture(name: &str) -> CredentialReference {
        CredentialReference::File(
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("tests/fixtures")
                .join(name),
        )
    }

    fn anchor() -> Certificate {
        CertificateLoader::default()
            .load_trust_anchor(&fixture("permissions_ca.pem"))
            .unwrap()
    }

    /// Accepts any envelope and returns it verbatim as content.
    struct PassThroughVerifier;

    impl DocumentVerifier for PassThroughVerifier {
        fn verify(&self, envelope: &[u8], _: &Certificate) -> Result<VerifiedContent, VerifyError> {
            Ok(VerifiedContent {
                content: envelope.to_vec(),
                signer_subject: "CN=test".to_string(),
            })
        }
    }

    #[test]
    fn test_load_trust_anchor_file() {
        let cert = anchor();
        assert_eq!(cert.subject_name(), "C=FR, O=HDDS Test, CN=HDDS Permissions CA");

        let der = CertificateLoader::default()
            .load_trust_anchor(&fixture("permissions_ca.der"))
            .unwrap();
        assert_eq!(cert, der);
    }

    #[test]
    fn test_load_trust_anchor_inline_data() {
        let pem = include_str!("../tests/fixtures/permissions_ca.pem");
        let reference = resolve(&format!("data:,{}", pem));
        let cert = CertificateLoader::default().load_trust_anchor(&reference).unwrap();
        assert_eq!(cert, anchor());
    }

    #[test]
    fn test_trust_anchor_errors() {
        let loader = CertificateLoader::default();
        assert!(matches!(
            loader.load_trust_anchor(&fixture("missing_ca.pem")),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            loader.load_trust_anchor(&fixture("corrupt_ca.pem")),
            Err(LoadError::MalformedCertificate(_))
        ));
        // A signed document is not a certificate
        assert!(matches!(
            loader.load_trust_anchor(&fixture("governance.p7s")),
            Err(LoadError::MalformedCertificate(_))
        ));
        assert!(matches!(
            loader.load_trust_anchor(&resolve("pkcs11:object=ca")),
            Err(LoadError::UnsupportedReference(_))
        ));
    }

    #[test]
    fn test_load_and_verify_error_kinds() {
        let loader = SignedDocumentLoader::default();
        let ca = anchor();

        let doc = loader.load_and_verify(&fixture("governance.p7s"), &ca).unwrap();
        assert!(doc.content_str().unwrap().contains("<domain_access_rules>"));

        assert!(matches!(
            loader.load_and_verify(&fixture("governance.xml"), &ca),
            Err(LoadError::MalformedDocument(_))
        ));
        assert!(matches!(
            loader.load_and_verify(&fixture("governance_rogue.p7s"), &ca),
            Err(LoadError::SignatureVerificationFailed(_))
        ));
        assert!(matches!(
            loader.load_and_verify(&fixture("missing.p7s"), &ca),
            Err(LoadError::NotFound(_))
        ));

        let empty_parts = resolve("data:Content-Type: multipart/signed; boundary=XYZ\n\n--XYZ\n--XYZ\n--XYZ--\n");
        assert!(matches!(
            loader.load_and_verify(&empty_parts, &ca),
            Err(LoadError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_verified_content_must_be_xml() {
        let loader = SignedDocumentLoader::new(Arc::new(PassThroughVerifier), None);
        let ca = anchor();

        let ok = loader.load_and_verify(&resolve("data:,<dds/>"), &ca).unwrap();
        assert_eq!(ok.content(), b"<dds/>");
        assert_eq!(ok.signer_subject(), "CN=test");

        assert!(matches!(
            loader.load_and_verify(&resolve("data:,<dds>"), &ca),
            Err(LoadError::MalformedDocument(_))
        ));
    }
}
