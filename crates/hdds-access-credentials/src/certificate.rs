// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! X.509 trust-anchor certificate.
//!
//! [`Certificate`] owns its DER encoding. Parsed views are rebuilt on demand
//! with `x509-parser`, which keeps the type `'static` without leaking the
//! input buffer. The commonly needed fields (subject, issuer, validity) are
//! extracted once at construction.
//!
//! # Accepted encodings
//!
//! - PEM: the first `CERTIFICATE` block is used
//! - DER: raw `Certificate` SEQUENCE, no trailing bytes

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;
use x509_parser::prelude::*;

use crate::crypto::{self, DigestAlgorithm};

const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Parse failure reported by a [`CertificateParser`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CertificateParseError(pub String);

/// Structurally valid X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    not_before: i64,
    not_after: i64,
    is_ca: bool,
}

impl Certificate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateParseError> {
        let (rest, cert) = X509Certificate::from_der(der).map_err(|e| {
            CertificateParseError(format!("X.509 parse failed: {}", e))
        })?;
        if !rest.is_empty() {
            return Err(CertificateParseError(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }

        let validity = cert.validity();
        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before: validity.not_before.timestamp(),
            not_after: validity.not_after.timestamp(),
            is_ca: cert.is_ca(),
            der: der.to_vec(),
        })
    }

    /// Parse the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, CertificateParseError> {
        let blocks = ::pem::parse_many(pem_data)
            .map_err(|e| CertificateParseError(format!("PEM decode failed: {}", e)))?;
        let block = blocks
            .iter()
            .find(|b| b.tag() == PEM_CERTIFICATE_TAG)
            .ok_or_else(|| CertificateParseError("No CERTIFICATE block in PEM".to_string()))?;
        Self::from_der(block.contents())
    }

    /// PEM when armored, DER otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CertificateParseError> {
        if bytes.is_empty() {
            return Err(CertificateParseError("Empty certificate data".to_string()));
        }
        if looks_like_pem(bytes) {
            Self::from_pem(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    /// Subject DN, e.g. `C=FR, O=HDDS Test, CN=HDDS Permissions CA`.
    pub fn subject_name(&self) -> &str {
        &self.subject
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer
    }

    /// Serial number as colon-separated hex.
    pub fn serial_hex(&self) -> &str {
        &self.serial
    }

    /// Start of validity (unix seconds).
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of validity (unix seconds).
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// `basicConstraints CA:TRUE`.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        ::pem::encode(&::pem::Pem::new(PEM_CERTIFICATE_TAG, self.der.clone()))
    }

    /// SHA-256 of the DER encoding, base64.
    pub fn fingerprint_sha256(&self) -> String {
        general_purpose::STANDARD.encode(DigestAlgorithm::Sha256.digest(&self.der))
    }

    /// Run `f` against a parsed view of this certificate.
    pub(crate) fn with_parsed<R>(
        &self,
        f: impl FnOnce(&X509Certificate<'_>) -> Result<R, String>,
    ) -> Result<R, String> {
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| format!("X.509 re-parse failed: {}", e))?;
        f(&cert)
    }

    /// Check that `child` was issued and signed by this certificate.
    ///
    /// Single-hop: the child's issuer DN must equal this subject DN and this
    /// certificate's key must verify the child's TBS signature.
    pub(crate) fn verify_issued(&self, child: &X509Certificate<'_>) -> Result<(), String> {
        self.with_parsed(|issuer| {
            if child.issuer().as_raw() != issuer.subject().as_raw() {
                return Err(format!(
                    "Certificate issuer '{}' is not '{}'",
                    child.issuer(),
                    issuer.subject()
                ));
            }

            let sig_oid = child.signature_algorithm.algorithm.to_id_string();
            let digest = DigestAlgorithm::for_signature(&sig_oid, None)
                .ok_or_else(|| format!("Unsupported signature algorithm: {}", sig_oid))?;

            crypto::verify_signature(
                issuer.public_key(),
                digest,
                child.tbs_certificate.as_ref(),
                child.signature_value.data.as_ref(),
            )
            .map_err(|e| format!("Certificate '{}' not signed by trust anchor: {}", child.subject(), e))
        })
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("der_len", &self.der.len())
            .finish()
    }
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    bytes.windows(10).any(|w| w == b"-----BEGIN")
}

/// Certificate collaborator: raw bytes in, parsed trust anchor out.
pub trait CertificateParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Certificate, CertificateParseError>;
}

/// Default parser (`x509-parser`, PEM or DER).
#[derive(Debug, Default, Clone, Copy)]
pub struct X509CertificateParser;

impl CertificateParser for X509CertificateParser {
    fn parse(&self, bytes: &[u8]) -> Result<Certificate, CertificateParseError> {
        Certificate::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA_PEM: &[u8] = include_bytes!("../tests/fixtures/permissions_ca.pem");
    const CA_DER: &[u8] = include_bytes!("../tests/fixtures/permissions_ca.der");
    const SIGNER_PEM: &[u8] = include_bytes!("../tests/fixtures/signer.pem");
    const OTHER_CA_PEM: &[u8] = include_bytes!("../tests/fixtures/other_ca.pem");

    #[test]
    fn test_parse_pem_and_der_agree() {
        let from_pem = Certificate::from_bytes(CA_PEM).unwrap();
        let from_der = Certificate::from_bytes(CA_DER).unwrap();

        assert_eq!(from_pem, from_der);
        assert_eq!(
            from_pem.subject_name(),
            "C=FR, O=HDDS Test, CN=HDDS Permissions CA"
        );
        assert!(from_pem.is_ca());
        assert!(from_pem.is_self_issued());
        assert!(from_pem.not_before() < from_pem.not_after());
    }

    #[test]
    fn test_pem_round_trip() {
        let cert = Certificate::from_bytes(CA_PEM).unwrap();
        let again = Certificate::from_pem(cert.to_pem().as_bytes()).unwrap();
        assert_eq!(cert, again);
        assert_eq!(cert.fingerprint_sha256(), again.fingerprint_sha256());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(Certificate::from_bytes(b"").is_err());
        assert!(Certificate::from_bytes(b"not a certificate").is_err());
        assert!(Certificate::from_bytes(include_bytes!("../tests/fixtures/corrupt_ca.pem")).is_err());
    }

    #[test]
    fn test_reject_trailing_der_bytes() {
        let mut der = CA_DER.to_vec();
        der.extend_from_slice(&[0x00, 0x00]);
        let err = Certificate::from_der(&der).unwrap_err();
        assert!(err.0.contains("trailing"));
    }

    #[test]
    fn test_verify_issued() {
        let ca = Certificate::from_bytes(CA_PEM).unwrap();
        let other = Certificate::from_bytes(OTHER_CA_PEM).unwrap();
        let signer = Certificate::from_bytes(SIGNER_PEM).unwrap();

        signer
            .with_parsed(|child| ca.verify_issued(child))
            .expect("signer issued by permissions CA");
        assert!(signer
            .with_parsed(|child| other.verify_issued(child))
            .is_err());
        // Self-signed root verifies against itself
        ca.with_parsed(|child| ca.verify_issued(child)).unwrap();
    }

    #[test]
    fn test_default_parser() {
        let cert = X509CertificateParser.parse(CA_PEM).unwrap();
        assert_eq!(cert.issuer_name(), cert.subject_name());
        assert!(!cert.serial_hex().is_empty());
    }
}
