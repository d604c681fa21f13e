// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Digest and signature primitives backed by `ring`.
//!
//! # OID-to-Algorithm Mapping
//!
//! | OID                    | Meaning                 |
//! |------------------------|-------------------------|
//! | 2.16.840.1.101.3.4.2.1 | SHA-256                 |
//! | 2.16.840.1.101.3.4.2.2 | SHA-384                 |
//! | 2.16.840.1.101.3.4.2.3 | SHA-512                 |
//! | 1.2.840.113549.1.1.1   | rsaEncryption (hash from digest algorithm) |
//! | 1.2.840.113549.1.1.11  | RSA-PKCS1-SHA256        |
//! | 1.2.840.113549.1.1.12  | RSA-PKCS1-SHA384        |
//! | 1.2.840.113549.1.1.13  | RSA-PKCS1-SHA512        |
//! | 1.2.840.10045.2.1      | id-ecPublicKey (hash from digest algorithm) |
//! | 1.2.840.10045.4.3.2    | ECDSA-SHA256            |
//! | 1.2.840.10045.4.3.3    | ECDSA-SHA384            |
//!
//! SHA-1 and MD5 based signatures are rejected.

use ring::digest;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use x509_parser::x509::SubjectPublicKeyInfo;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";

/// Message digest used by a signature or a CMS SignerInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub(crate) fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "2.16.840.1.101.3.4.2.1" => Some(Self::Sha256),
            "2.16.840.1.101.3.4.2.2" => Some(Self::Sha384),
            "2.16.840.1.101.3.4.2.3" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Digest implied by a signature algorithm OID.
    ///
    /// Bare key-type OIDs (`rsaEncryption`, `id-ecPublicKey`) do not name a hash,
    /// CMS signers pair them with a separate digest algorithm: `fallback`.
    pub(crate) fn for_signature(sig_oid: &str, fallback: Option<Self>) -> Option<Self> {
        match sig_oid {
            "1.2.840.113549.1.1.11" | "1.2.840.10045.4.3.2" => Some(Self::Sha256),
            "1.2.840.113549.1.1.12" | "1.2.840.10045.4.3.3" => Some(Self::Sha384),
            "1.2.840.113549.1.1.13" | "1.2.840.10045.4.3.4" => Some(Self::Sha512),
            OID_RSA_ENCRYPTION | OID_EC_PUBLIC_KEY => fallback,
            _ => None,
        }
    }

    pub(crate) fn digest(self, data: &[u8]) -> Vec<u8> {
        let algorithm = match self {
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Sha512 => &digest::SHA512,
        };
        digest::digest(algorithm, data).as_ref().to_vec()
    }
}

/// Verify `signature` over `message` with the key in `spki`.
///
/// The ring algorithm is picked from the key type (and curve for EC keys) plus
/// `digest`. ring expects the BIT STRING content of the SPKI: the uncompressed
/// point for EC keys, the `RSAPublicKey` DER for RSA keys.
pub(crate) fn verify_signature(
    spki: &SubjectPublicKeyInfo,
    digest: DigestAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    let key_type = spki.algorithm.algorithm.to_id_string();

    let algorithm: &'static dyn VerificationAlgorithm = match key_type.as_str() {
        OID_RSA_ENCRYPTION => match digest {
            DigestAlgorithm::Sha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            DigestAlgorithm::Sha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            DigestAlgorithm::Sha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        },
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.clone().oid().ok())
                .map(|oid| oid.to_id_string())
                .unwrap_or_default();
            match (curve.as_str(), digest) {
                (OID_CURVE_P256, DigestAlgorithm::Sha256) => &signature::ECDSA_P256_SHA256_ASN1,
                (OID_CURVE_P256, DigestAlgorithm::Sha384) => &signature::ECDSA_P256_SHA384_ASN1,
                (OID_CURVE_P384, DigestAlgorithm::Sha256) => &signature::ECDSA_P384_SHA256_ASN1,
                (OID_CURVE_P384, DigestAlgorithm::Sha384) => &signature::ECDSA_P384_SHA384_ASN1,
                _ => {
                    return Err(format!(
                        "Unsupported EC curve/digest combination: {} with {:?}",
                        curve, digest
                    ));
                }
            }
        }
        other => return Err(format!("Unsupported public key algorithm: {}", other)),
    };

    let public_key = UnparsedPublicKey::new(algorithm, spki.subject_public_key.data.as_ref());
    public_key
        .verify(message, signature)
        .map_err(|_| "Signature does not match public key".to_string())
}
