// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signed governance / permissions documents.
//!
//! A [`SignedDocument`] only exists once its envelope has been verified
//! against a trust anchor: the constructor is private to the crate and is
//! only reached through the loader, after [`DocumentVerifier::verify`]
//! succeeded.
//!
//! The built-in verifier, [`SmimeDocumentVerifier`], handles the
//! `multipart/signed` S/MIME envelopes produced by
//! `openssl smime -sign -text` and used by every DDS Security deployment.

mod cms;
mod smime;

use std::fmt;

use thiserror::Error;

use crate::certificate::Certificate;

/// Result of a successful envelope verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedContent {
    /// Document payload with MIME entity headers removed.
    pub content: Vec<u8>,
    /// Subject DN of the certificate that produced the signature.
    pub signer_subject: String,
}

/// Why an envelope was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Not a parseable signed envelope.
    #[error("{0}")]
    Malformed(String),
    /// Parsed, but the signature or its chain to the trust anchor is invalid.
    #[error("{0}")]
    Untrusted(String),
}

/// Signed-envelope collaborator.
///
/// Implementations must never return `Ok` for content whose signature has
/// not been checked against `trust_anchor`.
pub trait DocumentVerifier: Send + Sync {
    fn verify(&self, envelope: &[u8], trust_anchor: &Certificate) -> Result<VerifiedContent, VerifyError>;
}

/// S/MIME (`multipart/signed` + CMS SignedData) verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmimeDocumentVerifier;

impl DocumentVerifier for SmimeDocumentVerifier {
    fn verify(&self, envelope: &[u8], trust_anchor: &Certificate) -> Result<VerifiedContent, VerifyError> {
        let parts = smime::split(envelope).map_err(VerifyError::Malformed)?;
        let signer_subject =
            cms::verify_detached(&parts.signature_der, &parts.signed_entity, trust_anchor)?;

        log::debug!(
            "[security] S/MIME signature by '{}' verified against '{}'",
            signer_subject,
            trust_anchor.subject_name()
        );

        Ok(VerifiedContent {
            content: parts.content.to_vec(),
            signer_subject,
        })
    }
}

/// Verified governance or permissions document.
#[derive(Clone)]
pub struct SignedDocument {
    content: Vec<u8>,
    envelope: Vec<u8>,
    signer_subject: String,
    trust_anchor_subject: String,
}

impl SignedDocument {
    pub(crate) fn new(envelope: Vec<u8>, verified: VerifiedContent, trust_anchor: &Certificate) -> Self {
        Self {
            content: verified.content,
            envelope,
            signer_subject: verified.signer_subject,
            trust_anchor_subject: trust_anchor.subject_name().to_string(),
        }
    }

    /// Signed payload (the XML document).
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Payload as text. The loader only admits UTF-8 content, so this
    /// returns `None` only for documents built by a custom verifier path.
    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Envelope bytes exactly as read.
    pub fn envelope(&self) -> &[u8] {
        &self.envelope
    }

    pub fn signer_subject(&self) -> &str {
        &self.signer_subject
    }

    /// Subject of the certificate the signature was verified against.
    pub fn trust_anchor_subject(&self) -> &str {
        &self.trust_anchor_subject
    }
}

impl PartialEq for SignedDocument {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content && self.envelope == other.envelope
    }
}

impl Eq for SignedDocument {}

impl fmt::Debug for SignedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedDocument")
            .field("content_len", &self.content.len())
            .field("envelope_len", &self.envelope.len())
            .field("signer_subject", &self.signer_subject)
            .field("trust_anchor_subject", &self.trust_anchor_subject)
            .finish()
    }
}
