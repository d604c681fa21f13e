// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Access-control credential set.
//!
//! [`AccessCredentials`] turns the participant property list into the three
//! artifacts the access-control plugin needs: the permissions CA, the
//! governance document and the permissions document.
//!
//! # Load sequence
//!
//! ```text
//! Unloaded --load()--> permissions_ca --> governance --> permissions --> Loaded
//!                           |                 |               |
//!                           +-----------------+---------------+--------> Failed
//! ```
//!
//! Each step needs the previous one (documents are verified against the CA).
//! The first failure stops the sequence and nothing loaded so far is kept.
//! `Loaded` and `Failed` are terminal: calling `load()` again returns the
//! recorded outcome without reading anything.
//!
//! # Example
//!
//! ```no_run
//! use hdds_access_credentials::{AccessCredentials, SecurityProperties};
//!
//! let props = SecurityProperties::builder()
//!     .permissions_ca("file:/etc/dds/permissions_ca.pem")
//!     .governance("file:/etc/dds/governance.p7s")
//!     .permissions("file:/etc/dds/permissions.p7s")
//!     .build();
//!
//! let mut credentials = AccessCredentials::new();
//! if let Err(failure) = credentials.load(&props) {
//!     eprintln!("{}", failure.to_exception());
//!     return;
//! }
//!
//! let shared = credentials.into_shared();
//! let governance = shared.governance_document().expect("loaded");
//! println!("{} bytes of governance rules", governance.content().len());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::certificate::{Certificate, CertificateParser, X509CertificateParser};
use crate::error::{Artifact, CredentialsUnavailable, LoadError, LoadFailure, LoadState, SecurityException};
use crate::loader::{CertificateLoader, SignedDocumentLoader};
use crate::properties::PropertyList;
use crate::signed_document::{DocumentVerifier, SignedDocument, SmimeDocumentVerifier};
use crate::source::KeyStore;
use crate::uri::{self, CredentialReference};

/// Reference-counted handle; the last holder releases the artifacts.
pub type SharedAccessCredentials = Arc<AccessCredentials>;

struct Artifacts {
    trust_anchor: Certificate,
    governance: SignedDocument,
    permissions: SignedDocument,
}

enum State {
    Unloaded,
    Loaded(Artifacts),
    Failed(LoadFailure),
}

/// Permissions CA plus verified governance and permissions documents.
pub struct AccessCredentials {
    certificate_loader: CertificateLoader,
    document_loader: SignedDocumentLoader,
    state: State,
}

impl AccessCredentials {
    /// Unloaded credentials using the built-in X.509 parser and S/MIME verifier.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> AccessCredentialsBuilder {
        AccessCredentialsBuilder::default()
    }

    /// Load the three artifacts referenced by `properties`.
    ///
    /// Order is fixed: permissions CA, governance, permissions. On failure the
    /// returned [`LoadFailure`] names the artifact and the cause, and the
    /// instance moves to [`LoadState::Failed`] with no artifact retained.
    pub fn load(&mut self, properties: &PropertyList) -> Result<(), LoadFailure> {
        match &self.state {
            State::Loaded(_) => {
                log::debug!("[security] Access credentials already loaded");
                return Ok(());
            }
            State::Failed(failure) => {
                log::debug!("[security] Access credentials already failed: {}", failure);
                return Err(failure.clone());
            }
            State::Unloaded => {}
        }

        match self.load_artifacts(properties) {
            Ok(artifacts) => {
                log::info!(
                    "[security] Access credentials loaded: CA '{}', governance signed by '{}', permissions signed by '{}'",
                    artifacts.trust_anchor.subject_name(),
                    artifacts.governance.signer_subject(),
                    artifacts.permissions.signer_subject()
                );
                self.state = State::Loaded(artifacts);
                Ok(())
            }
            Err(failure) => {
                log::warn!("[security] Access credentials load failed: {}", failure);
                self.state = State::Failed(failure.clone());
                Err(failure)
            }
        }
    }

    fn load_artifacts(&self, properties: &PropertyList) -> Result<Artifacts, LoadFailure> {
        let reference = required_reference(properties, Artifact::TrustAnchor)?;
        let trust_anchor = self
            .certificate_loader
            .load_trust_anchor(&reference)
            .map_err(|e| LoadFailure::new(Artifact::TrustAnchor, e))?;

        let governance = self.load_document(properties, Artifact::Governance, &trust_anchor)?;
        let permissions = self.load_document(properties, Artifact::Permissions, &trust_anchor)?;

        Ok(Artifacts {
            trust_anchor,
            governance,
            permissions,
        })
    }

    fn load_document(
        &self,
        properties: &PropertyList,
        artifact: Artifact,
        trust_anchor: &Certificate,
    ) -> Result<SignedDocument, LoadFailure> {
        let reference = required_reference(properties, artifact)?;
        self.document_loader
            .load_and_verify(&reference, trust_anchor)
            .map_err(|e| LoadFailure::new(artifact, e))
    }

    pub fn state(&self) -> LoadState {
        match self.state {
            State::Unloaded => LoadState::Unloaded,
            State::Loaded(_) => LoadState::Loaded,
            State::Failed(_) => LoadState::Failed,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    /// Failure recorded by the last `load()`, if any.
    pub fn failure(&self) -> Option<&LoadFailure> {
        match &self.state {
            State::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Exception record of the recorded failure (code 0 when none).
    pub fn exception(&self) -> SecurityException {
        self.failure()
            .map(SecurityException::from)
            .unwrap_or_default()
    }

    fn artifacts(&self) -> Result<&Artifacts, CredentialsUnavailable> {
        match &self.state {
            State::Loaded(artifacts) => Ok(artifacts),
            _ => Err(CredentialsUnavailable {
                state: self.state(),
            }),
        }
    }

    /// Permissions CA certificate. Only available once loaded.
    pub fn trust_anchor(&self) -> Result<&Certificate, CredentialsUnavailable> {
        self.artifacts().map(|a| &a.trust_anchor)
    }

    /// Verified governance document. Only available once loaded.
    pub fn governance_document(&self) -> Result<&SignedDocument, CredentialsUnavailable> {
        self.artifacts().map(|a| &a.governance)
    }

    /// Verified permissions document. Only available once loaded.
    pub fn permissions_document(&self) -> Result<&SignedDocument, CredentialsUnavailable> {
        self.artifacts().map(|a| &a.permissions)
    }

    /// Move into a reference-counted handle for sharing across subsystems.
    pub fn into_shared(self) -> SharedAccessCredentials {
        Arc::new(self)
    }
}

impl Default for AccessCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("AccessCredentials");
        s.field("state", &self.state());
        match &self.state {
            State::Loaded(artifacts) => {
                s.field("trust_anchor", &artifacts.trust_anchor.subject_name());
            }
            State::Failed(failure) => {
                s.field("failure", failure);
            }
            State::Unloaded => {}
        }
        s.finish()
    }
}

fn required_reference(properties: &PropertyList, artifact: Artifact) -> Result<CredentialReference, LoadFailure> {
    let value = properties
        .get(artifact.property_key())
        .ok_or_else(|| LoadFailure::new(artifact, LoadError::MissingProperty(artifact.short_name())))?;
    let reference = uri::resolve(value);
    log::debug!(
        "[security] {} -> {} reference {}",
        artifact.property_key(),
        reference.scheme(),
        reference
    );
    Ok(reference)
}

/// Collaborator injection for [`AccessCredentials`].
///
/// ```
/// use hdds_access_credentials::{AccessCredentials, SmimeDocumentVerifier, X509CertificateParser};
///
/// let credentials = AccessCredentials::builder()
///     .certificate_parser(X509CertificateParser)
///     .document_verifier(SmimeDocumentVerifier)
///     .build();
/// assert!(!credentials.is_loaded());
/// ```
#[derive(Default)]
pub struct AccessCredentialsBuilder {
    parser: Option<Arc<dyn CertificateParser>>,
    verifier: Option<Arc<dyn DocumentVerifier>>,
    key_store: Option<Arc<dyn KeyStore>>,
}

impl AccessCredentialsBuilder {
    pub fn certificate_parser<P: CertificateParser + 'static>(mut self, parser: P) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn document_verifier<V: DocumentVerifier + 'static>(mut self, verifier: V) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Key store used for `pkcs11:` references. Without one they fail with
    /// [`LoadError::UnsupportedReference`].
    pub fn key_store<K: KeyStore + 'static>(mut self, key_store: K) -> Self {
        self.key_store = Some(Arc::new(key_store));
        self
    }

    pub fn build(self) -> AccessCredentials {
        let parser = self
            .parser
            .unwrap_or_else(|| Arc::new(X509CertificateParser));
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(SmimeDocumentVerifier));

        AccessCredentials {
            certificate_loader: CertificateLoader::new(parser, self.key_store.clone()),
            document_loader: SignedDocumentLoader::new(verifier, self.key_store),
            state: State::Unloaded,
        }
    }
}
