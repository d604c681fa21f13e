// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Access-Control Credentials
//!
//! Local credential loading for the DDS Security v1.1 access-control plugin.
//! At participant startup the property list names three artifacts:
//!
//! - `dds.sec.access.permissions_ca` -- permissions CA certificate (trust anchor)
//! - `dds.sec.access.governance` -- S/MIME-signed governance document
//! - `dds.sec.access.permissions` -- S/MIME-signed permissions document
//!
//! [`AccessCredentials::load`] resolves each reference (`file:`, `data:`,
//! `pkcs11:` or a bare path), reads it, parses the CA and verifies both
//! documents against it. Only verified documents are ever exposed.
//!
//! # Features
//!
//! - **URI resolution**: pure, scheme-exact, unknown prefixes are bare paths
//! - **X.509**: PEM or DER trust anchor (`x509-parser`)
//! - **S/MIME**: `multipart/signed` + CMS SignedData, ECDSA P-256/P-384 and RSA (`ring`)
//! - **Typed views**: governance domain rules and permissions grants (`roxmltree`)
//! - **Collaborators**: pluggable certificate parser, document verifier and key store
//!
//! # Example
//!
//! ```no_run
//! use hdds_access_credentials::{AccessCredentials, GovernanceRules, PropertyList};
//!
//! let props = PropertyList::from_yaml_file("security.yaml")?;
//! let mut credentials = AccessCredentials::new();
//! credentials.load(&props)?;
//!
//! let rules = GovernanceRules::from_document(credentials.governance_document()?)?;
//! println!("{} domain rules", rules.domain_rules.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod certificate;
pub mod credentials;
mod crypto;
pub mod documents;
pub mod error;
pub mod loader;
pub mod properties;
pub mod signed_document;
pub mod source;
pub mod uri;

pub use certificate::{Certificate, CertificateParseError, CertificateParser, X509CertificateParser};
pub use credentials::{AccessCredentials, AccessCredentialsBuilder, SharedAccessCredentials};
pub use documents::{GovernanceRules, PermissionsGrants};
pub use error::{Artifact, CredentialsUnavailable, LoadError, LoadFailure, LoadState, SecurityException};
pub use loader::{CertificateLoader, SignedDocumentLoader};
pub use properties::{keys, Property, PropertyFileError, PropertyList, SecurityProperties};
pub use signed_document::{DocumentVerifier, SignedDocument, SmimeDocumentVerifier, VerifiedContent, VerifyError};
pub use source::KeyStore;
pub use uri::{resolve, CredentialReference};
