// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for access-control credential loading.
//!
//! Every failure is terminal for the `load()` call that produced it. Nothing is
//! retried: credential material is static configuration.

use std::fmt;

use thiserror::Error;

use crate::properties::keys;

/// The three artifacts owned by [`AccessCredentials`](crate::AccessCredentials).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Permissions CA certificate (trust anchor).
    TrustAnchor,
    /// Signed governance document.
    Governance,
    /// Signed permissions document.
    Permissions,
}

impl Artifact {
    /// Short name used in `MissingProperty` errors.
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::TrustAnchor => "permissions_ca",
            Self::Governance => "governance",
            Self::Permissions => "permissions",
        }
    }

    /// Property key that references this artifact.
    pub const fn property_key(self) -> &'static str {
        match self {
            Self::TrustAnchor => keys::PERMISSIONS_CA,
            Self::Governance => keys::GOVERNANCE,
            Self::Permissions => keys::PERMISSIONS,
        }
    }

    /// Minor code reported in [`SecurityException`].
    pub const fn minor_code(self) -> i32 {
        match self {
            Self::TrustAnchor => 1,
            Self::Governance => 2,
            Self::Permissions => 3,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrustAnchor => write!(f, "permissions CA certificate"),
            Self::Governance => write!(f, "governance document"),
            Self::Permissions => write!(f, "permissions document"),
        }
    }
}

/// Why a single artifact could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Required property absent (or empty) in the property list.
    #[error("missing property '{0}'")]
    MissingProperty(&'static str),

    /// Referenced file does not exist.
    #[error("credential not found: {0}")]
    NotFound(String),

    /// Referenced resource exists but could not be read.
    #[error("failed to read {reference}: {reason}")]
    ReadFailure { reference: String, reason: String },

    /// Reference scheme cannot be materialized (no key store configured).
    #[error("unsupported credential reference: {0}")]
    UnsupportedReference(String),

    /// Bytes do not parse as an X.509 certificate.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Bytes are not a parseable signed document.
    #[error("malformed signed document: {0}")]
    MalformedDocument(String),

    /// Envelope parsed but its signature does not chain to the trust anchor.
    #[error("signature verification failed: {0}")]
    SignatureVerificationFailed(String),
}

impl LoadError {
    /// Stable error code reported in [`SecurityException`].
    pub const fn code(&self) -> i32 {
        match self {
            Self::MissingProperty(_) => 1,
            Self::NotFound(_) => 2,
            Self::ReadFailure { .. } => 3,
            Self::UnsupportedReference(_) => 4,
            Self::MalformedCertificate(_) => 5,
            Self::MalformedDocument(_) => 6,
            Self::SignatureVerificationFailed(_) => 7,
        }
    }
}

/// Outcome of a failed `load()`: which artifact failed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{artifact}: {error}")]
pub struct LoadFailure {
    pub artifact: Artifact,
    #[source]
    pub error: LoadError,
}

impl LoadFailure {
    pub fn new(artifact: Artifact, error: LoadError) -> Self {
        Self { artifact, error }
    }

    pub fn artifact(&self) -> Artifact {
        self.artifact
    }

    pub fn error(&self) -> &LoadError {
        &self.error
    }

    /// Structured exception record for the participant bootstrap.
    pub fn to_exception(&self) -> SecurityException {
        SecurityException::from(self)
    }
}

/// Structured security exception `{code, minor_code, message}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityException {
    pub code: i32,
    pub minor_code: i32,
    pub message: String,
}

impl SecurityException {
    /// True when no error was recorded.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl From<&LoadFailure> for SecurityException {
    fn from(failure: &LoadFailure) -> Self {
        Self {
            code: failure.error.code(),
            minor_code: failure.artifact.minor_code(),
            message: failure.to_string(),
        }
    }
}

impl fmt::Display for SecurityException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}.{}] {}", self.code, self.minor_code, self.message)
    }
}

/// Lifecycle state of an [`AccessCredentials`](crate::AccessCredentials) instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Accessor called while the credentials are not in the `Loaded` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("credentials unavailable: state is {state}")]
pub struct CredentialsUnavailable {
    pub state: LoadState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failure_display() {
        let failure = LoadFailure::new(
            Artifact::Governance,
            LoadError::MissingProperty("governance"),
        );
        assert_eq!(
            failure.to_string(),
            "governance document: missing property 'governance'"
        );
    }

    #[test]
    fn test_exception_codes_identify_artifact_and_kind() {
        let sig = LoadFailure::new(
            Artifact::Permissions,
            LoadError::SignatureVerificationFailed("rogue signer".to_string()),
        )
        .to_exception();
        let malformed = LoadFailure::new(
            Artifact::Permissions,
            LoadError::MalformedDocument("no boundary".to_string()),
        )
        .to_exception();

        assert_eq!(sig.minor_code, 3);
        assert_ne!(sig.code, malformed.code);
        assert!(!sig.is_ok());
        assert!(sig.message.contains("rogue signer"));
    }

    #[test]
    fn test_default_exception_is_ok() {
        assert!(SecurityException::default().is_ok());
    }

    #[test]
    fn test_artifact_keys() {
        assert_eq!(Artifact::TrustAnchor.short_name(), "permissions_ca");
        assert_eq!(
            Artifact::Permissions.property_key(),
            "dds.sec.access.permissions"
        );
    }
}
