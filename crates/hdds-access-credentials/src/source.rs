// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Materialize a [`CredentialReference`] into raw bytes.
//!
//! Files are read whole, read-only. A path that does not exist is reported as
//! [`LoadError::NotFound`]; a path that exists but cannot be read is a
//! [`LoadError::ReadFailure`], so callers can tell a typo from a permissions
//! problem.

use std::borrow::Cow;
use std::io;

use crate::error::LoadError;
use crate::uri::CredentialReference;

/// Out-of-process key store (PKCS#11 token, HSM, secrets daemon).
///
/// Receives the opaque payload of a `pkcs11:` URI and returns the credential
/// bytes it designates.
pub trait KeyStore: Send + Sync {
    fn fetch(&self, token: &str) -> Result<Vec<u8>, String>;
}

/// Obtain the bytes designated by `reference`.
///
/// Inline data is borrowed, file and key-store content is owned.
pub fn read_reference<'a>(
    reference: &'a CredentialReference,
    key_store: Option<&dyn KeyStore>,
) -> Result<Cow<'a, [u8]>, LoadError> {
    match reference {
        CredentialReference::File(path) => match std::fs::read(path) {
            Ok(bytes) => {
                log::debug!(
                    "[security] Read {} bytes from {}",
                    bytes.len(),
                    path.display()
                );
                Ok(Cow::Owned(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LoadError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(LoadError::ReadFailure {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        },
        CredentialReference::Data(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        CredentialReference::KeyStore(token) => {
            let store = key_store
                .ok_or_else(|| LoadError::UnsupportedReference(reference.to_string()))?;
            store
                .fetch(token)
                .map(Cow::Owned)
                .map_err(|reason| LoadError::ReadFailure {
                    reference: reference.to_string(),
                    reason,
                })
        }
    }
}
