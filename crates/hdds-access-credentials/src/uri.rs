// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Credential URI resolution.
//!
//! Property values name credential material with a `<scheme>:<payload>` URI
//! (DDS Security v1.1 Sec.9.3.1.1):
//!
//! | value                         | resolved reference                |
//! |-------------------------------|-----------------------------------|
//! | `file:certs/ca.pem`           | `File("certs/ca.pem")`            |
//! | `file:///etc/dds/ca.pem`      | `File("/etc/dds/ca.pem")`         |
//! | `data:,-----BEGIN CERT...`    | `Data(b"-----BEGIN CERT...")`     |
//! | `pkcs11:object=ca;type=cert`  | `KeyStore("object=ca;type=cert")` |
//! | `certs/ca.pem`, `C:\ca.pem`   | `File(..)` verbatim               |
//!
//! Resolution is pure: no file is touched here. Schemes are matched
//! case-sensitively and only the three above are recognized; anything else,
//! including Windows drive letters (`C:`) and `FILE:`, is a bare path.

use std::fmt;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file:";
const DATA_SCHEME: &str = "data:";
const PKCS11_SCHEME: &str = "pkcs11:";

/// Scheme-disambiguated pointer to credential bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialReference {
    /// Local file, path taken verbatim (no normalization, no symlink resolution).
    File(PathBuf),
    /// Inline credential bytes.
    Data(Vec<u8>),
    /// Opaque token for an out-of-process key store.
    KeyStore(String),
}

impl CredentialReference {
    /// URI scheme name (`file`, `data` or `pkcs11`).
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Data(_) => "data",
            Self::KeyStore(_) => "pkcs11",
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }
}

/// Inline payloads are never printed, only their size.
impl fmt::Display for CredentialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Data(bytes) => write!(f, "data:<{} bytes>", bytes.len()),
            Self::KeyStore(token) => write!(f, "pkcs11:{}", token),
        }
    }
}

/// Resolve a raw property value. Never fails.
pub fn resolve(raw_value: &str) -> CredentialReference {
    if let Some(rest) = raw_value.strip_prefix(FILE_SCHEME) {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        return CredentialReference::File(PathBuf::from(path));
    }

    if let Some(rest) = raw_value.strip_prefix(DATA_SCHEME) {
        // RFC 2397 with an empty media type: `data:,<payload>`
        let payload = rest.strip_prefix(',').unwrap_or(rest);
        return CredentialReference::Data(payload.as_bytes().to_vec());
    }

    if let Some(rest) = raw_value.strip_prefix(PKCS11_SCHEME) {
        return CredentialReference::KeyStore(rest.to_string());
    }

    CredentialReference::File(PathBuf::from(raw_value))
}
