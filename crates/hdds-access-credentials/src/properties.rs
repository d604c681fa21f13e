// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant property list (DDS `PropertyQosPolicy`).
//!
//! The participant bootstrap hands the security plugins an ordered list of
//! `(name, value, propagate)` triples. Only the `dds.sec.access.*` keys are
//! consumed by this crate; the `dds.sec.auth.*` keys belong to the
//! authentication plugin and are defined here so both sides agree on spelling.
//!
//! # Example
//!
//! ```
//! use hdds_access_credentials::properties::{keys, SecurityProperties};
//!
//! let props = SecurityProperties::builder()
//!     .permissions_ca("file:certs/permissions_ca.pem")
//!     .governance("file:governance.p7s")
//!     .permissions("file:permissions.p7s")
//!     .build();
//!
//! assert_eq!(props.get(keys::GOVERNANCE), Some("file:governance.p7s"));
//! ```

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known property names (OMG DDS Security v1.1 Sec.9.3.1 / Sec.9.4.1).
pub mod keys {
    /// Identity CA (authentication plugin).
    pub const IDENTITY_CA: &str = "dds.sec.auth.identity_ca";
    /// Participant identity certificate (authentication plugin).
    pub const IDENTITY_CERTIFICATE: &str = "dds.sec.auth.identity_certificate";
    /// Participant private key (authentication plugin).
    pub const PRIVATE_KEY: &str = "dds.sec.auth.private_key";
    /// Permissions CA: trust anchor for governance and permissions documents.
    pub const PERMISSIONS_CA: &str = "dds.sec.access.permissions_ca";
    /// Signed governance document.
    pub const GOVERNANCE: &str = "dds.sec.access.governance";
    /// Signed permissions document.
    pub const PERMISSIONS: &str = "dds.sec.access.permissions";
}

/// One `(name, value, propagate)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub propagate: bool,
}

impl Property {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            propagate: false,
        }
    }
}

/// Ordered, read-only property sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyList {
    properties: Vec<Property>,
}

/// Errors raised while reading a property file.
#[derive(Debug, Error)]
pub enum PropertyFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid property entry: {0}")]
    InvalidEntry(String),
}

/// Accepted YAML shapes: a sequence of `{name, value, propagate}` or a plain mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyDocument {
    List(Vec<Property>),
    Map(serde_yaml::Mapping),
}

impl PropertyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry (duplicates allowed, order kept).
    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Builder-style append.
    pub fn with<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.push(Property::new(name, value));
        self
    }

    /// Value of `name`.
    ///
    /// The list is scanned in order and the last occurrence wins. An empty or
    /// whitespace-only value counts as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Parse a YAML property document.
    ///
    /// ```yaml
    /// dds.sec.access.permissions_ca: file:permissions_ca.pem
    /// dds.sec.access.governance: file:governance.p7s
    /// ```
    ///
    /// or the explicit sequence form with `name`, `value` and optional `propagate`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PropertyFileError> {
        match serde_yaml::from_str::<PropertyDocument>(yaml)? {
            PropertyDocument::List(properties) => Ok(Self { properties }),
            PropertyDocument::Map(mapping) => {
                let mut list = Self::new();
                for (name, value) in mapping {
                    let name = name.as_str().ok_or_else(|| {
                        PropertyFileError::InvalidEntry(format!("non-string key {:?}", name))
                    })?;
                    let value = value.as_str().ok_or_else(|| {
                        PropertyFileError::InvalidEntry(format!("value of '{}' is not a string", name))
                    })?;
                    list.push(Property::new(name, value));
                }
                Ok(list)
            }
        }
    }

    /// Read and parse a YAML property file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, PropertyFileError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}

impl FromIterator<Property> for PropertyList {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PropertyList {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.iter()
    }
}

/// Fluent builder for the six DDS Security property keys.
///
/// Values are credential URIs (`file:`, `data:`, `pkcs11:` or a bare path).
/// Unset keys are simply left out of the resulting list.
#[derive(Debug, Default)]
pub struct SecurityProperties {
    identity_ca: Option<String>,
    identity_certificate: Option<String>,
    private_key: Option<String>,
    permissions_ca: Option<String>,
    governance: Option<String>,
    permissions: Option<String>,
}

impl SecurityProperties {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn identity_ca<S: Into<String>>(mut self, uri: S) -> Self {
        self.identity_ca = Some(uri.into());
        self
    }

    pub fn identity_certificate<S: Into<String>>(mut self, uri: S) -> Self {
        self.identity_certificate = Some(uri.into());
        self
    }

    pub fn private_key<S: Into<String>>(mut self, uri: S) -> Self {
        self.private_key = Some(uri.into());
        self
    }

    /// Permissions CA reference (trust anchor for both documents).
    pub fn permissions_ca<S: Into<String>>(mut self, uri: S) -> Self {
        self.permissions_ca = Some(uri.into());
        self
    }

    pub fn governance<S: Into<String>>(mut self, uri: S) -> Self {
        self.governance = Some(uri.into());
        self
    }

    pub fn permissions<S: Into<String>>(mut self, uri: S) -> Self {
        self.permissions = Some(uri.into());
        self
    }

    /// Emit the list in canonical key order (auth keys first).
    pub fn build(self) -> PropertyList {
        [
            (keys::IDENTITY_CA, self.identity_ca),
            (keys::IDENTITY_CERTIFICATE, self.identity_certificate),
            (keys::PRIVATE_KEY, self.private_key),
            (keys::PERMISSIONS_CA, self.permissions_ca),
            (keys::GOVERNANCE, self.governance),
            (keys::PERMISSIONS, self.permissions),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| Property::new(name, v)))
        .collect()
    }
}
