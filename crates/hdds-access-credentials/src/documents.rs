// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed views of verified governance and permissions documents.
//!
//! Parsing only: the structures mirror the OMG DDS Security v1.1 XML schemas
//! (Sec.9.4.1.2 governance, Sec.9.4.1.3 permissions) and are handed to the
//! access-control rules engine as-is. Nothing here decides whether an
//! operation is allowed.
//!
//! Both views are built from a [`SignedDocument`], so they can only describe
//! content whose signature was verified.

use roxmltree::Node;

use crate::error::LoadError;
use crate::signed_document::SignedDocument;

/// Inclusive range of domain ids. A single `<id>` is a range of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainRange {
    pub min: u32,
    pub max: u32,
}

/// Domain ids covered by a rule (`<domains>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    pub ranges: Vec<DomainRange>,
}

impl DomainSet {
    pub fn contains(&self, domain_id: u32) -> bool {
        self.ranges
            .iter()
            .any(|r| r.min <= domain_id && domain_id <= r.max)
    }
}

/// `ProtectionKind` / `BasicProtectionKind` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtectionKind {
    #[default]
    None,
    Sign,
    Encrypt,
    SignWithOriginAuthentication,
    EncryptWithOriginAuthentication,
}

impl ProtectionKind {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "NONE" => Some(Self::None),
            "SIGN" => Some(Self::Sign),
            "ENCRYPT" => Some(Self::Encrypt),
            "SIGN_WITH_ORIGIN_AUTHENTICATION" => Some(Self::SignWithOriginAuthentication),
            "ENCRYPT_WITH_ORIGIN_AUTHENTICATION" => Some(Self::EncryptWithOriginAuthentication),
            _ => None,
        }
    }
}

/// Governance document (`<domain_access_rules>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceRules {
    pub domain_rules: Vec<DomainRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    pub domains: DomainSet,
    pub allow_unauthenticated_participants: bool,
    pub enable_join_access_control: bool,
    pub discovery_protection_kind: ProtectionKind,
    pub liveliness_protection_kind: ProtectionKind,
    pub rtps_protection_kind: ProtectionKind,
    pub topic_rules: Vec<TopicRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRule {
    /// fnmatch-style topic name expression.
    pub topic_expression: String,
    pub enable_discovery_protection: bool,
    pub enable_liveliness_protection: bool,
    pub enable_read_access_control: bool,
    pub enable_write_access_control: bool,
    pub metadata_protection_kind: ProtectionKind,
    pub data_protection_kind: ProtectionKind,
}

impl GovernanceRules {
    pub fn from_document(document: &SignedDocument) -> Result<Self, LoadError> {
        Self::parse(document_text(document)?)
    }

    /// Parse governance XML text.
    pub fn parse(xml: &str) -> Result<Self, LoadError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            LoadError::MalformedDocument(format!("Failed to parse governance XML: {}", e))
        })?;

        let rules_node = section(&doc, "domain_access_rules")?;
        let domain_rules = children(rules_node, "domain_rule")
            .map(|node| parse_domain_rule(&node))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { domain_rules })
    }

    /// First domain rule covering `domain_id` (rules are ordered).
    pub fn rule_for_domain(&self, domain_id: u32) -> Option<&DomainRule> {
        self.domain_rules
            .iter()
            .find(|rule| rule.domains.contains(domain_id))
    }
}

fn parse_domain_rule(node: &Node) -> Result<DomainRule, LoadError> {
    let topic_rules = match child(node, "topic_access_rules") {
        Some(rules) => children(rules, "topic_rule")
            .map(|n| parse_topic_rule(&n))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(DomainRule {
        domains: parse_domains(node)?,
        allow_unauthenticated_participants: bool_field(node, "allow_unauthenticated_participants")?,
        enable_join_access_control: bool_field(node, "enable_join_access_control")?,
        discovery_protection_kind: protection_field(node, "discovery_protection_kind")?,
        liveliness_protection_kind: protection_field(node, "liveliness_protection_kind")?,
        rtps_protection_kind: protection_field(node, "rtps_protection_kind")?,
        topic_rules,
    })
}

fn parse_topic_rule(node: &Node) -> Result<TopicRule, LoadError> {
    let topic_expression = child(node, "topic_expression")
        .map(|n| element_text(&n))
        .ok_or_else(|| LoadError::MalformedDocument("topic_rule without topic_expression".to_string()))?;

    Ok(TopicRule {
        topic_expression,
        enable_discovery_protection: bool_field(node, "enable_discovery_protection")?,
        enable_liveliness_protection: bool_field(node, "enable_liveliness_protection")?,
        enable_read_access_control: bool_field(node, "enable_read_access_control")?,
        enable_write_access_control: bool_field(node, "enable_write_access_control")?,
        metadata_protection_kind: protection_field(node, "metadata_protection_kind")?,
        data_protection_kind: protection_field(node, "data_protection_kind")?,
    })
}

/// Permissions document (`<permissions>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsGrants {
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub name: String,
    /// Subject DN of the identity certificate this grant applies to.
    pub subject_name: String,
    pub validity: Validity,
    pub allow_rules: Vec<Rule>,
    pub deny_rules: Vec<Rule>,
    pub default_action: DefaultAction,
}

/// Grant validity, as written (`YYYY-MM-DDThh:mm:ss`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validity {
    pub not_before: String,
    pub not_after: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub domains: DomainSet,
    pub publish: Vec<Criteria>,
    pub subscribe: Vec<Criteria>,
    pub relay: Vec<Criteria>,
}

/// `<publish>` / `<subscribe>` / `<relay>` criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    pub topics: Vec<String>,
    pub partitions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Allow,
    Deny,
}

impl PermissionsGrants {
    pub fn from_document(document: &SignedDocument) -> Result<Self, LoadError> {
        Self::parse(document_text(document)?)
    }

    /// Parse permissions XML text.
    pub fn parse(xml: &str) -> Result<Self, LoadError> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            LoadError::MalformedDocument(format!("Failed to parse permissions XML: {}", e))
        })?;

        let permissions = section(&doc, "permissions")?;
        let grants = children(permissions, "grant")
            .map(|node| parse_grant(&node))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { grants })
    }

    /// Grant whose subject is `subject_name`.
    pub fn grant_for_subject(&self, subject_name: &str) -> Option<&Grant> {
        self.grants.iter().find(|g| g.subject_name == subject_name)
    }
}

fn parse_grant(node: &Node) -> Result<Grant, LoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let subject_name = child(node, "subject_name")
        .map(|n| element_text(&n))
        .ok_or_else(|| {
            LoadError::MalformedDocument(format!("grant '{}' without subject_name", name))
        })?;

    let mut validity = Validity::default();
    if let Some(v) = child(node, "validity") {
        validity.not_before = child(&v, "not_before").map(|n| element_text(&n)).unwrap_or_default();
        validity.not_after = child(&v, "not_after").map(|n| element_text(&n)).unwrap_or_default();
    }

    let allow_rules = children(*node, "allow_rule")
        .map(|n| parse_rule(&n))
        .collect::<Result<Vec<_>, _>>()?;
    let deny_rules = children(*node, "deny_rule")
        .map(|n| parse_rule(&n))
        .collect::<Result<Vec<_>, _>>()?;

    let default_action = match child(node, "default").map(|n| element_text(&n)).as_deref() {
        Some("ALLOW") => DefaultAction::Allow,
        Some("DENY") | None => DefaultAction::Deny,
        Some(other) => {
            return Err(LoadError::MalformedDocument(format!(
                "grant '{}': invalid default '{}'",
                name, other
            )));
        }
    };

    Ok(Grant {
        name,
        subject_name,
        validity,
        allow_rules,
        deny_rules,
        default_action,
    })
}

fn parse_rule(node: &Node) -> Result<Rule, LoadError> {
    let criteria = |tag: &str| -> Vec<Criteria> {
        children(*node, tag)
            .map(|n| Criteria {
                topics: list_field(&n, "topics", "topic"),
                partitions: list_field(&n, "partitions", "partition"),
            })
            .collect()
    };

    Ok(Rule {
        domains: parse_domains(node)?,
        publish: criteria("publish"),
        subscribe: criteria("subscribe"),
        relay: criteria("relay"),
    })
}

fn parse_domains(node: &Node) -> Result<DomainSet, LoadError> {
    let Some(domains) = child(node, "domains") else {
        return Ok(DomainSet::default());
    };

    let mut ranges = Vec::new();
    for entry in domains.children().filter(Node::is_element) {
        match entry.tag_name().name() {
            "id" => {
                let id = parse_domain_id(&element_text(&entry))?;
                ranges.push(DomainRange { min: id, max: id });
            }
            "id_range" => {
                let min = child(&entry, "min")
                    .map(|n| parse_domain_id(&element_text(&n)))
                    .transpose()?
                    .unwrap_or(0);
                let max = child(&entry, "max")
                    .map(|n| parse_domain_id(&element_text(&n)))
                    .transpose()?
                    .unwrap_or(u32::MAX);
                if min > max {
                    return Err(LoadError::MalformedDocument(format!(
                        "domain id_range {}..{} is empty",
                        min, max
                    )));
                }
                ranges.push(DomainRange { min, max });
            }
            _ => {}
        }
    }
    Ok(DomainSet { ranges })
}

fn parse_domain_id(text: &str) -> Result<u32, LoadError> {
    text.parse::<u32>()
        .map_err(|_| LoadError::MalformedDocument(format!("invalid domain id '{}'", text)))
}

fn document_text(document: &SignedDocument) -> Result<&str, LoadError> {
    document
        .content_str()
        .ok_or_else(|| LoadError::MalformedDocument("Document content is not UTF-8".to_string()))
}

/// Root `<dds>` element's `name` section.
fn section<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    name: &str,
) -> Result<Node<'a, 'input>, LoadError> {
    let root = doc.root_element();
    if root.tag_name().name() != "dds" {
        return Err(LoadError::MalformedDocument(format!(
            "Root element is <{}>, expected <dds>",
            root.tag_name().name()
        )));
    }
    child(&root, name)
        .ok_or_else(|| LoadError::MalformedDocument(format!("<dds> has no <{}> section", name)))
}

fn child<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn element_text(node: &Node) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

/// `<topics><topic>A</topic><topic>B</topic></topics>`
fn list_field(node: &Node, list: &str, item: &str) -> Vec<String> {
    child(node, list)
        .map(|l| {
            l.children()
                .filter(|n| n.is_element() && n.tag_name().name() == item)
                .map(|n| element_text(&n))
                .collect()
        })
        .unwrap_or_default()
}

fn bool_field(node: &Node, name: &str) -> Result<bool, LoadError> {
    match child(node, name).map(|n| element_text(&n)).as_deref() {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(LoadError::MalformedDocument(format!(
            "<{}> is not a boolean: '{}'",
            name, other
        ))),
    }
}

fn protection_field(node: &Node, name: &str) -> Result<ProtectionKind, LoadError> {
    match child(node, name) {
        None => Ok(ProtectionKind::None),
        Some(n) => {
            let text = element_text(&n);
            ProtectionKind::parse(&text).ok_or_else(|| {
                LoadError::MalformedDocument(format!("<{}> has unknown kind '{}'", name, text))
            })
        }
    }
}
