// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CMS `SignedData` verification (RFC 5652) for detached signatures.
//!
//! ```text
//! ContentInfo ::= SEQUENCE { contentType OID (signedData), [0] EXPLICIT SignedData }
//! SignedData  ::= SEQUENCE {
//!     version, digestAlgorithms SET, encapContentInfo SEQUENCE,
//!     certificates [0] IMPLICIT OPTIONAL, crls [1] IMPLICIT OPTIONAL,
//!     signerInfos SET OF SignerInfo }
//! SignerInfo  ::= SEQUENCE {
//!     version, sid (IssuerAndSerialNumber | [0] SubjectKeyIdentifier),
//!     digestAlgorithm, signedAttrs [0] IMPLICIT OPTIONAL,
//!     signatureAlgorithm, signature OCTET STRING, unsignedAttrs [1] OPTIONAL }
//! ```
//!
//! Only definite-length DER is accepted.

use std::time::{SystemTime, UNIX_EPOCH};

use x509_parser::der_parser::asn1_rs::{Any, Class, FromDer, Tag};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::X509Certificate;

use super::VerifyError;
use crate::certificate::Certificate;
use crate::crypto::{self, DigestAlgorithm};

const OID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
const OID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";

/// Sequential reader over the elements of a constructed DER value.
struct DerReader<'a> {
    rest: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Next element and its complete TLV encoding.
    fn next_raw(&mut self, what: &str) -> Result<(Any<'a>, &'a [u8]), VerifyError> {
        let input = self.rest;
        let (rem, any) = Any::from_der(input)
            .map_err(|e| VerifyError::Malformed(format!("CMS {}: {:?}", what, e)))?;
        self.rest = rem;
        Ok((any, &input[..input.len() - rem.len()]))
    }

    fn next(&mut self, what: &str) -> Result<Any<'a>, VerifyError> {
        self.next_raw(what).map(|(any, _)| any)
    }

    fn expect(&mut self, tag: Tag, what: &str) -> Result<Any<'a>, VerifyError> {
        let any = self.next(what)?;
        if any.class() != Class::Universal || any.tag() != tag {
            return Err(VerifyError::Malformed(format!(
                "CMS {}: expected {:?}, found {:?}",
                what,
                tag,
                any.tag()
            )));
        }
        Ok(any)
    }

    /// Consume `[n]` if it is the next element.
    fn optional_context(&mut self, n: u32, what: &str) -> Result<Option<(Any<'a>, &'a [u8])>, VerifyError> {
        match self.rest.first() {
            Some(&b) if b & 0xC0 == 0x80 && u32::from(b & 0x1F) == n => self.next_raw(what).map(Some),
            _ => Ok(None),
        }
    }
}

fn oid_of(any: Any<'_>, what: &str) -> Result<String, VerifyError> {
    any.oid()
        .map(|oid| oid.to_id_string())
        .map_err(|e| VerifyError::Malformed(format!("CMS {}: bad OID: {:?}", what, e)))
}

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`
fn algorithm_oid(seq: Any<'_>, what: &str) -> Result<String, VerifyError> {
    let mut reader = DerReader::new(seq.data);
    let oid = reader.expect(Tag::Oid, what)?;
    oid_of(oid, what)
}

/// How a SignerInfo names its certificate.
enum SignerId<'a> {
    IssuerSerial { issuer: &'a [u8], serial: &'a [u8] },
    KeyId(&'a [u8]),
}

struct SignerInfo<'a> {
    sid: SignerId<'a>,
    digest_oid: String,
    /// Complete `[0] IMPLICIT` TLV of the signed attributes.
    signed_attrs: Option<(Any<'a>, &'a [u8])>,
    signature_oid: String,
    signature: &'a [u8],
}

struct SignedData<'a> {
    certificates: Vec<&'a [u8]>,
    signers: Vec<SignerInfo<'a>>,
}

fn parse_content_info(der: &[u8]) -> Result<SignedData<'_>, VerifyError> {
    let mut outer = DerReader::new(der);
    let content_info = outer.expect(Tag::Sequence, "ContentInfo")?;
    if !outer.is_empty() {
        return Err(VerifyError::Malformed(
            "CMS ContentInfo: trailing data".to_string(),
        ));
    }

    let mut reader = DerReader::new(content_info.data);
    let content_type = oid_of(reader.expect(Tag::Oid, "contentType")?, "contentType")?;
    if content_type != OID_SIGNED_DATA {
        return Err(VerifyError::Malformed(format!(
            "CMS content type {} is not signedData",
            content_type
        )));
    }
    let (explicit, _) = reader
        .optional_context(0, "content")?
        .ok_or_else(|| VerifyError::Malformed("CMS ContentInfo without content".to_string()))?;

    let signed_data = DerReader::new(explicit.data).expect(Tag::Sequence, "SignedData")?;
    parse_signed_data(signed_data.data)
}

fn parse_signed_data(data: &[u8]) -> Result<SignedData<'_>, VerifyError> {
    let mut reader = DerReader::new(data);
    reader.expect(Tag::Integer, "SignedData.version")?;
    reader.expect(Tag::Set, "digestAlgorithms")?;

    let encap = reader.expect(Tag::Sequence, "encapContentInfo")?;
    let mut encap_reader = DerReader::new(encap.data);
    encap_reader.expect(Tag::Oid, "eContentType")?;
    if encap_reader.optional_context(0, "eContent")?.is_some() {
        return Err(VerifyError::Malformed(
            "CMS signature carries encapsulated content, expected detached".to_string(),
        ));
    }

    let mut certificates = Vec::new();
    if let Some((certs, _)) = reader.optional_context(0, "certificates")? {
        let mut cert_reader = DerReader::new(certs.data);
        while !cert_reader.is_empty() {
            let (any, raw) = cert_reader.next_raw("certificate")?;
            // Attribute certificates and other choices are ignored
            if any.class() == Class::Universal && any.tag() == Tag::Sequence {
                certificates.push(raw);
            }
        }
    }
    reader.optional_context(1, "crls")?;

    let signer_set = reader.expect(Tag::Set, "signerInfos")?;
    let mut signer_reader = DerReader::new(signer_set.data);
    let mut signers = Vec::new();
    while !signer_reader.is_empty() {
        let info = signer_reader.expect(Tag::Sequence, "SignerInfo")?;
        signers.push(parse_signer_info(info.data)?);
    }

    Ok(SignedData {
        certificates,
        signers,
    })
}

fn parse_signer_info(data: &[u8]) -> Result<SignerInfo<'_>, VerifyError> {
    let mut reader = DerReader::new(data);
    reader.expect(Tag::Integer, "SignerInfo.version")?;

    let sid_any = reader.next("sid")?;
    let sid = if sid_any.class() == Class::ContextSpecific && sid_any.tag() == Tag(0) {
        SignerId::KeyId(sid_any.data)
    } else if sid_any.class() == Class::Universal && sid_any.tag() == Tag::Sequence {
        let mut sid_reader = DerReader::new(sid_any.data);
        let (_, issuer) = sid_reader.next_raw("sid.issuer")?;
        let serial = sid_reader.expect(Tag::Integer, "sid.serialNumber")?;
        SignerId::IssuerSerial {
            issuer,
            serial: serial.data,
        }
    } else {
        return Err(VerifyError::Malformed(
            "CMS SignerInfo: unknown signer identifier".to_string(),
        ));
    };

    let digest_oid = algorithm_oid(reader.expect(Tag::Sequence, "digestAlgorithm")?, "digestAlgorithm")?;
    let signed_attrs = reader.optional_context(0, "signedAttrs")?;
    let signature_oid = algorithm_oid(
        reader.expect(Tag::Sequence, "signatureAlgorithm")?,
        "signatureAlgorithm",
    )?;
    let signature = reader.expect(Tag::OctetString, "signature")?.data;

    Ok(SignerInfo {
        sid,
        digest_oid,
        signed_attrs,
        signature_oid,
        signature,
    })
}

/// Value of the `messageDigest` signed attribute.
fn message_digest<'a>(attrs: &Any<'a>) -> Result<&'a [u8], VerifyError> {
    let mut reader = DerReader::new(attrs.data);
    while !reader.is_empty() {
        let attribute = reader.expect(Tag::Sequence, "Attribute")?;
        let mut attr_reader = DerReader::new(attribute.data);
        let attr_type = oid_of(attr_reader.expect(Tag::Oid, "attrType")?, "attrType")?;
        if attr_type != OID_MESSAGE_DIGEST {
            continue;
        }
        let values = attr_reader.expect(Tag::Set, "attrValues")?;
        let digest = DerReader::new(values.data).expect(Tag::OctetString, "messageDigest")?;
        return Ok(digest.data);
    }
    Err(VerifyError::Malformed(
        "CMS signedAttrs without messageDigest".to_string(),
    ))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn subject_key_id<'a>(cert: &X509Certificate<'a>) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(key_id) => Some(key_id.0),
            _ => None,
        })
}

fn matches_signer(cert: &X509Certificate<'_>, sid: &SignerId<'_>) -> bool {
    match sid {
        SignerId::IssuerSerial { issuer, serial } => {
            cert.issuer().as_raw() == *issuer
                && strip_leading_zeros(cert.raw_serial()) == strip_leading_zeros(serial)
        }
        SignerId::KeyId(key_id) => subject_key_id(cert) == Some(*key_id),
    }
}

/// Verify a detached CMS signature over `signed_content`.
///
/// Every SignerInfo must verify and its certificate must be `anchor` or be
/// issued by `anchor`. Returns the subject of the first signer.
pub(crate) fn verify_detached(
    signature_der: &[u8],
    signed_content: &[u8],
    anchor: &Certificate,
) -> Result<String, VerifyError> {
    let signed_data = parse_content_info(signature_der)?;
    if signed_data.signers.is_empty() {
        return Err(VerifyError::Malformed(
            "CMS SignedData has no SignerInfo".to_string(),
        ));
    }

    let mut candidates = signed_data.certificates.clone();
    candidates.push(anchor.der());

    let mut first_subject = None;
    for signer in &signed_data.signers {
        let subject = verify_signer(signer, &candidates, signed_content, anchor)?;
        first_subject.get_or_insert(subject);
    }

    first_subject.ok_or_else(|| VerifyError::Malformed("CMS SignedData has no SignerInfo".to_string()))
}

fn verify_signer(
    signer: &SignerInfo<'_>,
    candidates: &[&[u8]],
    signed_content: &[u8],
    anchor: &Certificate,
) -> Result<String, VerifyError> {
    let digest = DigestAlgorithm::from_oid(&signer.digest_oid).ok_or_else(|| {
        VerifyError::Untrusted(format!("Unsupported digest algorithm {}", signer.digest_oid))
    })?;
    let sig_digest = DigestAlgorithm::for_signature(&signer.signature_oid, Some(digest))
        .ok_or_else(|| {
            VerifyError::Untrusted(format!(
                "Unsupported signature algorithm {}",
                signer.signature_oid
            ))
        })?;

    let signer_der = candidates
        .iter()
        .copied()
        .find(|der| {
            X509Certificate::from_der(der)
                .map(|(_, cert)| matches_signer(&cert, &signer.sid))
                .unwrap_or(false)
        })
        .ok_or_else(|| VerifyError::Untrusted("Signer certificate not found".to_string()))?;
    let (_, signer_cert) = X509Certificate::from_der(signer_der)
        .map_err(|e| VerifyError::Malformed(format!("Embedded certificate: {:?}", e)))?;

    // With signed attributes the signature covers their DER SET OF encoding,
    // otherwise it covers the content directly.
    let content_digest = digest.digest(signed_content);
    let signed_bytes = match &signer.signed_attrs {
        Some((attrs, raw)) => {
            if message_digest(attrs)? != content_digest.as_slice() {
                return Err(VerifyError::Untrusted(
                    "Content digest does not match messageDigest attribute".to_string(),
                ));
            }
            let mut set_of = raw.to_vec();
            set_of[0] = 0x31;
            set_of
        }
        None => signed_content.to_vec(),
    };

    crypto::verify_signature(
        signer_cert.public_key(),
        sig_digest,
        &signed_bytes,
        signer.signature,
    )
    .map_err(|e| VerifyError::Untrusted(format!("Document signature invalid: {}", e)))?;

    // Validity is checked for issued signers only, never for the anchor
    if signer_der != anchor.der() {
        anchor.verify_issued(&signer_cert).map_err(VerifyError::Untrusted)?;
        check_validity(&signer_cert)?;
    }

    Ok(signer_cert.subject().to_string())
}

fn check_validity(cert: &X509Certificate<'_>) -> Result<(), VerifyError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let validity = cert.validity();
    if now < validity.not_before.timestamp() {
        return Err(VerifyError::Untrusted(format!(
            "Signer certificate '{}' not yet valid",
            cert.subject()
        )));
    }
    if now > validity.not_after.timestamp() {
        return Err(VerifyError::Untrusted(format!(
            "Signer certificate '{}' expired",
            cert.subject()
        )));
    }
    Ok(())
}
