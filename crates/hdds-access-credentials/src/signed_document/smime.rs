// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `multipart/signed` envelope splitting (RFC 5751 Sec.3.5.3 / RFC 1847).
//!
//! ```text
//! Content-Type: multipart/signed; protocol="application/x-pkcs7-signature";
//!     micalg="sha-256"; boundary="----B3FF..."
//!
//! ------B3FF...
//! Content-Type: text/plain            <- signed MIME entity
//!
//! <?xml version="1.0" ...
//! ------B3FF...
//! Content-Type: application/x-pkcs7-signature; name="smime.p7s"
//! Content-Transfer-Encoding: base64
//!
//! MIIDzwYJKoZIhvcNAQcCoIIDwDCCA7wCAQEx...
//! ------B3FF...--
//! ```
//!
//! The line break in front of each delimiter belongs to the delimiter, not to
//! the preceding part. Lines may end in LF or CRLF.

use base64::{engine::general_purpose, Engine as _};

/// The two halves of a detached S/MIME signature.
#[derive(Debug)]
pub(crate) struct SmimeParts<'a> {
    /// Signed MIME entity (headers + body), canonicalized to CRLF.
    pub signed_entity: Vec<u8>,
    /// Body of the signed entity, exactly as it appears in the envelope.
    pub content: &'a [u8],
    /// DER-encoded CMS `ContentInfo`.
    pub signature_der: Vec<u8>,
}

pub(crate) fn split(envelope: &[u8]) -> Result<SmimeParts<'_>, String> {
    let (headers, body) = split_headers(envelope)
        .ok_or_else(|| "No MIME header block".to_string())?;

    let content_type = header_value(headers, "content-type")
        .ok_or_else(|| "Missing Content-Type header".to_string())?;
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if media_type != "multipart/signed" {
        return Err(format!(
            "Expected multipart/signed, got '{}'",
            media_type
        ));
    }

    let boundary = header_param(&content_type, "boundary")
        .ok_or_else(|| "multipart/signed without boundary parameter".to_string())?;
    if boundary.is_empty() || boundary.len() > 70 {
        return Err(format!("Invalid MIME boundary '{}'", boundary));
    }

    let parts = multipart_bodies(body, boundary.as_bytes())?;
    if parts.len() != 2 {
        return Err(format!(
            "multipart/signed must have 2 parts, found {}",
            parts.len()
        ));
    }
    let (entity, signature_part) = (parts[0], parts[1]);

    let (_, content) = split_headers(entity)
        .ok_or_else(|| "Signed entity has no header/body separator".to_string())?;

    let (sig_headers, sig_body) = split_headers(signature_part)
        .ok_or_else(|| "Signature part has no header/body separator".to_string())?;
    let sig_type = header_value(sig_headers, "content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !sig_type.contains("pkcs7-signature") {
        return Err(format!("Unexpected signature part type '{}'", sig_type));
    }

    let encoded: Vec<u8> = sig_body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let signature_der = general_purpose::STANDARD
        .decode(&encoded)
        .map_err(|e| format!("Signature part is not base64: {}", e))?;

    Ok(SmimeParts {
        signed_entity: canonicalize(entity),
        content,
        signature_der,
    })
}

/// Split at the first empty line. Returns `(headers, body)`.
fn split_headers(data: &[u8]) -> Option<(&[u8], &[u8])> {
    // Entity without headers starts with the empty line itself
    if let Some(rest) = data.strip_prefix(b"\r\n") {
        return Some((&data[..0], rest));
    }
    if let Some(rest) = data.strip_prefix(b"\n") {
        return Some((&data[..0], rest));
    }

    let mut pos = 0;
    while let Some(offset) = data[pos..].iter().position(|&b| b == b'\n') {
        let eol = pos + offset;
        let next = eol + 1;
        if data[next..].starts_with(b"\r\n") {
            return Some((&data[..eol + 1], &data[next + 2..]));
        }
        if data[next..].starts_with(b"\n") {
            return Some((&data[..eol + 1], &data[next + 1..]));
        }
        pos = next;
    }
    None
}

/// Unfolded value of the first header named `name` (case-insensitive).
fn header_value(headers: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(headers);
    let mut unfolded: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(&[' ', '\t'][..]) {
            if let Some(last) = unfolded.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else {
            unfolded.push(line.to_string());
        }
    }

    unfolded.into_iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

/// `boundary="..."` style parameter of a structured header value.
fn header_param(value: &str, param: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|item| {
        let (key, val) = item.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(param) {
            return None;
        }
        let val = val.trim();
        let val = val
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(val);
        Some(val.to_string())
    })
}

/// Body parts between `--boundary` delimiters, up to the `--boundary--` close.
fn multipart_bodies<'a>(body: &'a [u8], boundary: &[u8]) -> Result<Vec<&'a [u8]>, String> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary);

    let positions = delimiter_lines(body, &delimiter);
    let first = positions
        .first()
        .ok_or_else(|| "MIME boundary delimiter not found".to_string())?;
    if first.closing {
        return Err("Multipart body contains no parts".to_string());
    }

    let mut parts = Vec::new();
    let mut closed = false;
    for pair in positions.windows(2) {
        let (open, next) = (&pair[0], &pair[1]);
        if open.closing {
            break;
        }
        // Adjacent delimiter lines enclose an empty part
        let end = next.line_start_before.max(open.content_start);
        parts.push(&body[open.content_start..end]);
        if next.closing {
            closed = true;
            break;
        }
    }

    if !closed {
        return Err("Missing closing MIME boundary".to_string());
    }
    Ok(parts)
}

struct DelimiterLine {
    /// End of the previous part: the CRLF/LF in front of the delimiter is excluded.
    line_start_before: usize,
    /// First byte after the delimiter line terminator.
    content_start: usize,
    closing: bool,
}

fn delimiter_lines(body: &[u8], delimiter: &[u8]) -> Vec<DelimiterLine> {
    let mut found = Vec::new();
    let mut line_start = 0;

    while line_start <= body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |p| line_start + p);
        let line = &body[line_start..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            let trailer = if closing { &rest[2..] } else { rest };
            // Transport padding only
            if trailer.iter().all(|b| *b == b' ' || *b == b'\t') {
                let line_start_before = if line_start >= 2 && body[line_start - 2] == b'\r' {
                    line_start - 2
                } else {
                    line_start.saturating_sub(1)
                };
                found.push(DelimiterLine {
                    line_start_before,
                    content_start: (line_end + 1).min(body.len()),
                    closing,
                });
            }
        }

        line_start = line_end + 1;
    }
    found
}

/// Rewrite bare LF line endings as CRLF (RFC 5751 Sec.3.1.1).
fn canonicalize(entity: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entity.len() + entity.len() / 32);
    let mut prev = 0u8;
    for &b in entity {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}
