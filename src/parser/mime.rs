//! MIME parsing and canonicalization: part tree, payload decoding, body selection.

use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::document::{EmailDocument, Envelope, MimeLeaf, MimePart, PayloadEncoding};
use crate::parser::charset::{decode_base64, decode_charset, decode_quoted_printable};
use crate::parser::header::{body_offset, HeaderSummary};
use crate::parser::html::html_to_text;

/// Maximum depth for nested multiparts and embedded messages (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Turn raw email bytes into the normalized text handed to the backend.
///
/// Fails only when the bytes cannot be parsed as a MIME message.
pub fn canonicalize(raw: &[u8]) -> Result<String> {
    EmailDocument::parse(raw).map(|doc| doc.canonical_text().to_string())
}

/// Parse raw bytes into an owned [`MimePart`] tree.
pub fn parse_part_tree(raw: &[u8]) -> Result<MimePart> {
    let raw = skip_bom(raw);
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::MalformedDocument("message is empty".into()));
    }

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::MalformedDocument("not a MIME message".into()))?;

    if message.parts.is_empty() {
        return Err(Error::MalformedDocument("message has no parts".into()));
    }

    Ok(build_tree(&message, 0, 0))
}

fn build_tree(message: &Message<'_>, part_id: usize, depth: usize) -> MimePart {
    let Some(part) = message.parts.get(part_id) else {
        warn!(part_id, "Dangling MIME part reference");
        return MimePart::Container(Vec::new());
    };

    match &part.body {
        PartType::Multipart(children) => {
            if depth >= MAX_DEPTH {
                warn!(depth, "MIME nesting too deep, ignoring children");
                return MimePart::Container(Vec::new());
            }
            MimePart::Container(
                children
                    .iter()
                    .map(|&child| build_tree(message, child as usize, depth + 1))
                    .collect(),
            )
        }
        PartType::Message(nested) => {
            if depth >= MAX_DEPTH {
                warn!(depth, "Embedded message nesting too deep, ignoring it");
                return MimePart::Container(Vec::new());
            }
            MimePart::Container(vec![build_tree(nested, 0, depth + 1)])
        }
        _ => MimePart::Leaf(build_leaf(message, part)),
    }
}

fn build_leaf(message: &Message<'_>, part: &MessagePart<'_>) -> MimeLeaf {
    let content_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase();

    let charset = part
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .map(str::to_string);

    let transfer_encoding = part
        .content_transfer_encoding()
        .map(|te| te.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let envelope = match part.encoding {
        Encoding::QuotedPrintable => Envelope::QuotedPrintable,
        Encoding::Base64 => Envelope::Base64,
        _ => Envelope::Identity,
    };

    let region = message
        .raw_message
        .get(part.offset_header as usize..part.offset_end as usize);
    let payload = region.map(|region| match body_offset(region) {
        Some(start) => region[start..].to_vec(),
        None => Vec::new(),
    });

    match payload {
        Some(payload) => MimeLeaf {
            content_type,
            payload,
            encoding: PayloadEncoding {
                transfer_encoding,
                envelope,
                charset,
            },
        },
        None => {
            // Offsets outside the buffer: use what the parser already decoded
            debug!(content_type = %content_type, "Raw part body unavailable, using decoded contents");
            MimeLeaf {
                content_type,
                payload: part.contents().to_vec(),
                encoding: PayloadEncoding::default(),
            }
        }
    }
}

/// Decode a leaf's payload to text: transfer envelope first, then charset.
///
/// Never fails: undecodable envelopes keep their raw bytes and undecodable
/// charsets fall back to lossy UTF-8.
pub fn decode_payload(leaf: &MimeLeaf) -> String {
    let encoding = &leaf.encoding;
    let mut bytes = match encoding.envelope {
        Envelope::Base64 => decode_base64(&leaf.payload).unwrap_or_else(|| {
            warn!(content_type = %leaf.content_type, "Invalid base64 body, using raw bytes");
            leaf.payload.clone()
        }),
        Envelope::QuotedPrintable => decode_quoted_printable(&leaf.payload),
        Envelope::Identity => leaf.payload.clone(),
    };

    // Some parsers leave a declared quoted-printable body untouched
    if encoding.transfer_encoding == "quoted-printable"
        && encoding.envelope != Envelope::QuotedPrintable
    {
        bytes = decode_quoted_printable(&bytes);
    }

    decode_charset(encoding.charset.as_deref(), &bytes)
}

/// Pick the body text: HTML (converted) when present, plain text otherwise.
///
/// When several parts of the same kind exist, the last one visited wins.
pub fn select_body(root: &MimePart) -> String {
    let mut plain = String::new();
    let mut html = String::new();

    for leaf in root.leaves() {
        if leaf.is_plain_text() {
            plain = decode_payload(leaf);
        } else if leaf.is_html() {
            html = html_to_text(&decode_payload(leaf));
        }
    }

    if html.is_empty() {
        plain
    } else {
        html
    }
}

/// Assemble the canonical text: four header lines, a blank line, the body.
pub fn render_canonical(headers: &HeaderSummary, body: &str) -> String {
    format!(
        "From: {}\nTo: {}\nDate: {}\nSubject: {}\n\n{}",
        headers.from, headers.to, headers.date, headers.subject, body
    )
}

fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
