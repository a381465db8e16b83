//! Parsed email document and its MIME part tree.

use crate::error::Result;
use crate::parser::header::HeaderSummary;
use crate::parser::mime;

/// Transfer envelope that the MIME layer recognized for a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// 7bit, 8bit, binary or no header at all: the payload is used as is.
    Identity,
    QuotedPrintable,
    Base64,
}

/// How a leaf's payload bytes are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoding {
    /// `Content-Transfer-Encoding` exactly as declared (lowercased), empty if absent.
    pub transfer_encoding: String,
    /// Envelope the MIME parser recognized and that must be reversed.
    pub envelope: Envelope,
    /// Declared `charset` parameter, if any.
    pub charset: Option<String>,
}

impl Default for PayloadEncoding {
    fn default() -> Self {
        Self {
            transfer_encoding: String::new(),
            envelope: Envelope::Identity,
            charset: None,
        }
    }
}

/// A content-bearing MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeLeaf {
    /// Lowercase `type/subtype`, e.g. `text/plain`.
    pub content_type: String,
    /// Raw payload, still transfer-encoded.
    pub payload: Vec<u8>,
    pub encoding: PayloadEncoding,
}

impl MimeLeaf {
    pub fn is_plain_text(&self) -> bool {
        self.content_type == "text/plain"
    }

    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// `multipart/*` or an embedded `message/rfc822`: children only, no content.
    Container(Vec<MimePart>),
    Leaf(MimeLeaf),
}

impl MimePart {
    /// All leaves, depth-first.
    ///
    /// Children are popped off a stack, so later siblings are visited first
    /// and the first sibling in document order comes out last.
    pub fn leaves(&self) -> Vec<&MimeLeaf> {
        let mut stack = vec![self];
        let mut leaves = Vec::new();

        while let Some(part) = stack.pop() {
            match part {
                MimePart::Container(children) => stack.extend(children.iter()),
                MimePart::Leaf(leaf) => leaves.push(leaf),
            }
        }

        leaves
    }
}

/// A single email, parsed once and never mutated.
#[derive(Debug, Clone)]
pub struct EmailDocument {
    raw: Vec<u8>,
    headers: HeaderSummary,
    root: MimePart,
    canonical_text: String,
}

impl EmailDocument {
    /// Parse raw RFC 5322 bytes.
    ///
    /// Fails with [`crate::error::Error::MalformedDocument`] when the bytes are
    /// not a MIME message at all. Everything after that point degrades
    /// gracefully instead of failing.
    pub fn parse(raw: impl Into<Vec<u8>>) -> Result<Self> {
        let raw = raw.into();
        let root = mime::parse_part_tree(&raw)?;
        let headers = HeaderSummary::from_message(&raw);
        let body = mime::select_body(&root);
        let canonical_text = mime::render_canonical(&headers, &body);

        Ok(Self {
            raw,
            headers,
            root,
            canonical_text,
        })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn from(&self) -> &str {
        &self.headers.from
    }

    pub fn to(&self) -> &str {
        &self.headers.to
    }

    pub fn date(&self) -> &str {
        &self.headers.date
    }

    pub fn subject(&self) -> &str {
        &self.headers.subject
    }

    pub fn root(&self) -> &MimePart {
        &self.root
    }

    /// Normalized text handed to the generation backend.
    pub fn canonical_text(&self) -> &str {
        &self.canonical_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(content_type: &str) -> MimePart {
        MimePart::Leaf(MimeLeaf {
            content_type: content_type.to_string(),
            payload: Vec::new(),
            encoding: PayloadEncoding::default(),
        })
    }

    #[test]
    fn test_leaves_of_nested_tree() {
        let tree = MimePart::Container(vec![
            MimePart::Container(vec![leaf("text/plain"), leaf("text/html")]),
            leaf("image/png"),
        ]);
        let mut types: Vec<&str> = tree
            .leaves()
            .iter()
            .map(|l| l.content_type.as_str())
            .collect();
        types.sort_unstable();
        assert_eq!(types, vec!["image/png", "text/html", "text/plain"]);
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = leaf("text/plain");
        assert_eq!(tree.leaves().len(), 1);
        assert!(tree.leaves()[0].is_plain_text());
    }

    #[test]
    fn test_empty_container_has_no_leaves() {
        assert!(MimePart::Container(Vec::new()).leaves().is_empty());
    }
}
