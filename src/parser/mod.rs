//! Email canonicalization (EML loading, header decoding, MIME and HTML handling)
//! and the chat transcript parser.

pub mod charset;
pub mod eml;
pub mod header;
pub mod html;
pub mod mime;
pub mod transcript;
