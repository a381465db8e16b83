//! Core data model: the parsed email, its categories and the extraction result.

pub mod category;
pub mod document;
pub mod result;

pub use category::{Category, CategoryScore, Label};
pub use document::{EmailDocument, MimeLeaf, MimePart};
pub use result::{
    Amount, BillInfo, BillItem, CommercialInfo, ConversationInfo, Details, EmailType,
    ExtractionResult,
};
