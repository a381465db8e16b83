//! The interpretation pipeline: canonicalize, classify, then run the
//! extraction dedicated to the winning category.

use tracing::{debug, info, warn};

use crate::backend::Ask;
use crate::error::{Error, Result};
use crate::generation::Generator;
use crate::model::{Category, CategoryScore, Details, EmailDocument, EmailType, ExtractionResult, Label};
use crate::prompts;

/// Turns raw emails into an [`ExtractionResult`] using one generation backend.
pub struct Interpreter<A> {
    generator: Generator<A>,
}

impl<A: Ask> Interpreter<A> {
    pub fn new(backend: A) -> Self {
        Self::with_generator(Generator::new(backend))
    }

    pub fn with_generator(generator: Generator<A>) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &Generator<A> {
        &self.generator
    }

    /// Interpret raw RFC 822 bytes.
    pub fn interpret(&self, raw: &[u8]) -> Result<ExtractionResult> {
        let document = EmailDocument::parse(raw)?;
        self.interpret_document(&document)
    }

    /// Interpret an already parsed email.
    pub fn interpret_document(&self, document: &EmailDocument) -> Result<ExtractionResult> {
        let text = document.canonical_text();
        let email_type = self.classify(text)?;
        info!(chosen = %email_type.chosen, "Email classified");

        let details = match &email_type.chosen {
            Label::Known(category) => self.extract(*category, text)?,
            Label::Unrecognized(label) => {
                warn!(label = %label, "Chosen label has no extraction");
                None
            }
        };

        Ok(ExtractionResult {
            email_type,
            details,
        })
    }

    /// Score the canonical text against every category and pick the best one.
    pub fn classify(&self, text: &str) -> Result<EmailType> {
        let unavailable = || Error::ClassificationUnavailable {
            attempts: self.generator.max_attempts(),
        };

        let value = self
            .generator
            .generate_for(&prompts::classification(), text)?
            .ok_or_else(unavailable)?;
        let proba = CategoryScore::from_value(&value).ok_or_else(unavailable)?;
        let chosen = proba.best().cloned().ok_or_else(unavailable)?;
        debug!(scores = ?proba.entries(), "Classification scores");

        Ok(EmailType { chosen, proba })
    }

    /// Run the extraction for `category`. `Ok(None)` when no valid answer came back.
    pub fn extract(&self, category: Category, text: &str) -> Result<Option<Details>> {
        let Some(value) = self
            .generator
            .generate_for(&prompts::extraction(category), text)?
        else {
            warn!(%category, "Extraction produced no valid answer, omitting details");
            return Ok(None);
        };

        match Details::from_value(category, value) {
            Ok(details) => Ok(Some(details)),
            Err(e) => {
                warn!(%category, error = %e, "Extraction answer has unexpected types, omitting details");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::backend::BackendError;
    use crate::model::Amount;

    const RAW: &[u8] = b"From: shop@example.com\r\nTo: me@example.com\r\nSubject: Your invoice\r\n\r\nTotal: 10 EUR\r\n";

    /// Answers in order, remembering which instructions were asked.
    struct Scripted {
        answers: RefCell<VecDeque<&'static str>>,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().copied().collect()),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Ask for Scripted {
        fn ask(&self, instruction: &str, _input: &str) -> std::result::Result<String, BackendError> {
            self.asked.borrow_mut().push(instruction.to_string());
            Ok(self.answers.borrow_mut().pop_front().unwrap_or("???").to_string())
        }
    }

    #[test]
    fn test_bill_end_to_end() {
        let backend = Scripted::new(&["bill: 1\ncommercial: 0\nconversation: 0", "total: [10, EUR]"]);
        let interpreter = Interpreter::new(&backend);
        let result = interpreter.interpret(RAW).unwrap();

        assert_eq!(result.chosen(), &Label::Known(Category::Bill));
        assert_eq!(result.bill().unwrap().total, Amount(10.0, "EUR".into()));
        assert_eq!(backend.asked.borrow().len(), 2);
        assert_eq!(backend.asked.borrow()[1], prompts::bill().instruction);
    }

    #[test]
    fn test_classification_exhausted_is_error() {
        let backend = Scripted::new(&["nope", "bill: 7", "still nope"]);
        let err = Interpreter::new(&backend).interpret(RAW).unwrap_err();
        assert!(matches!(err, Error::ClassificationUnavailable { attempts: 3 }));
        assert_eq!(backend.asked.borrow().len(), 3);
    }

    #[test]
    fn test_failed_extraction_omits_details() {
        let backend = Scripted::new(&["bill: 0.1\ncommercial: 0.2\nconversation: 0.9"]);
        let result = Interpreter::new(&backend).interpret(RAW).unwrap();
        assert_eq!(result.chosen(), &Label::Known(Category::Conversation));
        assert!(result.details.is_none());
        assert_eq!(backend.asked.borrow().len(), 1 + 3);
    }

    #[test]
    fn test_unrecognized_label_skips_extraction() {
        let backend = Scripted::new(&["bill: 0\ncommercial: 0\nconversation: 0\nnewsletter: 1"]);
        let result = Interpreter::new(&backend).interpret(RAW).unwrap();
        assert_eq!(result.chosen(), &Label::Unrecognized("newsletter".into()));
        assert!(result.details.is_none());
        assert_eq!(backend.asked.borrow().len(), 1);
    }

    #[test]
    fn test_malformed_document_never_reaches_backend() {
        let backend = Scripted::new(&[]);
        let err = Interpreter::new(&backend).interpret(b"").unwrap_err();
        assert!(matches!(err, Error::MalformedDocument(_)));
        assert!(backend.asked.borrow().is_empty());
    }

    #[test]
    fn test_backend_error_propagates() {
        struct Down;
        impl Ask for Down {
            fn ask(&self, _: &str, _: &str) -> std::result::Result<String, BackendError> {
                Err(BackendError::InvalidResponse("gateway down".into()))
            }
        }
        let err = Interpreter::new(Down).interpret(RAW).unwrap_err();
        assert!(matches!(err, Error::Backend(BackendError::InvalidResponse(_))));
    }

    #[test]
    fn test_custom_attempt_budget() {
        let backend = Scripted::new(&[]);
        let interpreter = Interpreter::with_generator(Generator::new(&backend).with_max_attempts(1));
        let err = interpreter.interpret(RAW).unwrap_err();
        assert!(matches!(err, Error::ClassificationUnavailable { attempts: 1 }));
        assert_eq!(backend.asked.borrow().len(), 1);
    }
}
