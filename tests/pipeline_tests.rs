//! Integration tests for canonicalization, the interpretation pipeline,
//! transcripts and configuration loading.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailgist::backend::{Ask, BackendError};
use mailgist::config::{load_config_from, BackendKind};
use mailgist::model::{Amount, Category, Label};
use mailgist::parser::eml::{parse_eml, read_eml};
use mailgist::parser::mime::canonicalize;
use mailgist::parser::transcript::{parse_transcript, Role};
use mailgist::{prompts, Error, Interpreter};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn canonical(name: &str) -> String {
    canonicalize(&read_eml(fixture(name)).unwrap()).unwrap()
}

/// Replays answers in order and records every exchange.
struct ScriptedBackend {
    answers: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedBackend {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Ask for ScriptedBackend {
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
        self.calls
            .borrow_mut()
            .push((instruction.to_string(), input.to_string()));
        Ok(self
            .answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| "I am not sure what you mean.".to_string()))
    }
}

// ─── Canonicalization ───────────────────────────────────────────────

#[test]
fn test_plain_email_canonical_form() {
    let text = canonical("plain.eml");
    assert!(text.starts_with(
        "From: Alice Martin <alice@example.org>\n\
         To: Bob <bob@example.org>\n\
         Date: Tue, 12 Mar 2024 09:15:00 +0100\n\
         Subject: Café tomorrow?\n\n"
    ));
    assert!(predicate::str::contains("Are we still on for coffee tomorrow at ten?").eval(&text));
}

#[test]
fn test_plain_only_body_is_verbatim() {
    let text = canonical("invoice.eml");
    assert_eq!(
        text,
        "From: Widget Store <orders@widgets.example.com>\n\
         To: buyer@example.org\n\
         Date: Sat, 16 Mar 2024 10:00:00 +0000\n\
         Subject: Invoice #2024-0042\n\
         \n\
         Thank you for your order.\n\
         \n\
         1 x Widget ........ 10.00 EUR\n\
         \n\
         Total: 10.00 EUR\n"
    );
}

#[test]
fn test_html_preferred_over_plain() {
    let text = canonical("alternative.eml");
    let body = text.split_once("\n\n").unwrap().1;

    assert!(!body.contains("PLAIN VERSION"));
    assert!(body.contains("Spring sale"));
    assert!(body.contains("**half price**"));
    assert!(body.contains("Shop now"));
    assert!(body.contains("& save"));
    assert!(!body.contains("https://shop.example.com"));
    assert!(!body.contains("track()"));
    assert!(!body.contains("color: red"));
    assert!(!body.contains('<'));
}

#[test]
fn test_latin1_quoted_printable() {
    let text = canonical("latin1_qp.eml");
    assert!(text.starts_with("From: Renée Dupré <renee@example.fr>\n"));
    assert!(text.contains("Bonjour à tous,"));
    assert!(text.contains("La réunion de lundi est déplacée au café d'en face, avec un gâteau."));
    assert!(!text.contains("=E9"));
}

#[test]
fn test_ascii_label_with_utf8_body() {
    let text = canonical("mislabeled_ascii.eml");
    assert!(text.contains("Café crème et crêpes ce soir ?"));
    assert!(!text.contains("Ã"));
}

#[test]
fn test_base64_html_body() {
    let text = canonical("base64_html.eml");
    assert!(text.contains("Subject: Your monthly statement\n\n"));
    assert!(text.contains("Your statement for March is ready."));
    assert!(text.contains("42.00 EUR"));
    assert!(!text.contains("PGh0bWw"));
}

#[test]
fn test_embedded_message_is_descended() {
    let text = canonical("forwarded.eml");
    assert!(text.contains("Subject: Fwd: Lunch plans\n"));
    assert!(text.contains("Lunch at noon on Friday?"));
    assert!(!text.contains("JVBERi0"));
}

#[test]
fn test_sibling_plain_parts_keep_first_in_document_order() {
    let raw = b"From: a@example.org\n\
Subject: two parts\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"B\"\n\
\n\
--B\n\
Content-Type: text/plain\n\
\n\
first part\n\
--B\n\
Content-Type: text/plain\n\
\n\
second part\n\
--B--\n";
    let text = canonicalize(raw).unwrap();
    assert!(text.contains("first part"));
    assert!(!text.contains("second part"));
}

#[test]
fn test_missing_headers_are_empty() {
    let text = canonicalize(b"Subject: only a subject\n\nbody text\n").unwrap();
    assert!(text.starts_with("From: \nTo: \nDate: \nSubject: only a subject\n\nbody text"));
}

#[test]
fn test_canonicalize_is_deterministic() {
    let raw = read_eml(fixture("alternative.eml")).unwrap();
    assert_eq!(canonicalize(&raw).unwrap(), canonicalize(&raw).unwrap());
}

#[test]
fn test_empty_input_is_malformed() {
    assert!(matches!(canonicalize(b""), Err(Error::MalformedDocument(_))));
}

#[test]
fn test_missing_file() {
    let err = parse_eml(fixture("does-not-exist.eml")).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

// ─── Interpretation ─────────────────────────────────────────────────

#[test]
fn test_invoice_end_to_end() {
    let backend = ScriptedBackend::new(&[
        "```yaml\nbill: 1\ncommercial: 0\nconversation: 0\n```",
        "total: [10.0, EUR]\nbought:\n  - label: Widget\n    price: [10.0, EUR]\n",
    ]);
    let raw = read_eml(fixture("invoice.eml")).unwrap();
    let result = Interpreter::new(&backend).interpret(&raw).unwrap();

    assert_eq!(result.chosen(), &Label::Known(Category::Bill));
    let bill = result.bill().unwrap();
    assert_eq!(bill.total, Amount(10.0, "EUR".into()));
    assert_eq!(bill.bought.as_ref().unwrap()[0].label, "Widget");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["email_type"]["chosen"], "bill");
    assert_eq!(json["bill"]["total"], serde_json::json!([10.0, "EUR"]));

    // Both prompts saw the canonical text, classification first.
    let calls = backend.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, prompts::classification().instruction);
    assert_eq!(calls[1].0, prompts::bill().instruction);
    assert!(calls[0].1.starts_with("From: Widget Store <orders@widgets.example.com>\n"));
    assert_eq!(calls[0].1, calls[1].1);
}

#[test]
fn test_extraction_answer_kept_verbatim() {
    let backend = ScriptedBackend::new(&[
        "bill: 1\ncommercial: 0\nconversation: 0",
        "total: [10, EUR]\ninvoice_number: '123'\nbought:\n  - label: Widget\n    price: [10.0, EUR]\n    quantity: 1\n",
    ]);
    let raw = read_eml(fixture("invoice.eml")).unwrap();
    let result = Interpreter::new(&backend).interpret(&raw).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["bill"],
        serde_json::json!({
            "total": [10, "EUR"],
            "invoice_number": "123",
            "bought": [{"label": "Widget", "price": [10.0, "EUR"], "quantity": 1}]
        })
    );
    assert_eq!(result.bill().unwrap().total, Amount(10.0, "EUR".into()));
}

#[test]
fn test_conversation_after_retries() {
    let backend = ScriptedBackend::new(&[
        "Here are my scores!",
        "commercial: 0\nbill: 0\nconversation: 1",
        "summary: Alice asks whether coffee tomorrow at ten still stands.",
    ]);
    let raw = read_eml(fixture("plain.eml")).unwrap();
    let result = Interpreter::new(&backend).interpret(&raw).unwrap();

    assert_eq!(result.chosen(), &Label::Known(Category::Conversation));
    assert_eq!(
        result.conversation().unwrap().summary,
        "Alice asks whether coffee tomorrow at ten still stands."
    );
    assert_eq!(backend.call_count(), 3);
}

#[test]
fn test_commercial_extraction_exhausted_omits_key() {
    let backend = ScriptedBackend::new(&["commercial: 0.9\nbill: 0.05\nconversation: 0"]);
    let raw = read_eml(fixture("alternative.eml")).unwrap();
    let result = Interpreter::new(&backend).interpret(&raw).unwrap();

    assert_eq!(result.chosen(), &Label::Known(Category::Commercial));
    assert!(result.commercial().is_none());
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("commercial").is_none());
    assert_eq!(backend.call_count(), 4);
}

#[test]
fn test_unclassifiable_email() {
    let backend = ScriptedBackend::new(&[]);
    let raw = read_eml(fixture("plain.eml")).unwrap();
    let err = Interpreter::new(&backend).interpret(&raw).unwrap_err();

    assert!(matches!(err, Error::ClassificationUnavailable { .. }));
    assert!(err.is_client_error());
    assert_eq!(backend.call_count(), 3);
}

// ─── Transcripts ────────────────────────────────────────────────────

#[test]
fn test_transcript_fixture() {
    let raw = std::fs::read_to_string(fixture("gemma_transcript.txt")).unwrap();
    let transcript = parse_transcript(&raw).unwrap();

    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript.turns()[0].role, Role::User);
    assert!(transcript.turns()[0].content.ends_with("# Input\nHello there"));
    let last = transcript.last().unwrap();
    assert_eq!(last.role, Role::Model);
    assert_eq!(last.content, "summary: \"A greeting.\"");
}

// ─── Configuration ──────────────────────────────────────────────────

#[test]
fn test_config_file_overrides() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("config.toml");
    file.write_str(
        r#"
[generation]
max_attempts = 5

[backend]
kind = "local-command"

[local_command]
program = "gemma-run"
"#,
    )
    .unwrap();
    file.assert(predicate::path::is_file());

    let config = load_config_from(file.path());
    assert_eq!(config.generation.max_attempts, 5);
    assert_eq!(config.backend.kind, BackendKind::LocalCommand);
    assert_eq!(config.local_command.program, "gemma-run");
    assert_eq!(config.chat_api.api_key_env, "OPENAI_API_KEY");
}

#[test]
fn test_broken_config_falls_back_to_defaults() {
    let dir = assert_fs::TempDir::new().unwrap();
    let file = dir.child("config.toml");
    file.write_str("[generation\nmax_attempts = ").unwrap();

    let config = load_config_from(file.path());
    assert_eq!(config, mailgist::config::Config::default());
}
