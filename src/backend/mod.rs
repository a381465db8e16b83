//! Generation backends.
//!
//! A backend answers a free-form instruction applied to an input text. The
//! rest of the pipeline only sees the [`Ask`] trait, so backends can be
//! swapped by configuration or replaced by a scripted double in tests.

pub mod chat_api;
pub mod local;
pub mod retry;

use thiserror::Error;

use crate::config::{BackendKind, Config};
use crate::parser::transcript::TranscriptError;

pub use chat_api::ChatApiBackend;
pub use local::LocalCommandBackend;
pub use retry::RetryPolicy;

/// Something that can answer an instruction about an input text.
pub trait Ask {
    /// Return the raw answer text for `instruction` applied to `input`.
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError>;
}

impl<T: Ask + ?Sized> Ask for &T {
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
        (**self).ask(instruction, input)
    }
}

impl<T: Ask + ?Sized> Ask for Box<T> {
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
        (**self).ask(instruction, input)
    }
}

/// Failures talking to a generation backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} answered HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from backend: {0}")]
    InvalidResponse(String),

    #[error("API key variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("Could not run '{program}': {source}")]
    Process {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed model transcript: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Model transcript contains no turn")]
    EmptyTranscript,

    #[error("No program configured for the local-command backend")]
    MissingProgram,
}

impl BackendError {
    /// Whether the same request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Build the configured backend. `kind` overrides `config.backend.kind`.
pub fn from_config(config: &Config, kind: Option<BackendKind>) -> Result<Box<dyn Ask>, BackendError> {
    let kind = kind.unwrap_or(config.backend.kind);
    tracing::info!(backend = %kind, "Selecting generation backend");

    let policy = RetryPolicy::from(&config.transport);
    match kind {
        BackendKind::ChatApi => Ok(Box::new(ChatApiBackend::from_config(
            &config.chat_api,
            policy,
        )?)),
        BackendKind::LocalCommand => Ok(Box::new(LocalCommandBackend::from_config(
            &config.local_command,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Ask for Echo {
        fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
            Ok(format!("{instruction}|{input}"))
        }
    }

    #[test]
    fn test_ask_through_box_and_ref() {
        let boxed: Box<dyn Ask> = Box::new(Echo);
        assert_eq!(boxed.ask("a", "b").unwrap(), "a|b");
        let by_ref = &Echo;
        assert_eq!(by_ref.ask("c", "d").unwrap(), "c|d");
    }

    #[test]
    fn test_transient_statuses() {
        let status = |status| BackendError::Status {
            endpoint: "x".into(),
            status,
            body: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(401).is_transient());
        assert!(!BackendError::EmptyTranscript.is_transient());
        assert!(!BackendError::MissingApiKey("KEY".into()).is_transient());
    }

    #[test]
    fn test_local_backend_without_program_is_rejected() {
        let config = Config::default();
        let err = from_config(&config, Some(BackendKind::LocalCommand)).err().unwrap();
        assert!(matches!(err, BackendError::MissingProgram));
    }
}
