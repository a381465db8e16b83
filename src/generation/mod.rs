//! Schema-validated generation: ask the backend until its answer parses and
//! matches the expected shape, or the attempt budget runs out.

pub mod fence;
pub mod schema;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{Ask, BackendError};
use crate::prompts::PromptSpec;
use fence::strip_fences;
use schema::{Schema, SchemaViolation};

/// Attempts per generation when not configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Why a single answer was rejected. Only ever logged: it costs one attempt.
#[derive(Error, Debug)]
pub enum AttemptFailure {
    #[error("answer is not valid YAML: {0}")]
    Unparsable(#[from] serde_yaml::Error),

    #[error("answer does not match the schema at {0}")]
    SchemaViolation(#[from] SchemaViolation),
}

/// Turn one raw answer into a validated value.
///
/// The answer may be wrapped in a markdown fence. Its content is read as
/// YAML, which also covers JSON.
pub fn parse_answer(raw: &str, schema: &Schema) -> Result<Value, AttemptFailure> {
    let value: Value = serde_yaml::from_str(strip_fences(raw))?;
    schema.validate(&value)?;
    Ok(value)
}

/// Bounded retry loop around a generation backend.
#[derive(Debug, Clone)]
pub struct Generator<A> {
    backend: A,
    max_attempts: u32,
}

impl<A: Ask> Generator<A> {
    pub fn new(backend: A) -> Self {
        Self {
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the attempt budget. Zero is raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    /// Ask until an answer matches `schema`.
    ///
    /// Returns `Ok(None)` once every attempt produced an unusable answer.
    /// Backend errors are not retried here and propagate as `Err`.
    pub fn generate(
        &self,
        instruction: &str,
        input: &str,
        schema: &Schema,
    ) -> Result<Option<Value>, BackendError> {
        for attempt in 1..=self.max_attempts {
            let raw = self.backend.ask(instruction, input)?;

            match parse_answer(&raw, schema) {
                Ok(value) => {
                    debug!(attempt, "Backend answer accepted");
                    return Ok(Some(value));
                }
                Err(failure) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        reason = %failure,
                        "Backend answer rejected"
                    );
                    debug!(answer = %raw, "Rejected answer");
                }
            }
        }

        warn!(
            max_attempts = self.max_attempts,
            "No valid answer within the attempt budget"
        );
        Ok(None)
    }

    /// [`Generator::generate`] with a prompt's instruction and schema.
    pub fn generate_for(&self, prompt: &PromptSpec, input: &str) -> Result<Option<Value>, BackendError> {
        self.generate(prompt.instruction, input, &prompt.schema)
    }
}
