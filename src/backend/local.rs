//! Backend driving a local model through a command-line program.
//!
//! The program receives a chat-template prompt on stdin and must print the
//! decoded conversation (prompt turns included) on stdout, the way a
//! tokenizer's `decode` of the full output sequence would. The answer is the
//! content of the last turn.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

use super::{Ask, BackendError};
use crate::config::LocalCommandConfig;
use crate::parser::transcript::TurnMarkers;

#[derive(Debug, Clone)]
pub struct LocalCommandBackend {
    program: String,
    args: Vec<String>,
    markers: TurnMarkers,
}

impl LocalCommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, markers: TurnMarkers) -> Self {
        Self {
            program: program.into(),
            args,
            markers,
        }
    }

    pub fn from_config(config: &LocalCommandConfig) -> Result<Self, BackendError> {
        if config.program.trim().is_empty() {
            return Err(BackendError::MissingProgram);
        }
        tracing::info!(program = %config.program, "Using local command backend");
        Ok(Self::new(
            config.program.clone(),
            config.args.clone(),
            config.markers.clone(),
        ))
    }

    /// The prompt written to the program's stdin.
    pub fn render(&self, instruction: &str, input: &str) -> String {
        self.markers
            .render_prompt(&format!("# Instructions\n{instruction}\n# Input\n{input}"))
    }

    fn run(&self, prompt: String) -> Result<String, BackendError> {
        let spawn_error = |source| BackendError::Process {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from another thread so a chatty program cannot fill its
        // stdout pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(prompt.as_bytes()) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });

        let output = child.wait_with_output().map_err(spawn_error)?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(result) => result.map_err(spawn_error)?,
                Err(_) => {
                    return Err(BackendError::InvalidResponse(
                        "stdin writer thread panicked".into(),
                    ))
                }
            }
        }

        if !output.status.success() {
            return Err(BackendError::ProcessFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Ask for LocalCommandBackend {
    fn ask(&self, instruction: &str, input: &str) -> Result<String, BackendError> {
        let stdout = self.run(self.render(instruction, input))?;
        let transcript = self.markers.parse(&stdout)?;
        tracing::debug!(turns = transcript.len(), "Local model transcript parsed");

        transcript
            .into_turns()
            .pop()
            .map(|turn| turn.content)
            .ok_or(BackendError::EmptyTranscript)
    }
}
