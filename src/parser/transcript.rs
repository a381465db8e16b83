//! Chat transcript parser for raw model output.
//!
//! A local chat model decodes to one flat string in which turns are delimited
//! by special marker tokens. This module recovers the turns with a small
//! recursive-descent parser over the following grammar:
//!
//! ```text
//! document := BEGIN* turn* END?
//! turn     := START_OF_TURN role NEWLINE+ content END_OF_TURN?
//! role     := "user" | "model"
//! content  := text up to the next END_OF_TURN, START_OF_TURN or END (or end of input)
//! ```
//!
//! Whitespace between structural tokens is ignored; content is kept verbatim.
//! Because content stops at the first marker, a trailing turn that was cut off
//! (no `END_OF_TURN`) is still recovered.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered turns recovered from a raw log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

/// Errors raised when a raw log does not follow the transcript grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Unexpected text at byte {offset}: expected {expected}")]
    Unexpected {
        offset: usize,
        expected: &'static str,
    },

    #[error("Unknown role '{role}' at byte {offset}")]
    UnknownRole { offset: usize, role: String },

    #[error("Missing newline after role at byte {offset}")]
    MissingNewline { offset: usize },
}

/// Special tokens delimiting a transcript. Defaults follow the Gemma chat format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnMarkers {
    pub begin: String,
    pub end: String,
    pub start_of_turn: String,
    pub end_of_turn: String,
}

impl Default for TurnMarkers {
    fn default() -> Self {
        Self {
            begin: "<bos>".to_string(),
            end: "<eos>".to_string(),
            start_of_turn: "<start_of_turn>".to_string(),
            end_of_turn: "<end_of_turn>".to_string(),
        }
    }
}

impl TurnMarkers {
    /// Parse a raw log into a [`Transcript`].
    pub fn parse(&self, raw: &str) -> Result<Transcript, TranscriptError> {
        Cursor {
            input: raw,
            pos: 0,
            markers: self,
        }
        .document()
    }

    /// Render a single user turn followed by an open model turn, ready for generation.
    pub fn render_prompt(&self, user_content: &str) -> String {
        format!(
            "{begin}{sot}{user}\n{user_content}{eot}\n{sot}{model}\n",
            begin = self.begin,
            sot = self.start_of_turn,
            eot = self.end_of_turn,
            user = Role::User.as_str(),
            model = Role::Model.as_str(),
        )
    }
}

/// Parse a raw log using the default markers.
pub fn parse_transcript(raw: &str) -> Result<Transcript, TranscriptError> {
    TurnMarkers::default().parse(raw)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    markers: &'a TurnMarkers,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn skip_blanks(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches([' ', '\t']).len();
    }

    /// Consume `token` if the input continues with it. Empty tokens never match.
    fn eat(&mut self, token: &str) -> bool {
        if !token.is_empty() && self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn document(mut self) -> Result<Transcript, TranscriptError> {
        let markers = self.markers;
        loop {
            self.skip_whitespace();
            if !self.eat(&markers.begin) {
                break;
            }
        }

        let mut turns = Vec::new();
        loop {
            self.skip_whitespace();
            if !self.eat(&markers.start_of_turn) {
                break;
            }
            turns.push(self.turn()?);
        }

        self.skip_whitespace();
        self.eat(&markers.end);
        self.skip_whitespace();

        if !self.at_end() {
            return Err(TranscriptError::Unexpected {
                offset: self.pos,
                expected: "a turn or the end marker",
            });
        }

        Ok(Transcript { turns })
    }

    fn turn(&mut self) -> Result<Turn, TranscriptError> {
        self.skip_blanks();
        let role = self.role()?;
        self.skip_blanks();

        let mut newlines = 0;
        while self.eat("\r\n") || self.eat("\n") {
            newlines += 1;
        }
        if newlines == 0 {
            return Err(TranscriptError::MissingNewline { offset: self.pos });
        }

        let content = self.content();
        let markers = self.markers;
        self.eat(&markers.end_of_turn);

        Ok(Turn {
            role,
            content: content.to_string(),
        })
    }

    fn role(&mut self) -> Result<Role, TranscriptError> {
        let offset = self.pos;
        let word: &str = {
            let rest = self.rest();
            let len = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            &rest[..len]
        };

        let role = match word {
            "user" => Role::User,
            "model" => Role::Model,
            _ => {
                return Err(TranscriptError::UnknownRole {
                    offset,
                    role: word.to_string(),
                })
            }
        };
        self.pos += word.len();
        Ok(role)
    }

    /// Lazily capture text up to the first structural marker.
    fn content(&mut self) -> &'a str {
        let rest = self.rest();
        let markers = self.markers;
        let stop = [&markers.end_of_turn, &markers.start_of_turn, &markers.end]
            .into_iter()
            .filter(|marker| !marker.is_empty())
            .filter_map(|marker| rest.find(marker.as_str()))
            .min()
            .unwrap_or(rest.len());

        self.pos += stop;
        &rest[..stop]
    }
}
