//! `mailgist` turns a raw email into a typed summary: a category with
//! per-category scores plus the fields extracted for that category.
//!
//! The email is reduced to a canonical plain-text rendering, a generative
//! backend scores it against a fixed set of categories, and the winning
//! category's extraction prompt pulls out the details. Every backend answer
//! is checked against a schema and retried a bounded number of times.
//!
//! ```no_run
//! use mailgist::backend;
//! use mailgist::config::load_config;
//! use mailgist::router::Interpreter;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = load_config();
//! let backend = backend::from_config(&config, None)?;
//! let raw = std::fs::read("invoice.eml")?;
//! let result = Interpreter::new(backend).interpret(&raw)?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod generation;
pub mod model;
pub mod parser;
pub mod prompts;
pub mod router;

pub use error::{Error, Result};
pub use router::Interpreter;
