//! Docent - grounded question answering over a single policy document
//!
//! This crate provides an HTTP service that fetches a remote document,
//! throttles callers, grounds a language model on the document text and
//! returns formatted answers.

pub mod chat;
pub mod completion;
pub mod config;
pub mod error;
pub mod format;
pub mod prompt;
pub mod ratelimit;
pub mod server;
pub mod source;

pub use error::{DocentError, ErrorOrigin};
