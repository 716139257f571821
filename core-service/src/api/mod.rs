//! API Module
//!
//! Newline-delimited JSON command protocol spoken by the binary over
//! stdin/stdout. One command per line, one response per line.

pub mod commands;

pub use commands::{handle_line, Command, Response};
