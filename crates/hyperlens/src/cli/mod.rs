//! CLI module for Hyperlens
//!
//! One-shot commands (`discover`, `inspect`, `export`), the prompt-driven
//! `interactive` browser, the `serve` web service and `config`.

pub mod error;
pub mod output;

pub mod context;
pub mod prompt;

pub mod config;
pub mod discover;
pub mod export;
pub mod inspect;
pub mod interactive;
pub mod serve;

pub use context::CommandContext;
