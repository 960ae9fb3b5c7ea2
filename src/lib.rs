#![recursion_limit = "256"]

pub mod ast;
pub mod cancel;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod format;
pub mod index;
pub mod label;
pub mod logging;
pub mod lsp;
pub mod metrics;
pub mod parser;
pub mod parser_worker;
pub mod position;
pub mod registry;
