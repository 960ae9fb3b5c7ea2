//! Feature handlers (component C7): pure-ish functions taking a document's
//! current AST/text plus the workspace index and returning an LSP
//! response, with no knowledge of the wire protocol's dispatch machinery.
//! One file per capability, each walking [`crate::ast`] directly.

pub mod completion;
pub mod definition;
pub mod formatting;
pub mod symbols;
