//! The per-document parser task (component C4): wakes on every change to
//! a document's `watch<String>` of latest text, reparses, and publishes
//! the result back onto the document.
//!
//! Subscribes to the latest text, reparses on wake, never falls behind:
//! a `watch` channel rather than an `mpsc` queue, so that a burst of
//! keystrokes collapses to one parse of the final text, not a queue of N
//! parses of N intermediate states.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ast::Module;
use crate::document::Document;

/// Runs until the document's `watch` sender is dropped (i.e. the document
/// is closed and the registry aborts this task — this loop exiting on its
/// own is just a courtesy for the case where abort didn't happen fast
/// enough).
pub async fn run(document: Arc<Document>) {
    let mut rx = document.watch_text();
    loop {
        let text = rx.borrow_and_update().clone();
        let module = parse_recovering(&document.uri, &text);
        document.set_ast(module).await;

        if rx.changed().await.is_err() {
            debug!(uri = %document.uri, "parser worker exiting: document closed");
            return;
        }
    }
}

/// Parses `text`, downgrading a parser panic to a single [`crate::ast::ParseError`]
/// spanning the whole document rather than letting it take the worker task
/// down. The hand-rolled parser is not expected to panic — it is written
/// to recover from malformed input on its own — but a recursive-descent
/// parser driven by untrusted, actively-edited text is exactly the kind of
/// code where "not expected to" and "provably cannot" diverge, so we keep
/// a safety net under it.
fn parse_recovering(uri: &tower_lsp::lsp_types::Url, text: &str) -> Module {
    match std::panic::catch_unwind(AssertUnwindSafe(|| crate::parser::parse(text))) {
        Ok(module) => module,
        Err(_) => {
            warn!(uri = %uri, "parser panicked, falling back to an error-only module");
            let mut module = Module::default();
            let end = crate::position::Position::new(
                text.lines().count().max(1) as u32,
                1,
            );
            module.errors.push(crate::ast::ParseError {
                range: crate::position::Range::point(end),
                message: "internal parser error".to_string(),
            });
            module
        }
    }
}

/// Waits for the next published AST, or returns the current one
/// immediately if a parse has already completed since the caller last
/// checked. Feature handlers that need an up-to-date tree for the text the
/// client just sent call this instead of racing `document.ast()` directly
/// against the worker.
pub async fn await_fresh_ast(document: &Document, ast_ready: &mut watch::Receiver<String>) -> Arc<Module> {
    let _ = ast_ready.changed().await;
    document.ast().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn uri() -> tower_lsp::lsp_types::Url {
        "file:///repo/BUILD".parse().unwrap()
    }

    #[tokio::test]
    async fn reparses_on_text_change_and_converges_on_the_latest_text() {
        let (document, _ast_rx) = Document::new(uri(), "build".into(), "go_library(name = \"a\")\n".into(), 1);
        let document = Arc::new(document);
        let worker = tokio::spawn(run(document.clone()));

        document.replace_text("go_library(name = \"b\")\n".into(), 2).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let module = document.ast().await;
        match &module.statements[0] {
            crate::ast::Stmt::Expr(crate::ast::Expr::Call(call)) => {
                assert_eq!(call.target_name(), Some("b"));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
        worker.abort();
    }

    #[test]
    fn parse_recovering_never_panics_even_on_garbage_input() {
        let uri = uri();
        let module = parse_recovering(&uri, "((([[[{{{\"unterminated");
        // Whatever the parser made of this, the wrapper itself must not unwind.
        let _ = module.statements.len();
    }
}
