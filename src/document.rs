//! A single open document and the shared state its parser worker and
//! diagnostics publisher coordinate through.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use ropey::Rope;
use tokio::sync::{mpsc, watch, RwLock};
use tower_lsp::lsp_types::Url;

use crate::ast::Module;

/// Uniquely identifies an open document for the lifetime of the session.
/// We key on the URI directly rather than minting our own IDs, mirroring
/// the wire protocol — there is exactly one document per URI open at a
/// time.
pub type DocumentId = Url;

/// Bound on the AST-ready notification channel. A slow diagnostics
/// consumer can fall behind by at most this many revisions before the
/// parser worker's `send` starts applying backpressure; since only the
/// latest AST ever matters (`ast_tx` carries notifications, not payloads)
/// a small bound is enough to avoid unbounded growth without ever blocking
/// in practice.
pub const AST_READY_CHANNEL_CAPACITY: usize = 8;

/// Everything kept about one open document.
pub struct Document {
    pub uri: DocumentId,
    pub language_id: String,
    text: RwLock<Rope>,
    version: AtomicI32,
    ast: RwLock<Arc<Module>>,
    /// The parser worker's view of "latest text to parse": a `watch`
    /// channel rather than a queue, because only the newest value is ever
    /// worth parsing — superseded keystrokes should be coalesced away, not
    /// queued up behind a backlog of stale parses.
    latest_text: watch::Sender<String>,
    ast_ready_tx: mpsc::Sender<()>,
}

impl Document {
    pub fn new(uri: DocumentId, language_id: String, text: String, version: i32) -> (Self, AstReadyReceiver) {
        let (latest_text, _) = watch::channel(text.clone());
        let (ast_ready_tx, ast_ready_rx) = mpsc::channel(AST_READY_CHANNEL_CAPACITY);
        let doc = Self {
            uri,
            language_id,
            text: RwLock::new(Rope::from_str(&text)),
            version: AtomicI32::new(version),
            ast: RwLock::new(Arc::new(Module::default())),
            latest_text,
            ast_ready_tx,
        };
        (doc, ast_ready_rx)
    }

    pub fn version(&self) -> i32 {
        self.version.load(Ordering::Acquire)
    }

    pub async fn text(&self) -> String {
        self.text.read().await.to_string()
    }

    pub async fn line(&self, line: u32) -> Option<String> {
        let rope = self.text.read().await;
        let idx = line.checked_sub(1)? as usize;
        if idx >= rope.len_lines() {
            return None;
        }
        Some(rope.line(idx).to_string())
    }

    pub async fn ast(&self) -> Arc<Module> {
        self.ast.read().await.clone()
    }

    /// Applies a full-text replacement. This dialect's documents are small
    /// enough, and edits frequent enough mid-keystroke, that incremental-edit
    /// bookkeeping is not worth carrying — the client syncs full document
    /// contents and we re-lex from scratch.
    pub async fn replace_text(&self, new_text: String, new_version: i32) {
        *self.text.write().await = Rope::from_str(&new_text);
        self.version.store(new_version, Ordering::Release);
        // Only the most recent text matters to the parser worker; an
        // unreceived prior value is simply overwritten.
        let _ = self.latest_text.send(new_text);
    }

    pub fn watch_text(&self) -> watch::Receiver<String> {
        self.latest_text.subscribe()
    }

    pub async fn set_ast(&self, module: Module) {
        *self.ast.write().await = Arc::new(module);
        let _ = self.ast_ready_tx.try_send(());
    }
}

pub type AstReadyReceiver = mpsc::Receiver<()>;
