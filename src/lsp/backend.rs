//! The `tower_lsp::LanguageServer` implementation (components C1/C2):
//! wires the document registry, per-document workers, workspace index,
//! feature handlers, and cancellation registry into the handlers the wire
//! protocol actually dispatches to.
//!
//! One struct holds every shared piece of state; one method per LSP
//! request/notification; `didOpen` spawns the background workers a
//! document needs (the parser worker and the diagnostics publisher).

use std::sync::Arc;

use tokio::sync::OnceCell;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::request::{GotoDeclarationParams, GotoDeclarationResponse};
use tower_lsp::lsp_types::{
    CompletionItem, CompletionList, CompletionOptions, CompletionParams, CompletionResponse,
    CompletionTextEdit, DeclarationCapability, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentFormattingParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
    GotoDefinitionResponse, InitializeParams, InitializeResult, InitializedParams, MessageType,
    OneOf, Range as LspRange, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextEdit,
};
use tower_lsp::{jsonrpc, Client, LanguageServer};
use tracing::{info, warn};

use crate::cancel::CancellationRegistry;
use crate::config::{ServerConfig, WorkspaceConfig};
use crate::document::DocumentId;
use crate::error::ServerError;
use crate::index::WorkspaceIndex;
use crate::lsp::features::{completion, definition, formatting, symbols};
use crate::metrics::{metrics, TimingGuard};
use crate::position::from_lsp;
use crate::registry::DocumentRegistry;

/// The `tower_lsp::LanguageServer` for this dialect. Holds every piece of
/// shared state a request handler might need: the open-document registry
/// (C3), the workspace index (C6, built once in `initialize`), and the
/// cancellation registry (C8) alongside tower-lsp's own task-abort-based
/// cancellation.
pub struct BuildBackend {
    client: Client,
    config: ServerConfig,
    registry: DocumentRegistry,
    index: OnceCell<Arc<WorkspaceIndex>>,
    #[allow(dead_code)] // reserved for a future cooperative-cancellation hookup; see cancel.rs's own doc comment.
    cancellation: CancellationRegistry,
    rescan_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl BuildBackend {
    pub fn new(client: Client, config: ServerConfig) -> Self {
        Self {
            client,
            config,
            registry: DocumentRegistry::new(),
            index: OnceCell::new(),
            cancellation: CancellationRegistry::new(),
            rescan_handle: std::sync::Mutex::new(None),
        }
    }

    /// The workspace index, once `initialize` has built it. Every feature
    /// handler goes through this rather than touching the `OnceCell`
    /// directly, so a request that somehow arrives before `initialize`
    /// completes (a misbehaving client) fails cleanly instead of panicking.
    fn index(&self) -> jsonrpc::Result<Arc<WorkspaceIndex>> {
        self.index
            .get()
            .cloned()
            .ok_or_else(|| ServerError::InvariantViolation("workspace index not yet built".into()).into())
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for BuildBackend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!("initialize: root_uri = {:?}", params.root_uri);

        let workspace = WorkspaceConfig::from_initialize(
            params.root_uri.as_ref(),
            params.workspace_folders.as_deref(),
        );
        let root = workspace.map(|w| w.root).unwrap_or_else(std::env::temp_dir);

        // `build_empty` only extracts the bundled builtin stubs — cheap
        // enough to run inline. The whole-graph walk happens in the
        // background rescan loop below, so this reply never blocks on it
        // (spec: "no query blocks" / "queries return partial data" until
        // that first scan completes).
        let index = WorkspaceIndex::build_empty(root);

        let rescan_handle = index.spawn_rescan_loop(self.config.rescan_interval());
        *self.rescan_handle.lock().unwrap() = Some(rescan_handle);

        self.index
            .set(index)
            .map_err(|_| ServerError::InvariantViolation("initialize called twice".into()))?;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["\"".to_string(), ":".to_string(), "/".to_string()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                declaration_provider: Some(DeclarationCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "buildfile-language-server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("workspace index ready, server initialized");
        self.client.log_message(MessageType::INFO, "buildfile-language-server ready").await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        if let Some(handle) = self.rescan_handle.lock().unwrap().take() {
            handle.abort();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri: DocumentId = params.text_document.uri;
        let index = match self.index() {
            Ok(index) => index,
            Err(_) => {
                warn!(%uri, "didOpen arrived before initialize completed, ignoring");
                return;
            }
        };

        let opened = match self.registry.open(
            uri.clone(),
            params.text_document.language_id,
            params.text_document.text,
            params.text_document.version,
        ) {
            Ok(opened) => opened,
            Err(ServerError::AlreadyOpen(uri)) => {
                warn!(%uri, "didOpen for a document that is already open, ignoring");
                return;
            }
            Err(err) => {
                warn!(%uri, error = %err, "failed to register opened document");
                return;
            }
        };

        let parser_worker = tokio::spawn(crate::parser_worker::run(opened.document.clone()));
        let diagnostics_worker = tokio::spawn(crate::diagnostics::run(
            self.client.clone(),
            opened.document.clone(),
            index,
            opened.ast_ready,
        ));
        self.registry.insert_workers(uri, opened.document, parser_worker, diagnostics_worker);
    }

    async fn did_change(&self, mut params: DidChangeTextDocumentParams) {
        let uri: DocumentId = params.text_document.uri;
        let Some(change) = params.content_changes.pop() else { return };
        if let Err(err) = self.registry.change(&uri, change.text, params.text_document.version).await {
            warn!(%uri, error = %err, "didChange for a document that is not open");
        }
    }

    async fn did_save(&self, _: DidSaveTextDocumentParams) {
        // No-op: the parser worker and diagnostics publisher already react
        // to every `didChange`, so there is nothing left to recompute here.
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri: DocumentId = params.text_document.uri;
        if self.registry.close(&uri).is_ok() {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let _timer = TimingGuard::new("completion");
        metrics().record_completion();
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let document = self.registry.get(&uri)?;
        let index = self.index()?;

        let internal_position = from_lsp(position);
        let Some(line) = document.line(internal_position.line).await else {
            return Ok(None);
        };
        let character = position.character as usize;
        let current_package = index.package_for_uri(&uri);
        let document_dir = uri.to_file_path().ok().and_then(|p| p.parent().map(|p| p.to_path_buf()));

        let completion::CompletionResult { items, is_incomplete } =
            completion::complete(&line, character, &index, &current_package, document_dir.as_deref());
        let items = attach_text_edits(position, items);

        Ok(Some(CompletionResponse::List(CompletionList { is_incomplete, items })))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> LspResult<Option<GotoDefinitionResponse>> {
        let _timer = TimingGuard::new("definition");
        metrics().record_definition();
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let document = self.registry.get(&uri)?;
        let index = self.index()?;

        let module = document.ast().await;
        let current_package = index.package_for_uri(&uri);
        let location = definition::goto_definition(&module, from_lsp(position), &index, &current_package, &uri);
        Ok(location.map(GotoDefinitionResponse::Scalar))
    }

    async fn goto_declaration(&self, params: GotoDeclarationParams) -> LspResult<Option<GotoDeclarationResponse>> {
        // This dialect has no separate declaration/definition distinction
        // (a target's `name = "..."` *is* its declaration), so this
        // forwards to the same lookup `goto_definition` uses.
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let document = self.registry.get(&uri)?;
        let index = self.index()?;

        let module = document.ast().await;
        let current_package = index.package_for_uri(&uri);
        let location = definition::goto_definition(&module, from_lsp(position), &index, &current_package, &uri);
        Ok(location.map(GotoDeclarationResponse::Scalar))
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> LspResult<Option<DocumentSymbolResponse>> {
        let _timer = TimingGuard::new("document_symbol");
        metrics().record_document_symbol();
        let uri = params.text_document.uri;
        let document = self.registry.get(&uri)?;
        let module = document.ast().await;
        Ok(Some(DocumentSymbolResponse::Nested(symbols::document_symbols(&module))))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> LspResult<Option<Vec<TextEdit>>> {
        let _timer = TimingGuard::new("formatting");
        metrics().record_formatting();
        let uri = params.text_document.uri;
        let document = self.registry.get(&uri)?;
        let text = document.text().await;
        match formatting::format(&text) {
            formatting::Formatting::Edits(edits) => Ok(Some(edits)),
            formatting::Formatting::ParseErrors => {
                Err(ServerError::ParseError(format!("{uri} has parse errors, refusing to format")).into())
            }
        }
    }
}

/// Wraps each raw completion item in a zero-width `TextEdit` at the
/// request position, inserting only the text the user hasn't typed yet
/// (`item.insert_text`, set per-branch in `features::completion`) rather
/// than replacing what's already on the line. This is what "completion
/// honesty" means here: the edit's range start is always exactly the
/// cursor position the request named.
fn attach_text_edits(cursor: tower_lsp::lsp_types::Position, items: Vec<CompletionItem>) -> Vec<CompletionItem> {
    let range = LspRange { start: cursor, end: cursor };
    items
        .into_iter()
        .map(|mut item| {
            let new_text = item.insert_text.clone().unwrap_or_else(|| item.label.clone());
            item.text_edit = Some(CompletionTextEdit::Edit(TextEdit { range, new_text }));
            item
        })
        .collect()
}
