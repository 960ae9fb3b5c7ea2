use clap::Parser;
use tokio::net::TcpListener;
use tower_lsp::{LspService, Server};
use tracing::info;

use buildfile_language_server::config::{ServerConfig, Transport};
use buildfile_language_server::lsp::backend::BuildBackend;
use buildfile_language_server::logging::init_logger;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = ServerConfig::parse();
    init_logger(config.no_color, Some(config.log_level.as_filter_str()))?;

    info!(transport = ?config.transport, "starting buildfile-language-server");

    match config.transport {
        Transport::Stdio => run_stdio(config).await,
        Transport::Socket => run_socket(config).await,
    }
}

async fn run_stdio(config: ServerConfig) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(move |client| BuildBackend::new(client, config));
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}

/// Listens on `--port` and serves exactly one client connection: one TCP
/// server per editor window is the norm for this transport, not a
/// long-lived multi-client daemon.
async fn run_socket(config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!(port = config.port, "listening for a single LSP client connection");
    let (stream, peer) = listener.accept().await?;
    info!(%peer, "accepted LSP client connection");

    let (read, write) = stream.into_split();
    let (service, socket) = LspService::new(move |client| BuildBackend::new(client, config));
    Server::new(read, write, socket).serve(service).await;
    Ok(())
}
