//! Configuration split in two: flags fixed at process startup
//! ([`ServerConfig`], via `clap`) versus values only known once the
//! client's `initialize` request arrives ([`WorkspaceConfig`]).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::index::DEFAULT_RESCAN_INTERVAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Read/write LSP frames over stdin/stdout. The default, and the only
    /// mode most editors ever launch the server in.
    Stdio,
    /// Listen on a TCP port instead, for editors that prefer to dial out
    /// to a running server rather than spawn one.
    Socket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Process-wide flags, parsed once at startup.
#[derive(Debug, Parser)]
#[command(name = "buildfile-lsp", about = "Language server for BUILD files")]
pub struct ServerConfig {
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Port to listen on when `--transport socket` is selected.
    #[arg(long, default_value_t = 9257)]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Disable ANSI color codes in log output (most editors pipe the
    /// server's stderr somewhere that doesn't render them).
    #[arg(long)]
    pub no_color: bool,

    /// Seconds between background workspace rescans.
    #[arg(long, default_value_t = DEFAULT_RESCAN_INTERVAL.as_secs())]
    pub rescan_interval_secs: u64,
}

impl ServerConfig {
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs.max(1))
    }
}

/// Derived once from the client's `initialize` request, then fixed for the
/// rest of the session (the workspace index is built once
/// at `initialize`, not re-derived per request).
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl WorkspaceConfig {
    pub fn from_initialize(
        root_uri: Option<&tower_lsp::lsp_types::Url>,
        workspace_folders: Option<&[tower_lsp::lsp_types::WorkspaceFolder]>,
    ) -> Option<Self> {
        let uri = root_uri.cloned().or_else(|| workspace_folders?.first().map(|f| f.uri.clone()))?;
        uri.to_file_path().ok().map(|root| Self { root })
    }
}
