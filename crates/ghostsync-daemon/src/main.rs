//! ghostsync - GhostText server.
//!
//! Listens for the browser extension on the discovery port and opens every
//! handed-off text field in an external editor.

use clap::Parser;
use ghostsync_core::host::{ExternalEditorConfig, ExternalEditorHost};
use ghostsync_core::SessionConfig;
use ghostsync_http::{ServerConfig, DEFAULT_PORT};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ghostsync", version, about = "Edit browser text fields in your local editor")]
struct Args {
    /// Interface to listen on
    #[arg(long, env = "GHOSTSYNC_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Discovery port the browser extension queries
    #[arg(short, long, env = "GHOSTSYNC_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Editor command; must block until the file is closed (e.g. "code --wait").
    /// Defaults to $VISUAL, then $EDITOR.
    #[arg(short, long, env = "GHOSTSYNC_EDITOR")]
    editor: Option<String>,

    /// Quiet window before a local edit is sent back, in milliseconds
    #[arg(long, default_value_t = 50)]
    debounce_ms: u64,

    /// Seconds an unclaimed session channel stays open
    #[arg(long, default_value_t = 60)]
    idle_timeout_secs: u64,

    /// How often the edited file is checked for changes, in milliseconds
    #[arg(long, default_value_t = 200)]
    poll_ms: u64,

    /// Write a wire transcript per session into this directory
    #[arg(long)]
    transcript_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            channel_idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            session: SessionConfig {
                debounce_window: Duration::from_millis(self.debounce_ms),
                transcript_dir: self.transcript_dir.clone(),
            },
        }
    }
}

/// Pick the editor command: flag, then $VISUAL, then $EDITOR.
fn resolve_editor(
    flag: Option<String>,
    visual: Option<String>,
    editor: Option<String>,
) -> Option<String> {
    [flag, visual, editor]
        .into_iter()
        .flatten()
        .find(|cmd| !cmd.trim().is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let Some(editor) = resolve_editor(
        args.editor.clone(),
        std::env::var("VISUAL").ok(),
        std::env::var("EDITOR").ok(),
    ) else {
        log::error!("No editor configured; pass --editor or set $VISUAL / $EDITOR");
        return ExitCode::FAILURE;
    };
    log::info!("Opening sessions with '{}'", editor);

    let host = Arc::new(ExternalEditorHost::new(
        ExternalEditorConfig::new(editor).poll_interval(Duration::from_millis(args.poll_ms)),
    ));

    let mut server = match ghostsync_http::start(args.server_config(), host).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
    }
    log::info!(
        "Shutting down with {} active session(s)",
        server.active_sessions()
    );
    server.stop().await;

    ExitCode::SUCCESS
}
