//! prologtest Language Server binary entry point
//!
//! Run with: prologtest-lsp
//!
//! The LSP communicates via stdin/stdout using the Language Server Protocol, so logs go to stderr.

use tower_lsp::Server;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = prologtest::lsp::service();

    // Run server
    Server::new(stdin, stdout, socket).serve(service).await;
}
