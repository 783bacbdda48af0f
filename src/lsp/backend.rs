//! LSP (Language Server Protocol) backend for prologtest
//!
//! Text synchronisation keeps the test tree current; custom requests expose it to the editor's test explorer:
//!
//! - `prologtest/resolve { id? }` returns the children of a node (the root suites when `id` is absent)
//! - `prologtest/run { include? }` runs the included nodes (everything when absent) and returns the report
//! - `prologtest/cancel` stops the active run
//! - `prologtest/reload` rediscovers the workspace and returns the root suites
//!
//! While a run executes, the server sends `prologtest/testStarted` and `prologtest/testFinished` notifications.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::{self, Result};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::Config;
use crate::engine::{
    CancellationFlag, EngineError, FileDiscovery, Outcome, RunObserver, RunOptions, RunReport, RunScope,
    TestController, TestNode, WorkItem,
};
use crate::lsp::diagnostics::file_diagnostics;
use crate::version::PROLOGTEST_VERSION;

// ============================================================================
// Custom protocol
// ============================================================================

pub const RESOLVE_METHOD: &str = "prologtest/resolve";
pub const RUN_METHOD: &str = "prologtest/run";
pub const CANCEL_METHOD: &str = "prologtest/cancel";
pub const RELOAD_METHOD: &str = "prologtest/reload";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveParams {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    /// Node identifiers to run. Everything when absent.
    #[serde(default)]
    pub include: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStartedParams {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFinishedParams {
    pub id: String,
    /// `passed` or `failed`.
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub enum TestStarted {}

impl Notification for TestStarted {
    type Params = TestStartedParams;
    const METHOD: &'static str = "prologtest/testStarted";
}

pub enum TestFinished {}

impl Notification for TestFinished {
    type Params = TestFinishedParams;
    const METHOD: &'static str = "prologtest/testFinished";
}

/// Run progress on its way to the client.
#[derive(Debug)]
enum RunEvent {
    Started(TestStartedParams),
    Finished(TestFinishedParams),
}

/// Forwards run progress to a task that owns the client side of the connection.
struct NotifyingObserver {
    events: mpsc::UnboundedSender<RunEvent>,
}

impl RunObserver for NotifyingObserver {
    fn on_test_started(&mut self, item: &WorkItem) {
        let _ = self.events.send(RunEvent::Started(TestStartedParams {
            id: item.id.to_string(),
        }));
    }

    fn on_test_finished(&mut self, item: &WorkItem, outcome: &Outcome) {
        let (status, message) = match outcome {
            Outcome::Passed => ("passed", None),
            Outcome::Failed { message } => ("failed", Some(message.clone())),
        };
        let _ = self.events.send(RunEvent::Finished(TestFinishedParams {
            id: item.id.to_string(),
            outcome: status.to_string(),
            message,
        }));
    }
}

// ============================================================================
// Server
// ============================================================================

/// prologtest Language Server
pub struct PrologTestServer {
    client: Client,
    /// Created by `initialize` once the workspace roots are known.
    controller: OnceLock<Arc<TestController>>,
}

impl PrologTestServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            controller: OnceLock::new(),
        }
    }

    fn controller(&self) -> Result<&Arc<TestController>> {
        self.controller.get().ok_or_else(|| jsonrpc::Error {
            code: jsonrpc::ErrorCode::ServerError(-32002),
            message: "server not initialized".into(),
            data: None,
        })
    }

    /// `prologtest/resolve`
    pub async fn resolve(&self, params: ResolveParams) -> Result<Vec<TestNode>> {
        self.controller()?.resolve(params.id.as_deref()).await.map_err(internal_error)
    }

    /// `prologtest/run`
    pub async fn run_tests(&self, params: RunParams) -> Result<RunReport> {
        let controller = Arc::clone(self.controller()?);
        let scope = match params.include {
            Some(ids) => RunScope::Many(ids),
            None => RunScope::All,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    RunEvent::Started(params) => client.send_notification::<TestStarted>(params).await,
                    RunEvent::Finished(params) => client.send_notification::<TestFinished>(params).await,
                }
            }
        });

        let mut observer = NotifyingObserver { events: tx };
        let result = controller
            .run(&scope, &RunOptions::default(), &CancellationFlag::new(), &mut observer)
            .await;
        drop(observer);
        // All progress notifications go out before the response.
        let _ = forwarder.await;

        result.map_err(internal_error)
    }

    /// `prologtest/cancel`
    pub async fn cancel(&self) {
        if let Ok(controller) = self.controller() {
            if !controller.cancel() {
                tracing::debug!("cancel requested without an active run");
            }
        }
    }

    /// `prologtest/reload`
    pub async fn reload(&self) -> Result<Vec<TestNode>> {
        let controller = self.controller()?;
        let summary = controller.reload().await.map_err(internal_error)?;
        for found in &summary.files {
            self.publish(found).await;
        }
        Ok(controller.snapshot().await.to_nodes())
    }

    async fn publish(&self, found: &FileDiscovery) {
        if let Ok(uri) = Url::from_file_path(&found.path) {
            self.client.publish_diagnostics(uri, file_diagnostics(found), None).await;
        }
    }

    /// Reconcile an edited buffer and publish its warnings.
    async fn document_edited(&self, uri: &Url, text: &str, version: Option<i32>) {
        let (Ok(controller), Ok(path)) = (self.controller(), uri.to_file_path()) else {
            return;
        };
        match controller.on_document_edited(&path, text).await {
            Ok(Some(found)) => {
                self.client
                    .publish_diagnostics(uri.clone(), file_diagnostics(&found), version)
                    .await;
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("{}", err),
        }
    }

    /// Reconcile a document from disk and publish its warnings.
    async fn document_changed(&self, uri: &Url) {
        let (Ok(controller), Ok(path)) = (self.controller(), uri.to_file_path()) else {
            return;
        };
        match controller.on_document_changed(&path).await {
            Ok(Some(found)) => self.publish(&found).await,
            Ok(None) => {}
            // Deleted or unreadable: its suites are gone, so are its diagnostics.
            Err(EngineError::Read { .. }) => self.client.publish_diagnostics(uri.clone(), Vec::new(), None).await,
            Err(err) => tracing::warn!("{}", err),
        }
    }
}

fn internal_error(err: EngineError) -> jsonrpc::Error {
    jsonrpc::Error {
        code: jsonrpc::ErrorCode::InternalError,
        message: err.to_string().into(),
        data: None,
    }
}

/// Workspace roots announced by the client, preferring workspace folders over the legacy root URI.
#[allow(deprecated)]
fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
    let from_folders: Vec<PathBuf> = params
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|folder| folder.uri.to_file_path().ok())
        .collect();
    if !from_folders.is_empty() {
        return from_folders;
    }
    params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok())
        .into_iter()
        .collect()
}

fn load_config(roots: &[PathBuf]) -> Config {
    let loaded = match roots.first() {
        Some(root) => Config::load(root),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.validate().map(|()| config)
        }
    };
    loaded.unwrap_or_else(|err| {
        tracing::warn!("{}; using defaults", err);
        Config::default()
    })
}

#[tower_lsp::async_trait]
impl LanguageServer for PrologTestServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let roots = workspace_roots(&params);
        let config = load_config(&roots);
        tracing::info!(roots = roots.len(), interpreter = %config.interpreter.program, "initializing");

        let controller = Arc::new(TestController::with_defaults(roots, &config));
        if self.controller.set(controller).is_err() {
            tracing::warn!("initialize received twice; keeping the first workspace");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                })),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "prologtest-lsp".to_string(),
                version: Some(PROLOGTEST_VERSION.to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "prologtest LSP initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(controller) = self.controller.get() {
            controller.dispose().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.document_edited(&doc.uri, &doc.text, Some(doc.version)).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // We use FULL sync, so there's only one change with the full content
        if let Some(change) = params.content_changes.into_iter().next() {
            self.document_edited(&uri, &change.text, Some(version)).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.document_changed(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        // Unsaved edits are dropped; fall back to the file on disk.
        self.document_changed(&params.text_document.uri).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            self.document_changed(&change.uri).await;
        }
    }
}
