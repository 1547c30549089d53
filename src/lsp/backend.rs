use crate::env::Env;
use crate::lsp::cache::Cache;
use crate::lsp::check::{get_package_info, TypeCheck};
use crate::lsp::completion::{completion, CompletionStore};
use crate::lsp::definition::definition;
use crate::lsp::diagnostics::{diagnostics_for_file, transpile_and_build};
use crate::lsp::hover::hover;
use crate::lsp::packages::{package_from_dir, Package};
use crate::lsp::snapshot::{GnoFile, ParsedGnoFile, Snapshot};
use crate::lsp::text::url_to_path;
use crate::tools::FormattingOption;
use crate::version;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_lsp_server::jsonrpc::{Error as RpcError, Result as RpcResult};
use tower_lsp_server::lsp_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentFormattingParams, ExecuteCommandOptions, ExecuteCommandParams, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
    InitializeResult, InitializedParams, MessageType, OneOf, Position, Range, SaveOptions,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, TextEdit, Uri,
};
use tower_lsp_server::{Client, LanguageServer};
use tracing::{info, warn};

pub struct Backend {
    client: Client,
    env: Env,
    snapshot: Snapshot,
    cache: Cache,
    completion_store: Arc<CompletionStore>,
    format_opt: FormattingOption,
    /// Single writer per package directory.
    update_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Backend {
    pub fn new(client: Client, env: Env, completion_store: Arc<CompletionStore>) -> Self {
        Self {
            client,
            env,
            snapshot: Snapshot::new(),
            cache: Cache::new(),
            completion_store,
            format_opt: FormattingOption::Strict,
            update_locks: DashMap::new(),
        }
    }

    fn snapshot_missing() -> RpcError {
        RpcError::invalid_params("snapshot not found")
    }

    /// Re-index and re-check one package directory, replacing its cache
    /// entry. Serialized per directory so a later save cannot be
    /// overwritten by an earlier one.
    async fn update_cache(&self, pkg_path: &str) {
        let lock = self
            .update_locks
            .entry(pkg_path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        match build_package(&self.env, pkg_path) {
            Ok(pkg) => self.cache.set(pkg_path.to_string(), pkg),
            Err(message) => warn!("cache update for {pkg_path} failed: {message}"),
        }
    }

    async fn publish_diagnostics(&self, file: &GnoFile) {
        let errors = match transpile_and_build(&self.env, file) {
            Ok(errors) => errors,
            Err(err) => {
                // Tool failures stay out of the editor; log and move on.
                warn!("diagnostics run failed: {err}");
                return;
            }
        };
        let (uri, diagnostics) = diagnostics_for_file(file, &errors);
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }

    /// Snapshot + parse + cached package for a query URI.
    fn query_context(
        &self,
        uri: &Uri,
    ) -> RpcResult<(Arc<GnoFile>, ParsedGnoFile, Option<Arc<Package>>)> {
        let path = url_to_path(uri).ok_or_else(Self::snapshot_missing)?;
        let path_str = path.to_string_lossy().to_string();
        let file = self.snapshot.get(&path_str).ok_or_else(Self::snapshot_missing)?;
        let parsed = file
            .parse()
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;
        let pkg = path
            .parent()
            .and_then(|dir| self.cache.get(&dir.to_string_lossy()));
        Ok((file, parsed, pkg))
    }
}

/// Index + type-check one directory. Fully synchronous; the importer's
/// memo cache lives only for this update.
fn build_package(env: &Env, pkg_path: &str) -> Result<Package, String> {
    let mut pkg =
        package_from_dir(Path::new(pkg_path), false).map_err(|err| err.to_string())?;
    let info = get_package_info(pkg_path, env).map_err(|err| err.to_string())?;
    let tc = TypeCheck::new(env.clone());
    pkg.type_check = Some(tc.check(&info));
    Ok(pkg)
}

impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> RpcResult<InitializeResult> {
        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "gnopls".into(),
                version: Some(version::VERSION.into()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".into()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec!["gnopls.version".into()],
                    work_done_progress_options: Default::default(),
                }),
                document_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("initialized");
        let _ = self
            .client
            .log_message(MessageType::INFO, "gnopls ready")
            .await;
    }

    async fn shutdown(&self) -> RpcResult<()> {
        info!("shutdown");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(path) = url_to_path(&uri) else {
            return;
        };
        let path_str = path.to_string_lossy().to_string();
        info!("open {path_str}");
        let file = GnoFile::new(uri, params.text_document.text);
        self.snapshot.set(path_str, file.clone());
        if let Some(dir) = path.parent() {
            self.update_cache(&dir.to_string_lossy()).await;
        }
        self.publish_diagnostics(&file).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(path) = url_to_path(&uri) else {
            return;
        };
        let path_str = path.to_string_lossy().to_string();
        if self.snapshot.get(&path_str).is_none() {
            warn!("change for unopened {path_str}");
            return;
        }
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        info!("change {path_str}");
        self.snapshot.set(path_str, GnoFile::new(uri, change.text));
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(path) = url_to_path(&uri) else {
            return;
        };
        let path_str = path.to_string_lossy().to_string();
        let file = match params.text {
            Some(text) => {
                let file = GnoFile::new(uri, text);
                self.snapshot.set(path_str.clone(), file.clone());
                file
            }
            None => match self.snapshot.get(&path_str) {
                Some(file) => (*file).clone(),
                None => {
                    warn!("save for unopened {path_str}");
                    return;
                }
            },
        };
        info!("save {path_str}");
        if let Some(dir) = path.parent() {
            self.update_cache(&dir.to_string_lossy()).await;
        }
        self.publish_diagnostics(&file).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(path) = url_to_path(&uri) {
            info!("close {}", path.display());
            self.snapshot.remove(&path.to_string_lossy());
        }
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let (file, parsed, pkg) = self.query_context(&uri)?;
        info!("hover line={} char={}", position.line, position.character);
        Ok(hover(
            &file,
            &parsed,
            pkg.as_deref(),
            &self.completion_store,
            position,
        ))
    }

    async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let (file, parsed, pkg) = self.query_context(&uri)?;
        Ok(completion(
            &file,
            &parsed,
            pkg.as_deref(),
            &self.completion_store,
            position,
        )
        .map(CompletionResponse::Array))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> RpcResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let (file, parsed, pkg) = self.query_context(&uri)?;
        info!("definition line={} char={}", position.line, position.character);
        Ok(definition(
            &file,
            &parsed,
            pkg.as_deref(),
            &self.completion_store,
            position,
        )
        .map(GotoDefinitionResponse::Scalar))
    }

    async fn formatting(
        &self,
        params: DocumentFormattingParams,
    ) -> RpcResult<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        let path = url_to_path(&uri).ok_or_else(Self::snapshot_missing)?;
        let file = self
            .snapshot
            .get(&path.to_string_lossy())
            .ok_or_else(Self::snapshot_missing)?;
        let formatted = crate::tools::format(file.src.as_bytes(), self.format_opt)
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;
        info!("format {}", path.display());
        Ok(Some(vec![TextEdit {
            range: Range {
                start: Position::new(0, 0),
                end: Position::new(u32::MAX, u32::MAX),
            },
            new_text: String::from_utf8_lossy(&formatted).to_string(),
        }]))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> RpcResult<Option<Value>> {
        match params.command.as_str() {
            "gnopls.version" => Ok(Some(json!(version::VERSION))),
            other => {
                warn!("unknown command {other}");
                Ok(None)
            }
        }
    }
}
