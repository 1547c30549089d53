use super::backend::Backend;
use super::completion::CompletionStore;
use crate::env::Env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tower_lsp_server::{LspService, Server};
use tracing::info;

/// Serve LSP over stdin/stdout until the client disconnects.
///
/// The completion store is built up front from the language roots; it is
/// immutable afterwards and shared by all handlers.
pub fn serve_stdio(env: Env) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if !env.gnoroot.is_empty() {
        dirs.push(Path::new(&env.gnoroot).join("examples"));
        dirs.push(Path::new(&env.gnoroot).join("gnovm/stdlibs"));
    }
    let store = Arc::new(CompletionStore::init(&dirs));
    info!("completion store holds {} packages", store.len());

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let (service, socket) =
            LspService::new(move |client| Backend::new(client, env.clone(), store.clone()));
        Server::new(stdin, stdout, socket).serve(service).await;
        Ok(())
    })
}
