use crate::lang::{
    ast::File,
    parser::{parse_file, SyntaxError},
    span::LineIndex,
};
use crate::lsp::text::position_to_offset;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tower_lsp_server::lsp_types::{Position, Uri};

/// The open-file snapshot: last didOpen/didChange/didSave content per URI.
#[derive(Default)]
pub struct Snapshot {
    files: DashMap<String, Arc<GnoFile>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<GnoFile>> {
        self.files.get(path).map(|entry| entry.value().clone())
    }

    pub fn set(&self, path: String, file: GnoFile) {
        self.files.insert(path, Arc::new(file));
    }

    pub fn remove(&self, path: &str) {
        self.files.remove(path);
    }
}

/// One open gno file.
#[derive(Clone, Debug)]
pub struct GnoFile {
    pub uri: Uri,
    pub src: String,
}

#[derive(Debug, Error)]
#[error("cannot parse gno file: {0}")]
pub struct ParseFailure(pub String);

/// A parsed gno file. Transient: reparsed per query, never cached.
pub struct ParsedGnoFile {
    pub file: File,
    pub errors: Vec<SyntaxError>,
    pub index: LineIndex,
}

impl GnoFile {
    pub fn new(uri: Uri, src: String) -> Self {
        Self { uri, src }
    }

    /// Byte offset of an LSP position, per the snapshot's counting rules.
    pub fn offset(&self, position: Position) -> usize {
        position_to_offset(&self.src, position)
    }

    /// Parse, keeping a partial AST on recoverable errors.
    pub fn parse(&self) -> Result<ParsedGnoFile, ParseFailure> {
        match parse_file(&self.src) {
            Ok(result) => Ok(ParsedGnoFile {
                file: result.file,
                errors: result.errors,
                index: LineIndex::new(&self.src),
            }),
            Err(errors) => Err(ParseFailure(
                errors
                    .errors
                    .first()
                    .map(|err| err.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Uri {
        "file:///tmp/a.gno".parse().unwrap()
    }

    #[test]
    fn snapshot_replaces_content_whole() {
        let snapshot = Snapshot::new();
        snapshot.set("/tmp/a.gno".into(), GnoFile::new(uri(), "package a\n".into()));
        snapshot.set("/tmp/a.gno".into(), GnoFile::new(uri(), "package b\n".into()));
        let file = snapshot.get("/tmp/a.gno").expect("file");
        assert_eq!(file.src, "package b\n");
        snapshot.remove("/tmp/a.gno");
        assert!(snapshot.get("/tmp/a.gno").is_none());
    }

    #[test]
    fn parse_keeps_partial_ast() {
        let file = GnoFile::new(uri(), "package demo\n\nfunc f() {\n\tufmt.\n}\n".into());
        let parsed = file.parse().expect("partial parse");
        assert!(!parsed.errors.is_empty());
        assert_eq!(parsed.file.package.name, "demo");
    }

    #[test]
    fn parse_without_package_clause_fails() {
        let file = GnoFile::new(uri(), "func f() {}\n".into());
        assert!(file.parse().is_err());
    }
}
