use crate::lang::ast::Expr;
use crate::lsp::packages::{list_gno_packages, package_from_dir, Package, SymKind, Symbol};
use crate::lsp::selection::{path_enclosing, type_and_value_at, Node};
use crate::lsp::snapshot::{GnoFile, ParsedGnoFile};
use crate::lang::check::Mode;
use std::path::PathBuf;
use std::sync::Arc;
use tower_lsp_server::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, Position,
};
use tracing::debug;

/// Packages indexed once at startup from the configured roots. Read-only
/// afterwards; the store is shared by every handler without locks.
pub struct CompletionStore {
    pkgs: Vec<Arc<Package>>,
}

impl CompletionStore {
    pub fn empty() -> Self {
        Self { pkgs: Vec::new() }
    }

    /// Walks `dirs` for gno packages and indexes their exported surface.
    pub fn init(dirs: &[PathBuf]) -> Self {
        let mut pkgs = Vec::new();
        for dir in list_gno_packages(dirs) {
            match package_from_dir(&dir, true) {
                Ok(pkg) => pkgs.push(Arc::new(pkg)),
                Err(err) => {
                    debug!("skipping {}: {err}", dir.display());
                }
            }
        }
        Self { pkgs }
    }

    pub fn len(&self) -> usize {
        self.pkgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pkgs.is_empty()
    }

    /// Lookup by short package name. Linear: the store holds hundreds of
    /// packages, not millions.
    pub fn lookup_pkg(&self, name: &str) -> Option<Arc<Package>> {
        self.pkgs.iter().find(|pkg| pkg.name == name).cloned()
    }

    /// Lookup by short name or full import path.
    pub fn lookup_symbol(&self, pkg: &str, symbol: &str) -> Option<Symbol> {
        self.pkgs
            .iter()
            .find(|p| p.name == pkg || p.import_path == pkg)
            .and_then(|p| p.symbol(symbol).cloned())
    }

    pub fn lookup_symbol_by_imports(
        &self,
        symbol: &str,
        imports: &[crate::lang::ast::ImportSpec],
    ) -> Option<Symbol> {
        for spec in imports {
            let last = spec
                .path
                .value
                .rsplit('/')
                .next()
                .unwrap_or(&spec.path.value);
            if let Some(found) = self.lookup_symbol(last, symbol) {
                return Some(found);
            }
        }
        None
    }

    #[cfg(test)]
    pub fn with_packages(pkgs: Vec<Package>) -> Self {
        Self {
            pkgs: pkgs.into_iter().map(Arc::new).collect(),
        }
    }
}

fn symbol_to_kind(kind: SymKind) -> CompletionItemKind {
    match kind {
        SymKind::Const => CompletionItemKind::CONSTANT,
        SymKind::Func => CompletionItemKind::FUNCTION,
        SymKind::Type => CompletionItemKind::CLASS,
        SymKind::Var => CompletionItemKind::VARIABLE,
        SymKind::Struct => CompletionItemKind::STRUCT,
        SymKind::Interface => CompletionItemKind::INTERFACE,
        SymKind::Array | SymKind::Map | SymKind::Chan => CompletionItemKind::VALUE,
    }
}

fn method_items(pkg: &Package, base: &str) -> Option<Vec<CompletionItem>> {
    let methods = pkg.methods.get(base)?;
    Some(
        methods
            .iter()
            .map(|method| CompletionItem {
                label: method.name.clone(),
                insert_text: Some(format!("{}()", method.name)),
                kind: Some(CompletionItemKind::FUNCTION),
                detail: Some(method.signature.clone()),
                documentation: Some(Documentation::String(method.doc.clone())),
                ..Default::default()
            })
            .collect(),
    )
}

/// The completion handler body. Triggered on `.`; completion is computed
/// from what precedes the cursor.
pub fn completion(
    file: &GnoFile,
    parsed: &ParsedGnoFile,
    pkg: Option<&Package>,
    store: &CompletionStore,
    position: Position,
) -> Option<Vec<CompletionItem>> {
    let offset = file.offset(position);
    let line = position.line + 1;

    // No completion inside import path literals.
    for spec in &parsed.file.imports {
        if spec.path.span.contains_inclusive(offset) {
            return None;
        }
    }

    let before = offset.checked_sub(1)?;
    let path = path_enclosing(&parsed.file, before);
    if path.is_empty() {
        return None;
    }

    let pkg = pkg?;
    let info = &pkg.type_check.as_ref()?.info;

    match path.first()? {
        Node::Ident(ident) => {
            let tv = type_and_value_at(info, &ident.name, line, Some(before));
            let Some(tv) = tv else {
                return package_ident_items(parsed, store, &ident.name, true);
            };
            if tv.ty.is_invalid() {
                // Broken expressions still complete, fields only.
                return package_ident_items(parsed, store, &ident.name, false);
            }
            if tv.mode != Mode::Var {
                return None;
            }
            member_items(parsed, pkg, store, &tv.ty.to_string())
        }
        Node::Expr(call @ Expr::Call { .. }) => {
            let tv = type_and_value_at(info, &call.to_string(), line, Some(before))?;
            if tv.ty.is_invalid() {
                return None;
            }
            member_items(parsed, pkg, store, &tv.ty.to_string())
        }
        _ => None,
    }
}

/// Method completions for a value whose type string is `type_str`: local
/// types use the package's own tables, imported ones go through the store.
fn member_items(
    parsed: &ParsedGnoFile,
    pkg: &Package,
    store: &CompletionStore,
    type_str: &str,
) -> Option<Vec<CompletionItem>> {
    if type_str.contains(&pkg.import_path) {
        let base = crate::lsp::hover::parse_type(type_str, &pkg.import_path);
        return method_items(pkg, &base);
    }
    for spec in &parsed.file.imports {
        let path = &spec.path.value;
        if !type_str.contains(path.as_str()) {
            continue;
        }
        let last = path.rsplit('/').next().unwrap_or(path);
        let imported = store.lookup_pkg(last)?;
        let base = crate::lsp::hover::parse_type(type_str, path);
        return method_items(&imported, &base);
    }
    None
}

/// Completions after `pkg.` where `pkg` is an import qualifier: every
/// exported symbol, functions with call-shaped insert text.
fn package_ident_items(
    parsed: &ParsedGnoFile,
    store: &CompletionStore,
    name: &str,
    include_funcs: bool,
) -> Option<Vec<CompletionItem>> {
    for spec in &parsed.file.imports {
        let last = spec
            .path
            .value
            .rsplit('/')
            .next()
            .unwrap_or(&spec.path.value);
        if last != name && spec.local_name() != name {
            continue;
        }
        let pkg = store.lookup_pkg(last)?;
        let mut items = Vec::new();
        if include_funcs {
            for func in &pkg.functions {
                if !func.is_exported() {
                    continue;
                }
                items.push(CompletionItem {
                    label: func.name.clone(),
                    insert_text: Some(format!("{}()", func.name)),
                    kind: Some(CompletionItemKind::FUNCTION),
                    detail: Some(func.signature.clone()),
                    documentation: Some(Documentation::String(func.doc.clone())),
                    ..Default::default()
                });
            }
        }
        for symbol in &pkg.symbols {
            if symbol.kind == SymKind::Func {
                continue;
            }
            if !symbol.name.chars().next().is_some_and(|c| c.is_uppercase()) {
                continue;
            }
            items.push(CompletionItem {
                label: symbol.name.clone(),
                insert_text: Some(symbol.name.clone()),
                kind: Some(symbol_to_kind(symbol.kind)),
                detail: Some(symbol.signature.clone()),
                documentation: Some(Documentation::String(symbol.doc.clone())),
                ..Default::default()
            });
        }
        return Some(items);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::lsp::check::{FileInfo, PackageInfo, TypeCheck};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use tower_lsp_server::lsp_types::Uri;

    const UFMT: &str = "package ufmt\n\n// Sprintf formats.\nfunc Sprintf(format string) string { return format }\n\n// Println prints.\nfunc Println(args string) {}\n\nfunc helper() {}\n\nconst MaxDepth = 8\n";

    fn store_with_ufmt(root: &Path) -> CompletionStore {
        let dir = root.join("examples/gno.land/p/demo/ufmt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ufmt.gno"), UFMT).unwrap();
        fs::write(dir.join("gno.mod"), "module gno.land/p/demo/ufmt\n").unwrap();
        CompletionStore::init(&[root.join("examples")])
    }

    fn checked_pkg(src: &str) -> Package {
        let info = PackageInfo {
            dir: PathBuf::from("/tmp/demo"),
            import_path: "gno.land/r/demo/app".into(),
            files: vec![FileInfo {
                name: "a.gno".into(),
                body: src.into(),
            }],
        };
        let tc = TypeCheck::new(Env::default());
        let mut pkg = Package {
            name: "app".into(),
            import_path: "gno.land/r/demo/app".into(),
            ..Default::default()
        };
        pkg.type_check = Some(tc.check(&info));
        pkg
    }

    fn complete(
        src: &str,
        store: &CompletionStore,
        line: u32,
        character: u32,
    ) -> Option<Vec<CompletionItem>> {
        let uri: Uri = "file:///tmp/demo/a.gno".parse().unwrap();
        let file = GnoFile::new(uri, src.to_string());
        let parsed = file.parse().expect("parse");
        let pkg = checked_pkg(src);
        completion(&file, &parsed, Some(&pkg), store, Position::new(line, character))
    }

    #[test]
    fn package_qualifier_lists_exported_symbols() {
        let root = tempdir().expect("tempdir");
        let store = store_with_ufmt(root.path());
        let src = "package app\n\nimport \"gno.land/p/demo/ufmt\"\n\nfunc f() {\n\tufmt.\n}\n";
        // Cursor right after the dot on line 6.
        let items = complete(src, &store, 5, 6).expect("items");
        let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
        assert!(labels.contains(&"Sprintf"));
        assert!(labels.contains(&"Println"));
        assert!(labels.contains(&"MaxDepth"));
        assert!(!labels.contains(&"helper"));
        let sprintf = items.iter().find(|item| item.label == "Sprintf").unwrap();
        assert_eq!(sprintf.insert_text.as_deref(), Some("Sprintf()"));
    }

    #[test]
    fn no_completion_inside_import_literal() {
        let root = tempdir().expect("tempdir");
        let store = store_with_ufmt(root.path());
        let src = "package app\n\nimport \"gno.land/p/demo/ufmt\"\n";
        assert!(complete(src, &store, 2, 15).is_none());
    }

    #[test]
    fn local_value_completes_methods() {
        let store = CompletionStore::empty();
        let src = "package app\n\ntype Tree struct{}\n\nfunc (t *Tree) Size() int { return 0 }\n\nfunc f() {\n\tt := Tree{}\n\tt.\n}\n";
        // `t.` — cursor after the dot.
        let pkg_src_line = 8u32; // zero-based line of "\tt."
        let mut pkg = checked_pkg(src);
        // Give the package its own method index, as update_cache would.
        pkg.methods.insert(
            "Tree".into(),
            vec![crate::lsp::packages::Method {
                name: "Size".into(),
                receiver: "Tree".into(),
                pointer: true,
                arguments: vec![],
                doc: String::new(),
                signature: "func (t *Tree) Size() int".into(),
                file: "file:///tmp/demo/a.gno".parse().unwrap(),
                pos: Default::default(),
            }],
        );
        let uri: Uri = "file:///tmp/demo/a.gno".parse().unwrap();
        let file = GnoFile::new(uri, src.to_string());
        let parsed = file.parse().expect("parse");
        let items = completion(
            &file,
            &parsed,
            Some(&pkg),
            &store,
            Position::new(pkg_src_line, 3),
        )
        .expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Size");
        assert_eq!(items[0].insert_text.as_deref(), Some("Size()"));
    }
}
