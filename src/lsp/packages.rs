use crate::lang::{
    ast::{type_expr_string, Decl, File, GenKind, Spec, TypeExpr},
    parser::parse_file,
    span::{LineIndex, Span},
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tower_lsp_server::lsp_types::Uri;
use tower_lsp_server::UriExt;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymKind {
    Const,
    Var,
    Type,
    Struct,
    Interface,
    Array,
    Map,
    Chan,
    Func,
}

impl SymKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymKind::Const => "const",
            SymKind::Var => "var",
            SymKind::Type => "type",
            SymKind::Struct => "struct",
            SymKind::Interface => "interface",
            SymKind::Array => "array",
            SymKind::Map => "map",
            SymKind::Chan => "chan",
            SymKind::Func => "func",
        }
    }
}

/// 1-based source position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub doc: String,
    /// Verbatim source prefix of the declaration, up to the first " {".
    pub signature: String,
    pub kind: SymKind,
    pub file: Uri,
    pub pos: SourcePos,
}

impl Symbol {
    pub fn markdown(&self) -> String {
        format!("```gno\n{}\n```\n\n{}", self.signature, self.doc)
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub kind: String,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub arguments: Vec<Field>,
    pub doc: String,
    pub signature: String,
    pub file: Uri,
    pub pos: SourcePos,
}

impl Function {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    /// Receiver base type name; shared by value and pointer receivers.
    pub receiver: String,
    pub pointer: bool,
    pub arguments: Vec<Field>,
    pub doc: String,
    pub signature: String,
    pub file: Uri,
    pub pos: SourcePos,
}

impl Method {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

#[derive(Clone, Debug)]
pub struct Structure {
    pub name: String,
    pub fields: Vec<Field>,
    pub doc: String,
    /// Pretty body for hover rendering; the verbatim struct literal text.
    pub body: String,
    pub file: Uri,
    pub pos: SourcePos,
}

/// One indexed package: the symbol tables every query handler consumes.
#[derive(Clone, Debug, Default)]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub symbols: Vec<Symbol>,
    pub functions: Vec<Function>,
    pub methods: HashMap<String, Vec<Method>>,
    pub structures: Vec<Structure>,
    pub type_check: Option<std::sync::Arc<crate::lsp::check::TypeCheckResult>>,
}

impl Package {
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|sym| sym.name == name)
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|st| st.name == name)
    }

    pub fn method(&self, receiver: &str, name: &str) -> Option<&Method> {
        self.methods
            .get(receiver)?
            .iter()
            .find(|m| m.name == name)
    }
}

/// Non-test source files of a directory, sorted for determinism.
pub fn list_gno_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".gno") {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Walk `roots` for directories holding at least one gno source file.
pub fn list_gno_packages(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for root in roots {
        walk_for_packages(root, &mut dirs);
    }
    dirs.sort();
    dirs.dedup();
    dirs
}

fn walk_for_packages(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut seen_here = false;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_for_packages(&path, out);
        } else if !seen_here
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "gno")
        {
            seen_here = true;
            out.push(dir.to_path_buf());
        }
    }
}

fn is_test_file(name: &str) -> bool {
    name.ends_with("_test.gno") || name.ends_with("_filetest.gno")
}

/// Import path from the module manifest in `dir`, if one is present.
pub fn module_import_path(dir: &Path) -> Option<String> {
    let text = fs::read_to_string(dir.join("gno.mod")).ok()?;
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module") {
            let rest = rest.trim().trim_matches('"');
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Index one package directory into symbol/function/method/structure
/// tables. With `only_exported`, unexported declarations are dropped.
pub fn package_from_dir(dir: &Path, only_exported: bool) -> Result<Package, IndexError> {
    let files = list_gno_files(dir).map_err(|source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut pkg = Package::default();
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if is_test_file(&name) {
            continue;
        }
        let text = fs::read_to_string(&path).map_err(|source| IndexError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = match parse_file(&text) {
            Ok(result) if result.is_clean() => result.file,
            Ok(result) => {
                return Err(IndexError::Parse {
                    path,
                    message: result
                        .errors
                        .first()
                        .map(|err| err.message.clone())
                        .unwrap_or_default(),
                });
            }
            Err(errors) => {
                return Err(IndexError::Parse {
                    path,
                    message: errors
                        .errors
                        .first()
                        .map(|err| err.message.clone())
                        .unwrap_or_default(),
                });
            }
        };
        let Some(uri) = Uri::from_file_path(&path) else {
            continue;
        };
        pkg.name = parsed.package.name.clone();
        index_file(&mut pkg, &parsed, &text, uri, only_exported);
    }

    pkg.import_path = module_import_path(dir).unwrap_or_else(|| pkg.name.clone());
    Ok(pkg)
}

fn index_file(pkg: &mut Package, file: &File, text: &str, uri: Uri, only_exported: bool) {
    let index = LineIndex::new(text);
    let pos_of = |span: Span| {
        let (line, col) = index.position(text, span.start);
        SourcePos { line, col }
    };

    for decl in &file.decls {
        match decl {
            Decl::Func(func) => {
                if only_exported && !func.name.is_exported() {
                    continue;
                }
                let signature = head_of(text, func.span);
                let doc = func.doc.clone().unwrap_or_default();
                let arguments = func
                    .params
                    .iter()
                    .map(|param| Field {
                        name: param
                            .name
                            .as_ref()
                            .map(|n| n.name.clone())
                            .unwrap_or_default(),
                        kind: type_expr_string(&param.ty),
                    })
                    .collect::<Vec<_>>();
                match &func.recv {
                    Some(recv) => {
                        pkg.methods
                            .entry(recv.base.name.clone())
                            .or_default()
                            .push(Method {
                                name: func.name.name.clone(),
                                receiver: recv.base.name.clone(),
                                pointer: recv.pointer,
                                arguments,
                                doc: doc.clone(),
                                signature: signature.clone(),
                                file: uri.clone(),
                                pos: pos_of(func.span),
                            });
                    }
                    None => {
                        pkg.functions.push(Function {
                            name: func.name.name.clone(),
                            arguments,
                            doc: doc.clone(),
                            signature: signature.clone(),
                            file: uri.clone(),
                            pos: pos_of(func.span),
                        });
                    }
                }
                pkg.symbols.push(Symbol {
                    name: func.name.name.clone(),
                    doc,
                    signature,
                    kind: SymKind::Func,
                    file: uri.clone(),
                    pos: pos_of(func.span),
                });
            }
            Decl::Gen(gen) => {
                let doc = gen.doc.clone().unwrap_or_default();
                for spec in &gen.specs {
                    match spec {
                        Spec::Type(spec) => {
                            if only_exported && !spec.name.is_exported() {
                                continue;
                            }
                            if let TypeExpr::Struct { fields, .. } = &spec.ty {
                                pkg.structures.push(Structure {
                                    name: spec.name.name.clone(),
                                    fields: fields
                                        .iter()
                                        .flat_map(|field| {
                                            field.names.iter().map(|name| Field {
                                                name: name.name.clone(),
                                                kind: type_expr_string(&field.ty),
                                            })
                                        })
                                        .collect(),
                                    doc: doc.clone(),
                                    body: slice(text, spec.ty.span()),
                                    file: uri.clone(),
                                    pos: pos_of(spec.span),
                                });
                            }
                            pkg.symbols.push(Symbol {
                                name: spec.name.name.clone(),
                                doc: doc.clone(),
                                signature: head_of(text, spec.span),
                                kind: type_kind(&spec.ty),
                                file: uri.clone(),
                                pos: pos_of(spec.span),
                            });
                        }
                        Spec::Value(spec) => {
                            let kind = match gen.kind {
                                GenKind::Const => SymKind::Const,
                                _ => SymKind::Var,
                            };
                            for name in &spec.names {
                                if only_exported && !name.is_exported() {
                                    continue;
                                }
                                pkg.symbols.push(Symbol {
                                    name: name.name.clone(),
                                    doc: doc.clone(),
                                    signature: head_of(text, spec.span),
                                    kind,
                                    file: uri.clone(),
                                    pos: pos_of(name.span),
                                });
                            }
                        }
                    }
                }
            }
        }
    }
}

/// The verbatim head of a declaration: its source up to the first " {".
fn head_of(text: &str, span: Span) -> String {
    let raw = slice(text, span);
    match raw.find(" {") {
        Some(idx) => raw[..idx].to_string(),
        None => raw,
    }
}

fn slice(text: &str, span: Span) -> String {
    let start = span.start.min(text.len());
    let end = span.end.min(text.len());
    text[start..end].to_string()
}

fn type_kind(ty: &TypeExpr) -> SymKind {
    match ty {
        TypeExpr::Struct { .. } => SymKind::Struct,
        TypeExpr::Interface { .. } => SymKind::Interface,
        TypeExpr::Array { .. } | TypeExpr::Slice { .. } => SymKind::Array,
        TypeExpr::Map { .. } => SymKind::Map,
        TypeExpr::Chan { .. } => SymKind::Chan,
        _ => SymKind::Type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SRC: &str = "package demo\n\n// Tree is a balanced tree.\ntype Tree struct {\n\tsize int\n}\n\n// Size returns the node count.\nfunc (t *Tree) Size() int { return t.size }\n\nfunc (t Tree) Empty() bool { return t.size == 0 }\n\n// New makes an empty Tree.\nfunc New() *Tree { return &Tree{} }\n\nconst Version = \"1.0\"\n\nvar counter int\n";

    fn write_pkg(dir: &Path) {
        fs::write(dir.join("demo.gno"), SRC).expect("write source");
        fs::write(dir.join("demo_test.gno"), "package demo\n\nfunc broken(").expect("write test");
        fs::write(
            dir.join("gno.mod"),
            "module gno.land/p/demo/tree\n",
        )
        .expect("write gno.mod");
    }

    #[test]
    fn indexes_symbols_functions_methods_structures() {
        let dir = tempdir().expect("tempdir");
        write_pkg(dir.path());
        let pkg = package_from_dir(dir.path(), false).expect("index");

        assert_eq!(pkg.name, "demo");
        assert_eq!(pkg.import_path, "gno.land/p/demo/tree");
        assert_eq!(pkg.functions.len(), 1);
        assert_eq!(pkg.functions[0].signature, "func New() *Tree");
        assert_eq!(pkg.structures.len(), 1);
        assert_eq!(pkg.structures[0].doc, "Tree is a balanced tree.");

        // Pointer and value receivers share the bare key.
        let methods = pkg.methods.get("Tree").expect("methods for Tree");
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().any(|m| m.name == "Size" && m.pointer));
        assert!(methods.iter().any(|m| m.name == "Empty" && !m.pointer));

        let version = pkg.symbol("Version").expect("Version symbol");
        assert_eq!(version.kind, SymKind::Const);
        let counter = pkg.symbol("counter").expect("counter symbol");
        assert_eq!(counter.kind, SymKind::Var);
        let tree = pkg.symbol("Tree").expect("Tree symbol");
        assert_eq!(tree.kind, SymKind::Struct);
        assert_eq!(tree.signature, "Tree struct");
    }

    #[test]
    fn indexing_is_deterministic() {
        let dir = tempdir().expect("tempdir");
        write_pkg(dir.path());
        let a = package_from_dir(dir.path(), false).expect("first run");
        let b = package_from_dir(dir.path(), false).expect("second run");
        let names =
            |p: &Package| p.symbols.iter().map(|s| (s.name.clone(), s.kind)).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
        assert_eq!(
            a.symbols.iter().map(|s| s.pos).collect::<Vec<_>>(),
            b.symbols.iter().map(|s| s.pos).collect::<Vec<_>>()
        );
    }

    #[test]
    fn exported_filter_drops_lowercase() {
        let dir = tempdir().expect("tempdir");
        write_pkg(dir.path());
        let pkg = package_from_dir(dir.path(), true).expect("index");
        assert!(pkg
            .symbols
            .iter()
            .all(|sym| sym.name.chars().next().unwrap().is_uppercase()));
        assert!(pkg.symbol("counter").is_none());
    }

    #[test]
    fn parse_failure_aborts_package() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("bad.gno"), "package demo\n\nfunc broken( {\n").unwrap();
        assert!(package_from_dir(dir.path(), false).is_err());
    }

    #[test]
    fn missing_manifest_falls_back_to_short_name() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("demo.gno"), "package demo\n").unwrap();
        let pkg = package_from_dir(dir.path(), false).expect("index");
        assert_eq!(pkg.import_path, "demo");
    }

    #[test]
    fn package_listing_finds_nested_dirs() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("p/demo/avl");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("avl.gno"), "package avl\n").unwrap();
        fs::write(dir.path().join("README.md"), "not gno").unwrap();
        let pkgs = list_gno_packages(&[dir.path().to_path_buf()]);
        assert_eq!(pkgs, vec![nested]);
    }
}
