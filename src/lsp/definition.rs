use crate::lang::ast::{Expr, Ident};
use crate::lang::check::Mode;
use crate::lsp::builtin::is_builtin;
use crate::lsp::completion::CompletionStore;
use crate::lsp::hover::parse_type;
use crate::lsp::packages::{Package, SourcePos, SymKind};
use crate::lsp::selection::{path_enclosing, type_and_value_at, Node};
use crate::lsp::snapshot::{GnoFile, ParsedGnoFile};
use crate::lsp::text::pos_to_range;
use tower_lsp_server::lsp_types::{Location, Position, Uri};

fn location(uri: Uri, pos: SourcePos) -> Location {
    Location {
        uri,
        range: pos_to_range(pos.line, (pos.col, pos.col)),
    }
}

/// The definition handler body. Mirrors hover's dispatch, but resolves to
/// recorded declaration positions instead of rendering cards.
pub fn definition(
    file: &GnoFile,
    parsed: &ParsedGnoFile,
    pkg: Option<&Package>,
    store: &CompletionStore,
    position: Position,
) -> Option<Location> {
    let offset = file.offset(position);
    let line = position.line + 1;

    // Inside an import path: open the imported package at its first
    // symbol.
    for spec in &parsed.file.imports {
        if spec.path.span.contains_inclusive(offset) {
            let path = &spec.path.value;
            let last = path.rsplit('/').next().unwrap_or(path);
            let imported = store.lookup_pkg(last)?;
            let first = imported.symbols.first()?;
            return Some(Location {
                uri: first.file.clone(),
                range: pos_to_range(1, (1, 1)),
            });
        }
    }

    let pkg = pkg?;
    let info = &pkg.type_check.as_ref()?.info;

    let path = path_enclosing(&parsed.file, offset);
    if path.len() < 2 {
        return None;
    }
    let Node::Ident(ident) = path[0] else {
        return None;
    };

    let tv = type_and_value_at(info, &ident.name, line, Some(offset))
        .filter(|tv| !tv.ty.is_invalid());
    let Some(tv) = tv else {
        return match path[1] {
            Node::Func(decl) if decl.recv.is_some() => {
                let recv = decl.recv.as_ref()?;
                let method = pkg.method(&recv.base.name, &ident.name)?;
                Some(location(method.file.clone(), method.pos))
            }
            Node::Func(_) => symbol_location(pkg, ident),
            Node::Expr(sel @ Expr::Selector { .. }) => {
                definition_selector(parsed, pkg, store, ident, sel, line)
            }
            _ => None,
        };
    };

    let type_str = tv.ty.to_string();
    let mode = tv.mode;
    let is_package_level_global = type_str.contains(&pkg.import_path);

    // Builtins have no definition to jump to.
    if is_builtin(&ident.name, tv).is_some() {
        return None;
    }

    // Local variables resolve inside the open file; out of scope here.
    if (is_package_level_global || !type_str.contains("gno.land")) && mode == Mode::Var {
        return None;
    }

    if is_package_level_global && mode == Mode::Type {
        let type_name = parse_type(&type_str, &pkg.import_path);
        if let Some(structure) = pkg.structure(&type_name) {
            return Some(location(structure.file.clone(), structure.pos));
        }
        return symbol_location(pkg, ident);
    }

    if mode == Mode::Value {
        return symbol_location(pkg, ident);
    }

    None
}

fn symbol_location(pkg: &Package, ident: &Ident) -> Option<Location> {
    let symbol = pkg.symbol(&ident.name)?;
    Some(location(symbol.file.clone(), symbol.pos))
}

fn definition_selector(
    parsed: &ParsedGnoFile,
    pkg: &Package,
    store: &CompletionStore,
    ident: &Ident,
    sel: &Expr,
    line: u32,
) -> Option<Location> {
    let Expr::Selector { x, .. } = sel else {
        return None;
    };
    let info = &pkg.type_check.as_ref()?.info;
    let expr_str = sel.to_string();
    let parent_str = x.to_string();

    let tv = type_and_value_at(info, &expr_str, line, None).filter(|tv| !tv.ty.is_invalid());
    let tv_parent =
        type_and_value_at(info, &parent_str, line, None).filter(|tv| !tv.ty.is_invalid());

    let Some(tv_parent) = tv_parent else {
        for spec in &parsed.file.imports {
            let path = &spec.path.value;
            let last = path.rsplit('/').next().unwrap_or(path);
            if last == parent_str {
                let symbol = store.lookup_symbol(&parent_str, &ident.name)?;
                return Some(location(symbol.file.clone(), symbol.pos));
            }
        }
        return None;
    };

    let tv = tv?;
    let tv_str = tv.ty.to_string();
    let tv_parent_str = tv_parent.ty.to_string();

    if tv_str.contains("func") {
        if tv_parent_str.contains(&pkg.import_path) {
            let base = parse_type(&tv_parent_str, &pkg.import_path);
            if let Some(method) = pkg.method(&base, &ident.name) {
                return Some(location(method.file.clone(), method.pos));
            }
            return symbol_location(pkg, ident);
        }
        for spec in &parsed.file.imports {
            let path = &spec.path.value;
            if !tv_parent_str.contains(path.as_str()) {
                continue;
            }
            let last = path.rsplit('/').next().unwrap_or(path);
            let imported = store.lookup_pkg(last)?;
            let parent_type = tv_parent_str.rsplit('.').next().unwrap_or(&tv_parent_str);
            let method = imported
                .methods
                .get(parent_type)?
                .iter()
                .find(|m| m.name == ident.name)?;
            return Some(location(method.file.clone(), method.pos));
        }
        // Imports outside the dialect domain.
        for spec in &parsed.file.imports {
            if spec.path.value.contains("gno.land") {
                continue;
            }
            let Some(symbol) = store.lookup_symbol(&spec.path.value, &ident.name) else {
                continue;
            };
            if symbol.kind != SymKind::Func {
                continue;
            }
            return Some(location(symbol.file.clone(), symbol.pos));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::lsp::check::{PackageInfo, TypeCheck};
    use crate::lsp::packages::package_from_dir;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn definition_on_local_function_call() {
        let dir = tempdir().expect("tempdir");
        let src = "package demo\n\n// Foo does things.\nfunc Foo() {}\n\nfunc caller() {\n\tFoo()\n}\n";
        fs::write(dir.path().join("a.gno"), src).unwrap();
        fs::write(dir.path().join("gno.mod"), "module gno.land/r/demo/deftest\n").unwrap();

        let mut pkg = package_from_dir(dir.path(), false).expect("index");
        let env = Env::default();
        let info = PackageInfo {
            dir: dir.path().to_path_buf(),
            import_path: pkg.import_path.clone(),
            files: vec![crate::lsp::check::FileInfo {
                name: "a.gno".into(),
                body: src.into(),
            }],
        };
        let tc = TypeCheck::new(env);
        pkg.type_check = Some(tc.check(&info));

        let uri: tower_lsp_server::lsp_types::Uri =
            "file:///tmp/deftest/a.gno".parse().unwrap();
        let file = GnoFile::new(uri, src.to_string());
        let parsed = file.parse().expect("parse");
        let store = CompletionStore::empty();

        // Cursor on `Foo` in the call on line 7.
        let loc = definition(&file, &parsed, Some(&pkg), &store, Position::new(6, 2))
            .expect("definition location");
        // The declaration of Foo sits on line 4, 1-based.
        assert_eq!(loc.range.start.line, 3);
    }

    #[test]
    fn definition_on_builtin_is_none() {
        let dir = tempdir().expect("tempdir");
        let src = "package demo\n\nvar n int = 3\n";
        fs::write(dir.path().join("a.gno"), src).unwrap();

        let mut pkg = package_from_dir(dir.path(), false).expect("index");
        let info = PackageInfo {
            dir: dir.path().to_path_buf(),
            import_path: pkg.import_path.clone(),
            files: vec![crate::lsp::check::FileInfo {
                name: "a.gno".into(),
                body: src.into(),
            }],
        };
        let tc = TypeCheck::new(Env::default());
        pkg.type_check = Some(tc.check(&info));

        let uri: tower_lsp_server::lsp_types::Uri = "file:///tmp/x/a.gno".parse().unwrap();
        let file = GnoFile::new(uri, src.to_string());
        let parsed = file.parse().expect("parse");
        let store = CompletionStore::empty();

        assert!(definition(&file, &parsed, Some(&pkg), &store, Position::new(2, 6)).is_none());
    }
}
