use crate::lang::ast::{Expr, Ident, ImportSpec};
use crate::lang::check::{Mode, TypeAndValue};
use crate::lsp::builtin::is_builtin;
use crate::lsp::completion::CompletionStore;
use crate::lsp::packages::Package;
use crate::lsp::selection::{path_enclosing, type_and_value_at, Node};
use crate::lsp::snapshot::{GnoFile, ParsedGnoFile};
use crate::lsp::text::span_to_range;
use tower_lsp_server::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range};

pub fn format_hover_content(header: &str, body: &str) -> String {
    format!("```gno\n{header}\n```\n\n{body}")
}

fn card(value: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(range),
    }
}

/// Strips a leading star and the package qualifier off a type string.
pub fn parse_type(t: &str, import_path: &str) -> String {
    t.trim_start_matches('*')
        .strip_prefix(&format!("{import_path}."))
        .unwrap_or(t.trim_start_matches('*'))
        .to_string()
}

fn import_card(text: &str, spec: &ImportSpec, range_span: crate::lang::span::Span) -> Hover {
    let path = &spec.path.value;
    let last = path.rsplit('/').next().unwrap_or(path);
    let header = format!("package {last} (\"{path}\")");
    let body = if path.starts_with("gno.land/") {
        format!("[```{last}``` on gno.land](https://{path})")
    } else {
        format!("[```{last}``` on gno.land](https://gno.land)")
    };
    card(
        format_hover_content(&header, &body),
        span_to_range(text, range_span),
    )
}

/// The hover handler body: everything after the snapshot fetch.
pub fn hover(
    file: &GnoFile,
    parsed: &ParsedGnoFile,
    pkg: Option<&Package>,
    store: &CompletionStore,
    position: Position,
) -> Option<Hover> {
    let offset = file.offset(position);
    let line = position.line + 1;

    // Hovering an import path gets a package card, cursor anywhere in the
    // literal.
    for spec in &parsed.file.imports {
        if spec.path.span.contains_inclusive(offset) {
            return Some(import_card(&file.src, spec, spec.span));
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
    let range = span_to_range(&file.src, ident.span);

    let tv = type_and_value_at(info, &ident.name, line, Some(offset))
        .filter(|tv| !tv.ty.is_invalid());
    let Some(tv) = tv else {
        return match path[1] {
            Node::Func(decl) if decl.recv.is_some() => hover_method_decl(pkg, ident, decl, range),
            Node::Func(_) => hover_func_decl(pkg, ident, range),
            Node::Expr(sel @ Expr::Selector { .. }) => {
                hover_selector(file, parsed, pkg, store, ident, sel, line, range)
            }
            _ => Some(card(format_hover_content(&ident.name, ""), range)),
        };
    };

    let type_str = tv.ty.to_string();
    let mode = tv.mode;
    let is_package_level_global = type_str.contains(&pkg.import_path);

    if let Some(doc) = is_builtin(&ident.name, tv) {
        return hover_builtin(ident, tv, range, doc);
    }

    if (is_package_level_global || !type_str.contains("gno.land")) && mode == Mode::Var {
        let t = if is_package_level_global {
            type_str.replacen(&format!("{}.", pkg.import_path), "", 1)
        } else {
            type_str.clone()
        };
        let header = format!("{mode} {} {t}", ident.name);
        return Some(card(format_hover_content(&header, ""), range));
    }

    if is_package_level_global && mode == Mode::Type {
        let type_name = parse_type(&type_str, &pkg.import_path);
        return hover_package_level_type(pkg, ident, mode, &type_name, range);
    }

    if mode == Mode::Value {
        return hover_package_level_value(pkg, ident, mode, &type_str, range);
    }

    // A value whose type lives in an imported package: display the type
    // through the import's short name.
    let header = if type_str.contains("gno.land/") {
        let mut rewritten = None;
        for spec in &parsed.file.imports {
            let path = &spec.path.value;
            if type_str.contains(path.as_str()) {
                let last = path.rsplit('/').next().unwrap_or(path);
                let t = type_str.replacen(path.as_str(), last, 1);
                rewritten = Some(format!("{mode} {} {t}", ident.name));
                break;
            }
        }
        rewritten?
    } else {
        format!("{mode} {} {type_str}", ident.name)
    };
    Some(card(format_hover_content(&header, ""), range))
}

fn hover_builtin(ident: &Ident, tv: &TypeAndValue, range: Range, doc: &str) -> Option<Hover> {
    let t = tv.ty.to_string();
    let header = if t == "nil" || t == "untyped nil" {
        "var nil Type".to_string()
    } else if t.starts_with("func") && tv.mode == Mode::Builtin {
        format!("{}{}", ident.name, t.trim_start_matches("func"))
    } else if (ident.name == "true" || ident.name == "false") && t == "bool" {
        "const (\n\ttrue\t= 0 == 0\t// Untyped bool.\n\tfalse\t= 0 != 0\t// Untyped bool.\n)"
            .to_string()
    } else {
        format!("{} {} {t}", tv.mode, ident.name)
    };
    Some(card(format_hover_content(&header, doc), range))
}

fn hover_method_decl(
    pkg: &Package,
    ident: &Ident,
    decl: &crate::lang::ast::FuncDecl,
    range: Range,
) -> Option<Hover> {
    let recv = decl.recv.as_ref()?;
    let method = pkg.method(&recv.base.name, &ident.name)?;
    Some(card(
        format_hover_content(&method.signature, &method.doc),
        range,
    ))
}

fn hover_func_decl(pkg: &Package, ident: &Ident, range: Range) -> Option<Hover> {
    let symbol = pkg.symbol(&ident.name)?;
    Some(card(
        format_hover_content(&symbol.signature, &symbol.doc),
        range,
    ))
}

fn hover_package_level_value(
    pkg: &Package,
    ident: &Ident,
    mode: Mode,
    type_str: &str,
    range: Range,
) -> Option<Hover> {
    match pkg.symbol(&ident.name) {
        Some(symbol) => Some(card(
            format_hover_content(&symbol.signature, &symbol.doc),
            range,
        )),
        None => {
            let header = format!("{mode} {} {type_str}", ident.name);
            Some(card(format_hover_content(&header, ""), range))
        }
    }
}

fn hover_package_level_type(
    pkg: &Package,
    ident: &Ident,
    mode: Mode,
    type_name: &str,
    range: Range,
) -> Option<Hover> {
    if let Some(structure) = pkg.structure(type_name) {
        let header = format!("{mode} {} {}\n", structure.name, structure.body);
        let mut body = String::new();
        if let Some(methods) = pkg.methods.get(type_name) {
            body.push_str("```gno\n");
            for method in methods {
                if method.is_exported() {
                    body.push_str(&method.signature);
                    body.push('\n');
                }
            }
            body.push_str("```\n");
            body.push_str(&structure.doc);
            body.push('\n');
        }
        return Some(card(format_hover_content(&header, &body), range));
    }
    let symbol = pkg.symbol(&ident.name)?;
    let header = format!("{mode} {}", symbol.signature);
    Some(card(format_hover_content(&header, &symbol.doc), range))
}

#[allow(clippy::too_many_arguments)]
fn hover_selector(
    file: &GnoFile,
    parsed: &ParsedGnoFile,
    pkg: &Package,
    store: &CompletionStore,
    ident: &Ident,
    sel: &Expr,
    line: u32,
    range: Range,
) -> Option<Hover> {
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
        // The parent is usually a package qualifier.
        for spec in &parsed.file.imports {
            let path = &spec.path.value;
            let last = path.rsplit('/').next().unwrap_or(path);
            if last == ident.name {
                // Hovering the qualifier itself.
                return Some(import_card(&file.src, spec, ident.span));
            } else if last == parent_str {
                let symbol = store.lookup_symbol(&parent_str, &ident.name)?;
                return Some(card(symbol.markdown(), range));
            }
        }
        return None;
    };

    let tv = tv?;
    let tv_str = tv.ty.to_string();
    let tv_parent_str = tv_parent.ty.to_string();

    if tv_str.contains("func") {
        if tv_parent_str.contains(&pkg.import_path) {
            return hover_func_decl_or_method(pkg, &tv_parent_str, ident, range);
        }
        for spec in &parsed.file.imports {
            let path = &spec.path.value;
            if tv_parent_str.contains(path.as_str()) {
                let last = path.rsplit('/').next().unwrap_or(path);
                let imported = store.lookup_pkg(last)?;
                let parent_type = tv_parent_str.rsplit('.').next().unwrap_or(&tv_parent_str);
                let methods = imported.methods.get(parent_type)?;
                let found = methods.iter().find(|m| m.name == ident.name)?;
                return Some(card(
                    format_hover_content(&found.signature, &found.doc),
                    range,
                ));
            }
        }
        // Imports from outside the dialect domain: the store indexes them
        // by full import path.
        for spec in &parsed.file.imports {
            if spec.path.value.contains("gno.land") {
                continue;
            }
            let Some(symbol) = store.lookup_symbol(&spec.path.value, &ident.name) else {
                continue;
            };
            if symbol.kind != crate::lsp::packages::SymKind::Func {
                continue;
            }
            return Some(card(symbol.markdown(), range));
        }
        return None;
    }

    let t = if tv_str.contains(&pkg.import_path) {
        tv_str.replacen(&format!("{}.", pkg.import_path), "", 1)
    } else {
        tv_str
    };
    let header = format!("{} {} {t}", tv.mode, ident.name);
    Some(card(format_hover_content(&header, ""), range))
}

/// A selector on a value of a local type: methods first, then the plain
/// symbol table.
fn hover_func_decl_or_method(
    pkg: &Package,
    parent_type_str: &str,
    ident: &Ident,
    range: Range,
) -> Option<Hover> {
    let base = parse_type(parent_type_str, &pkg.import_path);
    if let Some(method) = pkg.method(&base, &ident.name) {
        return Some(card(
            format_hover_content(&method.signature, &method.doc),
            range,
        ));
    }
    hover_func_decl(pkg, ident, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::lsp::check::{PackageInfo, FileInfo, TypeCheck};
    use crate::lsp::packages::package_from_dir;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use tower_lsp_server::lsp_types::Uri;

    fn build_pkg(dir: &Path, src: &str) -> Package {
        fs::write(dir.join("a.gno"), src).unwrap();
        fs::write(dir.join("gno.mod"), "module gno.land/r/demo/hoverpkg\n").unwrap();
        let mut pkg = package_from_dir(dir, false).expect("index");
        let info = PackageInfo {
            dir: dir.to_path_buf(),
            import_path: pkg.import_path.clone(),
            files: vec![FileInfo {
                name: "a.gno".into(),
                body: src.into(),
            }],
        };
        let tc = TypeCheck::new(Env::default());
        pkg.type_check = Some(tc.check(&info));
        pkg
    }

    fn hover_at(src: &str, line: u32, character: u32) -> Option<Hover> {
        let dir = tempdir().expect("tempdir");
        let pkg = build_pkg(dir.path(), src);
        let uri: Uri = "file:///tmp/a.gno".parse().unwrap();
        let file = GnoFile::new(uri, src.to_string());
        let parsed = file.parse().expect("parse");
        let store = CompletionStore::empty();
        hover(
            &file,
            &parsed,
            Some(&pkg),
            &store,
            Position::new(line, character),
        )
    }

    fn content(hover: &Hover) -> &str {
        match &hover.contents {
            HoverContents::Markup(markup) => &markup.value,
            _ => panic!("expected markup"),
        }
    }

    #[test]
    fn hover_over_builtin_type() {
        let src = "package demo\n\nvar n int = 3\n";
        let result = hover_at(src, 2, 6).expect("hover on int");
        let text = content(&result);
        assert!(text.contains("type int"), "got: {text}");
        assert!(text.contains(crate::lsp::builtin::INT_DOC));
    }

    #[test]
    fn hover_over_import_path() {
        let src = "package demo\n\nimport \"gno.land/p/demo/ufmt\"\n";
        let result = hover_at(src, 2, 15).expect("hover in import literal");
        let text = content(&result);
        assert!(text.contains("package ufmt (\"gno.land/p/demo/ufmt\")"));
        assert!(text.contains("https://gno.land/p/demo/ufmt"));
    }

    #[test]
    fn hover_over_local_var() {
        let src = "package demo\n\nfunc f() {\n\tcount := 3\n\t_ = count\n}\n";
        let result = hover_at(src, 4, 6).expect("hover on count");
        assert!(content(&result).contains("var count int"));
    }

    #[test]
    fn hover_over_local_struct_type() {
        let src = "package demo\n\n// Tree holds nodes.\ntype Tree struct {\n\tsize int\n}\n\nfunc (t *Tree) Size() int { return t.size }\n\nfunc f() {\n\tvar t Tree\n\t_ = t\n}\n";
        let result = hover_at(src, 10, 7).expect("hover on Tree in var decl");
        let text = content(&result);
        assert!(text.contains("type Tree struct"), "got: {text}");
        assert!(text.contains("func (t *Tree) Size() int"));
        assert!(text.contains("Tree holds nodes."));
    }

    #[test]
    fn hover_over_method_name_in_decl() {
        let src = "package demo\n\ntype Tree struct{}\n\n// Size counts nodes.\nfunc (t *Tree) Size() int { return 0 }\n";
        let result = hover_at(src, 5, 16).expect("hover on Size");
        let text = content(&result);
        assert!(text.contains("func (t *Tree) Size() int"));
        assert!(text.contains("Size counts nodes."));
    }

    #[test]
    fn hover_misses_return_none() {
        let src = "package demo\n\nfunc f() {}\n";
        // Hover in empty space.
        assert!(hover_at(src, 1, 0).is_none());
    }
}
