use crate::lang::{
    ast::*,
    check::{TypeAndValue, TypeInfo},
    span::Span,
};

/// One step of an AST path. Leaf nodes keep their own variants so query
/// handlers can dispatch on `path[0]`/`path[1]` pairs.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    File(&'a File),
    Import(&'a ImportSpec),
    Func(&'a FuncDecl),
    Gen(&'a GenDecl),
    TypeSpec(&'a TypeSpec),
    ValueSpec(&'a ValueSpec),
    Type(&'a TypeExpr),
    Block(&'a Block),
    Stmt(&'a Stmt),
    Expr(&'a Expr),
    Ident(&'a Ident),
}

/// The AST path enclosing `offset`, leaf-first.
///
/// Identifier spans are treated as end-inclusive: the cursor sitting just
/// after the last character still hits the identifier, which is where
/// editors put the caret while the user is typing it.
pub fn path_enclosing(file: &File, offset: usize) -> Vec<Node<'_>> {
    let mut walker = Walker {
        offset,
        path: Vec::new(),
    };
    walker.path.push(Node::File(file));

    for spec in &file.imports {
        // A hit inside the path literal selects the spec; a named import
        // contributes its name to the path even though the position is in
        // the literal.
        if spec.path.span.contains_inclusive(offset) {
            walker.path.push(Node::Import(spec));
            if let Some(alias) = &spec.alias {
                walker.path.push(Node::Ident(alias));
            }
            return finish(walker.path);
        }
        if spec.span.contains(offset) {
            walker.path.push(Node::Import(spec));
            if let Some(alias) = &spec.alias {
                if alias.span.contains_inclusive(offset) {
                    walker.path.push(Node::Ident(alias));
                }
            }
            return finish(walker.path);
        }
    }

    if file.package.span.contains_inclusive(offset) {
        walker.path.push(Node::Ident(&file.package));
        return finish(walker.path);
    }

    for decl in &file.decls {
        if decl.span().contains_inclusive(offset) {
            walker.visit_decl(decl);
            break;
        }
    }
    finish(walker.path)
}

fn finish(mut path: Vec<Node<'_>>) -> Vec<Node<'_>> {
    path.reverse();
    path
}

struct Walker<'a> {
    offset: usize,
    path: Vec<Node<'a>>,
}

impl<'a> Walker<'a> {
    fn hit(&self, span: Span) -> bool {
        span.contains(self.offset)
    }

    fn hit_ident(&self, ident: &Ident) -> bool {
        ident.span.contains_inclusive(self.offset)
    }

    fn visit_decl(&mut self, decl: &'a Decl) {
        match decl {
            Decl::Func(func) => {
                self.path.push(Node::Func(func));
                if self.hit_ident(&func.name) {
                    self.path.push(Node::Ident(&func.name));
                    return;
                }
                if let Some(recv) = &func.recv {
                    if let Some(name) = &recv.name {
                        if self.hit_ident(name) {
                            self.path.push(Node::Ident(name));
                            return;
                        }
                    }
                    if self.hit_ident(&recv.base) {
                        self.path.push(Node::Ident(&recv.base));
                        return;
                    }
                }
                for param in &func.params {
                    if let Some(name) = &param.name {
                        if self.hit_ident(name) {
                            self.path.push(Node::Ident(name));
                            return;
                        }
                    }
                    if param.ty.span().contains_inclusive(self.offset) {
                        self.visit_type(&param.ty);
                        return;
                    }
                }
                for result in &func.results {
                    if result.span().contains_inclusive(self.offset) {
                        self.visit_type(result);
                        return;
                    }
                }
                if let Some(body) = &func.body {
                    if self.hit(body.span) {
                        self.visit_block(body);
                    }
                }
            }
            Decl::Gen(gen) => {
                self.path.push(Node::Gen(gen));
                for spec in &gen.specs {
                    if !spec.span().contains_inclusive(self.offset) {
                        continue;
                    }
                    match spec {
                        Spec::Type(spec) => {
                            self.path.push(Node::TypeSpec(spec));
                            if self.hit_ident(&spec.name) {
                                self.path.push(Node::Ident(&spec.name));
                                return;
                            }
                            self.visit_type(&spec.ty);
                        }
                        Spec::Value(spec) => {
                            self.path.push(Node::ValueSpec(spec));
                            for name in &spec.names {
                                if self.hit_ident(name) {
                                    self.path.push(Node::Ident(name));
                                    return;
                                }
                            }
                            if let Some(ty) = &spec.ty {
                                if ty.span().contains_inclusive(self.offset) {
                                    self.visit_type(ty);
                                    return;
                                }
                            }
                            for value in &spec.values {
                                if value.span().contains_inclusive(self.offset) {
                                    self.visit_expr(value);
                                    return;
                                }
                            }
                        }
                    }
                    return;
                }
            }
        }
    }

    fn visit_type(&mut self, ty: &'a TypeExpr) {
        self.path.push(Node::Type(ty));
        match ty {
            TypeExpr::Name(ident) => {
                if self.hit_ident(ident) {
                    self.path.push(Node::Ident(ident));
                }
            }
            TypeExpr::Qualified { pkg, name, .. } => {
                if self.hit_ident(pkg) {
                    self.path.push(Node::Ident(pkg));
                } else if self.hit_ident(name) {
                    self.path.push(Node::Ident(name));
                }
            }
            TypeExpr::Pointer { elem, .. }
            | TypeExpr::Slice { elem, .. }
            | TypeExpr::Chan { elem, .. } => {
                if elem.span().contains_inclusive(self.offset) {
                    self.visit_type(elem);
                }
            }
            TypeExpr::Array { len, elem, .. } => {
                if let Some(len) = len {
                    if len.span().contains_inclusive(self.offset) {
                        self.visit_expr(len);
                        return;
                    }
                }
                if elem.span().contains_inclusive(self.offset) {
                    self.visit_type(elem);
                }
            }
            TypeExpr::Map { key, value, .. } => {
                if key.span().contains_inclusive(self.offset) {
                    self.visit_type(key);
                } else if value.span().contains_inclusive(self.offset) {
                    self.visit_type(value);
                }
            }
            TypeExpr::Struct { fields, .. } => {
                for field in fields {
                    for name in &field.names {
                        if self.hit_ident(name) {
                            self.path.push(Node::Ident(name));
                            return;
                        }
                    }
                    if field.ty.span().contains_inclusive(self.offset) {
                        self.visit_type(&field.ty);
                        return;
                    }
                }
            }
            TypeExpr::Interface { methods, .. } => {
                for member in methods {
                    if let Some(name) = &member.name {
                        if self.hit_ident(name) {
                            self.path.push(Node::Ident(name));
                            return;
                        }
                    }
                    for param in &member.params {
                        if param.ty.span().contains_inclusive(self.offset) {
                            self.visit_type(&param.ty);
                            return;
                        }
                    }
                    for result in &member.results {
                        if result.span().contains_inclusive(self.offset) {
                            self.visit_type(result);
                            return;
                        }
                    }
                }
            }
            TypeExpr::Func {
                params, results, ..
            } => {
                for param in params {
                    if param.ty.span().contains_inclusive(self.offset) {
                        self.visit_type(&param.ty);
                        return;
                    }
                }
                for result in results {
                    if result.span().contains_inclusive(self.offset) {
                        self.visit_type(result);
                        return;
                    }
                }
            }
        }
    }

    fn visit_block(&mut self, block: &'a Block) {
        self.path.push(Node::Block(block));
        for stmt in &block.stmts {
            if stmt.span().contains_inclusive(self.offset) {
                self.visit_stmt(stmt);
                return;
            }
        }
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        self.path.push(Node::Stmt(stmt));
        match stmt {
            Stmt::Decl(gen) => {
                for spec in &gen.specs {
                    if !spec.span().contains_inclusive(self.offset) {
                        continue;
                    }
                    match spec {
                        Spec::Type(spec) => {
                            if self.hit_ident(&spec.name) {
                                self.path.push(Node::Ident(&spec.name));
                            } else {
                                self.visit_type(&spec.ty);
                            }
                        }
                        Spec::Value(spec) => {
                            for name in &spec.names {
                                if self.hit_ident(name) {
                                    self.path.push(Node::Ident(name));
                                    return;
                                }
                            }
                            if let Some(ty) = &spec.ty {
                                if ty.span().contains_inclusive(self.offset) {
                                    self.visit_type(ty);
                                    return;
                                }
                            }
                            for value in &spec.values {
                                if value.span().contains_inclusive(self.offset) {
                                    self.visit_expr(value);
                                    return;
                                }
                            }
                        }
                    }
                    return;
                }
            }
            Stmt::ShortVar { names, values, .. } => {
                for name in names {
                    if self.hit_ident(name) {
                        self.path.push(Node::Ident(name));
                        return;
                    }
                }
                self.visit_exprs(values);
            }
            Stmt::Assign { lhs, rhs, .. } => {
                if !self.try_visit_exprs(lhs) {
                    self.visit_exprs(rhs);
                }
            }
            Stmt::Expr(expr) => self.visit_expr(expr),
            Stmt::IncDec { expr, .. } => self.visit_expr(expr),
            Stmt::Send { chan, value, .. } => {
                if chan.span().contains_inclusive(self.offset) {
                    self.visit_expr(chan);
                } else if value.span().contains_inclusive(self.offset) {
                    self.visit_expr(value);
                }
            }
            Stmt::Return { values, .. } => self.visit_exprs(values),
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                if let Some(init) = init {
                    if init.span().contains_inclusive(self.offset) {
                        self.visit_stmt(init);
                        return;
                    }
                }
                if cond.span().contains_inclusive(self.offset) {
                    self.visit_expr(cond);
                    return;
                }
                if self.hit(then.span) {
                    self.visit_block(then);
                    return;
                }
                if let Some(els) = els {
                    if els.span().contains_inclusive(self.offset) {
                        self.visit_stmt(els);
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                if let Some(init) = init {
                    if init.span().contains_inclusive(self.offset) {
                        self.visit_stmt(init);
                        return;
                    }
                }
                if let Some(cond) = cond {
                    if cond.span().contains_inclusive(self.offset) {
                        self.visit_expr(cond);
                        return;
                    }
                }
                if let Some(post) = post {
                    if post.span().contains_inclusive(self.offset) {
                        self.visit_stmt(post);
                        return;
                    }
                }
                if self.hit(body.span) {
                    self.visit_block(body);
                }
            }
            Stmt::Range {
                key,
                value,
                expr,
                body,
                ..
            } => {
                for bound in [key, value].into_iter().flatten() {
                    if bound.span().contains_inclusive(self.offset) {
                        self.visit_expr(bound);
                        return;
                    }
                }
                if expr.span().contains_inclusive(self.offset) {
                    self.visit_expr(expr);
                    return;
                }
                if self.hit(body.span) {
                    self.visit_block(body);
                }
            }
            Stmt::Switch {
                init, tag, cases, ..
            } => {
                if let Some(init) = init {
                    if init.span().contains_inclusive(self.offset) {
                        self.visit_stmt(init);
                        return;
                    }
                }
                if let Some(tag) = tag {
                    if tag.span().contains_inclusive(self.offset) {
                        self.visit_expr(tag);
                        return;
                    }
                }
                for case in cases {
                    if !case.span.contains_inclusive(self.offset) {
                        continue;
                    }
                    if self.try_visit_exprs(&case.exprs) {
                        return;
                    }
                    for stmt in &case.body {
                        if stmt.span().contains_inclusive(self.offset) {
                            self.visit_stmt(stmt);
                            return;
                        }
                    }
                    return;
                }
            }
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => self.visit_expr(call),
            Stmt::Break { .. }
            | Stmt::Continue { .. }
            | Stmt::Fallthrough { .. }
            | Stmt::Empty { .. } => {}
        }
    }

    fn visit_exprs(&mut self, exprs: &'a [Expr]) {
        let _ = self.try_visit_exprs(exprs);
    }

    fn try_visit_exprs(&mut self, exprs: &'a [Expr]) -> bool {
        for expr in exprs {
            if expr.span().contains_inclusive(self.offset) {
                self.visit_expr(expr);
                return true;
            }
        }
        false
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        // A hit on the star of `*X` behaves like a hit at the start of X.
        if let Expr::Star { x, star, .. } = expr {
            if self.offset == *star {
                self.offset = x.span().start;
            }
        }
        self.path.push(Node::Expr(expr));
        match expr {
            Expr::Ident(ident) => {
                if self.hit_ident(ident) {
                    self.path.push(Node::Ident(ident));
                }
            }
            Expr::BasicLit { .. } | Expr::Bad { .. } => {}
            Expr::Selector { x, sel, .. } => {
                if x.span().contains_inclusive(self.offset)
                    && self.offset <= x.span().end
                    && !sel.span.contains(self.offset)
                {
                    self.visit_expr(x);
                } else if self.hit_ident(sel) {
                    self.path.push(Node::Ident(sel));
                }
            }
            Expr::Call { func, args, .. } => {
                if func.span().contains_inclusive(self.offset) {
                    self.visit_expr(func);
                    return;
                }
                self.visit_exprs(args);
            }
            Expr::Index { x, index, .. } => {
                if x.span().contains_inclusive(self.offset) {
                    self.visit_expr(x);
                } else if index.span().contains_inclusive(self.offset) {
                    self.visit_expr(index);
                }
            }
            Expr::SliceExpr { x, low, high, .. } => {
                if x.span().contains_inclusive(self.offset) {
                    self.visit_expr(x);
                    return;
                }
                for bound in [low, high].into_iter().flatten() {
                    if bound.span().contains_inclusive(self.offset) {
                        self.visit_expr(bound);
                        return;
                    }
                }
            }
            Expr::Star { x, .. } => {
                if x.span().contains_inclusive(self.offset) {
                    self.visit_expr(x);
                }
            }
            Expr::Unary { x, .. } => {
                if x.span().contains_inclusive(self.offset) {
                    self.visit_expr(x);
                }
            }
            Expr::Binary { x, y, .. } => {
                if x.span().contains_inclusive(self.offset) && self.offset <= x.span().end {
                    self.visit_expr(x);
                } else if y.span().contains_inclusive(self.offset) {
                    self.visit_expr(y);
                }
            }
            Expr::Paren { x, .. } => {
                if x.span().contains_inclusive(self.offset) {
                    self.visit_expr(x);
                }
            }
            Expr::Composite { ty, elts, .. } => {
                if let Some(ty) = ty {
                    if ty.span().contains_inclusive(self.offset) {
                        self.visit_type(ty);
                        return;
                    }
                }
                self.visit_exprs(elts);
            }
            Expr::KeyValue { key, value, .. } => {
                if key.span().contains_inclusive(self.offset) && self.offset <= key.span().end {
                    self.visit_expr(key);
                } else if value.span().contains_inclusive(self.offset) {
                    self.visit_expr(value);
                }
            }
            Expr::FuncLit { params, body, .. } => {
                for param in params {
                    if let Some(name) = &param.name {
                        if self.hit_ident(name) {
                            self.path.push(Node::Ident(name));
                            return;
                        }
                    }
                    if param.ty.span().contains_inclusive(self.offset) {
                        self.visit_type(&param.ty);
                        return;
                    }
                }
                if self.hit(body.span) {
                    self.visit_block(body);
                }
            }
            Expr::TypeAssert { x, ty, .. } => {
                if x.span().contains_inclusive(self.offset) && self.offset <= x.span().end {
                    self.visit_expr(x);
                } else if let Some(ty) = ty {
                    if ty.span().contains_inclusive(self.offset) {
                        self.visit_type(ty);
                    }
                }
            }
            Expr::TypeRef { ty, .. } => self.visit_type(ty),
        }
    }
}

/// Finds the record for an expression with source form `expr` on `line`
/// (1-based), optionally also containing `offset`. Returns its type and
/// classification.
pub fn type_and_value_at<'a>(
    info: &'a TypeInfo,
    expr: &str,
    line: u32,
    offset: Option<usize>,
) -> Option<&'a TypeAndValue> {
    info.types
        .iter()
        .find(|rec| {
            rec.expr == expr
                && rec.line == line
                && offset.is_none_or(|off| rec.span.contains_inclusive(off))
        })
        .map(|rec| &rec.tv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::parse_file;

    fn parse(src: &str) -> File {
        parse_file(src).expect("parse").file
    }

    fn ident_at(file: &File, offset: usize) -> Option<String> {
        let path = path_enclosing(file, offset);
        match path.first() {
            Some(Node::Ident(ident)) => Some(ident.name.clone()),
            _ => None,
        }
    }

    #[test]
    fn path_is_leaf_first() {
        let src = "package demo\n\nfunc f() {\n\tprintln(x)\n}\n";
        let file = parse(src);
        let offset = src.find('x').unwrap();
        let path = path_enclosing(&file, offset);
        assert!(matches!(path.first(), Some(Node::Ident(id)) if id.name == "x"));
        assert!(matches!(path.last(), Some(Node::File(_))));
    }

    #[test]
    fn identifier_hit_is_end_inclusive() {
        let src = "package demo\n\nfunc f() {\n\tprintln(value)\n}\n";
        let file = parse(src);
        let end = src.find("value").unwrap() + "value".len();
        assert_eq!(ident_at(&file, end), Some("value".into()));
    }

    #[test]
    fn import_path_hit_includes_alias_name() {
        let src = "package demo\n\nimport u \"gno.land/p/demo/ufmt\"\n";
        let file = parse(src);
        let inside_literal = src.find("p/demo").unwrap();
        let path = path_enclosing(&file, inside_literal);
        assert!(matches!(path.first(), Some(Node::Ident(id)) if id.name == "u"));
        assert!(matches!(path.get(1), Some(Node::Import(_))));
    }

    #[test]
    fn star_hit_lands_on_inner_identifier() {
        let src = "package demo\n\nfunc f(p *int) {\n\t_ = *p\n}\n";
        let file = parse(src);
        let star = src.rfind("*p").unwrap();
        assert_eq!(ident_at(&file, star), Some("p".into()));
    }

    #[test]
    fn selector_path_keeps_parent() {
        let src = "package demo\n\nfunc f() {\n\tufmt.Println(1)\n}\n";
        let file = parse(src);
        let sel_offset = src.find("Println").unwrap();
        let path = path_enclosing(&file, sel_offset);
        assert!(matches!(path.first(), Some(Node::Ident(id)) if id.name == "Println"));
        assert!(
            matches!(path.get(1), Some(Node::Expr(Expr::Selector { .. }))),
            "selector parent expected, got {:?}",
            path.get(1)
        );
    }
}
