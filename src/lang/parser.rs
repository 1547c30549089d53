use crate::lang::{
    ast::*,
    lexer::lex,
    span::{LineIndex, Span},
    token::{Comment, Token, TokenKind},
};

#[derive(Clone, Debug)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
}

impl SyntaxErrors {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }
}

/// Parse result. The file is always present and may be partial: editors
/// query broken source constantly, so recovery matters more than rejection.
#[derive(Debug)]
pub struct ParseResult {
    pub file: File,
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse one source file. `Err` only when the text has no package clause
/// at all; anything else yields a partial `File` plus errors.
pub fn parse_file(source: &str) -> Result<ParseResult, SyntaxErrors> {
    let lexed = lex(source);
    let mut errors: Vec<SyntaxError> = lexed
        .errors
        .into_iter()
        .map(|err| SyntaxError::new(err.message, err.span))
        .collect();
    let docs = DocComments::new(source, &lexed.comments);
    let parser = Parser::new(source, lexed.tokens, docs);
    match parser.parse() {
        Ok((file, mut parse_errors)) => {
            errors.append(&mut parse_errors);
            Ok(ParseResult { file, errors })
        }
        Err(err) => {
            errors.push(err);
            Err(SyntaxErrors::new(errors))
        }
    }
}

/// Doc-comment lookup: a group of consecutive comment lines ending on the
/// line directly above a declaration is that declaration's doc.
struct DocComments {
    /// (start_line, end_line, text) per group.
    groups: Vec<(u32, u32, String)>,
    index: LineIndex,
}

impl DocComments {
    fn new(source: &str, comments: &[Comment]) -> Self {
        let index = LineIndex::new(source);
        let mut groups: Vec<(u32, u32, String)> = Vec::new();
        for comment in comments {
            let start_line = index.line(comment.span.start);
            let end_line = index.line(comment.span.end.saturating_sub(1).max(comment.span.start));
            let text = comment.text.strip_prefix(' ').unwrap_or(&comment.text);
            match groups.last_mut() {
                Some((_, last_end, body)) if *last_end + 1 == start_line => {
                    body.push('\n');
                    body.push_str(text);
                    *last_end = end_line;
                }
                _ => groups.push((start_line, end_line, text.to_string())),
            }
        }
        Self { groups, index }
    }

    fn doc_for(&self, decl_start: usize) -> Option<String> {
        let decl_line = self.index.line(decl_start);
        self.groups
            .iter()
            .find(|(_, end, _)| *end + 1 == decl_line)
            .map(|(_, _, text)| text.trim_end().to_string())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    docs: DocComments,
    /// Suppresses composite literals while parsing control-clause headers.
    no_composite: bool,
    source_len: usize,
}

impl Parser {
    fn new(source: &str, tokens: Vec<Token>, docs: DocComments) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            docs,
            no_composite: false,
            source_len: source.len(),
        }
    }

    fn parse(mut self) -> Result<(File, Vec<SyntaxError>), SyntaxError> {
        self.skip_semis();
        if !self.matches(&TokenKind::Package) {
            return Err(SyntaxError::new(
                "expected package clause",
                self.current_span(),
            ));
        }
        let package = self
            .expect_ident("expected package name")
            .unwrap_or_else(|| Ident::new("", self.current_span()));
        self.skip_semis();

        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            self.parse_import_decl(&mut imports);
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while !self.at_eof() {
            if self.matches(&TokenKind::Semi) {
                continue;
            }
            if self.check(&TokenKind::Import) {
                // Stray import after the first declaration block.
                self.parse_import_decl(&mut imports);
                continue;
            }
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(err) => {
                    self.report(err);
                    self.synchronize_decl();
                }
            }
        }

        let file = File {
            package,
            imports,
            decls,
            span: Span::new(0, self.source_len),
        };
        Ok((file, self.errors))
    }

    // ---- token plumbing ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_span(&self) -> Span {
        self.current().span
    }

    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            return Span::default();
        }
        self.tokens[self.pos - 1].span
    }

    fn peek_kind(&self) -> &TokenKind {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(message, self.current_span()))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Option<Ident> {
        if let TokenKind::Ident(name) = self.current_kind() {
            let name = name.clone();
            let span = self.current_span();
            self.advance();
            Some(Ident::new(name, span))
        } else {
            self.report(SyntaxError::new(message, self.current_span()));
            None
        }
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn skip_semis(&mut self) {
        while self.matches(&TokenKind::Semi) {}
    }

    fn synchronize_decl(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current_kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Func | TokenKind::Var | TokenKind::Const | TokenKind::Type
                    if depth == 0 =>
                {
                    return;
                }
                TokenKind::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn synchronize_stmt(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current_kind() {
                TokenKind::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ---- declarations ----

    fn parse_import_decl(&mut self, imports: &mut Vec<ImportSpec>) {
        let _ = self.advance(); // import
        if self.matches(&TokenKind::LParen) {
            self.skip_semis();
            while !self.check(&TokenKind::RParen) && !self.at_eof() {
                if let Some(spec) = self.parse_import_spec() {
                    imports.push(spec);
                }
                self.skip_semis();
            }
            let _ = self.matches(&TokenKind::RParen);
        } else if let Some(spec) = self.parse_import_spec() {
            imports.push(spec);
        }
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let start = self.current_span().start;
        let alias = match self.current_kind() {
            TokenKind::Ident(name) => {
                let alias = Ident::new(name.clone(), self.current_span());
                self.advance();
                Some(alias)
            }
            TokenKind::Dot => {
                self.advance();
                None
            }
            _ => None,
        };
        if let TokenKind::Str(value) = self.current_kind() {
            let path = StringLit {
                value: value.clone(),
                span: self.current_span(),
            };
            self.advance();
            Some(ImportSpec {
                alias,
                path,
                span: Span::new(start, self.prev_span().end),
            })
        } else {
            self.report(SyntaxError::new(
                "expected import path string",
                self.current_span(),
            ));
            self.synchronize_stmt();
            None
        }
    }

    fn parse_decl(&mut self) -> Result<Decl, SyntaxError> {
        match self.current_kind() {
            TokenKind::Func => self.parse_func_decl().map(Decl::Func),
            TokenKind::Const => self.parse_gen_decl(GenKind::Const).map(Decl::Gen),
            TokenKind::Var => self.parse_gen_decl(GenKind::Var).map(Decl::Gen),
            TokenKind::Type => self.parse_gen_decl(GenKind::Type).map(Decl::Gen),
            _ => Err(SyntaxError::new(
                "expected declaration",
                self.current_span(),
            )),
        }
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, SyntaxError> {
        let start = self.current_span().start;
        let doc = self.docs.doc_for(start);
        self.expect(&TokenKind::Func, "expected `func`")?;

        let recv = if self.check(&TokenKind::LParen) {
            Some(self.parse_receiver()?)
        } else {
            None
        };

        let name = self
            .expect_ident("expected function name")
            .unwrap_or_else(|| Ident::new("", self.current_span()));
        let params = self.parse_param_list()?;
        let results = self.parse_results()?;
        let body = if self.check(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            doc,
            recv,
            name,
            params,
            results,
            body,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_receiver(&mut self) -> Result<Receiver, SyntaxError> {
        let start = self.current_span().start;
        self.expect(&TokenKind::LParen, "expected receiver")?;
        let first = self.expect_ident("expected receiver name or type");
        let (name, pointer, base) = if self.check(&TokenKind::RParen) {
            // `func (T) M()` — type only.
            (None, false, first.unwrap_or_else(|| Ident::new("", self.current_span())))
        } else {
            let pointer = self.matches(&TokenKind::Star);
            let base = self
                .expect_ident("expected receiver base type")
                .unwrap_or_else(|| Ident::new("", self.current_span()));
            (first, pointer, base)
        };
        self.expect(&TokenKind::RParen, "expected `)` after receiver")?;
        Ok(Receiver {
            name,
            base,
            pointer,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_param_list(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.expect(&TokenKind::LParen, "expected `(`")?;
        let mut raw: Vec<Param> = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.at_eof() {
            let start = self.current_span().start;
            let param = if self.ident_starts_named_param() {
                let name = self.expect_ident("expected parameter name");
                let variadic = self.matches(&TokenKind::Ellipsis);
                let ty = self.parse_type()?;
                Param {
                    name,
                    ty,
                    variadic,
                    span: Span::new(start, self.prev_span().end),
                }
            } else {
                let variadic = self.matches(&TokenKind::Ellipsis);
                let ty = self.parse_type()?;
                Param {
                    name: None,
                    ty,
                    variadic,
                    span: Span::new(start, self.prev_span().end),
                }
            };
            raw.push(param);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "expected `)` after parameters")?;
        Ok(resolve_param_names(raw))
    }

    /// `a int` or `a ...int` — an identifier directly followed by a type.
    fn ident_starts_named_param(&self) -> bool {
        if !matches!(self.current_kind(), TokenKind::Ident(_)) {
            return false;
        }
        match self.peek_kind() {
            TokenKind::Ident(_)
            | TokenKind::Star
            | TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Func
            | TokenKind::Interface
            | TokenKind::Struct
            | TokenKind::Ellipsis
            | TokenKind::LParen => true,
            _ => false,
        }
    }

    fn parse_results(&mut self) -> Result<Vec<TypeExpr>, SyntaxError> {
        match self.current_kind() {
            TokenKind::LParen => {
                let params = self.parse_param_list()?;
                Ok(params.into_iter().map(|p| p.ty).collect())
            }
            TokenKind::LBrace | TokenKind::Semi | TokenKind::Eof => Ok(Vec::new()),
            _ if self.type_starts_here() => Ok(vec![self.parse_type()?]),
            _ => Ok(Vec::new()),
        }
    }

    fn type_starts_here(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Ident(_)
                | TokenKind::Star
                | TokenKind::LBracket
                | TokenKind::Map
                | TokenKind::Chan
                | TokenKind::Func
                | TokenKind::Interface
                | TokenKind::Struct
        )
    }

    fn parse_gen_decl(&mut self, kind: GenKind) -> Result<GenDecl, SyntaxError> {
        let start = self.current_span().start;
        let doc = self.docs.doc_for(start);
        self.advance(); // const / var / type
        let mut specs = Vec::new();
        if self.matches(&TokenKind::LParen) {
            self.skip_semis();
            while !self.check(&TokenKind::RParen) && !self.at_eof() {
                specs.push(self.parse_spec(kind)?);
                self.skip_semis();
            }
            self.expect(&TokenKind::RParen, "expected `)` after declaration group")?;
        } else {
            specs.push(self.parse_spec(kind)?);
        }
        Ok(GenDecl {
            doc,
            kind,
            specs,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_spec(&mut self, kind: GenKind) -> Result<Spec, SyntaxError> {
        let start = self.current_span().start;
        if kind == GenKind::Type {
            let name = self
                .expect_ident("expected type name")
                .unwrap_or_else(|| Ident::new("", self.current_span()));
            let _ = self.matches(&TokenKind::Assign); // alias form
            let ty = self.parse_type()?;
            return Ok(Spec::Type(TypeSpec {
                name,
                ty,
                span: Span::new(start, self.prev_span().end),
            }));
        }
        let mut names = Vec::new();
        loop {
            match self.expect_ident("expected identifier") {
                Some(id) => names.push(id),
                None => break,
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        let ty = if self.type_starts_here() && !self.check_assign() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let mut values = Vec::new();
        if self.matches(&TokenKind::Assign) {
            loop {
                values.push(self.parse_expr()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(Spec::Value(ValueSpec {
            names,
            ty,
            values,
            span: Span::new(start, self.prev_span().end),
        }))
    }

    fn check_assign(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Assign)
    }

    // ---- types ----

    fn parse_type(&mut self) -> Result<TypeExpr, SyntaxError> {
        let start = self.current_span().start;
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let ident = Ident::new(name, self.current_span());
                self.advance();
                if self.check(&TokenKind::Dot) && matches!(self.peek_kind(), TokenKind::Ident(_)) {
                    self.advance();
                    let sel = self
                        .expect_ident("expected type name")
                        .unwrap_or_else(|| Ident::new("", self.current_span()));
                    Ok(TypeExpr::Qualified {
                        pkg: ident,
                        name: sel,
                        span: Span::new(start, self.prev_span().end),
                    })
                } else {
                    Ok(TypeExpr::Name(ident))
                }
            }
            TokenKind::Star => {
                self.advance();
                let elem = self.parse_type()?;
                Ok(TypeExpr::Pointer {
                    elem: Box::new(elem),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::LBracket => {
                self.advance();
                if self.matches(&TokenKind::RBracket) {
                    let elem = self.parse_type()?;
                    Ok(TypeExpr::Slice {
                        elem: Box::new(elem),
                        span: Span::new(start, self.prev_span().end),
                    })
                } else {
                    let len = if self.check(&TokenKind::Ellipsis) {
                        self.advance();
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    self.expect(&TokenKind::RBracket, "expected `]` in array type")?;
                    let elem = self.parse_type()?;
                    Ok(TypeExpr::Array {
                        len,
                        elem: Box::new(elem),
                        span: Span::new(start, self.prev_span().end),
                    })
                }
            }
            TokenKind::Map => {
                self.advance();
                self.expect(&TokenKind::LBracket, "expected `[` in map type")?;
                let key = self.parse_type()?;
                self.expect(&TokenKind::RBracket, "expected `]` in map type")?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Chan => {
                self.advance();
                let _ = self.matches(&TokenKind::Arrow);
                let elem = self.parse_type()?;
                Ok(TypeExpr::Chan {
                    elem: Box::new(elem),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Arrow => {
                self.advance();
                self.expect(&TokenKind::Chan, "expected `chan` after `<-`")?;
                let elem = self.parse_type()?;
                Ok(TypeExpr::Chan {
                    elem: Box::new(elem),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Struct => {
                self.advance();
                self.parse_struct_type(start)
            }
            TokenKind::Interface => {
                self.advance();
                self.parse_interface_type(start)
            }
            TokenKind::Func => {
                self.advance();
                let params = self.parse_param_list()?;
                let results = self.parse_results()?;
                Ok(TypeExpr::Func {
                    params,
                    results,
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.expect(&TokenKind::RParen, "expected `)`")?;
                Ok(inner)
            }
            _ => Err(SyntaxError::new("expected type", self.current_span())),
        }
    }

    fn parse_struct_type(&mut self, start: usize) -> Result<TypeExpr, SyntaxError> {
        self.expect(&TokenKind::LBrace, "expected `{` in struct type")?;
        self.skip_semis();
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let field_start = self.current_span().start;
            let mut names = Vec::new();
            let mut embedded = false;
            if matches!(self.current_kind(), TokenKind::Ident(_)) {
                // Could be named fields or an embedded type.
                let Some(first) = self.expect_ident("expected field name") else {
                    break;
                };
                if self.matches(&TokenKind::Comma) {
                    names.push(first);
                    loop {
                        match self.expect_ident("expected field name") {
                            Some(id) => names.push(id),
                            None => break,
                        }
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                } else if matches!(
                    self.current_kind(),
                    TokenKind::Semi | TokenKind::RBrace | TokenKind::Str(_) | TokenKind::Dot
                ) {
                    embedded = true;
                    names.push(first);
                } else {
                    names.push(first);
                }
            }
            let ty = if embedded {
                let base = names
                    .pop()
                    .unwrap_or_else(|| Ident::new("", self.current_span()));
                if self.matches(&TokenKind::Dot) {
                    let sel = self
                        .expect_ident("expected embedded type name")
                        .unwrap_or_else(|| Ident::new("", self.current_span()));
                    TypeExpr::Qualified {
                        pkg: base,
                        name: sel,
                        span: Span::new(field_start, self.prev_span().end),
                    }
                } else {
                    TypeExpr::Name(base)
                }
            } else {
                self.parse_type()?
            };
            let tag = if let TokenKind::Str(tag) = self.current_kind() {
                let tag = tag.clone();
                self.advance();
                Some(tag)
            } else {
                None
            };
            fields.push(FieldDef {
                names,
                ty,
                tag,
                span: Span::new(field_start, self.prev_span().end),
            });
            self.skip_semis();
        }
        self.expect(&TokenKind::RBrace, "expected `}` after struct fields")?;
        Ok(TypeExpr::Struct {
            fields,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_interface_type(&mut self, start: usize) -> Result<TypeExpr, SyntaxError> {
        self.expect(&TokenKind::LBrace, "expected `{` in interface type")?;
        self.skip_semis();
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let member_start = self.current_span().start;
            if matches!(self.current_kind(), TokenKind::Ident(_))
                && matches!(self.peek_kind(), TokenKind::LParen)
            {
                let name = self.expect_ident("expected method name");
                let params = self.parse_param_list()?;
                let results = self.parse_results()?;
                methods.push(InterfaceMember {
                    name,
                    params,
                    results,
                    embedded: None,
                    span: Span::new(member_start, self.prev_span().end),
                });
            } else {
                let embedded = self.parse_type()?;
                methods.push(InterfaceMember {
                    name: None,
                    params: Vec::new(),
                    results: Vec::new(),
                    embedded: Some(embedded),
                    span: Span::new(member_start, self.prev_span().end),
                });
            }
            self.skip_semis();
        }
        self.expect(&TokenKind::RBrace, "expected `}` after interface body")?;
        Ok(TypeExpr::Interface {
            methods,
            span: Span::new(start, self.prev_span().end),
        })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let start = self.current_span().start;
        self.expect(&TokenKind::LBrace, "expected `{`")?;
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize_stmt();
                }
            }
            self.skip_semis();
        }
        self.expect(&TokenKind::RBrace, "expected `}`")?;
        Ok(Block {
            stmts,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let span = self.current_span();
        match self.current_kind() {
            TokenKind::Var => Ok(Stmt::Decl(self.parse_gen_decl(GenKind::Var)?)),
            TokenKind::Const => Ok(Stmt::Decl(self.parse_gen_decl(GenKind::Const)?)),
            TokenKind::Type => Ok(Stmt::Decl(self.parse_gen_decl(GenKind::Type)?)),
            TokenKind::Return => {
                self.advance();
                let mut values = Vec::new();
                if !matches!(
                    self.current_kind(),
                    TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof
                ) {
                    loop {
                        values.push(self.parse_expr()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                Ok(Stmt::Return {
                    values,
                    span: Span::new(span.start, self.prev_span().end),
                })
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Select => self.parse_select(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Go => {
                self.advance();
                let call = self.parse_expr()?;
                Ok(Stmt::Go {
                    call,
                    span: Span::new(span.start, self.prev_span().end),
                })
            }
            TokenKind::Defer => {
                self.advance();
                let call = self.parse_expr()?;
                Ok(Stmt::Defer {
                    call,
                    span: Span::new(span.start, self.prev_span().end),
                })
            }
            TokenKind::Break => {
                self.advance();
                // Optional label.
                if matches!(self.current_kind(), TokenKind::Ident(_)) {
                    self.advance();
                }
                Ok(Stmt::Break { span })
            }
            TokenKind::Continue => {
                self.advance();
                if matches!(self.current_kind(), TokenKind::Ident(_)) {
                    self.advance();
                }
                Ok(Stmt::Continue { span })
            }
            TokenKind::Fallthrough => {
                self.advance();
                Ok(Stmt::Fallthrough { span })
            }
            TokenKind::Goto => {
                self.advance();
                if matches!(self.current_kind(), TokenKind::Ident(_)) {
                    self.advance();
                }
                Ok(Stmt::Empty { span })
            }
            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::Empty { span })
            }
            // Labeled statement: drop the label, keep the statement.
            TokenKind::Ident(_) if matches!(self.peek_kind(), TokenKind::Colon) => {
                self.advance();
                self.advance();
                self.skip_semis();
                if self.check(&TokenKind::RBrace) {
                    return Ok(Stmt::Empty { span });
                }
                self.parse_stmt()
            }
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_span().start;
        let mut lhs = vec![self.parse_expr()?];
        while self.matches(&TokenKind::Comma) {
            lhs.push(self.parse_expr()?);
        }
        match self.current_kind().clone() {
            TokenKind::Define => {
                self.advance();
                let names = lhs
                    .into_iter()
                    .map(|expr| match expr {
                        Expr::Ident(id) => id,
                        other => {
                            let span = other.span();
                            self.report(SyntaxError::new(
                                "expected identifier on left side of `:=`",
                                span,
                            ));
                            Ident::new("", span)
                        }
                    })
                    .collect();
                let mut values = Vec::new();
                loop {
                    values.push(self.parse_expr()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                Ok(Stmt::ShortVar {
                    names,
                    values,
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Assign => {
                self.advance();
                let mut rhs = Vec::new();
                loop {
                    rhs.push(self.parse_expr()?);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                Ok(Stmt::Assign {
                    lhs,
                    rhs,
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::OpAssign(op) => {
                self.advance();
                let rhs = self.parse_expr()?;
                // Desugared: `x op= y` checks like `x = x op y`.
                let lhs_expr = lhs.remove(0);
                let bin = Expr::Binary {
                    x: Box::new(lhs_expr.clone()),
                    op: assign_op(&op),
                    y: Box::new(rhs),
                    span: Span::new(start, self.prev_span().end),
                };
                Ok(Stmt::Assign {
                    lhs: vec![lhs_expr],
                    rhs: vec![bin],
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Inc | TokenKind::Dec => {
                self.advance();
                Ok(Stmt::IncDec {
                    expr: lhs.remove(0),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::Arrow => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Stmt::Send {
                    chan: lhs.remove(0),
                    value,
                    span: Span::new(start, self.prev_span().end),
                })
            }
            _ => Ok(Stmt::Expr(lhs.remove(0))),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_span().start;
        self.advance(); // if
        let saved = std::mem::replace(&mut self.no_composite, true);
        let mut init = None;
        let mut cond = self.parse_header_stmt()?;
        if self.matches(&TokenKind::Semi) {
            init = Some(Box::new(cond));
            cond = self.parse_header_stmt()?;
        }
        self.no_composite = saved;
        let cond = match cond {
            Stmt::Expr(expr) => expr,
            other => {
                let span = other.span();
                self.report(SyntaxError::new("expected condition", span));
                Expr::Bad { span }
            }
        };
        let then = self.parse_block()?;
        let els = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block()?)))
            }
        } else {
            None
        };
        Ok(Stmt::If {
            init,
            cond,
            then,
            els,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_header_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.parse_simple_stmt()
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_span().start;
        self.advance(); // for
        let saved = std::mem::replace(&mut self.no_composite, true);

        if self.check(&TokenKind::LBrace) {
            self.no_composite = saved;
            let body = self.parse_block()?;
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                span: Span::new(start, self.prev_span().end),
            });
        }

        // `for range x` without bindings.
        if self.matches(&TokenKind::Range) {
            let expr = self.parse_expr()?;
            self.no_composite = saved;
            let body = self.parse_block()?;
            return Ok(Stmt::Range {
                key: None,
                value: None,
                define: false,
                expr,
                body,
                span: Span::new(start, self.prev_span().end),
            });
        }

        let first = self.parse_range_aware_stmt()?;
        if let Some(range) = first.1 {
            self.no_composite = saved;
            let body = self.parse_block()?;
            let (key, value, define, expr) = range;
            return Ok(Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                span: Span::new(start, self.prev_span().end),
            });
        }
        let first = first.0;

        if self.matches(&TokenKind::Semi) {
            let cond = if self.check(&TokenKind::Semi) {
                None
            } else {
                match self.parse_header_stmt()? {
                    Stmt::Expr(expr) => Some(expr),
                    other => {
                        self.report(SyntaxError::new("expected condition", other.span()));
                        None
                    }
                }
            };
            self.expect(&TokenKind::Semi, "expected `;` in for clause")?;
            let post = if self.check(&TokenKind::LBrace) {
                None
            } else {
                Some(Box::new(self.parse_header_stmt()?))
            };
            self.no_composite = saved;
            let body = self.parse_block()?;
            return Ok(Stmt::For {
                init: Some(Box::new(first)),
                cond,
                post,
                body,
                span: Span::new(start, self.prev_span().end),
            });
        }

        self.no_composite = saved;
        let body = self.parse_block()?;
        let cond = match first {
            Stmt::Expr(expr) => Some(expr),
            other => {
                self.report(SyntaxError::new("expected loop condition", other.span()));
                None
            }
        };
        Ok(Stmt::For {
            init: None,
            cond,
            post: None,
            body,
            span: Span::new(start, self.prev_span().end),
        })
    }

    /// Parses a simple statement inside a `for` header, catching the
    /// `k, v := range x` / `k = range x` forms.
    #[allow(clippy::type_complexity)]
    fn parse_range_aware_stmt(
        &mut self,
    ) -> Result<
        (
            Stmt,
            Option<(Option<Expr>, Option<Expr>, bool, Expr)>,
        ),
        SyntaxError,
    > {
        let start = self.current_span().start;
        let mut lhs = vec![self.parse_expr()?];
        while self.matches(&TokenKind::Comma) {
            lhs.push(self.parse_expr()?);
        }
        let define = match self.current_kind() {
            TokenKind::Define => true,
            TokenKind::Assign => false,
            _ => {
                // Re-enter the ordinary simple-statement tail.
                return self.finish_simple_stmt(start, lhs).map(|s| (s, None));
            }
        };
        self.advance();
        if self.matches(&TokenKind::Range) {
            let expr = self.parse_expr()?;
            let mut iter = lhs.into_iter();
            let key = iter.next();
            let value = iter.next();
            let placeholder = Stmt::Empty {
                span: Span::new(start, start),
            };
            return Ok((placeholder, Some((key, value, define, expr))));
        }
        let mut rhs = Vec::new();
        loop {
            rhs.push(self.parse_expr()?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        let stmt = if define {
            Stmt::ShortVar {
                names: lhs
                    .into_iter()
                    .map(|expr| match expr {
                        Expr::Ident(id) => id,
                        other => Ident::new("", other.span()),
                    })
                    .collect(),
                values: rhs,
                span: Span::new(start, self.prev_span().end),
            }
        } else {
            Stmt::Assign {
                lhs,
                rhs,
                span: Span::new(start, self.prev_span().end),
            }
        };
        Ok((stmt, None))
    }

    fn finish_simple_stmt(&mut self, start: usize, mut lhs: Vec<Expr>) -> Result<Stmt, SyntaxError> {
        match self.current_kind().clone() {
            TokenKind::Inc | TokenKind::Dec => {
                self.advance();
                Ok(Stmt::IncDec {
                    expr: lhs.remove(0),
                    span: Span::new(start, self.prev_span().end),
                })
            }
            TokenKind::OpAssign(op) => {
                self.advance();
                let rhs = self.parse_expr()?;
                let lhs_expr = lhs.remove(0);
                let bin = Expr::Binary {
                    x: Box::new(lhs_expr.clone()),
                    op: assign_op(&op),
                    y: Box::new(rhs),
                    span: Span::new(start, self.prev_span().end),
                };
                Ok(Stmt::Assign {
                    lhs: vec![lhs_expr],
                    rhs: vec![bin],
                    span: Span::new(start, self.prev_span().end),
                })
            }
            _ => Ok(Stmt::Expr(lhs.remove(0))),
        }
    }

    fn parse_switch(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_span().start;
        self.advance(); // switch
        let saved = std::mem::replace(&mut self.no_composite, true);

        let mut init = None;
        let mut tag = None;
        let mut type_switch = None;

        if !self.check(&TokenKind::LBrace) {
            let first = self.parse_header_stmt()?;
            let first = if self.matches(&TokenKind::Semi) {
                init = Some(Box::new(first));
                if self.check(&TokenKind::LBrace) {
                    None
                } else {
                    Some(self.parse_header_stmt()?)
                }
            } else {
                Some(first)
            };
            match first {
                Some(Stmt::Expr(Expr::TypeAssert { x, ty: None, .. })) => {
                    type_switch = Some(None);
                    tag = Some(*x);
                }
                Some(Stmt::ShortVar { names, mut values, .. })
                    if matches!(values.first(), Some(Expr::TypeAssert { ty: None, .. })) =>
                {
                    let bound = names.into_iter().next();
                    if let Some(Expr::TypeAssert { x, .. }) = values.pop() {
                        tag = Some(*x);
                    }
                    type_switch = Some(bound);
                }
                Some(Stmt::Expr(expr)) => tag = Some(expr),
                Some(other) => {
                    self.report(SyntaxError::new("expected switch expression", other.span()));
                }
                None => {}
            }
        }
        self.no_composite = saved;

        self.expect(&TokenKind::LBrace, "expected `{` in switch")?;
        let cases = self.parse_case_clauses()?;
        self.expect(&TokenKind::RBrace, "expected `}` after switch body")?;
        Ok(Stmt::Switch {
            init,
            tag,
            type_switch,
            cases,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_select(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.current_span().start;
        self.advance(); // select
        self.expect(&TokenKind::LBrace, "expected `{` in select")?;
        let cases = self.parse_case_clauses()?;
        self.expect(&TokenKind::RBrace, "expected `}` after select body")?;
        Ok(Stmt::Switch {
            init: None,
            tag: None,
            type_switch: None,
            cases,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_case_clauses(&mut self) -> Result<Vec<SwitchCase>, SyntaxError> {
        let mut cases = Vec::new();
        self.skip_semis();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let case_start = self.current_span().start;
            let mut exprs = Vec::new();
            if self.matches(&TokenKind::Case) {
                loop {
                    // Case lists may hold types (type switches); accept both.
                    if self.type_starts_here() && !matches!(self.current_kind(), TokenKind::Ident(_))
                    {
                        let ty = self.parse_type()?;
                        let span = ty.span();
                        exprs.push(Expr::TypeRef {
                            ty: Box::new(ty),
                            span,
                        });
                    } else {
                        exprs.push(self.parse_expr()?);
                    }
                    // Send/receive comm clauses in selects.
                    if self.matches(&TokenKind::Arrow) {
                        let _ = self.parse_expr()?;
                    }
                    if matches!(self.current_kind(), TokenKind::Define | TokenKind::Assign) {
                        self.advance();
                        let _ = self.parse_expr()?;
                    }
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
            } else if !self.matches(&TokenKind::Default) {
                return Err(SyntaxError::new(
                    "expected `case` or `default`",
                    self.current_span(),
                ));
            }
            self.expect(&TokenKind::Colon, "expected `:` after case clause")?;
            let mut body = Vec::new();
            self.skip_semis();
            while !matches!(
                self.current_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                match self.parse_stmt() {
                    Ok(stmt) => body.push(stmt),
                    Err(err) => {
                        self.report(err);
                        self.synchronize_stmt();
                    }
                }
                self.skip_semis();
            }
            cases.push(SwitchCase {
                exprs,
                body,
                span: Span::new(case_start, self.prev_span().end),
            });
        }
        Ok(cases)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, prec)) = binary_op(self.current_kind()) else {
                return Ok(lhs);
            };
            if prec < min_prec {
                return Ok(lhs);
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                x: Box::new(lhs),
                op,
                y: Box::new(rhs),
                span,
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.current_span();
        let op = match self.current_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::Amp => Some(UnOp::Addr),
            TokenKind::Arrow => Some(UnOp::Recv),
            TokenKind::Caret => Some(UnOp::BitNot),
            TokenKind::Plus => {
                self.advance();
                return self.parse_unary();
            }
            TokenKind::Star => {
                let star = span.start;
                self.advance();
                let x = self.parse_unary()?;
                let full = Span::new(span.start, x.span().end);
                return Ok(Expr::Star {
                    x: Box::new(x),
                    star,
                    span: full,
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let x = self.parse_unary()?;
            let full = Span::new(span.start, x.span().end);
            return Ok(Expr::Unary {
                op,
                x: Box::new(x),
                span: full,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_operand()?;
        loop {
            match self.current_kind() {
                TokenKind::Dot => {
                    self.advance();
                    if self.matches(&TokenKind::LParen) {
                        // Type assertion.
                        let ty = if self.matches(&TokenKind::Type) {
                            None
                        } else {
                            Some(Box::new(self.parse_type()?))
                        };
                        self.expect(&TokenKind::RParen, "expected `)` after type assertion")?;
                        let span = Span::new(expr.span().start, self.prev_span().end);
                        expr = Expr::TypeAssert {
                            x: Box::new(expr),
                            ty,
                            span,
                        };
                    } else if let TokenKind::Ident(name) = self.current_kind() {
                        let sel = Ident::new(name.clone(), self.current_span());
                        self.advance();
                        let span = Span::new(expr.span().start, sel.span.end);
                        expr = Expr::Selector {
                            x: Box::new(expr),
                            sel,
                            span,
                        };
                    } else {
                        // Mid-edit `pkg.` — keep a selector with an empty
                        // ident at the cursor so completion has a node.
                        let here = self.current_span().start;
                        self.report(SyntaxError::new(
                            "expected selector after `.`",
                            Span::new(here, here),
                        ));
                        let span = Span::new(expr.span().start, here);
                        expr = Expr::Selector {
                            x: Box::new(expr),
                            sel: Ident::new("", Span::new(here, here)),
                            span,
                        };
                        return Ok(expr);
                    }
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&TokenKind::RParen) && !self.at_eof() {
                        args.push(self.parse_expr()?);
                        let _ = self.matches(&TokenKind::Ellipsis);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "expected `)` after arguments")?;
                    let span = Span::new(expr.span().start, self.prev_span().end);
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let low = if self.check(&TokenKind::Colon) {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    if self.matches(&TokenKind::Colon) {
                        let high = if self.check(&TokenKind::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.parse_expr()?))
                        };
                        // Full slice expressions carry a capacity too.
                        if self.matches(&TokenKind::Colon) {
                            let _ = self.parse_expr()?;
                        }
                        self.expect(&TokenKind::RBracket, "expected `]`")?;
                        let span = Span::new(expr.span().start, self.prev_span().end);
                        expr = Expr::SliceExpr {
                            x: Box::new(expr),
                            low,
                            high,
                            span,
                        };
                    } else {
                        self.expect(&TokenKind::RBracket, "expected `]`")?;
                        let span = Span::new(expr.span().start, self.prev_span().end);
                        expr = Expr::Index {
                            x: Box::new(expr),
                            index: low.unwrap_or_else(|| {
                                Box::new(Expr::Bad {
                                    span: self.prev_span(),
                                })
                            }),
                            span,
                        };
                    }
                }
                TokenKind::LBrace if !self.no_composite && composite_ok(&expr) => {
                    let ty_span = expr.span();
                    let ty = expr_to_type(&expr);
                    expr = self.parse_composite_body(ty.map(Box::new), ty_span.start)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_composite_body(
        &mut self,
        ty: Option<Box<TypeExpr>>,
        start: usize,
    ) -> Result<Expr, SyntaxError> {
        self.expect(&TokenKind::LBrace, "expected `{`")?;
        let saved = std::mem::replace(&mut self.no_composite, false);
        let mut elts = Vec::new();
        self.skip_semis();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let elt = if self.check(&TokenKind::LBrace) {
                // Nested literal with elided type.
                self.parse_composite_body(None, self.current_span().start)?
            } else {
                self.parse_expr()?
            };
            let elt = if self.matches(&TokenKind::Colon) {
                let value = if self.check(&TokenKind::LBrace) {
                    self.parse_composite_body(None, self.current_span().start)?
                } else {
                    self.parse_expr()?
                };
                let span = elt.span().to(value.span());
                Expr::KeyValue {
                    key: Box::new(elt),
                    value: Box::new(value),
                    span,
                }
            } else {
                elt
            };
            elts.push(elt);
            if !self.matches(&TokenKind::Comma) {
                self.skip_semis();
                break;
            }
            self.skip_semis();
        }
        self.expect(&TokenKind::RBrace, "expected `}` after composite literal")?;
        self.no_composite = saved;
        Ok(Expr::Composite {
            ty,
            elts,
            span: Span::new(start, self.prev_span().end),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.current_span();
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(Ident::new(name, span)))
            }
            TokenKind::Int(raw) => {
                self.advance();
                Ok(Expr::BasicLit {
                    kind: LitKind::Int,
                    raw,
                    span,
                })
            }
            TokenKind::Float(raw) => {
                self.advance();
                Ok(Expr::BasicLit {
                    kind: LitKind::Float,
                    raw,
                    span,
                })
            }
            TokenKind::Char(raw) => {
                self.advance();
                Ok(Expr::BasicLit {
                    kind: LitKind::Char,
                    raw,
                    span,
                })
            }
            TokenKind::Str(value) => {
                self.advance();
                // Keep literals in quoted source form so expression strings
                // match what the type info records.
                Ok(Expr::BasicLit {
                    kind: LitKind::Str,
                    raw: format!("{value:?}"),
                    span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "expected `)`")?;
                Ok(Expr::Paren {
                    x: Box::new(inner),
                    span: Span::new(span.start, self.prev_span().end),
                })
            }
            TokenKind::Func => {
                self.advance();
                let params = self.parse_param_list()?;
                let results = self.parse_results()?;
                if self.check(&TokenKind::LBrace) {
                    let body = self.parse_block()?;
                    Ok(Expr::FuncLit {
                        params,
                        results,
                        body,
                        span: Span::new(span.start, self.prev_span().end),
                    })
                } else {
                    let ty = TypeExpr::Func {
                        params,
                        results,
                        span: Span::new(span.start, self.prev_span().end),
                    };
                    Ok(Expr::TypeRef {
                        ty: Box::new(ty),
                        span: Span::new(span.start, self.prev_span().end),
                    })
                }
            }
            // Type operands: conversions like `[]byte(s)` and literals
            // like `map[string]int{...}`.
            TokenKind::LBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface => {
                let ty = self.parse_type()?;
                let ty_span = ty.span();
                Ok(Expr::TypeRef {
                    ty: Box::new(ty),
                    span: ty_span,
                })
            }
            _ => Err(SyntaxError::new("expected expression", span)),
        }
    }
}

fn assign_op(kind: &TokenKind) -> BinOp {
    match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Rem,
        TokenKind::Amp => BinOp::And,
        TokenKind::Pipe => BinOp::Or,
        TokenKind::Caret => BinOp::Xor,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::AndNot => BinOp::AndNot,
        _ => BinOp::Add,
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinOp::LOr, 1),
        TokenKind::AndAnd => (BinOp::LAnd, 2),
        TokenKind::EqEq => (BinOp::Eq, 3),
        TokenKind::NotEq => (BinOp::NotEq, 3),
        TokenKind::Lt => (BinOp::Lt, 3),
        TokenKind::LtEq => (BinOp::LtEq, 3),
        TokenKind::Gt => (BinOp::Gt, 3),
        TokenKind::GtEq => (BinOp::GtEq, 3),
        TokenKind::Plus => (BinOp::Add, 4),
        TokenKind::Minus => (BinOp::Sub, 4),
        TokenKind::Pipe => (BinOp::Or, 4),
        TokenKind::Caret => (BinOp::Xor, 4),
        TokenKind::Star => (BinOp::Mul, 5),
        TokenKind::Slash => (BinOp::Div, 5),
        TokenKind::Percent => (BinOp::Rem, 5),
        TokenKind::Shl => (BinOp::Shl, 5),
        TokenKind::Shr => (BinOp::Shr, 5),
        TokenKind::Amp => (BinOp::And, 5),
        TokenKind::AndNot => (BinOp::AndNot, 5),
        _ => return None,
    })
}

/// Whether `expr` can be the type part of a composite literal.
fn composite_ok(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_) | Expr::Selector { .. } | Expr::TypeRef { .. }
    )
}

fn expr_to_type(expr: &Expr) -> Option<TypeExpr> {
    match expr {
        Expr::Ident(id) => Some(TypeExpr::Name(id.clone())),
        Expr::Selector { x, sel, span } => {
            if let Expr::Ident(pkg) = x.as_ref() {
                Some(TypeExpr::Qualified {
                    pkg: pkg.clone(),
                    name: sel.clone(),
                    span: *span,
                })
            } else {
                None
            }
        }
        Expr::TypeRef { ty, .. } => Some((**ty).clone()),
        _ => None,
    }
}

/// Resolves `a, b int` parameter groups: a trailing named parameter gives
/// its type to the bare name entries before it.
fn resolve_param_names(raw: Vec<Param>) -> Vec<Param> {
    let any_named = raw.iter().any(|p| p.name.is_some());
    if !any_named {
        return raw;
    }
    let mut out: Vec<Param> = Vec::with_capacity(raw.len());
    let mut pending: Vec<Param> = Vec::new();
    for param in raw {
        if param.name.is_some() {
            for mut earlier in pending.drain(..) {
                if let TypeExpr::Name(id) = earlier.ty.clone() {
                    earlier.name = Some(id);
                    earlier.ty = param.ty.clone();
                }
                out.push(earlier);
            }
            out.push(param);
        } else {
            pending.push(param);
        }
    }
    out.append(&mut pending);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> File {
        let result = parse_file(src).expect("parse");
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:?}",
            result.errors
        );
        result.file
    }

    #[test]
    fn parses_package_and_imports() {
        let file = parse_ok(
            "package demo\n\nimport (\n\t\"gno.land/p/demo/ufmt\"\n\tr \"gno.land/r/demo/users\"\n)\n",
        );
        assert_eq!(file.package.name, "demo");
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].local_name(), "ufmt");
        assert_eq!(file.imports[1].local_name(), "r");
    }

    #[test]
    fn parses_func_with_receiver() {
        let file = parse_ok(
            "package demo\n\nfunc (t *Tree) Size() int {\n\treturn t.size\n}\n",
        );
        let Decl::Func(decl) = &file.decls[0] else {
            panic!("expected func decl");
        };
        let recv = decl.recv.as_ref().expect("receiver");
        assert!(recv.pointer);
        assert_eq!(recv.base.name, "Tree");
        assert_eq!(decl.name.name, "Size");
    }

    #[test]
    fn attaches_doc_comments() {
        let file = parse_ok(
            "package demo\n\n// Foo does one thing.\n// Carefully.\nfunc Foo() {}\n",
        );
        let Decl::Func(decl) = &file.decls[0] else {
            panic!("expected func decl");
        };
        assert_eq!(
            decl.doc.as_deref(),
            Some("Foo does one thing.\nCarefully.")
        );
    }

    #[test]
    fn parses_struct_type_decl() {
        let file = parse_ok(
            "package demo\n\ntype User struct {\n\tName string\n\tAge, Score int\n}\n",
        );
        let Decl::Gen(decl) = &file.decls[0] else {
            panic!("expected gen decl");
        };
        assert_eq!(decl.kind, GenKind::Type);
        let Spec::Type(spec) = &decl.specs[0] else {
            panic!("expected type spec");
        };
        let TypeExpr::Struct { fields, .. } = &spec.ty else {
            panic!("expected struct type");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].names.len(), 2);
    }

    #[test]
    fn parses_grouped_params() {
        let file = parse_ok("package demo\n\nfunc Add(a, b int) int { return a + b }\n");
        let Decl::Func(decl) = &file.decls[0] else {
            panic!("expected func");
        };
        assert_eq!(decl.params.len(), 2);
        assert!(decl.params.iter().all(|p| p.name.is_some()));
    }

    #[test]
    fn parses_control_flow() {
        parse_ok(
            "package demo\n\nfunc Loop(xs []int) int {\n\tsum := 0\n\tfor i, x := range xs {\n\t\tif x > 0 {\n\t\t\tsum += x\n\t\t} else {\n\t\t\tsum -= i\n\t\t}\n\t}\n\tfor sum > 100 {\n\t\tsum /= 2\n\t}\n\treturn sum\n}\n",
        );
    }

    #[test]
    fn parses_composite_literals() {
        parse_ok(
            "package demo\n\ntype P struct{ X, Y int }\n\nvar origin = P{X: 0, Y: 0}\n\nvar table = map[string]int{\"a\": 1}\n",
        );
    }

    #[test]
    fn recovers_from_trailing_dot() {
        let result = parse_file("package demo\n\nfunc f() {\n\tufmt.\n}\n").expect("partial file");
        assert!(!result.errors.is_empty());
        // The selector with an empty ident must survive for completion.
        let Decl::Func(decl) = &result.file.decls[0] else {
            panic!("expected func");
        };
        assert!(decl.body.is_some());
    }

    #[test]
    fn missing_package_clause_is_fatal() {
        assert!(parse_file("func f() {}\n").is_err());
    }

    #[test]
    fn parses_type_switch() {
        parse_ok(
            "package demo\n\nfunc Kind(v interface{}) string {\n\tswitch v.(type) {\n\tcase string:\n\t\treturn \"s\"\n\tdefault:\n\t\treturn \"?\"\n\t}\n}\n",
        );
    }

    #[test]
    fn parse_is_deterministic() {
        let src = "package demo\n\nfunc A() {}\n\nfunc B() {}\n";
        let a = parse_ok(src);
        let b = parse_ok(src);
        assert_eq!(a.decls.len(), b.decls.len());
        assert_eq!(a.decls[0].span(), b.decls[0].span());
    }
}
