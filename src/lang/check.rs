use crate::lang::{
    ast::*,
    span::{LineIndex, Span},
    types::{Basic, InterfaceType, Signature, StructType, Type, Untyped},
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Semantic classification of an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Void,
    Type,
    Builtin,
    Nil,
    Var,
    MapIndex,
    Value,
    Unknown,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Mode::Void => "void",
            Mode::Type => "type",
            Mode::Builtin => "builtin",
            Mode::Nil => "nil",
            Mode::Var => "var",
            Mode::MapIndex => "mapindex",
            Mode::Value => "value",
            Mode::Unknown => "unknown",
        };
        write!(f, "{text}")
    }
}

#[derive(Clone, Debug)]
pub struct TypeAndValue {
    pub ty: Type,
    pub value: Option<String>,
    pub mode: Mode,
}

impl TypeAndValue {
    fn new(ty: Type, mode: Mode) -> Self {
        Self {
            ty,
            value: None,
            mode,
        }
    }

    fn invalid() -> Self {
        Self::new(Type::Invalid, Mode::Unknown)
    }
}

/// One record per checked expression: enough to answer "what is the thing
/// with this source form on this line".
#[derive(Clone, Debug)]
pub struct ExprRecord {
    pub expr: String,
    pub file: String,
    pub line: u32,
    pub span: Span,
    pub tv: TypeAndValue,
}

#[derive(Clone, Debug)]
pub struct IdentRecord {
    pub name: String,
    pub file: String,
    pub span: Span,
    pub ty: Type,
}

/// The types.Info counterpart: expression types plus ident defs and uses.
#[derive(Clone, Debug, Default)]
pub struct TypeInfo {
    pub types: Vec<ExprRecord>,
    pub defs: Vec<IdentRecord>,
    pub uses: Vec<IdentRecord>,
}

#[derive(Clone, Debug)]
pub struct TypeError {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.col, self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjKind {
    Const,
    Var,
    TypeName,
    Func,
    Builtin,
    Nil,
    PkgName,
}

#[derive(Clone, Debug)]
pub struct Object {
    pub kind: ObjKind,
    pub ty: Type,
    pub value: Option<String>,
    /// Import path, for `PkgName` objects.
    pub pkg_path: Option<String>,
}

impl Object {
    fn new(kind: ObjKind, ty: Type) -> Self {
        Self {
            kind,
            ty,
            value: None,
            pkg_path: None,
        }
    }
}

/// The checked surface of one package, as seen by its importers.
#[derive(Clone, Debug, Default)]
pub struct PackageScope {
    pub import_path: String,
    pub name: String,
    pub objects: HashMap<String, Object>,
    /// Receiver base type name to method signatures.
    pub methods: HashMap<String, Vec<(String, Signature)>>,
}

impl PackageScope {
    pub fn method(&self, base: &str, name: &str) -> Option<&Signature> {
        self.methods
            .get(base)?
            .iter()
            .find(|(method, _)| method == name)
            .map(|(_, sig)| sig)
    }
}

#[derive(Clone, Debug, Error)]
pub enum ImportError {
    #[error("package {0:?} not found")]
    NotFound(String),
    #[error("import cycle through {0:?}")]
    Cycle(String),
    #[error("loading {0}: {1}")]
    Failed(String, String),
}

/// Resolves an import path to a checked package. The LSP layer implements
/// this recursively, with memoisation and cycle markers.
pub trait Importer {
    fn import(&self, path: &str) -> Result<Arc<PackageScope>, ImportError>;
}

/// An importer for contexts with no package graph (tests, single files).
pub struct NoImports;

impl Importer for NoImports {
    fn import(&self, path: &str) -> Result<Arc<PackageScope>, ImportError> {
        Err(ImportError::NotFound(path.to_string()))
    }
}

#[derive(Debug)]
pub struct CheckedSource {
    pub name: String,
    pub ast: File,
    pub index: LineIndex,
}

impl CheckedSource {
    pub fn new(name: impl Into<String>, source: &str, ast: File) -> Self {
        Self {
            name: name.into(),
            ast,
            index: LineIndex::new(source),
        }
    }
}

pub struct CheckOutcome {
    pub scope: Arc<PackageScope>,
    pub info: TypeInfo,
    pub errors: Vec<TypeError>,
}

/// Type-check one package. Runs to completion even on errors; every
/// problem found lands in `errors` and checking continues with `Invalid`.
pub fn check_package(
    import_path: &str,
    files: &[CheckedSource],
    importer: &dyn Importer,
) -> CheckOutcome {
    let mut checker = Checker {
        import_path: import_path.to_string(),
        files,
        importer,
        universe: universe(),
        package: PackageScope {
            import_path: import_path.to_string(),
            name: files
                .first()
                .map(|f| f.ast.package.name.clone())
                .unwrap_or_default(),
            ..Default::default()
        },
        scopes: Vec::new(),
        imports: HashMap::new(),
        info: TypeInfo::default(),
        errors: Vec::new(),
        current_file: 0,
    };
    checker.collect_package_scope();
    checker.check_bodies();
    CheckOutcome {
        scope: Arc::new(checker.package),
        info: checker.info,
        errors: checker.errors,
    }
}

fn universe() -> HashMap<String, Object> {
    let mut scope = HashMap::new();
    for name in [
        "bool", "byte", "error", "int", "int8", "int16", "int32", "int64", "uint", "uint8",
        "uint16", "uint32", "uint64", "float32", "float64", "rune", "string",
    ] {
        if let Some(basic) = Basic::lookup(name) {
            scope.insert(
                name.to_string(),
                Object::new(ObjKind::TypeName, Type::Basic(basic)),
            );
        }
    }
    for name in ["true", "false"] {
        let mut obj = Object::new(ObjKind::Const, Type::Untyped(Untyped::Bool));
        obj.value = Some(name.to_string());
        scope.insert(name.to_string(), obj);
    }
    scope.insert(
        "nil".to_string(),
        Object::new(ObjKind::Nil, Type::Untyped(Untyped::Nil)),
    );
    scope.insert(
        "iota".to_string(),
        Object::new(ObjKind::Const, Type::Untyped(Untyped::Int)),
    );

    let ty_placeholder = || Type::named("", "Type", Type::Invalid);
    let any = || Type::Interface(Arc::new(InterfaceType::default()));
    let builtins: Vec<(&str, Signature)> = vec![
        (
            "append",
            Signature {
                params: vec![
                    Type::Slice(Box::new(ty_placeholder())),
                    Type::Slice(Box::new(ty_placeholder())),
                ],
                results: vec![Type::Slice(Box::new(ty_placeholder()))],
                variadic: true,
            },
        ),
        (
            "cap",
            Signature {
                params: vec![ty_placeholder()],
                results: vec![Type::Basic(Basic::Int)],
                variadic: false,
            },
        ),
        (
            "clear",
            Signature {
                params: vec![ty_placeholder()],
                results: vec![],
                variadic: false,
            },
        ),
        (
            "copy",
            Signature {
                params: vec![
                    Type::Slice(Box::new(ty_placeholder())),
                    Type::Slice(Box::new(ty_placeholder())),
                ],
                results: vec![Type::Basic(Basic::Int)],
                variadic: false,
            },
        ),
        (
            "delete",
            Signature {
                params: vec![
                    Type::Map(Box::new(ty_placeholder()), Box::new(Type::named("", "Type1", Type::Invalid))),
                    Type::named("", "Type", Type::Invalid),
                ],
                results: vec![],
                variadic: false,
            },
        ),
        (
            "len",
            Signature {
                params: vec![ty_placeholder()],
                results: vec![Type::Basic(Basic::Int)],
                variadic: false,
            },
        ),
        (
            "make",
            Signature {
                params: vec![ty_placeholder(), Type::Slice(Box::new(Type::Basic(Basic::Int)))],
                results: vec![ty_placeholder()],
                variadic: true,
            },
        ),
        (
            "new",
            Signature {
                params: vec![ty_placeholder()],
                results: vec![Type::Pointer(Box::new(ty_placeholder()))],
                variadic: false,
            },
        ),
        (
            "panic",
            Signature {
                params: vec![any()],
                results: vec![],
                variadic: false,
            },
        ),
        (
            "print",
            Signature {
                params: vec![Type::Slice(Box::new(any()))],
                results: vec![],
                variadic: true,
            },
        ),
        (
            "println",
            Signature {
                params: vec![Type::Slice(Box::new(any()))],
                results: vec![],
                variadic: true,
            },
        ),
        (
            "recover",
            Signature {
                params: vec![],
                results: vec![any()],
                variadic: false,
            },
        ),
    ];
    for (name, sig) in builtins {
        scope.insert(
            name.to_string(),
            Object::new(ObjKind::Builtin, Type::Func(Arc::new(sig))),
        );
    }
    scope
}

struct Checker<'a> {
    import_path: String,
    files: &'a [CheckedSource],
    importer: &'a dyn Importer,
    universe: HashMap<String, Object>,
    package: PackageScope,
    scopes: Vec<HashMap<String, Object>>,
    /// Per-file import tables, keyed by file index then local name.
    imports: HashMap<usize, HashMap<String, (String, Option<Arc<PackageScope>>)>>,
    info: TypeInfo,
    errors: Vec<TypeError>,
    current_file: usize,
}

impl<'a> Checker<'a> {
    // ---- error + record plumbing ----

    fn file(&self) -> &'a CheckedSource {
        &self.files[self.current_file]
    }

    fn error_at(&mut self, span: Span, message: impl Into<String>) {
        let file = self.file();
        let line = file.index.line(span.start);
        let col_start = file.index.line_start(line).unwrap_or(0);
        let col = span.start.saturating_sub(col_start) as u32 + 1;
        self.errors.push(TypeError {
            file: file.name.clone(),
            line,
            col,
            message: message.into(),
        });
    }

    fn record(&mut self, expr: &Expr, tv: &TypeAndValue) {
        let file = self.file();
        let span = expr.span();
        let line = file.index.line(span.start);
        self.info.types.push(ExprRecord {
            expr: expr.to_string(),
            file: file.name.clone(),
            line,
            span,
            tv: tv.clone(),
        });
    }

    fn record_type_ident(&mut self, ident: &Ident, ty: &Type) {
        let file = self.file();
        let line = file.index.line(ident.span.start);
        self.info.types.push(ExprRecord {
            expr: ident.name.clone(),
            file: file.name.clone(),
            line,
            span: ident.span,
            tv: TypeAndValue::new(ty.clone(), Mode::Type),
        });
    }

    fn record_def(&mut self, ident: &Ident, ty: &Type) {
        let file = self.file();
        self.info.defs.push(IdentRecord {
            name: ident.name.clone(),
            file: file.name.clone(),
            span: ident.span,
            ty: ty.clone(),
        });
    }

    fn record_use(&mut self, ident: &Ident, ty: &Type) {
        let file = self.file();
        self.info.uses.push(IdentRecord {
            name: ident.name.clone(),
            file: file.name.clone(),
            span: ident.span,
            ty: ty.clone(),
        });
    }

    // ---- scope plumbing ----

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, obj: Object) {
        if name.is_empty() || name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), obj);
        } else {
            self.package.objects.insert(name.to_string(), obj);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Object> {
        for scope in self.scopes.iter().rev() {
            if let Some(obj) = scope.get(name) {
                return Some(obj);
            }
        }
        self.package
            .objects
            .get(name)
            .or_else(|| self.universe.get(name))
    }

    fn lookup_import(&self, name: &str) -> Option<&(String, Option<Arc<PackageScope>>)> {
        self.imports.get(&self.current_file)?.get(name)
    }

    // ---- package scope collection ----

    fn collect_package_scope(&mut self) {
        let files = self.files;
        // Imports first; the type resolver may need them for qualified names.
        for (idx, file) in files.iter().enumerate() {
            let mut table = HashMap::new();
            for spec in &file.ast.imports {
                let resolved = match self.importer.import(&spec.path.value) {
                    Ok(scope) => Some(scope),
                    Err(err) => {
                        let file = &files[idx];
                        let line = file.index.line(spec.path.span.start);
                        let col_start = file.index.line_start(line).unwrap_or(0);
                        self.errors.push(TypeError {
                            file: file.name.clone(),
                            line,
                            col: spec.path.span.start.saturating_sub(col_start) as u32 + 1,
                            message: err.to_string(),
                        });
                        None
                    }
                };
                table.insert(
                    spec.local_name().to_string(),
                    (spec.path.value.clone(), resolved),
                );
            }
            self.imports.insert(idx, table);
        }

        // Named types in two passes so mutually recursive ones terminate.
        let mut type_specs: Vec<(usize, TypeSpec)> = Vec::new();
        for (idx, file) in files.iter().enumerate() {
            for decl in &file.ast.decls {
                if let Decl::Gen(gen) = decl {
                    if gen.kind == GenKind::Type {
                        for spec in &gen.specs {
                            if let Spec::Type(spec) = spec {
                                type_specs.push((idx, spec.clone()));
                            }
                        }
                    }
                }
            }
        }
        for (_, spec) in &type_specs {
            let placeholder = Type::named(&self.import_path, &spec.name.name, Type::Invalid);
            self.package
                .objects
                .insert(spec.name.name.clone(), Object::new(ObjKind::TypeName, placeholder));
        }
        for (idx, spec) in &type_specs {
            self.current_file = *idx;
            let underlying = self.resolve_type(&spec.ty);
            let named = Type::named(&self.import_path, &spec.name.name, underlying);
            self.record_def(&spec.name, &named);
            self.package
                .objects
                .insert(spec.name.name.clone(), Object::new(ObjKind::TypeName, named));
        }

        // Function and method signatures.
        for idx in 0..self.files.len() {
            self.current_file = idx;
            let decls = self.files[idx].ast.decls.clone();
            for decl in &decls {
                let Decl::Func(func) = decl else { continue };
                let sig = self.resolve_signature(&func.params, &func.results);
                match &func.recv {
                    Some(recv) => {
                        self.package
                            .methods
                            .entry(recv.base.name.clone())
                            .or_default()
                            .push((func.name.name.clone(), sig));
                    }
                    None => {
                        let ty = Type::Func(Arc::new(sig));
                        self.record_def(&func.name, &ty);
                        self.package
                            .objects
                            .insert(func.name.name.clone(), Object::new(ObjKind::Func, ty));
                    }
                }
            }
        }

        // Package-level consts and vars; values checked with the scope
        // built so far.
        for idx in 0..self.files.len() {
            self.current_file = idx;
            let decls = self.files[idx].ast.decls.clone();
            for decl in &decls {
                let Decl::Gen(gen) = decl else { continue };
                match gen.kind {
                    GenKind::Const | GenKind::Var => {
                        for spec in &gen.specs {
                            if let Spec::Value(spec) = spec {
                                self.declare_value_spec(spec, gen.kind == GenKind::Const);
                            }
                        }
                    }
                    GenKind::Type => {}
                }
            }
        }
    }

    fn declare_value_spec(&mut self, spec: &ValueSpec, is_const: bool) {
        let declared = spec.ty.as_ref().map(|ty| {
            let resolved = self.resolve_type(ty);
            self.record_type_expr(ty, &resolved);
            resolved
        });
        let mut value_types: Vec<TypeAndValue> = Vec::new();
        for value in &spec.values {
            value_types.push(self.check_expr(value));
        }
        // One call on the right can feed several names on the left.
        if spec.names.len() > 1 && value_types.len() == 1 {
            if let Type::Tuple(parts) = value_types[0].ty.clone() {
                value_types = parts
                    .into_iter()
                    .map(|ty| TypeAndValue::new(ty, Mode::Value))
                    .collect();
            }
        }
        for (i, name) in spec.names.iter().enumerate() {
            let ty = declared.clone().unwrap_or_else(|| {
                value_types
                    .get(i)
                    .map(|tv| concrete(&tv.ty))
                    .unwrap_or(Type::Invalid)
            });
            let kind = if is_const { ObjKind::Const } else { ObjKind::Var };
            let mut obj = Object::new(kind, ty.clone());
            if is_const {
                obj.value = value_types.get(i).and_then(|tv| tv.value.clone());
            }
            self.record_def(name, &ty);
            self.declare(&name.name, obj);
        }
    }

    // ---- type resolution ----

    fn resolve_type(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Name(ident) => match self.lookup(&ident.name) {
                Some(obj) if obj.kind == ObjKind::TypeName => obj.ty.clone(),
                Some(_) | None => {
                    self.error_at(ident.span, format!("undefined: {}", ident.name));
                    Type::Invalid
                }
            },
            TypeExpr::Qualified { pkg, name, .. } => {
                let Some((path, scope)) = self.lookup_import(&pkg.name).cloned() else {
                    self.error_at(pkg.span, format!("undefined: {}", pkg.name));
                    return Type::Invalid;
                };
                match scope.as_ref().and_then(|s| s.objects.get(&name.name)) {
                    Some(obj) if obj.kind == ObjKind::TypeName => obj.ty.clone(),
                    _ => {
                        // Unresolved import or missing member: keep the
                        // name so type strings still read sensibly.
                        let _ = path;
                        Type::named(
                            scope.map(|s| s.import_path.clone()).unwrap_or(path),
                            &name.name,
                            Type::Invalid,
                        )
                    }
                }
            }
            TypeExpr::Pointer { elem, .. } => Type::Pointer(Box::new(self.resolve_type(elem))),
            TypeExpr::Slice { elem, .. } => Type::Slice(Box::new(self.resolve_type(elem))),
            TypeExpr::Array { len, elem, .. } => {
                let length = len.as_ref().and_then(|expr| const_len(expr));
                Type::Array(length, Box::new(self.resolve_type(elem)))
            }
            TypeExpr::Map { key, value, .. } => Type::Map(
                Box::new(self.resolve_type(key)),
                Box::new(self.resolve_type(value)),
            ),
            TypeExpr::Chan { elem, .. } => Type::Chan(Box::new(self.resolve_type(elem))),
            TypeExpr::Struct { fields, .. } => {
                let mut resolved = Vec::new();
                for field in fields {
                    let ty = self.resolve_type(&field.ty);
                    if field.names.is_empty() {
                        // Embedded field: named after its type.
                        if let Some(base) = ty.base_name() {
                            resolved.push((base.to_string(), ty.clone()));
                        }
                    }
                    for name in &field.names {
                        resolved.push((name.name.clone(), ty.clone()));
                    }
                }
                Type::Struct(Arc::new(StructType { fields: resolved }))
            }
            TypeExpr::Interface { methods, .. } => {
                let mut resolved = Vec::new();
                for member in methods {
                    if let Some(name) = &member.name {
                        let sig = self.resolve_signature(&member.params, &member.results);
                        resolved.push((name.name.clone(), sig));
                    }
                }
                Type::Interface(Arc::new(InterfaceType { methods: resolved }))
            }
            TypeExpr::Func {
                params, results, ..
            } => Type::Func(Arc::new(self.resolve_signature(params, results))),
        }
    }

    fn resolve_signature(&mut self, params: &[Param], results: &[TypeExpr]) -> Signature {
        let variadic = params.last().is_some_and(|p| p.variadic);
        let params = params
            .iter()
            .map(|p| {
                let ty = self.resolve_type(&p.ty);
                if p.variadic {
                    Type::Slice(Box::new(ty))
                } else {
                    ty
                }
            })
            .collect();
        let results = results.iter().map(|ty| self.resolve_type(ty)).collect();
        Signature {
            params,
            results,
            variadic,
        }
    }

    /// Records `mode: type` entries for the identifiers inside a type
    /// expression, so hovering a type position resolves.
    fn record_type_expr(&mut self, ty: &TypeExpr, resolved: &Type) {
        match ty {
            TypeExpr::Name(ident) => self.record_type_ident(ident, resolved),
            TypeExpr::Qualified { name, .. } => self.record_type_ident(name, resolved),
            TypeExpr::Pointer { elem, .. } | TypeExpr::Slice { elem, .. } | TypeExpr::Chan { elem, .. } => {
                if let Some(inner) = elem_type(resolved) {
                    self.record_type_expr(elem, &inner);
                }
            }
            TypeExpr::Array { elem, .. } => {
                if let Some(inner) = elem_type(resolved) {
                    self.record_type_expr(elem, &inner);
                }
            }
            TypeExpr::Map { key, value, .. } => {
                if let Type::Map(k, v) = resolved.underlying() {
                    self.record_type_expr(key, k);
                    self.record_type_expr(value, v);
                }
            }
            _ => {}
        }
    }

    // ---- bodies ----

    fn check_bodies(&mut self) {
        for idx in 0..self.files.len() {
            self.current_file = idx;
            let decls = self.files[idx].ast.decls.clone();
            for decl in &decls {
                if let Decl::Func(func) = decl {
                    self.check_func(func);
                }
            }
        }
    }

    fn check_func(&mut self, func: &FuncDecl) {
        self.push_scope();
        if let Some(recv) = &func.recv {
            let base = match self.package.objects.get(&recv.base.name) {
                Some(obj) if obj.kind == ObjKind::TypeName => obj.ty.clone(),
                _ => Type::named(&self.import_path, &recv.base.name, Type::Invalid),
            };
            let ty = if recv.pointer {
                Type::Pointer(Box::new(base))
            } else {
                base
            };
            if let Some(name) = &recv.name {
                self.record_def(name, &ty);
                self.declare(&name.name, Object::new(ObjKind::Var, ty));
            }
        }
        for param in &func.params {
            let ty = self.resolve_type(&param.ty);
            self.record_type_expr(&param.ty, &ty);
            let ty = if param.variadic {
                Type::Slice(Box::new(ty))
            } else {
                ty
            };
            if let Some(name) = &param.name {
                self.record_def(name, &ty);
                self.declare(&name.name, Object::new(ObjKind::Var, ty));
            }
        }
        for result in &func.results {
            let ty = self.resolve_type(result);
            self.record_type_expr(result, &ty);
        }
        if let Some(body) = &func.body {
            self.check_block(body);
        }
        self.pop_scope();
    }

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(gen) => {
                for spec in &gen.specs {
                    match spec {
                        Spec::Value(spec) => {
                            self.declare_value_spec(spec, gen.kind == GenKind::Const)
                        }
                        Spec::Type(spec) => {
                            let underlying = self.resolve_type(&spec.ty);
                            let named = Type::named(&self.import_path, &spec.name.name, underlying);
                            self.record_def(&spec.name, &named);
                            self.declare(&spec.name.name, Object::new(ObjKind::TypeName, named));
                        }
                    }
                }
            }
            Stmt::ShortVar { names, values, .. } => {
                let mut value_types: Vec<TypeAndValue> =
                    values.iter().map(|v| self.check_expr(v)).collect();
                if names.len() > 1 && value_types.len() == 1 {
                    if let Type::Tuple(parts) = value_types[0].ty.clone() {
                        value_types = parts
                            .into_iter()
                            .map(|ty| TypeAndValue::new(ty, Mode::Value))
                            .collect();
                    }
                }
                for (i, name) in names.iter().enumerate() {
                    let ty = value_types
                        .get(i)
                        .map(|tv| concrete(&tv.ty))
                        .unwrap_or(Type::Invalid);
                    self.record_def(name, &ty);
                    // The freshly bound name is itself a var expression.
                    let tv = TypeAndValue::new(ty.clone(), Mode::Var);
                    self.record(&Expr::Ident(name.clone()), &tv);
                    self.declare(&name.name, Object::new(ObjKind::Var, ty));
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                for expr in lhs {
                    let _ = self.check_expr(expr);
                }
                for expr in rhs {
                    let _ = self.check_expr(expr);
                }
            }
            Stmt::Expr(expr) => {
                let _ = self.check_expr(expr);
            }
            Stmt::IncDec { expr, .. } => {
                let _ = self.check_expr(expr);
            }
            Stmt::Send { chan, value, .. } => {
                let _ = self.check_expr(chan);
                let _ = self.check_expr(value);
            }
            Stmt::Return { values, .. } => {
                for value in values {
                    let _ = self.check_expr(value);
                }
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                let _ = self.check_expr(cond);
                self.check_block(then);
                if let Some(els) = els {
                    self.check_stmt(els);
                }
                self.pop_scope();
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    let _ = self.check_expr(cond);
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.check_block(body);
                self.pop_scope();
            }
            Stmt::Range {
                key,
                value,
                define,
                expr,
                body,
                ..
            } => {
                self.push_scope();
                let subject = self.check_expr(expr);
                let (key_ty, value_ty) = range_types(&subject.ty);
                if *define {
                    if let Some(Expr::Ident(ident)) = key {
                        self.record_def(ident, &key_ty);
                        self.declare(&ident.name, Object::new(ObjKind::Var, key_ty.clone()));
                    }
                    if let Some(Expr::Ident(ident)) = value {
                        self.record_def(ident, &value_ty);
                        self.declare(&ident.name, Object::new(ObjKind::Var, value_ty.clone()));
                    }
                } else {
                    if let Some(key) = key {
                        let _ = self.check_expr(key);
                    }
                    if let Some(value) = value {
                        let _ = self.check_expr(value);
                    }
                }
                self.check_block(body);
                self.pop_scope();
            }
            Stmt::Switch {
                init,
                tag,
                type_switch,
                cases,
                ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                let tag_tv = tag.as_ref().map(|tag| self.check_expr(tag));
                if let Some(Some(bound)) = type_switch {
                    let ty = tag_tv.map(|tv| tv.ty).unwrap_or(Type::Invalid);
                    self.record_def(bound, &ty);
                    self.declare(&bound.name, Object::new(ObjKind::Var, ty));
                }
                for case in cases {
                    self.push_scope();
                    for expr in &case.exprs {
                        let _ = self.check_expr(expr);
                    }
                    for stmt in &case.body {
                        self.check_stmt(stmt);
                    }
                    self.pop_scope();
                }
                self.pop_scope();
            }
            Stmt::Block(block) => self.check_block(block),
            Stmt::Go { call, .. } | Stmt::Defer { call, .. } => {
                let _ = self.check_expr(call);
            }
            Stmt::Break { .. }
            | Stmt::Continue { .. }
            | Stmt::Fallthrough { .. }
            | Stmt::Empty { .. } => {}
        }
    }

    // ---- expressions ----

    fn check_expr(&mut self, expr: &Expr) -> TypeAndValue {
        let tv = self.infer_expr(expr);
        if let Some(tv) = &tv {
            self.record(expr, tv);
            return tv.clone();
        }
        TypeAndValue::invalid()
    }

    /// Infers a type for `expr`. `None` means "no TypeAndValue at all"
    /// (package qualifiers), which callers above surface as an unknown
    /// type, triggering the package-ident query paths.
    fn infer_expr(&mut self, expr: &Expr) -> Option<TypeAndValue> {
        match expr {
            Expr::Ident(ident) => {
                if ident.name == "_" {
                    return Some(TypeAndValue::invalid());
                }
                if let Some(obj) = self.lookup(&ident.name).cloned() {
                    self.record_use(ident, &obj.ty);
                    let mode = match obj.kind {
                        ObjKind::Const => Mode::Value,
                        ObjKind::Var => Mode::Var,
                        ObjKind::TypeName => Mode::Type,
                        ObjKind::Func => Mode::Value,
                        ObjKind::Builtin => Mode::Builtin,
                        ObjKind::Nil => Mode::Nil,
                        ObjKind::PkgName => return None,
                    };
                    let mut tv = TypeAndValue::new(obj.ty.clone(), mode);
                    tv.value = obj.value.clone();
                    return Some(tv);
                }
                if self.lookup_import(&ident.name).is_some() {
                    // Package qualifier: deliberately no TypeAndValue.
                    return None;
                }
                if ident.name.is_empty() {
                    return None;
                }
                self.error_at(ident.span, format!("undefined: {}", ident.name));
                Some(TypeAndValue::invalid())
            }
            Expr::BasicLit { kind, raw, .. } => {
                let (ty, value) = match kind {
                    LitKind::Int => (Type::Untyped(Untyped::Int), Some(raw.clone())),
                    LitKind::Float => (Type::Untyped(Untyped::Float), Some(raw.clone())),
                    LitKind::Char => (Type::Untyped(Untyped::Rune), Some(raw.clone())),
                    LitKind::Str => (Type::Untyped(Untyped::String), Some(raw.clone())),
                };
                let mut tv = TypeAndValue::new(ty, Mode::Value);
                tv.value = value;
                Some(tv)
            }
            Expr::Selector { x, sel, .. } => Some(self.infer_selector(x, sel)),
            Expr::Call { func, args, .. } => Some(self.infer_call(func, args)),
            Expr::Index { x, index, .. } => {
                let subject = self.check_expr(x);
                let _ = self.check_expr(index);
                Some(match subject.ty.underlying() {
                    Type::Map(_, value) => TypeAndValue::new((**value).clone(), Mode::MapIndex),
                    Type::Slice(elem) => TypeAndValue::new((**elem).clone(), Mode::Var),
                    Type::Array(_, elem) => TypeAndValue::new((**elem).clone(), Mode::Var),
                    Type::Basic(Basic::String) => {
                        TypeAndValue::new(Type::Basic(Basic::Byte), Mode::Value)
                    }
                    Type::Invalid => TypeAndValue::invalid(),
                    other => {
                        let message = format!("invalid operation: cannot index {other}");
                        self.error_at(x.span(), message);
                        TypeAndValue::invalid()
                    }
                })
            }
            Expr::SliceExpr { x, low, high, .. } => {
                let subject = self.check_expr(x);
                if let Some(low) = low {
                    let _ = self.check_expr(low);
                }
                if let Some(high) = high {
                    let _ = self.check_expr(high);
                }
                Some(TypeAndValue::new(subject.ty, Mode::Value))
            }
            Expr::Star { x, .. } => {
                let subject = self.check_expr(x);
                Some(match subject.ty.underlying() {
                    Type::Pointer(elem) => TypeAndValue::new((**elem).clone(), Mode::Var),
                    Type::Invalid => TypeAndValue::invalid(),
                    _ => {
                        if subject.mode == Mode::Type {
                            // A pointer-type expression, not a deref.
                            TypeAndValue::new(
                                Type::Pointer(Box::new(subject.ty)),
                                Mode::Type,
                            )
                        } else {
                            self.error_at(
                                x.span(),
                                format!("invalid operation: cannot indirect {}", subject.ty),
                            );
                            TypeAndValue::invalid()
                        }
                    }
                })
            }
            Expr::Unary { op, x, .. } => {
                let subject = self.check_expr(x);
                Some(match op {
                    UnOp::Addr => {
                        TypeAndValue::new(Type::Pointer(Box::new(concrete(&subject.ty))), Mode::Value)
                    }
                    UnOp::Recv => match subject.ty.underlying() {
                        Type::Chan(elem) => TypeAndValue::new((**elem).clone(), Mode::Value),
                        _ => TypeAndValue::invalid(),
                    },
                    UnOp::Not => TypeAndValue::new(Type::Untyped(Untyped::Bool), Mode::Value),
                    UnOp::Neg | UnOp::BitNot => TypeAndValue::new(subject.ty, Mode::Value),
                })
            }
            Expr::Binary { x, op, y, .. } => {
                let left = self.check_expr(x);
                let right = self.check_expr(y);
                let ty = match op {
                    BinOp::LAnd | BinOp::LOr | BinOp::Eq | BinOp::NotEq | BinOp::Lt
                    | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => Type::Untyped(Untyped::Bool),
                    _ => merge_operands(&left.ty, &right.ty),
                };
                Some(TypeAndValue::new(ty, Mode::Value))
            }
            Expr::Paren { x, .. } => Some(self.check_expr(x)),
            Expr::Composite { ty, elts, .. } => {
                let resolved = match ty {
                    Some(ty) => {
                        let resolved = self.resolve_type(ty);
                        self.record_type_expr(ty, &resolved);
                        resolved
                    }
                    None => Type::Invalid,
                };
                for elt in elts {
                    match elt {
                        Expr::KeyValue { value, .. } => {
                            let _ = self.check_expr(value);
                        }
                        other => {
                            let _ = self.check_expr(other);
                        }
                    }
                }
                Some(TypeAndValue::new(resolved, Mode::Value))
            }
            Expr::KeyValue { value, .. } => Some(self.check_expr(value)),
            Expr::FuncLit {
                params,
                results,
                body,
                ..
            } => {
                let sig = self.resolve_signature(params, results);
                self.push_scope();
                for param in params {
                    let ty = self.resolve_type(&param.ty);
                    if let Some(name) = &param.name {
                        self.declare(&name.name, Object::new(ObjKind::Var, ty));
                    }
                }
                self.check_block(body);
                self.pop_scope();
                Some(TypeAndValue::new(Type::Func(Arc::new(sig)), Mode::Value))
            }
            Expr::TypeAssert { x, ty, .. } => {
                let _ = self.check_expr(x);
                Some(match ty {
                    Some(ty) => {
                        let resolved = self.resolve_type(ty);
                        self.record_type_expr(ty, &resolved);
                        TypeAndValue::new(resolved, Mode::Value)
                    }
                    None => TypeAndValue::invalid(),
                })
            }
            Expr::TypeRef { ty, .. } => {
                let resolved = self.resolve_type(ty);
                self.record_type_expr(ty, &resolved);
                Some(TypeAndValue::new(resolved, Mode::Type))
            }
            Expr::Bad { .. } => Some(TypeAndValue::invalid()),
        }
    }

    fn infer_selector(&mut self, x: &Expr, sel: &Ident) -> TypeAndValue {
        // Package-qualified reference?
        if let Expr::Ident(pkg_ident) = x {
            if self.lookup(&pkg_ident.name).is_none() {
                if let Some((path, scope)) = self.lookup_import(&pkg_ident.name).cloned() {
                    let Some(scope) = scope else {
                        return TypeAndValue::invalid();
                    };
                    return match scope.objects.get(&sel.name) {
                        Some(obj) => {
                            self.record_use(sel, &obj.ty);
                            let mode = match obj.kind {
                                ObjKind::TypeName => Mode::Type,
                                ObjKind::Var => Mode::Var,
                                _ => Mode::Value,
                            };
                            let mut tv = TypeAndValue::new(obj.ty.clone(), mode);
                            tv.value = obj.value.clone();
                            tv
                        }
                        None => {
                            if sel.name.is_empty() {
                                return TypeAndValue::invalid();
                            }
                            self.error_at(
                                sel.span,
                                format!("undefined: {}.{}", path, sel.name),
                            );
                            TypeAndValue::invalid()
                        }
                    };
                }
            }
        }

        let subject = self.check_expr(x);
        if subject.ty.is_invalid() {
            return TypeAndValue::invalid();
        }

        // Struct fields, through one pointer layer.
        let deref = match subject.ty.underlying() {
            Type::Pointer(elem) => (**elem).clone(),
            other => other.clone(),
        };
        if let Type::Struct(st) = deref.underlying() {
            if let Some(field) = st.field(&sel.name) {
                self.record_use(sel, field);
                return TypeAndValue::new(field.clone(), Mode::Var);
            }
        }
        if let Type::Interface(iface) = deref.underlying() {
            if let Some((_, sig)) = iface.methods.iter().find(|(name, _)| name == &sel.name) {
                return TypeAndValue::new(Type::Func(Arc::new(sig.clone())), Mode::Value);
            }
        }

        // Methods of named types: local ones first, then the defining
        // package's method table.
        if let Some(base) = subject.ty.base_name() {
            let local = self
                .package
                .method(base, &sel.name)
                .cloned()
                .or_else(|| {
                    let pkg_path = subject.ty.pkg_path()?;
                    if pkg_path == self.import_path {
                        return None;
                    }
                    let table = self.imports.get(&self.current_file)?;
                    table
                        .values()
                        .find(|(path, _)| path == pkg_path)
                        .and_then(|(_, scope)| scope.as_ref())
                        .and_then(|scope| scope.method(base, &sel.name).cloned())
                });
            if let Some(sig) = local {
                let ty = Type::Func(Arc::new(sig));
                self.record_use(sel, &ty);
                return TypeAndValue::new(ty, Mode::Value);
            }
        }

        if sel.name.is_empty() {
            return TypeAndValue::invalid();
        }
        self.error_at(
            sel.span,
            format!(
                "{}.{} undefined (type {} has no field or method {})",
                x, sel.name, subject.ty, sel.name
            ),
        );
        TypeAndValue::invalid()
    }

    fn infer_call(&mut self, func: &Expr, args: &[Expr]) -> TypeAndValue {
        // Builtins with type-dependent results.
        if let Expr::Ident(ident) = func {
            if self
                .lookup(&ident.name)
                .is_some_and(|obj| obj.kind == ObjKind::Builtin)
            {
                return self.infer_builtin_call(ident, args);
            }
        }

        let callee = self.check_expr(func);
        let arg_types: Vec<TypeAndValue> = args.iter().map(|a| self.check_expr(a)).collect();

        if callee.mode == Mode::Type {
            // Conversion.
            return TypeAndValue::new(callee.ty, Mode::Value);
        }
        match callee.ty.signature() {
            Some(sig) => {
                if !sig.variadic
                    && !sig.params.is_empty()
                    && arg_types.len() != sig.params.len()
                    && !callee.ty.is_invalid()
                {
                    // Arity problems are reported but do not stop checking.
                    self.error_at(
                        func.span(),
                        format!(
                            "wrong number of arguments in call to {} (have {}, want {})",
                            func,
                            arg_types.len(),
                            sig.params.len()
                        ),
                    );
                }
                let result = sig.result_type();
                let mode = if sig.results.is_empty() {
                    Mode::Void
                } else {
                    Mode::Value
                };
                TypeAndValue::new(result, mode)
            }
            None => {
                if !callee.ty.is_invalid() {
                    self.error_at(
                        func.span(),
                        format!("invalid operation: cannot call non-function {}", func),
                    );
                }
                TypeAndValue::invalid()
            }
        }
    }

    fn infer_builtin_call(&mut self, ident: &Ident, args: &[Expr]) -> TypeAndValue {
        // The builtin name itself is hoverable.
        if let Some(obj) = self.lookup(&ident.name).cloned() {
            let tv = TypeAndValue::new(obj.ty.clone(), Mode::Builtin);
            self.record(&Expr::Ident(ident.clone()), &tv);
            self.record_use(ident, &obj.ty);
        }
        let arg_types: Vec<TypeAndValue> = args.iter().map(|a| self.check_expr(a)).collect();
        let ty = match ident.name.as_str() {
            "len" | "cap" => Type::Basic(Basic::Int),
            "append" => arg_types
                .first()
                .map(|tv| tv.ty.clone())
                .unwrap_or(Type::Invalid),
            "make" => arg_types
                .first()
                .map(|tv| tv.ty.clone())
                .unwrap_or(Type::Invalid),
            "new" => Type::Pointer(Box::new(
                arg_types
                    .first()
                    .map(|tv| tv.ty.clone())
                    .unwrap_or(Type::Invalid),
            )),
            "copy" => Type::Basic(Basic::Int),
            "recover" => Type::Interface(Arc::new(InterfaceType::default())),
            "panic" | "print" | "println" | "clear" | "delete" => {
                return TypeAndValue::new(Type::Tuple(Vec::new()), Mode::Void);
            }
            _ => Type::Invalid,
        };
        TypeAndValue::new(ty, Mode::Value)
    }
}

fn const_len(expr: &Expr) -> Option<u64> {
    if let Expr::BasicLit {
        kind: LitKind::Int,
        raw,
        ..
    } = expr
    {
        raw.parse().ok()
    } else {
        None
    }
}

/// Untyped constants become their default type when bound to a variable.
fn concrete(ty: &Type) -> Type {
    match ty {
        Type::Untyped(untyped) => untyped.default_type(),
        other => other.clone(),
    }
}

fn merge_operands(left: &Type, right: &Type) -> Type {
    match (left, right) {
        (Type::Untyped(_), Type::Untyped(_)) => left.clone(),
        (Type::Untyped(_), typed) => typed.clone(),
        (typed, _) => typed.clone(),
    }
}

fn elem_type(ty: &Type) -> Option<Type> {
    match ty.underlying() {
        Type::Pointer(elem) | Type::Slice(elem) | Type::Chan(elem) => Some((**elem).clone()),
        Type::Array(_, elem) => Some((**elem).clone()),
        _ => None,
    }
}

fn range_types(ty: &Type) -> (Type, Type) {
    match ty.underlying() {
        Type::Slice(elem) => (Type::Basic(Basic::Int), (**elem).clone()),
        Type::Array(_, elem) => (Type::Basic(Basic::Int), (**elem).clone()),
        Type::Map(key, value) => ((**key).clone(), (**value).clone()),
        Type::Basic(Basic::String) => (Type::Basic(Basic::Int), Type::Basic(Basic::Rune)),
        Type::Chan(elem) => ((**elem).clone(), Type::Invalid),
        _ => (Type::Invalid, Type::Invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::parse_file;

    fn check_source(src: &str) -> CheckOutcome {
        let parsed = parse_file(src).expect("parse");
        let files = vec![CheckedSource::new("a.gno", src, parsed.file)];
        check_package("gno.land/r/demo/test", &files, &NoImports)
    }

    fn find<'a>(info: &'a TypeInfo, expr: &str, line: u32) -> Option<&'a ExprRecord> {
        info.types
            .iter()
            .find(|rec| rec.expr == expr && rec.line == line)
    }

    #[test]
    fn classifies_local_var() {
        let out = check_source("package demo\n\nfunc f() {\n\tn := 3\n\tprintln(n)\n}\n");
        let rec = find(&out.info, "n", 5).expect("record for use of n");
        assert_eq!(rec.tv.mode, Mode::Var);
        assert_eq!(rec.tv.ty.to_string(), "int");
    }

    #[test]
    fn classifies_builtin_and_type() {
        let out = check_source("package demo\n\nvar n int = 3\n\nfunc f() {\n\t_ = len(\"x\")\n}\n");
        let int_rec = find(&out.info, "int", 3).expect("record for int");
        assert_eq!(int_rec.tv.mode, Mode::Type);
        assert_eq!(int_rec.tv.ty.to_string(), "int");
        let len_rec = find(&out.info, "len", 6).expect("record for len");
        assert_eq!(len_rec.tv.mode, Mode::Builtin);
        assert!(len_rec.tv.ty.to_string().starts_with("func"));
    }

    #[test]
    fn classifies_map_index() {
        let out = check_source(
            "package demo\n\nfunc f(m map[string]int) {\n\tv := m[\"k\"]\n\t_ = v\n\t_ = m[\"j\"]\n}\n",
        );
        let rec = find(&out.info, "m[\"j\"]", 6).expect("map index record");
        assert_eq!(rec.tv.mode, Mode::MapIndex);
    }

    #[test]
    fn accumulates_every_error() {
        let out = check_source(
            "package demo\n\nfunc f() {\n\t_ = missing1\n\t_ = missing2\n}\n",
        );
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[0].message.contains("missing1"));
        assert!(out.errors[1].message.contains("missing2"));
        assert_eq!(out.errors[0].line, 4);
    }

    #[test]
    fn resolves_local_struct_and_methods() {
        let src = "package demo\n\ntype Counter struct {\n\tn int\n}\n\nfunc (c *Counter) Inc() { c.n++ }\n\nfunc use() {\n\tc := Counter{}\n\tc.Inc()\n}\n";
        let out = check_source(src);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        let rec = find(&out.info, "c", 11).expect("record for c");
        assert_eq!(rec.tv.mode, Mode::Var);
        assert_eq!(rec.tv.ty.to_string(), "gno.land/r/demo/test.Counter");
        assert!(out.scope.method("Counter", "Inc").is_some());
    }

    #[test]
    fn nil_and_bool_consts() {
        let out = check_source("package demo\n\nfunc f() {\n\t_ = nil\n\t_ = true\n}\n");
        let nil_rec = find(&out.info, "nil", 4).expect("nil record");
        assert_eq!(nil_rec.tv.mode, Mode::Nil);
        assert_eq!(nil_rec.tv.ty.to_string(), "untyped nil");
        let true_rec = find(&out.info, "true", 5).expect("true record");
        assert_eq!(true_rec.tv.ty.to_string(), "bool");
    }

    #[test]
    fn call_result_feeds_short_var() {
        let src = "package demo\n\nfunc pair() (int, string) { return 1, \"a\" }\n\nfunc f() {\n\ta, b := pair()\n\t_ = a\n\t_ = b\n}\n";
        let out = check_source(src);
        assert!(out.errors.is_empty(), "errors: {:?}", out.errors);
        let rec = find(&out.info, "b", 8).expect("record for b");
        assert_eq!(rec.tv.ty.to_string(), "string");
    }

    #[test]
    fn import_failure_is_reported_not_fatal() {
        let src = "package demo\n\nimport \"gno.land/p/demo/ufmt\"\n\nfunc f() {\n\tufmt.Println(\"hi\")\n}\n";
        let out = check_source(src);
        assert!(out
            .errors
            .iter()
            .any(|err| err.message.contains("not found")));
    }
}
