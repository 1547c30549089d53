use crate::lang::span::Span;
use std::fmt;

#[derive(Clone, Debug)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

#[derive(Clone, Debug)]
pub struct StringLit {
    /// Unquoted value.
    pub value: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ImportSpec {
    pub alias: Option<Ident>,
    pub path: StringLit,
    pub span: Span,
}

impl ImportSpec {
    /// Default qualifier: the alias if present, else the last path segment.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(alias) => &alias.name,
            None => self
                .path
                .value
                .rsplit('/')
                .next()
                .unwrap_or(&self.path.value),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Func(d) => d.span,
            Decl::Gen(d) => d.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub doc: Option<String>,
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub params: Vec<Param>,
    pub results: Vec<TypeExpr>,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Receiver {
    pub name: Option<Ident>,
    /// Base type name, with pointerness split off.
    pub base: Ident,
    pub pointer: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
    pub variadic: bool,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenKind {
    Const,
    Var,
    Type,
}

#[derive(Clone, Debug)]
pub struct GenDecl {
    pub doc: Option<String>,
    pub kind: GenKind,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Spec {
    Type(TypeSpec),
    Value(ValueSpec),
}

impl Spec {
    pub fn span(&self) -> Span {
        match self {
            Spec::Type(s) => s.span,
            Spec::Value(s) => s.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypeSpec {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TypeExpr {
    Name(Ident),
    Qualified {
        pkg: Ident,
        name: Ident,
        span: Span,
    },
    Pointer {
        elem: Box<TypeExpr>,
        span: Span,
    },
    Slice {
        elem: Box<TypeExpr>,
        span: Span,
    },
    Array {
        len: Option<Box<Expr>>,
        elem: Box<TypeExpr>,
        span: Span,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        span: Span,
    },
    Chan {
        elem: Box<TypeExpr>,
        span: Span,
    },
    Struct {
        fields: Vec<FieldDef>,
        span: Span,
    },
    Interface {
        methods: Vec<InterfaceMember>,
        span: Span,
    },
    Func {
        params: Vec<Param>,
        results: Vec<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name(id) => id.span,
            TypeExpr::Qualified { span, .. }
            | TypeExpr::Pointer { span, .. }
            | TypeExpr::Slice { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Map { span, .. }
            | TypeExpr::Chan { span, .. }
            | TypeExpr::Struct { span, .. }
            | TypeExpr::Interface { span, .. }
            | TypeExpr::Func { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct InterfaceMember {
    /// None for an embedded interface name.
    pub name: Option<Ident>,
    pub params: Vec<Param>,
    pub results: Vec<TypeExpr>,
    pub embedded: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Decl(GenDecl),
    ShortVar {
        names: Vec<Ident>,
        values: Vec<Expr>,
        span: Span,
    },
    Assign {
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        span: Span,
    },
    Expr(Expr),
    IncDec {
        expr: Expr,
        span: Span,
    },
    Send {
        chan: Expr,
        value: Expr,
        span: Span,
    },
    Return {
        values: Vec<Expr>,
        span: Span,
    },
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        span: Span,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        expr: Expr,
        body: Block,
        span: Span,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        /// Set for `switch x := y.(type)`; the bound name, if any.
        type_switch: Option<Option<Ident>>,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Block(Block),
    Go {
        call: Expr,
        span: Span,
    },
    Defer {
        call: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Fallthrough {
        span: Span,
    },
    Empty {
        span: Span,
    },
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// Empty for `default`.
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl(d) => d.span,
            Stmt::Expr(e) => e.span(),
            Stmt::Block(b) => b.span,
            Stmt::ShortVar { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::IncDec { span, .. }
            | Stmt::Send { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Range { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Go { span, .. }
            | Stmt::Defer { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Fallthrough { span }
            | Stmt::Empty { span } => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Char,
    Str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Addr,
    Recv,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::AndNot => "&^",
            BinOp::LAnd => "&&",
            BinOp::LOr => "||",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Ident(Ident),
    BasicLit {
        kind: LitKind,
        raw: String,
        span: Span,
    },
    Selector {
        x: Box<Expr>,
        sel: Ident,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    SliceExpr {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        span: Span,
    },
    /// Pointer indirection `*x`; `star` is the offset of the star itself.
    Star {
        x: Box<Expr>,
        star: usize,
        span: Span,
    },
    Unary {
        op: UnOp,
        x: Box<Expr>,
        span: Span,
    },
    Binary {
        x: Box<Expr>,
        op: BinOp,
        y: Box<Expr>,
        span: Span,
    },
    Paren {
        x: Box<Expr>,
        span: Span,
    },
    Composite {
        ty: Option<Box<TypeExpr>>,
        elts: Vec<Expr>,
        span: Span,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    FuncLit {
        params: Vec<Param>,
        results: Vec<TypeExpr>,
        body: Block,
        span: Span,
    },
    TypeAssert {
        x: Box<Expr>,
        /// None for `x.(type)` in a type switch.
        ty: Option<Box<TypeExpr>>,
        span: Span,
    },
    TypeRef {
        ty: Box<TypeExpr>,
        span: Span,
    },
    Bad {
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(id) => id.span,
            Expr::BasicLit { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::SliceExpr { span, .. }
            | Expr::Star { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Paren { span, .. }
            | Expr::Composite { span, .. }
            | Expr::KeyValue { span, .. }
            | Expr::FuncLit { span, .. }
            | Expr::TypeAssert { span, .. }
            | Expr::TypeRef { span, .. }
            | Expr::Bad { span } => *span,
        }
    }
}

// Source form of an expression, used when matching type-checker records
// against the node under the cursor.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(id) => write!(f, "{}", id.name),
            Expr::BasicLit { raw, .. } => write!(f, "{raw}"),
            Expr::Selector { x, sel, .. } => write!(f, "{x}.{}", sel.name),
            Expr::Call { func, args, .. } => {
                write!(f, "{func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Index { x, index, .. } => write!(f, "{x}[{index}]"),
            Expr::SliceExpr { x, low, high, .. } => {
                write!(f, "{x}[")?;
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                write!(f, "]")
            }
            Expr::Star { x, .. } => write!(f, "*{x}"),
            Expr::Unary { op, x, .. } => {
                let sym = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                    UnOp::Addr => "&",
                    UnOp::Recv => "<-",
                    UnOp::BitNot => "^",
                };
                write!(f, "{sym}{x}")
            }
            Expr::Binary { x, op, y, .. } => write!(f, "{x} {} {y}", op.symbol()),
            Expr::Paren { x, .. } => write!(f, "({x})"),
            Expr::Composite { ty, elts, .. } => {
                if let Some(ty) = ty {
                    write!(f, "{}", type_expr_string(ty))?;
                }
                write!(f, "{{")?;
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elt}")?;
                }
                write!(f, "}}")
            }
            Expr::KeyValue { key, value, .. } => write!(f, "{key}: {value}"),
            Expr::FuncLit { .. } => write!(f, "func literal"),
            Expr::TypeAssert { x, ty, .. } => match ty {
                Some(ty) => write!(f, "{x}.({})", type_expr_string(ty)),
                None => write!(f, "{x}.(type)"),
            },
            Expr::TypeRef { ty, .. } => write!(f, "{}", type_expr_string(ty)),
            Expr::Bad { .. } => write!(f, "<bad expr>"),
        }
    }
}

pub fn type_expr_string(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Name(id) => id.name.clone(),
        TypeExpr::Qualified { pkg, name, .. } => format!("{}.{}", pkg.name, name.name),
        TypeExpr::Pointer { elem, .. } => format!("*{}", type_expr_string(elem)),
        TypeExpr::Slice { elem, .. } => format!("[]{}", type_expr_string(elem)),
        TypeExpr::Array { elem, .. } => format!("[N]{}", type_expr_string(elem)),
        TypeExpr::Map { key, value, .. } => format!(
            "map[{}]{}",
            type_expr_string(key),
            type_expr_string(value)
        ),
        TypeExpr::Chan { elem, .. } => format!("chan {}", type_expr_string(elem)),
        TypeExpr::Struct { .. } => "struct{...}".to_string(),
        TypeExpr::Interface { .. } => "interface{...}".to_string(),
        TypeExpr::Func { .. } => "func(...)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Ident(Ident::new(name, Span::new(0, name.len())))
    }

    #[test]
    fn expr_display_matches_source_form() {
        let sel = Expr::Selector {
            x: Box::new(ident("ufmt")),
            sel: Ident::new("Sprintf", Span::default()),
            span: Span::default(),
        };
        assert_eq!(sel.to_string(), "ufmt.Sprintf");

        let call = Expr::Call {
            func: Box::new(sel),
            args: vec![ident("x"), ident("y")],
            span: Span::default(),
        };
        assert_eq!(call.to_string(), "ufmt.Sprintf(x, y)");
    }

    #[test]
    fn import_local_name_prefers_alias() {
        let spec = ImportSpec {
            alias: Some(Ident::new("u", Span::default())),
            path: StringLit {
                value: "gno.land/p/demo/ufmt".into(),
                span: Span::default(),
            },
            span: Span::default(),
        };
        assert_eq!(spec.local_name(), "u");

        let spec = ImportSpec {
            alias: None,
            ..spec
        };
        assert_eq!(spec.local_name(), "ufmt");
    }
}
