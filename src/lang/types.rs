use std::fmt;
use std::sync::Arc;

/// Semantic type of an expression or declaration.
///
/// `Display` follows the Go convention the query layer depends on: named
/// types print as `importpath.Name`, so "does this type belong to package
/// X" is a string-prefix question.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Invalid,
    Basic(Basic),
    Untyped(Untyped),
    Named(Arc<Named>),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(Option<u64>, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    Struct(Arc<StructType>),
    Interface(Arc<InterfaceType>),
    Func(Arc<Signature>),
    Tuple(Vec<Type>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Basic {
    Bool,
    Byte,
    Error,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Rune,
    String,
}

impl Basic {
    pub fn name(&self) -> &'static str {
        match self {
            Basic::Bool => "bool",
            Basic::Byte => "byte",
            Basic::Error => "error",
            Basic::Int => "int",
            Basic::Int8 => "int8",
            Basic::Int16 => "int16",
            Basic::Int32 => "int32",
            Basic::Int64 => "int64",
            Basic::Uint => "uint",
            Basic::Uint8 => "uint8",
            Basic::Uint16 => "uint16",
            Basic::Uint32 => "uint32",
            Basic::Uint64 => "uint64",
            Basic::Float32 => "float32",
            Basic::Float64 => "float64",
            Basic::Rune => "rune",
            Basic::String => "string",
        }
    }

    pub fn lookup(name: &str) -> Option<Basic> {
        Some(match name {
            "bool" => Basic::Bool,
            "byte" => Basic::Byte,
            "error" => Basic::Error,
            "int" => Basic::Int,
            "int8" => Basic::Int8,
            "int16" => Basic::Int16,
            "int32" => Basic::Int32,
            "int64" => Basic::Int64,
            "uint" => Basic::Uint,
            "uint8" => Basic::Uint8,
            "uint16" => Basic::Uint16,
            "uint32" => Basic::Uint32,
            "uint64" => Basic::Uint64,
            "float32" => Basic::Float32,
            "float64" => Basic::Float64,
            "rune" => Basic::Rune,
            "string" => Basic::String,
            _ => return None,
        })
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Basic::Bool | Basic::String | Basic::Error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Untyped {
    Bool,
    Int,
    Float,
    Rune,
    String,
    Nil,
}

impl Untyped {
    /// The type an untyped constant assumes when it needs a concrete one.
    pub fn default_type(&self) -> Type {
        match self {
            Untyped::Bool => Type::Basic(Basic::Bool),
            Untyped::Int => Type::Basic(Basic::Int),
            Untyped::Float => Type::Basic(Basic::Float64),
            Untyped::Rune => Type::Basic(Basic::Rune),
            Untyped::String => Type::Basic(Basic::String),
            Untyped::Nil => Type::Invalid,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Named {
    /// Import path of the defining package; empty for builtins like `error`.
    pub pkg_path: String,
    pub name: String,
    pub underlying: Type,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<(String, Type)>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct InterfaceType {
    pub methods: Vec<(String, Signature)>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub variadic: bool,
}

impl Signature {
    /// The type of calling a value of this signature.
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            0 => Type::Tuple(Vec::new()),
            1 => self.results[0].clone(),
            _ => Type::Tuple(self.results.clone()),
        }
    }
}

impl Type {
    pub fn named(pkg_path: impl Into<String>, name: impl Into<String>, underlying: Type) -> Type {
        Type::Named(Arc::new(Named {
            pkg_path: pkg_path.into(),
            name: name.into(),
            underlying,
        }))
    }

    /// The underlying type, one named layer removed.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(named) => &named.underlying,
            other => other,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// Whether calling this type's value is meaningful.
    pub fn signature(&self) -> Option<&Signature> {
        match self.underlying() {
            Type::Func(sig) => Some(sig),
            _ => None,
        }
    }

    /// Base name of a named type, seen through one pointer layer.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Type::Named(named) => Some(&named.name),
            Type::Pointer(elem) => elem.base_name(),
            _ => None,
        }
    }

    /// Defining package path of a named type, through one pointer layer.
    pub fn pkg_path(&self) -> Option<&str> {
        match self {
            Type::Named(named) if !named.pkg_path.is_empty() => Some(&named.pkg_path),
            Type::Pointer(elem) => elem.pkg_path(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => write!(f, "invalid type"),
            Type::Basic(basic) => write!(f, "{}", basic.name()),
            Type::Untyped(Untyped::Bool) => write!(f, "bool"),
            Type::Untyped(Untyped::Int) => write!(f, "untyped int"),
            Type::Untyped(Untyped::Float) => write!(f, "untyped float"),
            Type::Untyped(Untyped::Rune) => write!(f, "untyped rune"),
            Type::Untyped(Untyped::String) => write!(f, "untyped string"),
            Type::Untyped(Untyped::Nil) => write!(f, "untyped nil"),
            Type::Named(named) => {
                if named.pkg_path.is_empty() {
                    write!(f, "{}", named.name)
                } else {
                    write!(f, "{}.{}", named.pkg_path, named.name)
                }
            }
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Array(Some(len), elem) => write!(f, "[{len}]{elem}"),
            Type::Array(None, elem) => write!(f, "[...]{elem}"),
            Type::Map(key, value) => write!(f, "map[{key}]{value}"),
            Type::Chan(elem) => write!(f, "chan {elem}"),
            Type::Struct(st) => {
                write!(f, "struct{{")?;
                for (i, (name, ty)) in st.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name} {ty}")?;
                }
                write!(f, "}}")
            }
            Type::Interface(iface) => {
                if iface.methods.is_empty() {
                    write!(f, "interface{{}}")
                } else {
                    write!(f, "interface{{")?;
                    for (i, (name, _)) in iface.methods.iter().enumerate() {
                        if i > 0 {
                            write!(f, "; ")?;
                        }
                        write!(f, "{name}(...)")?;
                    }
                    write!(f, "}}")
                }
            }
            Type::Func(sig) => {
                write!(f, "func(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if sig.variadic && i == sig.params.len() - 1 {
                        if let Type::Slice(elem) = param {
                            write!(f, "...{elem}")?;
                            continue;
                        }
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                match sig.results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", sig.results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, res) in sig.results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{res}")?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Type::Tuple(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_types_print_with_import_path() {
        let ty = Type::named(
            "gno.land/p/demo/avl",
            "Tree",
            Type::Struct(Arc::new(StructType::default())),
        );
        assert_eq!(ty.to_string(), "gno.land/p/demo/avl.Tree");
        assert_eq!(Type::Pointer(Box::new(ty)).to_string(), "*gno.land/p/demo/avl.Tree");
    }

    #[test]
    fn func_types_print_go_style() {
        let sig = Signature {
            params: vec![Type::Basic(Basic::String), Type::Basic(Basic::Int)],
            results: vec![Type::Basic(Basic::String)],
            variadic: false,
        };
        assert_eq!(
            Type::Func(Arc::new(sig)).to_string(),
            "func(string, int) string"
        );
    }

    #[test]
    fn base_name_sees_through_pointers() {
        let tree = Type::named("demo", "Tree", Type::Invalid);
        let ptr = Type::Pointer(Box::new(tree));
        assert_eq!(ptr.base_name(), Some("Tree"));
        assert_eq!(ptr.pkg_path(), Some("demo"));
    }
}
