use crate::lang::check::TypeAndValue;

// Builtin type docs.
pub const BOOL_DOC: &str = "bool is the set of boolean values, true and false.";
pub const BYTE_DOC: &str = "byte is an alias for uint8 and is equivalent to uint8 in all ways. It is used, by convention, to distinguish byte values from 8-bit unsigned integer values.";
pub const ERROR_DOC: &str = "The error built-in interface type is the conventional interface for representing an error condition, with the nil value representing no error.";
pub const INT_DOC: &str = "int is a signed integer type that is at least 32 bits in size. It is a distinct type, however, and not an alias for, say, int32.";
pub const INT8_DOC: &str = "int8 is the set of all signed 8-bit integers. Range: -128 through 127.";
pub const INT16_DOC: &str = "int16 is the set of all signed 16-bit integers. Range: -32768 through 32767.";
pub const INT32_DOC: &str = "int32 is the set of all signed 32-bit integers. Range: -2147483648 through 2147483647.";
pub const INT64_DOC: &str = "int64 is the set of all signed 64-bit integers. Range: -9223372036854775808 through 9223372036854775807.";
pub const UINT_DOC: &str = "uint is an unsigned integer type that is at least 32 bits in size. It is a distinct type, however, and not an alias for, say, uint32.";
pub const UINT8_DOC: &str = "uint8 is the set of all unsigned 8-bit integers. Range: 0 through 255.";
pub const UINT16_DOC: &str = "uint16 is the set of all unsigned 16-bit integers. Range: 0 through 65535.";
pub const UINT32_DOC: &str = "uint32 is the set of all unsigned 32-bit integers. Range: 0 through 4294967295.";
pub const UINT64_DOC: &str = "uint64 is the set of all unsigned 64-bit integers. Range: 0 through 18446744073709551615.";
pub const FLOAT32_DOC: &str = "float32 is the set of all IEEE-754 32-bit floating-point numbers.";
pub const FLOAT64_DOC: &str = "float64 is the set of all IEEE-754 64-bit floating-point numbers.";
pub const RUNE_DOC: &str = "rune is an alias for int32 and is equivalent to int32 in all ways. It is used, by convention, to distinguish character values from integer values.";
pub const STRING_DOC: &str = "string is the set of all strings of 8-bit bytes, conventionally but not necessarily representing UTF-8-encoded text. A string may be empty, but not nil. Values of string type are immutable.";
pub const NIL_DOC: &str = "nil is a predeclared identifier representing the zero value for a pointer, channel, func, interface, map, or slice type.";

// Builtin function docs.
pub const APPEND_DOC: &str = "The append built-in function appends elements to the end of a slice. If it has sufficient capacity, the destination is resliced to accommodate the new elements. If it does not, a new underlying array will be allocated. Append returns the updated slice.";
pub const CAP_DOC: &str = "The cap built-in function returns the capacity of v, according to its type";
pub const CLEAR_DOC: &str = "The clear built-in function clears maps and slices. For maps, clear deletes all entries, resulting in an empty map. For slices, clear sets all elements up to the length of the slice to the zero value of the respective element type.";
pub const COPY_DOC: &str = "The copy built-in function copies elements from a source slice into a destination slice. (As a special case, it also will copy bytes from a string to a slice of bytes.) The source and destination may overlap.";
pub const DELETE_DOC: &str = "The delete built-in function deletes the element with the specified key (m[key]) from the map. If m is nil or there is no such element, delete is a no-op.";
pub const LEN_DOC: &str = "The len built-in function returns the length of v, according to its type";
pub const MAKE_DOC: &str = "The make built-in function allocates and initializes an object of type slice, map, or chan (only). Like new, the first argument is a type, not a value. Unlike new, make's return type is the same as the type of its argument, not a pointer to it.";
pub const NEW_DOC: &str = "The new built-in function allocates memory. The first argument is a type, not a value, and the value returned is a pointer to a newly allocated zero value of that type.";
pub const PANIC_DOC: &str = "The panic built-in function stops normal execution of the current goroutine. When a function F calls panic, normal execution of F stops immediately.";
pub const PRINT_DOC: &str = "The print built-in function formats its arguments in an implementation-specific way and writes the result to standard error. Print is useful for bootstrapping and debugging.";
pub const PRINTLN_DOC: &str = "The println built-in function formats its arguments in an implementation-specific way and writes the result to standard error. Spaces are always added between arguments and a newline is appended.";
pub const RECOVER_DOC: &str = "The recover built-in function allows a program to manage behavior of a panicking goroutine. Executing a call to recover inside a deferred function (but not any function called by it) stops the panicking sequence by restoring normal execution and retrieves the error value passed to the call of panic. If recover is called outside the deferred function it will not stop a panicking sequence.";

/// The builtin gate: returns the doc when `name` and its type match an
/// entry. Anything whose type mentions the dialect domain is never a
/// builtin, whatever it is called.
pub fn is_builtin(name: &str, tv: &TypeAndValue) -> Option<&'static str> {
    let ty = tv.ty.to_string();
    if ty.contains("gno.land/") {
        return None;
    }

    if name == "nil" && ty == "untyped nil" {
        return Some(NIL_DOC);
    }
    if (name == "true" || name == "false") && ty == "bool" {
        return Some(BOOL_DOC);
    }

    if name == ty {
        let doc = match ty.as_str() {
            "byte" => BYTE_DOC,
            "error" => ERROR_DOC,
            "int" => INT_DOC,
            "int8" => INT8_DOC,
            "int16" => INT16_DOC,
            "int32" => INT32_DOC,
            "int64" => INT64_DOC,
            "uint" => UINT_DOC,
            "uint8" => UINT8_DOC,
            "uint16" => UINT16_DOC,
            "uint32" => UINT32_DOC,
            "uint64" => UINT64_DOC,
            "float32" => FLOAT32_DOC,
            "float64" => FLOAT64_DOC,
            "rune" => RUNE_DOC,
            "string" => STRING_DOC,
            "bool" => BOOL_DOC,
            "nil" => NIL_DOC,
            _ => return None,
        };
        return Some(doc);
    }

    if ty.starts_with("func") {
        let doc = match name {
            "append" => APPEND_DOC,
            "cap" => CAP_DOC,
            "clear" => CLEAR_DOC,
            "copy" => COPY_DOC,
            "delete" => DELETE_DOC,
            "len" => LEN_DOC,
            "make" => MAKE_DOC,
            "new" => NEW_DOC,
            "panic" => PANIC_DOC,
            "print" => PRINT_DOC,
            "println" => PRINTLN_DOC,
            "recover" => RECOVER_DOC,
            _ => return None,
        };
        return Some(doc);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::check::Mode;
    use crate::lang::types::{Basic, Type, Untyped};

    fn tv(ty: Type, mode: Mode) -> TypeAndValue {
        TypeAndValue {
            ty,
            value: None,
            mode,
        }
    }

    #[test]
    fn type_names_match_themselves() {
        let doc = is_builtin("int", &tv(Type::Basic(Basic::Int), Mode::Type)).expect("int doc");
        assert_eq!(doc, INT_DOC);
        assert!(is_builtin("int", &tv(Type::Basic(Basic::String), Mode::Type)).is_none());
    }

    #[test]
    fn nil_and_bools_are_special_cased() {
        assert_eq!(
            is_builtin("nil", &tv(Type::Untyped(Untyped::Nil), Mode::Nil)),
            Some(NIL_DOC)
        );
        assert_eq!(
            is_builtin("true", &tv(Type::Untyped(Untyped::Bool), Mode::Value)),
            Some(BOOL_DOC)
        );
    }

    #[test]
    fn domain_types_never_match() {
        let named = Type::named("gno.land/p/demo/avl", "int", Type::Invalid);
        assert!(is_builtin("int", &tv(named, Mode::Type)).is_none());
    }

    #[test]
    fn functions_need_a_func_shape() {
        use crate::lang::types::Signature;
        use std::sync::Arc;
        let func = Type::Func(Arc::new(Signature::default()));
        assert!(is_builtin("len", &tv(func, Mode::Builtin)).is_some());
        assert!(is_builtin("len", &tv(Type::Basic(Basic::Int), Mode::Value)).is_none());
    }
}
