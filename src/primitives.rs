//! # Primitive dictionary
//!
//! A small, read-only, compiled-in table of names for opcodes that have no
//! dedicated operator syntax (`getc`, `putc`, the unsigned arithmetic
//! variants, the shifts, and the byte/index peek/poke pairs). Looked up as a
//! fallback when a name is not found in the user dictionary.

use once_cell::sync::Lazy;

use crate::bytecode::Opcode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: u8,
    pub opcode: Opcode,
}

pub static PRIMITIVES: Lazy<Vec<Primitive>> = Lazy::new(|| {
    use Opcode::*;
    vec![
        Primitive { name: "getc", arity: 0, opcode: GetC },
        Primitive { name: "putc", arity: 1, opcode: PutC },
        Primitive { name: "umul", arity: 2, opcode: UMul },
        Primitive { name: "udiv", arity: 2, opcode: UDiv },
        Primitive { name: "umod", arity: 2, opcode: UMod },
        Primitive { name: "ult", arity: 2, opcode: ULt },
        Primitive { name: "sla", arity: 2, opcode: Sla },
        Primitive { name: "sra", arity: 2, opcode: Sra },
        Primitive { name: "srl", arity: 2, opcode: Srl },
        Primitive { name: "peekb", arity: 1, opcode: RefB },
        Primitive { name: "pokeb", arity: 2, opcode: SetB },
        Primitive { name: "peekx", arity: 1, opcode: RefX },
        Primitive { name: "pokex", arity: 2, opcode: SetX },
    ]
});

pub fn lookup(name: &[u8]) -> Option<Primitive> {
    PRIMITIVES.iter().find(|p| p.name.as_bytes() == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_primitive() {
        let p = lookup(b"putc").unwrap();
        assert_eq!(p.arity, 1);
        assert_eq!(p.opcode, Opcode::PutC);
    }

    #[test]
    fn lookup_unknown_is_none() {
        assert!(lookup(b"nope").is_none());
    }

    #[test]
    fn all_names_fit_dictionary_limit() {
        for p in PRIMITIVES.iter() {
            assert!(p.name.len() <= 16);
        }
    }
}
