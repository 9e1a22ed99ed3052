//! # Instruction set
//!
//! One opcode byte per instruction, optionally followed by an immediate
//! operand of fixed width (`W`, `I`, `X`, a raw `u8`, or nothing). The table
//! below is the single source of truth for operand widths; the compiler and
//! the VM both consult it instead of duplicating the layout.

use crate::arena::{SIZE_I, SIZE_W, SIZE_X};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Halt = 1,
    Push,
    PushW,
    PushB,
    Pop,
    PushString,
    GlobalFetch,
    GlobalStore,
    LocalFetch0,
    LocalFetch1,
    LocalFetch,
    Call,
    TCall,
    CCall,
    Return,
    Branch,
    Jump,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    UMul,
    UDiv,
    UMod,
    ULt,
    Negate,
    Eq,
    Lt,
    And,
    Or,
    Xor,
    Sla,
    Sra,
    Srl,
    GetC,
    PutC,
    RefB,
    RefV,
    RefX,
    SetV,
    SetX,
    SetB,
}

impl Opcode {
    pub fn from_byte(b: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match b {
            1 => Halt,
            2 => Push,
            3 => PushW,
            4 => PushB,
            5 => Pop,
            6 => PushString,
            7 => GlobalFetch,
            8 => GlobalStore,
            9 => LocalFetch0,
            10 => LocalFetch1,
            11 => LocalFetch,
            12 => Call,
            13 => TCall,
            14 => CCall,
            15 => Return,
            16 => Branch,
            17 => Jump,
            18 => Add,
            19 => Sub,
            20 => Mul,
            21 => Div,
            22 => Mod,
            23 => UMul,
            24 => UDiv,
            25 => UMod,
            26 => ULt,
            27 => Negate,
            28 => Eq,
            29 => Lt,
            30 => And,
            31 => Or,
            32 => Xor,
            33 => Sla,
            34 => Sra,
            35 => Srl,
            36 => GetC,
            37 => PutC,
            38 => RefB,
            39 => RefV,
            40 => RefX,
            41 => SetV,
            42 => SetX,
            43 => SetB,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Width in bytes of this opcode's immediate operand, 0 if none.
    /// `PushString` and `Call`/`TCall`/`CCall` arity bytes are handled by
    /// their callers since their operand shapes are variable or context
    /// dependent.
    pub fn operand_width(self) -> usize {
        use Opcode::*;
        match self {
            Push => SIZE_W,
            PushW => SIZE_I,
            PushB => 1,
            GlobalFetch | GlobalStore | Call | TCall | CCall | Branch | Jump => SIZE_X,
            LocalFetch => 1,
            _ => 0,
        }
    }

    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Halt => "HALT",
            Push => "PUSH",
            PushW => "PUSHW",
            PushB => "PUSHB",
            Pop => "POP",
            PushString => "PUSH_STRING",
            GlobalFetch => "GLOBAL_FETCH",
            GlobalStore => "GLOBAL_STORE",
            LocalFetch0 => "LOCAL_FETCH_0",
            LocalFetch1 => "LOCAL_FETCH_1",
            LocalFetch => "LOCAL_FETCH",
            Call => "CALL",
            TCall => "TCALL",
            CCall => "CCALL",
            Return => "RETURN",
            Branch => "BRANCH",
            Jump => "JUMP",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            UMul => "UMUL",
            UDiv => "UDIV",
            UMod => "UMOD",
            ULt => "ULT",
            Negate => "NEGATE",
            Eq => "EQ",
            Lt => "LT",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Sla => "SLA",
            Sra => "SRA",
            Srl => "SRL",
            GetC => "GETC",
            PutC => "PUTC",
            RefB => "REFB",
            RefV => "REFV",
            RefX => "REFX",
            SetV => "SETV",
            SetX => "SETX",
            SetB => "SETB",
        }
    }
}

/// Follow a chain of `JUMP`s starting at `pc` in `code`, returning the
/// offset of the first non-`JUMP` instruction reached. Used by the VM's
/// runtime tail-call detector: a `CALL` whose callee ultimately resolves
/// (through zero or more jumps) to a `RETURN` is safe to rewrite as a
/// `TCALL`.
///
/// `JUMP`'s `X` operand is a displacement from the offset of the operand
/// itself (not an absolute address) — the same convention `Assembler::resolve`
/// uses when patching forward references — so each step computes
/// `operand_offset + displacement`, not the raw decoded value.
pub fn skip_jump_chain(code: &[u8], mut pc: usize) -> usize {
    loop {
        match Opcode::from_byte(code[pc]) {
            Some(Opcode::Jump) => {
                let r = pc + 1;
                let disp = u16::from_le_bytes([code[r], code[r + 1]]) as usize;
                pc = r + disp;
            }
            _ => return pc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_byte_roundtrip() {
        for b in 1u8..=43 {
            let op = Opcode::from_byte(b).unwrap();
            assert_eq!(op.as_byte(), b);
        }
    }

    #[test]
    fn unknown_opcode_byte_is_none() {
        assert!(Opcode::from_byte(0).is_none());
        assert!(Opcode::from_byte(200).is_none());
    }

    #[test]
    fn jump_chain_skips_to_non_jump() {
        // JUMP -> JUMP -> RETURN, laid out at offsets 0, 3, 6; each JUMP's
        // operand is a displacement from its own offset (offset 1 -> 3 is
        // displacement 2, offset 4 -> 6 is displacement 2).
        let mut code = vec![0u8; 7];
        code[0] = Opcode::Jump.as_byte();
        code[1..3].copy_from_slice(&2u16.to_le_bytes());
        code[3] = Opcode::Jump.as_byte();
        code[4..6].copy_from_slice(&2u16.to_le_bytes());
        code[6] = Opcode::Return.as_byte();
        assert_eq!(skip_jump_chain(&code, 0), 6);
    }
}
