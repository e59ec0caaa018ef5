//! The bytecode instruction set.
//!
//! Opcodes are specialized by operand scope — loading a global, a local
//! slot, or a special variable are distinct instructions — so the
//! dispatch loop never re-dispatches on scope at runtime. Operands are
//! carried inline in the variant.
//!
//! Branch operands are signed offsets relative to the instruction
//! *following* the branch. Blocks are therefore position-independent and
//! the compiler can emit into an append-only buffer, patching forward
//! branches when their targets become known.

use serde::{Deserialize, Serialize};

use crate::ast::{Array, AugOp, BuiltinFn, RedirMode, SpecialVar};

/// The l-value a `sub`/`gsub` writes back to, fixed at compile time.
/// `Field` and the array variants pop their index/key from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubstTarget {
    /// The default target `$0`.
    Record,
    Field,
    Global(usize),
    Local(usize),
    Special(SpecialVar),
    ArrayGlobal(usize),
    ArrayLocal(usize),
}

/// Where a `Getline` reads from. `File` and `Command` pop the name
/// expression from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoSource {
    Main,
    File,
    Command,
}

/// Where a `Getline` stores the line. `Field` and the array variants pop
/// their index/key from the stack (above the source operand, if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoTarget {
    Record,
    Global(usize),
    Local(usize),
    Special(SpecialVar),
    Field,
    ArrayGlobal(usize),
    ArrayLocal(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    // constants
    /// Push the numeric constant at pool index.
    Num(usize),
    /// Push the string constant at pool index.
    Str(usize),
    /// Match `$0` against the regex constant, push 1 or 0.
    Regex(usize),
    /// Push n null values (missing-argument padding).
    Nulls(usize),

    // scalar access
    Global(usize),
    Local(usize),
    Special(SpecialVar),
    /// Pop into the global; assignments never push.
    AssignGlobal(usize),
    AssignLocal(usize),
    AssignSpecial(SpecialVar),
    AugGlobal(AugOp, usize),
    AugLocal(AugOp, usize),
    AugSpecial(AugOp, SpecialVar),
    /// Add the immediate (±1) to the numeric view in place; no stack
    /// traffic. The compiler pushes the pre/post value separately when
    /// the expression result is consumed.
    IncrGlobal(i32, usize),
    IncrLocal(i32, usize),
    IncrSpecial(i32, SpecialVar),

    // field access
    /// Pop the field index, push the field.
    Field,
    /// Push field k (immediate index).
    FieldNum(usize),
    /// Pop index, pop value, store into the field (re-splitting or
    /// rejoining as needed).
    AssignField,
    /// Pop index, pop operand, apply op to the field.
    AugField(AugOp),
    /// Pop index, increment the field by the immediate.
    IncrField(i32),

    // array access
    /// Pop the key, push the element (materializing a null on miss).
    ArrayGlobal(usize),
    ArrayLocal(usize),
    /// Pop key, pop value, store.
    AssignArrayGlobal(usize),
    AssignArrayLocal(usize),
    AugArrayGlobal(AugOp, usize),
    AugArrayLocal(AugOp, usize),
    IncrArrayGlobal(i32, usize),
    IncrArrayLocal(i32, usize),
    /// Pop the key, push 1/0 membership. Never materializes.
    InGlobal(usize),
    InLocal(usize),
    /// Pop the key, remove the element.
    DeleteGlobal(usize),
    DeleteLocal(usize),
    DeleteAllGlobal(usize),
    DeleteAllLocal(usize),
    /// Pop n values, join with `SUBSEP`, push the combined key.
    MultiIndex(usize),

    // operators
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Concat,
    Equals,
    NotEquals,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// Pop pattern (as string), pop target, push 1/0.
    Match,
    NotMatch,
    Negate,
    UnaryPlus,
    Not,
    /// Normalize the top of stack to a 1/0 number.
    Boolean,

    // control flow
    Jump(i32),
    JumpTrue(i32),
    JumpFalse(i32),
    // Comparison fused with the branch: pop right, pop left, compare,
    // branch when the comparison holds.
    JumpEquals(i32),
    JumpNotEquals(i32),
    JumpLess(i32),
    JumpLessOrEqual(i32),
    JumpGreater(i32),
    JumpGreaterOrEqual(i32),

    /// Iterate the array's keys, assigning each to the variable and
    /// running the next `body_len` instructions as the loop body. The
    /// key set is snapshotted at entry: keys added during iteration are
    /// not visited; deleted keys are still visited (their value reads
    /// back as null).
    ForInGlobal {
        var: usize,
        array: Array,
        body_len: usize,
    },
    ForInLocal {
        var: usize,
        array: Array,
        body_len: usize,
    },
    ForInSpecial {
        var: SpecialVar,
        array: Array,
        body_len: usize,
    },
    /// `break` directly inside a for-in body: unwind to the loop opcode.
    BreakForIn,

    // calls
    /// Call a user function. Scalar arguments are already on the stack
    /// (padded with nulls); array arguments are resolved references,
    /// shared by identity, in declaration order.
    CallUser {
        func: usize,
        array_args: Vec<Array>,
    },
    /// Call a host-registered native function with n stack arguments.
    CallNative {
        func: usize,
        num_args: usize,
    },
    /// Generic call for stateless built-ins.
    CallBuiltin {
        func: BuiltinFn,
        num_args: usize,
    },
    /// `split(s, a)` using FS: pop the string, push the count.
    CallSplitGlobal(usize),
    CallSplitLocal(usize),
    /// `split(s, a, fs)`: pop the separator, pop the string.
    CallSplitSepGlobal(usize),
    CallSplitSepLocal(usize),
    /// Pop n args (format deepest), push the formatted string.
    CallSprintf(usize),
    /// Pop replacement, pop pattern (target index/key above them when
    /// applicable), substitute first match, push the count.
    CallSub {
        target: SubstTarget,
    },
    /// Like `CallSub` but substitutes every non-overlapping match.
    CallGsub {
        target: SubstTarget,
    },

    // I/O
    /// Pop the redirect expression (if any), then n values (first
    /// argument deepest); zero arguments prints `$0`.
    Print {
        num_args: usize,
        redirect: Option<RedirMode>,
    },
    Printf {
        num_args: usize,
        redirect: Option<RedirMode>,
    },
    /// Read one record per the source/target pair; push 1, 0, or -1.
    Getline {
        source: IoSource,
        target: IoTarget,
    },

    // stack / meta
    Dup,
    Drop,
    /// Pop the return value and unwind the current user call.
    Return,
    /// Unwind the current user call returning null.
    ReturnNull,
    Exit,
    /// Pop the exit status, then exit.
    ExitStatus,
    Next,
    NextFile,
    Nop,
}

impl Instr {
    /// Mnemonic used by the disassembler and its tests.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instr::Num(_) => "Num",
            Instr::Str(_) => "Str",
            Instr::Regex(_) => "Regex",
            Instr::Nulls(_) => "Nulls",
            Instr::Global(_) => "Global",
            Instr::Local(_) => "Local",
            Instr::Special(_) => "Special",
            Instr::AssignGlobal(_) => "AssignGlobal",
            Instr::AssignLocal(_) => "AssignLocal",
            Instr::AssignSpecial(_) => "AssignSpecial",
            Instr::AugGlobal(..) => "AugGlobal",
            Instr::AugLocal(..) => "AugLocal",
            Instr::AugSpecial(..) => "AugSpecial",
            Instr::IncrGlobal(..) => "IncrGlobal",
            Instr::IncrLocal(..) => "IncrLocal",
            Instr::IncrSpecial(..) => "IncrSpecial",
            Instr::Field => "Field",
            Instr::FieldNum(_) => "FieldNum",
            Instr::AssignField => "AssignField",
            Instr::AugField(_) => "AugField",
            Instr::IncrField(_) => "IncrField",
            Instr::ArrayGlobal(_) => "ArrayGlobal",
            Instr::ArrayLocal(_) => "ArrayLocal",
            Instr::AssignArrayGlobal(_) => "AssignArrayGlobal",
            Instr::AssignArrayLocal(_) => "AssignArrayLocal",
            Instr::AugArrayGlobal(..) => "AugArrayGlobal",
            Instr::AugArrayLocal(..) => "AugArrayLocal",
            Instr::IncrArrayGlobal(..) => "IncrArrayGlobal",
            Instr::IncrArrayLocal(..) => "IncrArrayLocal",
            Instr::InGlobal(_) => "InGlobal",
            Instr::InLocal(_) => "InLocal",
            Instr::DeleteGlobal(_) => "DeleteGlobal",
            Instr::DeleteLocal(_) => "DeleteLocal",
            Instr::DeleteAllGlobal(_) => "DeleteAllGlobal",
            Instr::DeleteAllLocal(_) => "DeleteAllLocal",
            Instr::MultiIndex(_) => "MultiIndex",
            Instr::Add => "Add",
            Instr::Subtract => "Subtract",
            Instr::Multiply => "Multiply",
            Instr::Divide => "Divide",
            Instr::Modulo => "Modulo",
            Instr::Power => "Power",
            Instr::Concat => "Concat",
            Instr::Equals => "Equals",
            Instr::NotEquals => "NotEquals",
            Instr::Less => "Less",
            Instr::LessOrEqual => "LessOrEqual",
            Instr::Greater => "Greater",
            Instr::GreaterOrEqual => "GreaterOrEqual",
            Instr::Match => "Match",
            Instr::NotMatch => "NotMatch",
            Instr::Negate => "Negate",
            Instr::UnaryPlus => "UnaryPlus",
            Instr::Not => "Not",
            Instr::Boolean => "Boolean",
            Instr::Jump(_) => "Jump",
            Instr::JumpTrue(_) => "JumpTrue",
            Instr::JumpFalse(_) => "JumpFalse",
            Instr::JumpEquals(_) => "JumpEquals",
            Instr::JumpNotEquals(_) => "JumpNotEquals",
            Instr::JumpLess(_) => "JumpLess",
            Instr::JumpLessOrEqual(_) => "JumpLessOrEqual",
            Instr::JumpGreater(_) => "JumpGreater",
            Instr::JumpGreaterOrEqual(_) => "JumpGreaterOrEqual",
            Instr::ForInGlobal { .. } => "ForInGlobal",
            Instr::ForInLocal { .. } => "ForInLocal",
            Instr::ForInSpecial { .. } => "ForInSpecial",
            Instr::BreakForIn => "BreakForIn",
            Instr::CallUser { .. } => "CallUser",
            Instr::CallNative { .. } => "CallNative",
            Instr::CallBuiltin { .. } => "CallBuiltin",
            Instr::CallSplitGlobal(_) => "CallSplitGlobal",
            Instr::CallSplitLocal(_) => "CallSplitLocal",
            Instr::CallSplitSepGlobal(_) => "CallSplitSepGlobal",
            Instr::CallSplitSepLocal(_) => "CallSplitSepLocal",
            Instr::CallSprintf(_) => "CallSprintf",
            Instr::CallSub { .. } => "CallSub",
            Instr::CallGsub { .. } => "CallGsub",
            Instr::Print { .. } => "Print",
            Instr::Printf { .. } => "Printf",
            Instr::Getline { .. } => "Getline",
            Instr::Dup => "Dup",
            Instr::Drop => "Drop",
            Instr::Return => "Return",
            Instr::ReturnNull => "ReturnNull",
            Instr::Exit => "Exit",
            Instr::ExitStatus => "ExitStatus",
            Instr::Next => "Next",
            Instr::NextFile => "NextFile",
            Instr::Nop => "Nop",
        }
    }

    /// The relative branch operand, if this is a branch.
    pub fn branch_offset(&self) -> Option<i32> {
        match self {
            Instr::Jump(off)
            | Instr::JumpTrue(off)
            | Instr::JumpFalse(off)
            | Instr::JumpEquals(off)
            | Instr::JumpNotEquals(off)
            | Instr::JumpLess(off)
            | Instr::JumpLessOrEqual(off)
            | Instr::JumpGreater(off)
            | Instr::JumpGreaterOrEqual(off) => Some(*off),
            _ => None,
        }
    }
}
