//! Resolved program representation consumed by the compiler.
//!
//! The parser is an external collaborator: it hands this crate a
//! [`Program`] in which every variable reference already carries a scope
//! tag and a numeric index, every function call is resolved to a table
//! index, and scalar/array name spaces are separated. Nothing in here is
//! looked up by name at runtime; the name tables exist for diagnostics and
//! disassembly only.
//!
//! The whole tree derives serde so a parser living in another process (or
//! another language) can ship programs across a JSON boundary; see
//! [`crate::api::compile_json`].

use serde::{Deserialize, Serialize};

/// Built-in variables whose reads and writes are wired to interpreter
/// state. The set is fixed; the parser resolves names to these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialVar {
    Nf,
    Nr,
    Fnr,
    Fs,
    Rs,
    Ofs,
    Ors,
    Convfmt,
    Ofmt,
    Subsep,
    Filename,
    Argc,
    Rstart,
    Rlength,
    Rt,
}

impl SpecialVar {
    /// The AWK-level name, as it appears in source and disassembly.
    pub fn name(self) -> &'static str {
        match self {
            SpecialVar::Nf => "NF",
            SpecialVar::Nr => "NR",
            SpecialVar::Fnr => "FNR",
            SpecialVar::Fs => "FS",
            SpecialVar::Rs => "RS",
            SpecialVar::Ofs => "OFS",
            SpecialVar::Ors => "ORS",
            SpecialVar::Convfmt => "CONVFMT",
            SpecialVar::Ofmt => "OFMT",
            SpecialVar::Subsep => "SUBSEP",
            SpecialVar::Filename => "FILENAME",
            SpecialVar::Argc => "ARGC",
            SpecialVar::Rstart => "RSTART",
            SpecialVar::Rlength => "RLENGTH",
            SpecialVar::Rt => "RT",
        }
    }

    pub fn from_name(name: &str) -> Option<SpecialVar> {
        Some(match name {
            "NF" => SpecialVar::Nf,
            "NR" => SpecialVar::Nr,
            "FNR" => SpecialVar::Fnr,
            "FS" => SpecialVar::Fs,
            "RS" => SpecialVar::Rs,
            "OFS" => SpecialVar::Ofs,
            "ORS" => SpecialVar::Ors,
            "CONVFMT" => SpecialVar::Convfmt,
            "OFMT" => SpecialVar::Ofmt,
            "SUBSEP" => SpecialVar::Subsep,
            "FILENAME" => SpecialVar::Filename,
            "ARGC" => SpecialVar::Argc,
            "RSTART" => SpecialVar::Rstart,
            "RLENGTH" => SpecialVar::Rlength,
            "RT" => SpecialVar::Rt,
            _ => return None,
        })
    }
}

/// A resolved scalar variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scalar {
    Global(usize),
    /// Slot index among the enclosing function's scalar parameters.
    Local(usize),
    Special(SpecialVar),
}

/// A resolved array reference. Arrays have their own ID space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Array {
    Global(usize),
    /// Slot index among the enclosing function's array parameters.
    Local(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
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
    Match,
    NotMatch,
}

impl BinOp {
    /// Whether this operator is one of the six comparisons, which the
    /// compiler may fuse into a conditional jump.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Equals
                | BinOp::NotEquals
                | BinOp::Less
                | BinOp::LessOrEqual
                | BinOp::Greater
                | BinOp::GreaterOrEqual
        )
    }
}

/// Operators usable in augmented assignment (`+=` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AugOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

/// Assignable places: scalars, fields, and array elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LValue {
    Var(Scalar),
    Field(Box<Expr>),
    Index(Array, Vec<Expr>),
}

/// Stateless built-in functions dispatched through a single generic call
/// opcode. Built-ins that bind an l-value or an array (`split`, `sub`,
/// `gsub`, `sprintf`) have dedicated expression forms instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinFn {
    Atan2,
    Close,
    Cos,
    Exp,
    Fflush,
    Index,
    Int,
    Length,
    Log,
    Match,
    Rand,
    Sin,
    Sqrt,
    Srand,
    Substr,
    System,
    Tolower,
    Toupper,
}

impl BuiltinFn {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Atan2 => "atan2",
            BuiltinFn::Close => "close",
            BuiltinFn::Cos => "cos",
            BuiltinFn::Exp => "exp",
            BuiltinFn::Fflush => "fflush",
            BuiltinFn::Index => "index",
            BuiltinFn::Int => "int",
            BuiltinFn::Length => "length",
            BuiltinFn::Log => "log",
            BuiltinFn::Match => "match",
            BuiltinFn::Rand => "rand",
            BuiltinFn::Sin => "sin",
            BuiltinFn::Sqrt => "sqrt",
            BuiltinFn::Srand => "srand",
            BuiltinFn::Substr => "substr",
            BuiltinFn::System => "system",
            BuiltinFn::Tolower => "tolower",
            BuiltinFn::Toupper => "toupper",
        }
    }
}

/// Where a `getline` reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GetlineSource {
    /// Plain `getline`: the main input, advancing `NR`/`FNR`.
    Main,
    /// `getline < expr`: a named file.
    File(Box<Expr>),
    /// `expr | getline`: a command's standard output.
    Command(Box<Expr>),
}

/// Where a `getline` stores the line it read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GetlineTarget {
    /// No variable: `$0` is replaced and fields are re-split.
    Record,
    Var(Scalar),
    Field(Box<Expr>),
    Index(Array, Vec<Expr>),
}

/// An argument to a user-defined function call. Arrays are passed by
/// identity, so they are resolved references rather than expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallArg {
    Scalar(Expr),
    Array(Array),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Num(f64),
    Str(String),
    /// A regex literal in value position matches against `$0`.
    Regex(String),
    Var(Scalar),
    Field(Box<Expr>),
    Index(Array, Vec<Expr>),
    Assign {
        target: LValue,
        value: Box<Expr>,
    },
    AugAssign {
        target: LValue,
        op: AugOp,
        value: Box<Expr>,
    },
    /// `++`/`--`, pre or post.
    Incr {
        pre: bool,
        by: i32,
        target: LValue,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        value: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        yes: Box<Expr>,
        no: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `(i, j, …) in array`. Never materializes the key.
    In {
        index: Vec<Expr>,
        array: Array,
    },
    Builtin {
        func: BuiltinFn,
        args: Vec<Expr>,
    },
    Split {
        string: Box<Expr>,
        array: Array,
        sep: Option<Box<Expr>>,
    },
    Subst {
        global: bool,
        regex: Box<Expr>,
        replacement: Box<Expr>,
        /// None means the default target `$0`.
        target: Option<LValue>,
    },
    Sprintf {
        args: Vec<Expr>,
    },
    CallUser {
        func: usize,
        args: Vec<CallArg>,
    },
    CallNative {
        func: usize,
        args: Vec<Expr>,
    },
    Getline {
        source: GetlineSource,
        target: GetlineTarget,
    },
}

/// Output redirection mode for `print`/`printf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirMode {
    /// `> expr` — truncate on first open.
    File,
    /// `>> expr` — append.
    Append,
    /// `| expr` — pipe to a command.
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Print {
        args: Vec<Expr>,
        redirect: Option<(RedirMode, Expr)>,
    },
    Printf {
        args: Vec<Expr>,
        redirect: Option<(RedirMode, Expr)>,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    ForIn {
        var: Scalar,
        array: Array,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Next,
    NextFile,
    Exit(Option<Expr>),
    Return(Option<Expr>),
    /// `delete a[i]`; an empty index list clears the whole array.
    Delete {
        array: Array,
        index: Vec<Expr>,
    },
    Block(Vec<Stmt>),
}

/// A pattern deciding whether an action runs for a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// No pattern: runs for every record.
    Always,
    Expr(Expr),
    /// `start, stop` range pattern; both endpoints compile separately.
    Range(Expr, Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub pattern: Pattern,
    /// None means the implicit `{ print }`.
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// One entry per declared parameter, in order; true marks an array.
    pub params: Vec<bool>,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn num_scalar_params(&self) -> usize {
        self.params.iter().filter(|is_array| !**is_array).count()
    }

    pub fn num_array_params(&self) -> usize {
        self.params.iter().filter(|is_array| **is_array).count()
    }
}

/// A fully resolved AWK program, ready for compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub begin: Vec<Stmt>,
    pub actions: Vec<Action>,
    pub end: Vec<Stmt>,
    pub functions: Vec<Function>,
    /// Global scalar names, indexed by `Scalar::Global` ID.
    pub scalar_names: Vec<String>,
    /// Global array names, indexed by `Array::Global` ID.
    pub array_names: Vec<String>,
    /// Native (host) function names, indexed by `Expr::CallNative` ID.
    pub native_names: Vec<String>,
}

impl Program {
    /// Look up a global array ID by name. Used to locate `ARGV`,
    /// `ENVIRON`, and command-line assignment targets at setup time.
    pub fn array_id(&self, name: &str) -> Option<usize> {
        self.array_names.iter().position(|n| n == name)
    }

    pub fn scalar_id(&self, name: &str) -> Option<usize> {
        self.scalar_names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_var_name_round_trip() {
        for sv in [
            SpecialVar::Nf,
            SpecialVar::Nr,
            SpecialVar::Fnr,
            SpecialVar::Fs,
            SpecialVar::Rs,
            SpecialVar::Ofs,
            SpecialVar::Ors,
            SpecialVar::Convfmt,
            SpecialVar::Ofmt,
            SpecialVar::Subsep,
            SpecialVar::Filename,
            SpecialVar::Argc,
            SpecialVar::Rstart,
            SpecialVar::Rlength,
            SpecialVar::Rt,
        ] {
            assert_eq!(SpecialVar::from_name(sv.name()), Some(sv));
        }
        assert_eq!(SpecialVar::from_name("NOPE"), None);
    }

    #[test]
    fn test_function_param_counts() {
        let f = Function {
            name: "f".to_string(),
            params: vec![true, false, false, true],
            body: vec![],
        };
        assert_eq!(f.num_scalar_params(), 2);
        assert_eq!(f.num_array_params(), 2);
    }

    #[test]
    fn test_program_json_round_trip() {
        let prog = Program {
            begin: vec![Stmt::Print {
                args: vec![Expr::Str("hi".to_string())],
                redirect: None,
            }],
            scalar_names: vec!["x".to_string()],
            ..Program::default()
        };
        let json = serde_json::to_string(&prog).unwrap();
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(prog, back);
    }
}
