//! Abstract Syntax Tree definitions for Shrun
//!
//! The interpreter never parses shell text itself: a host hands it a tree
//! built from these types. Every node is serde-serializable so a program can
//! travel as JSON between the parser that produced it and the runner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line and column position in source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Whether the position carries real location information
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A whole script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

/// A statement: an optional command plus its modifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub pos: Position,
    #[serde(default)]
    pub cmd: Option<Command>,
    /// `! cmd`
    #[serde(default)]
    pub negated: bool,
    /// `cmd &`
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub redirs: Vec<Redirect>,
}

impl Stmt {
    #[must_use]
    pub fn new(cmd: Command) -> Self {
        Self {
            cmd: Some(cmd),
            ..Self::default()
        }
    }

    /// Statement running a simple command made of literal words
    #[must_use]
    pub fn call(args: &[&str]) -> Self {
        Self::new(Command::Call(CallExpr::new(
            args.iter().map(|a| Word::lit(a)).collect(),
        )))
    }
}

/// A shell command node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// `{ stmts; }`
    Block { stmts: Vec<Stmt> },
    /// `( stmts )`
    Subshell { stmts: Vec<Stmt> },
    /// Simple command with optional prefix assignments
    Call(CallExpr),
    /// `x && y`, `x || y`, `x | y`, `x |& y`
    Binary(BinaryCmd),
    If(IfClause),
    /// `while` and `until` loops
    While(WhileClause),
    For(ForClause),
    /// `name() { body; }`
    FuncDecl { name: String, body: Box<Stmt> },
    /// `(( expr ))`
    Arithm { expr: ArithmExpr },
    /// `let expr...`
    Let { exprs: Vec<ArithmExpr> },
    Case(CaseClause),
    /// `[[ expr ]]`
    Test { expr: TestExpr },
    /// `declare`, `local`, `export` and friends
    Decl(DeclClause),
    /// `time [stmt]`
    Time { stmt: Option<Box<Stmt>> },
    /// `coproc [name] stmt`
    Coproc {
        #[serde(default)]
        pos: Position,
        name: Option<String>,
        stmt: Box<Stmt>,
    },
}

impl Command {
    /// Short node kind name, used in diagnostics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Block { .. } => "Block",
            Self::Subshell { .. } => "Subshell",
            Self::Call(_) => "CallExpr",
            Self::Binary(_) => "BinaryCmd",
            Self::If(_) => "IfClause",
            Self::While(_) => "WhileClause",
            Self::For(_) => "ForClause",
            Self::FuncDecl { .. } => "FuncDecl",
            Self::Arithm { .. } => "ArithmCmd",
            Self::Let { .. } => "LetClause",
            Self::Case(_) => "CaseClause",
            Self::Test { .. } => "TestClause",
            Self::Decl(_) => "DeclClause",
            Self::Time { .. } => "TimeClause",
            Self::Coproc { .. } => "CoprocClause",
        }
    }
}

/// Simple command: `a=b prog args...`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(default)]
    pub pos: Position,
    #[serde(default)]
    pub assigns: Vec<Assign>,
    #[serde(default)]
    pub args: Vec<Word>,
}

impl CallExpr {
    #[must_use]
    pub fn new(args: Vec<Word>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinCmdOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
    /// `|&`
    PipeAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryCmd {
    pub op: BinCmdOp,
    pub x: Box<Stmt>,
    pub y: Box<Stmt>,
}

/// `if cond; then ...; else ...; fi`
///
/// `elif` chains are represented as an `else` branch holding a nested `If`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfClause {
    pub cond: Vec<Stmt>,
    #[serde(default)]
    pub then_stmts: Vec<Stmt>,
    #[serde(default)]
    pub else_stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhileClause {
    /// `until` rather than `while`
    #[serde(default)]
    pub until: bool,
    pub cond: Vec<Stmt>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForClause {
    #[serde(rename = "loop")]
    pub loop_kind: Loop,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Loop {
    /// `for name [in words]`; `None` iterates over the positional parameters
    WordIter {
        name: String,
        items: Option<Vec<Word>>,
    },
    /// `for ((init; cond; post))`
    CStyle {
        init: Option<ArithmExpr>,
        cond: Option<ArithmExpr>,
        post: Option<ArithmExpr>,
    },
}

/// `case word in pattern) stmts ;; ... esac`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseClause {
    pub word: Word,
    #[serde(default)]
    pub arms: Vec<CaseArm>,
}

/// Case pattern arm: `pat1 | pat2) stmts ;;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseArm {
    pub patterns: Vec<Word>,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclClause {
    #[serde(default)]
    pub pos: Position,
    /// `declare`, `local`, `export`, `readonly` or `typeset`
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub opts: Vec<Word>,
    #[serde(default)]
    pub assigns: Vec<Assign>,
}

/// `name[index]=value`, `name+=value` or `name=(elems...)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assign {
    #[serde(default)]
    pub append: bool,
    pub name: String,
    #[serde(default)]
    pub index: Option<ArithmExpr>,
    #[serde(default)]
    pub value: Option<Word>,
    #[serde(default)]
    pub array: Option<Vec<ArrayElem>>,
}

impl Assign {
    #[must_use]
    pub fn scalar(name: &str, value: Word) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn array(name: &str, elems: Vec<ArrayElem>) -> Self {
        Self {
            name: name.to_string(),
            array: Some(elems),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayElem {
    #[serde(default)]
    pub index: Option<ArithmExpr>,
    pub value: Word,
}

/// A grammar word, not yet expanded into fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    #[must_use]
    pub const fn new(parts: Vec<WordPart>) -> Self {
        Self { parts }
    }

    /// Word made of a single unquoted literal
    #[must_use]
    pub fn lit(value: &str) -> Self {
        Self::new(vec![WordPart::Lit {
            value: value.to_string(),
        }])
    }

    /// Word made of a single double-quoted section
    #[must_use]
    pub fn dbl_quoted(parts: Vec<WordPart>) -> Self {
        Self::new(vec![WordPart::DblQuoted { parts }])
    }

    /// The literal text of a word consisting of exactly one literal part
    #[must_use]
    pub fn as_lit(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [WordPart::Lit { value }] => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WordPart {
    Lit {
        value: String,
    },
    /// `'...'`, or `$'...'` when `dollar` is set
    SglQuoted {
        value: String,
        #[serde(default)]
        dollar: bool,
    },
    DblQuoted {
        parts: Vec<WordPart>,
    },
    ParamExp(Box<ParamExp>),
    /// `$(stmts)`
    CmdSubst {
        stmts: Vec<Stmt>,
    },
    /// `$((expr))`
    ArithmExp {
        expr: ArithmExpr,
    },
    /// `<(stmts)` or `>(stmts)`
    ProcSubst {
        #[serde(default)]
        pos: Position,
        #[serde(default)]
        out: bool,
        stmts: Vec<Stmt>,
    },
    /// `@(pattern)` and friends
    ExtGlob {
        #[serde(default)]
        pos: Position,
        op: String,
        pattern: String,
    },
}

impl WordPart {
    #[must_use]
    pub fn lit(value: &str) -> Self {
        Self::Lit {
            value: value.to_string(),
        }
    }

    /// `$name`
    #[must_use]
    pub fn param(name: &str) -> Self {
        Self::ParamExp(Box::new(ParamExp::short(name)))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Lit { .. } => "Lit",
            Self::SglQuoted { .. } => "SglQuoted",
            Self::DblQuoted { .. } => "DblQuoted",
            Self::ParamExp(_) => "ParamExp",
            Self::CmdSubst { .. } => "CmdSubst",
            Self::ArithmExp { .. } => "ArithmExp",
            Self::ProcSubst { .. } => "ProcSubst",
            Self::ExtGlob { .. } => "ExtGlob",
        }
    }
}

/// Parameter expansion: `$a`, `${a}`, `${#a}`, `${!a}`, `${a[i]}`,
/// `${a:off:len}`, `${a/x/y}`, `${a:-def}` and friends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamExp {
    /// `$a` rather than `${a}`
    #[serde(default)]
    pub short: bool,
    /// `${#a}`
    #[serde(default)]
    pub length: bool,
    /// `${!a}`
    #[serde(default)]
    pub excl: bool,
    pub name: String,
    #[serde(default)]
    pub index: Option<ArithmExpr>,
    #[serde(default)]
    pub slice: Option<Slice>,
    #[serde(default)]
    pub repl: Option<Replace>,
    #[serde(default)]
    pub exp: Option<Expansion>,
}

impl ParamExp {
    #[must_use]
    pub fn short(name: &str) -> Self {
        Self {
            short: true,
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn braced(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// `${name[@]}` or `${name[*]}`
    #[must_use]
    pub fn all_elems(name: &str, star: bool) -> Self {
        Self {
            index: Some(ArithmExpr::Word(Word::lit(if star { "*" } else { "@" }))),
            ..Self::braced(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub offset: ArithmExpr,
    #[serde(default)]
    pub length: Option<ArithmExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replace {
    /// `//` rather than `/`
    #[serde(default)]
    pub all: bool,
    pub orig: Word,
    pub with: Word,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    pub op: ParExpOp,
    #[serde(default)]
    pub word: Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParExpOp {
    /// `-`
    DefaultUnset,
    /// `:-`
    DefaultUnsetOrNull,
    /// `+`
    AlternateUnset,
    /// `:+`
    AlternateUnsetOrNull,
    /// `=`
    AssignUnset,
    /// `:=`
    AssignUnsetOrNull,
    /// `?`
    ErrorUnset,
    /// `:?`
    ErrorUnsetOrNull,
    /// `#`
    RemSmallPrefix,
    /// `##`
    RemLargePrefix,
    /// `%`
    RemSmallSuffix,
    /// `%%`
    RemLargeSuffix,
    /// `^`
    UpperFirst,
    /// `^^`
    UpperAll,
    /// `,`
    LowerFirst,
    /// `,,`
    LowerAll,
}

/// Arithmetic expression, as found in `$((...))`, `((...))`, `let` and indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArithmExpr {
    /// A number literal or a variable name
    Word(Word),
    Unary {
        op: UnAritOp,
        /// `x++` rather than `++x`
        #[serde(default)]
        post: bool,
        x: Box<ArithmExpr>,
    },
    Binary {
        op: BinAritOp,
        x: Box<ArithmExpr>,
        y: Box<ArithmExpr>,
    },
    /// `cond ? then : otherwise`
    Ternary {
        cond: Box<ArithmExpr>,
        then: Box<ArithmExpr>,
        otherwise: Box<ArithmExpr>,
    },
    Paren {
        x: Box<ArithmExpr>,
    },
}

impl ArithmExpr {
    #[must_use]
    pub fn lit(value: &str) -> Self {
        Self::Word(Word::lit(value))
    }

    #[must_use]
    pub fn binary(op: BinAritOp, x: Self, y: Self) -> Self {
        Self::Binary {
            op,
            x: Box::new(x),
            y: Box::new(y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnAritOp {
    /// `!`
    Not,
    /// `~`
    BitNegation,
    /// `++`
    Inc,
    /// `--`
    Dec,
    /// `+`
    Plus,
    /// `-`
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinAritOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    Pow,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Lss,
    Leq,
    Gtr,
    Geq,
    Eql,
    Neq,
    AndArit,
    OrArit,
    Comma,
    Assgn,
    AddAssgn,
    SubAssgn,
    MulAssgn,
    QuoAssgn,
    RemAssgn,
    ShlAssgn,
    ShrAssgn,
    AndAssgn,
    OrAssgn,
    XorAssgn,
}

/// Boolean expression inside `[[ ... ]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TestExpr {
    Word(Word),
    Unary {
        op: UnTestOp,
        x: Box<TestExpr>,
    },
    Binary {
        op: BinTestOp,
        x: Box<TestExpr>,
        y: Box<TestExpr>,
    },
    Paren {
        x: Box<TestExpr>,
    },
}

impl TestExpr {
    #[must_use]
    pub fn binary(op: BinTestOp, x: Self, y: Self) -> Self {
        Self::Binary {
            op,
            x: Box::new(x),
            y: Box::new(y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnTestOp {
    /// `-e`
    Exists,
    /// `-f`
    RegFile,
    /// `-d`
    Directory,
    /// `-s`
    NonEmptyFile,
    /// `-r`
    Readable,
    /// `-w`
    Writable,
    /// `-x`
    Executable,
    /// `-L` or `-h`
    Symlink,
    /// `-p`
    NamedPipe,
    /// `-S`
    Socket,
    /// `-b`
    BlockDevice,
    /// `-c`
    CharDevice,
    /// `-z`
    EmptyStr,
    /// `-n`
    NonEmptyStr,
    /// `-o`
    OptionSet,
    /// `!`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinTestOp {
    /// `&&`
    AndTest,
    /// `||`
    OrTest,
    /// `==` or `=`
    MatchPattern,
    /// `!=`
    NoMatchPattern,
    /// `=~`
    ReMatch,
    /// `<`
    TsBefore,
    /// `>`
    TsAfter,
    /// `-eq`
    NumEq,
    /// `-ne`
    NumNeq,
    /// `-lt`
    NumLss,
    /// `-le`
    NumLeq,
    /// `-gt`
    NumGtr,
    /// `-ge`
    NumGeq,
    /// `-nt`
    NewerThan,
    /// `-ot`
    OlderThan,
    /// `-ef`
    SameFile,
}

/// I/O redirection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default)]
    pub pos: Position,
    pub op: RedirOp,
    /// Explicit file descriptor, as in `2>file`
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub word: Word,
    /// Here-document body for `<<` and `<<-`
    #[serde(default)]
    pub hdoc: Option<Word>,
}

/// Type of I/O redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirOp {
    /// `>`
    RdrOut,
    /// `>>`
    AppOut,
    /// `<`
    RdrIn,
    /// `<>`
    RdrInOut,
    /// `<&`
    DplIn,
    /// `>&`
    DplOut,
    /// `>|`
    ClbOut,
    /// `<<`
    Hdoc,
    /// `<<-`
    DashHdoc,
    /// `<<<`
    WordHdoc,
    /// `&>`
    RdrAll,
    /// `&>>`
    AppAll,
}

impl fmt::Display for RedirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RdrOut => ">",
            Self::AppOut => ">>",
            Self::RdrIn => "<",
            Self::RdrInOut => "<>",
            Self::DplIn => "<&",
            Self::DplOut => ">&",
            Self::ClbOut => ">|",
            Self::Hdoc => "<<",
            Self::DashHdoc => "<<-",
            Self::WordHdoc => "<<<",
            Self::RdrAll => "&>",
            Self::AppAll => "&>>",
        };
        f.write_str(s)
    }
}
