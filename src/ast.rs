use crate::lexer::Token;
use crate::memory::Space;

/// An expression captured as its token run plus the raw source text.
#[derive(Debug, Clone)]
pub struct ExprSrc {
    pub tokens: Vec<Token>,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub enum Operand {
    StringLit(String),
    MemoryRead { name: String, index: ExprSrc },
    ObjectGet { name: String, attribute: String },
    StdlibCall(StdlibCall),
    Expr(ExprSrc),
}

#[derive(Debug, Clone)]
pub struct StdlibCall {
    pub namespace: String,
    pub function: String,
    pub args: Vec<ExprSrc>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugAction {
    On,
    Off,
    Step,
    Continue,
    Variables,
    CallStack,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAction {
    Set(usize),
    Clear(usize),
    ClearAll,
    List,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Assign {
        name: String,
        value: Operand,
    },
    Print {
        operands: Vec<Operand>,
    },
    If {
        condition: ExprSrc,
        body: Vec<Stmt>,
    },
    While {
        condition: ExprSrc,
        body: Vec<Stmt>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    ClassDef {
        name: String,
        body: Vec<Stmt>,
    },
    Call {
        name: String,
        args: Vec<ExprSrc>,
    },
    Return {
        value: Option<Operand>,
    },
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Throw {
        value: Operand,
    },
    Import {
        target: String,
    },
    Export {
        target: String,
    },
    Alloc {
        space: Space,
        name: String,
        size: ExprSrc,
    },
    Free {
        space: Option<Space>,
        name: String,
    },
    MemoryRead {
        name: String,
        index: ExprSrc,
    },
    MemoryWrite {
        name: String,
        index: ExprSrc,
        value: Operand,
    },
    SwapOut {
        name: String,
    },
    SwapIn {
        name: String,
    },
    StackPush {
        value: Operand,
    },
    StackPop,
    GcRun,
    ThreadCreate {
        name: String,
    },
    ThreadJoin {
        name: String,
    },
    LockAcquire {
        name: String,
    },
    LockRelease {
        name: String,
    },
    TaskSchedule {
        name: String,
        delay: f64,
        priority: i64,
    },
    TaskStart,
    ProcessCreate {
        name: String,
        priority: i64,
    },
    ProcessTerminate {
        name: String,
    },
    ObjectNew {
        name: String,
        class: String,
    },
    ObjectSet {
        name: String,
        attribute: String,
        value: Operand,
    },
    ObjectGet {
        name: String,
        attribute: String,
    },
    MethodCall {
        object: String,
        method: String,
        args: Vec<ExprSrc>,
    },
    StdlibCall(StdlibCall),
    DebugCmd(DebugAction),
    BreakpointCmd(BreakpointAction),
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub raw: String,
}
