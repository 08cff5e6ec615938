//! Core library for the Osier scripting language: lexing, block parsing,
//! evaluation, the simulated memory and concurrency subsystems, the
//! namespaced stdlib, and the debugger, REPL, and CLI adapters.

pub mod ast;
pub mod concurrency;
pub mod debugger;
pub mod diagnostics;
pub mod environment;
pub mod expr;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use debugger::{AutoContinue, DebugCommand, DebugHandler};
pub use diagnostics::{ErrorKind, OsierError, Result, SyntaxError};
pub use repl::Repl;
pub use runtime::{Interpreter, Outcome};
pub use value::Value;
