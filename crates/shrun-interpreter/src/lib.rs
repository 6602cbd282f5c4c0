//! Shrun interpreter
//!
//! Walks a [`shrun_ast::File`] and runs it: variables and arrays, word
//! expansion, control flow, pipelines, subshells, background statements and
//! redirections. Programs and files are reached through the [`ExecHook`]
//! and [`OpenHook`] traits, so a host decides what "running a command"
//! means.
//!
//! ```no_run
//! use shrun_ast::{File, Stmt};
//! use shrun_interpreter::{Node, OutStream, Runner, RunnerConfig};
//!
//! let out = OutStream::buffer();
//! let mut runner = Runner::new(RunnerConfig {
//!     stdout: Some(out.clone()),
//!     ..RunnerConfig::default()
//! })?;
//! let file = File {
//!     name: "demo".to_string(),
//!     stmts: vec![Stmt::call(&["echo", "hello"])],
//! };
//! runner.run(Node::File(&file))?;
//! assert_eq!(out.contents(), "hello\n");
//! # Ok::<(), shrun_interpreter::RunError>(())
//! ```

mod arith;
mod builtin;
mod cancel;
mod error;
mod expand;
mod hooks;
mod param;
mod pattern;
mod pipe;
mod redirect;
mod runner;
mod stream;
mod testexpr;
mod value;
mod vars;

pub use builtin::is_builtin;
pub use cancel::CancelToken;
pub use error::{ExecError, OpenError, RunError};
pub use expand::expand_escapes;
pub use hooks::{
    DefaultExec, DefaultOpen, ExecHook, HookContext, OpenFlags, OpenHook, lookup_path,
};
pub use pipe::{PIPE_BUFFER_SIZE, PipeReader, PipeWriter, pipe, pipe_with_capacity};
pub use runner::{Node, Runner, RunnerConfig};
pub use stream::{Handle, InStream, OutStream, SharedHandle};
pub use value::{AssocArray, MAX_NAME_REF_DEPTH, Value};
