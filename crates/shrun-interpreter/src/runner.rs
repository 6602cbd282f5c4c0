//! Execution engine: walks statements and commands, keeping the exit status
//! and the fatal error of the run.

use crate::builtin::is_builtin;
use crate::cancel::CancelToken;
use crate::error::{ExecError, RunError};
use crate::hooks::{DefaultExec, DefaultOpen, ExecHook, HookContext, OpenHook};
use crate::pipe::pipe;
use crate::redirect::Redirected;
use crate::stream::{InStream, OutStream, SharedHandle};
use crate::value::{AssocArray, Value};
use crate::vars::DeclMode;
use shrun_ast::{
    BinCmdOp, BinaryCmd, CallExpr, Command, DeclClause, File, ForClause, IfClause, Loop, Position,
    Stmt, WhileClause,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Loop control carried outward from a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    /// Levels of enclosing loops still to leave
    Break(u32),
    /// Levels of enclosing loops still to skip to the next iteration of
    Continue(u32),
}

pub(crate) type Eval = Result<Flow, RunError>;

/// What a runner can be asked to interpret
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    File(&'a File),
    Stmt(&'a Stmt),
    Command(&'a Command),
}

/// Settings for a new [`Runner`]; every field has a usable default
#[derive(Default)]
pub struct RunnerConfig {
    /// `KEY=VALUE` entries; `None` takes the process environment
    pub env: Option<Vec<String>>,
    /// Working directory; `None` takes the process working directory
    pub dir: Option<PathBuf>,
    /// Initial positional parameters
    pub params: Vec<String>,
    /// Defaults to empty input
    pub stdin: Option<InStream>,
    /// Defaults to the process's stdout
    pub stdout: Option<OutStream>,
    /// Defaults to the process's stderr
    pub stderr: Option<OutStream>,
    /// Defaults to [`DefaultExec`]
    pub exec: Option<Arc<dyn ExecHook>>,
    /// Defaults to [`DefaultOpen`]
    pub open: Option<Arc<dyn OpenHook>>,
    pub cancel: CancelToken,
}

/// Interprets a shell syntax tree.
///
/// A runner interprets exactly one program; create a new one for the next.
pub struct Runner {
    pub(crate) env: Vec<String>,
    pub(crate) env_map: HashMap<String, String>,
    pub(crate) exported: HashSet<String>,
    pub(crate) dir: PathBuf,
    pub(crate) dir_stack: Vec<PathBuf>,
    pub(crate) params: Vec<String>,
    pub(crate) exec: Arc<dyn ExecHook>,
    pub(crate) open: Arc<dyn OpenHook>,
    pub(crate) filename: String,

    pub(crate) vars: HashMap<String, Value>,
    pub(crate) funcs: HashMap<String, Arc<Stmt>>,
    /// Prefix assignments of the command being run, as in `a=b cmd`
    pub(crate) cmd_vars: HashMap<String, Value>,

    pub(crate) in_loop: bool,
    pub(crate) can_return: bool,
    pub(crate) stop_on_cmd_err: bool,
    /// Inside a condition, where a failing command must not stop the run
    pub(crate) no_err_exit: bool,
    pub(crate) exit: u8,
    /// Fatal error raised while a word was being expanded, surfaced once
    /// the statement holding the word finishes
    pub(crate) pending: Option<RunError>,

    pub(crate) stdin: InStream,
    pub(crate) stdout: OutStream,
    pub(crate) stderr: OutStream,

    pub(crate) background: Vec<JoinHandle<Result<(), RunError>>>,
    pub(crate) cancel: CancelToken,
    used: bool,
}

impl Runner {
    /// Create a runner in the clean baseline state.
    ///
    /// # Errors
    ///
    /// `RunError::Config` when an environment entry is not `KEY=VALUE` or
    /// the working directory cannot be determined.
    pub fn new(config: RunnerConfig) -> Result<Self, RunError> {
        let env = match config.env {
            Some(env) => env,
            None => std::env::vars().map(|(k, v)| format!("{k}={v}")).collect(),
        };
        let mut env_map = HashMap::with_capacity(env.len());
        for kv in &env {
            let (key, val) = kv.split_once('=').ok_or_else(|| {
                RunError::Config(format!("env not in the form key=value: {kv:?}"))
            })?;
            env_map.insert(key.to_string(), val.to_string());
        }

        let dir = match config.dir {
            Some(dir) if dir.is_absolute() => dir,
            other => {
                let cwd = std::env::current_dir().map_err(|err| {
                    RunError::Config(format!("could not get current dir: {err}"))
                })?;
                other.map_or_else(|| cwd.clone(), |dir| cwd.join(dir))
            }
        };

        let mut vars = HashMap::new();
        if !env_map.contains_key("HOME") {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
            vars.insert("HOME".to_string(), Value::Scalar(home));
        }
        vars.insert(
            "PWD".to_string(),
            Value::Scalar(dir.display().to_string()),
        );

        Ok(Self {
            env,
            env_map,
            exported: HashSet::new(),
            dir_stack: vec![dir.clone()],
            dir,
            params: config.params,
            exec: config.exec.unwrap_or_else(|| Arc::new(DefaultExec)),
            open: config.open.unwrap_or_else(|| Arc::new(DefaultOpen)),
            filename: String::new(),
            vars,
            funcs: HashMap::new(),
            cmd_vars: HashMap::new(),
            in_loop: false,
            can_return: false,
            stop_on_cmd_err: false,
            no_err_exit: false,
            exit: 0,
            pending: None,
            stdin: config.stdin.unwrap_or_else(InStream::null),
            stdout: config.stdout.unwrap_or_else(OutStream::stdout),
            stderr: config.stderr.unwrap_or_else(OutStream::stderr),
            background: Vec::new(),
            cancel: config.cancel,
            used: false,
        })
    }

    /// Apply leading shell options and return the remaining arguments.
    ///
    /// Options are `-e`/`+e` (stop on the first failing command) and may be
    /// grouped. A bare `--` or the first argument not starting with `-` or
    /// `+` ends option parsing.
    ///
    /// # Errors
    ///
    /// `RunError::Config` for an option that is not recognised.
    pub fn from_args(&mut self, args: &[String]) -> Result<Vec<String>, RunError> {
        let mut rest = args;
        while let Some((arg, tail)) = rest.split_first() {
            let enable = match arg.chars().next() {
                Some('-') => true,
                Some('+') => false,
                _ => break,
            };
            rest = tail;
            if arg == "--" {
                break;
            }
            for opt in arg.chars().skip(1) {
                match opt {
                    'e' => self.stop_on_cmd_err = enable,
                    _ => return Err(RunError::Config(format!("invalid option: {arg:?}"))),
                }
            }
        }
        Ok(rest.to_vec())
    }

    /// Interpret a program.
    ///
    /// Waits for every background statement before returning; a fatal
    /// error one of them hit is reported once all have finished. A nonzero
    /// final exit status is reported as `Err(RunError::Exit(code))`.
    ///
    /// # Errors
    ///
    /// The fatal error that stopped the run, `RunError::Exit` for a nonzero
    /// exit status, or `RunError::AlreadyRun` on a second call.
    pub fn run(&mut self, node: Node<'_>) -> Result<(), RunError> {
        if self.used {
            return Err(RunError::AlreadyRun);
        }
        self.used = true;

        let result = match node {
            Node::File(file) => {
                self.filename.clone_from(&file.name);
                self.stmts(&file.stmts)
            }
            Node::Stmt(stmt) => self.stmt(stmt),
            Node::Command(cmd) => {
                let res = self.cmd(cmd);
                self.take_pending(res)
            }
        };
        let waited = self.wait_background();

        let result = match (result, waited) {
            (Err(err), _) if !err.is_sentinel() => Err(err),
            (_, Err(err)) => Err(err),
            (result, Ok(())) => result,
        };
        match result {
            Ok(_) => {}
            Err(RunError::Exit(code) | RunError::Return(code)) => self.exit = code,
            Err(err) => return Err(err),
        }
        match self.exit {
            0 => Ok(()),
            code => Err(RunError::Exit(code)),
        }
    }

    /// Exit status of the last command
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.exit
    }

    /// Scalar view of a variable, if it is set
    #[must_use]
    pub fn var(&self, name: &str) -> Option<String> {
        self.lookup_var(name).map(|val| self.var_str(&val, 0))
    }

    /// Full value of a variable, if it is set
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        self.lookup_var(name)
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy of this runner for a subshell, pipeline side, background
    /// statement or command substitution. Nothing the copy assigns is
    /// visible here afterwards.
    pub(crate) fn fork(&self) -> Self {
        debug!(dir = %self.dir.display(), "forking runner");
        Self {
            env: self.env.clone(),
            env_map: self.env_map.clone(),
            exported: self.exported.clone(),
            dir: self.dir.clone(),
            dir_stack: self.dir_stack.clone(),
            params: self.params.clone(),
            exec: Arc::clone(&self.exec),
            open: Arc::clone(&self.open),
            filename: self.filename.clone(),
            vars: self.vars.clone(),
            funcs: self.funcs.clone(),
            cmd_vars: self.cmd_vars.clone(),
            in_loop: self.in_loop,
            can_return: self.can_return,
            stop_on_cmd_err: self.stop_on_cmd_err,
            no_err_exit: self.no_err_exit,
            exit: self.exit,
            pending: None,
            stdin: self.stdin.clone(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            background: Vec::new(),
            cancel: self.cancel.clone(),
            used: true,
        }
    }

    /// Take back what a finished fork leaves behind: its exit status and
    /// any background statements it started. An `exit` or `return` inside
    /// the fork only ends the fork.
    pub(crate) fn join_fork(&mut self, mut sub: Self, result: Eval) -> Result<(), RunError> {
        self.background.append(&mut sub.background);
        self.exit = sub.exit;
        match result {
            Ok(_) => Ok(()),
            Err(RunError::Exit(code) | RunError::Return(code)) => {
                self.exit = code;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Join every background statement of this scope. The first fatal
    /// error any of them hit is returned once all have finished.
    pub(crate) fn wait_background(&mut self) -> Result<(), RunError> {
        let mut first = Ok(());
        for handle in self.background.drain(..) {
            let result = handle.join().unwrap_or_else(|_| {
                warn!("background statement panicked");
                Ok(())
            });
            if first.is_ok() {
                first = result;
            }
        }
        first
    }

    pub(crate) fn hook_context(&self) -> HookContext {
        let mut env: Vec<String> = self
            .env
            .iter()
            .filter(|kv| {
                kv.split_once('=')
                    .is_some_and(|(key, _)| self.env_map.contains_key(key))
            })
            .cloned()
            .collect();
        let mut names: Vec<&String> = self
            .vars
            .keys()
            .filter(|name| self.exported.contains(*name) || self.env_map.contains_key(*name))
            .collect();
        names.sort();
        for name in names {
            if let Some(val) = self.vars.get(name) {
                env.push(format!("{name}={}", self.var_str(val, 0)));
            }
        }
        for (name, val) in &self.cmd_vars {
            env.push(format!("{name}={}", self.var_str(val, 0)));
        }
        HookContext {
            env,
            dir: self.dir.clone(),
            stdin: self.stdin.clone(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub(crate) fn outf(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.stdout.write_fmt(args);
    }

    pub(crate) fn errf(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.stderr.write_fmt(args);
    }

    pub(crate) fn runtime_err(&self, pos: Position, text: impl Into<String>) -> RunError {
        RunError::Runtime {
            filename: self.filename.clone(),
            pos,
            text: text.into(),
        }
    }

    pub(crate) fn unhandled(&self, pos: Position, text: impl Into<String>) -> RunError {
        RunError::Unhandled {
            filename: self.filename.clone(),
            pos,
            text: text.into(),
        }
    }

    /// Park a fatal error until the current statement finishes; the first
    /// one parked wins.
    pub(crate) fn set_err(&mut self, err: RunError) {
        if self.pending.is_none() {
            self.pending = Some(err);
        }
    }

    fn take_pending(&mut self, result: Eval) -> Eval {
        match self.pending.take() {
            Some(err) => Err(err),
            None => result,
        }
    }

    /// Whether evaluation must stop: a parked fatal error or cancellation
    fn stop(&mut self) -> Result<(), RunError> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(RunError::Cancelled(self.cancel.reason()));
        }
        Ok(())
    }

    pub(crate) fn stmts(&mut self, stmts: &[Stmt]) -> Eval {
        for stmt in stmts {
            let flow = self.stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn stmt(&mut self, st: &Stmt) -> Eval {
        self.stop()?;
        if st.background {
            self.spawn_background(st);
            return Ok(Flow::Normal);
        }
        self.stmt_sync(st)
    }

    fn spawn_background(&mut self, st: &Stmt) {
        let mut sub = self.fork();
        let st = st.clone();
        debug!(pos = %st.pos, "starting background statement");
        let handle = thread::spawn(move || {
            let result = sub.stmt_sync(&st);
            let waited = sub.wait_background();
            match result {
                Err(err) if !err.is_sentinel() => {
                    debug!(error = %err, "background statement failed");
                    Err(err)
                }
                _ => waited,
            }
        });
        self.background.push(handle);
        self.exit = 0;
    }

    fn stmt_sync(&mut self, st: &Stmt) -> Eval {
        let saved = (self.stdin.clone(), self.stdout.clone(), self.stderr.clone());
        let mut opened = Vec::new();
        let result = self.stmt_redirected(st, &mut opened);
        for handle in opened {
            handle.close();
        }
        (self.stdin, self.stdout, self.stderr) = saved;
        self.take_pending(result)
    }

    fn stmt_redirected(&mut self, st: &Stmt, opened: &mut Vec<SharedHandle>) -> Eval {
        for rd in &st.redirs {
            match self.redir(rd)? {
                Redirected::Applied => {}
                Redirected::Opened(handle) => opened.push(handle),
                Redirected::Failed => {
                    self.exit = 1;
                    return Ok(Flow::Normal);
                }
            }
        }
        let flow = match &st.cmd {
            Some(cmd) => self.cmd(cmd)?,
            None => {
                self.exit = 0;
                Flow::Normal
            }
        };
        if st.negated {
            self.exit = u8::from(self.exit == 0);
        }
        if self.exit != 0 && self.stop_on_cmd_err && !self.no_err_exit && !st.negated {
            return Err(RunError::Exit(self.exit));
        }
        Ok(flow)
    }

    pub(crate) fn cmd(&mut self, cm: &Command) -> Eval {
        self.stop()?;
        match cm {
            Command::Block { stmts } => self.stmts(stmts),
            Command::Subshell { stmts } => {
                let mut sub = self.fork();
                let result = sub.stmts(stmts);
                self.join_fork(sub, result)?;
                Ok(Flow::Normal)
            }
            Command::Call(call) => self.call_expr(call),
            Command::Binary(bin) => self.binary(bin),
            Command::If(clause) => self.if_clause(clause),
            Command::While(clause) => self.while_clause(clause),
            Command::For(clause) => self.for_clause(clause),
            Command::FuncDecl { name, body } => {
                self.set_func(name, Arc::new((**body).clone()));
                self.exit = 0;
                Ok(Flow::Normal)
            }
            Command::Arithm { expr } => {
                let val = self.arithm(expr)?;
                self.exit = u8::from(val == 0);
                Ok(Flow::Normal)
            }
            Command::Let { exprs } => {
                let mut val = 0;
                for expr in exprs {
                    val = self.arithm(expr)?;
                }
                self.exit = u8::from(val == 0);
                Ok(Flow::Normal)
            }
            Command::Case(clause) => {
                let subject = self.lone_word(&clause.word)?;
                self.exit = 0;
                for arm in &clause.arms {
                    for word in &arm.patterns {
                        let pattern = self.pattern_word(word)?;
                        if crate::pattern::matches(&pattern, &subject) {
                            return self.stmts(&arm.stmts);
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Command::Test { expr } => {
                self.exit = 0;
                if self.bash_test(expr)?.is_empty() {
                    if self.exit == 0 {
                        self.exit = 1;
                    }
                } else {
                    self.exit = 0;
                }
                Ok(Flow::Normal)
            }
            Command::Decl(decl) => self.decl_clause(decl),
            Command::Time { stmt } => {
                let start = Instant::now();
                let flow = match stmt {
                    Some(stmt) => self.stmt(stmt)?,
                    None => Flow::Normal,
                };
                let real = elapsed_string(start.elapsed());
                self.outf(format_args!(
                    "\nreal\t{real}\nuser\t0m0.000s\nsys\t0m0.000s\n"
                ));
                Ok(flow)
            }
            Command::Coproc { pos, .. } => {
                Err(self.unhandled(*pos, format!("unhandled command node: {}", cm.kind())))
            }
        }
    }

    fn call_expr(&mut self, call: &CallExpr) -> Eval {
        let fields = self.fields(&call.args)?;
        self.stop()?;
        let Some((name, args)) = fields.split_first() else {
            self.exit = 0;
            for assign in &call.assigns {
                let val = self.assign_value(assign, DeclMode::Infer)?;
                if let Some(val) = val {
                    self.set_var(&assign.name, assign.index.as_ref(), val)?;
                }
            }
            return Ok(Flow::Normal);
        };

        let mut overlay = Vec::with_capacity(call.assigns.len());
        for assign in &call.assigns {
            let val = self
                .assign_value(assign, DeclMode::Infer)?
                .unwrap_or_else(|| Value::Scalar(String::new()));
            overlay.push((assign.name.clone(), val));
        }
        let saved = self.cmd_vars.clone();
        self.cmd_vars.extend(overlay);
        let result = self.call(call.pos, name, args);
        self.cmd_vars = saved;
        result
    }

    /// Run a function, builtin or external program
    pub(crate) fn call(&mut self, pos: Position, name: &str, args: &[String]) -> Eval {
        if let Some(body) = self.funcs.get(name).cloned() {
            return self.call_func(name, &body, args);
        }
        if is_builtin(name) {
            return self.builtin(pos, name, args);
        }
        self.exec_program(name, args)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(name = name))]
    fn call_func(&mut self, name: &str, body: &Stmt, args: &[String]) -> Eval {
        let old_params = std::mem::replace(&mut self.params, args.to_vec());
        let old_can_return = std::mem::replace(&mut self.can_return, true);
        let result = self.stmt(body);
        self.params = old_params;
        self.can_return = old_can_return;
        match result {
            Err(RunError::Return(code)) => {
                self.exit = code;
                Ok(Flow::Normal)
            }
            other => other,
        }
    }

    fn exec_program(&mut self, name: &str, args: &[String]) -> Eval {
        let ctx = self.hook_context();
        debug!(name, args = args.len(), "executing external command");
        match self.exec.exec(&ctx, name, args) {
            Ok(()) => self.exit = 0,
            Err(ExecError::Status(code)) => self.exit = code,
            Err(ExecError::Other(err)) => return Err(RunError::Exec(err)),
        }
        Ok(Flow::Normal)
    }

    fn binary(&mut self, bin: &BinaryCmd) -> Eval {
        match bin.op {
            BinCmdOp::And | BinCmdOp::Or => {
                let flow = self.condition(|r| r.stmt(&bin.x))?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
                if (self.exit == 0) == (bin.op == BinCmdOp::And) {
                    return self.stmt(&bin.y);
                }
                Ok(Flow::Normal)
            }
            BinCmdOp::Pipe | BinCmdOp::PipeAll => self.pipeline(bin),
        }
    }

    fn pipeline(&mut self, bin: &BinaryCmd) -> Eval {
        let (reader, writer) = pipe();
        let mut left = self.fork();
        left.stdout = OutStream::from_writer(writer.clone());
        if bin.op == BinCmdOp::PipeAll {
            left.stderr = left.stdout.clone();
        }
        let old_stdin = std::mem::replace(&mut self.stdin, InStream::from_reader(reader.clone()));
        debug!(op = ?bin.op, "starting pipeline");

        let (left, left_result, right_result) = thread::scope(|s| {
            let producer = s.spawn(move || {
                let result = left.stmt(&bin.x);
                writer.close();
                (left, result)
            });
            let right_result = self.stmt(&bin.y);
            reader.close();
            let (left, left_result) = match producer.join() {
                Ok(joined) => joined,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (left, left_result, right_result)
        });
        self.stdin = old_stdin;

        let mut left = left;
        self.background.append(&mut left.background);
        let flow = right_result?;
        match left_result {
            Err(err) if !err.is_sentinel() => Err(err),
            _ => Ok(flow),
        }
    }

    /// Evaluate a condition, with stop-on-error suspended
    fn condition(&mut self, eval: impl FnOnce(&mut Self) -> Eval) -> Eval {
        let old = std::mem::replace(&mut self.no_err_exit, true);
        let result = eval(self);
        self.no_err_exit = old;
        result
    }

    fn if_clause(&mut self, clause: &IfClause) -> Eval {
        let flow = self.condition(|r| r.stmts(&clause.cond))?;
        if flow != Flow::Normal {
            return Ok(flow);
        }
        if self.exit == 0 {
            return self.stmts(&clause.then_stmts);
        }
        self.exit = 0;
        self.stmts(&clause.else_stmts)
    }

    fn while_clause(&mut self, clause: &WhileClause) -> Eval {
        loop {
            let flow = self.condition(|r| r.stmts(&clause.cond))?;
            if let Some(flow) = leave_loop(flow) {
                return Ok(flow);
            }
            let stop = (self.exit == 0) == clause.until;
            self.exit = 0;
            if stop {
                return Ok(Flow::Normal);
            }
            if let Some(flow) = self.loop_body(&clause.body)? {
                return Ok(flow);
            }
        }
    }

    fn for_clause(&mut self, clause: &ForClause) -> Eval {
        match &clause.loop_kind {
            Loop::WordIter { name, items } => {
                let items = match items {
                    Some(words) => self.fields(words)?,
                    None => self.params.clone(),
                };
                for item in items {
                    self.set_var(name, None, Value::Scalar(item))?;
                    if let Some(flow) = self.loop_body(&clause.body)? {
                        return Ok(flow);
                    }
                }
            }
            Loop::CStyle { init, cond, post } => {
                if let Some(init) = init {
                    self.arithm(init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if self.arithm(cond)? == 0 {
                            break;
                        }
                    }
                    if let Some(flow) = self.loop_body(&clause.body)? {
                        return Ok(flow);
                    }
                    if let Some(post) = post {
                        self.arithm(post)?;
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    /// Run one iteration of a loop body. `Some(flow)` means this loop is
    /// done and `flow` continues outward.
    fn loop_body(&mut self, stmts: &[Stmt]) -> Result<Option<Flow>, RunError> {
        let old = std::mem::replace(&mut self.in_loop, true);
        let result = self.stmts(stmts);
        self.in_loop = old;
        Ok(leave_loop(result?))
    }

    fn decl_clause(&mut self, decl: &DeclClause) -> Eval {
        let mut mode = DeclMode::Infer;
        for opt in &decl.opts {
            match self.lone_word(opt)?.as_str() {
                "-n" => mode = DeclMode::NameRef,
                "-A" => mode = DeclMode::Assoc,
                other => {
                    return Err(
                        self.runtime_err(decl.pos, format!("unhandled declare opts: {other}"))
                    );
                }
            }
        }
        for assign in &decl.assigns {
            let val = match (mode, self.assign_value(assign, mode)?) {
                (DeclMode::NameRef, Some(Value::Scalar(target))) => Some(Value::NameRef(target)),
                (_, val) => val,
            };
            if let Some(val) = val {
                self.set_var(&assign.name, assign.index.as_ref(), val)?;
            } else if mode == DeclMode::Assoc && !self.vars.contains_key(&assign.name) {
                self.vars
                    .insert(assign.name.clone(), Value::Assoc(AssocArray::new()));
            }
            if decl.variant == "export" {
                self.exported.insert(assign.name.clone());
            }
        }
        self.exit = 0;
        Ok(Flow::Normal)
    }
}

/// Apply the break/continue countdown at a loop boundary
fn leave_loop(flow: Flow) -> Option<Flow> {
    match flow {
        Flow::Normal | Flow::Continue(0 | 1) => None,
        Flow::Continue(n) => Some(Flow::Continue(n - 1)),
        Flow::Break(0 | 1) => Some(Flow::Normal),
        Flow::Break(n) => Some(Flow::Break(n - 1)),
    }
}

fn elapsed_string(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let mins = (secs / 60.0).floor();
    format!("{mins}m{:.3}s", secs % 60.0)
}
