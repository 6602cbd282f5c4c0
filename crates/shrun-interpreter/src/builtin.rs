//! Builtin commands

use crate::error::RunError;
use crate::expand::expand_escapes;
use crate::hooks::lookup_path;
use crate::runner::{Eval, Flow, Runner};
use crate::value::Value;
use shrun_ast::Position;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const BUILTINS: &[&str] = &[
    ":", "true", "false", "exit", "set", "shift", "unset", "echo", "printf", "break", "continue",
    "pwd", "cd", "wait", "builtin", "type", "pushd", "popd", "dirs", "return", "read",
];

/// Whether `name` is run by the interpreter itself rather than as a program
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Drop `.` components and fold `..` into the preceding one, without
/// touching the filesystem
fn clean_path(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    clean.push(comp);
                }
            }
            other => clean.push(other),
        }
    }
    clean
}

/// Number of arguments one pass over a `printf` format consumes
fn format_verbs(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '%' => {
                if chars.next().is_some_and(|verb| verb != '%') {
                    count += 1;
                }
            }
            _ => {}
        }
    }
    count
}

/// Positive loop count for `break N` and `continue N`
fn loop_count(args: &[String]) -> Option<u32> {
    match args.first() {
        None => Some(1),
        Some(arg) => arg.parse::<u32>().ok().filter(|n| *n > 0),
    }
}

impl Runner {
    /// Run a builtin. The exit status is left in the runner.
    pub(crate) fn builtin(&mut self, pos: Position, name: &str, args: &[String]) -> Eval {
        let exit = match name {
            ":" | "true" => 0,
            "false" => 1,
            "exit" => {
                let code = match args.first() {
                    None => self.exit,
                    Some(arg) => match arg.parse::<i64>() {
                        Ok(n) => (n & 0xff) as u8,
                        Err(_) => {
                            self.errf(format_args!("exit: {arg}: numeric argument required\n"));
                            2
                        }
                    },
                };
                return Err(RunError::Exit(code));
            }
            "return" => {
                if !self.can_return {
                    self.errf(format_args!("return: can only be done from a func\n"));
                    1
                } else {
                    let code = match args.first() {
                        None => self.exit,
                        Some(arg) => arg.parse::<i64>().map_or(2, |n| (n & 0xff) as u8),
                    };
                    return Err(RunError::Return(code));
                }
            }
            "break" | "continue" => {
                if !self.in_loop {
                    self.errf(format_args!("{name} is only useful in a loop\n"));
                    0
                } else if let Some(n) = loop_count(args) {
                    self.exit = 0;
                    return Ok(if name == "break" {
                        Flow::Break(n)
                    } else {
                        Flow::Continue(n)
                    });
                } else {
                    self.errf(format_args!("{name}: loop count out of range\n"));
                    1
                }
            }
            "set" => match self.from_args(args) {
                Ok(rest) => {
                    if !rest.is_empty() || args.iter().any(|a| a == "--") {
                        self.params = rest;
                    }
                    0
                }
                Err(err) => {
                    self.errf(format_args!("set: {err}\n"));
                    2
                }
            },
            "shift" => {
                let n = match args.first() {
                    None => Some(1),
                    Some(arg) => arg.parse::<usize>().ok(),
                };
                match n {
                    Some(n) if n <= self.params.len() => {
                        self.params.drain(..n);
                        0
                    }
                    _ => 1,
                }
            }
            "unset" => {
                let funcs = args.first().is_some_and(|a| a == "-f");
                for arg in args {
                    match arg.as_str() {
                        "-f" | "-v" => {}
                        name if funcs => {
                            self.funcs.remove(name);
                        }
                        name => self.del_var(name),
                    }
                }
                0
            }
            "echo" => self.echo(args),
            "printf" => {
                let Some((format, rest)) = args.split_first() else {
                    self.errf(format_args!("usage: printf format [arguments]\n"));
                    self.exit = 2;
                    return Ok(Flow::Normal);
                };
                // The format is reused until every argument is consumed
                let verbs = format_verbs(format);
                let mut rest = rest;
                loop {
                    match expand_escapes(format, false, rest) {
                        Ok(s) => self.outf(format_args!("{s}")),
                        Err(c) => {
                            return Err(
                                self.runtime_err(pos, format!("unhandled format char: {c}"))
                            );
                        }
                    }
                    if verbs == 0 || rest.len() <= verbs {
                        break;
                    }
                    rest = &rest[verbs..];
                }
                0
            }
            "pwd" => {
                let dir = self.dir.display().to_string();
                self.outf(format_args!("{dir}\n"));
                0
            }
            "cd" => self.cd(args),
            "wait" => {
                self.wait_background()?;
                0
            }
            "builtin" => {
                let Some((name, rest)) = args.split_first() else {
                    self.exit = 0;
                    return Ok(Flow::Normal);
                };
                if !is_builtin(name) {
                    self.errf(format_args!("builtin: {name}: not a shell builtin\n"));
                    self.exit = 1;
                    return Ok(Flow::Normal);
                }
                return self.builtin(pos, name, rest);
            }
            "type" => self.type_names(args),
            "pushd" => self.pushd(args),
            "popd" => {
                if self.dir_stack.len() <= 1 {
                    self.errf(format_args!("popd: directory stack empty\n"));
                    1
                } else {
                    self.dir_stack.pop();
                    let top = self.dir_stack.last().cloned().unwrap_or_default();
                    if self.change_dir(&top) {
                        self.print_dirs();
                        0
                    } else {
                        1
                    }
                }
            }
            "dirs" => {
                self.print_dirs();
                0
            }
            "read" => self.read(args)?,
            _ => return Err(self.unhandled(pos, format!("unhandled builtin: {name}"))),
        };
        self.exit = exit;
        Ok(Flow::Normal)
    }

    fn echo(&mut self, args: &[String]) -> u8 {
        let mut newline = true;
        let mut escapes = false;
        let mut rest = args;
        while let Some((arg, tail)) = rest.split_first() {
            match arg.as_str() {
                "-n" => newline = false,
                "-e" => escapes = true,
                "-E" => escapes = false,
                _ => break,
            }
            rest = tail;
        }
        let mut line = rest.join(" ");
        if escapes {
            line = expand_escapes(&line, true, &[]).unwrap_or(line);
        }
        if newline {
            line.push('\n');
        }
        self.outf(format_args!("{line}"));
        0
    }

    /// Switch the working directory, keeping `PWD` and the top of the
    /// directory stack in step. Reports the failure when there is one.
    pub(crate) fn change_dir(&mut self, path: &Path) -> bool {
        let dir = clean_path(&self.dir.join(path));
        if !dir.is_dir() {
            self.errf(format_args!("cd: {}: No such file or directory\n", path.display()));
            return false;
        }
        debug!(dir = %dir.display(), "changing directory");
        let old = std::mem::replace(&mut self.dir, dir.clone());
        self.vars.insert(
            "OLDPWD".to_string(),
            Value::Scalar(old.display().to_string()),
        );
        self.vars.insert(
            "PWD".to_string(),
            Value::Scalar(dir.display().to_string()),
        );
        match self.dir_stack.last_mut() {
            Some(top) => *top = dir,
            None => self.dir_stack.push(dir),
        }
        true
    }

    fn cd(&mut self, args: &[String]) -> u8 {
        let target = match args {
            [] => self.get_var("HOME"),
            [dir] if dir == "-" => {
                let old = self.get_var("OLDPWD");
                self.outf(format_args!("{old}\n"));
                old
            }
            [dir] => dir.clone(),
            _ => {
                self.errf(format_args!("usage: cd [dir]\n"));
                return 2;
            }
        };
        u8::from(!self.change_dir(Path::new(&target)))
    }

    fn pushd(&mut self, args: &[String]) -> u8 {
        match args {
            [] => {
                let len = self.dir_stack.len();
                if len < 2 {
                    self.errf(format_args!("pushd: no other directory\n"));
                    return 1;
                }
                self.dir_stack.swap(len - 1, len - 2);
                let top = self.dir_stack[len - 1].clone();
                if !self.change_dir(&top) {
                    return 1;
                }
            }
            [dir] => {
                self.dir_stack.push(self.dir.clone());
                if !self.change_dir(Path::new(dir)) {
                    self.dir_stack.pop();
                    return 1;
                }
            }
            _ => {
                self.errf(format_args!("pushd: too many arguments\n"));
                return 2;
            }
        }
        self.print_dirs();
        0
    }

    fn print_dirs(&mut self) {
        let line = self
            .dir_stack
            .iter()
            .rev()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.outf(format_args!("{line}\n"));
    }

    fn type_names(&mut self, names: &[String]) -> u8 {
        let mut exit = 0;
        let path_var = self.lookup_var("PATH").map(|val| self.var_str(&val, 0));
        for name in names {
            if self.funcs.contains_key(name) {
                self.outf(format_args!("{name} is a function\n"));
            } else if is_builtin(name) {
                self.outf(format_args!("{name} is a shell builtin\n"));
            } else if let Some(path) = lookup_path(&self.dir, path_var.as_deref(), name) {
                self.outf(format_args!("{name} is {}\n", path.display()));
            } else {
                self.errf(format_args!("type: {name}: not found\n"));
                exit = 1;
            }
        }
        exit
    }

    /// `read [-r] [name...]`: one line from stdin, read a byte at a time so
    /// nothing past the newline is consumed
    fn read(&mut self, args: &[String]) -> Result<u8, RunError> {
        let (raw, names) = match args.split_first() {
            Some((flag, rest)) if flag == "-r" => (true, rest),
            _ => (false, args),
        };
        let mut bytes = Vec::new();
        let mut eof = false;
        let mut escaped = false;
        let mut byte = [0u8; 1];
        loop {
            match self.stdin.read(&mut byte) {
                Ok(0) | Err(_) => {
                    eof = true;
                    break;
                }
                Ok(_) => {}
            }
            let b = byte[0];
            if escaped {
                escaped = false;
                if b != b'\n' {
                    bytes.push(b);
                }
                continue;
            }
            match b {
                b'\n' => break,
                b'\\' if !raw => escaped = true,
                _ => bytes.push(b),
            }
        }
        if eof && bytes.is_empty() {
            return Ok(1);
        }
        let line = String::from_utf8_lossy(&bytes).into_owned();
        let default = ["REPLY".to_string()];
        let names = if names.is_empty() { &default[..] } else { names };

        let mut rest = line.trim_matches([' ', '\t']);
        for (i, name) in names.iter().enumerate() {
            let field = if i + 1 == names.len() {
                std::mem::take(&mut rest)
            } else {
                let end = rest.find([' ', '\t']).unwrap_or(rest.len());
                let (field, tail) = rest.split_at(end);
                rest = tail.trim_start_matches([' ', '\t']);
                field
            };
            self.set_var(name, None, Value::scalar(field))?;
        }
        Ok(u8::from(eof))
    }
}
