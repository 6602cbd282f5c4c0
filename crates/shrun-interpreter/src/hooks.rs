//! Dispatch boundary: how the interpreter runs external programs and opens files.
//!
//! The runner never touches processes or the filesystem for these two
//! operations itself; it calls an [`ExecHook`] or an [`OpenHook`]. Closures
//! with the right signature implement both traits, which is how tests
//! substitute fakes.

use crate::cancel::CancelToken;
use crate::error::{ExecError, OpenError};
use crate::stream::{Handle, InStream, OutStream};
use anyhow::Context as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

/// The state a hook sees for one call
#[derive(Debug, Clone)]
pub struct HookContext {
    /// `KEY=VALUE` entries, later entries overriding earlier ones
    pub env: Vec<String>,
    pub dir: PathBuf,
    pub stdin: InStream,
    pub stdout: OutStream,
    pub stderr: OutStream,
    pub cancel: CancelToken,
}

impl HookContext {
    /// Value of an environment entry, honouring override order
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.iter().rev().find_map(|kv| {
            kv.split_once('=')
                .filter(|(key, _)| *key == name)
                .map(|(_, val)| val)
        })
    }
}

/// Runs a program that is neither a function nor a builtin
pub trait ExecHook: Send + Sync {
    /// # Errors
    ///
    /// `ExecError::Status` when the program exits nonzero, `ExecError::Other`
    /// when it cannot be run at all.
    fn exec(&self, ctx: &HookContext, name: &str, args: &[String]) -> Result<(), ExecError>;
}

impl<F> ExecHook for F
where
    F: Fn(&HookContext, &str, &[String]) -> Result<(), ExecError> + Send + Sync,
{
    fn exec(&self, ctx: &HookContext, name: &str, args: &[String]) -> Result<(), ExecError> {
        self(ctx, name, args)
    }
}

/// How a redirect wants its target opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenFlags {
    /// `<`
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            create: false,
            truncate: false,
            append: false,
        }
    }

    /// `>`, `>|`, `&>`
    #[must_use]
    pub const fn truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            append: false,
        }
    }

    /// `>>`, `&>>`
    #[must_use]
    pub const fn append() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: false,
            append: true,
        }
    }
}

/// Opens redirect targets
pub trait OpenHook: Send + Sync {
    /// # Errors
    ///
    /// `OpenError::Path` when the path itself is the problem (missing,
    /// permission denied); `OpenError::Other` for anything else.
    fn open(
        &self,
        ctx: &HookContext,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<Box<dyn Handle>, OpenError>;
}

impl<F> OpenHook for F
where
    F: Fn(&HookContext, &Path, OpenFlags, u32) -> Result<Box<dyn Handle>, OpenError> + Send + Sync,
{
    fn open(
        &self,
        ctx: &HookContext,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<Box<dyn Handle>, OpenError> {
        self(ctx, path, flags, mode)
    }
}

/// Resolve a program name the way a shell does: names containing a slash
/// are taken relative to `dir`, anything else is searched for in `path_var`.
#[must_use]
pub fn lookup_path(dir: &Path, path_var: Option<&str>, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        let candidate = dir.join(name);
        return is_executable(&candidate).then_some(candidate);
    }
    path_var?
        .split(':')
        .map(|entry| {
            let entry = if entry.is_empty() { "." } else { entry };
            dir.join(entry).join(name)
        })
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs programs as child processes of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExec;

impl ExecHook for DefaultExec {
    fn exec(&self, ctx: &HookContext, name: &str, args: &[String]) -> Result<(), ExecError> {
        let Some(path) = lookup_path(&ctx.dir, ctx.env_var("PATH"), name) else {
            let _ = writeln!(ctx.stderr.clone(), "{name}: command not found");
            return Err(ExecError::Status(127));
        };
        debug!(program = %path.display(), "spawning child process");

        let mut cmd = Command::new(&path);
        cmd.args(args).current_dir(&ctx.dir).env_clear();
        for kv in &ctx.env {
            if let Some((key, val)) = kv.split_once('=') {
                cmd.env(key, val);
            }
        }
        let stdin_direct = ctx.stdin.as_stdio();
        let stdout_direct = ctx.stdout.as_stdio();
        let stderr_direct = ctx.stderr.as_stdio();
        let piped_stdin = stdin_direct.is_none();
        cmd.stdin(stdin_direct.unwrap_or_else(Stdio::piped));
        cmd.stdout(stdout_direct.unwrap_or_else(Stdio::piped));
        cmd.stderr(stderr_direct.unwrap_or_else(Stdio::piped));

        let mut child = cmd
            .spawn()
            .with_context(|| format!("could not start {}", path.display()))?;

        if piped_stdin {
            if let Some(mut input) = child.stdin.take() {
                // Detached: the source may never reach EOF.
                let mut source = ctx.stdin.clone();
                thread::spawn(move || {
                    let _ = io::copy(&mut source, &mut input);
                });
            }
        }

        let status = thread::scope(|s| {
            let copiers: Vec<_> = [
                child.stdout.take().map(|mut out| {
                    let mut sink = ctx.stdout.clone();
                    s.spawn(move || io::copy(&mut out, &mut sink).map(drop))
                }),
                child.stderr.take().map(|mut err| {
                    let mut sink = ctx.stderr.clone();
                    s.spawn(move || io::copy(&mut err, &mut sink).map(drop))
                }),
            ]
            .into_iter()
            .flatten()
            .collect();
            let status = child.wait();
            for copier in copiers {
                let _ = copier.join();
            }
            status
        })
        .with_context(|| format!("waiting for {}", path.display()))?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(ExecError::Status((code & 0xff) as u8)),
            None => Err(ExecError::Status(1)),
        }
    }
}

/// Opens files on the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOpen;

impl OpenHook for DefaultOpen {
    fn open(
        &self,
        _ctx: &HookContext,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<Box<dyn Handle>, OpenError> {
        let mut opts = OpenOptions::new();
        opts.read(flags.read)
            .write(flags.write && !flags.append)
            .append(flags.append)
            .create(flags.create)
            .truncate(flags.truncate);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        debug!(path = %path.display(), ?flags, "opening file");
        let file = opts.open(path).map_err(|source| OpenError::Path {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(file))
    }
}
