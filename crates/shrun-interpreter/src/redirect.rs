//! Redirections: rebinding a statement's streams before it runs

use crate::error::{OpenError, RunError};
use crate::hooks::OpenFlags;
use crate::runner::Runner;
use crate::stream::{InStream, OutStream, SharedHandle};
use shrun_ast::{RedirOp, Redirect};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What applying one redirection did
#[derive(Debug)]
pub(crate) enum Redirected {
    /// Streams were rebound, nothing to release afterwards
    Applied,
    /// A file was opened; the statement closes it when it finishes
    Opened(SharedHandle),
    /// The target could not be opened; the error is already reported
    Failed,
}

/// Which output stream a redirection rebinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Stdout,
    Stderr,
}

impl Runner {
    /// Resolve `path` against the working directory
    pub(crate) fn rel_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    fn bind(&mut self, target: Target, stream: OutStream) {
        match target {
            Target::Stdout => self.stdout = stream,
            Target::Stderr => self.stderr = stream,
        }
    }

    pub(crate) fn redir(&mut self, rd: &Redirect) -> Result<Redirected, RunError> {
        if let Some(hdoc) = &rd.hdoc {
            let body = self.lone_word(hdoc)?;
            self.stdin = InStream::from_string(body);
            return Ok(Redirected::Applied);
        }
        let target = match rd.n.as_deref() {
            Some("2") => Target::Stderr,
            _ => Target::Stdout,
        };
        let arg = self.lone_word(&rd.word)?;
        let flags = match rd.op {
            RedirOp::WordHdoc => {
                self.stdin = InStream::from_string(arg + "\n");
                return Ok(Redirected::Applied);
            }
            RedirOp::Hdoc | RedirOp::DashHdoc => {
                self.stdin = InStream::null();
                return Ok(Redirected::Applied);
            }
            RedirOp::DplOut => match arg.as_str() {
                "1" => {
                    let stream = self.stdout.clone();
                    self.bind(target, stream);
                    return Ok(Redirected::Applied);
                }
                "2" => {
                    let stream = self.stderr.clone();
                    self.bind(target, stream);
                    return Ok(Redirected::Applied);
                }
                "-" => return Ok(Redirected::Applied),
                fd if !fd.is_empty() && fd.bytes().all(|b| b.is_ascii_digit()) => {
                    return Err(self.unhandled(rd.pos, format!("unhandled redirect fd: {fd}")));
                }
                _ => OpenFlags::truncate(),
            },
            RedirOp::RdrIn => OpenFlags::read_only(),
            RedirOp::RdrOut | RedirOp::ClbOut | RedirOp::RdrAll => OpenFlags::truncate(),
            RedirOp::AppOut | RedirOp::AppAll => OpenFlags::append(),
            RedirOp::RdrInOut | RedirOp::DplIn => {
                return Err(self.unhandled(rd.pos, format!("unhandled redirect op: {}", rd.op)));
            }
        };

        let path = self.rel_path(&arg);
        let Some(handle) = self.open(&path, flags, 0o644, true)? else {
            return Ok(Redirected::Failed);
        };
        match rd.op {
            RedirOp::RdrIn => self.stdin = InStream::from_handle(&handle),
            RedirOp::RdrOut | RedirOp::ClbOut | RedirOp::AppOut => {
                self.bind(target, OutStream::from_handle(&handle));
            }
            RedirOp::DplOut if rd.n.is_some() => {
                self.bind(target, OutStream::from_handle(&handle));
            }
            _ => {
                self.stdout = OutStream::from_handle(&handle);
                self.stderr = self.stdout.clone();
            }
        }
        Ok(Redirected::Opened(handle))
    }

    /// Open a file through the open hook. A failure tied to the path is
    /// reported on stderr when `print` is set and gives `None`; any other
    /// failure is fatal.
    pub(crate) fn open(
        &mut self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        print: bool,
    ) -> Result<Option<SharedHandle>, RunError> {
        let ctx = self.hook_context();
        debug!(path = %path.display(), ?flags, "redirecting");
        match self.open.open(&ctx, path, flags, mode) {
            Ok(handle) => Ok(Some(SharedHandle::new(handle))),
            Err(err @ OpenError::Path { .. }) => {
                if print {
                    self.errf(format_args!("{err}\n"));
                }
                Ok(None)
            }
            Err(err) => Err(RunError::Open(err)),
        }
    }
}
