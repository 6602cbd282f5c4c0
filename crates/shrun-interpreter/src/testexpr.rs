//! Evaluation of `[[ ... ]]` expressions
//!
//! Every expression evaluates to a string: empty means false. A malformed
//! regular expression leaves exit status 2 behind for the `[[ ]]` command.

use crate::error::RunError;
use crate::pattern;
use crate::runner::Runner;
use crate::value::Value;
use regex::Regex;
use shrun_ast::{BinTestOp, TestExpr, UnTestOp};
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::SystemTime;

fn truth(b: bool) -> String {
    if b { "1".to_string() } else { String::new() }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(unix)]
fn has_mode(meta: &Metadata, bits: u32) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & bits != 0
}

#[cfg(not(unix))]
fn has_mode(meta: &Metadata, bits: u32) -> bool {
    // Only the write bit has a portable meaning
    bits & 0o222 == 0 || !meta.permissions().readonly()
}

#[cfg(unix)]
fn special_kind(meta: &Metadata, op: UnTestOp) -> bool {
    use std::os::unix::fs::FileTypeExt;
    let ft = meta.file_type();
    match op {
        UnTestOp::NamedPipe => ft.is_fifo(),
        UnTestOp::Socket => ft.is_socket(),
        UnTestOp::BlockDevice => ft.is_block_device(),
        UnTestOp::CharDevice => ft.is_char_device(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn special_kind(_meta: &Metadata, _op: UnTestOp) -> bool {
    false
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl Runner {
    pub(crate) fn bash_test(&mut self, expr: &TestExpr) -> Result<String, RunError> {
        match expr {
            TestExpr::Word(word) => self.lone_word(word),
            TestExpr::Paren { x } => self.bash_test(x),
            TestExpr::Unary { op, x } => {
                let operand = self.test_operand(x)?;
                Ok(truth(self.unary_test(*op, &operand)))
            }
            TestExpr::Binary { op, x, y } => self.binary_test(*op, x, y),
        }
    }

    fn test_operand(&mut self, x: &TestExpr) -> Result<String, RunError> {
        match x {
            TestExpr::Word(word) => self.lone_word(word),
            other => self.bash_test(other),
        }
    }

    fn unary_test(&self, op: UnTestOp, x: &str) -> bool {
        match op {
            UnTestOp::EmptyStr => return x.is_empty(),
            UnTestOp::NonEmptyStr => return !x.is_empty(),
            UnTestOp::Not => return x.is_empty(),
            UnTestOp::OptionSet => return x == "errexit" && self.stop_on_cmd_err,
            _ => {}
        }
        let path = self.rel_path(x);
        if op == UnTestOp::Symlink {
            return fs::symlink_metadata(&path).is_ok_and(|m| m.file_type().is_symlink());
        }
        let Ok(meta) = fs::metadata(&path) else {
            return false;
        };
        match op {
            UnTestOp::Exists => true,
            UnTestOp::RegFile => meta.is_file(),
            UnTestOp::Directory => meta.is_dir(),
            UnTestOp::NonEmptyFile => meta.len() > 0,
            UnTestOp::Readable => has_mode(&meta, 0o444),
            UnTestOp::Writable => has_mode(&meta, 0o222),
            UnTestOp::Executable => has_mode(&meta, 0o111),
            _ => special_kind(&meta, op),
        }
    }

    fn binary_test(&mut self, op: BinTestOp, x: &TestExpr, y: &TestExpr) -> Result<String, RunError> {
        match op {
            BinTestOp::AndTest => {
                let ok = !self.bash_test(x)?.is_empty() && !self.bash_test(y)?.is_empty();
                return Ok(truth(ok));
            }
            BinTestOp::OrTest => {
                let ok = !self.bash_test(x)?.is_empty() || !self.bash_test(y)?.is_empty();
                return Ok(truth(ok));
            }
            _ => {}
        }
        let left = self.test_operand(x)?;
        let ok = match op {
            BinTestOp::MatchPattern | BinTestOp::NoMatchPattern => {
                let pat = match y {
                    TestExpr::Word(word) => self.pattern_word(word)?,
                    other => self.bash_test(other)?,
                };
                pattern::matches(&pat, &left) == (op == BinTestOp::MatchPattern)
            }
            BinTestOp::ReMatch => {
                let expr = self.test_operand(y)?;
                return self.regex_match(&left, &expr);
            }
            _ => {
                let right = self.test_operand(y)?;
                self.compare(op, &left, &right)
            }
        };
        Ok(truth(ok))
    }

    fn regex_match(&mut self, s: &str, expr: &str) -> Result<String, RunError> {
        let re = match Regex::new(expr) {
            Ok(re) => re,
            Err(_) => {
                self.exit = 2;
                return Ok(String::new());
            }
        };
        let Some(caps) = re.captures(s) else {
            return Ok(String::new());
        };
        let groups = caps
            .iter()
            .map(|m| m.map_or(String::new(), |m| m.as_str().to_string()));
        self.set_var("BASH_REMATCH", None, Value::indexed(groups))?;
        Ok(truth(true))
    }

    fn compare(&self, op: BinTestOp, x: &str, y: &str) -> bool {
        match op {
            BinTestOp::TsBefore => x < y,
            BinTestOp::TsAfter => x > y,
            BinTestOp::NumEq => self.arith_str(x, 0) == self.arith_str(y, 0),
            BinTestOp::NumNeq => self.arith_str(x, 0) != self.arith_str(y, 0),
            BinTestOp::NumLss => self.arith_str(x, 0) < self.arith_str(y, 0),
            BinTestOp::NumLeq => self.arith_str(x, 0) <= self.arith_str(y, 0),
            BinTestOp::NumGtr => self.arith_str(x, 0) > self.arith_str(y, 0),
            BinTestOp::NumGeq => self.arith_str(x, 0) >= self.arith_str(y, 0),
            BinTestOp::NewerThan | BinTestOp::OlderThan => {
                let (newer, older) = if op == BinTestOp::NewerThan { (x, y) } else { (y, x) };
                match (modified(&self.rel_path(newer)), modified(&self.rel_path(older))) {
                    (Some(a), Some(b)) => a > b,
                    (Some(_), None) => true,
                    _ => false,
                }
            }
            BinTestOp::SameFile => same_file(&self.rel_path(x), &self.rel_path(y)),
            _ => false,
        }
    }
}
