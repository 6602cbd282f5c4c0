//! Word expansion: words to fields, with quoting, substitutions, field
//! splitting and filename globbing.

use crate::error::RunError;
use crate::runner::Runner;
use crate::stream::OutStream;
use glob::{MatchOptions, Pattern};
use shrun_ast::{Stmt, Word, WordPart};
use std::path::Path;
use tracing::{debug, trace};

/// A piece of a field, remembering whether it came from quoted text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldPart {
    pub(crate) val: String,
    pub(crate) quoted: bool,
}

/// Field separators; the set is fixed
fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

struct FieldBuilder {
    fields: Vec<Vec<FieldPart>>,
    cur: Vec<FieldPart>,
    split: bool,
    allow_empty: bool,
}

impl FieldBuilder {
    const fn new(split: bool) -> Self {
        Self {
            fields: Vec::new(),
            cur: Vec::new(),
            split,
            allow_empty: false,
        }
    }

    fn push(&mut self, val: String, quoted: bool) {
        self.cur.push(FieldPart { val, quoted });
    }

    fn flush(&mut self) {
        if !self.cur.is_empty() {
            self.fields.push(std::mem::take(&mut self.cur));
        }
    }

    /// Add the result of an unquoted expansion, starting a new field at
    /// every run of separators
    fn split_add(&mut self, val: String) {
        if !self.split {
            self.push(val, false);
            return;
        }
        if val.starts_with(is_separator) {
            self.flush();
        }
        for (i, piece) in val.split(is_separator).filter(|p| !p.is_empty()).enumerate() {
            if i > 0 {
                self.flush();
            }
            self.push(piece.to_string(), false);
        }
        if val.ends_with(is_separator) {
            self.flush();
        }
    }

    fn finish(mut self) -> Vec<Vec<FieldPart>> {
        self.flush();
        if self.allow_empty && self.fields.is_empty() {
            self.fields.push(vec![FieldPart {
                val: String::new(),
                quoted: true,
            }]);
        }
        self.fields
    }
}

/// Concatenate the parts of a field
pub(crate) fn field_join(parts: &[FieldPart]) -> String {
    parts.iter().map(|part| part.val.as_str()).collect()
}

/// Turn a field into a glob pattern, escaping quoted metacharacters.
/// The flag reports whether any unquoted metacharacter is present.
pub(crate) fn escaped_glob(parts: &[FieldPart]) -> (String, bool) {
    let mut pattern = String::new();
    let mut glob = false;
    for part in parts {
        if part.quoted {
            pattern.push_str(&Pattern::escape(&part.val));
        } else {
            glob |= part.val.contains(['*', '?', '[']);
            pattern.push_str(&part.val);
        }
    }
    (pattern, glob)
}

/// Parse an integer the way `printf` arguments are read: optional sign,
/// `0x` for hex, a leading `0` for octal. Anything unparsable is 0.
pub(crate) fn parse_int(s: &str) -> i64 {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    let n = parsed.unwrap_or(0);
    if negative { n.wrapping_neg() } else { n }
}

/// Decode backslash escapes and, unless `only_chars` is set, `printf`
/// conversions consuming `args`.
///
/// # Errors
///
/// The conversion character when it is not supported.
pub fn expand_escapes(format: &str, only_chars: bool, args: &[String]) -> Result<String, char> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '%' if !only_chars => {
                let Some(verb) = chars.next() else {
                    break;
                };
                if verb == '%' {
                    out.push('%');
                    continue;
                }
                let arg = args.next().map_or("", String::as_str);
                let n = parse_int(arg);
                match verb {
                    's' => out.push_str(arg),
                    'c' => out.extend(arg.chars().next()),
                    'd' | 'i' => out.push_str(&n.to_string()),
                    'u' => out.push_str(&(n as u64).to_string()),
                    'o' => out.push_str(&format!("{:o}", n as u64)),
                    'x' => out.push_str(&format!("{:x}", n as u64)),
                    'X' => out.push_str(&format!("{:X}", n as u64)),
                    other => return Err(other),
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

impl Runner {
    /// Expand command arguments into fields, globbing against the working
    /// directory. A pattern with no matches stays as its own text.
    pub(crate) fn fields(&mut self, words: &[Word]) -> Result<Vec<String>, RunError> {
        let mut fields = Vec::with_capacity(words.len());
        for word in words {
            for field in self.word_fields(&word.parts, false)? {
                let (pattern, glob) = escaped_glob(&field);
                if glob {
                    let matches = self.glob(&pattern);
                    if !matches.is_empty() {
                        fields.extend(matches);
                        continue;
                    }
                }
                fields.push(field_join(&field));
            }
        }
        Ok(fields)
    }

    /// Expand a word that must stay a single string, as in assignments,
    /// redirect targets and `case` subjects. No splitting or globbing.
    pub(crate) fn lone_word(&mut self, word: &Word) -> Result<String, RunError> {
        let fields = self.expand_parts(&word.parts, false, false)?;
        Ok(fields
            .iter()
            .map(|field| field_join(field))
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Expand a word into a pattern: unquoted metacharacters stay active,
    /// quoted ones match literally.
    pub(crate) fn pattern_word(&mut self, word: &Word) -> Result<String, RunError> {
        let fields = self.expand_parts(&word.parts, false, false)?;
        Ok(fields
            .iter()
            .map(|field| escaped_glob(field).0)
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub(crate) fn word_fields(
        &mut self,
        parts: &[WordPart],
        quoted: bool,
    ) -> Result<Vec<Vec<FieldPart>>, RunError> {
        self.expand_parts(parts, quoted, true)
    }

    fn expand_parts(
        &mut self,
        parts: &[WordPart],
        quoted: bool,
        split: bool,
    ) -> Result<Vec<Vec<FieldPart>>, RunError> {
        let mut fb = FieldBuilder::new(split);
        for (i, part) in parts.iter().enumerate() {
            match part {
                WordPart::Lit { value } => {
                    let val = if i == 0 && !quoted && (value == "~" || value.starts_with("~/")) {
                        format!("{}{}", self.get_var("HOME"), &value[1..])
                    } else {
                        value.clone()
                    };
                    fb.push(val, false);
                }
                WordPart::SglQuoted { value, dollar } => {
                    fb.allow_empty = true;
                    let val = if *dollar {
                        expand_escapes(value, true, &[]).unwrap_or_else(|_| value.clone())
                    } else {
                        value.clone()
                    };
                    fb.push(val, true);
                }
                WordPart::DblQuoted { parts: inner } => {
                    fb.allow_empty = true;
                    if let [WordPart::ParamExp(pe)] = inner.as_slice() {
                        if let Some(elems) = self.quoted_elems(pe) {
                            for (j, elem) in elems.into_iter().enumerate() {
                                if j > 0 {
                                    fb.flush();
                                }
                                fb.push(elem, true);
                            }
                            continue;
                        }
                    }
                    fb.allow_empty = true;
                    for field in self.expand_parts(inner, true, split)? {
                        for part in field {
                            fb.push(part.val, true);
                        }
                    }
                }
                WordPart::ParamExp(pe) => {
                    let val = self.param_exp(pe)?;
                    if quoted {
                        fb.push(val, false);
                    } else {
                        fb.split_add(val);
                    }
                }
                WordPart::CmdSubst { stmts } => {
                    let val = self.cmd_subst(stmts);
                    if quoted {
                        fb.push(val, false);
                    } else {
                        fb.split_add(val);
                    }
                }
                WordPart::ArithmExp { expr } => {
                    let val = self.arithm(expr)?;
                    fb.push(val.to_string(), false);
                }
                WordPart::ProcSubst { pos, .. } | WordPart::ExtGlob { pos, .. } => {
                    return Err(
                        self.unhandled(*pos, format!("unhandled word part: {}", part.kind()))
                    );
                }
            }
        }
        Ok(fb.finish())
    }

    /// Run `stmts` in a fork and capture what they print. A fatal error in
    /// the fork is parked until the current statement finishes.
    fn cmd_subst(&mut self, stmts: &[Stmt]) -> String {
        let mut sub = self.fork();
        let out = OutStream::buffer();
        sub.stdout = out.clone();
        debug!(stmts = stmts.len(), "running command substitution");
        let result = sub.stmts(stmts);
        self.background.append(&mut sub.background);
        if let Err(err) = result {
            if !err.is_sentinel() {
                self.set_err(err);
            }
        }
        let mut text = out.contents();
        let trimmed = text.trim_end_matches('\n').len();
        text.truncate(trimmed);
        text
    }

    fn glob(&self, pattern: &str) -> Vec<String> {
        let abs = Path::new(pattern).is_absolute();
        let full = if abs {
            pattern.to_string()
        } else {
            let base = Pattern::escape(&self.dir.to_string_lossy());
            format!("{}/{pattern}", base.trim_end_matches('/'))
        };
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let Ok(paths) = glob::glob_with(&full, options) else {
            return Vec::new();
        };
        let matches: Vec<String> = paths
            .filter_map(Result::ok)
            .map(|path| {
                let shown = if abs {
                    path.as_path()
                } else {
                    path.strip_prefix(&self.dir).unwrap_or(path.as_path())
                };
                shown.to_string_lossy().into_owned()
            })
            .collect();
        trace!(pattern, matches = matches.len(), "expanded glob");
        matches
    }
}
