//! Parameter expansion: `$x`, `${x...}` and the special parameters

use crate::error::RunError;
use crate::pattern;
use crate::runner::Runner;
use crate::value::Value;
use crate::vars::all_index;
use shrun_ast::{ParExpOp, ParamExp, Slice};

impl Runner {
    /// Value of a parameter name, special parameters included
    fn param_value(&self, name: &str) -> Option<Value> {
        match name {
            "@" | "*" => {
                (!self.params.is_empty()).then(|| Value::Scalar(self.params.join(" ")))
            }
            "#" => Some(Value::Scalar(self.params.len().to_string())),
            "?" => Some(Value::Scalar(self.exit.to_string())),
            "$" => Some(Value::Scalar(std::process::id().to_string())),
            "0" => Some(Value::Scalar(if self.filename.is_empty() {
                "shrun".to_string()
            } else {
                self.filename.clone()
            })),
            _ if name.bytes().all(|b| b.is_ascii_digit()) && !name.is_empty() => name
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.params.get(i))
                .map(|p| Value::Scalar(p.clone())),
            _ => self.lookup_var(name),
        }
    }

    /// Elements of `"$@"` or `"${name[@]}"`, each becoming its own field;
    /// `None` for any other expansion
    pub(crate) fn quoted_elems(&self, pe: &ParamExp) -> Option<Vec<String>> {
        if pe.length || pe.excl || pe.slice.is_some() || pe.repl.is_some() || pe.exp.is_some() {
            return None;
        }
        if pe.name == "@" && pe.index.is_none() {
            return Some(self.params.clone());
        }
        if all_index(pe.index.as_ref()?)? != '@' {
            return None;
        }
        Some(self.elems(&pe.name))
    }

    /// Every element of a variable, in order
    fn elems(&self, name: &str) -> Vec<String> {
        let val = self.lookup_var(name).and_then(|val| self.resolve_ref(val));
        match val {
            None | Some(Value::NameRef(_)) => Vec::new(),
            Some(Value::Scalar(s)) => vec![s],
            Some(Value::Indexed(list)) => list,
            Some(Value::Assoc(map)) => map.values().map(str::to_string).collect(),
        }
    }

    /// Expand a parameter expression to a single string
    pub(crate) fn param_exp(&mut self, pe: &ParamExp) -> Result<String, RunError> {
        let name = pe.name.as_str();
        let value = self.param_value(name);
        let set = value.is_some();
        let whole_list = matches!(name, "@" | "*")
            || pe.index.as_ref().and_then(all_index).is_some();

        let mut s = match (&value, &pe.index) {
            (Some(val), Some(index)) => self.var_index(val, index)?,
            (Some(val), None) => self.var_str(val, 0),
            (None, _) => String::new(),
        };

        if pe.length {
            let len = match (&value, whole_list) {
                _ if matches!(name, "@" | "*") => self.params.len(),
                (Some(val), true) => self.resolve_ref(val.clone()).map_or(0, |v| v.len()),
                (None, true) => 0,
                _ => s.chars().count(),
            };
            return Ok(len.to_string());
        }
        if pe.excl {
            s = match &value {
                Some(Value::NameRef(target)) => target.clone(),
                _ => self.get_var(&s),
            };
        }
        if let Some(slice) = &pe.slice {
            s = if matches!(name, "@" | "*") {
                let elems = self.params.clone();
                self.slice_elems(slice, &elems, 1)?.join(" ")
            } else if whole_list {
                let elems = self.elems(name);
                self.slice_elems(slice, &elems, 0)?.join(" ")
            } else {
                let chars: Vec<String> = s.chars().map(String::from).collect();
                self.slice_elems(slice, &chars, 0)?.concat()
            };
        }
        if let Some(repl) = &pe.repl {
            let orig = self.pattern_word(&repl.orig)?;
            let with = self.lone_word(&repl.with)?;
            s = pattern::replace(&s, &orig, &with, repl.all);
        }
        let Some(exp) = &pe.exp else {
            return Ok(s);
        };

        let null = s.is_empty();
        match exp.op {
            ParExpOp::DefaultUnset if !set => s = self.lone_word(&exp.word)?,
            ParExpOp::DefaultUnsetOrNull if !set || null => s = self.lone_word(&exp.word)?,
            ParExpOp::AlternateUnset => {
                s = if set { self.lone_word(&exp.word)? } else { String::new() };
            }
            ParExpOp::AlternateUnsetOrNull => {
                s = if set && !null {
                    self.lone_word(&exp.word)?
                } else {
                    String::new()
                };
            }
            ParExpOp::AssignUnset | ParExpOp::AssignUnsetOrNull
                if !set || (null && exp.op == ParExpOp::AssignUnsetOrNull) =>
            {
                s = self.lone_word(&exp.word)?;
                self.set_var(name, None, Value::Scalar(s.clone()))?;
            }
            ParExpOp::ErrorUnset | ParExpOp::ErrorUnsetOrNull
                if !set || (null && exp.op == ParExpOp::ErrorUnsetOrNull) =>
            {
                let mut msg = self.lone_word(&exp.word)?;
                if msg.is_empty() {
                    msg = if exp.op == ParExpOp::ErrorUnsetOrNull {
                        "parameter null or not set".to_string()
                    } else {
                        "parameter not set".to_string()
                    };
                }
                self.errf(format_args!("{name}: {msg}\n"));
                return Err(RunError::Exit(1));
            }
            ParExpOp::RemSmallPrefix | ParExpOp::RemLargePrefix => {
                let pat = self.pattern_word(&exp.word)?;
                s = pattern::remove_prefix(&s, &pat, exp.op == ParExpOp::RemLargePrefix);
            }
            ParExpOp::RemSmallSuffix | ParExpOp::RemLargeSuffix => {
                let pat = self.pattern_word(&exp.word)?;
                s = pattern::remove_suffix(&s, &pat, exp.op == ParExpOp::RemLargeSuffix);
            }
            ParExpOp::UpperFirst => s = map_first(&s, char::to_uppercase),
            ParExpOp::UpperAll => s = s.to_uppercase(),
            ParExpOp::LowerFirst => s = map_first(&s, char::to_lowercase),
            ParExpOp::LowerAll => s = s.to_lowercase(),
            _ => {}
        }
        Ok(s)
    }

    /// `${x:offset:length}` over a list of elements. `base` is the number
    /// the first element is addressed by.
    fn slice_elems(
        &mut self,
        slice: &Slice,
        elems: &[String],
        base: i64,
    ) -> Result<Vec<String>, RunError> {
        let len = i64::try_from(elems.len()).unwrap_or(i64::MAX);
        let offset = self.arithm(&slice.offset)?;
        let start = if offset < 0 {
            (offset + len).max(0)
        } else {
            (offset - base).max(0)
        }
        .min(len);
        let end = match &slice.length {
            None => len,
            Some(length) => {
                let length = self.arithm(length)?;
                if length < 0 {
                    (len + length).max(start)
                } else {
                    start.saturating_add(length).min(len)
                }
            }
        };
        let (start, end) = (
            usize::try_from(start).unwrap_or(0),
            usize::try_from(end).unwrap_or(0),
        );
        Ok(elems[start..end.max(start)].to_vec())
    }
}

fn map_first<I>(s: &str, f: fn(char) -> I) -> String
where
    I: Iterator<Item = char>,
{
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => f(first).chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerConfig;
    use crate::stream::OutStream;
    use crate::value::AssocArray;
    use pretty_assertions::assert_eq;
    use shrun_ast::{ArithmExpr, Expansion, Replace, Word, WordPart};

    fn runner() -> (Runner, OutStream) {
        let out = OutStream::buffer();
        let runner = Runner::new(RunnerConfig {
            env: Some(Vec::new()),
            dir: Some(std::env::temp_dir()),
            params: vec!["first".to_string(), "second".to_string(), "third".to_string()],
            stdout: Some(out.clone()),
            stderr: Some(out.clone()),
            ..RunnerConfig::default()
        })
        .unwrap();
        (runner, out)
    }

    fn with_op(name: &str, op: ParExpOp, word: &str) -> ParamExp {
        ParamExp {
            exp: Some(Expansion {
                op,
                word: Word::lit(word),
            }),
            ..ParamExp::braced(name)
        }
    }

    #[test]
    fn test_special_params() {
        let (mut r, _) = runner();
        r.exit = 3;
        assert_eq!(r.param_exp(&ParamExp::short("#")).unwrap(), "3");
        assert_eq!(r.param_exp(&ParamExp::short("?")).unwrap(), "3");
        assert_eq!(r.param_exp(&ParamExp::short("2")).unwrap(), "second");
        assert_eq!(r.param_exp(&ParamExp::short("9")).unwrap(), "");
        assert_eq!(r.param_exp(&ParamExp::short("*")).unwrap(), "first second third");
        assert_eq!(
            r.param_exp(&ParamExp::short("$")).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_length() {
        let (mut r, _) = runner();
        r.set_var("s", None, Value::scalar("héllo")).unwrap();
        r.set_var("arr", None, Value::indexed(["a", "b"])).unwrap();
        let len = |name: &str| ParamExp {
            length: true,
            ..ParamExp::braced(name)
        };
        assert_eq!(r.param_exp(&len("s")).unwrap(), "5");
        assert_eq!(r.param_exp(&len("@")).unwrap(), "3");
        let arr_len = ParamExp {
            length: true,
            ..ParamExp::all_elems("arr", false)
        };
        assert_eq!(r.param_exp(&arr_len).unwrap(), "2");
    }

    #[test]
    fn test_indirection() {
        let (mut r, _) = runner();
        r.set_var("target", None, Value::scalar("found")).unwrap();
        r.set_var("ptr", None, Value::scalar("target")).unwrap();
        let pe = ParamExp {
            excl: true,
            ..ParamExp::braced("ptr")
        };
        assert_eq!(r.param_exp(&pe).unwrap(), "found");
    }

    #[test]
    fn test_slice() {
        let (mut r, _) = runner();
        r.set_var("s", None, Value::scalar("abcdef")).unwrap();
        let slice = |off: &str, len: Option<&str>| ParamExp {
            slice: Some(Slice {
                offset: ArithmExpr::lit(off),
                length: len.map(ArithmExpr::lit),
            }),
            ..ParamExp::braced("s")
        };
        assert_eq!(r.param_exp(&slice("2", None)).unwrap(), "cdef");
        assert_eq!(r.param_exp(&slice("1", Some("3"))).unwrap(), "bcd");
        assert_eq!(r.param_exp(&slice("-2", None)).unwrap(), "ef");
        assert_eq!(r.param_exp(&slice("10", None)).unwrap(), "");

        let params = ParamExp {
            slice: Some(Slice {
                offset: ArithmExpr::lit("2"),
                length: None,
            }),
            ..ParamExp::braced("@")
        };
        assert_eq!(r.param_exp(&params).unwrap(), "second third");
    }

    #[test]
    fn test_replace() {
        let (mut r, _) = runner();
        r.set_var("path", None, Value::scalar("a/b/c")).unwrap();
        let repl = |all: bool| ParamExp {
            repl: Some(Replace {
                all,
                orig: Word::lit("/"),
                with: Word::lit(":"),
            }),
            ..ParamExp::braced("path")
        };
        assert_eq!(r.param_exp(&repl(false)).unwrap(), "a:b/c");
        assert_eq!(r.param_exp(&repl(true)).unwrap(), "a:b:c");
    }

    #[test]
    fn test_default_and_alternate() {
        let (mut r, _) = runner();
        r.set_var("empty", None, Value::scalar("")).unwrap();
        assert_eq!(r.param_exp(&with_op("unset", ParExpOp::DefaultUnset, "d")).unwrap(), "d");
        assert_eq!(r.param_exp(&with_op("empty", ParExpOp::DefaultUnset, "d")).unwrap(), "");
        assert_eq!(
            r.param_exp(&with_op("empty", ParExpOp::DefaultUnsetOrNull, "d")).unwrap(),
            "d"
        );
        assert_eq!(r.param_exp(&with_op("empty", ParExpOp::AlternateUnset, "alt")).unwrap(), "alt");
        assert_eq!(
            r.param_exp(&with_op("empty", ParExpOp::AlternateUnsetOrNull, "alt")).unwrap(),
            ""
        );
        assert_eq!(r.param_exp(&with_op("unset", ParExpOp::AlternateUnset, "alt")).unwrap(), "");
    }

    #[test]
    fn test_assign_default() {
        let (mut r, _) = runner();
        assert_eq!(
            r.param_exp(&with_op("fresh", ParExpOp::AssignUnsetOrNull, "v")).unwrap(),
            "v"
        );
        assert_eq!(r.get_var("fresh"), "v");
    }

    #[test]
    fn test_error_if_unset() {
        let (mut r, out) = runner();
        let err = r
            .param_exp(&with_op("missing", ParExpOp::ErrorUnsetOrNull, "is required"))
            .unwrap_err();
        assert!(matches!(err, RunError::Exit(1)));
        assert_eq!(out.contents(), "missing: is required\n");
    }

    #[test]
    fn test_trim_and_case() {
        let (mut r, _) = runner();
        r.set_var("f", None, Value::scalar("archive.tar.gz")).unwrap();
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::RemSmallSuffix, ".*")).unwrap(), "archive.tar");
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::RemLargeSuffix, ".*")).unwrap(), "archive");
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::RemSmallPrefix, "*.")).unwrap(), "tar.gz");
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::RemLargePrefix, "*.")).unwrap(), "gz");
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::UpperFirst, "")).unwrap(), "Archive.tar.gz");
        assert_eq!(r.param_exp(&with_op("f", ParExpOp::UpperAll, "")).unwrap(), "ARCHIVE.TAR.GZ");
    }

    #[test]
    fn test_quoted_pattern_in_trim_is_literal() {
        let (mut r, _) = runner();
        r.set_var("v", None, Value::scalar("*abc")).unwrap();
        let pe = ParamExp {
            exp: Some(Expansion {
                op: ParExpOp::RemSmallPrefix,
                word: Word::dbl_quoted(vec![WordPart::lit("*")]),
            }),
            ..ParamExp::braced("v")
        };
        assert_eq!(r.param_exp(&pe).unwrap(), "abc");
    }

    #[test]
    fn test_assoc_elements() {
        let (mut r, _) = runner();
        let map: AssocArray = [("foo", "1"), ("bar", "2")].into_iter().collect();
        r.set_var("m", None, Value::Assoc(map)).unwrap();
        assert_eq!(r.param_exp(&ParamExp::all_elems("m", false)).unwrap(), "1 2");
        assert_eq!(
            r.quoted_elems(&ParamExp::all_elems("m", false)),
            Some(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(r.quoted_elems(&ParamExp::all_elems("m", true)), None);
    }
}
