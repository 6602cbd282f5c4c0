//! Shell pattern matching on strings, for `case`, `[[ == ]]` and the
//! trimming and replacement forms of parameter expansion

use glob::{MatchOptions, Pattern};

/// Unlike filename globbing, `*` here matches `/` and leading dots
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Whether `name` matches `pattern` as a whole. A malformed pattern only
/// matches its own text.
pub(crate) fn matches(pattern: &str, name: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches_with(name, MATCH_OPTIONS),
        Err(_) => pattern == name,
    }
}

/// Char boundaries of `s`, including both ends
fn boundaries(s: &str) -> Vec<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect()
}

/// `${x#pat}` and `${x##pat}`
pub(crate) fn remove_prefix(s: &str, pattern: &str, longest: bool) -> String {
    let Ok(compiled) = Pattern::new(pattern) else {
        return s.strip_prefix(pattern).unwrap_or(s).to_string();
    };
    let bounds = boundaries(s);
    let is_match = |i: &&usize| compiled.matches_with(&s[..**i], MATCH_OPTIONS);
    let hit = if longest {
        bounds.iter().rev().find(is_match)
    } else {
        bounds.iter().find(is_match)
    };
    hit.map_or_else(|| s.to_string(), |&i| s[i..].to_string())
}

/// `${x%pat}` and `${x%%pat}`
pub(crate) fn remove_suffix(s: &str, pattern: &str, longest: bool) -> String {
    let Ok(compiled) = Pattern::new(pattern) else {
        return s.strip_suffix(pattern).unwrap_or(s).to_string();
    };
    let bounds = boundaries(s);
    let is_match = |i: &&usize| compiled.matches_with(&s[**i..], MATCH_OPTIONS);
    let hit = if longest {
        bounds.iter().find(is_match)
    } else {
        bounds.iter().rev().find(is_match)
    };
    hit.map_or_else(|| s.to_string(), |&i| s[..i].to_string())
}

/// `${x/pat/with}` and `${x//pat/with}`: replace the longest match at the
/// leftmost position, or at every position when `all` is set
pub(crate) fn replace(s: &str, pattern: &str, with: &str, all: bool) -> String {
    if pattern.is_empty() {
        return s.to_string();
    }
    let Ok(compiled) = Pattern::new(pattern) else {
        return if all {
            s.replace(pattern, with)
        } else {
            s.replacen(pattern, with, 1)
        };
    };
    let bounds = boundaries(s);
    let mut out = String::with_capacity(s.len());
    let mut replaced = false;
    let mut b = 0;
    while b + 1 < bounds.len() {
        let start = bounds[b];
        if all || !replaced {
            let end = (b + 1..bounds.len())
                .rev()
                .find(|&e| compiled.matches_with(&s[start..bounds[e]], MATCH_OPTIONS));
            if let Some(e) = end {
                out.push_str(with);
                replaced = true;
                b = e;
                continue;
            }
        }
        out.push_str(&s[start..bounds[b + 1]]);
        b += 1;
    }
    out
}
