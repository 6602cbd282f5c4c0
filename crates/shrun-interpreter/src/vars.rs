//! Value store: variable lookup, indexing, assignment and deletion

use crate::error::RunError;
use crate::runner::Runner;
use crate::value::{AssocArray, MAX_NAME_REF_DEPTH, Value};
use shrun_ast::{ArithmExpr, Assign, Stmt, WordPart};
use std::sync::Arc;

/// Largest indexed array a single assignment may create
const MAX_INDEXED_LEN: usize = 1 << 24;

/// How a declaration asks for its values to be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclMode {
    /// Whatever the assignment syntax implies
    Infer,
    /// `declare -A`
    Assoc,
    /// `declare -n`
    NameRef,
}

/// `@` or `*` when the index selects every element
pub(crate) fn all_index(index: &ArithmExpr) -> Option<char> {
    let ArithmExpr::Word(word) = index else {
        return None;
    };
    match word.parts.first() {
        Some(WordPart::Lit { value }) if value == "@" => Some('@'),
        Some(WordPart::Lit { value }) if value == "*" => Some('*'),
        _ => None,
    }
}

/// Whether the index is a quoted string, as in `m["key"]`
fn string_index(index: &ArithmExpr) -> bool {
    matches!(index, ArithmExpr::Word(word)
        if matches!(word.parts.as_slice(), [WordPart::DblQuoted { .. } | WordPart::SglQuoted { .. }]))
}

/// Element `index` of `list`, counting from the end when negative
fn index_list(list: &[String], index: i64) -> String {
    let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
    let index = if index < 0 { index + len } else { index };
    usize::try_from(index)
        .ok()
        .and_then(|i| list.get(i))
        .cloned()
        .unwrap_or_default()
}

impl Runner {
    /// Find a variable: command prefix assignments first, then script
    /// variables, then the environment.
    #[must_use]
    pub fn lookup_var(&self, name: &str) -> Option<Value> {
        if let Some(val) = self.cmd_vars.get(name) {
            return Some(val.clone());
        }
        if let Some(val) = self.vars.get(name) {
            return Some(val.clone());
        }
        self.env_map.get(name).map(|val| Value::Scalar(val.clone()))
    }

    /// Scalar view of a variable; `""` when unset
    #[must_use]
    pub fn get_var(&self, name: &str) -> String {
        self.lookup_var(name)
            .map(|val| self.var_str(&val, 0))
            .unwrap_or_default()
    }

    /// Scalar view of a value: the first element of an indexed array,
    /// nothing for an associative array, the target for a reference.
    pub(crate) fn var_str(&self, val: &Value, depth: usize) -> String {
        match val {
            Value::Scalar(s) => s.clone(),
            Value::Indexed(list) => list.first().cloned().unwrap_or_default(),
            Value::Assoc(_) => String::new(),
            Value::NameRef(target) => {
                if depth >= MAX_NAME_REF_DEPTH {
                    return String::new();
                }
                self.lookup_var(target)
                    .map(|val| self.var_str(&val, depth + 1))
                    .unwrap_or_default()
            }
        }
    }

    /// Follow name references to the value they finally stand for
    pub(crate) fn resolve_ref(&self, val: Value) -> Option<Value> {
        let mut val = val;
        for _ in 0..MAX_NAME_REF_DEPTH {
            match val {
                Value::NameRef(target) => val = self.lookup_var(&target)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Indexed read of a value: `${name[index]}`
    ///
    /// # Errors
    ///
    /// Errors raised while evaluating the index.
    pub fn var_index(&mut self, val: &Value, index: &ArithmExpr) -> Result<String, RunError> {
        let Some(val) = self.resolve_ref(val.clone()) else {
            return Ok(String::new());
        };
        match val {
            Value::Scalar(s) => {
                if all_index(index).is_some() || self.arithm(index)? == 0 {
                    Ok(s)
                } else {
                    Ok(String::new())
                }
            }
            Value::Indexed(list) => match all_index(index) {
                Some(_) => Ok(list.join(" ")),
                None => {
                    let i = self.arithm(index)?;
                    Ok(index_list(&list, i))
                }
            },
            Value::Assoc(map) => {
                if all_index(index).is_some() {
                    return Ok(map.values().collect::<Vec<_>>().join(" "));
                }
                let key = self.index_key(index)?;
                Ok(map.get(&key).unwrap_or_default().to_string())
            }
            Value::NameRef(_) => Ok(String::new()),
        }
    }

    fn index_key(&mut self, index: &ArithmExpr) -> Result<String, RunError> {
        match index {
            ArithmExpr::Word(word) => self.lone_word(word),
            other => Ok(self.arithm(other)?.to_string()),
        }
    }

    /// Name a write to `name` really lands on, following references
    fn ref_target(&self, name: &str) -> String {
        let mut name = name.to_string();
        for _ in 0..MAX_NAME_REF_DEPTH {
            match self.vars.get(&name) {
                Some(Value::NameRef(target)) => name = target.clone(),
                _ => return name,
            }
        }
        name
    }

    /// Assign a variable, or one element of it when `index` is given.
    ///
    /// An index on an associative array, or a quoted index on a name that
    /// is not set yet, writes a key; anything else writes an arithmetic
    /// position, growing the array with empty elements as needed.
    ///
    /// # Errors
    ///
    /// Errors raised while evaluating the index.
    pub fn set_var(
        &mut self,
        name: &str,
        index: Option<&ArithmExpr>,
        val: Value,
    ) -> Result<(), RunError> {
        let name = if matches!(val, Value::NameRef(_)) && index.is_none() {
            name.to_string()
        } else {
            self.ref_target(name)
        };
        let Some(index) = index else {
            self.vars.insert(name, val);
            return Ok(());
        };
        let val = match val {
            Value::Scalar(s) => s,
            other => self.var_str(&other, 0),
        };

        let existing = self.vars.get(&name);
        let keyed = match existing {
            Some(Value::Assoc(_)) => true,
            None => string_index(index),
            Some(_) => false,
        };
        if keyed {
            let key = self.index_key(index)?;
            let mut map = match self.vars.remove(&name) {
                Some(Value::Assoc(map)) => map,
                _ => AssocArray::new(),
            };
            map.insert(key, val);
            self.vars.insert(name, Value::Assoc(map));
            return Ok(());
        }

        let k = self.arithm(index)?;
        let mut list = match self.vars.get(&name) {
            Some(Value::Scalar(s)) => vec![s.clone()],
            Some(Value::Indexed(list)) => list.clone(),
            _ => Vec::new(),
        };
        let len = i64::try_from(list.len()).unwrap_or(i64::MAX);
        let k = if k < 0 { k + len } else { k };
        let Some(k) = usize::try_from(k).ok().filter(|k| *k < MAX_INDEXED_LEN) else {
            self.errf(format_args!("{name}: bad array subscript\n"));
            self.exit = 1;
            return Ok(());
        };
        if list.len() <= k {
            list.resize(k + 1, String::new());
        }
        list[k] = val;
        self.vars.insert(name, Value::Indexed(list));
        Ok(())
    }

    /// Remove a variable from the script variables and the environment
    pub fn del_var(&mut self, name: &str) {
        self.vars.remove(name);
        self.env_map.remove(name);
        self.exported.remove(name);
    }

    pub(crate) fn set_func(&mut self, name: &str, body: Arc<Stmt>) {
        self.funcs.insert(name.to_string(), body);
    }

    /// Build the value an assignment stores, applying `+=` against the
    /// current value. `None` means a bare declaration with nothing to store.
    pub(crate) fn assign_value(
        &mut self,
        assign: &Assign,
        mode: DeclMode,
    ) -> Result<Option<Value>, RunError> {
        let prev = self
            .lookup_var(&assign.name)
            .and_then(|val| self.resolve_ref(val));

        if let Some(word) = &assign.value {
            let s = self.lone_word(word)?;
            if !assign.append {
                return Ok(Some(Value::Scalar(s)));
            }
            if let (Some(index), Some(prev)) = (&assign.index, &prev) {
                let elem = self.var_index(prev, index)?;
                return Ok(Some(Value::Scalar(elem + &s)));
            }
            let val = match prev {
                None => Value::Scalar(s),
                Some(Value::Scalar(prev)) => Value::Scalar(prev + &s),
                Some(Value::Indexed(mut list)) => {
                    match list.first_mut() {
                        Some(first) => first.push_str(&s),
                        None => list.push(s),
                    }
                    Value::Indexed(list)
                }
                Some(Value::Assoc(mut map)) => {
                    let joined = format!("{}{s}", map.get("0").unwrap_or_default());
                    map.insert("0", joined);
                    Value::Assoc(map)
                }
                Some(Value::NameRef(_)) => Value::Scalar(s),
            };
            return Ok(Some(val));
        }

        let Some(elems) = &assign.array else {
            return Ok(match (mode, prev) {
                (DeclMode::Assoc, Some(val @ Value::Assoc(_))) => Some(val),
                (DeclMode::Assoc, _) => Some(Value::Assoc(AssocArray::new())),
                _ => None,
            });
        };

        let assoc = match mode {
            DeclMode::Assoc => true,
            DeclMode::Infer | DeclMode::NameRef => {
                (assign.append && matches!(prev, Some(Value::Assoc(_))))
                    || elems
                        .first()
                        .and_then(|elem| elem.index.as_ref())
                        .is_some_and(string_index)
            }
        };

        if assoc {
            let mut map = match (assign.append, prev) {
                (true, Some(Value::Assoc(map))) => map,
                _ => AssocArray::new(),
            };
            for (i, elem) in elems.iter().enumerate() {
                let key = match &elem.index {
                    Some(index) => self.index_key(index)?,
                    None => i.to_string(),
                };
                let val = self.lone_word(&elem.value)?;
                map.insert(key, val);
            }
            return Ok(Some(Value::Assoc(map)));
        }

        let mut indexes = Vec::with_capacity(elems.len());
        let mut max_index = elems.len().checked_sub(1);
        for (i, elem) in elems.iter().enumerate() {
            let k = match &elem.index {
                Some(index) => {
                    let k = self.arithm(index)?;
                    match usize::try_from(k).ok().filter(|k| *k < MAX_INDEXED_LEN) {
                        Some(k) => k,
                        None => {
                            self.errf(format_args!("{}: bad array subscript\n", assign.name));
                            self.exit = 1;
                            return Ok(None);
                        }
                    }
                }
                None => i,
            };
            max_index = max_index.max(Some(k));
            indexes.push(k);
        }
        let mut list = vec![String::new(); max_index.map_or(0, |m| m + 1)];
        for (elem, k) in elems.iter().zip(indexes) {
            list[k] = self.lone_word(&elem.value)?;
        }

        if !assign.append {
            return Ok(Some(Value::Indexed(list)));
        }
        Ok(Some(match prev {
            Some(Value::Scalar(s)) => Value::Indexed(std::iter::once(s).chain(list).collect()),
            Some(Value::Indexed(mut prev)) => {
                prev.extend(list);
                Value::Indexed(prev)
            }
            _ => Value::Indexed(list),
        }))
    }
}
