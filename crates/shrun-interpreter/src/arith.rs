//! Integer arithmetic for `$((...))`, `((...))`, `let`, C-style `for` loops
//! and array indexes

use crate::error::RunError;
use crate::expand::parse_int;
use crate::runner::Runner;
use crate::value::{MAX_NAME_REF_DEPTH, Value};
use shrun_ast::{ArithmExpr, BinAritOp, Position, UnAritOp};

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// `base#digits`, with bases 2 to 64 as bash spells them
fn parse_based(base: &str, digits: &str) -> i64 {
    let Ok(base) = base.parse::<u32>() else {
        return 0;
    };
    if !(2..=64).contains(&base) {
        return 0;
    }
    let mut n: i64 = 0;
    for c in digits.chars() {
        let d = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
            'A'..='Z' => c as u32 - 'A' as u32 + 36,
            '@' => 62,
            '_' => 63,
            _ => return 0,
        };
        if d >= base {
            return 0;
        }
        n = n.wrapping_mul(i64::from(base)).wrapping_add(i64::from(d));
    }
    n
}

/// Which compound assignment maps onto which plain operator
const fn assign_base(op: BinAritOp) -> Option<BinAritOp> {
    Some(match op {
        BinAritOp::AddAssgn => BinAritOp::Add,
        BinAritOp::SubAssgn => BinAritOp::Sub,
        BinAritOp::MulAssgn => BinAritOp::Mul,
        BinAritOp::QuoAssgn => BinAritOp::Quo,
        BinAritOp::RemAssgn => BinAritOp::Rem,
        BinAritOp::ShlAssgn => BinAritOp::Shl,
        BinAritOp::ShrAssgn => BinAritOp::Shr,
        BinAritOp::AndAssgn => BinAritOp::And,
        BinAritOp::OrAssgn => BinAritOp::Or,
        BinAritOp::XorAssgn => BinAritOp::Xor,
        _ => return None,
    })
}

impl Runner {
    /// Evaluate an arithmetic expression
    pub(crate) fn arithm(&mut self, expr: &ArithmExpr) -> Result<i64, RunError> {
        match expr {
            ArithmExpr::Word(word) => {
                let s = self.lone_word(word)?;
                Ok(self.arith_str(&s, 0))
            }
            ArithmExpr::Paren { x } => self.arithm(x),
            ArithmExpr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.arithm(cond)? != 0 {
                    self.arithm(then)
                } else {
                    self.arithm(otherwise)
                }
            }
            ArithmExpr::Unary { op, post, x } => match op {
                UnAritOp::Inc | UnAritOp::Dec => {
                    let name = self.assign_target(x)?;
                    let old = self.arith_str(&self.get_var(&name), 0);
                    let new = if *op == UnAritOp::Inc {
                        old.wrapping_add(1)
                    } else {
                        old.wrapping_sub(1)
                    };
                    self.set_var(&name, None, Value::Scalar(new.to_string()))?;
                    Ok(if *post { old } else { new })
                }
                UnAritOp::Not => Ok(i64::from(self.arithm(x)? == 0)),
                UnAritOp::BitNegation => Ok(!self.arithm(x)?),
                UnAritOp::Plus => self.arithm(x),
                UnAritOp::Minus => Ok(self.arithm(x)?.wrapping_neg()),
            },
            ArithmExpr::Binary { op, x, y } => match op {
                BinAritOp::AndArit => {
                    Ok(i64::from(self.arithm(x)? != 0 && self.arithm(y)? != 0))
                }
                BinAritOp::OrArit => {
                    Ok(i64::from(self.arithm(x)? != 0 || self.arithm(y)? != 0))
                }
                BinAritOp::Comma => {
                    self.arithm(x)?;
                    self.arithm(y)
                }
                BinAritOp::Assgn => {
                    let name = self.assign_target(x)?;
                    let val = self.arithm(y)?;
                    self.set_var(&name, None, Value::Scalar(val.to_string()))?;
                    Ok(val)
                }
                _ => {
                    if let Some(base) = assign_base(*op) {
                        let name = self.assign_target(x)?;
                        let old = self.arith_str(&self.get_var(&name), 0);
                        let rhs = self.arithm(y)?;
                        let val = self.binary_arith(base, old, rhs)?;
                        self.set_var(&name, None, Value::Scalar(val.to_string()))?;
                        return Ok(val);
                    }
                    let x = self.arithm(x)?;
                    let y = self.arithm(y)?;
                    self.binary_arith(*op, x, y)
                }
            },
        }
    }

    /// Number or variable name appearing as an arithmetic operand. Names
    /// are resolved recursively; anything else counts as zero.
    pub(crate) fn arith_str(&self, s: &str, depth: usize) -> i64 {
        let s = s.trim();
        let unsigned = s.trim_start_matches(['-', '+']);
        if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
            if let Some((base, digits)) = unsigned.split_once('#') {
                let n = parse_based(base, digits);
                return if s.starts_with('-') { n.wrapping_neg() } else { n };
            }
            return parse_int(s);
        }
        if is_name(s) && depth < MAX_NAME_REF_DEPTH {
            return self.arith_str(&self.get_var(s), depth + 1);
        }
        0
    }

    /// Variable name an assignment operator writes to
    fn assign_target(&mut self, x: &ArithmExpr) -> Result<String, RunError> {
        let name = match x {
            ArithmExpr::Word(word) => self.lone_word(word)?,
            _ => String::new(),
        };
        if is_name(&name) {
            Ok(name)
        } else {
            Err(self.runtime_err(
                Position::default(),
                format!("attempted assignment to non-variable: {name:?}"),
            ))
        }
    }

    fn binary_arith(&self, op: BinAritOp, x: i64, y: i64) -> Result<i64, RunError> {
        // Shift counts wrap like the underlying machine shift
        let shift = || u32::try_from(y.rem_euclid(64)).unwrap_or(0);
        Ok(match op {
            BinAritOp::Add => x.wrapping_add(y),
            BinAritOp::Sub => x.wrapping_sub(y),
            BinAritOp::Mul => x.wrapping_mul(y),
            BinAritOp::Quo | BinAritOp::Rem if y == 0 => {
                return Err(self.runtime_err(Position::default(), "division by zero"));
            }
            BinAritOp::Quo => x.wrapping_div(y),
            BinAritOp::Rem => x.wrapping_rem(y),
            BinAritOp::Pow => {
                let Ok(exp) = u32::try_from(y) else {
                    return Err(self.runtime_err(Position::default(), "exponent less than 0"));
                };
                x.wrapping_pow(exp)
            }
            BinAritOp::Shl => x.wrapping_shl(shift()),
            BinAritOp::Shr => x.wrapping_shr(shift()),
            BinAritOp::And => x & y,
            BinAritOp::Or => x | y,
            BinAritOp::Xor => x ^ y,
            BinAritOp::Lss => i64::from(x < y),
            BinAritOp::Leq => i64::from(x <= y),
            BinAritOp::Gtr => i64::from(x > y),
            BinAritOp::Geq => i64::from(x >= y),
            BinAritOp::Eql => i64::from(x == y),
            BinAritOp::Neq => i64::from(x != y),
            BinAritOp::AndArit => i64::from(x != 0 && y != 0),
            BinAritOp::OrArit => i64::from(x != 0 || y != 0),
            BinAritOp::Comma => y,
            BinAritOp::Assgn
            | BinAritOp::AddAssgn
            | BinAritOp::SubAssgn
            | BinAritOp::MulAssgn
            | BinAritOp::QuoAssgn
            | BinAritOp::RemAssgn
            | BinAritOp::ShlAssgn
            | BinAritOp::ShrAssgn
            | BinAritOp::AndAssgn
            | BinAritOp::OrAssgn
            | BinAritOp::XorAssgn => y,
        })
    }
}
