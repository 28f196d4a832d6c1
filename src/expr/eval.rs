//! Evaluation of compiled rule expressions.
//!
//! Evaluation is a pure recursive descent over the compiled tree: no I/O,
//! no blocking, no interior mutability. The left operand always runs
//! first; `&&`, `||`, `??`, `?` and `:` short-circuit on its value.
//! Operands are type-checked against the operator's accepted kinds before
//! the operator function runs, so a mismatch is a typed error rather than
//! undefined behavior. A rule's final value must be a boolean.

use regex::Regex;

use crate::expr::builtins::{Registry, RequestFacts};
use crate::expr::error::EvalError;
use crate::expr::parser::{CompiledRule, Expr};
use crate::expr::token::Op;
use crate::expr::value::Value;

impl CompiledRule {
    /// Evaluate against a function registry and the per-request facts.
    /// Anything other than a boolean result is an error.
    pub fn evaluate(&self, registry: &Registry, facts: &RequestFacts) -> Result<bool, EvalError> {
        match eval(&self.root, registry, facts)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NonBooleanResult(other.kind())),
        }
    }
}

fn eval(expr: &Expr, registry: &Registry, facts: &RequestFacts) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(name) => lookup_param(name, facts),
        Expr::Unary { op, operand } => {
            let v = eval(operand, registry, facts)?;
            eval_unary(*op, v)
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, registry, facts),
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, registry, facts)?);
            }
            match registry.get(name) {
                Some(predicate) => predicate.call(&values, facts),
                None => Err(EvalError::UnknownFunction(name.clone())),
            }
        }
    }
}

/// Bare identifiers resolve against the request's parameter map. Capture
/// keys carry their leading colon, so `epbcID` also tries `:epbcID`.
fn lookup_param(name: &str, facts: &RequestFacts) -> Result<Value, EvalError> {
    if let Some(v) = facts.param(name) {
        return Ok(Value::Str(v.to_string()));
    }
    let with_colon = format!(":{name}");
    match facts.param(&with_colon) {
        Some(v) => Ok(Value::Str(v.to_string())),
        None => Err(EvalError::UnknownParameter(name.to_string())),
    }
}

fn eval_unary(op: Op, v: Value) -> Result<Value, EvalError> {
    match op {
        Op::Not => match v.as_bool() {
            Some(b) => Ok(Value::Bool(!b)),
            None => Err(mismatch(op, &v)),
        },
        Op::Sub => match v.as_number() {
            Some(n) => Ok(Value::Number(-n)),
            None => Err(mismatch(op, &v)),
        },
        _ => unreachable!("parser emits only prefix operators here"),
    }
}

fn eval_binary(
    op: Op,
    left: &Expr,
    right: &Expr,
    registry: &Registry,
    facts: &RequestFacts,
) -> Result<Value, EvalError> {
    let l = eval(left, registry, facts)?;

    // Short-circuiting operators decide on the left value alone.
    match op {
        Op::And => {
            let lb = l.as_bool().ok_or_else(|| mismatch(op, &l))?;
            if !lb {
                return Ok(Value::Bool(false));
            }
            let r = eval(right, registry, facts)?;
            let rb = r.as_bool().ok_or_else(|| mismatch(op, &r))?;
            return Ok(Value::Bool(rb));
        }
        Op::Or => {
            let lb = l.as_bool().ok_or_else(|| mismatch(op, &l))?;
            if lb {
                return Ok(Value::Bool(true));
            }
            let r = eval(right, registry, facts)?;
            let rb = r.as_bool().ok_or_else(|| mismatch(op, &r))?;
            return Ok(Value::Bool(rb));
        }
        Op::TernaryIf => {
            let lb = l.as_bool().ok_or_else(|| mismatch(op, &l))?;
            if !lb {
                return Ok(Value::Null);
            }
            return eval(right, registry, facts);
        }
        Op::TernaryElse | Op::Coalesce => {
            if !l.is_null() {
                return Ok(l);
            }
            return eval(right, registry, facts);
        }
        _ => {}
    }

    let r = eval(right, registry, facts)?;

    match op {
        Op::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        Op::Ne => Ok(Value::Bool(!l.loose_eq(&r))),

        Op::Gt | Op::Lt | Op::Ge | Op::Le => order(op, &l, &r),

        Op::ReMatch | Op::ReNotMatch => {
            let subject = l.as_str().ok_or_else(|| mismatch(op, &l))?;
            let pattern = r.as_str().ok_or_else(|| mismatch(op, &r))?;
            let re = Regex::new(pattern).map_err(|e| EvalError::Regex {
                pattern: pattern.to_string(),
                msg: e.to_string(),
            })?;
            let hit = re.is_match(subject);
            Ok(Value::Bool(if op == Op::ReMatch { hit } else { !hit }))
        }

        // The language has no array literals; `in` takes a comma-separated
        // list on the right.
        Op::In => {
            let needle = l.as_str().ok_or_else(|| mismatch(op, &l))?;
            let list = r.as_str().ok_or_else(|| mismatch(op, &r))?;
            let hit = list.split(',').any(|item| item.trim() == needle);
            Ok(Value::Bool(hit))
        }

        Op::Contains | Op::StartsWith | Op::EndsWith => {
            let subject = l.as_str().ok_or_else(|| mismatch(op, &l))?;
            let arg = r.as_str().ok_or_else(|| mismatch(op, &r))?;
            let hit = match op {
                Op::Contains => subject.contains(arg),
                Op::StartsWith => subject.starts_with(arg),
                _ => subject.ends_with(arg),
            };
            Ok(Value::Bool(hit))
        }

        Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr => {
            let a = l.as_number().ok_or_else(|| mismatch(op, &l))? as i64;
            let b = r.as_number().ok_or_else(|| mismatch(op, &r))? as i64;
            let out = match op {
                Op::BitAnd => a & b,
                Op::BitOr => a | b,
                Op::BitXor => a ^ b,
                Op::Shl => a.wrapping_shl(b as u32),
                _ => a.wrapping_shr(b as u32),
            };
            Ok(Value::Number(out as f64))
        }

        Op::Add => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(mismatch(op, pick_bad(&l, &r))),
        },

        Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => {
            let a = l.as_number().ok_or_else(|| mismatch(op, &l))?;
            let b = r.as_number().ok_or_else(|| mismatch(op, &r))?;
            let out = match op {
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => a / b,
                Op::Mod => a % b,
                _ => a.powf(b),
            };
            Ok(Value::Number(out))
        }

        Op::And | Op::Or | Op::TernaryIf | Op::TernaryElse | Op::Coalesce | Op::Not => {
            unreachable!("handled above")
        }
    }
}

/// Ordering comparators accept two numbers or two strings.
fn order(op: Op, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(compare(op, a.partial_cmp(b)))),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(compare(op, Some(a.cmp(b))))),
        _ => Err(mismatch(op, pick_bad(l, r))),
    }
}

/// For mixed-kind operands, report the operand that broke the pairing.
fn pick_bad<'a>(l: &'a Value, r: &'a Value) -> &'a Value {
    if matches!(l, Value::Number(_) | Value::Str(_)) {
        r
    } else {
        l
    }
}

fn compare(op: Op, ord: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ord) {
        (_, None) => false,
        (Op::Gt, Some(o)) => o == Greater,
        (Op::Lt, Some(o)) => o == Less,
        (Op::Ge, Some(o)) => o != Less,
        (Op::Le, Some(o)) => o != Greater,
        _ => false,
    }
}

fn mismatch(op: Op, v: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.symbol(),
        got: v.kind(),
    }
}
