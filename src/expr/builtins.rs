//! Builtin predicate registry for rule expressions.
//!
//! The registry is a closed, immutable name table built at startup.
//! Builtins never resolve at compile time; the compiler only checks that a
//! called name exists. Extending the language means registering another
//! implementation here, not touching the grammar.
//!
//! Request-scoped predicates (`bearer`, `root`, `param`) read from the
//! [`RequestFacts`] the rule binder assembles per request; the rest are
//! pure functions of their arguments and the clock.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};

use crate::expr::error::EvalError;
use crate::expr::value::Value;

/// Per-request inputs supplied to the evaluator: the symbolic name the
/// bearer token resolved to, whether the validated identity is a
/// superuser, and the multi-valued path captures.
#[derive(Debug, Clone, Default)]
pub struct RequestFacts {
    pub token_name: Option<String>,
    pub superuser: bool,
    pub params: HashMap<String, Vec<String>>,
}

impl RequestFacts {
    /// First value registered under a parameter name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A named function callable from rule expressions.
pub trait Predicate: Send + Sync {
    fn call(&self, args: &[Value], facts: &RequestFacts) -> Result<Value, EvalError>;
}

impl<F> Predicate for F
where
    F: Fn(&[Value], &RequestFacts) -> Result<Value, EvalError> + Send + Sync,
{
    fn call(&self, args: &[Value], facts: &RequestFacts) -> Result<Value, EvalError> {
        self(args, facts)
    }
}

/// Immutable predicate table. Built once, shared by every compiled rule.
pub struct Registry {
    entries: HashMap<String, Box<dyn Predicate>>,
}

impl Registry {
    /// The standard builtin set.
    pub fn standard() -> Self {
        Self::builder().build()
    }

    /// A builder pre-seeded with the standard builtins.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::seeded()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&dyn Predicate> {
        self.entries.get(name).map(Box::as_ref)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

pub struct RegistryBuilder {
    entries: HashMap<String, Box<dyn Predicate>>,
}

impl RegistryBuilder {
    fn seeded() -> Self {
        let builder = Self {
            entries: HashMap::new(),
        };
        builder
            .register("bearer", bearer)
            .register("root", root)
            .register("param", param)
            .register("after", after)
            .register("before", before)
            .register("ageAt", age_at)
            .register("empty", empty)
            .register("notnull", notnull)
            .register("now", now)
            .register("random", random)
            .register("round", round)
    }

    pub fn register<P>(mut self, name: &str, predicate: P) -> Self
    where
        P: Predicate + 'static,
    {
        self.entries.insert(name.to_string(), Box::new(predicate));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

fn want(func: &'static str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::Arity {
            func,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn want_str<'a>(func: &'static str, v: &'a Value) -> Result<&'a str, EvalError> {
    v.as_str().ok_or_else(|| EvalError::Function {
        func,
        msg: format!("takes a string, got {}", v.kind()),
    })
}

/// True iff the request's bearer token resolved to the given symbolic
/// name. The argument may itself be computed, e.g. `bearer(param(':x'))`.
fn bearer(args: &[Value], facts: &RequestFacts) -> Result<Value, EvalError> {
    want("bearer", args, 1)?;
    let name = want_str("bearer", &args[0])?;
    Ok(Value::Bool(facts.token_name.as_deref() == Some(name)))
}

/// True iff the request carries a validated superuser identity.
fn root(args: &[Value], facts: &RequestFacts) -> Result<Value, EvalError> {
    want("root", args, 0)?;
    Ok(Value::Bool(facts.superuser))
}

/// The named path capture as a string; null when absent.
fn param(args: &[Value], facts: &RequestFacts) -> Result<Value, EvalError> {
    want("param", args, 1)?;
    let name = want_str("param", &args[0])?;
    Ok(match facts.param(name) {
        Some(v) => Value::Str(v.to_string()),
        None => Value::Null,
    })
}

fn after(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("after", args, 1)?;
    let when = parse_instant("after", &args[0])?;
    Ok(Value::Bool(Utc::now().timestamp() as f64 > when))
}

fn before(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("before", args, 1)?;
    let when = parse_instant("before", &args[0])?;
    Ok(Value::Bool((Utc::now().timestamp() as f64) < when))
}

/// Whole years between a date of birth and a reference date.
fn age_at(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("ageAt", args, 2)?;
    let dob = parse_date("ageAt", &args[0])?;
    let at = parse_date("ageAt", &args[1])?;
    let mut years = at.year() - dob.year();
    if (at.month(), at.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    Ok(Value::Number(years as f64))
}

/// Null or a blank string.
fn empty(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("empty", args, 1)?;
    let out = match &args[0] {
        Value::Null => true,
        Value::Str(s) => s.trim().is_empty(),
        _ => false,
    };
    Ok(Value::Bool(out))
}

fn notnull(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("notnull", args, 1)?;
    Ok(Value::Bool(!args[0].is_null()))
}

/// Current instant as epoch seconds, so it composes with the comparators
/// and with `after`/`before` arguments given as numbers.
fn now(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("now", args, 0)?;
    Ok(Value::Number(Utc::now().timestamp() as f64))
}

fn random(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("random", args, 0)?;
    Ok(Value::Number(rand::random::<f64>()))
}

fn round(args: &[Value], _: &RequestFacts) -> Result<Value, EvalError> {
    want("round", args, 1)?;
    match args[0].as_number() {
        Some(n) => Ok(Value::Number(n.round())),
        None => Err(EvalError::Function {
            func: "round",
            msg: format!("takes a number, got {}", args[0].kind()),
        }),
    }
}

/// A date argument as epoch seconds: either a number already, an RFC 3339
/// timestamp, or a plain `YYYY-MM-DD`.
fn parse_instant(func: &'static str, v: &Value) -> Result<f64, EvalError> {
    if let Some(n) = v.as_number() {
        return Ok(n);
    }
    let s = want_str(func, v)?;
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp() as f64);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc().timestamp() as f64);
    }
    Err(EvalError::Function {
        func,
        msg: format!("cannot parse `{s}` as a date"),
    })
}

fn parse_date(func: &'static str, v: &Value) -> Result<NaiveDate, EvalError> {
    let s = want_str(func, v)?;
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| EvalError::Function {
        func,
        msg: format!("cannot parse `{s}` as a date"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::compile;

    fn run(src: &str, facts: &RequestFacts) -> Result<bool, EvalError> {
        let registry = Registry::standard();
        let rule = compile(src, &registry).unwrap();
        rule.evaluate(&registry, facts)
    }

    #[test]
    fn test_bearer_matches_resolved_name() {
        let facts = RequestFacts {
            token_name: Some("T".to_string()),
            ..Default::default()
        };
        assert!(run("bearer('T')", &facts).unwrap());
        assert!(!run("bearer('OTHER')", &facts).unwrap());
    }

    #[test]
    fn test_bearer_without_token() {
        assert!(!run("bearer('T')", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_bearer_with_dynamic_argument() {
        let mut facts = RequestFacts {
            token_name: Some("SFU".to_string()),
            ..Default::default()
        };
        facts
            .params
            .insert(":epbcID".to_string(), vec!["SFU".to_string()]);
        assert!(run("bearer(param(':epbcID'))", &facts).unwrap());
    }

    #[test]
    fn test_root_reflects_superuser() {
        let facts = RequestFacts {
            superuser: true,
            ..Default::default()
        };
        assert!(run("root()", &facts).unwrap());
        assert!(!run("root()", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_param_missing_is_null() {
        assert!(run("empty(param(':nope'))", &RequestFacts::default()).unwrap());
        assert!(!run("notnull(param(':nope'))", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_after_before() {
        let facts = RequestFacts::default();
        assert!(run("after('2000-01-01')", &facts).unwrap());
        assert!(!run("before('2000-01-01')", &facts).unwrap());
        assert!(run("before('2999-01-01')", &facts).unwrap());
    }

    #[test]
    fn test_after_accepts_rfc3339() {
        assert!(run("after('2000-01-01T00:00:00Z')", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_age_at_counts_whole_years() {
        let facts = RequestFacts::default();
        assert!(run("ageAt('2000-06-15', '2018-06-15') == 18", &facts).unwrap());
        assert!(run("ageAt('2000-06-15', '2018-06-14') == 17", &facts).unwrap());
    }

    #[test]
    fn test_now_is_comparable() {
        assert!(run("now() > 0", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_random_range() {
        let facts = RequestFacts::default();
        assert!(run("random() >= 0 && random() < 1", &facts).unwrap());
    }

    #[test]
    fn test_round() {
        assert!(run("round(2.4) == 2", &RequestFacts::default()).unwrap());
        assert!(run("round(2.6) == 3", &RequestFacts::default()).unwrap());
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(
            run("bearer()", &RequestFacts::default()),
            Err(EvalError::Arity { func: "bearer", .. })
        ));
        assert!(matches!(
            run("now(1)", &RequestFacts::default()),
            Err(EvalError::Arity { func: "now", .. })
        ));
    }

    #[test]
    fn test_bad_date_is_function_error() {
        assert!(matches!(
            run("after('not-a-date')", &RequestFacts::default()),
            Err(EvalError::Function { func: "after", .. })
        ));
    }
}
