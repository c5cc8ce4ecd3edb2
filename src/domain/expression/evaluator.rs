//! Expression evaluation over JSON contexts
//!
//! Evaluation is pure and per-invocation. A missing field produces "no
//! value" rather than an error; absence propagates through navigation and
//! is dropped by constructors, matching JSONata sequence semantics. Only
//! malformed expressions and type misuse (e.g. arithmetic on strings)
//! produce errors.

use serde_json::{Map, Value};

use super::parser::{number_value, parse, BinOp, Expr};
use super::schema::validate_schema;
use crate::domain::DomainError;

/// Result of `evaluate_with_schema`
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Evaluate an expression against a context value.
///
/// `evaluate("$", ctx)` returns the context unchanged. Missing fields
/// resolve to `Value::Null` at the top level.
pub fn evaluate(expr: &str, ctx: &Value) -> Result<Value, DomainError> {
    let tree = parse(expr)?;
    Ok(eval(&tree, ctx)?.unwrap_or(Value::Null))
}

/// Evaluate an expression, then validate the result against an optional
/// JSON schema.
///
/// Evaluation failures and validation failures are both reported as
/// `success = false`; the diagnostic distinguishes them. On validation
/// failure the evaluated data is still returned.
pub fn evaluate_with_schema(expr: &str, ctx: &Value, schema: Option<&Value>) -> EvalOutcome {
    let data = match evaluate(expr, ctx) {
        Ok(v) => v,
        Err(e) => {
            return EvalOutcome {
                success: false,
                data: None,
                error: Some(format!("evaluation failed: {}", e)),
            };
        }
    };

    if let Some(schema) = schema {
        if let Err(e) = validate_schema(&data, schema) {
            return EvalOutcome {
                success: false,
                data: Some(data),
                error: Some(format!("validation failed: {}", e)),
            };
        }
    }

    EvalOutcome {
        success: true,
        data: Some(data),
        error: None,
    }
}

fn eval(expr: &Expr, ctx: &Value) -> Result<Option<Value>, DomainError> {
    match expr {
        Expr::Context => Ok(Some(ctx.clone())),
        Expr::Literal(v) => Ok(Some(v.clone())),
        Expr::Field(name) => Ok(navigate(ctx, name)),
        Expr::Nav(base, name) => match eval(base, ctx)? {
            Some(v) => Ok(navigate(&v, name)),
            None => Ok(None),
        },
        Expr::Project(base, body) => match eval(base, ctx)? {
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    if let Some(v) = eval(body, item)? {
                        out.push(v);
                    }
                }
                Ok(Some(Value::Array(out)))
            }
            Some(v) => eval(body, &v),
            None => Ok(None),
        },
        Expr::Index(base, idx) => {
            let base = match eval(base, ctx)? {
                Some(v) => v,
                None => return Ok(None),
            };
            let idx = eval_integer(idx, ctx, "array index")?;

            match base {
                Value::Array(items) => {
                    let len = items.len() as i64;
                    let pos = if idx < 0 { len + idx } else { idx };
                    if pos < 0 || pos >= len {
                        Ok(None)
                    } else {
                        Ok(Some(items[pos as usize].clone()))
                    }
                }
                // A non-array value acts as a singleton sequence
                v if idx == 0 || idx == -1 => Ok(Some(v)),
                _ => Ok(None),
            }
        }
        Expr::Slice(base, from, to) => {
            let base = match eval(base, ctx)? {
                Some(v) => v,
                None => return Ok(None),
            };
            let from = eval_integer(from, ctx, "range start")?;
            let to = eval_integer(to, ctx, "range end")?;

            match base {
                Value::Array(items) => {
                    let len = items.len() as i64;
                    let start = (if from < 0 { len + from } else { from }).max(0);
                    let end = (if to < 0 { len + to } else { to }).min(len - 1);
                    if start > end {
                        return Ok(Some(Value::Array(Vec::new())));
                    }
                    // The range operator is inclusive of both endpoints.
                    Ok(Some(Value::Array(
                        items[start as usize..=end as usize].to_vec(),
                    )))
                }
                _ => Ok(None),
            }
        }
        Expr::Call(name, args) => eval_call(name, args, ctx),
        Expr::Object(fields) => {
            let mut map = Map::new();
            for (key, value_expr) in fields {
                // Absent values omit the key entirely
                if let Some(v) = eval(value_expr, ctx)? {
                    map.insert(key.clone(), v);
                }
            }
            Ok(Some(Value::Object(map)))
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = eval(item, ctx)? {
                    out.push(v);
                }
            }
            Ok(Some(Value::Array(out)))
        }
        Expr::Neg(operand) => match eval(operand, ctx)? {
            Some(v) => {
                let n = as_number(&v, "unary minus")?;
                Ok(Some(number_value(-n)))
            }
            None => Ok(None),
        },
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
        Expr::Ternary(cond, then, els) => {
            let cond = eval(cond, ctx)?;
            if truthy(cond.as_ref()) {
                eval(then, ctx)
            } else {
                eval(els, ctx)
            }
        }
    }
}

/// Resolve a field name against a value.
///
/// Navigation into an array maps over its elements, dropping misses and
/// flattening one level of nested arrays.
fn navigate(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(name).cloned(),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                match navigate(item, name) {
                    Some(Value::Array(nested)) => out.extend(nested),
                    Some(v) => out.push(v),
                    None => {}
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(Value::Array(out))
            }
        }
        _ => None,
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &Value) -> Result<Option<Value>, DomainError> {
    let arity = |expected: usize| -> Result<(), DomainError> {
        if args.len() != expected {
            Err(DomainError::expression(format!(
                "${} expects {} argument(s), got {}",
                name,
                expected,
                args.len()
            )))
        } else {
            Ok(())
        }
    };

    match name {
        "keys" => {
            arity(1)?;
            match eval(&args[0], ctx)? {
                Some(Value::Object(map)) => Ok(Some(Value::Array(
                    map.keys().map(|k| Value::String(k.clone())).collect(),
                ))),
                Some(Value::Array(items)) => {
                    // Union of member keys, first-seen order
                    let mut seen = Vec::new();
                    for item in items {
                        if let Value::Object(map) = item {
                            for key in map.keys() {
                                if !seen.contains(key) {
                                    seen.push(key.clone());
                                }
                            }
                        }
                    }
                    Ok(Some(Value::Array(seen.into_iter().map(Value::String).collect())))
                }
                Some(_) => Ok(None),
                None => Ok(None),
            }
        }
        "count" => {
            arity(1)?;
            let n = match eval(&args[0], ctx)? {
                None => 0,
                Some(Value::Array(items)) => items.len(),
                Some(_) => 1,
            };
            Ok(Some(Value::from(n)))
        }
        "sum" | "min" | "max" => {
            arity(1)?;
            let items = match eval(&args[0], ctx)? {
                None => return Ok(None),
                Some(Value::Array(items)) => items,
                Some(single) => vec![single],
            };
            let mut numbers = Vec::with_capacity(items.len());
            for item in &items {
                numbers.push(as_number(item, name)?);
            }
            if numbers.is_empty() {
                return match name {
                    "sum" => Ok(Some(Value::from(0))),
                    _ => Ok(None),
                };
            }
            let result = match name {
                "sum" => numbers.iter().sum(),
                "min" => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
                _ => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            };
            Ok(Some(number_value(result)))
        }
        "string" => {
            arity(1)?;
            Ok(eval(&args[0], ctx)?.map(|v| Value::String(stringify(&v))))
        }
        "number" => {
            arity(1)?;
            match eval(&args[0], ctx)? {
                None => Ok(None),
                Some(Value::Number(n)) => Ok(Some(Value::Number(n))),
                Some(Value::String(s)) => {
                    let n = s.trim().parse::<f64>().map_err(|_| {
                        DomainError::expression(format!("$number: '{}' is not a number", s))
                    })?;
                    Ok(Some(number_value(n)))
                }
                Some(Value::Bool(b)) => Ok(Some(Value::from(if b { 1 } else { 0 }))),
                Some(other) => Err(DomainError::expression(format!(
                    "$number: cannot convert {}",
                    type_name(&other)
                ))),
            }
        }
        "boolean" => {
            arity(1)?;
            let v = eval(&args[0], ctx)?;
            Ok(Some(Value::Bool(truthy(v.as_ref()))))
        }
        "not" => {
            arity(1)?;
            let v = eval(&args[0], ctx)?;
            Ok(Some(Value::Bool(!truthy(v.as_ref()))))
        }
        "exists" => {
            arity(1)?;
            Ok(Some(Value::Bool(eval(&args[0], ctx)?.is_some())))
        }
        other => Err(DomainError::expression(format!(
            "unknown function ${}",
            other
        ))),
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &Value,
) -> Result<Option<Value>, DomainError> {
    // Boolean operators treat absence as false and short-circuit
    if op == BinOp::And {
        if !truthy(eval(lhs, ctx)?.as_ref()) {
            return Ok(Some(Value::Bool(false)));
        }
        return Ok(Some(Value::Bool(truthy(eval(rhs, ctx)?.as_ref()))));
    }
    if op == BinOp::Or {
        if truthy(eval(lhs, ctx)?.as_ref()) {
            return Ok(Some(Value::Bool(true)));
        }
        return Ok(Some(Value::Bool(truthy(eval(rhs, ctx)?.as_ref()))));
    }

    let lv = eval(lhs, ctx)?;
    let rv = eval(rhs, ctx)?;

    if op == BinOp::Concat {
        // Concatenation treats absence as the empty string
        let l = lv.as_ref().map(stringify).unwrap_or_default();
        let r = rv.as_ref().map(stringify).unwrap_or_default();
        return Ok(Some(Value::String(format!("{}{}", l, r))));
    }

    // Remaining operators propagate absence
    let (lv, rv) = match (lv, rv) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(None),
    };

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            let l = as_number(&lv, "arithmetic")?;
            let r = as_number(&rv, "arithmetic")?;
            let result = match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => {
                    if r == 0.0 {
                        return Err(DomainError::expression("division by zero"));
                    }
                    l / r
                }
                _ => {
                    if r == 0.0 {
                        return Err(DomainError::expression("division by zero"));
                    }
                    l % r
                }
            };
            Ok(Some(number_value(result)))
        }
        BinOp::Eq => Ok(Some(Value::Bool(values_equal(&lv, &rv)))),
        BinOp::Ne => Ok(Some(Value::Bool(!values_equal(&lv, &rv)))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(&lv, &rv)?;
            let result = match op {
                BinOp::Lt => ordering == std::cmp::Ordering::Less,
                BinOp::Le => ordering != std::cmp::Ordering::Greater,
                BinOp::Gt => ordering == std::cmp::Ordering::Greater,
                _ => ordering != std::cmp::Ordering::Less,
            };
            Ok(Some(Value::Bool(result)))
        }
        BinOp::And | BinOp::Or | BinOp::Concat => unreachable!("handled above"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().unwrap_or(f64::NAN) == b.as_f64().unwrap_or(f64::NAN)
        }
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, DomainError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b)
                .ok_or_else(|| DomainError::expression("cannot compare NaN"))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(DomainError::expression(format!(
            "cannot compare {} with {}",
            type_name(l),
            type_name(r)
        ))),
    }
}

fn as_number(v: &Value, what: &str) -> Result<f64, DomainError> {
    v.as_f64().ok_or_else(|| {
        DomainError::expression(format!("{}: expected a number, got {}", what, type_name(v)))
    })
}

fn eval_integer(expr: &Expr, ctx: &Value, what: &str) -> Result<i64, DomainError> {
    match eval(expr, ctx)? {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
            .ok_or_else(|| DomainError::expression(format!("{} must be an integer", what))),
        other => Err(DomainError::expression(format!(
            "{} must be a number, got {}",
            what,
            other.as_ref().map(type_name).unwrap_or("no value")
        ))),
    }
}

/// Boolean coercion: false, null, 0, "", empty array/object and absence
/// are all false.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
