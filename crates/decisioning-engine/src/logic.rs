//! JSON Logic evaluation for rule conditions.
//!
//! A node is an operation when it is an object with exactly one key naming a
//! supported operator. Arrays are evaluated element-wise; every other value,
//! including `{}`, is a literal.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LogicError {
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("invalid arguments for {0}")]
    InvalidArguments(&'static str),
}

pub type LogicResult<T> = Result<T, LogicError>;

const OPERATORS: &[&str] = &[
    "var", "missing", "missing_some", "if", "?:", "==", "===", "!=", "!==", "!", "!!", "and",
    "or", "<", "<=", ">", ">=", "max", "min", "+", "-", "*", "/", "%", "in", "cat", "substr",
    "merge", "map", "filter", "all", "some", "none",
];

/// Evaluate a condition and coerce the result to a boolean.
pub fn matches(condition: &Value, data: &Value) -> LogicResult<bool> {
    evaluate(condition, data).map(|v| is_truthy(&v))
}

pub fn evaluate(expr: &Value, data: &Value) -> LogicResult<Value> {
    match expr {
        Value::Object(map) if map.len() == 1 => {
            let Some((op, args)) = map.iter().next() else {
                return Ok(expr.clone());
            };
            if !OPERATORS.contains(&op.as_str()) {
                return Err(LogicError::UnknownOperator(op.clone()));
            }
            apply(op, &arguments(args), data)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(item, data))
            .collect::<LogicResult<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(expr.clone()),
    }
}

/// JavaScript truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn arguments(args: &Value) -> Vec<Value> {
    match args {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn eval_all(args: &[Value], data: &Value) -> LogicResult<Vec<Value>> {
    args.iter().map(|arg| evaluate(arg, data)).collect()
}

fn apply(op: &str, args: &[Value], data: &Value) -> LogicResult<Value> {
    match op {
        // Lazily evaluated.
        "if" | "?:" => eval_if(args, data),
        "and" => {
            let mut last = Value::Bool(true);
            for arg in args {
                last = evaluate(arg, data)?;
                if !is_truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "or" => {
            let mut last = Value::Bool(false);
            for arg in args {
                last = evaluate(arg, data)?;
                if is_truthy(&last) {
                    break;
                }
            }
            Ok(last)
        }
        "map" | "filter" | "all" | "some" | "none" => eval_array_op(op, args, data),
        _ => {
            let values = eval_all(args, data)?;
            apply_strict(op, &values, data)
        }
    }
}

fn apply_strict(op: &str, values: &[Value], data: &Value) -> LogicResult<Value> {
    let first = values.first().cloned().unwrap_or(Value::Null);
    let second = values.get(1).cloned().unwrap_or(Value::Null);

    let result = match op {
        "var" => var(values, data),
        "missing" => missing(values, data),
        "missing_some" => missing_some(values, data)?,
        "==" => Value::Bool(loose_eq(&first, &second)),
        "!=" => Value::Bool(!loose_eq(&first, &second)),
        "===" => Value::Bool(strict_eq(&first, &second)),
        "!==" => Value::Bool(!strict_eq(&first, &second)),
        "!" => Value::Bool(!is_truthy(&first)),
        "!!" => Value::Bool(is_truthy(&first)),
        "<" | "<=" if values.len() == 3 => {
            let inclusive = op == "<=";
            Value::Bool(
                compare(&values[0], &values[1], inclusive)
                    && compare(&values[1], &values[2], inclusive),
            )
        }
        "<" => Value::Bool(compare(&first, &second, false)),
        "<=" => Value::Bool(compare(&first, &second, true)),
        ">" => Value::Bool(compare(&second, &first, false)),
        ">=" => Value::Bool(compare(&second, &first, true)),
        "max" | "min" => extremum(op, values),
        "+" => number(values.iter().map(to_number).sum()),
        "*" => match values {
            [] => Value::Null,
            _ => number(values.iter().map(to_number).product()),
        },
        "-" => match values {
            [only] => number(-to_number(only)),
            [a, b, ..] => number(to_number(a) - to_number(b)),
            [] => Value::Null,
        },
        "/" => number(to_number(&first) / to_number(&second)),
        "%" => number(to_number(&first) % to_number(&second)),
        "in" => Value::Bool(contains(&first, &second)),
        "cat" => Value::String(values.iter().map(to_display).collect()),
        "substr" => substr(values),
        "merge" => Value::Array(
            values
                .iter()
                .flat_map(|v| match v {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
        ),
        other => return Err(LogicError::UnknownOperator(other.to_string())),
    };
    Ok(result)
}

fn eval_if(args: &[Value], data: &Value) -> LogicResult<Value> {
    let mut i = 0;
    while i + 1 < args.len() {
        if is_truthy(&evaluate(&args[i], data)?) {
            return evaluate(&args[i + 1], data);
        }
        i += 2;
    }
    match args.get(i) {
        Some(otherwise) => evaluate(otherwise, data),
        None => Ok(Value::Null),
    }
}

fn eval_array_op(op: &str, args: &[Value], data: &Value) -> LogicResult<Value> {
    let (Some(source), Some(body)) = (args.first(), args.get(1)) else {
        return Err(LogicError::InvalidArguments("array operation"));
    };
    let items = match evaluate(source, data)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    match op {
        "map" => items
            .iter()
            .map(|item| evaluate(body, item))
            .collect::<LogicResult<Vec<_>>>()
            .map(Value::Array),
        "filter" => {
            let mut kept = Vec::new();
            for item in items {
                if matches(body, &item)? {
                    kept.push(item);
                }
            }
            Ok(Value::Array(kept))
        }
        "all" => {
            if items.is_empty() {
                return Ok(Value::Bool(false));
            }
            for item in &items {
                if !matches(body, item)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "some" | "none" => {
            let mut found = false;
            for item in &items {
                if matches(body, item)? {
                    found = true;
                    break;
                }
            }
            Ok(Value::Bool(if op == "some" { found } else { !found }))
        }
        _ => Err(LogicError::UnknownOperator(op.to_string())),
    }
}

fn var(values: &[Value], data: &Value) -> Value {
    let default = values.get(1).cloned().unwrap_or(Value::Null);
    match values.first() {
        None | Some(Value::Null) => data.clone(),
        Some(Value::String(path)) if path.is_empty() => data.clone(),
        Some(path) => lookup_path(data, &to_display(path)).unwrap_or(default),
    }
}

/// Dotted path lookup; numeric segments index arrays.
pub fn lookup_path(data: &Value, path: &str) -> Option<Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn is_missing(data: &Value, key: &Value) -> bool {
    lookup_path(data, &to_display(key)).map_or(true, |v| v.is_null() || v == "")
}

fn missing(values: &[Value], data: &Value) -> Value {
    let keys: Vec<Value> = match values {
        [Value::Array(keys)] => keys.clone(),
        other => other.to_vec(),
    };
    Value::Array(keys.into_iter().filter(|k| is_missing(data, k)).collect())
}

fn missing_some(values: &[Value], data: &Value) -> LogicResult<Value> {
    let (Some(need), Some(Value::Array(keys))) = (values.first(), values.get(1)) else {
        return Err(LogicError::InvalidArguments("missing_some"));
    };
    let need = to_number(need) as usize;
    let absent: Vec<Value> = keys.iter().filter(|k| is_missing(data, k)).cloned().collect();
    let present = keys.len() - absent.len();
    Ok(if present >= need {
        Value::Array(Vec::new())
    } else {
        Value::Array(absent)
    })
}

fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [only] => to_number(only),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

fn to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(to_display).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => a == b,
        _ => to_number(a) == to_number(b),
    }
}

fn compare(a: &Value, b: &Value, inclusive: bool) -> bool {
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a).partial_cmp(&to_number(b)),
    };
    match ordering {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => inclusive,
        _ => false,
    }
}

fn extremum(op: &str, values: &[Value]) -> Value {
    let numbers: Vec<f64> = values.iter().map(to_number).collect();
    if numbers.is_empty() || numbers.iter().any(|n| n.is_nan()) {
        return Value::Null;
    }
    let pick = if op == "max" { f64::max } else { f64::min };
    number(numbers.into_iter().reduce(pick).unwrap_or(0.0))
}

fn contains(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&to_display(needle)),
        Value::Array(items) => items.iter().any(|item| strict_eq(item, needle)),
        _ => false,
    }
}

fn substr(values: &[Value]) -> Value {
    let source: Vec<char> = values.first().map(to_display).unwrap_or_default().chars().collect();
    let len = source.len() as i64;
    let start = values.get(1).map_or(0.0, to_number) as i64;
    let start = if start < 0 {
        len.saturating_add(start).max(0)
    } else {
        start.min(len)
    };
    let end = match values.get(2) {
        None | Some(Value::Null) => len,
        Some(count) => {
            let count = to_number(count) as i64;
            if count < 0 {
                len.saturating_add(count).max(start)
            } else {
                start.saturating_add(count).min(len)
            }
        }
    };
    Value::String(source[start as usize..end.max(start) as usize].iter().collect())
}
