//! Built-in string, array and number methods.

use crate::error::{EvalError, EvalResult};
use crate::interpreter::Interpreter;
use crate::value::{format_number, Value};
use metaform_parser::Span;
use std::cmp::Ordering;

/// Longest string `padStart` will build
pub const MAX_PADDED_LENGTH: usize = 1 << 16;

pub fn call_method(
    interp: &Interpreter,
    receiver: Value,
    method: &str,
    args: Vec<Value>,
    span: Span,
) -> EvalResult<Value> {
    match receiver {
        Value::String(s) => string_method(&s, method, &args, span),
        Value::Array(items) => array_method(interp, items, method, args, span),
        Value::Number(n) => number_method(n, method, &args, span),
        Value::Boolean(b) if method == "toString" => Ok(Value::String(b.to_string())),
        other => Err(unknown(method, &other, span)),
    }
}

fn unknown(method: &str, receiver: &Value, span: Span) -> EvalError {
    EvalError::UnknownMethod {
        method: method.to_string(),
        receiver: receiver.type_name().to_string(),
        span,
    }
}

struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
    span: Span,
}

impl<'a> Args<'a> {
    fn new(method: &'a str, values: &'a [Value], span: Span) -> Self {
        Self { method, values, span }
    }

    fn missing(&self, index: usize) -> EvalError {
        EvalError::ArityMismatch {
            method: self.method.to_string(),
            expected: index + 1,
            found: self.values.len(),
            span: self.span,
        }
    }

    fn string(&self, index: usize) -> EvalResult<String> {
        match self.values.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_display_string()),
            None => Err(self.missing(index)),
        }
    }

    fn number(&self, index: usize) -> EvalResult<f64> {
        match self.values.get(index) {
            Some(Value::Number(n)) => Ok(*n),
            Some(other) => Err(EvalError::type_error(
                format!("{} expects a number, got {}", self.method, other.type_name()),
                self.span,
            )),
            None => Err(self.missing(index)),
        }
    }

    fn optional_number(&self, index: usize) -> EvalResult<Option<f64>> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.number(index).map(Some),
        }
    }

    fn value(&self, index: usize) -> EvalResult<&'a Value> {
        self.values.get(index).ok_or_else(|| self.missing(index))
    }
}

/// Resolve a possibly negative relative index against `len`
fn relative_index(index: f64, len: usize) -> usize {
    let index = index.trunc();
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        (index as usize).min(len)
    }
}

fn slice_bounds(args: &Args<'_>, len: usize) -> EvalResult<(usize, usize)> {
    let start = args
        .optional_number(0)?
        .map(|n| relative_index(n, len))
        .unwrap_or(0);
    let end = args
        .optional_number(1)?
        .map(|n| relative_index(n, len))
        .unwrap_or(len);
    Ok((start, end.max(start)))
}

fn string_method(s: &str, method: &str, values: &[Value], span: Span) -> EvalResult<Value> {
    let args = Args::new(method, values, span);
    let chars: Vec<char> = s.chars().collect();

    let value = match method {
        "trim" => Value::from(s.trim()),
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "toString" => Value::from(s),
        "includes" => Value::Boolean(s.contains(args.string(0)?.as_str())),
        "startsWith" => Value::Boolean(s.starts_with(args.string(0)?.as_str())),
        "endsWith" => Value::Boolean(s.ends_with(args.string(0)?.as_str())),
        "indexOf" => {
            let needle = args.string(0)?;
            Value::Number(
                s.find(needle.as_str())
                    .map(|byte| s[..byte].chars().count() as f64)
                    .unwrap_or(-1.0),
            )
        }
        "split" => {
            let separator = args.string(0)?;
            let parts: Vec<Value> = if separator.is_empty() {
                chars.iter().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str()).map(Value::from).collect()
            };
            Value::Array(parts)
        }
        "replace" => Value::String(s.replacen(args.string(0)?.as_str(), &args.string(1)?, 1)),
        "replaceAll" => Value::String(s.replace(args.string(0)?.as_str(), &args.string(1)?)),
        "slice" => {
            let (start, end) = slice_bounds(&args, chars.len())?;
            Value::String(chars[start..end].iter().collect())
        }
        "substring" => {
            let clamp = |n: f64| (n.trunc().max(0.0) as usize).min(chars.len());
            let start = args.optional_number(0)?.map(clamp).unwrap_or(0);
            let end = args.optional_number(1)?.map(clamp).unwrap_or(chars.len());
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            Value::String(chars[start..end].iter().collect())
        }
        "charAt" => {
            let index = args.optional_number(0)?.unwrap_or(0.0);
            let c = if index >= 0.0 {
                chars.get(index as usize)
            } else {
                None
            };
            Value::String(c.map(|c| c.to_string()).unwrap_or_default())
        }
        "padStart" => {
            let requested = args.number(0)?;
            if requested > MAX_PADDED_LENGTH as f64 {
                return Err(EvalError::type_error(
                    format!("padStart width {} exceeds {}", format_number(requested), MAX_PADDED_LENGTH),
                    span,
                ));
            }
            let width = requested.max(0.0) as usize;
            let fill = match values.get(1) {
                Some(_) => args.string(1)?,
                None => " ".to_string(),
            };
            if chars.len() >= width || fill.is_empty() {
                Value::from(s)
            } else {
                let padding: String = fill.chars().cycle().take(width - chars.len()).collect();
                Value::String(format!("{}{}", padding, s))
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in values {
                out.push_str(&value.to_display_string());
            }
            Value::String(out)
        }
        _ => return Err(unknown(method, &Value::from(s), span)),
    };
    Ok(value)
}

fn number_method(n: f64, method: &str, values: &[Value], span: Span) -> EvalResult<Value> {
    let args = Args::new(method, values, span);
    match method {
        "toFixed" => {
            let digits = args.optional_number(0)?.unwrap_or(0.0).clamp(0.0, 100.0) as usize;
            Ok(Value::String(format!("{:.*}", digits, n)))
        }
        "toString" => Ok(Value::String(format_number(n))),
        _ => Err(unknown(method, &Value::Number(n), span)),
    }
}

fn array_method(
    interp: &Interpreter,
    items: Vec<Value>,
    method: &str,
    values: Vec<Value>,
    span: Span,
) -> EvalResult<Value> {
    let args = Args::new(method, &values, span);

    // Invoke a callback with (item, index)
    let apply = |callback: &Value, item: &Value, index: usize| {
        interp.call_function(
            callback,
            vec![item.clone(), Value::Number(index as f64)],
            span,
        )
    };

    let value = match method {
        "map" => {
            let callback = args.value(0)?;
            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                mapped.push(apply(callback, item, index)?);
            }
            Value::Array(mapped)
        }
        "filter" => {
            let callback = args.value(0)?;
            let mut kept = Vec::new();
            for (index, item) in items.iter().enumerate() {
                if apply(callback, item, index)?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Value::Array(kept)
        }
        "find" | "findIndex" => {
            let callback = args.value(0)?;
            let mut found = None;
            for (index, item) in items.iter().enumerate() {
                if apply(callback, item, index)?.is_truthy() {
                    found = Some(index);
                    break;
                }
            }
            match (method, found) {
                ("find", Some(index)) => items[index].clone(),
                ("find", None) => Value::Null,
                (_, Some(index)) => Value::Number(index as f64),
                (_, None) => Value::Number(-1.0),
            }
        }
        "some" => {
            let callback = args.value(0)?;
            let mut result = false;
            for (index, item) in items.iter().enumerate() {
                if apply(callback, item, index)?.is_truthy() {
                    result = true;
                    break;
                }
            }
            Value::Boolean(result)
        }
        "every" => {
            let callback = args.value(0)?;
            let mut result = true;
            for (index, item) in items.iter().enumerate() {
                if !apply(callback, item, index)?.is_truthy() {
                    result = false;
                    break;
                }
            }
            Value::Boolean(result)
        }
        "reduce" => {
            let callback = args.value(0)?;
            let mut iter = items.iter().enumerate();
            let mut acc = match values.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(EvalError::type_error(
                            "reduce of empty array with no initial value",
                            span,
                        ))
                    }
                },
            };
            for (index, item) in iter {
                acc = interp.call_function(
                    callback,
                    vec![acc, item.clone(), Value::Number(index as f64)],
                    span,
                )?;
            }
            acc
        }
        "includes" => {
            let needle = args.value(0)?;
            Value::Boolean(items.iter().any(|item| item == needle))
        }
        "indexOf" => {
            let needle = args.value(0)?;
            Value::Number(
                items
                    .iter()
                    .position(|item| item == needle)
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        "join" => {
            let separator = match values.first() {
                Some(_) => args.string(0)?,
                None => ",".to_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        other => other.to_display_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            )
        }
        "slice" => {
            let (start, end) = slice_bounds(&args, items.len())?;
            Value::Array(items[start..end].to_vec())
        }
        "concat" => {
            let mut out = items;
            for value in values.iter() {
                match value {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "flat" => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(inner) => out.extend(inner),
                    other => out.push(other),
                }
            }
            Value::Array(out)
        }
        "reverse" => {
            let mut out = items;
            out.reverse();
            Value::Array(out)
        }
        "at" => {
            let index = args.number(0)?.trunc();
            let resolved = if index < 0.0 {
                items.len() as f64 + index
            } else {
                index
            };
            if resolved < 0.0 {
                Value::Null
            } else {
                items.get(resolved as usize).cloned().unwrap_or(Value::Null)
            }
        }
        "sort" => {
            let mut out = items;
            match values.first() {
                None | Some(Value::Null) => {
                    out.sort_by_key(Value::to_display_string);
                }
                Some(comparator) => {
                    let mut failure = None;
                    out.sort_by(|a, b| {
                        if failure.is_some() {
                            return Ordering::Equal;
                        }
                        match interp.call_function(comparator, vec![a.clone(), b.clone()], span) {
                            Ok(Value::Number(n)) if n < 0.0 => Ordering::Less,
                            Ok(Value::Number(n)) if n > 0.0 => Ordering::Greater,
                            Ok(_) => Ordering::Equal,
                            Err(err) => {
                                failure = Some(err);
                                Ordering::Equal
                            }
                        }
                    });
                    if let Some(err) = failure {
                        return Err(err);
                    }
                }
            }
            Value::Array(out)
        }
        "toString" => Value::String(Value::Array(items).to_display_string()),
        _ => return Err(unknown(method, &Value::Array(items), span)),
    };
    Ok(value)
}
