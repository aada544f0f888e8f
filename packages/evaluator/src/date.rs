//! The `date` helper: ISO date arithmetic over `YYYY-MM-DD` strings.

use crate::error::{EvalError, EvalResult};
use crate::value::{DateHelper, Value};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use metaform_parser::Span;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn call(helper: &DateHelper, method: &str, args: &[Value], span: Span) -> EvalResult<Value> {
    match method {
        "today" => Ok(Value::String(helper.today().format(DATE_FORMAT).to_string())),
        "now" => Ok(Value::String(helper.now.format(DATETIME_FORMAT).to_string())),
        "parse" => {
            let moment = moment_arg(method, args, 0, span)?;
            Ok(Value::String(moment.date().format(DATE_FORMAT).to_string()))
        }
        "format" => {
            let moment = moment_arg(method, args, 0, span)?;
            let pattern = match args.get(1) {
                Some(Value::String(pattern)) => pattern.as_str(),
                Some(other) => {
                    return Err(EvalError::type_error(
                        format!("date.format expects a pattern string, got {}", other.type_name()),
                        span,
                    ))
                }
                None => "YYYY-MM-DD",
            };
            Ok(Value::String(moment.format(&to_strftime(pattern)).to_string()))
        }
        "addDays" => {
            let moment = moment_arg(method, args, 0, span)?;
            let days = number_arg(method, args, 1, span)?;
            let offset = days
                .is_finite()
                .then(|| Duration::try_days(days.trunc() as i64))
                .flatten()
                .ok_or_else(|| EvalError::type_error(format!("cannot add {} days", days), span))?;
            let shifted = moment
                .date()
                .checked_add_signed(offset)
                .ok_or_else(|| EvalError::type_error("date out of range", span))?;
            Ok(Value::String(shifted.format(DATE_FORMAT).to_string()))
        }
        "diffDays" => {
            let a = moment_arg(method, args, 0, span)?;
            let b = moment_arg(method, args, 1, span)?;
            Ok(Value::Number((a.date() - b.date()).num_days() as f64))
        }
        _ => Err(EvalError::UnknownMethod {
            method: method.to_string(),
            receiver: "date".to_string(),
            span,
        }),
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD HH:MM:SS`
pub fn parse_moment(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::default()))
        })
}

/// Translate moment-style tokens (`YYYY-MM-DD HH:mm`) to a chrono pattern
pub fn to_strftime(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 12] = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'scan: while let Some(ch) = rest.chars().next() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn moment_arg(method: &str, args: &[Value], index: usize, span: Span) -> EvalResult<NaiveDateTime> {
    match args.get(index) {
        Some(Value::String(text)) => parse_moment(text).ok_or_else(|| {
            EvalError::type_error(format!("date.{}: '{}' is not an ISO date", method, text), span)
        }),
        Some(other) => Err(EvalError::type_error(
            format!("date.{} expects a date string, got {}", method, other.type_name()),
            span,
        )),
        None => Err(EvalError::ArityMismatch {
            method: format!("date.{}", method),
            expected: index + 1,
            found: args.len(),
            span,
        }),
    }
}

fn number_arg(method: &str, args: &[Value], index: usize, span: Span) -> EvalResult<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(EvalError::type_error(
            format!("date.{} expects a number, got {}", method, other.type_name()),
            span,
        )),
        None => Err(EvalError::ArityMismatch {
            method: format!("date.{}", method),
            expected: index + 1,
            found: args.len(),
            span,
        }),
    }
}
