use crate::builtins;
use crate::date;
use crate::error::{EvalError, EvalResult};
use crate::scope::Scope;
use crate::value::{Closure, Value};
use indexmap::IndexMap;
use metaform_parser::{BinaryOp, Expression, Span, TemplatePart, UnaryOp};
use metaform_template::ContextName;
use std::collections::HashMap;
use std::sync::Arc;

/// Tree-walking interpreter over a parsed expression
#[derive(Debug, Default, Clone, Copy)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, expr: &Expression, scope: &Arc<Scope>) -> EvalResult<Value> {
        match expr {
            Expression::String { value, .. } => Ok(Value::String(value.clone())),

            Expression::Number { value, .. } => Ok(Value::Number(*value)),

            Expression::Boolean { value, .. } => Ok(Value::Boolean(*value)),

            Expression::Null { .. } => Ok(Value::Null),

            Expression::Identifier { name, span } => self.lookup(name, *span, scope),

            Expression::Array { elements, .. } => elements
                .iter()
                .map(|element| self.evaluate(element, scope))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array),

            Expression::Object { properties, .. } => {
                let mut map = IndexMap::with_capacity(properties.len());
                for (key, value) in properties {
                    map.insert(key.clone(), self.evaluate(value, scope)?);
                }
                Ok(Value::Object(map))
            }

            Expression::Template { parts, .. } => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => result.push_str(s),
                        TemplatePart::Expression(expr) => {
                            result.push_str(&self.evaluate(expr, scope)?.to_display_string());
                        }
                    }
                }
                Ok(Value::String(result))
            }

            Expression::Member { .. } | Expression::Index { .. } | Expression::Call { .. } => {
                Ok(self.evaluate_chain(expr, scope)?.unwrap_or(Value::Null))
            }

            Expression::Unary {
                operator,
                operand,
                span,
            } => {
                let value = self.evaluate(operand, scope)?;
                match operator {
                    UnaryOp::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOp::Negate => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(EvalError::InvalidOperands {
                            operator: "-".to_string(),
                            details: format!("Expected number, got {}", other.type_name()),
                            span: *span,
                        }),
                    },
                    UnaryOp::Plus => value.to_number().map(Value::Number).ok_or_else(|| {
                        EvalError::InvalidOperands {
                            operator: "+".to_string(),
                            details: format!("Cannot convert {} to number", value.type_name()),
                            span: *span,
                        }
                    }),
                }
            }

            Expression::Binary {
                left,
                operator,
                right,
                span,
            } => self.evaluate_binary(left, *operator, right, *span, scope),

            Expression::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.evaluate(test, scope)?.is_truthy() {
                    self.evaluate(consequent, scope)
                } else {
                    self.evaluate(alternate, scope)
                }
            }

            Expression::Arrow { params, body, .. } => Ok(Value::Function(Arc::new(Closure {
                params: params.clone(),
                body: (**body).clone(),
                scope: Arc::clone(scope),
            }))),
        }
    }

    /// Invoke a function value; missing arguments are `null`, extras ignored
    pub fn call_function(&self, callee: &Value, args: Vec<Value>, span: Span) -> EvalResult<Value> {
        match callee {
            Value::Function(closure) => {
                let mut args = args.into_iter();
                let bindings: HashMap<String, Value> = closure
                    .params
                    .iter()
                    .map(|param| (param.clone(), args.next().unwrap_or(Value::Null)))
                    .collect();
                let scope = Scope::child(&closure.scope, bindings);
                self.evaluate(&closure.body, &scope)
            }
            other => Err(EvalError::NotCallable {
                type_name: other.type_name().to_string(),
                span,
            }),
        }
    }

    fn lookup(&self, name: &str, span: Span, scope: &Arc<Scope>) -> EvalResult<Value> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value.clone());
        }
        if ContextName::from_name(name).is_some() {
            Err(EvalError::MissingContextBinding {
                name: name.to_string(),
                span,
            })
        } else {
            Err(EvalError::UnboundIdentifier {
                name: name.to_string(),
                span,
            })
        }
    }

    /// Evaluate a member/index/call chain; `None` means an optional link
    /// short-circuited the rest of the chain
    fn evaluate_chain(&self, expr: &Expression, scope: &Arc<Scope>) -> EvalResult<Option<Value>> {
        match expr {
            Expression::Member {
                object,
                property,
                optional,
                span,
            } => {
                let Some(target) = self.evaluate_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_null() {
                    return Ok(None);
                }
                get_property(&target, property, *span).map(Some)
            }

            Expression::Index {
                object,
                index,
                optional,
                span,
            } => {
                let Some(target) = self.evaluate_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_null() {
                    return Ok(None);
                }
                let key = self.evaluate(index, scope)?;
                get_index(&target, &key, *span).map(Some)
            }

            Expression::Call {
                callee,
                arguments,
                optional,
                span,
            } => {
                // Method call: the receiver decides how `property` is dispatched
                if let Expression::Member {
                    object,
                    property,
                    optional: optional_member,
                    ..
                } = callee.as_ref()
                {
                    let Some(receiver) = self.evaluate_chain(object, scope)? else {
                        return Ok(None);
                    };
                    if (*optional_member || *optional) && receiver.is_null() {
                        return Ok(None);
                    }
                    let args = self.evaluate_arguments(arguments, scope)?;
                    return self.call_method(receiver, property, args, *span).map(Some);
                }

                let Some(function) = self.evaluate_chain(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_null() {
                    return Ok(None);
                }
                let args = self.evaluate_arguments(arguments, scope)?;
                self.call_function(&function, args, *span).map(Some)
            }

            other => self.evaluate(other, scope).map(Some),
        }
    }

    fn evaluate_arguments(&self, arguments: &[Expression], scope: &Arc<Scope>) -> EvalResult<Vec<Value>> {
        arguments
            .iter()
            .map(|argument| self.evaluate(argument, scope))
            .collect()
    }

    fn call_method(&self, receiver: Value, method: &str, args: Vec<Value>, span: Span) -> EvalResult<Value> {
        match receiver {
            Value::Date(helper) => date::call(&helper, method, &args, span),
            Value::Object(ref map) => match map.get(method) {
                Some(function @ Value::Function(_)) => self.call_function(function, args, span),
                Some(other) => Err(EvalError::NotCallable {
                    type_name: other.type_name().to_string(),
                    span,
                }),
                None => Err(EvalError::UnknownMethod {
                    method: method.to_string(),
                    receiver: "object".to_string(),
                    span,
                }),
            },
            Value::Null => Err(EvalError::type_error(
                format!("Cannot call '{}' on null", method),
                span,
            )),
            other => builtins::call_method(self, other, method, args, span),
        }
    }

    fn evaluate_binary(
        &self,
        left: &Expression,
        operator: BinaryOp,
        right: &Expression,
        span: Span,
        scope: &Arc<Scope>,
    ) -> EvalResult<Value> {
        let left_val = self.evaluate(left, scope)?;

        // Short-circuiting operators return one of their operands
        match operator {
            BinaryOp::And => {
                return if left_val.is_truthy() {
                    self.evaluate(right, scope)
                } else {
                    Ok(left_val)
                }
            }
            BinaryOp::Or => {
                return if left_val.is_truthy() {
                    Ok(left_val)
                } else {
                    self.evaluate(right, scope)
                }
            }
            BinaryOp::Coalesce => {
                return if left_val.is_null() {
                    self.evaluate(right, scope)
                } else {
                    Ok(left_val)
                }
            }
            _ => {}
        }

        let right_val = self.evaluate(right, scope)?;
        let invalid = |expected: &str| EvalError::InvalidOperands {
            operator: operator.symbol().to_string(),
            details: format!(
                "Expected {}, got {} {} {}",
                expected,
                left_val.type_name(),
                operator.symbol(),
                right_val.type_name()
            ),
            span,
        };

        match operator {
            BinaryOp::Add => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
                    "{}{}",
                    left_val.to_display_string(),
                    right_val.to_display_string()
                ))),
                _ => Err(invalid("number + number or a string operand")),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => {
                let (Value::Number(a), Value::Number(b)) = (&left_val, &right_val) else {
                    return Err(invalid("numbers"));
                };
                match operator {
                    BinaryOp::Subtract => Ok(Value::Number(a - b)),
                    BinaryOp::Multiply => Ok(Value::Number(a * b)),
                    _ if *b == 0.0 => Err(EvalError::DivisionByZero { span }),
                    BinaryOp::Divide => Ok(Value::Number(a / b)),
                    _ => Ok(Value::Number(a % b)),
                }
            }
            BinaryOp::Equals => Ok(Value::Boolean(left_val == right_val)),
            BinaryOp::NotEquals => Ok(Value::Boolean(left_val != right_val)),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ordering = match (&left_val, &right_val) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => return Err(invalid("two numbers or two strings")),
                };
                let Some(ordering) = ordering else {
                    return Ok(Value::Boolean(false));
                };
                Ok(Value::Boolean(match operator {
                    BinaryOp::LessThan => ordering.is_lt(),
                    BinaryOp::LessThanOrEqual => ordering.is_le(),
                    BinaryOp::GreaterThan => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::And => Ok(if left_val.is_truthy() { right_val.clone() } else { left_val.clone() }),
            BinaryOp::Or => Ok(if left_val.is_truthy() { left_val.clone() } else { right_val.clone() }),
            BinaryOp::Coalesce => Ok(if left_val.is_null() { right_val.clone() } else { left_val.clone() }),
        }
    }
}

fn get_property(target: &Value, property: &str, span: Span) -> EvalResult<Value> {
    match target {
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::Number(items.len() as f64)),
        Value::String(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::Null => Err(EvalError::type_error(
            format!("Cannot read property '{}' of null", property),
            span,
        )),
        _ => Ok(Value::Null),
    }
}

fn get_index(target: &Value, key: &Value, span: Span) -> EvalResult<Value> {
    match (target, key) {
        (Value::Array(items), Value::Number(n)) => Ok(usize_index(*n)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => Ok(usize_index(*n)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (Value::Null, _) => Err(EvalError::type_error(
            format!("Cannot read index '{}' of null", key.to_display_string()),
            span,
        )),
        (_, Value::String(property)) => get_property(target, property, span),
        (Value::Object(map), other) => Ok(map
            .get(&other.to_display_string())
            .cloned()
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn usize_index(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 {
        Some(n as usize)
    } else {
        None
    }
}
