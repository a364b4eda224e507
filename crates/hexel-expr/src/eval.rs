//! Tree-walking evaluator.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Expr, ExprKind, PostfixOp, UnaryOp};
use crate::methods;
use crate::value::{Function, Value};
use crate::{EvalError, Scope};

pub(crate) fn evaluate(expr: &Expr, scope: &mut dyn Scope) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::Number(n) => Ok(Value::Number(*n)),
        ExprKind::String(s) => Ok(Value::String(s.clone())),
        ExprKind::Boolean(b) => Ok(Value::Bool(*b)),
        ExprKind::Null => Ok(Value::Null),
        ExprKind::Undefined => Ok(Value::Undefined),
        ExprKind::Identifier(name) => Ok(scope.lookup(name).unwrap_or_default()),
        ExprKind::This => Ok(scope.this_value()),

        ExprKind::Binary { left, op, right } => binary(left, *op, right, scope),

        ExprKind::Unary { op, operand } => {
            let value = evaluate(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Neg => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
                UnaryOp::Typeof => Value::from(value.type_name()),
            })
        }

        ExprKind::Postfix { name, op } => {
            let old = scope.lookup(name).unwrap_or_default().to_number();
            let new = match op {
                PostfixOp::Increment => old + 1.0,
                PostfixOp::Decrement => old - 1.0,
            };
            scope.assign(name, Value::Number(new))?;
            Ok(Value::Number(old))
        }

        ExprKind::Member {
            object, property, optional, ..
        } => {
            let target = evaluate(object, scope)?;
            if *optional && target.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = evaluate(property, scope)?.to_string();
            get_member(&target, &key)
        }

        ExprKind::Call { callee, arguments } => call(callee, arguments, scope),

        ExprKind::Ternary {
            condition,
            consequent,
            alternate,
        } => {
            if evaluate(condition, scope)?.is_truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }

        ExprKind::Object(properties) => {
            let mut map = IndexMap::with_capacity(properties.len());
            for property in properties {
                let value = evaluate(&property.value, scope)?;
                map.insert(property.key.clone(), value);
            }
            Ok(Value::Object(map))
        }

        ExprKind::Array(items) => Ok(Value::Array(evaluate_all(items, scope)?)),

        ExprKind::Assignment { name, op, value } => {
            let rhs = evaluate(value, scope)?;
            let result = match op.binary_op() {
                Some(op) => {
                    let current = scope.lookup(name).unwrap_or_default();
                    apply_binary(op, &current, &rhs)
                }
                None => rhs,
            };
            scope.assign(name, result.clone())?;
            Ok(result)
        }
    }
}

/// Property read. Reading from `null` or `undefined` is a type error.
pub(crate) fn get_member(target: &Value, key: &str) -> Result<Value, EvalError> {
    let value = match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::Type(format!(
                "Cannot read properties of {} (reading '{key}')",
                if matches!(target, Value::Null) { "null" } else { "undefined" }
            )))
        }
        Value::String(s) => match key {
            "length" => Value::from(s.chars().count()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
        },
        Value::Array(items) => match key {
            "length" => Value::from(items.len()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        Value::Object(map) => match map.get(key) {
            Some(value) => value.clone(),
            None if key == "length" => Value::from(map.len()),
            None => Value::Undefined,
        },
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Value::Undefined,
    };
    Ok(value)
}

pub(crate) fn call_function(
    function: &Function,
    args: &[Value],
    scope: &mut dyn Scope,
) -> Result<Value, EvalError> {
    match function {
        Function::Block(index) => scope.call_block(*index, args),
        Function::Native(native) => native(args),
    }
}

fn call(callee: &Expr, arguments: &[Expr], scope: &mut dyn Scope) -> Result<Value, EvalError> {
    let ExprKind::Member {
        object,
        property,
        optional,
        ..
    } = &callee.kind
    else {
        let value = evaluate(callee, scope)?;
        let args = evaluate_all(arguments, scope)?;
        return match value {
            Value::Function(function) => call_function(&function, &args, scope),
            _ => Err(not_a_function(callee)),
        };
    };

    let receiver = evaluate(object, scope)?;
    if receiver.is_nullish() {
        if *optional {
            return Ok(Value::Undefined);
        }
        let key = evaluate(property, scope)?.to_string();
        return get_member(&receiver, &key);
    }

    let key = evaluate(property, scope)?.to_string();
    let args = evaluate_all(arguments, scope)?;

    // Own function-valued properties shadow built-in methods.
    if let Value::Object(map) = &receiver {
        if let Some(Value::Function(function)) = map.get(&key) {
            let function = function.clone();
            return call_function(&function, &args, scope);
        }
    }

    match methods::call_method(&receiver, &key, &args, scope)? {
        Some(result) => Ok(result),
        None => Err(not_a_function(callee)),
    }
}

fn binary(left: &Expr, op: BinaryOp, right: &Expr, scope: &mut dyn Scope) -> Result<Value, EvalError> {
    let lhs = evaluate(left, scope)?;

    match op {
        BinaryOp::And if !lhs.is_truthy() => return Ok(lhs),
        BinaryOp::Or if lhs.is_truthy() => return Ok(lhs),
        BinaryOp::NullishCoalescing if !lhs.is_nullish() => return Ok(lhs),
        BinaryOp::And | BinaryOp::Or | BinaryOp::NullishCoalescing => {
            return evaluate(right, scope)
        }
        _ => {}
    }

    let rhs = evaluate(right, scope)?;
    Ok(apply_binary(op, &lhs, &rhs))
}

/// Apply a non-short-circuiting binary operator.
pub(crate) fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_textual(lhs) || is_textual(rhs) {
                Value::String(format!("{}{}", concat_text(lhs), concat_text(rhs)))
            } else {
                Value::Number(lhs.to_number() + rhs.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Mod => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
        BinaryOp::Neq => Value::Bool(!lhs.loose_equals(rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        BinaryOp::StrictNeq => Value::Bool(!lhs.strict_equals(rhs)),
        BinaryOp::Lt => Value::Bool(compare(lhs, rhs) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(lhs, rhs) == Some(Ordering::Greater)),
        BinaryOp::Lte => Value::Bool(matches!(
            compare(lhs, rhs),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gte => Value::Bool(matches!(
            compare(lhs, rhs),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        // Short-circuit operators never reach here with both operands; fall
        // back to their value semantics.
        BinaryOp::And => if lhs.is_truthy() { rhs.clone() } else { lhs.clone() },
        BinaryOp::Or => if lhs.is_truthy() { lhs.clone() } else { rhs.clone() },
        BinaryOp::NullishCoalescing => {
            if lhs.is_nullish() {
                rhs.clone()
            } else {
                lhs.clone()
            }
        }
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

/// String form used by `+` concatenation, where `null` is not empty.
fn concat_text(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}

fn evaluate_all(exprs: &[Expr], scope: &mut dyn Scope) -> Result<Vec<Value>, EvalError> {
    exprs.iter().map(|expr| evaluate(expr, scope)).collect()
}

fn not_a_function(callee: &Expr) -> EvalError {
    EvalError::Type(format!("{} is not a function", describe(callee)))
}

/// Short source-like rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::This => "this".into(),
        ExprKind::Member {
            object,
            property,
            computed: false,
            ..
        } => match &property.kind {
            ExprKind::String(name) => format!("{}.{name}", describe(object)),
            _ => "expression".into(),
        },
        _ => "expression".into(),
    }
}
