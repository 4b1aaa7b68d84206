//! Binary operator semantics.

use crate::ast::BinaryOperator;

use super::{EvalError, EvalResult, Value};

pub fn apply(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOperator::Add => eval_add(left, right),
        BinaryOperator::Subtract => eval_subtract(left, right),
        BinaryOperator::Multiply => eval_multiply(left, right),
        BinaryOperator::Divide => eval_divide(left, right),
    }
}

fn mismatch(op: BinaryOperator, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

fn overflow(op: BinaryOperator) -> EvalError {
    EvalError::Overflow { op: op.to_string() }
}

fn eval_add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_add(*r)
            .map(Value::Integer)
            .ok_or_else(|| overflow(BinaryOperator::Add)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(*l as f64 + r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l + *r as f64)),
        (Value::String(l), Value::String(r)) => Ok(Value::String(l.clone() + r)),
        (Value::List(l), Value::List(r)) => Ok(Value::List(l.iter().chain(r).cloned().collect())),
        _ => Err(mismatch(BinaryOperator::Add, left, right)),
    }
}

fn eval_subtract(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_sub(*r)
            .map(Value::Integer)
            .ok_or_else(|| overflow(BinaryOperator::Subtract)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l - r)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(*l as f64 - r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l - *r as f64)),
        _ => Err(mismatch(BinaryOperator::Subtract, left, right)),
    }
}

fn eval_multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => l
            .checked_mul(*r)
            .map(Value::Integer)
            .ok_or_else(|| overflow(BinaryOperator::Multiply)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l * r)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(*l as f64 * r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l * *r as f64)),
        _ => Err(mismatch(BinaryOperator::Multiply, left, right)),
    }
}

fn eval_divide(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => {
            if *r == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(*l as f64 / *r as f64))
        }
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(l / r)),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(*l as f64 / r)),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l / *r as f64)),
        _ => Err(mismatch(BinaryOperator::Divide, left, right)),
    }
}
