use std::{cmp::Ordering, fmt::Display};

use crate::value::Value;

use super::{scope::SymbolTable, ExecutionErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    And,
    Or,
}

/// Operator groups in the order they are tried when splitting an expression.
const TIERS: [&[InfixOperator]; 4] = [
    &[InfixOperator::Or],
    &[InfixOperator::And],
    &[
        InfixOperator::Equal,
        InfixOperator::NotEqual,
        InfixOperator::LessThan,
        InfixOperator::GreaterThan,
        InfixOperator::LessThanOrEqual,
        InfixOperator::GreaterThanOrEqual,
    ],
    &[
        InfixOperator::Plus,
        InfixOperator::Minus,
        InfixOperator::Multiply,
        InfixOperator::Divide,
    ],
];

impl InfixOperator {
    fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "==" => InfixOperator::Equal,
            "!=" => InfixOperator::NotEqual,
            "<" => InfixOperator::LessThan,
            "<=" => InfixOperator::LessThanOrEqual,
            ">" => InfixOperator::GreaterThan,
            ">=" => InfixOperator::GreaterThanOrEqual,
            "+" => InfixOperator::Plus,
            "-" => InfixOperator::Minus,
            "*" => InfixOperator::Multiply,
            "/" => InfixOperator::Divide,
            "&&" => InfixOperator::And,
            "||" => InfixOperator::Or,
            _ => return None,
        };
        Some(op)
    }

    fn accepts(self, ordering: Option<Ordering>) -> bool {
        let Some(ordering) = ordering else {
            // NaN is unordered against everything.
            return self == InfixOperator::NotEqual;
        };
        match self {
            InfixOperator::Equal => ordering == Ordering::Equal,
            InfixOperator::NotEqual => ordering != Ordering::Equal,
            InfixOperator::LessThan => ordering == Ordering::Less,
            InfixOperator::LessThanOrEqual => ordering != Ordering::Greater,
            InfixOperator::GreaterThan => ordering == Ordering::Greater,
            InfixOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            _ => false,
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            InfixOperator::Equal => "==",
            InfixOperator::NotEqual => "!=",
            InfixOperator::LessThan => "<",
            InfixOperator::LessThanOrEqual => "<=",
            InfixOperator::GreaterThan => ">",
            InfixOperator::GreaterThanOrEqual => ">=",
            InfixOperator::Plus => "+",
            InfixOperator::Minus => "-",
            InfixOperator::Multiply => "*",
            InfixOperator::Divide => "/",
            InfixOperator::And => "&&",
            InfixOperator::Or => "||",
        };
        write!(f, "{symbol}")
    }
}

/// Evaluates a whitespace-tokenized expression.
///
/// Multi-token expressions are split at the first operator (scanning left to
/// right, outside parentheses) of the first tier in [`TIERS`] that has one.
/// Mixed operators of one tier therefore group to the right of the first
/// match: `2 * 3 + 4` is `2 * (3 + 4)`.
pub fn evaluate(tokens: &[&str], symbols: &SymbolTable) -> Result<Value, ExecutionErrorKind> {
    match tokens {
        [] => Err(ExecutionErrorKind::EmptyExpression),
        ["(", inner @ .., ")"] if is_enclosed(tokens) => evaluate(inner, symbols),
        ["!", operand @ ..] => match evaluate(operand, symbols)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            value => Err(ExecutionErrorKind::InvalidNot(value)),
        },
        [token] => Ok(atom(token, symbols)),
        _ => {
            let (index, op) = split_point(tokens)
                .ok_or_else(|| ExecutionErrorKind::UnsupportedExpression(tokens.join(" ")))?;
            tracing::trace!(%op, index, "split expression");
            let lhs = evaluate(&tokens[..index], symbols)?;
            let rhs = evaluate(&tokens[index + 1..], symbols)?;
            binary(lhs, op, rhs)
        }
    }
}

/// Whether the opening parenthesis at the start is closed by the last token.
fn is_enclosed(tokens: &[&str]) -> bool {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match *token {
            "(" => depth += 1,
            ")" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return index == tokens.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn split_point(tokens: &[&str]) -> Option<(usize, InfixOperator)> {
    TIERS.iter().find_map(|tier| {
        let mut depth = 0usize;
        tokens.iter().enumerate().find_map(|(index, token)| {
            match *token {
                "(" => depth += 1,
                ")" => depth = depth.saturating_sub(1),
                _ if depth == 0 => {
                    return InfixOperator::from_token(token)
                        .filter(|op| tier.contains(op))
                        .map(|op| (index, op));
                }
                _ => {}
            }
            None
        })
    })
}

/// Resolves a single token: variable, integer, float, boolean, or else the
/// raw text as a string.
fn atom(token: &str, symbols: &SymbolTable) -> Value {
    if let Some(variable) = symbols.find(token) {
        return variable.value().clone();
    }
    if let Ok(i) = token.parse::<i32>() {
        return Value::Int(i);
    }
    if let Ok(f) = token.parse::<f32>() {
        return Value::Float(f);
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(token.to_string()),
    }
}

fn binary(lhs: Value, op: InfixOperator, rhs: Value) -> Result<Value, ExecutionErrorKind> {
    match op {
        InfixOperator::Or | InfixOperator::And => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == InfixOperator::Or {
                a || b
            } else {
                a && b
            })),
            (a, b) => Err(ExecutionErrorKind::InvalidLogical(op, a, b)),
        },
        InfixOperator::Equal
        | InfixOperator::NotEqual
        | InfixOperator::LessThan
        | InfixOperator::LessThanOrEqual
        | InfixOperator::GreaterThan
        | InfixOperator::GreaterThanOrEqual => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(op.accepts(Some(a.cmp(&b))))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Bool(op.accepts(a.partial_cmp(&b)))),
            (a, b) => Err(ExecutionErrorKind::InvalidComparison(op, a, b)),
        },
        InfixOperator::Plus
        | InfixOperator::Minus
        | InfixOperator::Multiply
        | InfixOperator::Divide => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match op {
                InfixOperator::Plus => Ok(Value::Int(a.wrapping_add(b))),
                InfixOperator::Minus => Ok(Value::Int(a.wrapping_sub(b))),
                InfixOperator::Multiply => Ok(Value::Int(a.wrapping_mul(b))),
                _ if b == 0 => Err(ExecutionErrorKind::DivisionByZero),
                _ => Ok(Value::Int(a.wrapping_div(b))),
            },
            (a, b) => match (a.as_f32(), b.as_f32()) {
                (Some(x), Some(y)) => match op {
                    InfixOperator::Plus => Ok(Value::Float(x + y)),
                    InfixOperator::Minus => Ok(Value::Float(x - y)),
                    InfixOperator::Multiply => Ok(Value::Float(x * y)),
                    _ if y == 0.0 => Err(ExecutionErrorKind::DivisionByZero),
                    _ => Ok(Value::Float(x / y)),
                },
                _ => Err(ExecutionErrorKind::InvalidArithmetic(op, a, b)),
            },
        },
    }
}
