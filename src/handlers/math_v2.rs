//! The newer integer expression evaluator.
//!
//! Expressions split on the rightmost operator (longest symbols first), so
//! no parentheses exist. Assignment is `value -> name`, literals may carry
//! a radix prefix (`0x`, `0d`, `0o`, `0q`, `0b`), and all arithmetic is
//! checked rather than silently wrapping.

use crate::error::HandlerResult;
use crate::network::LineClient;
use crate::session::{Handler, Next, STOP_WORDS};
use crate::timeout::{TimeoutError, run_with_timeout};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const OPERATION_LIMIT: Duration = Duration::from_secs(5);
const OPERATION_POLL: Duration = Duration::from_millis(100);

const ASSIGNMENT: &str = "->";

/// Operators in split priority: all two-character symbols first.
const OPERATOR_ORDER: &[&str] = &[
    "->", "&&", "||", "**", ">>", "<<", "==", "!=", ">=", "<=", "+", "-", "*", "/", "%", "&", "|",
    "^", ">", "<",
];

/// Errors surfaced to the evaluation prompt, rendered like exception lines.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("NameError: {0}")]
    Name(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ValueError: {0}")]
    Value(String),
    #[error("ZeroDivisionError: integer division or modulo by zero")]
    ZeroDivision,
    #[error("OverflowError: result out of range")]
    Overflow,
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Constant(i64),
    Variable(String),
    Operation(Box<Expr>, &'static str, Box<Expr>),
}

/// REPL handler for the new engine.
pub struct MathEvaluator {
    client: Arc<LineClient>,
}

impl MathEvaluator {
    pub fn new(client: Arc<LineClient>) -> Self {
        Self { client }
    }

    async fn evaluate_source(
        &self,
        source: &str,
        bindings: &mut HashMap<String, i64>,
    ) -> HandlerResult<()> {
        for expression in expressions(source) {
            let outcome = async {
                let tree = parse(&expression)?;
                let value = evaluate(&tree, bindings).await?;
                let print = !matches!(&tree, Expr::Operation(_, symbol, _) if *symbol == ASSIGNMENT);
                Ok::<_, EvalError>((value, print))
            }
            .await;
            match outcome {
                Ok((value, print)) => {
                    if print {
                        self.client.print(&value.to_string()).await?;
                    }
                    bindings.insert("_".to_string(), value);
                }
                Err(error) => return self.client.print(&error.to_string()).await,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for MathEvaluator {
    async fn handle(&mut self) -> HandlerResult<Next> {
        let mut bindings: HashMap<String, i64> = HashMap::new();
        loop {
            let line = self.client.input(Some(">>> ")).await?;
            if STOP_WORDS.contains(&line.as_str()) {
                return Ok(None);
            }
            self.evaluate_source(&line, &mut bindings).await?;
        }
    }
}

/// Strip comments and yield one expression per `;`-separated chunk.
fn expressions(source: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in source.replace("\r\n", "\n").replace('\r', "\n").split('\n') {
        let uncommented = line.split('#').next().unwrap_or("");
        if uncommented.trim().is_empty() {
            continue;
        }
        for expression in uncommented.split(';') {
            found.push(expression.to_string());
        }
    }
    found
}

fn parse(expression: &str) -> Result<Expr, EvalError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(EvalError::Syntax("empty expression".to_string()));
    }
    if let Some((left, symbol, right)) = split(expression) {
        return Ok(Expr::Operation(
            Box::new(parse(&left)?),
            symbol,
            Box::new(parse(&right)?),
        ));
    }
    if expression.split_whitespace().count() > 1 {
        return Err(EvalError::Syntax(expression.to_string()));
    }
    for (prefix, radix) in [("0x", 16), ("0d", 10), ("0o", 8), ("0q", 4), ("0b", 2)] {
        if let Some(digits) = expression.strip_prefix(prefix) {
            return i64::from_str_radix(digits, radix).map(Expr::Constant).map_err(|_| {
                EvalError::Value(format!(
                    "invalid literal for int with base {radix}: '{digits}'"
                ))
            });
        }
    }
    if expression.chars().all(|c| c.is_ascii_digit()) {
        return expression
            .parse::<i64>()
            .map(Expr::Constant)
            .map_err(|_| EvalError::Overflow);
    }
    if is_identifier(expression) {
        return Ok(Expr::Variable(expression.to_string()));
    }
    Err(EvalError::Syntax(expression.to_string()))
}

/// Split on the rightmost occurrence of the highest-priority symbol whose
/// right side contains no further symbol.
fn split(expression: &str) -> Option<(String, &'static str, String)> {
    let (symbol, right) = split_tail(expression)?;
    let left_len = expression.len() - symbol.len() - right.len();
    Some((expression[..left_len].to_string(), symbol, right))
}

fn split_tail(expression: &str) -> Option<(&'static str, String)> {
    for symbol in OPERATOR_ORDER {
        if let Some(position) = expression.rfind(symbol) {
            let right = expression[position + symbol.len()..].to_string();
            return match split_tail(&right) {
                None => Some((symbol, right)),
                tail => tail,
            };
        }
    }
    None
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn evaluate<'a>(
    expr: &'a Expr,
    bindings: &'a mut HashMap<String, i64>,
) -> std::pin::Pin<Box<dyn Future<Output = Result<i64, EvalError>> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::Constant(value) => Ok(*value),
            Expr::Variable(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::Name(name.clone())),
            Expr::Operation(left, symbol, right) => {
                if *symbol == ASSIGNMENT {
                    let Expr::Variable(name) = right.as_ref() else {
                        return Err(EvalError::Type(
                            "assignment target must be a variable".to_string(),
                        ));
                    };
                    let value = evaluate(left, bindings).await?;
                    bindings.insert(name.clone(), value);
                    return Ok(value);
                }
                let a = evaluate(left, bindings).await?;
                let b = evaluate(right, bindings).await?;
                let symbol = *symbol;
                run_with_timeout(OPERATION_LIMIT, OPERATION_POLL, move || {
                    run_operation(symbol, a, b)
                })
                .await?
            }
        }
    })
}

fn run_operation(symbol: &str, a: i64, b: i64) -> Result<i64, EvalError> {
    match symbol {
        "&&" | "&" => Ok(a & b),
        "||" | "|" => Ok(a | b),
        "^" => Ok(a ^ b),
        "+" => a.checked_add(b).ok_or(EvalError::Overflow),
        "-" => a.checked_sub(b).ok_or(EvalError::Overflow),
        "*" => a.checked_mul(b).ok_or(EvalError::Overflow),
        "/" => floor_div(a, b),
        "%" => floor_rem(a, b),
        "**" => {
            if b < 0 {
                Err(EvalError::Value("negative exponent".to_string()))
            } else {
                let exponent = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
                a.checked_pow(exponent).ok_or(EvalError::Overflow)
            }
        }
        ">>" => {
            let shift = shift_count(b)?;
            a.checked_shr(shift).ok_or(EvalError::Overflow)
        }
        "<<" => {
            let shift = shift_count(b)?;
            a.checked_shl(shift).ok_or(EvalError::Overflow)
        }
        "==" => Ok((a == b) as i64),
        "!=" => Ok((a != b) as i64),
        ">" => Ok((a > b) as i64),
        ">=" => Ok((a >= b) as i64),
        "<" => Ok((a < b) as i64),
        "<=" => Ok((a <= b) as i64),
        other => Err(EvalError::Syntax(other.to_string())),
    }
}

/// Division rounding toward negative infinity, like the original engine.
fn floor_div(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let quotient = a.checked_div(b).ok_or(EvalError::Overflow)?;
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn floor_rem(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let remainder = a.checked_rem(b).ok_or(EvalError::Overflow)?;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        Ok(remainder + b)
    } else {
        Ok(remainder)
    }
}

fn shift_count(b: i64) -> Result<u32, EvalError> {
    if b < 0 {
        Err(EvalError::Value("negative shift count".to_string()))
    } else {
        u32::try_from(b).map_err(|_| EvalError::Overflow)
    }
}
