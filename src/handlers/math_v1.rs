//! The original float expression evaluator.
//!
//! Every token must be surrounded by whitespace. `;` separates statements,
//! `#` starts a comment line, `=` assigns (and chains), and a bare
//! expression prints its value. Each arithmetic operation runs through the
//! polling timeout worker.

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

const OPERATORS: &[&str] = &[
    "=", "+", "-", "*", "/", "//", "%", "**", "^", "and", "&", "or", "|", "==", "!=", ">", "<",
    ">=", "<=",
];

/// Errors surfaced to the evaluation prompt.
#[derive(Debug, Error, PartialEq)]
pub enum MathError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    #[error("Must Have Single Token")]
    MultiTokenTarget,
    #[error("Must Assign to Variable")]
    AssignTarget,
    #[error("Must Have Odd Number of Tokens")]
    EvenTokens,
    #[error("Must Have Constant or Variable")]
    ExpectedOperand,
    #[error("Must Have Operation")]
    ExpectedOperator,
    #[error("float division by zero")]
    DivisionByZero,
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Op(&'static str),
    Constant(f64),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Constant(f64),
    Variable(String),
    Operation(Box<Expr>, &'static str, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    /// Chained assignment; targets apply right to left.
    Assign(Vec<String>, Expr),
    /// Bare expression: evaluate and print.
    Print(Expr),
}

/// REPL handler for the old engine.
pub struct MathExpressionEvaluator {
    client: Arc<LineClient>,
}

impl MathExpressionEvaluator {
    pub fn new(client: Arc<LineClient>) -> Self {
        Self { client }
    }

    async fn run(&self, line: &str, local: &mut HashMap<String, f64>) -> HandlerResult<()> {
        let statements = match parse(line) {
            Ok(statements) => statements,
            Err(error) => return self.client.print(&error.to_string()).await,
        };
        for statement in statements {
            match execute(&statement, local).await {
                Ok((value, printed)) => {
                    if printed {
                        self.client.print(&format_value(value)).await?;
                    }
                    local.insert("_".to_string(), value);
                }
                Err(error) => return self.client.print(&error.to_string()).await,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for MathExpressionEvaluator {
    async fn handle(&mut self) -> HandlerResult<Next> {
        let mut local: HashMap<String, f64> = HashMap::new();
        loop {
            let line = self.client.input(Some("Eval:")).await?;
            if STOP_WORDS.contains(&line.as_str()) {
                return Ok(None);
            }
            self.run(&line, &mut local).await?;
        }
    }
}

fn parse(source: &str) -> Result<Vec<Statement>, MathError> {
    let mut statements = Vec::new();
    for line in source.replace(';', "\n").split('\n') {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        statements.push(build_statement(tokenize(line)));
    }
    statements.into_iter().collect()
}

fn tokenize(line: &str) -> Vec<Token> {
    line.split_whitespace()
        .map(|token| {
            if let Some(op) = OPERATORS.iter().find(|op| **op == token) {
                Token::Op(op)
            } else if let Ok(value) = token.parse::<f64>() {
                Token::Constant(value)
            } else {
                Token::Variable(token.to_string())
            }
        })
        .collect()
}

fn build_statement(tokens: Vec<Token>) -> Result<Statement, MathError> {
    if tokens.iter().any(|t| *t == Token::Op("=")) {
        let mut sections: Vec<Vec<Token>> = Vec::new();
        let mut current = Vec::new();
        for token in tokens {
            if token == Token::Op("=") {
                sections.push(std::mem::take(&mut current));
            } else {
                current.push(token);
            }
        }
        sections.push(current);
        let value = flatten(sections.pop().expect("split always yields a tail"))?;
        let mut targets = Vec::new();
        for section in sections {
            if section.len() != 1 {
                return Err(MathError::MultiTokenTarget);
            }
            match section.into_iter().next() {
                Some(Token::Variable(name)) => targets.push(name),
                _ => return Err(MathError::AssignTarget),
            }
        }
        Ok(Statement::Assign(targets, value))
    } else {
        Ok(Statement::Print(flatten(tokens)?))
    }
}

/// Fold `operand (op operand)*` left to right into one expression.
fn flatten(tokens: Vec<Token>) -> Result<Expr, MathError> {
    if tokens.len() % 2 != 1 {
        return Err(MathError::EvenTokens);
    }
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    for (index, token) in tokens.into_iter().enumerate() {
        match (index % 2 == 0, token) {
            (true, Token::Constant(value)) => operands.push(Expr::Constant(value)),
            (true, Token::Variable(name)) => operands.push(Expr::Variable(name)),
            (true, Token::Op(_)) => return Err(MathError::ExpectedOperand),
            (false, Token::Op(op)) => operators.push(op),
            (false, _) => return Err(MathError::ExpectedOperator),
        }
    }
    let mut operands = operands.into_iter();
    let mut expr = operands.next().expect("odd token count");
    for op in operators {
        let right = operands.next().expect("odd token count");
        expr = Expr::Operation(Box::new(expr), op, Box::new(right));
    }
    Ok(expr)
}

async fn execute(
    statement: &Statement,
    local: &mut HashMap<String, f64>,
) -> Result<(f64, bool), MathError> {
    match statement {
        Statement::Assign(targets, expr) => {
            let value = evaluate(expr, local).await?;
            for target in targets.iter().rev() {
                local.insert(target.clone(), value);
            }
            Ok((value, false))
        }
        Statement::Print(expr) => Ok((evaluate(expr, local).await?, true)),
    }
}

fn evaluate<'a>(
    expr: &'a Expr,
    local: &'a HashMap<String, f64>,
) -> std::pin::Pin<Box<dyn Future<Output = Result<f64, MathError>> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::Constant(value) => Ok(*value),
            Expr::Variable(name) => local
                .get(name)
                .copied()
                .ok_or_else(|| MathError::UnknownVariable(name.clone())),
            Expr::Operation(left, op, right) => {
                let x = evaluate(left, local).await?;
                let y = evaluate(right, local).await?;
                let op = *op;
                run_with_timeout(OPERATION_LIMIT, OPERATION_POLL, move || {
                    run_operation(op, x, y)
                })
                .await?
            }
        }
    })
}

fn run_operation(op: &str, x: f64, y: f64) -> Result<f64, MathError> {
    match op {
        "+" => Ok(x + y),
        "-" => Ok(x - y),
        "*" => Ok(x * y),
        "/" => {
            if y == 0.0 {
                Err(MathError::DivisionByZero)
            } else {
                Ok(x / y)
            }
        }
        "//" => {
            if y == 0.0 {
                Err(MathError::DivisionByZero)
            } else {
                Ok((x / y).floor())
            }
        }
        "%" => {
            if y == 0.0 {
                Err(MathError::DivisionByZero)
            } else {
                Ok(floor_mod(x, y))
            }
        }
        "**" => Ok(x.powf(y)),
        "^" => Ok(((x as i64) ^ (y as i64)) as f64),
        "and" => Ok(if x != 0.0 { y } else { x }),
        "&" => Ok(((x as i64) & (y as i64)) as f64),
        "or" => Ok(if x != 0.0 { x } else { y }),
        "|" => Ok(((x as i64) | (y as i64)) as f64),
        "==" => Ok(truth(x == y)),
        "!=" => Ok(truth(x != y)),
        ">" => Ok(truth(x > y)),
        "<" => Ok(truth(x < y)),
        ">=" => Ok(truth(x >= y)),
        "<=" => Ok(truth(x <= y)),
        other => Err(MathError::UnknownOperator(other.to_string())),
    }
}

/// Remainder with the divisor's sign.
fn floor_mod(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }
}

fn truth(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Whole numbers keep one decimal place so 4.0 prints as `4.0`, not `4`.
fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn eval_all(lines: &[&str]) -> Result<HashMap<String, f64>, MathError> {
        let mut local = HashMap::new();
        for line in lines {
            for statement in parse(line)? {
                let (value, _) = execute(&statement, &mut local).await?;
                local.insert("_".to_string(), value);
            }
        }
        Ok(local)
    }

    #[tokio::test]
    async fn arithmetic_and_assignment() {
        let local = eval_all(&["x = 2 + 3 * 2", "y = x % 3", "x - y"]).await.unwrap();
        // strictly left to right: (2 + 3) * 2
        assert_eq!(local["x"], 10.0);
        assert_eq!(local["y"], 1.0);
        assert_eq!(local["_"], 9.0);
    }

    #[tokio::test]
    async fn chained_assignment_hits_every_target() {
        let local = eval_all(&["a = b = 7 - 2"]).await.unwrap();
        assert_eq!(local["a"], 5.0);
        assert_eq!(local["b"], 5.0);
    }

    #[tokio::test]
    async fn statements_split_on_semicolons_and_comments_drop() {
        let local = eval_all(&["u = 1 ; v = 2", "# u = 9"]).await.unwrap();
        assert_eq!(local["u"], 1.0);
        assert_eq!(local["v"], 2.0);
    }

    #[tokio::test]
    async fn division_by_zero_is_reported() {
        assert_eq!(eval_all(&["1 / 0"]).await, Err(MathError::DivisionByZero));
        assert_eq!(eval_all(&["1 // 0"]).await, Err(MathError::DivisionByZero));
        assert_eq!(eval_all(&["1 % 0"]).await, Err(MathError::DivisionByZero));
    }

    #[tokio::test]
    async fn unknown_variables_and_shapes_are_errors() {
        assert_eq!(
            eval_all(&["ghost + 1"]).await,
            Err(MathError::UnknownVariable("ghost".to_string()))
        );
        assert_eq!(eval_all(&["1 +"]).await, Err(MathError::EvenTokens));
        assert_eq!(eval_all(&["1 2 3"]).await, Err(MathError::ExpectedOperator));
        assert_eq!(eval_all(&["a b = 1"]).await, Err(MathError::MultiTokenTarget));
        assert_eq!(eval_all(&["3 = 1"]).await, Err(MathError::AssignTarget));
    }

    #[tokio::test]
    async fn comparisons_and_logic_mirror_truthiness() {
        let local = eval_all(&["t = 2 > 1", "f = 1 == 2", "p = 0 or 7", "q = 3 and 4"])
            .await
            .unwrap();
        assert_eq!(local["t"], 1.0);
        assert_eq!(local["f"], 0.0);
        assert_eq!(local["p"], 7.0);
        assert_eq!(local["q"], 4.0);
    }

    #[test]
    fn float_rendering_keeps_a_decimal() {
        assert_eq!(format_value(4.0), "4.0");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(f64::INFINITY), "inf");
    }
}
