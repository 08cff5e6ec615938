use crate::{
    environment::ScopeStack,
    lexer::{Delim, Op, Token, TokenKind},
    value::Value,
};

/// Why an expression did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailed {
    pub reason: String,
}

impl EvalFailed {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// No stdlib, memory, or host facilities are reachable from here.
pub fn evaluate(tokens: &[Token], scopes: &ScopeStack) -> Result<Value, EvalFailed> {
    let mut parser = ExprParser { tokens, pos: 0 };
    let node = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(EvalFailed::new(format!(
            "unexpected `{}`",
            parser.tokens[parser.pos].lexeme
        )));
    }
    eval(&node, scopes)
}

enum ExprNode {
    Number(f64),
    String(String),
    Ident(String),
    Unary {
        op: Op,
        operand: Box<ExprNode>,
    },
    Binary {
        op: Op,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek_op(&self) -> Option<Op> {
        match self.tokens.get(self.pos) {
            Some(token) => match token.kind {
                TokenKind::Operator(op) => Some(op),
                _ => None,
            },
            None => None,
        }
    }

    fn binary_level<F>(&mut self, ops: &[Op], mut next: F) -> Result<ExprNode, EvalFailed>
    where
        F: FnMut(&mut Self) -> Result<ExprNode, EvalFailed>,
    {
        let mut left = next(self)?;
        while let Some(op) = self.peek_op() {
            if !ops.contains(&op) {
                break;
            }
            self.pos += 1;
            let right = next(self)?;
            left = ExprNode::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(&[Op::OrOr], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(&[Op::AndAnd], Self::equality)
    }

    fn equality(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(&[Op::EqualEqual, Op::BangEqual], Self::comparison)
    }

    fn comparison(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(
            &[Op::Greater, Op::Less, Op::GreaterEqual, Op::LessEqual],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(&[Op::Plus, Op::Minus], Self::factor)
    }

    fn factor(&mut self) -> Result<ExprNode, EvalFailed> {
        self.binary_level(&[Op::Star, Op::Slash, Op::Percent], Self::unary)
    }

    fn unary(&mut self) -> Result<ExprNode, EvalFailed> {
        if let Some(op @ (Op::Minus | Op::Bang)) = self.peek_op() {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(ExprNode::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ExprNode, EvalFailed> {
        let token = match self.tokens.get(self.pos) {
            Some(token) => token,
            None => return Err(EvalFailed::new("expression ended unexpectedly")),
        };
        self.pos += 1;
        match &token.kind {
            TokenKind::Number => match token.lexeme.parse::<f64>() {
                Ok(value) => Ok(ExprNode::Number(value)),
                Err(_) => Err(EvalFailed::new(format!(
                    "malformed number `{}`",
                    token.lexeme
                ))),
            },
            TokenKind::String => Ok(ExprNode::String(token.lexeme.clone())),
            TokenKind::Identifier => Ok(ExprNode::Ident(token.lexeme.clone())),
            TokenKind::Delimiter(Delim::LParen) => {
                let inner = self.or_expr()?;
                match self.tokens.get(self.pos) {
                    Some(token) if token.kind == TokenKind::Delimiter(Delim::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(EvalFailed::new("missing closing parenthesis")),
                }
            }
            _ => Err(EvalFailed::new(format!(
                "`{}` is not valid in an expression",
                token.lexeme
            ))),
        }
    }
}

fn eval(node: &ExprNode, scopes: &ScopeStack) -> Result<Value, EvalFailed> {
    match node {
        ExprNode::Number(n) => Ok(Value::number(*n)),
        ExprNode::String(s) => Ok(Value::string(s.clone())),
        ExprNode::Ident(name) => match name.as_str() {
            "true" => Ok(Value::bool(true)),
            "false" => Ok(Value::bool(false)),
            "none" => Ok(Value::none()),
            _ => scopes
                .get(name)
                .cloned()
                .ok_or_else(|| EvalFailed::new(format!("undefined variable `{name}`"))),
        },
        ExprNode::Unary { op, operand } => {
            let value = eval(operand, scopes)?;
            match op {
                Op::Minus => match numeric_operand(&value) {
                    Some(n) => Ok(Value::number(-n)),
                    None => Err(EvalFailed::new(format!(
                        "cannot negate {}",
                        value.type_name()
                    ))),
                },
                Op::Bang => Ok(Value::bool(!value.is_truthy())),
                _ => Err(EvalFailed::new("unsupported unary operator")),
            }
        }
        ExprNode::Binary { op, left, right } => {
            let lhs = eval(left, scopes)?;
            match op {
                Op::AndAnd => {
                    if !lhs.is_truthy() {
                        return Ok(Value::bool(false));
                    }
                    let rhs = eval(right, scopes)?;
                    return Ok(Value::bool(rhs.is_truthy()));
                }
                Op::OrOr => {
                    if lhs.is_truthy() {
                        return Ok(Value::bool(true));
                    }
                    let rhs = eval(right, scopes)?;
                    return Ok(Value::bool(rhs.is_truthy()));
                }
                _ => {}
            }
            let rhs = eval(right, scopes)?;
            binary(*op, &lhs, &rhs)
        }
    }
}

fn binary(op: Op, lhs: &Value, rhs: &Value) -> Result<Value, EvalFailed> {
    match op {
        Op::EqualEqual => Ok(Value::bool(lhs == rhs)),
        Op::BangEqual => Ok(Value::bool(lhs != rhs)),
        Op::Plus => match (lhs.as_str(), rhs.as_str()) {
            (Some(a), Some(b)) => Ok(Value::string(format!("{a}{b}"))),
            _ => numeric(op, lhs, rhs),
        },
        Op::Minus | Op::Star | Op::Slash | Op::Percent => numeric(op, lhs, rhs),
        Op::Greater | Op::Less | Op::GreaterEqual | Op::LessEqual => compare(op, lhs, rhs),
        _ => Err(EvalFailed::new("unsupported operator")),
    }
}

fn numeric(op: Op, lhs: &Value, rhs: &Value) -> Result<Value, EvalFailed> {
    let (a, b) = match (numeric_operand(lhs), numeric_operand(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalFailed::new(format!(
                "cannot apply arithmetic to {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )))
        }
    };
    let result = match op {
        Op::Plus => a + b,
        Op::Minus => a - b,
        Op::Star => a * b,
        Op::Slash => {
            if b == 0.0 {
                return Err(EvalFailed::new("division by zero"));
            }
            a / b
        }
        Op::Percent => {
            if b == 0.0 {
                return Err(EvalFailed::new("modulo by zero"));
            }
            // Floored modulo, so -7 % 3 is 2.
            a - b * (a / b).floor()
        }
        _ => return Err(EvalFailed::new("unsupported operator")),
    };
    Ok(Value::number(result))
}

/// Unlike the stdlib, numeric strings do not coerce; `"2" + 1` fails.
fn numeric_operand(value: &Value) -> Option<f64> {
    if value.as_str().is_some() {
        return None;
    }
    value.as_number()
}

fn compare(op: Op, lhs: &Value, rhs: &Value) -> Result<Value, EvalFailed> {
    if let (Some(a), Some(b)) = (lhs.as_str(), rhs.as_str()) {
        let result = match op {
            Op::Greater => a > b,
            Op::Less => a < b,
            Op::GreaterEqual => a >= b,
            Op::LessEqual => a <= b,
            _ => return Err(EvalFailed::new("unsupported comparison")),
        };
        return Ok(Value::bool(result));
    }
    match (numeric_operand(lhs), numeric_operand(rhs)) {
        (Some(a), Some(b)) => {
            let result = match op {
                Op::Greater => a > b,
                Op::Less => a < b,
                Op::GreaterEqual => a >= b,
                Op::LessEqual => a <= b,
                _ => return Err(EvalFailed::new("unsupported comparison")),
            };
            Ok(Value::bool(result))
        }
        _ => Err(EvalFailed::new(format!(
            "cannot compare {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}
