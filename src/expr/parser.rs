//! Syntax validation and parsing for rule expressions.
//!
//! Compilation runs in three passes: the token stream is checked for
//! paren balance and token adjacency, rewritten into a binary evaluation
//! tree by precedence climbing, and finally every function call is checked
//! against the registry. The tree is immutable after compilation and
//! carries no per-call state, so one compiled rule serves any number of
//! concurrent evaluations.
//!
//! Precedence, low to high: separator, `||`, `&&`, ternary/coalesce,
//! comparators, bitwise, additive, multiplicative, exponent, unary prefix,
//! function call. Ties resolve left-to-right except unary prefix, which
//! binds right-to-left.

use crate::expr::builtins::Registry;
use crate::expr::error::SyntaxError;
use crate::expr::token::{tokenize, Op, Token};
use crate::expr::value::Value;

/// Upper bound on expression nesting, enforced at compile time so a
/// pathological document cannot exhaust the evaluation stack.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Param(String),
    Unary {
        op: Op,
        operand: Box<Expr>,
    },
    Binary {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// A compiled rule expression: the source string plus its evaluation tree.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    source: String,
    pub(crate) root: Expr,
}

impl CompiledRule {
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile an expression string against a function registry. Unknown
/// function names fail here, not at evaluation time.
pub fn compile(source: &str, registry: &Registry) -> Result<CompiledRule, SyntaxError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }
    validate_stream(&tokens)?;

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let root = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(SyntaxError::UnexpectedToken(describe(
            &parser.tokens[parser.pos],
        )));
    }

    check_functions(&root, registry)?;

    Ok(CompiledRule {
        source: source.to_string(),
        root,
    })
}

/// Balance and adjacency checks over the raw token stream, before any
/// tree building. Catches the malformed streams that precedence climbing
/// would otherwise turn into confusing downstream errors.
fn validate_stream(tokens: &[Token]) -> Result<(), SyntaxError> {
    let mut parens: i32 = 0;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::LParen => parens += 1,
            Token::RParen => {
                parens -= 1;
                if parens < 0 {
                    return Err(SyntaxError::UnbalancedParens);
                }
            }
            Token::Separator if parens == 0 => return Err(SyntaxError::StraySeparator),
            _ => {}
        }

        let prev = if i == 0 { None } else { Some(&tokens[i - 1]) };
        check_adjacency(prev, tok)?;
    }

    if parens != 0 {
        return Err(SyntaxError::UnbalancedParens);
    }

    match tokens.last() {
        Some(Token::Op(_)) | Some(Token::Separator) | Some(Token::LParen)
        | Some(Token::Func(_)) => Err(SyntaxError::UnexpectedEnd),
        _ => Ok(()),
    }
}

fn is_value(tok: &Token) -> bool {
    matches!(
        tok,
        Token::Number(_) | Token::Str(_) | Token::Bool(_) | Token::Ident(_)
    )
}

fn check_adjacency(prev: Option<&Token>, cur: &Token) -> Result<(), SyntaxError> {
    let bad = || Err(SyntaxError::UnexpectedToken(describe(cur)));
    match prev {
        // Stream start: values, calls, groups and prefix operators only.
        None => match cur {
            Token::Op(op) if !op.prefixable() => bad(),
            Token::RParen | Token::Separator => bad(),
            _ => Ok(()),
        },
        // Two adjacent values, or a value running into a group/call.
        Some(p) if is_value(p) || matches!(p, Token::RParen) => match cur {
            Token::Op(_) | Token::RParen | Token::Separator => Ok(()),
            _ => bad(),
        },
        // After an operator or separator: operand position.
        Some(Token::Op(_)) | Some(Token::Separator) | Some(Token::LParen) => match cur {
            Token::Op(op) if !op.prefixable() => bad(),
            Token::Separator => bad(),
            // `()` is only legal as an empty argument list.
            Token::RParen => match prev {
                Some(Token::LParen) => Ok(()),
                _ => bad(),
            },
            _ => Ok(()),
        },
        // The lexer only emits Func when a paren follows.
        Some(Token::Func(_)) => match cur {
            Token::LParen => Ok(()),
            _ => bad(),
        },
        Some(_) => Ok(()),
    }
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Number(n) => n.to_string(),
        Token::Str(s) => format!("'{s}'"),
        Token::Bool(b) => b.to_string(),
        Token::Ident(s) | Token::Func(s) => s.clone(),
        Token::Op(op) => op.symbol().to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Separator => ",".to_string(),
    }
}

/// Walk the finished tree and reject calls to names the registry does not
/// carry.
fn check_functions(expr: &Expr, registry: &Registry) -> Result<(), SyntaxError> {
    match expr {
        Expr::Literal(_) | Expr::Param(_) => Ok(()),
        Expr::Unary { operand, .. } => check_functions(operand, registry),
        Expr::Binary { left, right, .. } => {
            check_functions(left, registry)?;
            check_functions(right, registry)
        }
        Expr::Call { name, args } => {
            if !registry.contains(name) {
                return Err(SyntaxError::UnknownFunction(name.clone()));
            }
            for arg in args {
                check_functions(arg, registry)?;
            }
            Ok(())
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<Op> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect_rparen(&mut self) -> Result<(), SyntaxError> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            Some(other) => Err(SyntaxError::Expected {
                expected: ")".into(),
                found: describe(&other),
            }),
            None => Err(SyntaxError::UnexpectedEnd),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SyntaxError::TooDeep(MAX_DEPTH));
        }
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    /// `a || b`, left-associative.
    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.peek_op() == Some(Op::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(Op::Or, left, right);
        }
        Ok(left)
    }

    /// `a && b`, left-associative.
    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_ternary()?;
        while self.peek_op() == Some(Op::And) {
            self.advance();
            let right = self.parse_ternary()?;
            left = binary(Op::And, left, right);
        }
        Ok(left)
    }

    /// `?`, `:` and `??` share one tier. Pairwise left grouping makes
    /// `cond ? a : b` read as `(cond ? a) : b`, which is what gives the
    /// null-propagating operator semantics their conventional meaning.
    fn parse_ternary(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while let Some(op @ (Op::TernaryIf | Op::TernaryElse | Op::Coalesce)) = self.peek_op() {
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_bitwise()?;
        while let Some(
            op @ (Op::Eq
            | Op::Ne
            | Op::Gt
            | Op::Lt
            | Op::Ge
            | Op::Le
            | Op::ReMatch
            | Op::ReNotMatch
            | Op::In
            | Op::Contains
            | Op::StartsWith
            | Op::EndsWith),
        ) = self.peek_op()
        {
            self.advance();
            let right = self.parse_bitwise()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_additive()?;
        while let Some(op @ (Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr)) =
            self.peek_op()
        {
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op @ (Op::Add | Op::Sub)) = self.peek_op() {
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_exponent()?;
        while let Some(op @ (Op::Mul | Op::Div | Op::Mod)) = self.peek_op() {
            self.advance();
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_exponent(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        while self.peek_op() == Some(Op::Pow) {
            self.advance();
            let right = self.parse_unary()?;
            left = binary(Op::Pow, left, right);
        }
        Ok(left)
    }

    /// Prefix operators bind right-to-left: `!!a`, `--a`.
    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(op @ (Op::Not | Op::Sub)) = self.peek_op() {
            self.advance();
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(SyntaxError::TooDeep(MAX_DEPTH));
            }
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Ident(name)) => Ok(Expr::Param(name)),
            Some(Token::Func(name)) => {
                // The lexer guarantees the paren.
                match self.advance() {
                    Some(Token::LParen) => {}
                    _ => return Err(SyntaxError::UnexpectedEnd),
                }
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        match self.peek() {
                            Some(Token::Separator) => {
                                self.advance();
                            }
                            _ => break,
                        }
                    }
                }
                self.expect_rparen()?;
                Ok(Expr::Call { name, args })
            }
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(other) => Err(SyntaxError::UnexpectedToken(describe(&other))),
            None => Err(SyntaxError::UnexpectedEnd),
        }
    }
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
