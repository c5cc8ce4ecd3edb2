//! Tokenizer and recursive-descent parser for data-binding expressions
//!
//! The grammar is the JSONata subset used by workflow mappings: context
//! references (`$`), dotted paths, array projection (`seq.(expr)`), index
//! and range access, object/array constructors, `$function(...)` calls,
//! comparison/arithmetic operators and the ternary conditional.

use serde_json::Value;

use crate::domain::DomainError;

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$` - the whole evaluation context
    Context,

    /// Literal string/number/boolean/null
    Literal(Value),

    /// Bare identifier resolved against the context
    Field(String),

    /// `base.name` navigation
    Nav(Box<Expr>, String),

    /// `base.(expr)` - evaluate expr with each element of base as context
    Project(Box<Expr>, Box<Expr>),

    /// `base[expr]` - numeric index (negative counts from the end)
    Index(Box<Expr>, Box<Expr>),

    /// `base[from..to]` - inclusive range selection
    Slice(Box<Expr>, Box<Expr>, Box<Expr>),

    /// `$name(args...)` function call
    Call(String, Vec<Expr>),

    /// `{"key": expr, ...}` object constructor
    Object(Vec<(String, Expr)>),

    /// `[expr, ...]` array constructor
    Array(Vec<Expr>),

    /// Unary negation
    Neg(Box<Expr>),

    Binary(BinOp, Box<Expr>, Box<Expr>),

    /// `cond ? then : else`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dollar,
    DollarFn(String),
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    And,
    Or,
    Dot,
    DotDot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn lex(input: &str) -> Result<Vec<Token>, DomainError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '$' => {
                i += 1;
                if i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == '_') {
                    let start = i;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    tokens.push(Token::DollarFn(chars[start..i].iter().collect()));
                } else {
                    tokens.push(Token::Dollar);
                }
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    if i >= chars.len() {
                        return Err(DomainError::expression("unterminated string literal"));
                    }
                    match chars[i] {
                        ch if ch == quote => {
                            i += 1;
                            break;
                        }
                        '\\' => {
                            i += 1;
                            if i >= chars.len() {
                                return Err(DomainError::expression("unterminated escape"));
                            }
                            s.push(match chars[i] {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                            i += 1;
                        }
                        ch => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // A single '.' followed by a digit is a fraction; '..' is the
                // range operator and must be left for the parser.
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| DomainError::expression(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Num(n));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            '.' => {
                if i + 1 < chars.len() && chars[i + 1] == '.' {
                    tokens.push(Token::DotDot);
                    i += 2;
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '&' => {
                tokens.push(Token::Amp);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(DomainError::expression("unexpected character '!'"));
                }
            }
            '<' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            other => {
                return Err(DomainError::expression(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), DomainError> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(DomainError::expression(format!(
                "expected {} but found {:?}",
                what, t
            ))),
            None => Err(DomainError::expression(format!(
                "expected {} but expression ended",
                what
            ))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, DomainError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, DomainError> {
        let cond = self.parse_or()?;

        if self.peek() == Some(&Token::Question) {
            self.next();
            let then = self.parse_expr()?;
            self.expect(Token::Colon, "':'")?;
            let els = self.parse_expr()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(els)));
        }

        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, DomainError> {
        let lhs = self.parse_additive()?;

        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };

        self.next();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                Some(Token::Amp) => BinOp::Concat,
                _ => break,
            };
            self.next();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, DomainError> {
        if self.peek() == Some(&Token::Minus) {
            self.next();
            let operand = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, DomainError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Nav(Box::new(expr), name);
                        }
                        Some(Token::LParen) => {
                            let body = self.parse_expr()?;
                            self.expect(Token::RParen, "')'")?;
                            expr = Expr::Project(Box::new(expr), Box::new(body));
                        }
                        other => {
                            return Err(DomainError::expression(format!(
                                "expected field name or '(' after '.', found {:?}",
                                other
                            )));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    let first = self.parse_expr()?;
                    if self.peek() == Some(&Token::DotDot) {
                        self.next();
                        let last = self.parse_expr()?;
                        self.expect(Token::RBracket, "']'")?;
                        expr = Expr::Slice(Box::new(expr), Box::new(first), Box::new(last));
                    } else {
                        self.expect(Token::RBracket, "']'")?;
                        expr = Expr::Index(Box::new(expr), Box::new(first));
                    }
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, DomainError> {
        match self.next() {
            Some(Token::Dollar) => Ok(Expr::Context),
            Some(Token::DollarFn(name)) => {
                self.expect(Token::LParen, "'(' after function name")?;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.next();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Call(name, args))
            }
            Some(Token::Ident(name)) => Ok(Expr::Field(name)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.next();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::Array(items))
            }
            Some(Token::LBrace) => {
                let mut fields = Vec::new();
                if self.peek() != Some(&Token::RBrace) {
                    loop {
                        let key = match self.next() {
                            Some(Token::Str(s)) => s,
                            Some(Token::Ident(name)) => name,
                            other => {
                                return Err(DomainError::expression(format!(
                                    "expected object key, found {:?}",
                                    other
                                )));
                            }
                        };
                        self.expect(Token::Colon, "':'")?;
                        let value = self.parse_expr()?;
                        fields.push((key, value));

                        if self.peek() == Some(&Token::Comma) {
                            self.next();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBrace, "'}'")?;
                Ok(Expr::Object(fields))
            }
            Some(other) => Err(DomainError::expression(format!(
                "unexpected token {:?}",
                other
            ))),
            None => Err(DomainError::expression("empty expression")),
        }
    }
}

/// Convert an f64 into the narrowest JSON number representation
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Parse an expression string into its tree form
pub fn parse(input: &str) -> Result<Expr, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::expression("empty expression"));
    }

    let tokens = lex(trimmed)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;

    if parser.pos != parser.tokens.len() {
        return Err(DomainError::expression(format!(
            "unexpected trailing input at token {:?}",
            parser.tokens[parser.pos]
        )));
    }

    Ok(expr)
}
