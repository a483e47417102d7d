use super::{BinaryOp, Expr, UnaryOp};
use crate::error::SqlTemplateError;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn error(src: &str, message: impl std::fmt::Display) -> SqlTemplateError {
    SqlTemplateError::Expression(format!("{message} in `{src}`"))
}

fn tokenize(src: &str) -> Result<Vec<Token>, SqlTemplateError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            _ if b.is_ascii_whitespace() => idx += 1,
            b'0'..=b'9' => {
                let start = idx;
                while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                    idx += 1;
                }
                let is_float = bytes.get(idx) == Some(&b'.')
                    && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit);
                if is_float {
                    idx += 1;
                    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                        idx += 1;
                    }
                    let text = &src[start..idx];
                    let f = text
                        .parse::<f64>()
                        .map_err(|_| error(src, format!("bad number `{text}`")))?;
                    tokens.push(Token::Float(f));
                } else {
                    let text = &src[start..idx];
                    let i = text
                        .parse::<i64>()
                        .map_err(|_| error(src, format!("bad number `{text}`")))?;
                    tokens.push(Token::Int(i));
                }
                // java-style numeric suffixes
                if matches!(bytes.get(idx), Some(b'L' | b'l' | b'D' | b'd' | b'F' | b'f')) {
                    idx += 1;
                }
            }
            b'\'' | b'"' => {
                let quote = b;
                let mut text = String::new();
                idx += 1;
                loop {
                    match bytes.get(idx) {
                        None => return Err(error(src, "unterminated string literal")),
                        Some(&c) if c == quote => {
                            if bytes.get(idx + 1) == Some(&quote) {
                                text.push(quote as char);
                                idx += 2;
                            } else {
                                idx += 1;
                                break;
                            }
                        }
                        Some(b'\\') if idx + 1 < bytes.len() => {
                            let escaped = bytes[idx + 1];
                            text.push(match escaped {
                                b'n' => '\n',
                                b't' => '\t',
                                other => other as char,
                            });
                            idx += 2;
                        }
                        Some(_) => {
                            // copy a whole UTF-8 scalar
                            let ch = src[idx..]
                                .chars()
                                .next()
                                .ok_or_else(|| error(src, "invalid character"))?;
                            text.push(ch);
                            idx += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            _ if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => {
                let start = idx;
                idx += 1;
                while idx < bytes.len()
                    && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_' || bytes[idx] == b'$')
                {
                    idx += 1;
                }
                tokens.push(Token::Ident(src[start..idx].to_string()));
            }
            _ => {
                let next = bytes.get(idx + 1).copied();
                let (token, width) = match (b, next) {
                    (b'&', Some(b'&')) => (Token::AndAnd, 2),
                    (b'|', Some(b'|')) => (Token::OrOr, 2),
                    (b'=', Some(b'=')) => (Token::EqEq, 2),
                    (b'!', Some(b'=')) => (Token::NotEq, 2),
                    (b'<', Some(b'>')) => (Token::NotEq, 2),
                    (b'<', Some(b'=')) => (Token::Le, 2),
                    (b'>', Some(b'=')) => (Token::Ge, 2),
                    (b'<', _) => (Token::Lt, 1),
                    (b'>', _) => (Token::Gt, 1),
                    (b'!', _) => (Token::Not, 1),
                    (b'.', _) => (Token::Dot, 1),
                    (b',', _) => (Token::Comma, 1),
                    (b'(', _) => (Token::LParen, 1),
                    (b')', _) => (Token::RParen, 1),
                    (b'[', _) => (Token::LBracket, 1),
                    (b']', _) => (Token::RBracket, 1),
                    (b'+', _) => (Token::Plus, 1),
                    (b'-', _) => (Token::Minus, 1),
                    (b'*', _) => (Token::Star, 1),
                    (b'/', _) => (Token::Slash, 1),
                    (b'%', _) => (Token::Percent, 1),
                    _ => {
                        let ch = src[idx..].chars().next().unwrap_or('?');
                        return Err(error(src, format!("unexpected character `{ch}`")));
                    }
                };
                tokens.push(token);
                idx += width;
            }
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser, lowest precedence first:
/// `or` < `and` < equality < comparison < additive < multiplicative < unary < postfix.
struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

pub(super) fn parse(src: &str) -> Result<Expr, SqlTemplateError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(error(src, "empty expression"));
    }
    let mut parser = Parser { src, tokens, pos: 0 };
    let expr = parser.or()?;
    if let Some(token) = parser.peek() {
        return Err(error(src, format!("unexpected token {token:?}")));
    }
    Ok(expr)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(word)) = self.peek()
            && word.eq_ignore_ascii_case(keyword)
        {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, token: &Token) -> Result<(), SqlTemplateError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(error(
                self.src,
                format!("expected {token:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn or(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = if self.eat(&Token::EqEq) || self.eat_keyword("eq") {
                BinaryOp::Eq
            } else if self.eat(&Token::NotEq) || self.eat_keyword("neq") {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn comparison(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat(&Token::Le) || self.eat_keyword("lte") {
                BinaryOp::Le
            } else if self.eat(&Token::Ge) || self.eat_keyword("gte") {
                BinaryOp::Ge
            } else if self.eat(&Token::Lt) || self.eat_keyword("lt") {
                BinaryOp::Lt
            } else if self.eat(&Token::Gt) || self.eat_keyword("gt") {
                BinaryOp::Gt
            } else {
                return Ok(lhs);
            };
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Slash) {
                BinaryOp::Div
            } else if self.eat(&Token::Percent) {
                BinaryOp::Rem
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, SqlTemplateError> {
        if self.eat(&Token::Not) || self.eat_keyword("not") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, SqlTemplateError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let Some(Token::Ident(name)) = self.next() else {
                    return Err(error(self.src, "expected a property name after `.`"));
                };
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    expr = Expr::Method(Box::new(expr), name, args);
                } else {
                    expr = Expr::Field(Box::new(expr), name);
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.or()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, SqlTemplateError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.or()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, SqlTemplateError> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s))),
            Some(Token::Ident(word)) => Ok(match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Ident(word),
            }),
            Some(Token::LParen) => {
                let inner = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(error(self.src, format!("unexpected token {token:?}"))),
            None => Err(error(self.src, "unexpected end of expression")),
        }
    }
}
