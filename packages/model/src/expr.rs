//! Parser for the content-expression language.
//!
//! Content expressions describe the children a node type admits: sequence
//! (`heading paragraph+`), choice (`paragraph | blockquote`), the postfix
//! modifiers `*`, `+`, `?`, bounded repetition (`{2}`, `{1,3}`, `{2,}`),
//! and grouping with parentheses. Names resolve against node type and
//! group names when the schema compiles the expression into its automaton.

use crate::tokenizer::{tokenize, Token};
use std::ops::Range;
use thiserror::Error;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character at {0}")]
    Lexer(usize),

    #[error("unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid repeat count range at {pos}")]
    InvalidRange { pos: usize },
}

impl ExprError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Parsed form of a content expression. Ordering of sub-expressions is
/// significant and preserved through automaton compilation: it determines
/// which filler content wins when several choices are admissible.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    Opt(Box<Expr>),
    Range {
        min: usize,
        max: Option<usize>,
        expr: Box<Expr>,
    },
}

/// Parse a content expression into its expression tree
pub fn parse(source: &str) -> ExprResult<Expr> {
    let tokens = tokenize(source).map_err(ExprError::Lexer)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_choice()?;
    if let Some((token, span)) = parser.peek() {
        return Err(ExprError::unexpected_token(
            span.start,
            "end of expression",
            token.to_string(),
        ));
    }
    Ok(expr)
}

struct Parser<'src> {
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<(Token<'src>, Range<usize>)> {
        self.tokens.get(self.pos).cloned()
    }

    fn advance(&mut self) -> Option<(Token<'src>, Range<usize>)> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: Token<'src>) -> bool {
        matches!(self.peek(), Some((t, _)) if t == token)
    }

    fn match_token(&mut self, token: Token<'src>) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token<'src>) -> ExprResult<()> {
        match self.advance() {
            Some((t, _)) if t == token => Ok(()),
            Some((t, span)) => Err(ExprError::unexpected_token(
                span.start,
                token.to_string(),
                t.to_string(),
            )),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_choice(&mut self) -> ExprResult<Expr> {
        let mut branches = vec![self.parse_seq()?];
        while self.match_token(Token::Pipe) {
            branches.push(self.parse_seq()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap())
        } else {
            Ok(Expr::Choice(branches))
        }
    }

    fn parse_seq(&mut self) -> ExprResult<Expr> {
        let mut items = Vec::new();
        while matches!(self.peek(), Some((Token::Name(_), _)) | Some((Token::LParen, _))) {
            items.push(self.parse_subscript()?);
        }
        match items.len() {
            0 => match self.peek() {
                Some((token, span)) => Err(ExprError::unexpected_token(
                    span.start,
                    "node name or '('",
                    token.to_string(),
                )),
                None => Err(ExprError::UnexpectedEnd),
            },
            1 => Ok(items.pop().unwrap()),
            _ => Ok(Expr::Seq(items)),
        }
    }

    fn parse_subscript(&mut self) -> ExprResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.match_token(Token::Star) {
                expr = Expr::Star(Box::new(expr));
            } else if self.match_token(Token::Plus) {
                expr = Expr::Plus(Box::new(expr));
            } else if self.match_token(Token::Question) {
                expr = Expr::Opt(Box::new(expr));
            } else if self.check(Token::LBrace) {
                expr = self.parse_range(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> ExprResult<Expr> {
        match self.advance() {
            Some((Token::Name(name), _)) => Ok(Expr::Name(name.to_string())),
            Some((Token::LParen, _)) => {
                let expr = self.parse_choice()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some((token, span)) => Err(ExprError::unexpected_token(
                span.start,
                "node name or '('",
                token.to_string(),
            )),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_range(&mut self, expr: Expr) -> ExprResult<Expr> {
        let start = match self.peek() {
            Some((_, span)) => span.start,
            None => 0,
        };
        self.expect(Token::LBrace)?;
        let min = self.expect_number()?;
        let max = if self.match_token(Token::Comma) {
            if self.check(Token::RBrace) {
                None
            } else {
                Some(self.expect_number()?)
            }
        } else {
            Some(min)
        };
        self.expect(Token::RBrace)?;

        if let Some(max) = max {
            if max < min {
                return Err(ExprError::InvalidRange { pos: start });
            }
        }

        Ok(Expr::Range {
            min,
            max,
            expr: Box::new(expr),
        })
    }

    fn expect_number(&mut self) -> ExprResult<usize> {
        match self.advance() {
            Some((Token::Number(digits), span)) => digits
                .parse()
                .map_err(|_| ExprError::InvalidRange { pos: span.start }),
            Some((token, span)) => Err(ExprError::unexpected_token(
                span.start,
                "number",
                token.to_string(),
            )),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn parses_sequence_and_choice() {
        assert_eq!(
            parse("heading paragraph | blockquote").unwrap(),
            Expr::Choice(vec![
                Expr::Seq(vec![name("heading"), name("paragraph")]),
                name("blockquote"),
            ])
        );
    }

    #[test]
    fn parses_postfix_modifiers() {
        assert_eq!(parse("block*").unwrap(), Expr::Star(Box::new(name("block"))));
        assert_eq!(parse("block+").unwrap(), Expr::Plus(Box::new(name("block"))));
        assert_eq!(parse("block?").unwrap(), Expr::Opt(Box::new(name("block"))));
    }

    #[test]
    fn parses_bounded_repetition() {
        assert_eq!(
            parse("paragraph{2,4}").unwrap(),
            Expr::Range {
                min: 2,
                max: Some(4),
                expr: Box::new(name("paragraph")),
            }
        );
        assert_eq!(
            parse("paragraph{2,}").unwrap(),
            Expr::Range {
                min: 2,
                max: None,
                expr: Box::new(name("paragraph")),
            }
        );
        assert_eq!(
            parse("paragraph{3}").unwrap(),
            Expr::Range {
                min: 3,
                max: Some(3),
                expr: Box::new(name("paragraph")),
            }
        );
    }

    #[test]
    fn parses_grouping() {
        assert_eq!(
            parse("(heading | paragraph)+").unwrap(),
            Expr::Plus(Box::new(Expr::Choice(vec![name("heading"), name("paragraph")])))
        );
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(matches!(
            parse("paragraph{3,1}"),
            Err(ExprError::InvalidRange { .. })
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(matches!(
            parse("paragraph)"),
            Err(ExprError::UnexpectedToken { .. })
        ));
        assert!(matches!(parse(""), Err(ExprError::UnexpectedEnd)));
    }
}
