use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Token types for the content-expression language
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token<'src> {
    // Node type or group names
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice())]
    Name(&'src str),

    // Repetition counts inside {m,n}
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Number(&'src str),

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("|")]
    Pipe,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[token("?")]
    Question,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "{}", name),
            Token::Number(num) => write!(f, "{}", num),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Pipe => write!(f, "|"),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Question => write!(f, "?"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// Tokenize a content expression, returning tokens with their source spans.
/// Characters the lexer cannot match are reported as an error span.
pub fn tokenize(source: &str) -> Result<Vec<(Token<'_>, Range<usize>)>, usize> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span().start),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_expression_forms() {
        let tokens = tokenize("paragraph (heading | block{1,2})* inline+").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Name("paragraph"),
                Token::LParen,
                Token::Name("heading"),
                Token::Pipe,
                Token::Name("block"),
                Token::LBrace,
                Token::Number("1"),
                Token::Comma,
                Token::Number("2"),
                Token::RBrace,
                Token::RParen,
                Token::Star,
                Token::Name("inline"),
                Token::Plus,
            ]
        );
    }

    #[test]
    fn reports_lexer_error_position() {
        assert_eq!(tokenize("block %"), Err(6));
    }

    #[test]
    fn empty_expression_has_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("  ").unwrap().is_empty());
    }
}
